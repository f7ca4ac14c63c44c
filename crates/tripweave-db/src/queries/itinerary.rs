//! Database query functions for the itinerary tables: `day_plans`,
//! `activities`, `meals` and `transports`.
//!
//! These take a `&mut PgConnection` so callers can compose them inside a
//! transaction (`&mut *tx`).

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::models::{ActivityRecord, DayPlanRecord, MealRecord, TransportRecord};

/// A day to insert, with its children in display order.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDayPlan {
    pub day_index: i32,
    pub date: NaiveDate,
    pub estimated_cost: f64,
    pub activities: Vec<NewActivity>,
    pub meals: Vec<NewMeal>,
    pub transports: Vec<NewTransport>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewActivity {
    pub name: String,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub duration_minutes: i32,
    pub cost: f64,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMeal {
    pub name: String,
    pub meal_type: String,
    pub latitude: f64,
    pub longitude: f64,
    pub cost: f64,
    pub cuisine: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTransport {
    pub mode: String,
    pub from_name: String,
    pub from_latitude: f64,
    pub from_longitude: f64,
    pub to_name: String,
    pub to_latitude: f64,
    pub to_longitude: f64,
    pub duration_minutes: i32,
    pub cost: f64,
}

// -----------------------------------------------------------------------
// Reads
// -----------------------------------------------------------------------

/// List a trip's days ordered by `day_index`.
pub async fn list_day_plans(conn: &mut PgConnection, trip_id: Uuid) -> Result<Vec<DayPlanRecord>> {
    let days = sqlx::query_as::<_, DayPlanRecord>(
        "SELECT * FROM day_plans WHERE trip_id = $1 ORDER BY day_index ASC",
    )
    .bind(trip_id)
    .fetch_all(&mut *conn)
    .await
    .context("failed to list day plans")?;

    Ok(days)
}

/// List every activity belonging to a trip, ordered by day then position.
pub async fn list_activities_for_trip(
    conn: &mut PgConnection,
    trip_id: Uuid,
) -> Result<Vec<ActivityRecord>> {
    let rows = sqlx::query_as::<_, ActivityRecord>(
        "SELECT a.* FROM activities a \
         JOIN day_plans d ON d.id = a.day_plan_id \
         WHERE d.trip_id = $1 \
         ORDER BY d.day_index ASC, a.position ASC",
    )
    .bind(trip_id)
    .fetch_all(&mut *conn)
    .await
    .context("failed to list activities")?;

    Ok(rows)
}

/// List every meal belonging to a trip, ordered by day then position.
pub async fn list_meals_for_trip(conn: &mut PgConnection, trip_id: Uuid) -> Result<Vec<MealRecord>> {
    let rows = sqlx::query_as::<_, MealRecord>(
        "SELECT m.* FROM meals m \
         JOIN day_plans d ON d.id = m.day_plan_id \
         WHERE d.trip_id = $1 \
         ORDER BY d.day_index ASC, m.position ASC",
    )
    .bind(trip_id)
    .fetch_all(&mut *conn)
    .await
    .context("failed to list meals")?;

    Ok(rows)
}

/// List every transport leg belonging to a trip, ordered by day then position.
pub async fn list_transports_for_trip(
    conn: &mut PgConnection,
    trip_id: Uuid,
) -> Result<Vec<TransportRecord>> {
    let rows = sqlx::query_as::<_, TransportRecord>(
        "SELECT t.* FROM transports t \
         JOIN day_plans d ON d.id = t.day_plan_id \
         WHERE d.trip_id = $1 \
         ORDER BY d.day_index ASC, t.position ASC",
    )
    .bind(trip_id)
    .fetch_all(&mut *conn)
    .await
    .context("failed to list transports")?;

    Ok(rows)
}

// -----------------------------------------------------------------------
// Writes
// -----------------------------------------------------------------------

/// Delete all days of a trip. Child rows go with them via `ON DELETE CASCADE`.
///
/// Returns the number of days removed.
pub async fn delete_day_plans(conn: &mut PgConnection, trip_id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM day_plans WHERE trip_id = $1")
        .bind(trip_id)
        .execute(&mut *conn)
        .await
        .context("failed to delete day plans")?;

    Ok(result.rows_affected())
}

/// Insert one day and all of its children. Returns the new day's ID.
pub async fn insert_day_plan(
    conn: &mut PgConnection,
    trip_id: Uuid,
    day: &NewDayPlan,
) -> Result<Uuid> {
    let day_id: Uuid = sqlx::query_scalar(
        "INSERT INTO day_plans (trip_id, day_index, date, estimated_cost) \
         VALUES ($1, $2, $3, $4) \
         RETURNING id",
    )
    .bind(trip_id)
    .bind(day.day_index)
    .bind(day.date)
    .bind(day.estimated_cost)
    .fetch_one(&mut *conn)
    .await
    .with_context(|| format!("failed to insert day {}", day.day_index))?;

    for (position, a) in day.activities.iter().enumerate() {
        sqlx::query(
            "INSERT INTO activities (day_plan_id, position, name, description, latitude, \
             longitude, duration_minutes, cost, category) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(day_id)
        .bind(position as i32)
        .bind(&a.name)
        .bind(&a.description)
        .bind(a.latitude)
        .bind(a.longitude)
        .bind(a.duration_minutes)
        .bind(a.cost)
        .bind(&a.category)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("failed to insert activity {:?}", a.name))?;
    }

    for (position, m) in day.meals.iter().enumerate() {
        sqlx::query(
            "INSERT INTO meals (day_plan_id, position, name, meal_type, latitude, longitude, \
             cost, cuisine) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(day_id)
        .bind(position as i32)
        .bind(&m.name)
        .bind(&m.meal_type)
        .bind(m.latitude)
        .bind(m.longitude)
        .bind(m.cost)
        .bind(&m.cuisine)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("failed to insert meal {:?}", m.name))?;
    }

    for (position, t) in day.transports.iter().enumerate() {
        sqlx::query(
            "INSERT INTO transports (day_plan_id, position, mode, from_name, from_latitude, \
             from_longitude, to_name, to_latitude, to_longitude, duration_minutes, cost) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(day_id)
        .bind(position as i32)
        .bind(&t.mode)
        .bind(&t.from_name)
        .bind(t.from_latitude)
        .bind(t.from_longitude)
        .bind(&t.to_name)
        .bind(t.to_latitude)
        .bind(t.to_longitude)
        .bind(t.duration_minutes)
        .bind(t.cost)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("failed to insert transport {:?}", t.mode))?;
    }

    Ok(day_id)
}
