//! Database query functions for the `trips` table.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::{Trip, TripStatus};

/// Parameters for inserting a new trip row.
#[derive(Debug, Clone)]
pub struct NewTrip<'a> {
    pub user_id: &'a str,
    pub destination: &'a str,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub budget: Option<f64>,
}

/// Insert a new trip. Returns the inserted row with server-generated
/// defaults (id, status = generating, plan_version = 0, timestamps).
pub async fn insert_trip(pool: &PgPool, new: &NewTrip<'_>) -> Result<Trip> {
    let trip = sqlx::query_as::<_, Trip>(
        "INSERT INTO trips (user_id, destination, start_date, end_date, budget) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING *",
    )
    .bind(new.user_id)
    .bind(new.destination)
    .bind(new.start_date)
    .bind(new.end_date)
    .bind(new.budget)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to insert trip to {:?}", new.destination))?;

    Ok(trip)
}

/// List a user's trips, newest first.
pub async fn list_trips_for_user(pool: &PgPool, user_id: &str) -> Result<Vec<Trip>> {
    let trips = sqlx::query_as::<_, Trip>(
        "SELECT * FROM trips WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("failed to list trips")?;

    Ok(trips)
}

/// Set a trip's budget. Returns the number of rows affected (0 means the
/// trip does not exist).
pub async fn update_trip_budget(pool: &PgPool, id: Uuid, budget: f64) -> Result<u64> {
    let result = sqlx::query("UPDATE trips SET budget = $1, updated_at = now() WHERE id = $2")
        .bind(budget)
        .bind(id)
        .execute(pool)
        .await
        .context("failed to update trip budget")?;

    Ok(result.rows_affected())
}

/// Set a trip's generation status and detail message.
///
/// `detail` replaces any previous value, so passing `None` clears a stale
/// failure reason. Returns the number of rows affected.
pub async fn update_trip_status(
    pool: &PgPool,
    id: Uuid,
    status: TripStatus,
    detail: Option<&str>,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE trips SET status = $1, status_detail = $2, updated_at = now() WHERE id = $3",
    )
    .bind(status)
    .bind(detail)
    .bind(id)
    .execute(pool)
    .await
    .context("failed to update trip status")?;

    Ok(result.rows_affected())
}

/// Lock a trip row for the remainder of the enclosing transaction.
///
/// Returns `None` when the trip does not exist.
pub async fn lock_trip(conn: &mut PgConnection, id: Uuid) -> Result<Option<Trip>> {
    let trip = sqlx::query_as::<_, Trip>("SELECT * FROM trips WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .context("failed to lock trip")?;

    Ok(trip)
}

/// Fetch a trip on an existing connection or transaction.
pub async fn get_trip_on(conn: &mut PgConnection, id: Uuid) -> Result<Option<Trip>> {
    let trip = sqlx::query_as::<_, Trip>("SELECT * FROM trips WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .context("failed to fetch trip")?;

    Ok(trip)
}

/// Increment a trip's plan version. Returns the new version.
pub async fn bump_plan_version(conn: &mut PgConnection, id: Uuid) -> Result<i32> {
    let version: i32 = sqlx::query_scalar(
        "UPDATE trips SET plan_version = plan_version + 1, updated_at = now() \
         WHERE id = $1 RETURNING plan_version",
    )
    .bind(id)
    .fetch_one(&mut *conn)
    .await
    .context("failed to bump plan version")?;

    Ok(version)
}
