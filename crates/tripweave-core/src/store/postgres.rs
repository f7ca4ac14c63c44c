//! PostgreSQL-backed [`ItineraryStore`].
//!
//! Plan replacement deletes and re-inserts the trip's day rows inside one
//! transaction holding the trip row lock. Reads run in a `REPEATABLE READ`
//! read-only transaction so the trip and all of its child tables come from
//! the same snapshot.

use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use tripweave_db::models::{DayRecords, Trip, TripRecord, TripStatus};
use tripweave_db::queries::itinerary::{self as itinerary_db, NewDayPlan};
use tripweave_db::queries::trips::{self as trip_db, NewTrip};

use super::{ItineraryStore, StoreError};
use crate::plan::{PlanDocument, records_from_plan};

#[derive(Debug, Clone)]
pub struct PgItineraryStore {
    pool: PgPool,
}

impl PgItineraryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ItineraryStore for PgItineraryStore {
    async fn create_trip(&self, new: &NewTrip<'_>) -> Result<Trip, StoreError> {
        Ok(trip_db::insert_trip(&self.pool, new).await?)
    }

    async fn list_trips(&self, user_id: &str) -> Result<Vec<Trip>, StoreError> {
        Ok(trip_db::list_trips_for_user(&self.pool, user_id).await?)
    }

    async fn get_trip(&self, trip_id: Uuid) -> Result<TripRecord, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin read transaction")?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await
            .context("failed to set read snapshot isolation")?;

        let trip = trip_db::get_trip_on(&mut *tx, trip_id)
            .await?
            .ok_or(StoreError::NotFound(trip_id))?;

        let days = itinerary_db::list_day_plans(&mut *tx, trip_id).await?;
        let activities = itinerary_db::list_activities_for_trip(&mut *tx, trip_id).await?;
        let meals = itinerary_db::list_meals_for_trip(&mut *tx, trip_id).await?;
        let transports = itinerary_db::list_transports_for_trip(&mut *tx, trip_id).await?;

        tx.commit()
            .await
            .context("failed to finish read transaction")?;

        let mut by_day: HashMap<Uuid, DayRecords> = HashMap::with_capacity(days.len());
        let order: Vec<Uuid> = days.iter().map(|d| d.id).collect();
        for day in days {
            by_day.insert(
                day.id,
                DayRecords {
                    day,
                    activities: Vec::new(),
                    meals: Vec::new(),
                    transports: Vec::new(),
                },
            );
        }
        // Children arrive sorted by (day_index, position); pushing keeps that order.
        for a in activities {
            if let Some(d) = by_day.get_mut(&a.day_plan_id) {
                d.activities.push(a);
            }
        }
        for m in meals {
            if let Some(d) = by_day.get_mut(&m.day_plan_id) {
                d.meals.push(m);
            }
        }
        for t in transports {
            if let Some(d) = by_day.get_mut(&t.day_plan_id) {
                d.transports.push(t);
            }
        }

        let days = order
            .into_iter()
            .filter_map(|id| by_day.remove(&id))
            .collect();

        Ok(TripRecord { trip, days })
    }

    async fn replace_plan(&self, trip_id: Uuid, plan: &PlanDocument) -> Result<i32, StoreError> {
        let rows = records_from_plan(plan);

        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin transaction")?;

        // Serializes concurrent replaces of the same trip. On the NotFound
        // path the transaction rolls back on drop.
        if trip_db::lock_trip(&mut *tx, trip_id).await?.is_none() {
            return Err(StoreError::NotFound(trip_id));
        }

        let version = write_locked_plan(&mut tx, trip_id, &rows).await?;
        tx.commit()
            .await
            .context("failed to commit plan replace")?;

        Ok(version)
    }

    async fn replace_plan_if_version(
        &self,
        trip_id: Uuid,
        expected_version: i32,
        plan: &PlanDocument,
    ) -> Result<Option<i32>, StoreError> {
        let rows = records_from_plan(plan);

        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin transaction")?;

        let trip = trip_db::lock_trip(&mut *tx, trip_id)
            .await?
            .ok_or(StoreError::NotFound(trip_id))?;
        if trip.plan_version != expected_version {
            tracing::info!(
                trip_id = %trip_id,
                expected_version,
                plan_version = trip.plan_version,
                "plan version moved on, skipping replace"
            );
            return Ok(None);
        }

        let version = write_locked_plan(&mut tx, trip_id, &rows).await?;
        tx.commit()
            .await
            .context("failed to commit plan replace")?;

        Ok(Some(version))
    }

    async fn update_trip_budget(&self, trip_id: Uuid, amount: f64) -> Result<(), StoreError> {
        let rows = trip_db::update_trip_budget(&self.pool, trip_id, amount).await?;
        if rows == 0 {
            return Err(StoreError::NotFound(trip_id));
        }
        Ok(())
    }

    async fn set_trip_status(
        &self,
        trip_id: Uuid,
        status: TripStatus,
        detail: Option<&str>,
    ) -> Result<(), StoreError> {
        let rows = trip_db::update_trip_status(&self.pool, trip_id, status, detail).await?;
        if rows == 0 {
            return Err(StoreError::NotFound(trip_id));
        }
        Ok(())
    }
}

/// Delete the trip's day rows, insert `rows` and bump the plan version.
/// The caller holds the trip row lock inside `tx`.
async fn write_locked_plan(
    tx: &mut Transaction<'_, Postgres>,
    trip_id: Uuid,
    rows: &[NewDayPlan],
) -> Result<i32, StoreError> {
    let removed = itinerary_db::delete_day_plans(&mut **tx, trip_id).await?;
    for day in rows {
        itinerary_db::insert_day_plan(&mut **tx, trip_id, day).await?;
    }
    let version = trip_db::bump_plan_version(&mut **tx, trip_id).await?;

    tracing::info!(
        trip_id = %trip_id,
        removed_days = removed,
        inserted_days = rows.len(),
        plan_version = version,
        "replaced trip plan"
    );
    Ok(version)
}
