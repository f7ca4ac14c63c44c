//! In-process [`ItineraryStore`] for tests and database-less local runs.
//!
//! Each trip's itinerary is a single value swapped under the write lock, so a
//! reader never sees a partially replaced plan.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use tripweave_db::models::{Trip, TripRecord, TripStatus};
use tripweave_db::queries::trips::NewTrip;

use super::{ItineraryStore, StoreError};
use crate::plan::{PlanDocument, materialize_records, records_from_plan};

#[derive(Debug, Default)]
pub struct MemoryItineraryStore {
    trips: RwLock<HashMap<Uuid, TripRecord>>,
}

impl MemoryItineraryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored trips.
    pub async fn len(&self) -> usize {
        self.trips.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.trips.read().await.is_empty()
    }
}

#[async_trait]
impl ItineraryStore for MemoryItineraryStore {
    async fn create_trip(&self, new: &NewTrip<'_>) -> Result<Trip, StoreError> {
        if new.start_date > new.end_date {
            return Err(StoreError::Backend(anyhow::anyhow!(
                "trip start date {} is after end date {}",
                new.start_date,
                new.end_date
            )));
        }

        let now = Utc::now();
        let trip = Trip {
            id: Uuid::new_v4(),
            user_id: new.user_id.to_owned(),
            destination: new.destination.to_owned(),
            start_date: new.start_date,
            end_date: new.end_date,
            budget: new.budget,
            status: TripStatus::Generating,
            status_detail: None,
            plan_version: 0,
            created_at: now,
            updated_at: now,
        };

        self.trips.write().await.insert(
            trip.id,
            TripRecord {
                trip: trip.clone(),
                days: Vec::new(),
            },
        );
        Ok(trip)
    }

    async fn list_trips(&self, user_id: &str) -> Result<Vec<Trip>, StoreError> {
        let trips = self.trips.read().await;
        let mut owned: Vec<Trip> = trips
            .values()
            .filter(|r| r.trip.user_id == user_id)
            .map(|r| r.trip.clone())
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn get_trip(&self, trip_id: Uuid) -> Result<TripRecord, StoreError> {
        self.trips
            .read()
            .await
            .get(&trip_id)
            .cloned()
            .ok_or(StoreError::NotFound(trip_id))
    }

    async fn replace_plan(&self, trip_id: Uuid, plan: &PlanDocument) -> Result<i32, StoreError> {
        let days = materialize_records(trip_id, &records_from_plan(plan));

        let mut trips = self.trips.write().await;
        let record = trips
            .get_mut(&trip_id)
            .ok_or(StoreError::NotFound(trip_id))?;
        record.days = days;
        record.trip.plan_version += 1;
        record.trip.updated_at = Utc::now();

        Ok(record.trip.plan_version)
    }

    async fn replace_plan_if_version(
        &self,
        trip_id: Uuid,
        expected_version: i32,
        plan: &PlanDocument,
    ) -> Result<Option<i32>, StoreError> {
        let days = materialize_records(trip_id, &records_from_plan(plan));

        let mut trips = self.trips.write().await;
        let record = trips
            .get_mut(&trip_id)
            .ok_or(StoreError::NotFound(trip_id))?;
        if record.trip.plan_version != expected_version {
            return Ok(None);
        }
        record.days = days;
        record.trip.plan_version += 1;
        record.trip.updated_at = Utc::now();

        Ok(Some(record.trip.plan_version))
    }

    async fn update_trip_budget(&self, trip_id: Uuid, amount: f64) -> Result<(), StoreError> {
        let mut trips = self.trips.write().await;
        let record = trips
            .get_mut(&trip_id)
            .ok_or(StoreError::NotFound(trip_id))?;
        record.trip.budget = Some(amount);
        record.trip.updated_at = Utc::now();
        Ok(())
    }

    async fn set_trip_status(
        &self,
        trip_id: Uuid,
        status: TripStatus,
        detail: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut trips = self.trips.write().await;
        let record = trips
            .get_mut(&trip_id)
            .ok_or(StoreError::NotFound(trip_id))?;
        record.trip.status = status;
        record.trip.status_detail = detail.map(str::to_owned);
        record.trip.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::plan::{DayPlan, plan_from_records};

    fn new_trip(user_id: &str) -> NewTrip<'_> {
        NewTrip {
            user_id,
            destination: "Kyoto",
            start_date: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 4, 2).unwrap(),
            budget: None,
        }
    }

    fn one_day_plan(cost: f64) -> PlanDocument {
        PlanDocument::new(vec![DayPlan {
            date: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
            activities: vec![],
            meals: vec![],
            transportation: vec![],
            estimated_cost: cost,
        }])
    }

    #[tokio::test]
    async fn create_then_get_returns_empty_itinerary() {
        let store = MemoryItineraryStore::new();
        let trip = store.create_trip(&new_trip("u1")).await.unwrap();

        assert_eq!(trip.status, TripStatus::Generating);
        let record = store.get_trip(trip.id).await.unwrap();
        assert_eq!(record.trip, trip);
        assert!(record.days.is_empty());
    }

    #[tokio::test]
    async fn create_rejects_inverted_dates() {
        let store = MemoryItineraryStore::new();
        let mut new = new_trip("u1");
        std::mem::swap(&mut new.start_date, &mut new.end_date);
        assert!(store.create_trip(&new).await.is_err());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn replace_plan_swaps_days_and_bumps_version() {
        let store = MemoryItineraryStore::new();
        let trip = store.create_trip(&new_trip("u1")).await.unwrap();

        assert_eq!(store.replace_plan(trip.id, &one_day_plan(10.0)).await.unwrap(), 1);
        assert_eq!(store.replace_plan(trip.id, &one_day_plan(20.0)).await.unwrap(), 2);

        let record = store.get_trip(trip.id).await.unwrap();
        assert_eq!(plan_from_records(&record.days), one_day_plan(20.0));
        assert_eq!(record.trip.plan_version, 2);
    }

    #[tokio::test]
    async fn conditional_replace_skips_stale_version() {
        let store = MemoryItineraryStore::new();
        let trip = store.create_trip(&new_trip("u1")).await.unwrap();

        assert_eq!(
            store
                .replace_plan_if_version(trip.id, 0, &one_day_plan(10.0))
                .await
                .unwrap(),
            Some(1)
        );
        assert_eq!(
            store
                .replace_plan_if_version(trip.id, 0, &one_day_plan(99.0))
                .await
                .unwrap(),
            None
        );

        let record = store.get_trip(trip.id).await.unwrap();
        assert_eq!(record.trip.plan_version, 1);
        assert_eq!(plan_from_records(&record.days), one_day_plan(10.0));
    }

    #[tokio::test]
    async fn missing_trip_is_not_found() {
        let store = MemoryItineraryStore::new();
        let id = Uuid::new_v4();

        assert!(store.get_trip(id).await.unwrap_err().is_not_found());
        assert!(
            store
                .replace_plan(id, &PlanDocument::default())
                .await
                .unwrap_err()
                .is_not_found()
        );
        assert!(store.update_trip_budget(id, 1.0).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn list_trips_filters_by_user() {
        let store = MemoryItineraryStore::new();
        store.create_trip(&new_trip("u1")).await.unwrap();
        store.create_trip(&new_trip("u1")).await.unwrap();
        store.create_trip(&new_trip("u2")).await.unwrap();

        assert_eq!(store.list_trips("u1").await.unwrap().len(), 2);
        assert_eq!(store.list_trips("u2").await.unwrap().len(), 1);
        assert!(store.list_trips("u3").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn status_and_budget_updates_are_visible() {
        let store = MemoryItineraryStore::new();
        let trip = store.create_trip(&new_trip("u1")).await.unwrap();

        store
            .set_trip_status(trip.id, TripStatus::Failed, Some("reasoner timed out"))
            .await
            .unwrap();
        store.update_trip_budget(trip.id, 800.0).await.unwrap();

        let t = store.get_trip(trip.id).await.unwrap().trip;
        assert_eq!(t.status, TripStatus::Failed);
        assert_eq!(t.status_detail.as_deref(), Some("reasoner timed out"));
        assert_eq!(t.budget, Some(800.0));
    }
}
