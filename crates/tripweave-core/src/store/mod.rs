//! The Itinerary Store contract and its implementations.
//!
//! The store exclusively owns persisted trips and itineraries. Callers read
//! a [`TripRecord`] snapshot and write whole plans through
//! [`ItineraryStore::replace_plan`], which readers observe atomically: they
//! see either the complete old plan or the complete new one.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use tripweave_db::models::{Trip, TripRecord, TripStatus};
use tripweave_db::queries::trips::NewTrip;

use crate::plan::PlanDocument;

pub use memory::MemoryItineraryStore;
pub use postgres::PgItineraryStore;

/// Errors surfaced by an [`ItineraryStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("trip {0} not found")]
    NotFound(Uuid),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Persistence for trips and their day-by-day itineraries.
#[async_trait]
pub trait ItineraryStore: Send + Sync {
    /// Insert a trip with status `generating` and an empty itinerary.
    async fn create_trip(&self, new: &NewTrip<'_>) -> Result<Trip, StoreError>;

    /// A user's trips, newest first.
    async fn list_trips(&self, user_id: &str) -> Result<Vec<Trip>, StoreError>;

    /// A consistent snapshot of a trip and its whole itinerary.
    async fn get_trip(&self, trip_id: Uuid) -> Result<TripRecord, StoreError>;

    /// Replace the trip's entire itinerary with `plan` as one atomic swap.
    ///
    /// Returns the trip's new plan version.
    async fn replace_plan(&self, trip_id: Uuid, plan: &PlanDocument) -> Result<i32, StoreError>;

    /// Like [`replace_plan`](Self::replace_plan), but only while the trip's
    /// plan version still equals `expected_version`. The check and the swap
    /// happen under the same lock.
    ///
    /// Returns `Ok(None)` and writes nothing when the version has moved on.
    async fn replace_plan_if_version(
        &self,
        trip_id: Uuid,
        expected_version: i32,
        plan: &PlanDocument,
    ) -> Result<Option<i32>, StoreError>;

    async fn update_trip_budget(&self, trip_id: Uuid, amount: f64) -> Result<(), StoreError>;

    /// Record the outcome of itinerary generation.
    async fn set_trip_status(
        &self,
        trip_id: Uuid,
        status: TripStatus,
        detail: Option<&str>,
    ) -> Result<(), StoreError>;
}

// Compile-time assertion: the store is used as `Arc<dyn ItineraryStore>`.
const _: () = {
    fn _assert_object_safe(_: &dyn ItineraryStore) {}
};
