//! Trip creation and per-user access.

use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use tripweave_db::models::Trip;
use tripweave_db::queries::trips::NewTrip;

use crate::generation::ItineraryGenerator;
use crate::plan::{PlanDocument, plan_from_records};
use crate::store::{ItineraryStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum TripError {
    #[error("invalid trip: {0}")]
    Validation(String),

    #[error("trip {0} not found")]
    NotFound(Uuid),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for TripError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => Self::NotFound(id),
            other => Self::Store(other),
        }
    }
}

/// Input for [`TripService::create_trip`].
#[derive(Debug, Clone)]
pub struct TripRequest {
    pub destination: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub budget: Option<f64>,
}

/// A trip together with its current itinerary.
#[derive(Debug, Clone, PartialEq)]
pub struct TripDetail {
    pub trip: Trip,
    pub plan: PlanDocument,
}

#[derive(Clone)]
pub struct TripService {
    store: Arc<dyn ItineraryStore>,
    generator: ItineraryGenerator,
}

impl TripService {
    pub fn new(store: Arc<dyn ItineraryStore>, generator: ItineraryGenerator) -> Self {
        Self { store, generator }
    }

    pub fn generator(&self) -> &ItineraryGenerator {
        &self.generator
    }

    /// Insert a trip in `generating` state and schedule its itinerary.
    pub async fn create_trip(&self, user_id: &str, req: &TripRequest) -> Result<Trip, TripError> {
        validate(user_id, req)?;

        let destination = req.destination.trim();
        let trip = self
            .store
            .create_trip(&NewTrip {
                user_id,
                destination,
                start_date: req.start_date,
                end_date: req.end_date,
                budget: req.budget,
            })
            .await?;

        tracing::info!(trip_id = %trip.id, user_id = %user_id, "created trip");
        self.generator.schedule(trip.clone());
        Ok(trip)
    }

    pub async fn list_trips(&self, user_id: &str) -> Result<Vec<Trip>, TripError> {
        Ok(self.store.list_trips(user_id).await?)
    }

    /// The trip and its plan, if it exists and belongs to `user_id`.
    /// Someone else's trip is reported as not found.
    pub async fn get_trip_for_user(
        &self,
        user_id: &str,
        trip_id: Uuid,
    ) -> Result<TripDetail, TripError> {
        let record = self.store.get_trip(trip_id).await?;
        if record.trip.user_id != user_id {
            return Err(TripError::NotFound(trip_id));
        }
        Ok(TripDetail {
            plan: plan_from_records(&record.days),
            trip: record.trip,
        })
    }
}

impl std::fmt::Debug for TripService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TripService")
            .field("generator", &self.generator)
            .finish_non_exhaustive()
    }
}

fn validate(user_id: &str, req: &TripRequest) -> Result<(), TripError> {
    if user_id.trim().is_empty() {
        return Err(TripError::Validation("user id is required".into()));
    }
    if req.destination.trim().is_empty() {
        return Err(TripError::Validation("destination must not be empty".into()));
    }
    if req.start_date > req.end_date {
        return Err(TripError::Validation(format!(
            "start date {} is after end date {}",
            req.start_date, req.end_date
        )));
    }
    match req.budget {
        Some(b) if !b.is_finite() || b < 0.0 => {
            Err(TripError::Validation(format!("invalid budget {b}")))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> TripRequest {
        TripRequest {
            destination: "Lisbon".into(),
            start_date: NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 5, 3).unwrap(),
            budget: Some(1500.0),
        }
    }

    #[test]
    fn accepts_well_formed_request() {
        assert!(validate("u1", &request()).is_ok());
        let same_day = TripRequest {
            end_date: request().start_date,
            ..request()
        };
        assert!(validate("u1", &same_day).is_ok());
    }

    #[test]
    fn rejects_blank_destination_and_user() {
        let blank = TripRequest {
            destination: "   ".into(),
            ..request()
        };
        assert!(matches!(validate("u1", &blank), Err(TripError::Validation(_))));
        assert!(matches!(validate("", &request()), Err(TripError::Validation(_))));
    }

    #[test]
    fn rejects_inverted_dates_and_negative_budget() {
        let inverted = TripRequest {
            start_date: request().end_date,
            end_date: request().start_date,
            ..request()
        };
        assert!(matches!(validate("u1", &inverted), Err(TripError::Validation(_))));

        let negative = TripRequest {
            budget: Some(-1.0),
            ..request()
        };
        assert!(matches!(validate("u1", &negative), Err(TripError::Validation(_))));
    }

    #[test]
    fn store_not_found_maps_to_trip_not_found() {
        let id = Uuid::new_v4();
        assert!(matches!(
            TripError::from(StoreError::NotFound(id)),
            TripError::NotFound(got) if got == id
        ));
    }

    #[test]
    fn debug_names_generator_without_store() {
        use crate::reasoner::{MutationResult, PlanReasoner, ReasonerContext, ReasonerError};
        use crate::store::MemoryItineraryStore;

        struct Silent;

        #[async_trait::async_trait]
        impl PlanReasoner for Silent {
            fn name(&self) -> &str {
                "silent"
            }

            async fn infer(
                &self,
                _message: &str,
                _context: &ReasonerContext,
            ) -> Result<MutationResult, ReasonerError> {
                Ok(MutationResult::reply(""))
            }
        }

        let store: Arc<dyn ItineraryStore> = Arc::new(MemoryItineraryStore::new());
        let generator = ItineraryGenerator::new(
            Arc::clone(&store),
            Arc::new(Silent),
            std::time::Duration::from_secs(1),
        );
        let rendered = format!("{:?}", TripService::new(store, generator));
        assert!(rendered.starts_with("TripService"), "{rendered}");
        assert!(rendered.contains("silent"), "{rendered}");
    }
}
