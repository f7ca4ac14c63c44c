//! Background itinerary generation for newly created trips.
//!
//! A trip is created with status `generating`. [`ItineraryGenerator::schedule`]
//! spawns a tracked task that asks the reasoner for a full plan, stores it and
//! moves the trip to `completed`. Every failure, including shutdown
//! cancellation, moves the trip to `failed` with a `status_detail`.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use tripweave_db::models::{Trip, TripStatus};

use crate::plan::{PlanDocument, PlanValidationError};
use crate::reasoner::{PlanMutation, PlanReasoner, ReasonerContext, ReasonerError, TripSummary};
use crate::store::{ItineraryStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error(transparent)]
    Reasoner(#[from] ReasonerError),

    #[error("reasoner replied without a plan")]
    NoPlan,

    #[error("reasoner produced an invalid plan: {0}")]
    InvalidPlan(#[from] PlanValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("generation cancelled by shutdown")]
    Cancelled,
}

/// The request sent to the reasoner for a fresh itinerary.
pub fn generation_message(trip: &Trip) -> String {
    let days = (trip.end_date - trip.start_date).num_days() + 1;
    let mut message = format!(
        "Create a complete {days}-day itinerary for my trip to {} from {} to {}.",
        trip.destination, trip.start_date, trip.end_date
    );
    if let Some(budget) = trip.budget {
        message.push_str(&format!(" Keep the total cost within {budget:.2}."));
    }
    message.push_str(" Include activities, meals and transportation for every day.");
    message
}

/// How a successful generation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generated {
    /// The generated plan was stored at this version.
    Stored { plan_version: i32 },
    /// The plan was replaced (e.g. from chat) while generation ran; the
    /// generated plan was discarded.
    Superseded,
}

/// Ask the reasoner for a plan for `trip` and store it, unless the trip's
/// plan changed since `trip` was read. Does not touch the trip's status.
pub async fn generate_itinerary(
    store: &dyn ItineraryStore,
    reasoner: &dyn PlanReasoner,
    trip: &Trip,
    timeout: Duration,
) -> Result<Generated, GenerationError> {
    let context = ReasonerContext {
        trip_id: Some(trip.id),
        trip: Some(TripSummary::from(trip)),
        conversation_history: Vec::new(),
        current_plan: Some(PlanDocument::default()),
    };
    let message = generation_message(trip);

    let result = tokio::time::timeout(timeout, reasoner.infer(&message, &context))
        .await
        .map_err(|_| ReasonerError::Timeout(timeout))??;

    let PlanMutation::UpdatePlan { plan, budget } = result.mutation else {
        return Err(GenerationError::NoPlan);
    };
    plan.validate()?;

    let Some(version) = store
        .replace_plan_if_version(trip.id, trip.plan_version, &plan)
        .await?
    else {
        return Ok(Generated::Superseded);
    };
    if let Some(amount) = budget {
        store.update_trip_budget(trip.id, amount).await?;
    }
    Ok(Generated::Stored {
        plan_version: version,
    })
}

/// Runs generation tasks in the background and tracks them for shutdown.
#[derive(Clone)]
pub struct ItineraryGenerator {
    store: Arc<dyn ItineraryStore>,
    reasoner: Arc<dyn PlanReasoner>,
    timeout: Duration,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl ItineraryGenerator {
    pub fn new(
        store: Arc<dyn ItineraryStore>,
        reasoner: Arc<dyn PlanReasoner>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            reasoner,
            timeout,
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Number of generation tasks still running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Start generating an itinerary for `trip` without waiting for it.
    pub fn schedule(&self, trip: Trip) {
        let store = Arc::clone(&self.store);
        let reasoner = Arc::clone(&self.reasoner);
        let timeout = self.timeout;
        let cancel = self.cancel.clone();

        tracing::info!(trip_id = %trip.id, destination = %trip.destination, "scheduling itinerary generation");

        self.tracker.spawn(async move {
            let outcome = tokio::select! {
                r = generate_itinerary(store.as_ref(), reasoner.as_ref(), &trip, timeout) => r,
                _ = cancel.cancelled() => Err(GenerationError::Cancelled),
            };
            record_outcome(store.as_ref(), trip.id, outcome).await;
        });
    }

    /// Wait for running tasks to finish.
    pub async fn wait(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Cancel running tasks and wait until each has recorded its outcome.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

impl std::fmt::Debug for ItineraryGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItineraryGenerator")
            .field("reasoner", &self.reasoner.name())
            .field("timeout", &self.timeout)
            .field("in_flight", &self.tracker.len())
            .finish_non_exhaustive()
    }
}

async fn record_outcome(
    store: &dyn ItineraryStore,
    trip_id: Uuid,
    outcome: Result<Generated, GenerationError>,
) {
    let (status, detail) = match &outcome {
        Ok(Generated::Stored { plan_version }) => {
            tracing::info!(trip_id = %trip_id, plan_version, "itinerary generated");
            (TripStatus::Completed, None)
        }
        Ok(Generated::Superseded) => {
            tracing::info!(trip_id = %trip_id, "plan already replaced, keeping it over the generated one");
            (TripStatus::Completed, None)
        }
        Err(e) => {
            tracing::warn!(trip_id = %trip_id, error = %e, "itinerary generation failed");
            (TripStatus::Failed, Some(e.to_string()))
        }
    };

    if let Err(e) = store
        .set_trip_status(trip_id, status, detail.as_deref())
        .await
    {
        tracing::error!(trip_id = %trip_id, status = %status, error = %e, "could not record generation status");
    }
}
