//! Background itinerary generation lifecycle: generating -> completed/failed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use tokio::sync::Notify;

use tripweave_core::generation::ItineraryGenerator;
use tripweave_core::orchestrator::PlanOrchestrator;
use tripweave_core::plan::{DayPlan, PlanDocument, plan_from_records};
use tripweave_core::reasoner::{
    MutationResult, PlanReasoner, ReasonerContext, ReasonerError,
};
use tripweave_core::store::{ItineraryStore, MemoryItineraryStore};
use tripweave_core::trips::{TripRequest, TripService};
use tripweave_db::models::{Trip, TripStatus};
use tripweave_db::queries::trips::NewTrip;
use tripweave_test_utils::date;

/// Answers every request with the same canned result.
struct FixedReasoner(fn() -> Result<MutationResult, ReasonerError>);

#[async_trait]
impl PlanReasoner for FixedReasoner {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn infer(
        &self,
        _message: &str,
        context: &ReasonerContext,
    ) -> Result<MutationResult, ReasonerError> {
        assert!(context.trip.is_some(), "generation must pass trip facts");
        (self.0)()
    }
}

struct StalledReasoner;

#[async_trait]
impl PlanReasoner for StalledReasoner {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn infer(
        &self,
        _message: &str,
        _context: &ReasonerContext,
    ) -> Result<MutationResult, ReasonerError> {
        std::future::pending().await
    }
}

/// Holds generation requests until released; answers chat immediately.
struct GatedReasoner {
    release: Notify,
}

#[async_trait]
impl PlanReasoner for GatedReasoner {
    fn name(&self) -> &str {
        "gated"
    }

    async fn infer(
        &self,
        message: &str,
        _context: &ReasonerContext,
    ) -> Result<MutationResult, ReasonerError> {
        if message.starts_with("Create a complete") {
            self.release.notified().await;
            return Ok(MutationResult::update("Generated", priced(100.0)));
        }
        Ok(MutationResult::update("Updated", priced(222.0)))
    }
}

fn priced(first_day: f64) -> PlanDocument {
    PlanDocument::new(vec![
        DayPlan {
            date: date(2026, 9, 1),
            activities: vec![],
            meals: vec![],
            transportation: vec![],
            estimated_cost: first_day,
        },
        DayPlan {
            date: date(2026, 9, 2),
            activities: vec![],
            meals: vec![],
            transportation: vec![],
            estimated_cost: 120.0,
        },
    ])
}

fn two_days() -> PlanDocument {
    priced(100.0)
}

async fn generating_trip(store: &MemoryItineraryStore) -> Trip {
    store
        .create_trip(&NewTrip {
            user_id: "u1",
            destination: "Madeira",
            start_date: date(2026, 9, 1),
            end_date: date(2026, 9, 2),
            budget: None,
        })
        .await
        .unwrap()
}

async fn run(
    reasoner: Arc<dyn PlanReasoner>,
    timeout: Duration,
) -> (Arc<MemoryItineraryStore>, Trip) {
    let store = Arc::new(MemoryItineraryStore::new());
    let trip = generating_trip(&store).await;
    assert_eq!(trip.status, TripStatus::Generating);

    let generator = ItineraryGenerator::new(store.clone(), reasoner, timeout);
    generator.schedule(trip.clone());
    generator.wait().await;
    assert_eq!(generator.in_flight(), 0);

    (store, trip)
}

#[tokio::test]
async fn successful_generation_stores_plan_and_completes() {
    let reasoner = Arc::new(FixedReasoner(|| {
        Ok(MutationResult::update("Here you go", two_days()).with_budget(220.0))
    }));
    let (store, trip) = run(reasoner, Duration::from_secs(5)).await;

    let record = store.get_trip(trip.id).await.unwrap();
    assert_eq!(record.trip.status, TripStatus::Completed);
    assert!(record.trip.status_detail.is_none());
    assert_eq!(record.trip.plan_version, 1);
    assert_eq!(record.trip.budget, Some(220.0));
    assert_eq!(plan_from_records(&record.days), two_days());
}

#[tokio::test]
async fn reply_without_plan_fails_trip() {
    let reasoner = Arc::new(FixedReasoner(|| Ok(MutationResult::reply("Sorry"))));
    let (store, trip) = run(reasoner, Duration::from_secs(5)).await;

    let record = store.get_trip(trip.id).await.unwrap();
    assert_eq!(record.trip.status, TripStatus::Failed);
    assert_eq!(
        record.trip.status_detail.as_deref(),
        Some("reasoner replied without a plan")
    );
    assert!(record.days.is_empty());
}

#[tokio::test]
async fn invalid_plan_is_not_stored() {
    let reasoner = Arc::new(FixedReasoner(|| {
        let mut plan = two_days();
        plan.days.swap(0, 1);
        Ok(MutationResult::update("Backwards", plan))
    }));
    let (store, trip) = run(reasoner, Duration::from_secs(5)).await;

    let record = store.get_trip(trip.id).await.unwrap();
    assert_eq!(record.trip.status, TripStatus::Failed);
    assert_eq!(record.trip.plan_version, 0);
    assert!(record.days.is_empty());
}

#[tokio::test]
async fn reasoner_timeout_fails_trip() {
    let (store, trip) = run(Arc::new(StalledReasoner), Duration::from_millis(50)).await;

    let record = store.get_trip(trip.id).await.unwrap();
    assert_eq!(record.trip.status, TripStatus::Failed);
    let detail = record.trip.status_detail.unwrap_or_default();
    assert!(detail.contains("did not answer"), "detail was {detail:?}");
}

#[tokio::test]
async fn shutdown_cancels_pending_generation() {
    let store = Arc::new(MemoryItineraryStore::new());
    let trip = generating_trip(&store).await;

    let generator = ItineraryGenerator::new(
        store.clone(),
        Arc::new(StalledReasoner),
        Duration::from_secs(3600),
    );
    generator.schedule(trip.clone());
    assert_eq!(generator.in_flight(), 1);

    generator.shutdown().await;

    let record = store.get_trip(trip.id).await.unwrap();
    assert_eq!(record.trip.status, TripStatus::Failed);
    assert_eq!(
        record.trip.status_detail.as_deref(),
        Some("generation cancelled by shutdown")
    );
}

#[tokio::test]
async fn chat_update_during_generation_is_kept() {
    let store = Arc::new(MemoryItineraryStore::new());
    let reasoner = Arc::new(GatedReasoner {
        release: Notify::new(),
    });
    let generator = ItineraryGenerator::new(
        store.clone(),
        reasoner.clone(),
        Duration::from_secs(5),
    );
    let trips = TripService::new(store.clone(), generator.clone());
    let orch = PlanOrchestrator::new(store.clone(), reasoner.clone());

    let trip = trips
        .create_trip(
            "u1",
            &TripRequest {
                destination: "Madeira".into(),
                start_date: date(2026, 9, 1),
                end_date: date(2026, 9, 2),
                budget: None,
            },
        )
        .await
        .unwrap();

    orch.handle("u1", "make it pricier", Some(trip.id))
        .await
        .unwrap();

    reasoner.release.notify_one();
    generator.wait().await;

    let record = store.get_trip(trip.id).await.unwrap();
    assert_eq!(record.trip.status, TripStatus::Completed);
    assert_eq!(record.trip.plan_version, 1);
    assert_eq!(plan_from_records(&record.days), priced(222.0));
}
