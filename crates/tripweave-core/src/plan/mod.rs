//! Itinerary documents and their mapping to persisted rows.

pub mod document;
pub mod mapping;

pub use document::{
    Activity, DayPlan, Location, Meal, PlanDocument, PlanValidationError, Transport, Waypoint,
};
pub use mapping::{materialize_records, plan_from_records, records_from_plan};
