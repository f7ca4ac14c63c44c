//! Core logic for tripweave: the conversational plan-mutation orchestrator and
//! the pieces it coordinates.
//!
//! ```text
//! caller -> PlanOrchestrator::handle(user, message, trip?)
//!              |-- ConversationManager   (append user turn, history)
//!              |-- ItineraryStore        (current plan as context)
//!              |-- PlanReasoner          (reply + optional new plan)
//!              |-- ItineraryStore        (atomic plan replace)
//!              `-- ConversationManager   (append assistant turn)
//! ```

pub mod generation;
pub mod orchestrator;
pub mod plan;
pub mod reasoner;
pub mod session;
pub mod store;
pub mod trips;
