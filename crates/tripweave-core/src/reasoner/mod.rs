//! The Plan Reasoner contract: natural language plus conversation and plan
//! context in, a reply and an optional replacement plan out.
//!
//! [`HttpReasoner`] talks to an OpenAI-compatible chat-completions endpoint.
//! Tests substitute scripted implementations of [`PlanReasoner`].

pub mod http;
pub mod prompt;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tripweave_db::models::Trip;

use crate::plan::PlanDocument;
use crate::session::{Message, Role};

pub use http::{HttpReasoner, ReasonerConfig};

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// What the reasoner wants done besides replying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    None,
    UpdatePlan,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::UpdatePlan => "update_plan",
        })
    }
}

/// The structured side effect of a reasoner turn. A new plan exists exactly
/// when the intent is `update_plan`.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanMutation {
    None,
    UpdatePlan {
        plan: PlanDocument,
        /// New total budget when the change constrains spending.
        budget: Option<f64>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MutationResult {
    pub reply_text: String,
    pub mutation: PlanMutation,
}

impl MutationResult {
    /// A reply with no plan change.
    pub fn reply(text: impl Into<String>) -> Self {
        Self {
            reply_text: text.into(),
            mutation: PlanMutation::None,
        }
    }

    /// A reply that replaces the whole plan.
    pub fn update(text: impl Into<String>, plan: PlanDocument) -> Self {
        Self {
            reply_text: text.into(),
            mutation: PlanMutation::UpdatePlan { plan, budget: None },
        }
    }

    pub fn with_budget(mut self, amount: f64) -> Self {
        if let PlanMutation::UpdatePlan { budget, .. } = &mut self.mutation {
            *budget = Some(amount);
        }
        self
    }

    pub fn intent(&self) -> Intent {
        match self.mutation {
            PlanMutation::None => Intent::None,
            PlanMutation::UpdatePlan { .. } => Intent::UpdatePlan,
        }
    }

    pub fn new_plan(&self) -> Option<&PlanDocument> {
        match &self.mutation {
            PlanMutation::None => None,
            PlanMutation::UpdatePlan { plan, .. } => Some(plan),
        }
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextMessage {
    pub role: Role,
    pub content: String,
}

impl From<&Message> for ContextMessage {
    fn from(m: &Message) -> Self {
        Self {
            role: m.role,
            content: m.content.clone(),
        }
    }
}

/// Trip facts the reasoner needs to plan sensibly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripSummary {
    pub destination: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
}

impl From<&Trip> for TripSummary {
    fn from(t: &Trip) -> Self {
        Self {
            destination: t.destination.clone(),
            start_date: t.start_date,
            end_date: t.end_date,
            budget: t.budget,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasonerContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trip_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trip: Option<TripSummary>,
    pub conversation_history: Vec<ContextMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_plan: Option<PlanDocument>,
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ReasonerError {
    #[error("reasoner did not answer within {0:?}")]
    Timeout(Duration),

    #[error("reasoner request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("reasoner API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("invalid reasoner response: {0}")]
    InvalidResponse(String),
}

impl ReasonerError {
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Network(e) => e.is_timeout(),
            _ => false,
        }
    }
}

#[async_trait]
pub trait PlanReasoner: Send + Sync {
    /// Short identifier used in logs (e.g. the model name).
    fn name(&self) -> &str;

    async fn infer(
        &self,
        message: &str,
        context: &ReasonerContext,
    ) -> Result<MutationResult, ReasonerError>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn PlanReasoner) {}
};
