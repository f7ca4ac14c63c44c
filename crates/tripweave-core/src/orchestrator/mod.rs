//! Plan Mutation Orchestrator: one chat turn, end to end.
//!
//! A turn records the user's message, gathers the trip's current plan as
//! context, asks the reasoner for a reply, records the reply and, when the
//! reasoner asks for it, replaces the trip's whole persisted plan.
//!
//! Nothing is retried here. A reasoner failure leaves the user's message in
//! the session without an assistant reply. A failed plan write is reported
//! as [`ChatError::StoreWrite`] even though the reply was already recorded.

pub mod quick_action;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

use crate::plan::{PlanDocument, plan_from_records};
use crate::reasoner::{
    ContextMessage, Intent, MutationResult, PlanMutation, PlanReasoner, ReasonerContext,
    ReasonerError, TripSummary,
};
use crate::session::{ConversationManager, Message, Role, SessionHandle};
use crate::store::{ItineraryStore, StoreError};

pub use quick_action::{QuickAction, UnknownQuickAction, quick_action_message};

/// Prefix for natural-language modification requests.
pub const MODIFY_PREFIX: &str = "Please modify my trip: ";

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Upper bound on a single reasoner call.
    pub reasoner_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            reasoner_timeout: Duration::from_secs(60),
        }
    }
}

/// What a chat turn returns to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub reply_text: String,
    pub action: Intent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_plan: Option<PlanDocument>,
}

impl From<MutationResult> for ChatReply {
    fn from(result: MutationResult) -> Self {
        match result.mutation {
            PlanMutation::None => Self {
                reply_text: result.reply_text,
                action: Intent::None,
                updated_plan: None,
            },
            PlanMutation::UpdatePlan { plan, .. } => Self {
                reply_text: result.reply_text,
                action: Intent::UpdatePlan,
                updated_plan: Some(plan),
            },
        }
    }
}

/// Result of [`PlanOrchestrator::modify_plan`].
#[derive(Debug, Clone, PartialEq)]
pub enum ModifyOutcome {
    /// The plan was replaced; `plan` is what the store now holds.
    Modified { reply_text: String, plan: PlanDocument },
    /// The reasoner answered without changing the plan.
    Unchanged { reply_text: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("trip {0} not found")]
    NotFound(Uuid),

    #[error(transparent)]
    Reasoner(#[from] ReasonerError),

    /// The reply was produced and recorded, but persisting the plan failed.
    #[error("failed to save updated plan for trip {trip_id}: {source}")]
    StoreWrite {
        trip_id: Uuid,
        reply_text: String,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Store(StoreError),
}

impl ChatError {
    /// The assistant reply that was recorded before the failure, if any.
    pub fn reply_text(&self) -> Option<&str> {
        match self {
            Self::StoreWrite { reply_text, .. } => Some(reply_text),
            _ => None,
        }
    }
}

/// Coordinates conversation state, the itinerary store and the reasoner.
#[derive(Clone)]
pub struct PlanOrchestrator {
    conversations: ConversationManager,
    store: Arc<dyn ItineraryStore>,
    reasoner: Arc<dyn PlanReasoner>,
    config: OrchestratorConfig,
}

impl PlanOrchestrator {
    pub fn new(store: Arc<dyn ItineraryStore>, reasoner: Arc<dyn PlanReasoner>) -> Self {
        Self {
            conversations: ConversationManager::in_memory(),
            store,
            reasoner,
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_conversations(mut self, conversations: ConversationManager) -> Self {
        self.conversations = conversations;
        self
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn conversations(&self) -> &ConversationManager {
        &self.conversations
    }

    pub fn store(&self) -> &Arc<dyn ItineraryStore> {
        &self.store
    }

    /// Process one chat message.
    pub async fn handle(
        &self,
        user_id: &str,
        message: &str,
        trip_id: Option<Uuid>,
    ) -> Result<ChatReply, ChatError> {
        require_user(user_id)?;
        if message.trim().is_empty() {
            return Err(ChatError::Validation("message must not be empty".into()));
        }

        let session = self.conversations.get_or_create(user_id, trip_id);
        self.conversations.append(&session, Role::User, message);

        let context = self.build_context(&session, trip_id).await;

        let result = match self.infer(message, &context).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(
                    user_id = %user_id,
                    trip_id = ?trip_id,
                    reasoner = self.reasoner.name(),
                    error = %e,
                    "reasoner call failed"
                );
                return Err(e.into());
            }
        };

        self.conversations
            .append(&session, Role::Assistant, result.reply_text.as_str());

        if let (Some(trip_id), PlanMutation::UpdatePlan { plan, budget }) =
            (trip_id, &result.mutation)
        {
            if let Err(source) = self.persist(trip_id, plan, *budget).await {
                tracing::error!(trip_id = %trip_id, error = %source, "plan write failed");
                return Err(ChatError::StoreWrite {
                    trip_id,
                    reply_text: result.reply_text,
                    source,
                });
            }
        }

        Ok(ChatReply::from(result))
    }

    /// Send the canned message for a quick-action key. Unknown keys are sent
    /// as the message itself.
    pub async fn handle_quick_action(
        &self,
        user_id: &str,
        action_key: &str,
        trip_id: Option<Uuid>,
    ) -> Result<ChatReply, ChatError> {
        self.handle(user_id, quick_action_message(action_key), trip_id)
            .await
    }

    /// Ask for a change to a trip's plan in plain language.
    ///
    /// When the plan changes, the returned plan is re-read from the store so
    /// it reflects exactly what was persisted.
    pub async fn modify_plan(
        &self,
        user_id: &str,
        trip_id: Uuid,
        modification: &str,
    ) -> Result<ModifyOutcome, ChatError> {
        if modification.trim().is_empty() {
            return Err(ChatError::Validation(
                "modification must not be empty".into(),
            ));
        }

        let message = format!("{MODIFY_PREFIX}{modification}");
        let reply = self.handle(user_id, &message, Some(trip_id)).await?;

        if reply.action != Intent::UpdatePlan {
            return Ok(ModifyOutcome::Unchanged {
                reply_text: reply.reply_text,
            });
        }

        let record = self.store.get_trip(trip_id).await.map_err(|e| match e {
            StoreError::NotFound(id) => ChatError::NotFound(id),
            other => ChatError::Store(other),
        })?;

        Ok(ModifyOutcome::Modified {
            reply_text: reply.reply_text,
            plan: plan_from_records(&record.days),
        })
    }

    /// The session's messages, oldest first. Reading never creates a session.
    pub fn history(&self, user_id: &str, trip_id: Option<Uuid>) -> Result<Vec<Message>, ChatError> {
        require_user(user_id)?;
        Ok(self
            .conversations
            .get(user_id, trip_id)
            .map(|session| self.conversations.history(&session))
            .unwrap_or_default())
    }

    pub fn clear_history(&self, user_id: &str, trip_id: Option<Uuid>) -> Result<(), ChatError> {
        require_user(user_id)?;
        self.conversations.clear(user_id, trip_id);
        Ok(())
    }

    async fn build_context(&self, session: &SessionHandle, trip_id: Option<Uuid>) -> ReasonerContext {
        let conversation_history = self
            .conversations
            .history(session)
            .iter()
            .map(ContextMessage::from)
            .collect();

        let mut context = ReasonerContext {
            trip_id,
            conversation_history,
            ..Default::default()
        };

        if let Some(trip_id) = trip_id {
            match self.store.get_trip(trip_id).await {
                Ok(record) => {
                    context.trip = Some(TripSummary::from(&record.trip));
                    context.current_plan = Some(plan_from_records(&record.days));
                }
                Err(e) => {
                    tracing::warn!(
                        trip_id = %trip_id,
                        error = %e,
                        "could not load current plan, continuing without it"
                    );
                }
            }
        }

        context
    }

    async fn infer(
        &self,
        message: &str,
        context: &ReasonerContext,
    ) -> Result<MutationResult, ReasonerError> {
        let limit = self.config.reasoner_timeout;
        match tokio::time::timeout(limit, self.reasoner.infer(message, context)).await {
            Ok(result) => result,
            Err(_) => Err(ReasonerError::Timeout(limit)),
        }
    }

    /// Write the plan, then the budget if one came with it.
    ///
    /// The two are separate store calls, so the budget update is not atomic
    /// with the plan swap. A failed budget write leaves the new plan in place
    /// with the old budget.
    async fn persist(
        &self,
        trip_id: Uuid,
        plan: &PlanDocument,
        budget: Option<f64>,
    ) -> Result<(), StoreError> {
        let version = self.store.replace_plan(trip_id, plan).await?;
        if let Some(amount) = budget {
            self.store.update_trip_budget(trip_id, amount).await?;
        }
        tracing::info!(
            trip_id = %trip_id,
            plan_version = version,
            days = plan.days.len(),
            budget = ?budget,
            "applied plan update"
        );
        Ok(())
    }
}

impl std::fmt::Debug for PlanOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanOrchestrator")
            .field("conversations", &self.conversations)
            .field("reasoner", &self.reasoner.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn require_user(user_id: &str) -> Result<(), ChatError> {
    if user_id.trim().is_empty() {
        return Err(ChatError::Validation("user id is required".into()));
    }
    Ok(())
}
