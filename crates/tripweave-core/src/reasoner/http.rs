//! OpenAI-compatible chat-completions reasoner.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::prompt::{parse_reply, system_prompt};
use super::{MutationResult, PlanReasoner, ReasonerContext, ReasonerError};
use crate::session::Role;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Upstream error bodies are cut to this many characters before they reach
/// callers.
const MAX_ERROR_CHARS: usize = 512;

/// Connection settings for [`HttpReasoner`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReasonerConfig {
    /// Base URL up to and including the API version, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            model: DEFAULT_MODEL.to_owned(),
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

pub struct HttpReasoner {
    config: ReasonerConfig,
    http: Client,
}

impl HttpReasoner {
    pub fn new(config: ReasonerConfig) -> Result<Self, ReasonerError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ReasonerError::Network)?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &ReasonerConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn build_request_body(&self, message: &str, context: &ReasonerContext) -> serde_json::Value {
        let mut messages = vec![serde_json::json!({
            "role": "system",
            "content": system_prompt(context),
        })];

        for m in &context.conversation_history {
            messages.push(serde_json::json!({
                "role": m.role.to_string(),
                "content": m.content,
            }));
        }

        // The orchestrator records the user turn before calling us, so the
        // history usually ends with this message already.
        let already_last = context
            .conversation_history
            .last()
            .is_some_and(|m| m.role == Role::User && m.content == message);
        if !already_last {
            messages.push(serde_json::json!({"role": "user", "content": message}));
        }

        serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "response_format": {"type": "json_object"},
        })
    }
}

impl std::fmt::Debug for HttpReasoner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpReasoner")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .field("timeout", &self.config.timeout)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

fn first_content(response: CompletionResponse) -> Result<String, ReasonerError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| ReasonerError::InvalidResponse("completion has no message content".into()))
}

#[async_trait]
impl PlanReasoner for HttpReasoner {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn infer(
        &self,
        message: &str,
        context: &ReasonerContext,
    ) -> Result<MutationResult, ReasonerError> {
        let body = self.build_request_body(message, context);
        debug!(
            model = %self.config.model,
            history = context.conversation_history.len(),
            has_plan = context.current_plan.is_some(),
            "sending reasoner request"
        );

        let mut request = self.http.post(self.endpoint()).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), body = %body, "reasoner returned an error");
            return Err(ReasonerError::Api {
                status: status.as_u16(),
                message: error_excerpt(&body),
            });
        }

        let completion: CompletionResponse = response.json().await?;
        let content = first_content(completion)?;
        parse_reply(&content)
    }
}

fn error_excerpt(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_CHARS) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reasoner::ContextMessage;

    fn reasoner() -> HttpReasoner {
        HttpReasoner::new(ReasonerConfig {
            base_url: "http://localhost:9999/v1/".into(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        assert_eq!(reasoner().endpoint(), "http://localhost:9999/v1/chat/completions");
    }

    #[test]
    fn request_body_does_not_duplicate_recorded_user_turn() {
        let context = ReasonerContext {
            conversation_history: vec![
                ContextMessage {
                    role: Role::User,
                    content: "Hi".into(),
                },
                ContextMessage {
                    role: Role::Assistant,
                    content: "Hello!".into(),
                },
                ContextMessage {
                    role: Role::User,
                    content: "Make day 2 cheaper".into(),
                },
            ],
            ..Default::default()
        };
        let body = reasoner().build_request_body("Make day 2 cheaper", &context);
        let messages = body["messages"].as_array().unwrap();

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[2]["role"], "assistant");
        assert_eq!(messages[3]["content"], "Make day 2 cheaper");
        assert_eq!(body["model"], DEFAULT_MODEL);
        assert_eq!(body["response_format"]["type"], "json_object");
    }

    #[test]
    fn request_body_appends_message_missing_from_history() {
        let body = reasoner().build_request_body("Plan my trip", &ReasonerContext::default());
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[1]["content"], "Plan my trip");
    }

    #[test]
    fn first_content_reads_first_choice() {
        let response: CompletionResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"role": "assistant", "content": "{\"reply\":\"ok\"}"}}]}"#,
        )
        .unwrap();
        assert_eq!(first_content(response).unwrap(), r#"{"reply":"ok"}"#);

        let empty: CompletionResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(
            first_content(empty),
            Err(ReasonerError::InvalidResponse(_))
        ));
    }

    #[test]
    fn error_excerpt_caps_long_bodies() {
        assert_eq!(error_excerpt("rate limited"), "rate limited");

        let exact = "x".repeat(MAX_ERROR_CHARS);
        assert_eq!(error_excerpt(&exact), exact);

        // Multi-byte characters are never split.
        let long = "é".repeat(MAX_ERROR_CHARS + 100);
        let excerpt = error_excerpt(&long);
        assert!(excerpt.ends_with("..."));
        assert_eq!(excerpt.trim_end_matches('.').chars().count(), MAX_ERROR_CHARS);
    }

    #[test]
    fn debug_hides_api_key() {
        let r = HttpReasoner::new(ReasonerConfig {
            api_key: Some("sk-secret".into()),
            ..Default::default()
        })
        .unwrap();
        assert!(!format!("{r:?}").contains("sk-secret"));
        assert_eq!(r.name(), DEFAULT_MODEL);
    }
}
