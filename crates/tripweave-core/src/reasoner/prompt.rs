//! Prompt construction and reply parsing for chat-completion reasoners.
//!
//! Pure logic, no I/O. The reply contract is a single JSON object:
//!
//! ```json
//! {"reply": "...", "action": "none" | "update_plan", "updatedPlan": [...], "budget": 1200}
//! ```

use serde::Deserialize;

use super::{MutationResult, ReasonerContext, ReasonerError};
use crate::plan::PlanDocument;

const SYSTEM_PROMPT: &str = r#"You are a travel planning assistant. You help the user refine a day-by-day trip itinerary.

Always answer with a single JSON object and nothing else:
{
  "reply": "<what you say to the user>",
  "action": "none" or "update_plan",
  "updatedPlan": <full itinerary, only when action is "update_plan">,
  "budget": <new total budget as a number, only when the user changed it>
}

Rules:
- Use "update_plan" only when the user asks to change the itinerary. The
  updatedPlan must be the COMPLETE itinerary: every day, including days that
  did not change. It replaces the stored plan wholesale.
- Each day is {"date": "YYYY-MM-DD", "activities": [...], "meals": [...],
  "transportation": [...], "estimatedCost": number}.
- Activity: {"name", "description", "location": {"lat", "lon"},
  "duration" (minutes), "cost", "category", "startTime", "endTime"}.
- Meal: {"name", "type", "location": {"lat", "lon"}, "cost", "cuisine", "time"}.
- Transport: {"mode", "from": {"name", "location"?}, "to": {"name", "location"?},
  "duration" (minutes), "cost"}.
- Costs are non-negative numbers in the trip's currency. Dates must be in
  increasing order.
- For questions (weather, budget breakdowns, recommendations) answer in
  "reply" and use "none"."#;

/// Build the system prompt, appending trip facts and the current plan.
pub fn system_prompt(context: &ReasonerContext) -> String {
    let mut prompt = String::from(SYSTEM_PROMPT);

    if let Some(trip) = &context.trip {
        prompt.push_str(&format!(
            "\n\n## Trip\nDestination: {}\nDates: {} to {}",
            trip.destination, trip.start_date, trip.end_date
        ));
        if let Some(budget) = trip.budget {
            prompt.push_str(&format!("\nBudget: {budget:.2}"));
        }
    }

    match &context.current_plan {
        Some(plan) if !plan.is_empty() => {
            // Serializing plain data structures cannot fail.
            let json = serde_json::to_string(plan).unwrap_or_default();
            prompt.push_str("\n\n## Current itinerary\n");
            prompt.push_str(&json);
            prompt.push_str(&format!(
                "\nEstimated total: {:.2}",
                plan.total_estimated_cost()
            ));
        }
        Some(_) => prompt.push_str("\n\n## Current itinerary\n(empty)"),
        None if context.trip_id.is_some() => {
            prompt.push_str("\n\n## Current itinerary\n(unavailable; do not update the plan)")
        }
        None => {}
    }

    prompt
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReply {
    reply: String,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    updated_plan: Option<PlanDocument>,
    #[serde(default)]
    budget: Option<f64>,
}

/// Parse the model's message content into a [`MutationResult`].
///
/// Accepts content wrapped in a Markdown code fence. Rejects unknown
/// actions, `update_plan` without a plan, plans that fail validation and
/// non-positive budgets.
pub fn parse_reply(content: &str) -> Result<MutationResult, ReasonerError> {
    let json = strip_code_fence(content);
    let raw: RawReply = serde_json::from_str(json)
        .map_err(|e| ReasonerError::InvalidResponse(format!("reply is not valid JSON: {e}")))?;

    match raw.action.as_deref().unwrap_or("none") {
        "none" => {
            if raw.updated_plan.is_some() {
                tracing::warn!("reasoner sent a plan with action \"none\"; ignoring it");
            }
            Ok(MutationResult::reply(raw.reply))
        }
        "update_plan" => {
            let plan = raw.updated_plan.ok_or_else(|| {
                ReasonerError::InvalidResponse("action update_plan without updatedPlan".into())
            })?;
            plan.validate()
                .map_err(|e| ReasonerError::InvalidResponse(format!("invalid plan: {e}")))?;

            let result = MutationResult::update(raw.reply, plan);
            match raw.budget {
                Some(b) if b.is_finite() && b > 0.0 => Ok(result.with_budget(b)),
                Some(b) => Err(ReasonerError::InvalidResponse(format!(
                    "invalid budget {b}"
                ))),
                None => Ok(result),
            }
        }
        other => Err(ReasonerError::InvalidResponse(format!(
            "unknown action {other:?}"
        ))),
    }
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag on the opening fence line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
