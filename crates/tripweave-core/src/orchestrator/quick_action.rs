//! Canned prompts behind the chat UI's quick-action buttons.

use std::fmt;
use std::str::FromStr;

/// A recognized quick-action key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuickAction {
    Weather,
    Budget,
    Optimize,
    Restaurants,
    Activities,
    Transport,
}

impl QuickAction {
    pub const ALL: [QuickAction; 6] = [
        Self::Weather,
        Self::Budget,
        Self::Optimize,
        Self::Restaurants,
        Self::Activities,
        Self::Transport,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::Weather => "weather",
            Self::Budget => "budget",
            Self::Optimize => "optimize",
            Self::Restaurants => "restaurants",
            Self::Activities => "activities",
            Self::Transport => "transport",
        }
    }

    /// The chat message sent on the user's behalf.
    pub fn message(self) -> &'static str {
        match self {
            Self::Weather => "What's the weather forecast for my trip?",
            Self::Budget => "Show me a breakdown of my trip budget",
            Self::Optimize => "Optimize my itinerary to reduce travel time",
            Self::Restaurants => "Recommend some restaurants for my trip",
            Self::Activities => "Suggest some activities I could add to my trip",
            Self::Transport => "What are the best transportation options for my trip?",
        }
    }
}

impl fmt::Display for QuickAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown quick action: {0}")]
pub struct UnknownQuickAction(pub String);

impl FromStr for QuickAction {
    type Err = UnknownQuickAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.key() == s)
            .ok_or_else(|| UnknownQuickAction(s.to_owned()))
    }
}

/// Message for an action key. Unrecognized keys pass through verbatim.
pub fn quick_action_message(key: &str) -> &str {
    match key.parse::<QuickAction>() {
        Ok(action) => action.message(),
        Err(_) => key,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_round_trip() {
        for action in QuickAction::ALL {
            assert_eq!(action.key().parse::<QuickAction>().unwrap(), action);
            assert_eq!(action.to_string(), action.key());
        }
    }

    #[test]
    fn budget_message_is_exact() {
        assert_eq!(
            quick_action_message("budget"),
            "Show me a breakdown of my trip budget"
        );
    }

    #[test]
    fn unknown_keys_pass_through() {
        assert_eq!(quick_action_message("visa requirements"), "visa requirements");
        assert_eq!(
            "Budget".parse::<QuickAction>(),
            Err(UnknownQuickAction("Budget".into()))
        );
    }
}
