//! Conversation turns exchanged during a call

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who spoke a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    /// The person on the phone
    Caller,
    /// The voice assistant
    Assistant,
}

impl TurnRole {
    /// Label used when formatting history for the LLM prompt
    pub fn prompt_label(&self) -> &'static str {
        match self {
            TurnRole::Caller => "Customer",
            TurnRole::Assistant => "You",
        }
    }
}

/// One utterance in the conversation history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Speaker
    pub role: TurnRole,

    /// What was said
    pub text: String,

    /// When the turn was recorded
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// Create a turn timestamped now
    pub fn new(role: TurnRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    /// Caller turn timestamped now
    pub fn caller(text: impl Into<String>) -> Self {
        Self::new(TurnRole::Caller, text)
    }

    /// Assistant turn timestamped now
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(TurnRole::Assistant, text)
    }
}

/// Format history as prompt context, one line per turn
pub fn format_history(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|t| format!("{}: {}", t.role.prompt_label(), t.text))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_history() {
        let turns = vec![
            Turn::caller("hello"),
            Turn::assistant("Hi! How can I help?"),
        ];

        let formatted = format_history(&turns);
        assert_eq!(formatted, "Customer: hello\nYou: Hi! How can I help?");
    }

    #[test]
    fn test_format_history_empty() {
        assert_eq!(format_history(&[]), "");
    }
}
