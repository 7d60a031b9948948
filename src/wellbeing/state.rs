//! Per-conversation temporal record evaluated by the wellbeing guard.

use chrono::{DateTime, Duration, Local};
use serde::{Deserialize, Serialize};

/// Temporal bookkeeping for a single conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionState {
    pub session_id: String,
    pub started_at: DateTime<Local>,
    pub last_message_at: DateTime<Local>,
    pub messages_count: u32,
    /// Set by the guard whenever it suggests a screen break.
    pub last_break_suggested_at: Option<DateTime<Local>>,
}

impl SessionState {
    pub fn new(session_id: impl Into<String>, now: DateTime<Local>) -> Self {
        Self {
            session_id: session_id.into(),
            started_at: now,
            last_message_at: now,
            messages_count: 0,
            last_break_suggested_at: None,
        }
    }

    /// Count an incoming user message.
    pub fn record_message(&mut self, now: DateTime<Local>) {
        self.messages_count = self.messages_count.saturating_add(1);
        self.last_message_at = now;
    }

    pub fn elapsed(&self, now: DateTime<Local>) -> Duration {
        now - self.started_at
    }

    /// Reference point for the next screen-break suggestion.
    pub fn break_reference(&self) -> DateTime<Local> {
        self.last_break_suggested_at.unwrap_or(self.started_at)
    }
}
