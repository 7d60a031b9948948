//! Provider trait and the message type exchanged with language-model backends.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A role-tagged conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }
}

/// A chat-completion backend. Given the full role-tagged history it returns
/// a single text completion.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn chat_with_history(
        &self,
        messages: &[ChatMessage],
        model: &str,
        temperature: f64,
    ) -> anyhow::Result<String>;

    /// Canonical provider id, used in logs and error messages.
    fn name(&self) -> &str;
}
