//! Scripted providers for unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

use super::traits::{ChatMessage, Provider};

/// Replays queued replies, then echoes the last user message.
/// Every call's history is recorded for assertions.
#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn chat_with_history(
        &self,
        messages: &[ChatMessage],
        _model: &str,
        _temperature: f64,
    ) -> anyhow::Result<String> {
        self.calls.lock().push(messages.to_vec());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reply) = self.replies.lock().pop_front() {
            return Ok(reply);
        }
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.clone())
            .unwrap_or_default();
        Ok(format!("echo: {last_user}"))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Always fails, as an unreachable model service would.
#[derive(Default)]
pub struct FailingProvider;

#[async_trait]
impl Provider for FailingProvider {
    async fn chat_with_history(
        &self,
        _messages: &[ChatMessage],
        _model: &str,
        _temperature: f64,
    ) -> anyhow::Result<String> {
        anyhow::bail!("connection refused")
    }

    fn name(&self) -> &str {
        "failing"
    }
}
