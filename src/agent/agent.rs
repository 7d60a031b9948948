use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::{self, PdaError};
use crate::providers::{ChatMessage, Provider};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a PDA-aligned assistant. Avoid coercion, respect \
user sovereignty, and de-escalate conflict.";

/// Replies containing this (case-insensitive) get [`COERCION_PREFIX`].
pub const COERCION_TRIGGER: &str = "threaten";
pub const COERCION_PREFIX: &str = "Rewriting to avoid coercion: ";

/// Per-agent knobs shared by every session.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSettings {
    pub model: String,
    pub temperature: f64,
    pub system_prompt: String,
    /// Upper bound on a single model call.
    pub timeout: Duration,
    /// Non-system messages kept in history. `0` keeps everything.
    pub max_history_messages: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            model: "mistral".into(),
            temperature: 0.7,
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            timeout: Duration::from_secs(120),
            max_history_messages: 50,
        }
    }
}

impl AgentSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.default_model.clone(),
            temperature: config.default_temperature,
            system_prompt: config.agent.system_prompt.clone(),
            timeout: Duration::from_secs(config.provider.timeout_secs),
            max_history_messages: config.agent.max_history_messages,
        }
    }
}

/// Conversation-holding agent. One instance per session.
pub struct Agent {
    provider: Arc<dyn Provider>,
    settings: Arc<AgentSettings>,
    history: Vec<ChatMessage>,
}

impl Agent {
    pub fn new(provider: Arc<dyn Provider>, settings: Arc<AgentSettings>) -> Self {
        let history = vec![ChatMessage::system(settings.system_prompt.clone())];
        Self {
            provider,
            settings,
            history,
        }
    }

    /// System prompt followed by every retained turn, oldest first.
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    /// Send one user turn through the provider and record both sides.
    ///
    /// Both turns are committed only once the model answers, so a failed,
    /// timed-out or cancelled call leaves history alternating.
    pub async fn step(&mut self, user_message: &str) -> error::Result<String> {
        let user = ChatMessage::user(user_message);
        let mut request = Vec::with_capacity(self.history.len() + 1);
        request.extend_from_slice(&self.history);
        request.push(user.clone());

        let call = self.provider.chat_with_history(
            &request,
            &self.settings.model,
            self.settings.temperature,
        );
        let answer = match tokio::time::timeout(self.settings.timeout, call).await {
            Ok(Ok(answer)) => answer,
            Ok(Err(e)) => {
                tracing::warn!(provider = self.provider.name(), error = %e, "Model call failed");
                return Err(PdaError::ModelUnavailable(e.to_string()));
            }
            Err(_) => {
                tracing::warn!(
                    provider = self.provider.name(),
                    timeout_secs = self.settings.timeout.as_secs(),
                    "Model call timed out"
                );
                return Err(PdaError::ModelUnavailable(format!(
                    "{} did not answer within {:?}",
                    self.provider.name(),
                    self.settings.timeout
                )));
            }
        };

        let answer = soften_coercion(answer);
        self.history.push(user);
        self.history.push(ChatMessage::assistant(answer.clone()));
        self.trim_history();
        Ok(answer)
    }

    /// Drop the oldest turns past the cap. The cut is rounded up to a whole
    /// user/assistant pair so history always resumes on a user turn.
    fn trim_history(&mut self) {
        let max = self.settings.max_history_messages;
        let turns = self.history.len().saturating_sub(1);
        if max == 0 || turns <= max {
            return;
        }
        let cut = (turns - max).next_multiple_of(2).min(turns);
        self.history.drain(1..=cut);
    }
}

/// Prefix replies that use coercive language.
pub fn soften_coercion(answer: String) -> String {
    if answer.to_lowercase().contains(COERCION_TRIGGER) {
        format!("{COERCION_PREFIX}{answer}")
    } else {
        answer
    }
}
