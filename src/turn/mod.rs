//! Turn orchestration shared by the CLI loop and the HTTP gateway.

pub mod dispatcher;

pub use dispatcher::{TurnDispatcher, TurnOutcome};

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use crate::agent::{Agent, AgentSettings};
use crate::config::Config;
use crate::ethics::create_ethics_filter;
use crate::observability::Metrics;
use crate::providers::{create_provider, Provider};
use crate::sessions::{create_session_store, AgentFactory};
use crate::wellbeing::create_guard;

/// Factory: wire provider, session store, guard, and ethics filter from config.
pub fn create_turn_dispatcher(config: &Config, metrics: Arc<Metrics>) -> Result<TurnDispatcher> {
    let provider: Arc<dyn Provider> = Arc::from(create_provider(
        &config.default_provider,
        config.api_key.as_deref(),
        config.api_url.as_deref(),
        Duration::from_secs(config.provider.timeout_secs),
    )?);

    let settings = Arc::new(AgentSettings::from_config(config));
    let factory: AgentFactory = Arc::new(move || Agent::new(provider.clone(), settings.clone()));

    let sessions = create_session_store(&config.sessions, factory);
    let guard = create_guard(&config.wellbeing)?;
    let ethics = create_ethics_filter(&config.ethics);

    tracing::debug!(
        provider = %config.default_provider,
        model = %config.default_model,
        sessions = sessions.name(),
        ethics_rules = ethics.categories().len(),
        "Turn dispatcher ready"
    );

    Ok(TurnDispatcher::new(sessions, guard, ethics, metrics))
}
