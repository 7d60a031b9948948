//! OpenAI-compatible HTTP gateway.
//!
//! Every chat request is a turn on the shared [`TurnDispatcher`], so HTTP
//! clients get the same wellbeing guard and ethics annotations as the CLI.

pub mod api;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use crate::config::{Config, GatewayConfig, SessionsConfig};
use crate::observability::Metrics;
use crate::sessions::SessionStore;
use crate::turn::{create_turn_dispatcher, TurnDispatcher};

/// Shared state for all axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<TurnDispatcher>,
    /// Reported as `model` in every response, whatever the client asked for.
    pub model_id: Arc<str>,
}

impl AppState {
    pub fn new(dispatcher: Arc<TurnDispatcher>, model_id: &str) -> Self {
        Self {
            dispatcher,
            model_id: Arc::from(model_id),
        }
    }
}

pub fn build_router(state: AppState, gateway: &GatewayConfig) -> Router {
    Router::new()
        .route("/v1/chat/completions", post(api::handle_chat_completions))
        .route("/v1/models", get(api::handle_models))
        .route("/health", get(api::handle_health))
        .route("/metrics", get(api::handle_metrics))
        .layer(RequestBodyLimitLayer::new(gateway.max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            gateway.request_timeout_secs,
        )))
        .with_state(state)
}

/// Periodically drop idle sessions and refresh the session gauge.
pub fn spawn_session_sweeper(
    sessions: Arc<dyn SessionStore>,
    metrics: Arc<Metrics>,
    config: &SessionsConfig,
) -> tokio::task::JoinHandle<()> {
    let idle_for = Duration::from_secs(config.idle_timeout_minutes.saturating_mul(60));
    let every = Duration::from_secs(config.sweep_interval_secs.max(1));

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if !idle_for.is_zero() {
                match sessions.evict_idle(idle_for).await {
                    Ok(0) => {}
                    Ok(evicted) => tracing::info!(evicted, "Swept idle sessions"),
                    Err(e) => tracing::warn!(error = %e, "Session sweep failed"),
                }
            }
            metrics.set_active_sessions(sessions.len());
        }
    })
}

/// Run the gateway until Ctrl-C.
pub async fn run_gateway(host: &str, port: u16, config: Config) -> Result<()> {
    let metrics = Arc::new(Metrics::new()?);
    let dispatcher = Arc::new(create_turn_dispatcher(&config, metrics.clone())?);

    let sweeper = spawn_session_sweeper(
        dispatcher.sessions().clone(),
        metrics,
        &config.sessions,
    );

    let state = AppState::new(dispatcher, &config.gateway.model_id);
    let app = build_router(state, &config.gateway);

    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .with_context(|| format!("Failed to bind gateway to {host}:{port}"))?;
    let local_addr = listener.local_addr()?;
    tracing::info!(
        addr = %local_addr,
        provider = %config.default_provider,
        model = %config.default_model,
        "Gateway listening"
    );

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Gateway server error");

    sweeper.abort();
    tracing::info!("Gateway stopped");
    served
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl-C; shutting down");
    }
}
