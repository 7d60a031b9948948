//! OpenAI-compatible REST handlers.

use super::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};

use crate::error::PdaError;

pub const SESSION_HEADER: &str = "x-session-id";
pub const DECISION_HEADER: &str = "x-wellbeing-decision";
pub const DEFAULT_SESSION_ID: &str = "default";
pub const NO_USER_MESSAGE: &str = "No user message provided.";

// ── Wire types ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionRequest {
    /// Accepted for compatibility. The gateway always answers as its own model.
    #[serde(default)]
    pub model: Option<String>,
    pub messages: Vec<Message>,
    /// OpenAI end-user id. Used as session id when no header is sent.
    #[serde(default)]
    pub user: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatCompletionChoice {
    pub index: u32,
    pub message: Message,
    pub finish_reason: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatCompletionChoice>,
}

impl ChatCompletionResponse {
    fn assistant(model: &str, content: String) -> Self {
        Self {
            id: format!("chatcmpl-{}", uuid::Uuid::new_v4().simple()),
            object: "chat.completion",
            created: chrono::Utc::now().timestamp(),
            model: model.to_string(),
            choices: vec![ChatCompletionChoice {
                index: 0,
                message: Message {
                    role: "assistant".into(),
                    content,
                },
                finish_reason: "stop",
            }],
        }
    }
}

// ── Errors ──────────────────────────────────────────────────────

impl IntoResponse for PdaError {
    fn into_response(self) -> Response {
        let status = match &self {
            PdaError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            PdaError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            PdaError::Internal(e) => {
                tracing::error!(error = %e, "Internal gateway error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = serde_json::json!({
            "error": {
                "message": self.to_string(),
                "type": self.kind(),
            }
        });
        (status, Json(body)).into_response()
    }
}

// ── Helpers ─────────────────────────────────────────────────────

/// `X-Session-Id` header, else the request's `user` field, else `"default"`.
fn resolve_session_id(headers: &HeaderMap, user: Option<&str>) -> String {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .or(user)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .unwrap_or(DEFAULT_SESSION_ID)
        .to_string()
}

fn last_user_message(messages: &[Message]) -> Option<&str> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .map(|m| m.content.as_str())
}

// ── Handlers ────────────────────────────────────────────────────

/// POST /v1/chat/completions
pub async fn handle_chat_completions(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ChatCompletionRequest>, JsonRejection>,
) -> Result<Response, PdaError> {
    let Json(request) = payload.map_err(|e| PdaError::InvalidRequest(e.body_text()))?;

    let Some(input) = last_user_message(&request.messages) else {
        let body = ChatCompletionResponse::assistant(&state.model_id, NO_USER_MESSAGE.into());
        return Ok(Json(body).into_response());
    };

    let session_id = resolve_session_id(&headers, request.user.as_deref());
    let outcome = state.dispatcher.handle(&session_id, input).await?;

    let body = ChatCompletionResponse::assistant(&state.model_id, outcome.reply);
    let mut response = Json(body).into_response();
    response.headers_mut().insert(
        DECISION_HEADER,
        HeaderValue::from_static(outcome.decision.decision.as_str()),
    );
    Ok(response)
}

/// GET /v1/models
pub async fn handle_models(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "object": "list",
        "data": [{
            "id": &*state.model_id,
            "object": "model",
            "owned_by": "local",
        }]
    }))
}

/// GET /health
pub async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "sessions": state.dispatcher.sessions().len(),
    }))
}

/// GET /metrics: Prometheus text format
pub async fn handle_metrics(State(state): State<AppState>) -> Result<Response, PdaError> {
    let metrics = state.dispatcher.metrics();
    metrics.set_active_sessions(state.dispatcher.sessions().len());
    let body = metrics.render()?;
    Ok((
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        body,
    )
        .into_response())
}
