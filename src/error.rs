//! Error taxonomy surfaced by turns and front ends.

use thiserror::Error;

/// Errors a turn can end with. Unknown sessions are never an error: they are
/// created on first use.
#[derive(Debug, Error)]
pub enum PdaError {
    /// The external model call failed or timed out. Recoverable; report as a service error.
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// The chat payload was malformed. User-visible.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl PdaError {
    /// OpenAI-style error `type` string.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ModelUnavailable(_) => "service_unavailable",
            Self::InvalidRequest(_) => "invalid_request_error",
            Self::Internal(_) => "internal_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, PdaError>;
