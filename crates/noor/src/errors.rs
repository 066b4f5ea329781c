use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while turning a model-issued tool call into a result.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum AgentError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Tool execution failed: {0}")]
    ExecutionError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AgentResult<T> = Result<T, AgentError>;

/// Failure taxonomy for the Quran data client.
///
/// Only `Network` and `RateLimited` are retried; everything else surfaces
/// to the caller on the first occurrence.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuranError {
    #[error("network failure reaching the verse service: {0}")]
    Network(String),

    #[error("verse service error (status {0})")]
    Api(u16),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("the verse service is rate limiting requests")]
    RateLimited,

    #[error("access to the verse service was refused")]
    Forbidden,

    #[error("unexpected verse service failure: {0}")]
    Unknown(String),
}

impl QuranError {
    /// Whether a retry has any chance of succeeding.
    pub fn is_transient(&self) -> bool {
        matches!(self, QuranError::Network(_) | QuranError::RateLimited)
    }
}

/// Failures from the chat/image model provider, classified finely enough
/// for the orchestrator to pick the right user-facing message and for the
/// proxy to pick the right HTTP status.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("model request failed: {0}")]
    Network(String),

    #[error("the model is rate limiting requests")]
    RateLimited,

    #[error("the model quota is exhausted")]
    QuotaExhausted,

    #[error("model credentials were rejected")]
    Forbidden,

    #[error("the model refused the request")]
    Refused,

    #[error("model API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("unexpected model response: {0}")]
    Malformed(String),
}
