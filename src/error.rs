//! genpipe error types

use std::time::Duration;

use crate::types::ModelSize;
use crate::validate::ValidationError;

/// Maximum length of any diagnostic text surfaced to callers.
pub const DIAGNOSTIC_LIMIT: usize = 240;

/// genpipe error types
#[derive(Debug, thiserror::Error)]
pub enum GenError {
    // Request errors
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // Selection errors
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("no provider configured")]
    NoProvider,

    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("no {size} model fits the memory budget of {budget_mb} MB")]
    NoModelAvailable { size: ModelSize, budget_mb: u64 },

    // Provider call errors (retryable)
    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),

    #[error("backend error{}: {message}", status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Backend {
        status: Option<u16>,
        message: String,
    },

    // Provider call errors (deterministic)
    #[error("unusable provider response: {0}")]
    ResponseShape(String),

    // Contract violations
    #[error(transparent)]
    Validation(#[from] ValidationError),

    // Infrastructure
    #[error("cache error: {0}")]
    Cache(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The closed set of failure categories exposed to callers.
///
/// Route handlers map these to transport-level responses; each category is
/// enough to pick a fallback UI state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed or unserviceable request.
    BadRequest,
    /// No backend could produce an answer.
    UpstreamUnavailable,
    /// A backend answered, but not with a usable result.
    UpstreamInvalid,
    /// Anything else.
    Internal,
}

impl ErrorCategory {
    /// HTTP status code conventionally associated with this category.
    pub fn status_code(self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::UpstreamUnavailable => 503,
            Self::UpstreamInvalid => 502,
            Self::Internal => 500,
        }
    }
}

impl GenError {
    /// Whether the retry loop should try this call again.
    ///
    /// Only timeouts and backend-reported failures qualify. A malformed
    /// response is deterministic and will not improve on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Backend { .. })
    }

    /// Caller-facing category for this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Serialization(_)
            | Self::InvalidInput(_)
            | Self::UnknownProvider(_)
            | Self::ModelNotFound(_) => ErrorCategory::BadRequest,
            Self::NoProvider
            | Self::NoModelAvailable { .. }
            | Self::Timeout(_)
            | Self::Backend { .. } => ErrorCategory::UpstreamUnavailable,
            Self::ResponseShape(_) | Self::Validation(_) => ErrorCategory::UpstreamInvalid,
            Self::Cache(_) | Self::Configuration(_) | Self::Json(_) => ErrorCategory::Internal,
        }
    }

    /// Display text truncated to [`DIAGNOSTIC_LIMIT`] characters.
    pub fn diagnostic(&self) -> String {
        truncate(&self.to_string(), DIAGNOSTIC_LIMIT)
    }
}

/// Truncate `text` to at most `limit` characters, marking the cut with `…`.
pub(crate) fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_owned(),
    }
}

/// Result type alias for genpipe operations
pub type Result<T> = std::result::Result<T, GenError>;
