use thiserror::Error;

use crate::backend::UpstreamResponse;

/// Failures reported by backend clients.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("Resource not found")]
    NotFound,

    /// Non-success answer other than 404; carries the response for passthrough.
    #[error("Backend responded with status {}", .0.status)]
    Status(UpstreamResponse),

    #[error("Backend request timed out")]
    Timeout,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed backend response: {0}")]
    Decode(String),
}

/// Errors surfaced by the gateway pipelines.
#[derive(Debug, Clone, Error)]
pub enum EdgeError {
    #[error("Patron not found: {external_id}")]
    PatronNotFound { external_id: String },

    #[error("Patron lookup failed: {0}")]
    LookupFailed(String),

    #[error("Hold not found: {hold_id}")]
    HoldNotFound { hold_id: String },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Upstream request timed out: {operation}")]
    UpstreamTimeout { operation: &'static str },

    #[error("Upstream responded with status {}", .0.status)]
    Upstream(UpstreamResponse),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl EdgeError {
    /// Create a new PatronNotFound error
    pub fn patron_not_found(external_id: impl Into<String>) -> Self {
        Self::PatronNotFound {
            external_id: external_id.into(),
        }
    }

    /// Create a new HoldNotFound error
    pub fn hold_not_found(hold_id: impl Into<String>) -> Self {
        Self::HoldNotFound {
            hold_id: hold_id.into(),
        }
    }

    /// Create a new ValidationFailed error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed(message.into())
    }

    /// Create a new UpstreamTimeout error
    pub fn upstream_timeout(operation: &'static str) -> Self {
        Self::UpstreamTimeout { operation }
    }

    /// Check if this error is the caller's fault (4xx category)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::PatronNotFound { .. } | Self::HoldNotFound { .. } | Self::ValidationFailed(_)
        )
    }

    /// Check if this error is a timeout talking to the backend
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::UpstreamTimeout { .. })
    }
}

impl From<BackendError> for EdgeError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Status(response) => Self::Upstream(response),
            BackendError::Timeout => Self::upstream_timeout("backend request"),
            BackendError::NotFound => Self::Backend("resource not found".to_string()),
            BackendError::Transport(message) | BackendError::Decode(message) => {
                Self::Backend(message)
            }
        }
    }
}

/// Result type for gateway pipeline operations
pub type Result<T> = std::result::Result<T, EdgeError>;
