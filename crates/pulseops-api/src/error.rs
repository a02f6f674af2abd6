//! API error taxonomy

use thiserror::Error;

/// Result type for API operations
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors from the remote service or the transport underneath it
#[derive(Debug, Error)]
pub enum ApiError {
    /// Authentication failed; fatal for the whole request
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Error response from the service, with its machine status code and
    /// human message
    #[error("service error {status}: {message}")]
    Service { status: u16, message: String },

    /// Entity missing from the service
    #[error("not found: {0}")]
    NotFound(String),

    /// Transport-level failure (network, timeout, retry budget)
    #[error("transport error: {0}")]
    Transport(#[from] pulseops_http::HttpError),

    /// Response body did not match the expected shape
    #[error("unexpected response shape: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Malformed or missing data in a response envelope
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Invalid input for an API call
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ApiError {
    /// Create a new auth error
    pub fn auth(msg: impl Into<String>) -> Self {
        ApiError::Auth(msg.into())
    }

    /// Create a new not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError::NotFound(msg.into())
    }

    /// Create a new malformed-response error
    pub fn malformed(msg: impl Into<String>) -> Self {
        ApiError::MalformedResponse(msg.into())
    }

    /// Create a new invalid-input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        ApiError::InvalidInput(msg.into())
    }

    /// Whether the failure is transient (timeout, 429, 5xx)
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Transport(e) => e.is_retryable(),
            ApiError::Service { status, .. } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }
}

/// Map a transport error to the API taxonomy, lifting HTTP status responses
/// into `ApiError::Service`.
pub(crate) fn from_transport(err: pulseops_http::HttpError) -> ApiError {
    match err {
        pulseops_http::HttpError::Status { status, message } => ApiError::Service {
            status: status.as_u16(),
            message,
        },
        other => ApiError::Transport(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        let rate_limited = ApiError::Service {
            status: 429,
            message: "too many requests".into(),
        };
        assert!(rate_limited.is_transient());

        let server_error = ApiError::Service {
            status: 503,
            message: "unavailable".into(),
        };
        assert!(server_error.is_transient());

        let conflict = ApiError::Service {
            status: 409,
            message: "conflict".into(),
        };
        assert!(!conflict.is_transient());
        assert!(!ApiError::not_found("x").is_transient());
    }

    #[test]
    fn status_lifted_from_transport() {
        let err = from_transport(pulseops_http::HttpError::Status {
            status: pulseops_http::StatusCode::FORBIDDEN,
            message: "denied".into(),
        });
        assert!(matches!(err, ApiError::Service { status: 403, .. }));
    }
}
