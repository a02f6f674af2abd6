//! HTTP transport error types

use thiserror::Error;

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, HttpError>;

/// HTTP transport errors
#[derive(Debug, Error)]
pub enum HttpError {
    /// Network request failed
    #[error("network request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Request timeout
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Invalid URL
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Invalid proxy configuration
    #[error("invalid proxy configuration: {0}")]
    InvalidProxy(String),

    /// Non-success HTTP status from the service
    #[error("HTTP {status}: {message}")]
    Status {
        status: reqwest::StatusCode,
        message: String,
    },

    /// Client build error
    #[error("failed to build HTTP client: {0}")]
    BuildError(String),
}

impl HttpError {
    /// Whether a retry could plausibly succeed.
    ///
    /// Transient classes only: network timeouts/connect failures, 429
    /// rate limiting, and 5xx server errors. Everything else is terminal
    /// for the call.
    pub fn is_retryable(&self) -> bool {
        match self {
            HttpError::RequestFailed(e) => e.is_timeout() || e.is_connect(),
            HttpError::Timeout(_) => true,
            HttpError::Status { status, .. } => {
                status.is_server_error() || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_5xx_is_retryable() {
        let err = HttpError::Status {
            status: reqwest::StatusCode::BAD_GATEWAY,
            message: "upstream down".into(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn rate_limit_is_retryable() {
        let err = HttpError::Status {
            status: reqwest::StatusCode::TOO_MANY_REQUESTS,
            message: "slow down".into(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn client_errors_are_terminal() {
        let err = HttpError::Status {
            status: reqwest::StatusCode::NOT_FOUND,
            message: "missing".into(),
        };
        assert!(!err.is_retryable());
        assert!(!HttpError::InvalidUrl("x".into()).is_retryable());
    }
}
