//! Retry middleware for transient failures

use std::time::Duration;

use tracing::{debug, warn};

use crate::Result;

/// Retry policy
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum retry attempts
    pub max_attempts: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay before the retry following the given attempt number
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay_ms =
            self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        std::cmp::min(Duration::from_millis(delay_ms as u64), self.max_delay)
    }
}

/// Retry middleware wrapping an async operation
pub struct RetryMiddleware {
    config: RetryConfig,
}

impl RetryMiddleware {
    /// Create new retry middleware
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Execute an operation, retrying transient failures with backoff.
    ///
    /// Non-retryable errors are returned immediately. Once the retry budget
    /// is exhausted the last transient error is returned as-is, so a status
    /// code and service message survive to the caller.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!("request succeeded after {attempt} retries");
                    }
                    return Ok(result);
                }
                Err(e) => {
                    if !e.is_retryable() {
                        debug!("non-retryable error: {e}");
                        return Err(e);
                    }

                    if attempt >= self.config.max_attempts {
                        warn!(
                            "retry budget of {} exhausted: {e}",
                            self.config.max_attempts
                        );
                        return Err(e);
                    }

                    let delay = self.config.delay_for(attempt);
                    warn!(
                        "request failed (attempt {}/{}), retrying in {:?}: {}",
                        attempt + 1,
                        self.config.max_attempts,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HttpError;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_doubles_per_attempt() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for(0), Duration::from_millis(500));
        assert_eq!(config.delay_for(1), Duration::from_millis(1000));
        assert_eq!(config.delay_for(2), Duration::from_millis(2000));
    }

    #[test]
    fn backoff_is_capped() {
        let config = RetryConfig {
            max_delay: Duration::from_secs(5),
            ..Default::default()
        };
        assert!(config.delay_for(10) <= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn succeeds_on_first_attempt() {
        let middleware = RetryMiddleware::new(RetryConfig::default());
        let result = middleware.execute(|| async { Ok::<_, HttpError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn retries_transient_failure() {
        let middleware = RetryMiddleware::new(RetryConfig {
            max_attempts: 2,
            initial_delay: Duration::from_millis(10),
            ..Default::default()
        });

        let calls = AtomicU32::new(0);
        let result = middleware
            .execute(|| async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(HttpError::Timeout(Duration::from_secs(1)))
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn exhausted_budget_surfaces_the_last_error() {
        let middleware = RetryMiddleware::new(RetryConfig {
            max_attempts: 2,
            initial_delay: Duration::from_millis(10),
            ..Default::default()
        });

        let calls = AtomicU32::new(0);
        let result = middleware
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(HttpError::Status {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: "boom".into(),
                })
            })
            .await;

        // Initial call plus two retries, then the 500 itself comes back
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(
            result,
            Err(HttpError::Status { status, ref message })
                if status == StatusCode::INTERNAL_SERVER_ERROR && message == "boom"
        ));
    }

    #[tokio::test]
    async fn zero_budget_surfaces_the_first_error() {
        let middleware = RetryMiddleware::new(RetryConfig {
            max_attempts: 0,
            ..Default::default()
        });

        let calls = AtomicU32::new(0);
        let result = middleware
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(HttpError::Status {
                    status: StatusCode::SERVICE_UNAVAILABLE,
                    message: "warming up".into(),
                })
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            result,
            Err(HttpError::Status { status, .. }) if status == StatusCode::SERVICE_UNAVAILABLE
        ));
    }

    #[tokio::test]
    async fn terminal_error_skips_retries() {
        let middleware = RetryMiddleware::new(RetryConfig::default());
        let result = middleware
            .execute(|| async { Err::<i32, _>(HttpError::InvalidUrl("bad".to_string())) })
            .await;
        assert!(matches!(result, Err(HttpError::InvalidUrl(_))));
    }
}
