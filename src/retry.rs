//! Retry runner for upstream API calls
//!
//! Wraps one request with a bounded number of attempts. Rate-limit answers
//! back off exponentially; transport failures wait a fixed delay. Everything
//! else is returned to the caller straight away.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, warn};

use crate::domain::errors::FeedError;

/// Retry configuration for one upstream API
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before retrying after a transport failure
    pub transport_delay: Duration,
    /// Base of the exponential delay after HTTP 429
    pub rate_limit_base_delay: Duration,
    /// Whether transport failures are retried at all
    pub retry_transport: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            transport_delay: Duration::from_secs(2),
            rate_limit_base_delay: Duration::from_secs(5),
            retry_transport: true,
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt, or `None` when `error` is not retried.
    pub fn delay_for(&self, error: &FeedError, attempt: u32) -> Option<Duration> {
        match error {
            FeedError::RateLimited => Some(
                self.rate_limit_base_delay
                    .checked_mul(2u32.saturating_pow(attempt))
                    .unwrap_or(Duration::MAX),
            ),
            FeedError::Transport(_) if self.retry_transport => Some(self.transport_delay),
            _ => None,
        }
    }
}

/// Run `request` until it succeeds, fails with a non-retryable error, or the
/// attempt budget is spent. `request` receives the zero-based attempt number.
pub async fn with_retry<T, F, Fut>(
    operation: &str,
    policy: &RetryPolicy,
    mut request: F,
) -> Result<T, FeedError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, FeedError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        let err = match request(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        let Some(delay) = policy.delay_for(&err, attempt) else {
            return Err(err);
        };

        attempt += 1;
        if attempt >= max_attempts {
            error!(
                operation = %operation,
                attempts = attempt,
                error = %err,
                "Giving up after exhausting retries"
            );
            return Err(err);
        }

        warn!(
            operation = %operation,
            attempt = attempt,
            max_attempts = max_attempts,
            error = %err,
            "Request failed, retrying in {:?}",
            delay
        );
        sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            transport_delay: Duration::from_millis(1),
            rate_limit_base_delay: Duration::from_millis(1),
            retry_transport: true,
        }
    }

    #[test]
    fn test_rate_limit_delay_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(&FeedError::RateLimited, 0), Some(Duration::from_secs(5)));
        assert_eq!(policy.delay_for(&FeedError::RateLimited, 1), Some(Duration::from_secs(10)));
        assert_eq!(policy.delay_for(&FeedError::RateLimited, 2), Some(Duration::from_secs(20)));
    }

    #[test]
    fn test_non_retryable_errors() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(&FeedError::Unauthorized(401), 0), None);
        assert_eq!(policy.delay_for(&FeedError::Status(404), 0), None);
        assert_eq!(policy.delay_for(&FeedError::Malformed("x".into()), 0), None);

        let no_transport = RetryPolicy {
            retry_transport: false,
            ..RetryPolicy::default()
        };
        assert_eq!(no_transport.delay_for(&FeedError::Transport("reset".into()), 0), None);
        assert!(no_transport.delay_for(&FeedError::RateLimited, 0).is_some());
    }

    #[tokio::test]
    async fn test_recovers_after_rate_limit() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = with_retry("orders", &fast_policy(), |attempt| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Err(FeedError::RateLimited)
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), FeedError> = with_retry("sales", &fast_policy(), |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(FeedError::Transport("connection reset".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(FeedError::Transport(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fatal_error_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), FeedError> = with_retry("returns", &fast_policy(), |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(FeedError::Unauthorized(401)) }
        })
        .await;

        assert_eq!(result, Err(FeedError::Unauthorized(401)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
