//! Bounded exponential backoff around fallible async operations
//!
//! The delay before attempt `k + 1` (after `k` failures) is
//! `min(base_delay * 2^(k-1), max_delay)`, stretched to the upstream's retry
//! hint when one is given (still capped at `max_delay`). There is no delay
//! before the first attempt. Wall-clock deadlines are the caller's concern.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::{Error, Result};

/// Backoff policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay,
            max_delay: config.max_delay,
        }
    }
}

/// Successful value plus the number of attempts it took
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempted<T> {
    pub value: T,
    pub attempts: u32,
}

/// Final error plus the number of attempts made
#[derive(Debug)]
pub struct Exhausted {
    pub error: Error,
    pub attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Delay to wait after `failures` consecutive failures
    pub fn delay_for(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(failures - 1);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Retry `op` while its error is retryable (transient or rate limited)
    ///
    /// Non-retryable errors are returned immediately without consuming
    /// further attempts.
    pub async fn retry<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.retry_if(op, Error::is_retryable)
            .await
            .map(|a| a.value)
            .map_err(|e| e.error)
    }

    /// Retry `op` while `should_retry` accepts the error
    pub async fn retry_if<T, F, Fut, P>(
        &self,
        mut op: F,
        should_retry: P,
    ) -> std::result::Result<Attempted<T>, Exhausted>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        P: Fn(&Error) -> bool,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "Operation succeeded after retry");
                    }
                    return Ok(Attempted {
                        value,
                        attempts: attempt,
                    });
                }
                Err(error) if attempt < self.max_attempts && should_retry(&error) => {
                    let mut delay = self.delay_for(attempt);
                    if let Some(hint) = error.retry_after() {
                        delay = delay.max(hint.min(self.max_delay));
                    }
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Attempt failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    return Err(Exhausted {
                        error,
                        attempts: attempt,
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(30))
    }

    #[test]
    fn test_delay_schedule() {
        let policy = RetryPolicy::new(10, Duration::from_secs(1), Duration::from_secs(5));
        assert_eq!(policy.delay_for(0), Duration::ZERO);
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(4), Duration::from_secs(5));
        assert_eq!(policy.delay_for(40), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_twice_then_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let result = policy()
            .retry(|| {
                let calls = calls.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 3 {
                        Err(Error::RateLimited { retry_after: None })
                    } else {
                        Ok("reviewed")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "reviewed");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1s then 2s
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_error() {
        let calls = Arc::new(AtomicU32::new(0));

        let result = policy()
            .retry_if(
                || {
                    let calls = calls.clone();
                    async move {
                        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                        Err::<(), _>(Error::TransientUpstream(format!("attempt {}", n)))
                    }
                },
                Error::is_retryable,
            )
            .await;

        let exhausted = result.unwrap_err();
        assert_eq!(exhausted.attempts, 3);
        assert_eq!(
            exhausted.error.to_string(),
            "Transient upstream failure: attempt 3"
        );
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_returns_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let result: Result<()> = policy()
            .retry(|| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(Error::PayloadTooLarge("413".into()))
                }
            })
            .await;

        assert!(result.unwrap_err().is_payload_too_large());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_hint_stretches_delay() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        policy()
            .retry(|| {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(Error::RateLimited {
                            retry_after: Some(Duration::from_secs(7)),
                        })
                    } else {
                        Ok(())
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(start.elapsed(), Duration::from_secs(7));
    }

    #[tokio::test]
    async fn test_first_attempt_success_reports_one_attempt() {
        let outcome = policy()
            .retry_if(|| async { Ok(5) }, |_| true)
            .await
            .unwrap();
        assert_eq!(outcome, Attempted { value: 5, attempts: 1 });
    }
}
