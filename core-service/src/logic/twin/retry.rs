//! Bounded retry with per-call timeout for store operations.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{sleep, timeout};

use crate::constants;
use crate::logic::error::StoreError;

/// Bounded retry budget for one store call. Delays double per retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total calls, first one included
    pub attempts: u32,
    /// Wait before the first retry
    pub first_delay: Duration,
    /// Upper bound for any single wait
    pub delay_cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: constants::DEFAULT_RETRY_ATTEMPTS,
            first_delay: Duration::from_millis(constants::DEFAULT_RETRY_MIN_BACKOFF_MS),
            delay_cap: Duration::from_millis(constants::DEFAULT_RETRY_MAX_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    /// Wait after `failures` failed calls; zero before anything failed.
    pub fn delay_after(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let doublings = (failures - 1).min(31);
        self.first_delay
            .checked_mul(1u32 << doublings)
            .map_or(self.delay_cap, |d| d.min(self.delay_cap))
    }
}

/// Failure after the retry budget is spent (or on a non-retryable error).
#[derive(Debug, Clone)]
pub struct RetryFailure {
    pub attempts: u32,
    pub last_error: StoreError,
}

/// Run `op` under `call_timeout`, retrying retryable store errors with
/// doubling delays until `policy.attempts` calls have been made.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    call_timeout: Duration,
    label: &str,
    mut op: F,
) -> Result<T, RetryFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let max_attempts = policy.attempts.max(1);
    let mut attempt = 0u32;

    loop {
        let result = match timeout(call_timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(call_timeout)),
        };

        let err = match result {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        attempt += 1;
        if !err.is_retryable() || attempt >= max_attempts {
            return Err(RetryFailure {
                attempts: attempt,
                last_error: err,
            });
        }

        let delay = policy.delay_after(attempt);
        log::warn!(
            "{}: attempt {}/{} failed ({}), retrying in {:?}",
            label,
            attempt,
            max_attempts,
            err,
            delay
        );
        sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            first_delay: Duration::from_millis(1),
            delay_cap: Duration::from_millis(4),
        }
    }

    #[test]
    fn test_default_policy_follows_store_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts, 3);
        assert_eq!(policy.delay_after(0), Duration::ZERO);
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
    }

    #[test]
    fn test_write_back_delays_stop_at_cap() {
        let policy = RetryPolicy {
            attempts: 8,
            first_delay: Duration::from_millis(300),
            delay_cap: Duration::from_secs(1),
        };
        let delays: Vec<u64> = (1..=5).map(|n| policy.delay_after(n).as_millis() as u64).collect();
        assert_eq!(delays, vec![300, 600, 1000, 1000, 1000]);

        // Large failure counts must not overflow
        assert_eq!(policy.delay_after(u32::MAX), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(3), Duration::from_secs(1), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(StoreError::Unavailable("flaky".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> =
            with_retry(&fast_policy(3), Duration::from_secs(1), "test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(StoreError::Unavailable("down".into())) }
            })
            .await;

        let failure = result.unwrap_err();
        assert_eq!(failure.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_invalid_patch_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> =
            with_retry(&fast_policy(3), Duration::from_secs(1), "test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(StoreError::InvalidPatch {
                        path: "x".into(),
                        reason: "bad".into(),
                    })
                }
            })
            .await;

        assert_eq!(result.unwrap_err().attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_store_error() {
        let result: Result<(), _> =
            with_retry(&fast_policy(2), Duration::from_millis(5), "test", || async {
                sleep(Duration::from_millis(200)).await;
                Ok(())
            })
            .await;

        let failure = result.unwrap_err();
        assert_eq!(failure.attempts, 2);
        assert!(matches!(failure.last_error, StoreError::Timeout(_)));
    }
}
