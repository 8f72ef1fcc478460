//! Retry policy with exponential backoff.
//!
//! The schedule is a pure function of the attempt number so it can be tested
//! without a clock; the async driver layers sleeping and error
//! classification on top.

use crate::constants::timing;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Exponential-backoff retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts (the first attempt counts).
    pub max_retries: u32,
    /// Base delay before the first retry.
    pub base_delay: Duration,
    /// Multiplier applied per retry attempt.
    pub backoff_factor: f64,
}

impl RetryPolicy {
    /// Policy with the crate-wide defaults (3 attempts, 2 s base, factor 2).
    pub fn standard() -> Self {
        Self {
            max_retries: timing::MAX_RETRIES,
            base_delay: timing::BASE_RETRY_DELAY,
            backoff_factor: timing::RETRY_BACKOFF_FACTOR,
        }
    }

    /// Build a policy with an explicit shape.
    pub fn new(max_retries: u32, base_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_retries,
            base_delay,
            backoff_factor,
        }
    }

    /// Delay before the k-th retry (0-indexed): `base * factor^k`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.backoff_factor.max(1.0).powi(attempt as i32);
        let millis = (self.base_delay.as_millis() as f64 * factor).round().max(0.0) as u64;
        Duration::from_millis(millis)
    }

    /// Run `operation` under this policy.
    ///
    /// The closure receives the 0-indexed attempt number. Errors that are not
    /// retryable per [`crate::Error::is_retryable`] are returned immediately;
    /// otherwise the driver sleeps `delay_for_attempt(attempt)` and tries
    /// again until attempts are exhausted, returning the last error.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let exhausted = attempt + 1 >= self.max_retries;
                    if exhausted || !err.is_retryable() {
                        return Err(err);
                    }
                    let delay = self.delay_for_attempt(attempt);
                    tracing::warn!(attempt = attempt + 1, ?delay, error = %err, "retrying after backoff");
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_schedule_is_exponential() {
        let policy = RetryPolicy::new(3, Duration::from_secs(2), 2.0);
        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(4));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(8));
    }

    #[test]
    fn test_factor_below_one_is_clamped() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100), 0.5);
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(100));
    }

    proptest! {
        #[test]
        fn prop_schedule_is_monotone(base_ms in 1u64..5_000, factor in 1.0f64..4.0, k in 0u32..8) {
            let policy = RetryPolicy::new(10, Duration::from_millis(base_ms), factor);
            prop_assert!(policy.delay_for_attempt(k + 1) >= policy.delay_for_attempt(k));
        }

        #[test]
        fn prop_schedule_matches_formula(base_ms in 1u64..5_000, k in 0u32..6) {
            let policy = RetryPolicy::new(10, Duration::from_millis(base_ms), 2.0);
            let expected = base_ms * 2u64.pow(k);
            prop_assert_eq!(policy.delay_for_attempt(k), Duration::from_millis(expected));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_retries_until_success() {
        let policy = RetryPolicy::new(3, Duration::from_millis(10), 2.0);
        let calls = AtomicU32::new(0);

        let result = policy
            .run(|_attempt| {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if call < 2 {
                        Err(Error::timeout(Duration::from_secs(1)))
                    } else {
                        Ok(call)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_non_retryable() {
        let policy = RetryPolicy::new(5, Duration::from_millis(10), 2.0);
        let calls = AtomicU32::new(0);

        let result: Result<()> = policy
            .run(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Error::LoggedOut) }
            })
            .await;

        assert!(matches!(result, Err(Error::LoggedOut)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_exhausts_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_millis(10), 2.0);
        let calls = AtomicU32::new(0);

        let result: Result<()> = policy
            .run(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Error::timeout(Duration::from_secs(1))) }
            })
            .await;

        assert!(matches!(result, Err(Error::Timeout { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
