//! Data-driven retry with exponential backoff.
//!
//! The policy is a plain value consumed by a generic combinator, so the
//! schedule can be asserted in tests without sleeping and the wrapped
//! operation never knows it is being retried.

use std::future::Future;
use std::time::Duration;

use crate::errors::QuranError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay taken after the first failed attempt.
    pub base_delay: Duration,
    /// Each subsequent delay is the previous one times this factor.
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// The delay taken after `failed_attempts` attempts have failed
    /// (1-based: `delay_for(1)` follows the first failure).
    pub fn delay_for(&self, failed_attempts: u32) -> Duration {
        self.base_delay * self.multiplier.saturating_pow(failed_attempts.saturating_sub(1))
    }

    /// Run `op` until it succeeds, fails with a non-transient error, or the
    /// attempt budget is spent. Transient means [`QuranError::is_transient`];
    /// validation failures in particular surface on the first attempt.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, QuranError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, QuranError>>,
    {
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(5),
            multiplier: 2,
        }
    }

    #[test]
    fn delays_double_from_the_base() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(2000),
            multiplier: 2,
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(4000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(8000));
    }

    #[tokio::test]
    async fn succeeds_on_third_attempt_after_two_transient_failures() {
        let attempts = AtomicU32::new(0);
        let result = quick_policy()
            .run(|| {
                let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Err(QuranError::Network("connection reset".into()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;
        assert_eq!(result, Ok(3));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn validation_errors_are_never_retried() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = quick_policy()
            .run(|| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(QuranError::Validation("too short".into())) }
            })
            .await;
        assert_eq!(result, Err(QuranError::Validation("too short".into())));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_the_attempt_budget() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = quick_policy()
            .run(|| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(QuranError::RateLimited) }
            })
            .await;
        assert_eq!(result, Err(QuranError::RateLimited));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
