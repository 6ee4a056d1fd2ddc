//! Retry Executor (C2).
//!
//! A single combinator that composes the governor's blocking wait with
//! exponential backoff (spec §9: "a single retry combinator... not two
//! independent mechanisms"). Modeled on the retry/backoff bookkeeping in
//! `queue/processor.rs::retry_failed`, generalized into a reusable
//! higher-order function.

use crate::error::CoreError;
use crate::governor::{RateLimitGovernor, RateLimitSource};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Retry `op`, synchronizing with the governor between attempts. Returns
/// the op's result or the final error on exhaustion — never panics, so
/// batch aggregation (C4) can continue past a failed file.
pub async fn retry<T, F, Fut>(
    governor: &Arc<RateLimitGovernor>,
    rate_source: &dyn RateLimitSource,
    name: &str,
    op: F,
) -> Result<T, CoreError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, CoreError>>,
{
    retry_with_attempts(governor, rate_source, name, DEFAULT_MAX_ATTEMPTS, op).await
}

pub async fn retry_with_attempts<T, F, Fut>(
    governor: &Arc<RateLimitGovernor>,
    rate_source: &dyn RateLimitSource,
    name: &str,
    max_attempts: u32,
    op: F,
) -> Result<T, CoreError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, CoreError>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                // spec §4.2: 2^attempt seconds starting at 1s (attempt is
                // 1-indexed here, so the exponent is attempt - 1).
                let delay = std::time::Duration::from_secs(2u64.pow(attempt - 1));
                warn!(
                    operation = name,
                    attempt,
                    max_attempts,
                    delay_secs = delay.as_secs(),
                    "retryable failure, backing off: {err}"
                );
                tokio::time::sleep(delay).await;
                governor.check_and_wait(rate_source).await;
            }
            Err(err) => {
                debug!(operation = name, attempt, "retry exhausted or non-retryable: {err}");
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governor::RateLimitState;
    use chrono::Utc;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct AlwaysOkSource;

    #[async_trait::async_trait]
    impl RateLimitSource for AlwaysOkSource {
        async fn fetch_rate_limit(&self) -> anyhow::Result<RateLimitState> {
            Ok(RateLimitState {
                remaining: 5000,
                reset_at: Utc::now(),
            })
        }
    }

    #[tokio::test]
    async fn succeeds_without_retry_on_first_try() {
        let governor = RateLimitGovernor::optimistic();
        let calls = AtomicU32::new(0);
        let result: Result<i32, CoreError> = retry(&governor, &AlwaysOkSource, "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(42)
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_on_quota_error_then_succeeds() {
        let governor = RateLimitGovernor::optimistic();
        let calls = AtomicU32::new(0);
        let result: Result<i32, CoreError> = retry_with_attempts(
            &governor,
            &AlwaysOkSource,
            "test",
            3,
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 1 {
                        Err(CoreError::Remote(crate::error::RemoteError::Transient(
                            "boom".into(),
                        )))
                    } else {
                        Ok(7)
                    }
                }
            },
        )
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_retryable_error_surfaces_immediately() {
        let governor = RateLimitGovernor::optimistic();
        let calls = AtomicU32::new(0);
        let result: Result<i32, CoreError> = retry(&governor, &AlwaysOkSource, "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(CoreError::Validation("bad input".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_after_max_attempts() {
        let governor = RateLimitGovernor::optimistic();
        let calls = AtomicU32::new(0);
        let result: Result<i32, CoreError> = retry_with_attempts(
            &governor,
            &AlwaysOkSource,
            "test",
            2,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(CoreError::Remote(crate::error::RemoteError::Transient(
                        "still down".into(),
                    )))
                }
            },
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
