//! Rate-Limit Governor (C1).
//!
//! Tracks remaining quota and reset time for the remote code-forge API and
//! gates every outbound call. Modeled after the teacher's
//! `github::client::RateLimitInfo` tracking, but pulled out into its own
//! process-wide, explicitly-passed component (spec §9: "avoid global
//! singletons") so it can be shared between the forge client and the file
//! pipeline without either owning it.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

/// A snapshot of quota state, as returned by the remote's rate-limit
/// endpoint (spec §3).
#[derive(Debug, Clone, Copy)]
pub struct RateLimitState {
    pub remaining: i64,
    pub reset_at: DateTime<Utc>,
}

/// Anything capable of refreshing rate-limit state from the remote. The
/// governor depends on this trait rather than the concrete forge client so
/// it stays testable in isolation (spec §9).
#[async_trait::async_trait]
pub trait RateLimitSource: Send + Sync {
    async fn fetch_rate_limit(&self) -> anyhow::Result<RateLimitState>;
}

/// Gates every outbound remote call behind the tracked quota.
pub struct RateLimitGovernor {
    remaining: AtomicI64,
    reset_at: RwLock<DateTime<Utc>>,
}

impl RateLimitGovernor {
    pub fn new(initial: RateLimitState) -> Arc<Self> {
        Arc::new(Self {
            remaining: AtomicI64::new(initial.remaining),
            reset_at: RwLock::new(initial.reset_at),
        })
    }

    /// Optimistic default used before the first real rate-limit read.
    pub fn optimistic() -> Arc<Self> {
        Self::new(RateLimitState {
            remaining: i64::MAX,
            reset_at: Utc::now(),
        })
    }

    pub fn remaining(&self) -> i64 {
        self.remaining.load(Ordering::SeqCst)
    }

    pub async fn reset_at(&self) -> DateTime<Utc> {
        *self.reset_at.read().await
    }

    /// Atomically record a fresh reading from the remote (compare-and-set
    /// on `remaining`, spec §5).
    pub async fn record(&self, state: RateLimitState) {
        self.remaining.store(state.remaining, Ordering::SeqCst);
        *self.reset_at.write().await = state.reset_at;
    }

    /// Record the quota observed on a response without a full refresh
    /// round-trip (e.g. rate-limit headers on a regular API response).
    pub fn record_remaining(&self, remaining: i64) {
        self.remaining.store(remaining, Ordering::SeqCst);
    }

    /// spec §4.1: if `remaining <= 10` and `reset_at` is in the future,
    /// block until reset. Always attempts to refresh state first; a
    /// refresh failure is logged at WARN and never propagated — the call
    /// proceeds optimistically.
    pub async fn check_and_wait(&self, source: &dyn RateLimitSource) {
        match source.fetch_rate_limit().await {
            Ok(state) => self.record(state).await,
            Err(e) => warn!("rate-limit refresh failed, proceeding optimistically: {e}"),
        }

        let remaining = self.remaining();
        let reset_at = self.reset_at().await;
        if remaining <= 10 && reset_at > Utc::now() {
            let wait = (reset_at - Utc::now())
                .to_std()
                .unwrap_or(std::time::Duration::from_secs(0));
            warn!(
                remaining,
                reset_at = %reset_at,
                "rate limit nearly exhausted, blocking until reset"
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// spec §4.1: batch size derived from remaining quota.
    pub fn optimal_batch_size(&self) -> usize {
        match self.remaining() {
            r if r > 3000 => 10,
            r if r > 1000 => 5,
            _ => 3,
        }
    }

    /// spec §4.1: inter-batch delay derived from remaining quota.
    pub fn batch_delay_ms(&self) -> u64 {
        if self.remaining() < 1000 {
            500
        } else {
            100
        }
    }

    /// spec §4.1: file cap, honoring an env/config override first.
    pub fn file_limit(&self, authenticated: bool, env_override: Option<usize>) -> usize {
        if let Some(n) = env_override {
            return n;
        }
        if authenticated {
            if self.remaining() > 4000 {
                100
            } else {
                50
            }
        } else {
            30
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSource(RateLimitState);

    #[async_trait::async_trait]
    impl RateLimitSource for FixedSource {
        async fn fetch_rate_limit(&self) -> anyhow::Result<RateLimitState> {
            Ok(self.0)
        }
    }

    struct FailingSource;

    #[async_trait::async_trait]
    impl RateLimitSource for FailingSource {
        async fn fetch_rate_limit(&self) -> anyhow::Result<RateLimitState> {
            anyhow::bail!("network down")
        }
    }

    #[test]
    fn batch_size_scales_with_remaining() {
        let g = RateLimitGovernor::new(RateLimitState {
            remaining: 5000,
            reset_at: Utc::now(),
        });
        assert_eq!(g.optimal_batch_size(), 10);
        g.record_remaining(2000);
        assert_eq!(g.optimal_batch_size(), 5);
        g.record_remaining(500);
        assert_eq!(g.optimal_batch_size(), 3);
    }

    #[test]
    fn batch_delay_scales_with_remaining() {
        let g = RateLimitGovernor::new(RateLimitState {
            remaining: 5000,
            reset_at: Utc::now(),
        });
        assert_eq!(g.batch_delay_ms(), 100);
        g.record_remaining(999);
        assert_eq!(g.batch_delay_ms(), 500);
    }

    #[test]
    fn file_limit_respects_env_override_first() {
        let g = RateLimitGovernor::new(RateLimitState {
            remaining: 5000,
            reset_at: Utc::now(),
        });
        assert_eq!(g.file_limit(true, Some(12)), 12);
        assert_eq!(g.file_limit(true, None), 100);
        g.record_remaining(3000);
        assert_eq!(g.file_limit(true, None), 50);
        assert_eq!(g.file_limit(false, None), 30);
    }

    #[tokio::test]
    async fn check_and_wait_does_not_block_with_ample_quota() {
        let g = RateLimitGovernor::optimistic();
        let source = FixedSource(RateLimitState {
            remaining: 5000,
            reset_at: Utc::now(),
        });
        let start = std::time::Instant::now();
        g.check_and_wait(&source).await;
        assert!(start.elapsed() < std::time::Duration::from_millis(200));
    }

    #[tokio::test]
    async fn check_and_wait_blocks_until_reset_when_exhausted() {
        let g = RateLimitGovernor::optimistic();
        let reset_at = Utc::now() + chrono::Duration::seconds(1);
        let source = FixedSource(RateLimitState {
            remaining: 2,
            reset_at,
        });
        let start = std::time::Instant::now();
        g.check_and_wait(&source).await;
        assert!(start.elapsed() >= std::time::Duration::from_millis(900));
    }

    #[tokio::test]
    async fn check_and_wait_survives_refresh_failure() {
        let g = RateLimitGovernor::optimistic();
        g.check_and_wait(&FailingSource).await;
        // No panic, and prior state (ample) left untouched.
        assert_eq!(g.remaining(), i64::MAX);
    }
}
