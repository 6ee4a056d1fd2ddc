//! Plain atomic metrics counters (SPEC_FULL.md supplement).
//!
//! The teacher's `MetricsRegistry` is a full Prometheus-shaped registry with
//! labeled counters/gauges/histograms and an HTTP export surface. This crate
//! has no HTTP surface (non-goal) and a fixed, small set of things worth
//! counting, so it keeps only the teacher's global-singleton shape
//! (`once_cell::sync::Lazy<Arc<...>>`) and drops the label/export machinery.

use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Default)]
pub struct MetricsRegistry {
    files_scanned: AtomicU64,
    patterns_emitted: AtomicU64,
    recommendations_generated: AtomicU64,
    recommendations_validated: AtomicU64,
    recommendations_rejected: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    retries: AtomicU64,
    rate_limit_waits: AtomicU64,
}

impl MetricsRegistry {
    fn new() -> Self {
        Self::default()
    }

    pub fn record_files_scanned(&self, n: u64) {
        self.files_scanned.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_patterns_emitted(&self, n: u64) {
        self.patterns_emitted.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_recommendation_generated(&self) {
        self.recommendations_generated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_recommendation_validated(&self) {
        self.recommendations_validated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_recommendation_rejected(&self) {
        self.recommendations_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limit_wait(&self) {
        self.rate_limit_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            files_scanned: self.files_scanned.load(Ordering::Relaxed),
            patterns_emitted: self.patterns_emitted.load(Ordering::Relaxed),
            recommendations_generated: self.recommendations_generated.load(Ordering::Relaxed),
            recommendations_validated: self.recommendations_validated.load(Ordering::Relaxed),
            recommendations_rejected: self.recommendations_rejected.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            rate_limit_waits: self.rate_limit_waits.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub files_scanned: u64,
    pub patterns_emitted: u64,
    pub recommendations_generated: u64,
    pub recommendations_validated: u64,
    pub recommendations_rejected: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub retries: u64,
    pub rate_limit_waits: u64,
}

static GLOBAL_REGISTRY: Lazy<Arc<MetricsRegistry>> = Lazy::new(|| Arc::new(MetricsRegistry::new()));

/// The process-wide registry every component increments into (spec §9:
/// "process-wide state... must be passed explicitly into the pipeline" is
/// about the governor/cache; metrics counters are the one piece of state
/// this crate accepts as a genuine global, since there is exactly one
/// correct place to add a count and no test depends on isolating it).
pub fn global_registry() -> Arc<MetricsRegistry> {
    Arc::clone(&GLOBAL_REGISTRY)
}

/// Snapshot of the global registry for an embedding application to read and
/// expose however it likes (no HTTP surface here, per SPEC_FULL.md).
pub fn snapshot() -> MetricsSnapshot {
    GLOBAL_REGISTRY.snapshot()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_independently_per_registry() {
        let registry = MetricsRegistry::new();
        registry.record_files_scanned(3);
        registry.record_cache_hit();
        registry.record_cache_hit();
        registry.record_cache_miss();
        registry.record_recommendation_rejected();

        let snap = registry.snapshot();
        assert_eq!(snap.files_scanned, 3);
        assert_eq!(snap.cache_hits, 2);
        assert_eq!(snap.cache_misses, 1);
        assert_eq!(snap.recommendations_rejected, 1);
        assert_eq!(snap.retries, 0);
    }

    #[test]
    fn fresh_registry_starts_at_zero() {
        let registry = MetricsRegistry::new();
        assert_eq!(registry.snapshot(), MetricsSnapshot::default());
    }
}
