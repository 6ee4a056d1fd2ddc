//! # codeforge-intel — Multi-Repository Code Intelligence Engine
//!
//! Periodically scans a set of source repositories through a hosted
//! code-forge API, extracts structural and anti-pattern signals, generates
//! targeted refactoring recommendations per tech-stack profile, and
//! validates those recommendations against the live codebase before
//! persisting them.
//!
//! ## Pipeline
//!
//! - Rate-limit-aware, concurrent file scanning with retry/backoff/caching
//!   ([`governor`], [`retry`], [`cache`], [`pipeline`])
//! - Regex-based pattern and issue detection ([`detector`])
//! - Tech-stack classification and profile-specific recommendation
//!   generators ([`classifier`], [`generators`])
//! - Quality validation against a learned prevention-rule store
//!   ([`validator`], [`training`])
//! - SQLite persistence with idempotent upsert and stale-recommendation
//!   aging ([`db`])
//! - Periodic orchestration across every analyzed repository ([`scheduler`])

pub mod cache;
pub mod classifier;
pub mod config;
pub mod db;
pub mod detector;
pub mod error;
pub mod forge;
pub mod generators;
pub mod governor;
pub mod metrics;
pub mod pipeline;
pub mod retry;
pub mod scheduler;
pub mod training;
pub mod types;
pub mod validator;

pub use cache::{FileCache, FileCacheKey};
pub use classifier::{classify, Classification, Profile};
pub use config::{ScannerConfig, CODE_EXTENSIONS, EXCLUDED_PATH_FRAGMENTS};
pub use db::Database;
pub use detector::{content_hash, detect, detect_language};
pub use error::{CoreError, ForbiddenKind, PersistenceError, PersistenceResult, RemoteError, Result};
pub use forge::{FileEntry, ForgeClient, ForgeClientConfig};
pub use generators::{generator_for, GeneratorContext, GeneratorEntry, ScanCounts};
pub use governor::{RateLimitGovernor, RateLimitSource, RateLimitState};
pub use metrics::{global_registry, snapshot as metrics_snapshot, MetricsRegistry, MetricsSnapshot};
pub use pipeline::{FilePipeline, ScanMetrics, ScanResult};
pub use scheduler::Scheduler;
pub use training::{make_case_id, TrainingStore};
pub use types::*;
pub use validator::{
    select_validation_files, validate, validate_repository, RecommendationAction,
    ValidationCategory, ValidationOutcome,
};

/// Test-only helpers shared by unit and integration tests.
///
/// Library code never initializes a global subscriber (non-goal: this crate
/// is embedded, not a binary), so this convenience lives behind `#[cfg(test)]`
/// rather than in the public API surface.
#[cfg(test)]
pub mod test_support {
    use std::sync::Once;

    static INIT: Once = Once::new();

    /// Installs a `tracing_subscriber::EnvFilter`-driven subscriber once per
    /// test process, honoring `RUST_LOG` (defaulting to `info` when unset).
    /// Safe to call from every test; subsequent calls are no-ops.
    pub fn init_tracing() {
        INIT.call_once(|| {
            let filter = tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_test_writer()
                .try_init();
        });
    }
}

/// Re-export of the crate's most commonly used types.
pub mod prelude {
    pub use crate::classifier::{classify, Classification, Profile};
    pub use crate::config::ScannerConfig;
    pub use crate::db::Database;
    pub use crate::error::{CoreError, PersistenceError, Result};
    pub use crate::forge::{FileEntry, ForgeClient, ForgeClientConfig};
    pub use crate::generators::{generator_for, GeneratorContext, ScanCounts};
    pub use crate::governor::RateLimitGovernor;
    pub use crate::metrics::{global_registry, MetricsRegistry, MetricsSnapshot};
    pub use crate::pipeline::{FilePipeline, ScanResult};
    pub use crate::scheduler::Scheduler;
    pub use crate::training::TrainingStore;
    pub use crate::types::*;
    pub use crate::validator::{validate_repository, ValidationOutcome};
}
