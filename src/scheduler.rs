//! Scheduler (C11).
//!
//! Periodic orchestration of the full pipeline across every analyzed
//! repository, grounded in `auto_scanner.rs`'s interval loop: an
//! `AtomicBool` running flag checked between passes and between
//! repositories within a pass, so `stop()` is cooperative rather than a hard
//! cancel — an in-flight per-repository scan always finishes.

use crate::classifier;
use crate::config::ScannerConfig;
use crate::db::Database;
use crate::error::CoreError;
use crate::forge::ForgeClient;
use crate::generators::{self, GeneratorContext, ScanCounts};
use crate::metrics;
use crate::pipeline::FilePipeline;
use crate::training::TrainingStore;
use crate::types::Repository;
use crate::validator::{self, RecommendationAction};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Delay between repositories within a scheduled pass (spec §4.11: "API
/// politeness").
const INTER_REPO_DELAY_MS: u64 = 2000;
/// Age after which an active recommendation is marked outdated (spec §4.11).
const STALE_RECOMMENDATION_DAYS: i64 = 30;

/// Priority bucket a repository falls into for a given pass, driving its
/// re-scan interval (spec §4.11).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanPriority {
    High,
    Medium,
    Low,
}

impl ScanPriority {
    fn interval_hours(self) -> i64 {
        match self {
            ScanPriority::High => 4,
            ScanPriority::Medium => 12,
            ScanPriority::Low => 24,
        }
    }
}

/// Rule from spec §4.11: `patterns_count > 100` or a `"react"` category
/// forces high priority; `patterns_count < 20` is low; everything else is
/// medium.
fn priority_for(repo: &Repository) -> ScanPriority {
    if repo.patterns_count > 100 || repo.categories.contains("react") {
        ScanPriority::High
    } else if repo.patterns_count < 20 {
        ScanPriority::Low
    } else {
        ScanPriority::Medium
    }
}

fn is_due(repo: &Repository, now: DateTime<Utc>) -> bool {
    match repo.last_analyzed {
        None => true,
        Some(last_analyzed) => {
            now - last_analyzed >= ChronoDuration::hours(priority_for(repo).interval_hours())
        }
    }
}

/// Periodic driver for the whole scan-validate-persist cycle.
pub struct Scheduler {
    pipeline: FilePipeline,
    forge: Arc<ForgeClient>,
    db: Database,
    training: TrainingStore,
    config: ScannerConfig,
    running: AtomicBool,
}

impl Scheduler {
    pub fn new(
        pipeline: FilePipeline,
        forge: Arc<ForgeClient>,
        db: Database,
        training: TrainingStore,
        config: ScannerConfig,
    ) -> Self {
        Self {
            pipeline,
            forge,
            db,
            training,
            config,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run one scheduled pass immediately, then every `interval_minutes`
    /// thereafter, until `stop()` is called (spec §4.11). Intended to be
    /// spawned as a background task: `tokio::spawn(scheduler.start(60))`.
    pub async fn start(self: Arc<Self>, interval_minutes: u64) {
        self.running.store(true, Ordering::SeqCst);
        info!(interval_minutes, "scheduler starting");

        while self.running.load(Ordering::SeqCst) {
            if let Err(e) = self.run_pass().await {
                error!("scheduled pass failed: {e}");
            }
            if !self.sleep_interruptibly(Duration::from_secs(interval_minutes * 60)).await {
                break;
            }
        }

        info!("scheduler stopped");
    }

    /// Cancel the timer and stop after the current pass. In-flight
    /// per-repository scans are never interrupted (spec §4.11/§5).
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Sleeps in short slices so `stop()` is noticed promptly instead of
    /// only at the end of a full interval. Returns `false` if stopped mid-sleep.
    async fn sleep_interruptibly(&self, total: Duration) -> bool {
        const SLICE: Duration = Duration::from_secs(1);
        let mut remaining = total;
        while remaining > Duration::ZERO {
            if !self.running.load(Ordering::SeqCst) {
                return false;
            }
            let step = remaining.min(SLICE);
            tokio::time::sleep(step).await;
            remaining -= step;
        }
        self.running.load(Ordering::SeqCst)
    }

    /// Bypasses the due-list and scans a single repository immediately
    /// (spec §4.11: "Manual trigger").
    pub async fn scan_repository_manually(&self, repository_id: &str) -> Result<(), CoreError> {
        let repo = self
            .db
            .get_repository(repository_id)
            .await?
            .ok_or_else(|| CoreError::Validation(format!("unknown repository '{repository_id}'")))?;
        self.scan_one(&repo).await
    }

    async fn run_pass(&self) -> Result<(), CoreError> {
        let repos = self.db.list_analyzed_repositories().await?;
        let now = Utc::now();
        let due: Vec<Repository> = repos.into_iter().filter(|r| is_due(r, now)).collect();
        info!(due = due.len(), "scheduled pass starting");

        for (idx, repo) in due.iter().enumerate() {
            if !self.running.load(Ordering::SeqCst) {
                warn!("scheduler stopped mid-pass, ending early");
                break;
            }

            if let Err(e) = self.scan_one(repo).await {
                error!(repository = %repo.full_name, "scheduled scan failed: {e}");
            }

            if idx + 1 < due.len() {
                tokio::time::sleep(Duration::from_millis(INTER_REPO_DELAY_MS)).await;
            }
        }

        let cutoff = now - ChronoDuration::days(STALE_RECOMMENDATION_DAYS);
        let aged = self.db.age_stale_recommendations(cutoff).await?;
        let deduped = self.db.cleanup_duplicate_recommendations().await?;
        info!(aged, deduped, "scheduled pass finished");

        Ok(())
    }

    /// Full pipeline run for one repository: scan (C3-C5), classify and
    /// generate (C6-C7), validate (C8), persist (C10) in the fixed order
    /// `clear_repository_recommendations` -> `insert_recommendations_unique`
    /// -> `replace_patterns` -> `upsert_repository` (spec §4.11 step 4).
    async fn scan_one(&self, repo: &Repository) -> Result<(), CoreError> {
        let Some((owner, repo_name)) = repo.owner_and_name() else {
            return Err(CoreError::Validation(format!(
                "repository full_name '{}' is not in 'owner/repo' form",
                repo.full_name
            )));
        };

        let scan = self.pipeline.scan(repo).await;
        if !scan.successful {
            return Err(CoreError::Fatal(
                scan.error_message.unwrap_or_else(|| "scan failed with no error message".to_string()),
            ));
        }
        metrics::global_registry().record_files_scanned(scan.metrics.files_scanned);
        metrics::global_registry().record_patterns_emitted(scan.patterns.len() as u64);

        let classification = classifier::classify(&repo.categories, repo.primary_language.clone());
        let entry = generators::generator_for(classification.profile);
        let ctx = GeneratorContext {
            repository_id: &repo.id,
            patterns: &scan.patterns,
        };
        let counts = ScanCounts {
            security_count: scan.security.len(),
            type_safety_count: scan.type_safety.len(),
            performance_count: scan.performance.len(),
        };

        let mut recommendations = (entry.generate)(&ctx);
        recommendations.extend((entry.generate_from_scan)(&ctx, &counts));

        let prevention_rules = self.training.load_prevention_rules().await.unwrap_or_else(|e| {
            warn!("failed to load prevention rules, validating with an empty set: {e}");
            Vec::new()
        });

        let mut accepted = Vec::with_capacity(recommendations.len());
        for mut recommendation in recommendations {
            let outcome = validator::validate_repository(
                &self.forge,
                owner,
                repo_name,
                &repo.default_branch,
                &mut recommendation,
                &prevention_rules,
                &self.config,
            )
            .await;
            metrics::global_registry().record_recommendation_validated();

            if matches!(outcome.recommendation_action, RecommendationAction::Reject) {
                metrics::global_registry().record_recommendation_rejected();
                let snapshot = serde_json::json!({
                    "security_count": counts.security_count,
                    "type_safety_count": counts.type_safety_count,
                    "performance_count": counts.performance_count,
                });
                if let Err(e) = self
                    .training
                    .record_rejection(&recommendation, &outcome, snapshot, Vec::new(), Utc::now().timestamp_millis())
                    .await
                {
                    warn!("failed to persist training case: {e}");
                }
                continue;
            }

            accepted.push(recommendation);
        }

        self.db.clear_repository_recommendations(&repo.id).await?;
        let inserted = self.db.insert_recommendations_unique(&accepted).await?;
        for _ in 0..inserted {
            metrics::global_registry().record_recommendation_generated();
        }
        self.db.replace_patterns(&repo.id, &scan.patterns).await?;

        let mut refreshed = repo.clone();
        refreshed.patterns_count = scan.patterns.len() as i64;
        refreshed.last_analyzed = Some(Utc::now());
        self.db.upsert_repository(&refreshed).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AnalysisStatus;
    use std::collections::{HashMap, HashSet};

    fn repo(patterns_count: i64, categories: &[&str], last_analyzed: Option<DateTime<Utc>>) -> Repository {
        Repository {
            id: "r1".to_string(),
            full_name: "acme/widgets".to_string(),
            default_branch: "main".to_string(),
            primary_language: None,
            tech_stack_profile: None,
            categories: categories.iter().map(|c| c.to_string()).collect::<HashSet<_>>(),
            branches: Vec::new(),
            patterns_count,
            analysis_status: AnalysisStatus::Analyzed,
            last_analyzed,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn high_priority_from_pattern_count() {
        assert_eq!(priority_for(&repo(150, &[], None)), ScanPriority::High);
    }

    #[test]
    fn high_priority_from_react_category() {
        assert_eq!(priority_for(&repo(5, &["react"], None)), ScanPriority::High);
    }

    #[test]
    fn low_priority_under_twenty_patterns() {
        assert_eq!(priority_for(&repo(10, &[], None)), ScanPriority::Low);
    }

    #[test]
    fn medium_priority_otherwise() {
        assert_eq!(priority_for(&repo(50, &[], None)), ScanPriority::Medium);
    }

    #[test]
    fn never_analyzed_is_always_due() {
        assert!(is_due(&repo(50, &[], None), Utc::now()));
    }

    #[test]
    fn due_once_the_priority_interval_has_elapsed() {
        let now = Utc::now();
        let stale_medium = repo(50, &[], Some(now - ChronoDuration::hours(13)));
        let fresh_medium = repo(50, &[], Some(now - ChronoDuration::hours(1)));
        assert!(is_due(&stale_medium, now));
        assert!(!is_due(&fresh_medium, now));
    }
}
