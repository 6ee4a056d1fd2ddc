//! End-to-end scenarios wiring detection, classification, generation,
//! validation and persistence together against a real (in-memory) SQLite
//! database. Network-bound scenarios (the remote code-forge client) are
//! exercised at the unit level in `forge::client` and `governor`, since this
//! crate has no mock HTTP server dependency to stand in for the real API.

use chrono::{Duration as ChronoDuration, Utc};
use codeforge_intel::classifier::{self, Profile};
use codeforge_intel::db::Database;
use codeforge_intel::detector;
use codeforge_intel::generators::{self, GeneratorContext, ScanCounts};
use codeforge_intel::training::TrainingStore;
use codeforge_intel::types::{
    AnalysisStatus, Priority, Recommendation, RecommendationMetrics, RecommendationStatus,
    RecommendationType, Repository,
};
use codeforge_intel::validator::{self, RecommendationAction};
use std::collections::{HashMap, HashSet};

mod common;

fn blank_repository(id: &str) -> Repository {
    Repository {
        id: id.to_string(),
        full_name: format!("acme/{id}"),
        default_branch: "main".to_string(),
        primary_language: Some("TypeScript".to_string()),
        tech_stack_profile: None,
        categories: HashSet::new(),
        branches: vec!["main".to_string()],
        patterns_count: 0,
        analysis_status: AnalysisStatus::Pending,
        last_analyzed: None,
        metadata: HashMap::new(),
    }
}

fn recommendation(title: &str, description: &str) -> Recommendation {
    let now = Utc::now();
    Recommendation {
        id: uuid::Uuid::new_v4().to_string(),
        repository_id: "repo1".to_string(),
        title: title.to_string(),
        description: description.to_string(),
        recommendation_type: RecommendationType::BestPractices,
        priority: Priority::Medium,
        applicable_patterns: HashSet::new(),
        code_examples: Vec::new(),
        implementation_steps: Vec::new(),
        estimated_effort: "1h".to_string(),
        tags: HashSet::new(),
        status: RecommendationStatus::Active,
        metrics: RecommendationMetrics::default(),
        created_at: now,
        updated_at: now,
        metadata: HashMap::new(),
    }
}

/// Scenario 1: an empty repository scan persists a zero-pattern, analyzed
/// repository with `last_analyzed` set.
#[tokio::test]
async fn empty_repository_scan_persists_zero_patterns_and_analyzed_timestamp() {
    common::init_tracing();
    let db = Database::connect("sqlite::memory:").await.unwrap();
    let mut repo = blank_repository("repo-empty");

    db.replace_patterns(&repo.id, &[]).await.unwrap();
    repo.patterns_count = 0;
    repo.analysis_status = AnalysisStatus::Analyzed;
    repo.last_analyzed = Some(Utc::now());
    db.upsert_repository(&repo).await.unwrap();

    let stored = db.get_repository(&repo.id).await.unwrap().expect("repository persisted");
    assert_eq!(stored.patterns_count, 0);
    assert!(stored.last_analyzed.is_some());

    let recs = db.list_active_recommendations(&repo.id).await.unwrap();
    assert!(recs.is_empty());
}

/// Scenario 2: a single file with mixed issues drives detection, the
/// `devops-monitoring` profile's issue-driven generator, and a zero-count
/// repository produces no such recommendation.
#[tokio::test]
async fn mixed_issue_file_drives_exactly_one_security_recommendation() {
    common::init_tracing();
    let text = r#"
import express from 'express';

const app = express();

function handler(req, res) {
  const config: any = req.body;
  const data = fs.readFileSync('./file.txt');
  res.send(data);
}
"#;
    let detection = detector::detect(text, "app.ts");
    assert!(detection.patterns.iter().any(|p| p.pattern_type == "import_statement"));
    assert!(detection.patterns.iter().any(|p| p.pattern_type == "function_declaration"));
    assert!(!detection.security.is_empty());

    let mut categories = HashSet::new();
    categories.insert("devops".to_string());
    let classification = classifier::classify(&categories, Some("TypeScript".to_string()));
    assert_eq!(classification.profile, Profile::DevopsMonitoring);

    let entry = generators::generator_for(classification.profile);
    let ctx = GeneratorContext {
        repository_id: "repo1",
        patterns: &detection.patterns,
    };

    let with_issues = ScanCounts {
        security_count: detection.security.len(),
        type_safety_count: 0,
        performance_count: 0,
    };
    let recs = (entry.generate_from_scan)(&ctx, &with_issues);
    let security_recs: Vec<_> = recs
        .iter()
        .filter(|r| r.recommendation_type == RecommendationType::Security)
        .collect();
    assert_eq!(security_recs.len(), 1);

    let no_issues = ScanCounts::default();
    assert!((entry.generate_from_scan)(&ctx, &no_issues).is_empty());
}

/// Scenario 4: a candidate recommendation falsely claiming 0% error-handling
/// coverage against a file with real try/catch coverage is rejected and
/// produces exactly one training case; it never reaches the persisted set.
#[tokio::test]
async fn false_positive_error_handling_claim_is_rejected_and_recorded() {
    common::init_tracing();
    let error_handler = r#"
function handleA(req, res) {
  try {
    doWork();
  } catch (err) {
    log(err);
  }
}

function handleB(req, res) {
  try {
    doWork();
  } catch (err) {
    log(err);
  }
}

function handleC(req, res) {
  try {
    doWork();
  } catch (err) {
    log(err);
  }
}
"#;
    let files = vec![("src/errorHandler.ts".to_string(), error_handler.to_string())];
    let candidate = recommendation(
        "Improve Error Handling Coverage",
        "Only 0% of functions have proper error handling",
    );

    let outcome = validator::validate(&candidate, &files, &[]);
    assert_eq!(outcome.recommendation_action, RecommendationAction::Reject);
    assert!(!outcome.valid);
    assert!(outcome.actual_coverage.unwrap() > 50.0);

    let dir = tempfile::tempdir().unwrap();
    let store = TrainingStore::new(dir.path());
    store
        .record_rejection(&candidate, &outcome, serde_json::json!({}), Vec::new(), 1_700_000_000_000)
        .await
        .unwrap();

    let case_files: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("training-case-false-positive-"))
        .collect();
    assert_eq!(case_files.len(), 1);

    // A validation pipeline only ever forwards non-rejected recommendations
    // to persistence; the rejected one above never reaches `accepted`.
    let db = Database::connect("sqlite::memory:").await.unwrap();
    let accepted: Vec<Recommendation> = Vec::new();
    db.clear_repository_recommendations("repo1").await.unwrap();
    let inserted = db.insert_recommendations_unique(&accepted).await.unwrap();
    assert_eq!(inserted, 0);
    let stored = db.list_active_recommendations("repo1").await.unwrap();
    assert!(stored.is_empty());
}

/// Scenario 5: two passes over an unchanged recommendation set never create
/// duplicates and `cleanup_duplicate_recommendations` finds nothing to do.
#[tokio::test]
async fn repeated_passes_on_unchanged_repository_do_not_duplicate_recommendations() {
    common::init_tracing();
    let db = Database::connect("sqlite::memory:").await.unwrap();
    let repo_id = "repo-dedup";

    let recs = vec![
        recommendation("Add Centralized Monitoring Instrumentation", "desc a"),
        recommendation("Tighten Type Annotations", "desc b"),
    ];
    let recs: Vec<Recommendation> = recs
        .into_iter()
        .map(|mut r| {
            r.repository_id = repo_id.to_string();
            r
        })
        .collect();

    let inserted_pass_1 = db.insert_recommendations_unique(&recs).await.unwrap();
    assert_eq!(inserted_pass_1, 2);

    // Pass 2: same titles, same repository - the unique-by-title rule must
    // skip every one of them.
    let inserted_pass_2 = db.insert_recommendations_unique(&recs).await.unwrap();
    assert_eq!(inserted_pass_2, 0);

    let active = db.list_active_recommendations(repo_id).await.unwrap();
    assert_eq!(active.len(), 2);

    let removed = db.cleanup_duplicate_recommendations().await.unwrap();
    assert_eq!(removed, 0);
}

/// Scenario 6: a 31-day-old active recommendation ages to outdated while a
/// 29-day-old sibling stays active.
#[tokio::test]
async fn aging_moves_only_recommendations_past_the_cutoff() {
    common::init_tracing();
    let db = Database::connect("sqlite::memory:").await.unwrap();
    let repo_id = "repo-aging";

    let mut old = recommendation("Old Recommendation", "stale");
    old.repository_id = repo_id.to_string();
    old.created_at = Utc::now() - ChronoDuration::days(31);

    let mut fresh = recommendation("Fresh Recommendation", "current");
    fresh.repository_id = repo_id.to_string();
    fresh.created_at = Utc::now() - ChronoDuration::days(29);

    db.insert_recommendations_unique(&[old, fresh]).await.unwrap();

    let cutoff = Utc::now() - ChronoDuration::days(30);
    let aged = db.age_stale_recommendations(cutoff).await.unwrap();
    assert_eq!(aged, 1);

    let active = db.list_active_recommendations(repo_id).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].title, "Fresh Recommendation");
}
