//! Shared data model (spec §3): repositories, patterns, findings,
//! recommendations, training cases and prevention rules.
//!
//! JSON-shaped columns (`metadata`, `tags`, `categories`, `branches`,
//! `implementation_steps`, `code_examples`) are represented here as typed
//! Rust structures; the persistence layer (`db.rs`) is responsible for the
//! encode/decode boundary against opaque TEXT columns (spec §9).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

// ============================================================================
// Repository
// ============================================================================

/// `analysis_status` state machine (spec §4.12).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Pending,
    Analyzed,
    Failed,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Pending => "pending",
            AnalysisStatus::Analyzed => "analyzed",
            AnalysisStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(AnalysisStatus::Pending),
            "analyzed" => Some(AnalysisStatus::Analyzed),
            "failed" => Some(AnalysisStatus::Failed),
            _ => None,
        }
    }
}

/// A tracked repository (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub id: String,
    pub full_name: String,
    pub default_branch: String,
    pub primary_language: Option<String>,
    pub tech_stack_profile: Option<String>,
    pub categories: HashSet<String>,
    pub branches: Vec<String>,
    pub patterns_count: i64,
    pub analysis_status: AnalysisStatus,
    pub last_analyzed: Option<DateTime<Utc>>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Repository {
    pub fn owner_and_name(&self) -> Option<(&str, &str)> {
        self.full_name.split_once('/')
    }
}

// ============================================================================
// Pattern
// ============================================================================

/// A detected code construct (spec §3, §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub id: String,
    pub repository_id: String,
    pub pattern_type: String,
    pub category: String,
    pub subcategory: String,
    pub content: String,
    pub content_hash: String,
    pub file_path: String,
    pub line_start: u32,
    pub line_end: u32,
    pub language: String,
    pub confidence: f32,
    pub tags: HashSet<String>,
    pub context_before: String,
    pub context_after: String,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Pattern {
    /// The logical dedup key from spec §3.
    pub fn dedup_key(&self) -> (String, String, String, u32) {
        (
            self.repository_id.clone(),
            self.content_hash.clone(),
            self.file_path.clone(),
            self.line_start,
        )
    }
}

// ============================================================================
// Finding (transient — produced by C5, consumed by C7, never persisted)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityFinding {
    pub finding_type: String,
    pub severity: Severity,
    pub description: String,
    pub file_path: String,
    pub line_number: Option<u32>,
    pub recommendation_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeSafetyFinding {
    pub finding_type: String,
    pub description: String,
    pub file_path: String,
    pub line_number: Option<u32>,
    pub recommendation_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceFinding {
    pub finding_type: String,
    pub description: String,
    pub file_path: String,
    pub line_number: Option<u32>,
    pub recommendation_text: String,
}

/// Aggregated output of detection over one file (spec §4.5).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionResult {
    pub patterns: Vec<Pattern>,
    pub security: Vec<SecurityFinding>,
    pub type_safety: Vec<TypeSafetyFinding>,
    pub performance: Vec<PerformanceFinding>,
}

// ============================================================================
// Recommendation
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationType {
    Security,
    Architecture,
    Performance,
    BestPractices,
    PatternUsage,
    Migration,
    TypeSafety,
}

impl RecommendationType {
    /// Tie-break ordering for the engine's final prioritization
    /// (spec §4.7): security > architecture > performance > the rest (equal).
    fn tie_break_rank(&self) -> u8 {
        match self {
            RecommendationType::Security => 0,
            RecommendationType::Architecture => 1,
            RecommendationType::Performance => 2,
            RecommendationType::BestPractices
            | RecommendationType::PatternUsage
            | RecommendationType::Migration => 3,
            RecommendationType::TypeSafety => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    // Declared in highest-to-lowest order so `Ord` matches spec §4.7's
    // primary sort key (critical > high > medium > low).
    Critical,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationStatus {
    Active,
    Implemented,
    Dismissed,
    InProgress,
    Outdated,
}

impl RecommendationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationStatus::Active => "active",
            RecommendationStatus::Implemented => "implemented",
            RecommendationStatus::Dismissed => "dismissed",
            RecommendationStatus::InProgress => "in_progress",
            RecommendationStatus::Outdated => "outdated",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(RecommendationStatus::Active),
            "implemented" => Some(RecommendationStatus::Implemented),
            "dismissed" => Some(RecommendationStatus::Dismissed),
            "in_progress" => Some(RecommendationStatus::InProgress),
            "outdated" => Some(RecommendationStatus::Outdated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeExample {
    pub title: String,
    pub before: String,
    pub after: String,
    pub language: String,
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImplementationStep {
    pub step_no: u32,
    pub title: String,
    pub description: String,
    pub estimated_time: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecommendationMetrics {
    pub time_saved: Option<String>,
    pub bugs_prevented: Option<String>,
    pub performance_gain: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: String,
    pub repository_id: String,
    pub title: String,
    pub description: String,
    pub recommendation_type: RecommendationType,
    pub priority: Priority,
    pub applicable_patterns: HashSet<String>,
    pub code_examples: Vec<CodeExample>,
    pub implementation_steps: Vec<ImplementationStep>,
    pub estimated_effort: String,
    pub tags: HashSet<String>,
    pub status: RecommendationStatus,
    pub metrics: RecommendationMetrics,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Sort key implementing spec §4.7's prioritization contract: primary by
/// `priority`, tie-broken by `recommendation_type`. Stable w.r.t. insertion
/// order among equals (guaranteed by using a stable sort at the call site).
pub fn recommendation_sort_key(r: &Recommendation) -> (Priority, u8) {
    (r.priority, r.recommendation_type.tie_break_rank())
}

// ============================================================================
// Training case & prevention rules (C9)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseType {
    FalsePositive,
    FalseNegative,
    Accurate,
    Improvement,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingCase {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub case_type: CaseType,
    pub recommendation_snapshot: Recommendation,
    pub analysis_snapshot: serde_json::Value,
    pub validation_outcome: serde_json::Value,
    pub lessons: Vec<String>,
    pub prevention_rules: Vec<PreventionRule>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreventionAction {
    Reject,
    Modify,
    FlagForReview,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreventionRule {
    pub name: String,
    pub condition: PreventionCondition,
    pub action: PreventionAction,
    pub confidence: f32,
    pub description: String,
}

/// The closed set of recognized prevention-rule conditions (spec §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PreventionCondition {
    TitleAndDescriptionContain { title: String, description: String },
    SophisticatedPatternIncludes { pattern: String },
    CodebaseHasErrorHandlingStack,
}
