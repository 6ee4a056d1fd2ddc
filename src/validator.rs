//! Quality Validator (C8).
//!
//! Checks a candidate recommendation against the live repository text before
//! it is ever persisted. The error-handling coverage formula is a pure
//! function over fetched file contents (`validate`); `validate_repository`
//! adds the I/O (tree + blob fetch) and is the only part that can fail, per
//! spec §4.8's "validation itself fails" fallback.

use crate::config::{ScannerConfig, CODE_EXTENSIONS, EXCLUDED_PATH_FRAGMENTS};
use crate::detector;
use crate::forge::ForgeClient;
use crate::types::{PreventionAction, PreventionCondition, PreventionRule, Recommendation};
use once_cell::sync::Lazy;
use regex::Regex;

/// Keyword-derived recommendation category (spec §4.8 step 1) — closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationCategory {
    ErrorHandling,
    Testing,
    Security,
    Performance,
    General,
}

fn categorize(title: &str, description: &str) -> ValidationCategory {
    let haystack = format!("{title} {description}").to_lowercase();
    if haystack.contains("error handling") || haystack.contains("error-handling") {
        ValidationCategory::ErrorHandling
    } else if haystack.contains("test") {
        ValidationCategory::Testing
    } else if haystack.contains("security") || haystack.contains("secure") {
        ValidationCategory::Security
    } else if haystack.contains("performance") || haystack.contains("perf") {
        ValidationCategory::Performance
    } else {
        ValidationCategory::General
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecommendationAction {
    Approve,
    Reject,
    Modify,
}

#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub confidence: f32,
    pub actual_coverage: Option<f32>,
    pub conflicting_evidence: Vec<String>,
    pub supporting_evidence: Vec<String>,
    pub recommendation_action: RecommendationAction,
    pub modification_suggestions: Vec<String>,
}

impl Default for ValidationOutcome {
    fn default() -> Self {
        Self {
            valid: true,
            confidence: 0.7,
            actual_coverage: None,
            conflicting_evidence: Vec::new(),
            supporting_evidence: Vec::new(),
            recommendation_action: RecommendationAction::Approve,
            modification_suggestions: Vec::new(),
        }
    }
}

// Weighted error-handling indicator rules (spec §4.8 step 2). Everything
// beyond plain try/catch counts as a "sophisticated" indicator for the
// rejection rule in step 3 — the source leaves this set unnamed (spec §9),
// this is the closed set chosen here.
static RE_TRY_CATCH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\btry\b\s*\{.{0,2000}?\}\s*catch\s*\(").unwrap());
static RE_CUSTOM_ERROR_CLASS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bclass\s+\w*Error\b").unwrap());
static RE_ASYNC_ERROR_HANDLING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.catch\s*\(\s*(?:async\s*)?\(?\w*\)?\s*=>").unwrap());
static RE_MIDDLEWARE_ERROR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(\s*err\s*,\s*req\s*,\s*res\s*,\s*next\s*\)").unwrap());
static RE_DB_ERROR_WRAPPER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\bcatch\s*\([^)]*\)\s*\{[^{}]{0,300}?\b(?:query|transaction|pool|connection)\b")
        .unwrap()
});

struct WeightedRule {
    name: &'static str,
    weight: f32,
    regex: &'static Lazy<Regex>,
    sophisticated: bool,
}

static WEIGHTED_RULES: &[WeightedRule] = &[
    WeightedRule {
        name: "try_catch",
        weight: 1.0,
        regex: &RE_TRY_CATCH,
        sophisticated: false,
    },
    WeightedRule {
        name: "custom_error_class",
        weight: 1.5,
        regex: &RE_CUSTOM_ERROR_CLASS,
        sophisticated: true,
    },
    WeightedRule {
        name: "async_error_handling",
        weight: 1.2,
        regex: &RE_ASYNC_ERROR_HANDLING,
        sophisticated: true,
    },
    WeightedRule {
        name: "middleware_error_handling",
        weight: 2.0,
        regex: &RE_MIDDLEWARE_ERROR,
        sophisticated: true,
    },
    WeightedRule {
        name: "db_error_wrapper",
        weight: 1.5,
        regex: &RE_DB_ERROR_WRAPPER,
        sophisticated: true,
    },
];

struct CoverageAnalysis {
    actual_coverage: f32,
    supporting_evidence: Vec<String>,
    sophisticated_present: bool,
}

/// spec §4.8 step 2: walk the filtered file set, count function-like
/// declarations and weighted error-handling matches, and compute
/// `min(weighted_count, function_count) / function_count * 100` (spec §9
/// preserves this clamp as-is, including its known over/under-count quirk).
fn analyze_error_handling(files: &[(String, String)]) -> CoverageAnalysis {
    let mut function_count = 0usize;
    let mut weighted_count = 0.0f32;
    let mut supporting_evidence = Vec::new();
    let mut sophisticated_present = false;

    for (path, content) in files {
        function_count += detector::count_function_like(content);

        for rule in WEIGHTED_RULES {
            let matches = rule.regex.find_iter(content).count();
            if matches > 0 {
                weighted_count += rule.weight * matches as f32;
                supporting_evidence.push(format!(
                    "{path}: {matches} match(es) of '{}' (weight {})",
                    rule.name, rule.weight
                ));
                if rule.sophisticated {
                    sophisticated_present = true;
                }
            }
        }
    }

    let actual_coverage = if function_count == 0 {
        0.0
    } else {
        weighted_count.min(function_count as f32) / function_count as f32 * 100.0
    };

    CoverageAnalysis {
        actual_coverage,
        supporting_evidence,
        sophisticated_present,
    }
}

/// Pure validation core (spec §4.8 steps 1-4). `files` is the filtered,
/// already-fetched `(path, content)` set — see [`select_validation_files`]
/// for the filter and [`validate_repository`] for the I/O wrapper.
pub fn validate(
    recommendation: &Recommendation,
    files: &[(String, String)],
    prevention_rules: &[PreventionRule],
) -> ValidationOutcome {
    let mut outcome = ValidationOutcome::default();
    let category = categorize(&recommendation.title, &recommendation.description);

    if category == ValidationCategory::ErrorHandling {
        let analysis = analyze_error_handling(files);
        outcome.actual_coverage = Some(analysis.actual_coverage);
        outcome.supporting_evidence = analysis.supporting_evidence;

        let title_lower = recommendation.title.to_lowercase();
        let desc_lower = recommendation.description.to_lowercase();
        let claims_zero_coverage = (title_lower.contains("error handling")
            || title_lower.contains("error-handling"))
            && (desc_lower.contains("0%") || desc_lower.contains("only 0%"));

        if claims_zero_coverage
            && (analysis.actual_coverage > 50.0 || analysis.sophisticated_present)
        {
            outcome.valid = false;
            outcome.confidence = 0.1;
            outcome.recommendation_action = RecommendationAction::Reject;
            outcome.conflicting_evidence.push(format!(
                "recommendation claims ~0% error-handling coverage, but measured coverage is {:.1}% ({})",
                analysis.actual_coverage,
                if analysis.sophisticated_present {
                    "sophisticated error handling present"
                } else {
                    "coverage exceeds 50%"
                }
            ));
        }
    }

    apply_prevention_rules(recommendation, &category, &mut outcome, prevention_rules);
    outcome
}

/// spec §4.8 step 4: the highest-confidence matching prevention rule wins.
fn apply_prevention_rules(
    recommendation: &Recommendation,
    category: &ValidationCategory,
    outcome: &mut ValidationOutcome,
    rules: &[PreventionRule],
) {
    let mut winner: Option<&PreventionRule> = None;
    for rule in rules {
        if evaluate_condition(&rule.condition, recommendation, category)
            && winner.map(|w| rule.confidence > w.confidence).unwrap_or(true)
        {
            winner = Some(rule);
        }
    }

    let Some(rule) = winner else { return };
    outcome.confidence = outcome.confidence.max(rule.confidence);
    match rule.action {
        PreventionAction::Reject => {
            outcome.valid = false;
            outcome.recommendation_action = RecommendationAction::Reject;
            outcome
                .conflicting_evidence
                .push(format!("prevention rule '{}' rejected: {}", rule.name, rule.description));
        }
        PreventionAction::Modify => {
            outcome.recommendation_action = RecommendationAction::Modify;
            outcome.modification_suggestions.push(rule.description.clone());
        }
        PreventionAction::FlagForReview => {
            outcome
                .supporting_evidence
                .push(format!("flagged for review by rule '{}'", rule.name));
        }
    }
}

/// The closed `evaluateCondition` predicate set (spec §4.9).
fn evaluate_condition(
    condition: &PreventionCondition,
    recommendation: &Recommendation,
    category: &ValidationCategory,
) -> bool {
    match condition {
        PreventionCondition::TitleAndDescriptionContain { title, description } => {
            recommendation.title.to_lowercase().contains(&title.to_lowercase())
                && recommendation
                    .description
                    .to_lowercase()
                    .contains(&description.to_lowercase())
        }
        PreventionCondition::SophisticatedPatternIncludes { pattern } => {
            WEIGHTED_RULES
                .iter()
                .any(|r| r.sophisticated && r.name == pattern)
        }
        PreventionCondition::CodebaseHasErrorHandlingStack => {
            *category == ValidationCategory::ErrorHandling
        }
    }
}

/// Same file filter as the file pipeline (spec §4.8: "filter same as C4").
pub fn select_validation_files(tree: &[crate::forge::FileEntry]) -> Vec<String> {
    tree.iter()
        .filter(|e| e.is_blob())
        .filter(|e| has_code_extension(&e.path))
        .filter(|e| !is_excluded_path(&e.path))
        .map(|e| e.path.clone())
        .collect()
}

fn has_code_extension(path: &str) -> bool {
    path.rsplit('.')
        .next()
        .map(|ext| CODE_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

fn is_excluded_path(path: &str) -> bool {
    EXCLUDED_PATH_FRAGMENTS.iter().any(|frag| path.contains(frag))
}

/// I/O wrapper (spec §4.8 closing paragraph): on any fetch error, the
/// recommendation is kept but tagged `metadata.validation_status =
/// "unvalidated"` rather than failing the whole scan.
pub async fn validate_repository(
    forge: &ForgeClient,
    owner: &str,
    repo: &str,
    branch: &str,
    recommendation: &mut Recommendation,
    prevention_rules: &[PreventionRule],
    _config: &ScannerConfig,
) -> ValidationOutcome {
    let tree = match forge.get_tree(owner, repo, branch).await {
        Ok(tree) => tree,
        Err(e) => {
            recommendation
                .metadata
                .insert("validation_status".to_string(), serde_json::json!("unvalidated"));
            recommendation
                .metadata
                .insert("validation_error".to_string(), serde_json::json!(e.to_string()));
            return ValidationOutcome::default();
        }
    };

    let paths = select_validation_files(&tree);
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        match forge.get_blob(owner, repo, branch, &path).await {
            Ok(content) => files.push((path, content)),
            Err(e) => {
                tracing::debug!(path = %path, "validator: failed to fetch blob: {e}");
            }
        }
    }

    validate(recommendation, &files, prevention_rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Priority, RecommendationMetrics, RecommendationStatus, RecommendationType};
    use chrono::Utc;
    use std::collections::{HashMap, HashSet};

    fn rec(title: &str, description: &str) -> Recommendation {
        let now = Utc::now();
        Recommendation {
            id: "r1".to_string(),
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

    #[test]
    fn categorizes_by_keyword() {
        assert_eq!(
            categorize("Improve Error Handling", "desc"),
            ValidationCategory::ErrorHandling
        );
        assert_eq!(categorize("Add Unit Tests", "desc"), ValidationCategory::Testing);
        assert_eq!(categorize("Harden Security", "desc"), ValidationCategory::Security);
        assert_eq!(
            categorize("Improve Performance", "desc"),
            ValidationCategory::Performance
        );
        assert_eq!(categorize("Refactor Module", "desc"), ValidationCategory::General);
    }

    #[test]
    fn rejects_zero_percent_claim_contradicted_by_real_coverage() {
        let recommendation = rec(
            "Improve Error Handling",
            "Only 0% of functions have error handling",
        );
        let files = vec![(
            "app.ts".to_string(),
            r#"
function a() { try { risky(); } catch (e) { log(e); } }
function b() { try { risky(); } catch (e) { log(e); } }
class ValidationError extends Error {}
"#
            .to_string(),
        )];

        let outcome = validate(&recommendation, &files, &[]);
        assert!(!outcome.valid);
        assert_eq!(outcome.recommendation_action, RecommendationAction::Reject);
        assert_eq!(outcome.confidence, 0.1);
        assert!(!outcome.conflicting_evidence.is_empty());
    }

    #[test]
    fn approves_zero_percent_claim_when_coverage_is_genuinely_absent() {
        let recommendation = rec(
            "Improve Error Handling",
            "Only 0% of functions have error handling",
        );
        let files = vec![(
            "app.ts".to_string(),
            "function a() { doRiskyThing(); }\nfunction b() { doRiskyThing(); }".to_string(),
        )];

        let outcome = validate(&recommendation, &files, &[]);
        assert!(outcome.valid);
        assert_eq!(outcome.recommendation_action, RecommendationAction::Approve);
    }

    #[test]
    fn non_error_handling_category_skips_coverage_analysis() {
        let recommendation = rec("Add Tests For Parser", "Only 0% coverage");
        let outcome = validate(&recommendation, &[], &[]);
        assert!(outcome.actual_coverage.is_none());
        assert!(outcome.valid);
    }

    #[test]
    fn prevention_rule_forces_rejection() {
        let recommendation = rec("Add Caching Layer", "Introduce an in-memory cache");
        let rule = PreventionRule {
            name: "no-caching-recs".to_string(),
            condition: PreventionCondition::TitleAndDescriptionContain {
                title: "caching".to_string(),
                description: "cache".to_string(),
            },
            action: PreventionAction::Reject,
            confidence: 0.9,
            description: "caching recommendations were previously found to be false positives"
                .to_string(),
        };

        let outcome = validate(&recommendation, &[], std::slice::from_ref(&rule));
        assert!(!outcome.valid);
        assert_eq!(outcome.recommendation_action, RecommendationAction::Reject);
    }

    #[test]
    fn highest_confidence_prevention_rule_wins() {
        let recommendation = rec("Add Caching Layer", "Introduce an in-memory cache");
        let low_confidence_modify = PreventionRule {
            name: "modify-caching".to_string(),
            condition: PreventionCondition::TitleAndDescriptionContain {
                title: "caching".to_string(),
                description: "cache".to_string(),
            },
            action: PreventionAction::Modify,
            confidence: 0.3,
            description: "consider a TTL".to_string(),
        };
        let high_confidence_reject = PreventionRule {
            name: "reject-caching".to_string(),
            condition: PreventionCondition::TitleAndDescriptionContain {
                title: "caching".to_string(),
                description: "cache".to_string(),
            },
            action: PreventionAction::Reject,
            confidence: 0.95,
            description: "rejected".to_string(),
        };

        let outcome = validate(
            &recommendation,
            &[],
            &[low_confidence_modify, high_confidence_reject],
        );
        assert_eq!(outcome.recommendation_action, RecommendationAction::Reject);
    }
}
