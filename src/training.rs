//! Training-Case Store & Prevention Rules (C9).
//!
//! An append-only keyed blob store, one JSON file per training case, mirrored
//! after the teacher's file-backed cache tiers (`cache.rs`'s on-disk variant)
//! but write-once rather than LRU-evicted. The prevention-rule set is a
//! single merged JSON document rewritten on every update.

use crate::types::{CaseType, PreventionRule, Recommendation};
use crate::validator::ValidationOutcome;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::warn;

const PREVENTION_RULES_FILE: &str = "prevention-rules.json";

fn case_type_kind(case_type: CaseType) -> &'static str {
    match case_type {
        CaseType::FalsePositive => "false-positive",
        CaseType::FalseNegative => "false-negative",
        CaseType::Accurate => "accurate",
        CaseType::Improvement => "improvement",
    }
}

/// `id = <kind>-<timestamp-ms>` (spec §4.9).
pub fn make_case_id(case_type: CaseType, timestamp_ms: i64) -> String {
    format!("{}-{}", case_type_kind(case_type), timestamp_ms)
}

pub struct TrainingStore {
    root: PathBuf,
}

impl TrainingStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn case_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("training-case-{id}.json"))
    }

    fn rules_path(&self) -> PathBuf {
        self.root.join(PREVENTION_RULES_FILE)
    }

    /// Build the rejection training case from a §4.8 rejection outcome and
    /// persist it (spec §4.9: "on each rejection, a training case is
    /// written").
    pub async fn record_rejection(
        &self,
        recommendation: &Recommendation,
        outcome: &ValidationOutcome,
        analysis_snapshot: serde_json::Value,
        new_prevention_rules: Vec<PreventionRule>,
        timestamp_ms: i64,
    ) -> std::io::Result<Vec<PreventionRule>> {
        let id = make_case_id(CaseType::FalsePositive, timestamp_ms);
        let mut lessons = outcome.conflicting_evidence.clone();
        lessons.extend(outcome.modification_suggestions.clone());

        let case = serde_json::json!({
            "id": id,
            "timestamp": chrono::Utc::now(),
            "case_type": "false_positive",
            "recommendation_snapshot": recommendation,
            "analysis_snapshot": analysis_snapshot,
            "validation_outcome": {
                "valid": outcome.valid,
                "confidence": outcome.confidence,
                "actual_coverage": outcome.actual_coverage,
                "conflicting_evidence": outcome.conflicting_evidence,
                "supporting_evidence": outcome.supporting_evidence,
            },
            "lessons": lessons,
            "prevention_rules": new_prevention_rules,
        });

        self.write_case(&id, &case).await?;
        self.merge_prevention_rules(new_prevention_rules).await
    }

    async fn write_case(&self, id: &str, case: &serde_json::Value) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.case_path(id);
        let body = serde_json::to_string_pretty(case)?;
        tokio::fs::write(path, body).await
    }

    pub async fn load_prevention_rules(&self) -> std::io::Result<Vec<PreventionRule>> {
        read_rules(&self.rules_path()).await
    }

    /// Merge `new_rules` into the persisted set, keyed by `name`; on a name
    /// collision the higher-confidence rule wins (spec §4.9). Returns the
    /// merged set.
    pub async fn merge_prevention_rules(
        &self,
        new_rules: Vec<PreventionRule>,
    ) -> std::io::Result<Vec<PreventionRule>> {
        let existing = self.load_prevention_rules().await.unwrap_or_default();
        let mut by_name: HashMap<String, PreventionRule> =
            existing.into_iter().map(|r| (r.name.clone(), r)).collect();

        for rule in new_rules {
            match by_name.get(&rule.name) {
                Some(current) if current.confidence >= rule.confidence => {}
                _ => {
                    by_name.insert(rule.name.clone(), rule);
                }
            }
        }

        let merged: Vec<PreventionRule> = by_name.into_values().collect();
        self.write_rules(&merged).await?;
        Ok(merged)
    }

    async fn write_rules(&self, rules: &[PreventionRule]) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        let body = serde_json::to_string_pretty(rules)?;
        tokio::fs::write(self.rules_path(), body).await
    }
}

async fn read_rules(path: &Path) -> std::io::Result<Vec<PreventionRule>> {
    match tokio::fs::read_to_string(path).await {
        Ok(body) => Ok(serde_json::from_str(&body).unwrap_or_else(|e| {
            warn!("failed to parse {}: {e}, starting from an empty rule set", path.display());
            Vec::new()
        })),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Priority, RecommendationMetrics, RecommendationStatus, RecommendationType};
    use crate::validator::RecommendationAction;
    use chrono::Utc;
    use std::collections::{HashMap as StdHashMap, HashSet};
    use tempfile::tempdir;

    fn rec() -> Recommendation {
        let now = Utc::now();
        Recommendation {
            id: "r1".to_string(),
            repository_id: "repo1".to_string(),
            title: "Improve Error Handling".to_string(),
            description: "Only 0% coverage".to_string(),
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
            metadata: StdHashMap::new(),
        }
    }

    #[test]
    fn case_id_is_kind_and_timestamp() {
        assert_eq!(make_case_id(CaseType::FalsePositive, 1700000000000), "false-positive-1700000000000");
    }

    #[tokio::test]
    async fn record_rejection_writes_a_case_and_merges_rules() {
        let dir = tempdir().unwrap();
        let store = TrainingStore::new(dir.path());

        let outcome = ValidationOutcome {
            valid: false,
            confidence: 0.1,
            actual_coverage: Some(66.0),
            conflicting_evidence: vec!["claims 0% but coverage is 66%".to_string()],
            supporting_evidence: vec![],
            recommendation_action: RecommendationAction::Reject,
            modification_suggestions: vec![],
        };

        let rule = PreventionRule {
            name: "zero-percent-claim".to_string(),
            condition: crate::types::PreventionCondition::TitleAndDescriptionContain {
                title: "error handling".to_string(),
                description: "0%".to_string(),
            },
            action: crate::types::PreventionAction::FlagForReview,
            confidence: 0.8,
            description: "flag suspicious zero-percent claims".to_string(),
        };

        let merged = store
            .record_rejection(&rec(), &outcome, serde_json::json!({}), vec![rule], 1700000000000)
            .await
            .unwrap();

        assert_eq!(merged.len(), 1);
        assert!(dir.path().join("training-case-false-positive-1700000000000.json").exists());
        assert!(dir.path().join("prevention-rules.json").exists());
    }

    #[tokio::test]
    async fn merge_keeps_higher_confidence_rule_on_name_collision() {
        let dir = tempdir().unwrap();
        let store = TrainingStore::new(dir.path());

        let low = PreventionRule {
            name: "dup".to_string(),
            condition: crate::types::PreventionCondition::CodebaseHasErrorHandlingStack,
            action: crate::types::PreventionAction::Modify,
            confidence: 0.3,
            description: "low".to_string(),
        };
        let high = PreventionRule {
            name: "dup".to_string(),
            condition: crate::types::PreventionCondition::CodebaseHasErrorHandlingStack,
            action: crate::types::PreventionAction::Reject,
            confidence: 0.9,
            description: "high".to_string(),
        };

        store.merge_prevention_rules(vec![low]).await.unwrap();
        let merged = store.merge_prevention_rules(vec![high]).await.unwrap();

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].confidence, 0.9);
        assert_eq!(merged[0].description, "high");
    }

    #[tokio::test]
    async fn missing_rules_file_loads_as_empty() {
        let dir = tempdir().unwrap();
        let store = TrainingStore::new(dir.path());
        let rules = store.load_prevention_rules().await.unwrap();
        assert!(rules.is_empty());
    }
}
