//! Tech-Stack Classifier (C6).
//!
//! A deterministic, order-sensitive waterfall over a repository's category
//! tags (spec §4.6). Modeled after the teacher's `repo_analysis.rs`
//! language/profile inference, but reduced to the exact closed rule set the
//! spec names — this classifier never fails and never produces a profile
//! outside the closed set below.

use std::collections::HashSet;

/// One of the eight closed profile identifiers spec §4.6 can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    AzureFunctions,
    DevopsMonitoring,
    HealthcareEnterprise,
    ReactFrontend,
    MiddlewareApi,
    LegacyMigration,
    FullstackTypescript,
    GeneralTypescript,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::AzureFunctions => "azure-functions",
            Profile::DevopsMonitoring => "devops-monitoring",
            Profile::HealthcareEnterprise => "healthcare-enterprise",
            Profile::ReactFrontend => "react-frontend",
            Profile::MiddlewareApi => "middleware-api",
            Profile::LegacyMigration => "legacy-migration",
            Profile::FullstackTypescript => "fullstack-typescript",
            Profile::GeneralTypescript => "general-typescript",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Classification {
    pub profile: Profile,
    pub confidence: f32,
    pub indicators: Vec<String>,
    pub primary_language: Option<String>,
    pub framework: Option<String>,
}

/// Classify a repository's `categories` set into a profile (spec §4.6).
/// Order is significant: the first matching rule wins. Never fails.
pub fn classify(
    categories: &HashSet<String>,
    primary_language: Option<String>,
) -> Classification {
    let has = |tag: &str| categories.contains(tag);

    let (profile, confidence, indicators, framework) = if has("azure") && has("functions") {
        (
            Profile::AzureFunctions,
            0.95,
            vec!["azure".to_string(), "functions".to_string()],
            Some("azure-functions".to_string()),
        )
    } else if has("devops") || has("monitoring") {
        (
            Profile::DevopsMonitoring,
            0.90,
            matched(categories, &["devops", "monitoring"]),
            None,
        )
    } else if has("healthcare") || has("dental") {
        (
            Profile::HealthcareEnterprise,
            0.85,
            matched(categories, &["healthcare", "dental"]),
            None,
        )
    } else if has("frontend") || has("react") {
        (
            Profile::ReactFrontend,
            0.90,
            matched(categories, &["frontend", "react"]),
            Some("react".to_string()),
        )
    } else if has("middleware") {
        (
            Profile::MiddlewareApi,
            0.80,
            vec!["middleware".to_string()],
            None,
        )
    } else if has("migration") || has("legacy") {
        (
            Profile::LegacyMigration,
            0.85,
            matched(categories, &["migration", "legacy"]),
            None,
        )
    } else if has("backend") && has("fullstack") {
        (
            Profile::FullstackTypescript,
            0.90,
            vec!["backend".to_string(), "fullstack".to_string()],
            None,
        )
    } else {
        (Profile::GeneralTypescript, 0.70, Vec::new(), None)
    };

    Classification {
        profile,
        confidence,
        indicators,
        primary_language,
        framework,
    }
}

fn matched(categories: &HashSet<String>, candidates: &[&str]) -> Vec<String> {
    candidates
        .iter()
        .filter(|c| categories.contains(**c))
        .map(|c| c.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cats(tags: &[&str]) -> HashSet<String> {
        tags.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn azure_functions_takes_priority_over_everything_else() {
        let c = classify(&cats(&["azure", "functions", "devops"]), None);
        assert_eq!(c.profile.as_str(), "azure-functions");
        assert_eq!(c.confidence, 0.95);
    }

    #[test]
    fn devops_or_monitoring_before_react() {
        let c = classify(&cats(&["monitoring", "react"]), None);
        assert_eq!(c.profile.as_str(), "devops-monitoring");
    }

    #[test]
    fn fullstack_requires_both_tags() {
        let c = classify(&cats(&["backend"]), None);
        assert_eq!(c.profile.as_str(), "general-typescript");

        let c = classify(&cats(&["backend", "fullstack"]), None);
        assert_eq!(c.profile.as_str(), "fullstack-typescript");
    }

    #[test]
    fn default_is_general_typescript_and_classification_never_fails() {
        let c = classify(&HashSet::new(), None);
        assert_eq!(c.profile.as_str(), "general-typescript");
        assert_eq!(c.confidence, 0.70);
        assert!(c.indicators.is_empty());
    }
}
