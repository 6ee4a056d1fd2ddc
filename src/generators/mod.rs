//! Recommendation Generators (C7).
//!
//! Spec §9 calls out the teacher's inheritance-based `RecommendationGenerator`
//! hierarchy as a re-architecture target: "model as a set of value-typed
//! generators selected by the classifier's profile string via a lookup
//! table; the two entry points become two function pointers, not methods."
//! `GeneratorEntry` is exactly that — a pair of plain `fn` pointers, looked
//! up by [`Profile`] in [`generator_for`]. Content and wording are grounded
//! in `refactor_assistant.rs`'s suggestion/example/step shapes.

use crate::classifier::Profile;
use crate::types::{
    CodeExample, ImplementationStep, Pattern, Priority, Recommendation, RecommendationMetrics,
    RecommendationStatus, RecommendationType,
};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

pub mod azure_functions;
pub mod devops_monitoring;
pub mod fullstack_typescript;
pub mod general_typescript;
pub mod healthcare_enterprise;
pub mod legacy_migration;
pub mod middleware_api;
pub mod react_frontend;

/// Input to a generator's two entry points (spec §4.7).
pub struct GeneratorContext<'a> {
    pub repository_id: &'a str,
    pub patterns: &'a [Pattern],
}

/// Issue counts driving `generate_from_scan` (spec §4.7/§4.5).
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanCounts {
    pub security_count: usize,
    pub type_safety_count: usize,
    pub performance_count: usize,
}

impl ScanCounts {
    pub fn is_empty(&self) -> bool {
        self.security_count == 0 && self.type_safety_count == 0 && self.performance_count == 0
    }
}

type GenerateFn = fn(&GeneratorContext) -> Vec<Recommendation>;
type GenerateFromScanFn = fn(&GeneratorContext, &ScanCounts) -> Vec<Recommendation>;

/// A value-typed stand-in for what would otherwise be a base-class/subclass
/// pair: two function pointers selected per profile.
#[derive(Clone, Copy)]
pub struct GeneratorEntry {
    pub generate: GenerateFn,
    pub generate_from_scan: GenerateFromScanFn,
}

/// The lookup table itself (spec §9's "polymorphism-over-capabilities").
pub fn generator_for(profile: Profile) -> GeneratorEntry {
    match profile {
        Profile::AzureFunctions => GeneratorEntry {
            generate: azure_functions::generate,
            generate_from_scan: azure_functions::generate_from_scan,
        },
        Profile::DevopsMonitoring => GeneratorEntry {
            generate: devops_monitoring::generate,
            generate_from_scan: devops_monitoring::generate_from_scan,
        },
        Profile::HealthcareEnterprise => GeneratorEntry {
            generate: healthcare_enterprise::generate,
            generate_from_scan: healthcare_enterprise::generate_from_scan,
        },
        Profile::ReactFrontend => GeneratorEntry {
            generate: react_frontend::generate,
            generate_from_scan: react_frontend::generate_from_scan,
        },
        Profile::MiddlewareApi => GeneratorEntry {
            generate: middleware_api::generate,
            generate_from_scan: middleware_api::generate_from_scan,
        },
        Profile::LegacyMigration => GeneratorEntry {
            generate: legacy_migration::generate,
            generate_from_scan: legacy_migration::generate_from_scan,
        },
        Profile::FullstackTypescript => GeneratorEntry {
            generate: fullstack_typescript::generate,
            generate_from_scan: fullstack_typescript::generate_from_scan,
        },
        Profile::GeneralTypescript => GeneratorEntry {
            generate: general_typescript::generate,
            generate_from_scan: general_typescript::generate_from_scan,
        },
    }
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn new_recommendation(
    repository_id: &str,
    title: &str,
    description: &str,
    recommendation_type: RecommendationType,
    priority: Priority,
    applicable_patterns: HashSet<String>,
    code_examples: Vec<CodeExample>,
    implementation_steps: Vec<ImplementationStep>,
    estimated_effort: &str,
    tags: HashSet<String>,
) -> Recommendation {
    let now = Utc::now();
    Recommendation {
        id: Uuid::new_v4().to_string(),
        repository_id: repository_id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        recommendation_type,
        priority,
        applicable_patterns,
        code_examples,
        implementation_steps,
        estimated_effort: estimated_effort.to_string(),
        tags,
        status: RecommendationStatus::Active,
        metrics: RecommendationMetrics::default(),
        created_at: now,
        updated_at: now,
        metadata: HashMap::new(),
    }
}

/// Wording for one issue category's `generate_from_scan` recommendation.
pub(crate) struct ScanFlavor {
    pub title: &'static str,
    pub description: &'static str,
    pub recommendation_type: RecommendationType,
    pub before: &'static str,
    pub after: &'static str,
}

/// Shared issue-count-driven entry point body (spec §4.7): every profile's
/// `generate_from_scan` differs only in wording, not in the zero-count
/// short-circuit or the effort-scaling rule, so the mechanics live here once.
pub(crate) fn scan_driven(
    ctx: &GeneratorContext,
    counts: &ScanCounts,
    security: ScanFlavor,
    type_safety: ScanFlavor,
    performance: ScanFlavor,
) -> Vec<Recommendation> {
    if counts.is_empty() {
        return Vec::new();
    }

    let mut recommendations = Vec::new();
    for (count, flavor, priority) in [
        (counts.security_count, security, Priority::Critical),
        (counts.type_safety_count, type_safety, Priority::Medium),
        (counts.performance_count, performance, Priority::High),
    ] {
        if count == 0 {
            continue;
        }
        recommendations.push(new_recommendation(
            ctx.repository_id,
            flavor.title,
            &format!("{} ({count} occurrence(s) found)", flavor.description),
            flavor.recommendation_type,
            priority,
            HashSet::new(),
            vec![CodeExample {
                title: flavor.title.to_string(),
                before: flavor.before.to_string(),
                after: flavor.after.to_string(),
                language: "TypeScript".to_string(),
                explanation: flavor.description.to_string(),
            }],
            vec![ImplementationStep {
                step_no: 1,
                title: "Apply the fix across affected files".to_string(),
                description: flavor.description.to_string(),
                estimated_time: effort_for(count),
            }],
            &effort_for(count),
            HashSet::new(),
        ));
    }
    recommendations
}

fn effort_for(count: usize) -> String {
    match count {
        0 => "0h".to_string(),
        1..=2 => "1-2h".to_string(),
        3..=9 => "half day".to_string(),
        _ => "1-2 days".to_string(),
    }
}

/// Shared pattern-driven entry point body: look for patterns of
/// `pattern_type` and, if any exist, build one recommendation referencing
/// them via `applicable_patterns`. Returns `None` if no such pattern exists
/// so the caller can fall back to a profile-typical template.
pub(crate) fn pattern_driven(
    ctx: &GeneratorContext,
    pattern_type: &str,
    title: &str,
    description: &str,
    recommendation_type: RecommendationType,
    priority: Priority,
) -> Option<Recommendation> {
    let matches: Vec<&Pattern> = ctx
        .patterns
        .iter()
        .filter(|p| p.pattern_type == pattern_type)
        .collect();
    if matches.is_empty() {
        return None;
    }

    let applicable: HashSet<String> = matches.iter().map(|p| p.id.clone()).collect();
    let representative = matches[0];
    let mut tags: HashSet<String> = HashSet::new();
    tags.insert(pattern_type.to_string());
    tags.extend(representative.tags.iter().cloned());

    Some(new_recommendation(
        ctx.repository_id,
        title,
        description,
        recommendation_type,
        priority,
        applicable,
        vec![CodeExample {
            title: title.to_string(),
            before: representative.content.clone(),
            after: format!("// {description}"),
            language: representative.language.clone(),
            explanation: description.to_string(),
        }],
        vec![ImplementationStep {
            step_no: 1,
            title: "Review the flagged occurrences".to_string(),
            description: description.to_string(),
            estimated_time: "1-2h".to_string(),
        }],
        "1-2h",
        tags,
    ))
}
