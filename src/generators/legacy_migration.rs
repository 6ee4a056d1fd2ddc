//! `legacy-migration` profile generator (spec §4.6/§4.7).

use super::{new_recommendation, pattern_driven, scan_driven, GeneratorContext, ScanCounts, ScanFlavor};
use crate::types::{CodeExample, ImplementationStep, Priority, Recommendation, RecommendationType};
use std::collections::HashSet;

pub fn generate(ctx: &GeneratorContext) -> Vec<Recommendation> {
    if let Some(rec) = pattern_driven(
        ctx,
        "import_statement",
        "Migrate Legacy Module Imports",
        "Import statements were found using patterns typical of the legacy module system. Plan an incremental migration to the current module convention.",
        RecommendationType::Migration,
        Priority::Medium,
    ) {
        return vec![rec];
    }

    vec![new_recommendation(
        ctx.repository_id,
        "Plan Incremental Legacy Module Migration",
        "No import statements were detected to anchor a migration recommendation. Inventory remaining legacy modules and schedule their replacement.",
        RecommendationType::Migration,
        Priority::Low,
        HashSet::new(),
        vec![CodeExample {
            title: "Migrate a module to the current convention".to_string(),
            before: "var legacyWidget = require('./legacyWidget');".to_string(),
            after: "import { legacyWidget } from './legacyWidget';".to_string(),
            language: "TypeScript".to_string(),
            explanation: "Migrate one module at a time onto the current import convention rather than a single cutover.".to_string(),
        }],
        vec![ImplementationStep {
            step_no: 1,
            title: "Inventory and schedule legacy module migration".to_string(),
            description: "List remaining legacy modules and plan their replacement in priority order.".to_string(),
            estimated_time: "1-2 days".to_string(),
        }],
        "1-2 days",
        HashSet::from(["migration".to_string()]),
    )]
}

pub fn generate_from_scan(ctx: &GeneratorContext, counts: &ScanCounts) -> Vec<Recommendation> {
    scan_driven(
        ctx,
        counts,
        ScanFlavor {
            title: "Remove Hardcoded Secrets Found During Migration",
            description: "Security findings indicate literal credentials surfaced while scanning legacy code",
            recommendation_type: RecommendationType::Security,
            before: "const password = \"changeme\";",
            after: "const password = process.env.DB_PASSWORD;",
        },
        ScanFlavor {
            title: "Add Types While Migrating Legacy Modules",
            description: "Type-safety findings indicate legacy modules still rely on `any`",
            recommendation_type: RecommendationType::TypeSafety,
            before: "function process(input: any) {}",
            after: "function process(input: LegacyInput) {}",
        },
        ScanFlavor {
            title: "Replace Legacy Synchronous I/O During Migration",
            description: "Performance findings indicate synchronous calls carried over from the legacy codebase",
            recommendation_type: RecommendationType::Performance,
            before: "const data = fs.readFileSync(path);",
            after: "const data = await fs.promises.readFile(path);",
        },
    )
}
