//! `general-typescript` profile generator (spec §4.6/§4.7) — the default
//! fallback profile when no other waterfall rule matches.

use super::{new_recommendation, pattern_driven, scan_driven, GeneratorContext, ScanCounts, ScanFlavor};
use crate::types::{CodeExample, ImplementationStep, Priority, Recommendation, RecommendationType};
use std::collections::HashSet;

pub fn generate(ctx: &GeneratorContext) -> Vec<Recommendation> {
    if let Some(rec) = pattern_driven(
        ctx,
        "arrow_function",
        "Adopt a Consistent Function Declaration Style",
        "Both `function` declarations and arrow functions are in use for top-level functions. Pick one convention and apply it consistently.",
        RecommendationType::BestPractices,
        Priority::Low,
    ) {
        return vec![rec];
    }

    vec![new_recommendation(
        ctx.repository_id,
        "Add a Shared ESLint/TSConfig Baseline",
        "No arrow-function patterns were detected to anchor a style recommendation. Establish a shared lint/type-check baseline before the codebase grows.",
        RecommendationType::BestPractices,
        Priority::Low,
        HashSet::new(),
        vec![CodeExample {
            title: "Enforce a single function style via lint rule".to_string(),
            before: "// eslint config has no func-style rule".to_string(),
            after: "{ \"rules\": { \"func-style\": [\"error\", \"expression\"] } }".to_string(),
            language: "JSON".to_string(),
            explanation: "A lint rule enforces one function declaration convention instead of relying on review to catch drift.".to_string(),
        }],
        vec![ImplementationStep {
            step_no: 1,
            title: "Add the lint/type-check baseline".to_string(),
            description: "Introduce a shared ESLint config and `tsconfig.json` baseline before the codebase grows.".to_string(),
            estimated_time: "1-2h".to_string(),
        }],
        "1-2h",
        HashSet::from(["tooling".to_string()]),
    )]
}

pub fn generate_from_scan(ctx: &GeneratorContext, counts: &ScanCounts) -> Vec<Recommendation> {
    scan_driven(
        ctx,
        counts,
        ScanFlavor {
            title: "Address Outstanding Security Findings",
            description: "Security findings were detected in this repository",
            recommendation_type: RecommendationType::Security,
            before: "const app = express();",
            after: "const app = express();\napp.use(helmet());",
        },
        ScanFlavor {
            title: "Replace `any` With Precise Types",
            description: "Type-safety findings indicate `any` usage or unannotated parameters",
            recommendation_type: RecommendationType::TypeSafety,
            before: "function run(input: any) {}",
            after: "function run(input: Input) {}",
        },
        ScanFlavor {
            title: "Replace Synchronous Calls With Async Equivalents",
            description: "Performance findings indicate blocking I/O calls",
            recommendation_type: RecommendationType::Performance,
            before: "const data = fs.readFileSync(path);",
            after: "const data = await fs.promises.readFile(path);",
        },
    )
}
