//! `azure-functions` profile generator (spec §4.6/§4.7).

use super::{new_recommendation, pattern_driven, scan_driven, GeneratorContext, ScanCounts, ScanFlavor};
use crate::types::{CodeExample, ImplementationStep, Priority, Recommendation, RecommendationType};
use std::collections::HashSet;

pub fn generate(ctx: &GeneratorContext) -> Vec<Recommendation> {
    if let Some(rec) = pattern_driven(
        ctx,
        "async_operation",
        "Add Retry Policies to Function Bindings",
        "Async operations were found inside function handlers with no visible retry policy. Azure Functions retries should be configured declaratively, not reimplemented per-handler.",
        RecommendationType::BestPractices,
        Priority::Medium,
    ) {
        return vec![rec];
    }

    vec![new_recommendation(
        ctx.repository_id,
        "Add Durable Function Retry Policies",
        "No async operations were found to anchor a retry recommendation. Configure a host-level retry policy before adding bindings that can fail transiently.",
        RecommendationType::Architecture,
        Priority::Low,
        HashSet::new(),
        vec![CodeExample {
            title: "Configure a host-level retry policy".to_string(),
            before: "{ \"version\": \"2.0\" }".to_string(),
            after: "{ \"version\": \"2.0\", \"retry\": { \"strategy\": \"exponentialBackoff\", \"maxRetryCount\": 5, \"minimumInterval\": \"00:00:02\", \"maximumInterval\": \"00:02:00\" } }".to_string(),
            language: "JSON".to_string(),
            explanation: "`host.json` retry configuration applies to every trigger binding without per-handler retry code.".to_string(),
        }],
        vec![ImplementationStep {
            step_no: 1,
            title: "Add a retry block to host.json".to_string(),
            description: "Configure exponential backoff before any binding that can fail transiently is added.".to_string(),
            estimated_time: "1-2h".to_string(),
        }],
        "1-2h",
        HashSet::from(["reliability".to_string()]),
    )]
}

pub fn generate_from_scan(ctx: &GeneratorContext, counts: &ScanCounts) -> Vec<Recommendation> {
    scan_driven(
        ctx,
        counts,
        ScanFlavor {
            title: "Move Secrets Out of Function App Source",
            description: "Security findings indicate literal credentials in a function handler",
            recommendation_type: RecommendationType::Security,
            before: "const apiKey = \"sk-live-...\";",
            after: "const apiKey = process.env.API_KEY;",
        },
        ScanFlavor {
            title: "Type Function Bindings and Inputs",
            description: "Type-safety findings indicate untyped trigger/binding payloads",
            recommendation_type: RecommendationType::TypeSafety,
            before: "module.exports = async function (context: any, req: any) {}",
            after: "module.exports = async function (context: Context, req: HttpRequest) {}",
        },
        ScanFlavor {
            title: "Avoid Blocking Calls Inside Function Handlers",
            description: "Performance findings indicate synchronous I/O inside a function invocation",
            recommendation_type: RecommendationType::Performance,
            before: "const data = fs.readFileSync(path);",
            after: "const data = await fs.promises.readFile(path);",
        },
    )
}
