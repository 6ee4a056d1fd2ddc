//! `devops-monitoring` profile generator (spec §4.6/§4.7).

use super::{new_recommendation, pattern_driven, scan_driven, GeneratorContext, ScanCounts, ScanFlavor};
use crate::types::{CodeExample, ImplementationStep, Priority, Recommendation, RecommendationType};
use std::collections::HashSet;

pub fn generate(ctx: &GeneratorContext) -> Vec<Recommendation> {
    if let Some(rec) = pattern_driven(
        ctx,
        "async_operation",
        "Instrument Async Operations for Observability",
        "Async operations were detected with no surrounding span/metric instrumentation. Wrap them so failures and latency are visible to monitoring.",
        RecommendationType::BestPractices,
        Priority::Medium,
    ) {
        return vec![rec];
    }

    vec![new_recommendation(
        ctx.repository_id,
        "Add Centralized Monitoring Instrumentation",
        "No monitoring instrumentation patterns were detected. Introduce a shared logging/metrics wrapper around external calls.",
        RecommendationType::Architecture,
        Priority::Medium,
        HashSet::new(),
        vec![CodeExample {
            title: "Wrap external calls with observability".to_string(),
            before: "await externalApi.call(params);".to_string(),
            after: "await withInstrumentation('externalApi.call', () => externalApi.call(params));".to_string(),
            language: "TypeScript".to_string(),
            explanation: "A shared wrapper emits span/metric data around every external call instead of each call site instrumenting itself ad hoc.".to_string(),
        }],
        vec![ImplementationStep {
            step_no: 1,
            title: "Introduce a shared instrumentation wrapper".to_string(),
            description: "Add a `withInstrumentation` helper and route external calls through it.".to_string(),
            estimated_time: "half day".to_string(),
        }],
        "half day",
        HashSet::from(["observability".to_string()]),
    )]
}

pub fn generate_from_scan(ctx: &GeneratorContext, counts: &ScanCounts) -> Vec<Recommendation> {
    scan_driven(
        ctx,
        counts,
        ScanFlavor {
            title: "Harden Security Middleware Coverage",
            description: "Security findings indicate missing or incomplete request-hardening middleware",
            recommendation_type: RecommendationType::Security,
            before: "const app = express();",
            after: "const app = express();\napp.use(helmet());\napp.use(cors());\napp.use(rateLimit({ windowMs: 60_000, max: 100 }));",
        },
        ScanFlavor {
            title: "Tighten Type Annotations on Monitored Paths",
            description: "Type-safety findings indicate untyped values flowing through instrumented code paths",
            recommendation_type: RecommendationType::TypeSafety,
            before: "function handler(req: any, res: any) {}",
            after: "function handler(req: Request, res: Response) {}",
        },
        ScanFlavor {
            title: "Replace Blocking Calls on the Monitoring Hot Path",
            description: "Performance findings indicate synchronous I/O on code paths that feed monitoring/metrics",
            recommendation_type: RecommendationType::Performance,
            before: "const data = fs.readFileSync(path);",
            after: "const data = await fs.promises.readFile(path);",
        },
    )
}
