//! `middleware-api` profile generator (spec §4.6/§4.7).

use super::{new_recommendation, pattern_driven, scan_driven, GeneratorContext, ScanCounts, ScanFlavor};
use crate::types::{CodeExample, ImplementationStep, Priority, Recommendation, RecommendationType};
use std::collections::HashSet;

pub fn generate(ctx: &GeneratorContext) -> Vec<Recommendation> {
    if let Some(rec) = pattern_driven(
        ctx,
        "function_declaration",
        "Centralize Middleware Error Handling",
        "Multiple middleware functions handle errors independently. Route them through a single error-handling middleware at the end of the chain.",
        RecommendationType::BestPractices,
        Priority::Medium,
    ) {
        return vec![rec];
    }

    vec![new_recommendation(
        ctx.repository_id,
        "Introduce Centralized Request Validation",
        "No middleware function declarations were found to consolidate. Add a validation layer shared across routes.",
        RecommendationType::Architecture,
        Priority::Medium,
        HashSet::new(),
        vec![CodeExample {
            title: "Validate requests in one shared middleware".to_string(),
            before: "app.post('/users', (req, res) => { /* ad hoc checks */ });".to_string(),
            after: "app.post('/users', validate(createUserSchema), (req, res) => { /* body is already valid */ });".to_string(),
            language: "TypeScript".to_string(),
            explanation: "A shared validation middleware keyed by schema removes duplicated per-route checks.".to_string(),
        }],
        vec![ImplementationStep {
            step_no: 1,
            title: "Add a shared validation middleware".to_string(),
            description: "Introduce a schema-driven `validate()` middleware and apply it across routes.".to_string(),
            estimated_time: "half day".to_string(),
        }],
        "half day",
        HashSet::from(["architecture".to_string()]),
    )]
}

pub fn generate_from_scan(ctx: &GeneratorContext, counts: &ScanCounts) -> Vec<Recommendation> {
    scan_driven(
        ctx,
        counts,
        ScanFlavor {
            title: "Add Rate Limiting and Header Hardening",
            description: "Security findings indicate the middleware chain is missing standard hardening",
            recommendation_type: RecommendationType::Security,
            before: "const app = express();",
            after: "const app = express();\napp.use(helmet());\napp.use(rateLimit({ windowMs: 60_000, max: 100 }));",
        },
        ScanFlavor {
            title: "Type Request/Response Objects Passed Through Middleware",
            description: "Type-safety findings indicate untyped request/response handling in middleware",
            recommendation_type: RecommendationType::TypeSafety,
            before: "function mw(req: any, res: any, next: any) {}",
            after: "function mw(req: Request, res: Response, next: NextFunction) {}",
        },
        ScanFlavor {
            title: "Avoid Blocking Calls Inside Middleware",
            description: "Performance findings indicate synchronous I/O on the request path",
            recommendation_type: RecommendationType::Performance,
            before: "const data = fs.readFileSync(path);",
            after: "const data = await fs.promises.readFile(path);",
        },
    )
}
