//! `react-frontend` profile generator (spec §4.6/§4.7).

use super::{new_recommendation, pattern_driven, scan_driven, GeneratorContext, ScanCounts, ScanFlavor};
use crate::types::{CodeExample, ImplementationStep, Priority, Recommendation, RecommendationType};
use std::collections::HashSet;

pub fn generate(ctx: &GeneratorContext) -> Vec<Recommendation> {
    if let Some(rec) = pattern_driven(
        ctx,
        "hook_usage",
        "Extract Repeated Hook Logic into a Custom Hook",
        "Multiple components call the same hook combination inline. Extracting a custom hook removes duplication and centralizes the behavior.",
        RecommendationType::BestPractices,
        Priority::Medium,
    ) {
        return vec![rec];
    }

    vec![new_recommendation(
        ctx.repository_id,
        "Adopt Component-Level Error Boundaries",
        "No hook usage was detected to extract. Wrap top-level routes in an error boundary so a render failure in one component doesn't blank the page.",
        RecommendationType::BestPractices,
        Priority::Low,
        HashSet::new(),
        vec![CodeExample {
            title: "Wrap a route in an error boundary".to_string(),
            before: "<Route path=\"/dashboard\" element={<Dashboard />} />".to_string(),
            after: "<Route path=\"/dashboard\" element={<ErrorBoundary><Dashboard /></ErrorBoundary>} />".to_string(),
            language: "TypeScript".to_string(),
            explanation: "An error boundary around each top-level route contains a render failure instead of blanking the whole page.".to_string(),
        }],
        vec![ImplementationStep {
            step_no: 1,
            title: "Add error boundaries around top-level routes".to_string(),
            description: "Wrap each top-level route element in a shared `ErrorBoundary` component.".to_string(),
            estimated_time: "1-2h".to_string(),
        }],
        "1-2h",
        HashSet::from(["resilience".to_string()]),
    )]
}

pub fn generate_from_scan(ctx: &GeneratorContext, counts: &ScanCounts) -> Vec<Recommendation> {
    scan_driven(
        ctx,
        counts,
        ScanFlavor {
            title: "Sanitize User-Controlled Content Before Render",
            description: "Security findings suggest content reaches the DOM without sanitization",
            recommendation_type: RecommendationType::Security,
            before: "<div dangerouslySetInnerHTML={{ __html: input }} />",
            after: "<div>{sanitize(input)}</div>",
        },
        ScanFlavor {
            title: "Type Component Props Precisely",
            description: "Type-safety findings indicate props or state typed as `any`",
            recommendation_type: RecommendationType::TypeSafety,
            before: "function Widget(props: any) {}",
            after: "interface WidgetProps { title: string }\nfunction Widget(props: WidgetProps) {}",
        },
        ScanFlavor {
            title: "Avoid Synchronous Work in the Render Path",
            description: "Performance findings indicate blocking calls reachable from component render",
            recommendation_type: RecommendationType::Performance,
            before: "const data = fs.readFileSync(path);",
            after: "const data = await fs.promises.readFile(path);",
        },
    )
}
