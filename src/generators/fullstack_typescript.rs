//! `fullstack-typescript` profile generator (spec §4.6/§4.7).

use super::{new_recommendation, pattern_driven, scan_driven, GeneratorContext, ScanCounts, ScanFlavor};
use crate::types::{CodeExample, ImplementationStep, Priority, Recommendation, RecommendationType};
use std::collections::HashSet;

pub fn generate(ctx: &GeneratorContext) -> Vec<Recommendation> {
    if let Some(rec) = pattern_driven(
        ctx,
        "type_definition",
        "Share Type Definitions Across Stack Boundary",
        "Type definitions exist independently on what look like client and server sides. Move shared shapes into a common package imported by both.",
        RecommendationType::Architecture,
        Priority::Medium,
    ) {
        return vec![rec];
    }

    vec![new_recommendation(
        ctx.repository_id,
        "Establish a Shared Types Package",
        "No type definitions were found to consolidate yet. Set up a shared-types package before client and server models diverge.",
        RecommendationType::Architecture,
        Priority::Low,
        HashSet::new(),
        vec![CodeExample {
            title: "Import shapes from a shared package".to_string(),
            before: "// client/types.ts and server/types.ts each define `User` independently".to_string(),
            after: "import { User } from '@app/shared-types';".to_string(),
            language: "TypeScript".to_string(),
            explanation: "A shared package is the single source of truth for shapes crossing the client/server boundary.".to_string(),
        }],
        vec![ImplementationStep {
            step_no: 1,
            title: "Create a shared-types package".to_string(),
            description: "Move boundary-crossing shapes into `@app/shared-types` and import it from both sides.".to_string(),
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
            title: "Harden the API Boundary Between Client and Server",
            description: "Security findings indicate the server side of this fullstack app is missing standard hardening",
            recommendation_type: RecommendationType::Security,
            before: "const app = express();",
            after: "const app = express();\napp.use(helmet());\napp.use(cors());",
        },
        ScanFlavor {
            title: "Replace `any` at the Client/Server Contract",
            description: "Type-safety findings indicate `any` usage at what should be a typed contract boundary",
            recommendation_type: RecommendationType::TypeSafety,
            before: "function handleResponse(data: any) {}",
            after: "function handleResponse(data: ApiResponse) {}",
        },
        ScanFlavor {
            title: "Move Blocking I/O Off Request Handlers",
            description: "Performance findings indicate synchronous I/O on the server side of the stack",
            recommendation_type: RecommendationType::Performance,
            before: "const data = fs.readFileSync(path);",
            after: "const data = await fs.promises.readFile(path);",
        },
    )
}
