//! `healthcare-enterprise` profile generator (spec §4.6/§4.7).

use super::{new_recommendation, pattern_driven, scan_driven, GeneratorContext, ScanCounts, ScanFlavor};
use crate::types::{CodeExample, ImplementationStep, Priority, Recommendation, RecommendationType};
use std::collections::HashSet;

pub fn generate(ctx: &GeneratorContext) -> Vec<Recommendation> {
    if let Some(rec) = pattern_driven(
        ctx,
        "type_definition",
        "Model Patient Data with Exhaustive Types",
        "Type definitions were found without a single shared source of truth for patient/record shapes. Consolidate into a versioned schema type.",
        RecommendationType::Architecture,
        Priority::High,
    ) {
        return vec![rec];
    }

    vec![new_recommendation(
        ctx.repository_id,
        "Add Audit Logging for PHI Access",
        "No structured type definitions were found to anchor a schema recommendation. Add an audit log entry on every read/write of protected health information.",
        RecommendationType::Security,
        Priority::High,
        HashSet::new(),
        vec![CodeExample {
            title: "Log every PHI access".to_string(),
            before: "const record = await db.patientRecords.findById(id);".to_string(),
            after: "const record = await db.patientRecords.findById(id);\nauditLog.record({ actor: user.id, action: 'read', resource: `patientRecords/${id}` });".to_string(),
            language: "TypeScript".to_string(),
            explanation: "An audit entry on every read/write of protected health information is required regardless of type coverage.".to_string(),
        }],
        vec![ImplementationStep {
            step_no: 1,
            title: "Add an audit log call around PHI access".to_string(),
            description: "Wrap every read/write of patient records with an audit log entry.".to_string(),
            estimated_time: "1-2 days".to_string(),
        }],
        "1-2 days",
        HashSet::from(["compliance".to_string(), "security".to_string()]),
    )]
}

pub fn generate_from_scan(ctx: &GeneratorContext, counts: &ScanCounts) -> Vec<Recommendation> {
    scan_driven(
        ctx,
        counts,
        ScanFlavor {
            title: "Close Access-Control Gaps Around Patient Records",
            description: "Security findings indicate unprotected routes or literal credentials near patient-data handling",
            recommendation_type: RecommendationType::Security,
            before: "const apiKey = \"sk-live-...\";",
            after: "const apiKey = process.env.API_KEY;",
        },
        ScanFlavor {
            title: "Type Patient Record Fields Precisely",
            description: "Type-safety findings indicate untyped access to clinical data structures",
            recommendation_type: RecommendationType::TypeSafety,
            before: "function updateRecord(record: any) {}",
            after: "function updateRecord(record: PatientRecord) {}",
        },
        ScanFlavor {
            title: "Move Blocking Record Lookups Off the Request Thread",
            description: "Performance findings indicate synchronous I/O on patient-record lookup paths",
            recommendation_type: RecommendationType::Performance,
            before: "const record = fs.readFileSync(path);",
            after: "const record = await fs.promises.readFile(path);",
        },
    )
}
