//! Pattern & Issue Detector (C5).
//!
//! Pure, regex-based detection over file text: a closed pattern rule set
//! (spec §4.5 table) plus security/type-safety/performance finding rules.
//! Every detector here is a pure function of its input — no shared mutable
//! state, and `Regex::find_iter` creates a fresh iterator per call so there
//! is nothing to leak between files (unlike engines with `lastIndex`
//! semantics).

use crate::types::{
    DetectionResult, Pattern, PerformanceFinding, SecurityFinding, Severity, TypeSafetyFinding,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

// ============================================================================
// Language detection (spec §4.5) — a closed table keyed by extension.
// ============================================================================

pub fn detect_language(file_path: &str) -> &'static str {
    match file_path.rsplit('.').next().unwrap_or("") {
        "ts" => "TypeScript",
        "tsx" => "TypeScript (JSX)",
        "js" => "JavaScript",
        "jsx" => "JavaScript (JSX)",
        "py" => "Python",
        "java" => "Java",
        "go" => "Go",
        _ => "Unknown",
    }
}

// ============================================================================
// Content hashing
// ============================================================================

/// Deterministic 32-bit FNV-1a hash rendered in base-36, used as
/// `Pattern::content_hash`. Per spec §9 this is intentionally
/// non-cryptographic: collisions are possible and are treated as a
/// coincidental dedup aid only, never as a proof of content equality. The
/// dedup key (spec §3) additionally includes `file_path` and `line_start`
/// precisely to keep a hash collision from merging two distinct patterns.
pub fn content_hash(content: &str) -> String {
    let mut hash: u32 = 0x811c9dc5;
    for byte in content.bytes() {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    to_base36(hash)
}

fn to_base36(mut n: u32) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::new();
    while n > 0 {
        buf.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    buf.reverse();
    String::from_utf8(buf).expect("base36 digits are ASCII")
}

// ============================================================================
// Pattern rule set (spec §4.5 table) — closed.
// ============================================================================

struct PatternRule {
    pattern_type: &'static str,
    category: &'static str,
    subcategory: &'static str,
    regex: &'static Lazy<Regex>,
}

static RE_FUNCTION_DECLARATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:export[ \t]+)?(?:async[ \t]+)?function[ \t]+\w+[ \t]*\(").unwrap()
});
static RE_ARROW_FUNCTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:export[ \t]+)?const[ \t]+\w+[ \t]*=[ \t]*(?:async[ \t]*)?\([^)]*\)[ \t]*=>").unwrap()
});
static RE_TYPE_DEFINITION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*(?:export[ \t]+)?(?:interface|type)[ \t]+\w+").unwrap());
static RE_IMPORT_STATEMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^[ \t]*import[ \t].*?from[ \t]+['"][^'"]+['"]"#).unwrap());
static RE_HOOK_USAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\buse[A-Z]\w*[ \t]*\(").unwrap());
static RE_ERROR_HANDLING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\btry[ \t]*\{.{0,2000}?\}[ \t]*catch[ \t]*\(").unwrap());
static RE_ASYNC_OPERATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bawait[ \t]+").unwrap());
static RE_SECURITY_MIDDLEWARE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:helmet|cors|rateLimit|express-rate-limit|csrf)\b").unwrap()
});
// React components: a capitalized top-level function declaration. The JSX
// body check happens separately (needs more context than a single match).
static RE_COMPONENT_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:export[ \t]+)?function[ \t]+([A-Z]\w*)[ \t]*\([^)]*\)[ \t]*\{")
        .unwrap()
});
static RE_RETURNS_JSX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"return[ \t]*\(?[ \t]*<[A-Za-z]").unwrap());

static PATTERN_RULES: Lazy<Vec<PatternRule>> = Lazy::new(|| {
    vec![
        PatternRule {
            pattern_type: "function_declaration",
            category: "structure",
            subcategory: "function",
            regex: &RE_FUNCTION_DECLARATION,
        },
        PatternRule {
            pattern_type: "arrow_function",
            category: "structure",
            subcategory: "function",
            regex: &RE_ARROW_FUNCTION,
        },
        PatternRule {
            pattern_type: "type_definition",
            category: "structure",
            subcategory: "type",
            regex: &RE_TYPE_DEFINITION,
        },
        PatternRule {
            pattern_type: "import_statement",
            category: "structure",
            subcategory: "import",
            regex: &RE_IMPORT_STATEMENT,
        },
        PatternRule {
            pattern_type: "hook_usage",
            category: "component",
            subcategory: "hook",
            regex: &RE_HOOK_USAGE,
        },
        PatternRule {
            pattern_type: "error_handling",
            category: "quality",
            subcategory: "error_handling",
            regex: &RE_ERROR_HANDLING,
        },
        PatternRule {
            pattern_type: "async_operation",
            category: "async",
            subcategory: "await",
            regex: &RE_ASYNC_OPERATION,
        },
        PatternRule {
            pattern_type: "security_middleware",
            category: "security",
            subcategory: "middleware",
            regex: &RE_SECURITY_MIDDLEWARE,
        },
    ]
});

// Findings regexes
static RE_ANY_USAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r":\s*any\b|\bas\s+any\b").unwrap());
static RE_UNANNOTATED_PARAM_FN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:export[ \t]+)?(?:async[ \t]+)?function[ \t]+\w+[ \t]*\(([^)]*)\)")
        .unwrap()
});
static RE_SECRET_LITERAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(password|api[_-]?key|secret|token)\s*[:=]\s*['"][^'"]{3,}['"]"#).unwrap()
});
static RE_EXPRESS_APP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bexpress\s*\(\s*\)").unwrap());
static RE_FS_SYNC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bfs\.(readFileSync|writeFileSync|existsSync|statSync)\b").unwrap()
});
static RE_SET_INTERVAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bsetInterval\s*\(").unwrap());
static RE_CLEAR_INTERVAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bclearInterval\s*\(").unwrap());
static RE_INEFFICIENT_LOOP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\bfor\s*\([^)]*\)\s*\{[^{}]{0,500}?\.push\s*\(").unwrap()
});
static RE_HELMET: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bhelmet\b").unwrap());
static RE_CORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bcors\b").unwrap());
static RE_RATE_LIMIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:rateLimit|express-rate-limit)\b").unwrap());

/// Count of function-like declarations in `text` (plain `function` plus
/// arrow-function assignments). Shared with the quality validator's
/// error-handling coverage formula, which needs the same denominator the
/// pattern detector already computes for `function_declaration`/
/// `arrow_function`.
pub(crate) fn count_function_like(text: &str) -> usize {
    RE_FUNCTION_DECLARATION.find_iter(text).count() + RE_ARROW_FUNCTION.find_iter(text).count()
}

/// Detect all patterns and findings in `text` (spec §4.5). An empty file
/// produces empty arrays, never an error.
pub fn detect(text: &str, file_path: &str) -> DetectionResult {
    detect_with_offset(text, file_path, 0)
}

/// Same as [`detect`] but every emitted line number is shifted by
/// `line_offset`, so the streaming reader (spec §4.4) can run this over
/// successive chunks of a large file and report line numbers relative to
/// the whole file.
pub fn detect_with_offset(text: &str, file_path: &str, line_offset: u32) -> DetectionResult {
    let language = detect_language(file_path);
    let mut result = DetectionResult::default();

    for rule in PATTERN_RULES.iter() {
        for m in rule.regex.find_iter(text) {
            let matched = m.as_str().trim();
            if matched.is_empty() {
                continue;
            }
            let line_start = line_offset + 1 + line_number_of(text, m.start());
            let line_end = line_start + matched.matches('\n').count() as u32;
            let tags: HashSet<String> = [rule.category, rule.subcategory, language]
                .into_iter()
                .map(str::to_string)
                .collect();

            result.patterns.push(Pattern {
                id: uuid::Uuid::new_v4().to_string(),
                repository_id: String::new(),
                pattern_type: rule.pattern_type.to_string(),
                category: rule.category.to_string(),
                subcategory: rule.subcategory.to_string(),
                content: matched.to_string(),
                content_hash: content_hash(matched),
                file_path: file_path.to_string(),
                line_start,
                line_end,
                language: language.to_string(),
                confidence: 0.8,
                tags,
                context_before: surrounding_lines(text, m.start(), Direction::Before, 2),
                context_after: surrounding_lines(text, m.end(), Direction::After, 2),
                metadata: Default::default(),
            });
        }
    }

    // react_component: capitalized function header whose body returns JSX.
    for m in RE_COMPONENT_HEADER.find_iter(text) {
        let body_window_end = (m.end() + 1000).min(text.len());
        let body = &text[m.end()..body_window_end];
        if RE_RETURNS_JSX.is_match(body) {
            let matched = m.as_str().trim();
            let line_start = line_offset + 1 + line_number_of(text, m.start());
            let line_end = line_start + matched.matches('\n').count() as u32;
            let tags: HashSet<String> = ["component", "react", language]
                .into_iter()
                .map(str::to_string)
                .collect();
            result.patterns.push(Pattern {
                id: uuid::Uuid::new_v4().to_string(),
                repository_id: String::new(),
                pattern_type: "react_component".to_string(),
                category: "component".to_string(),
                subcategory: "react".to_string(),
                content: matched.to_string(),
                content_hash: content_hash(matched),
                file_path: file_path.to_string(),
                line_start,
                line_end,
                language: language.to_string(),
                confidence: 0.8,
                tags,
                context_before: surrounding_lines(text, m.start(), Direction::Before, 2),
                context_after: surrounding_lines(text, m.end(), Direction::After, 2),
                metadata: Default::default(),
            });
        }
    }

    detect_security(text, file_path, &mut result.security, line_offset);
    detect_type_safety(text, file_path, &mut result.type_safety, line_offset);
    detect_performance(text, file_path, &mut result.performance, line_offset);

    result
}

fn detect_security(
    text: &str,
    file_path: &str,
    out: &mut Vec<SecurityFinding>,
    line_offset: u32,
) {
    if RE_EXPRESS_APP.is_match(text) {
        if !RE_HELMET.is_match(text) {
            out.push(SecurityFinding {
                finding_type: "missing_middleware".to_string(),
                severity: Severity::High,
                description: "Express application found without helmet middleware".to_string(),
                file_path: file_path.to_string(),
                line_number: None,
                recommendation_text: "Add `app.use(helmet())` to set secure HTTP headers"
                    .to_string(),
            });
        }
        if !RE_CORS.is_match(text) {
            out.push(SecurityFinding {
                finding_type: "missing_middleware".to_string(),
                severity: Severity::Medium,
                description: "Express application found without cors middleware".to_string(),
                file_path: file_path.to_string(),
                line_number: None,
                recommendation_text: "Add `app.use(cors())` and configure allowed origins"
                    .to_string(),
            });
        }
        if !RE_RATE_LIMIT.is_match(text) {
            out.push(SecurityFinding {
                finding_type: "missing_middleware".to_string(),
                severity: Severity::Medium,
                description: "Express application found without rate limiting".to_string(),
                file_path: file_path.to_string(),
                line_number: None,
                recommendation_text: "Add `express-rate-limit` to protect against abuse"
                    .to_string(),
            });
        }
    }

    for m in RE_SECRET_LITERAL.find_iter(text) {
        let line = line_offset + 1 + line_number_of(text, m.start());
        out.push(SecurityFinding {
            finding_type: "insecure_config".to_string(),
            severity: Severity::Critical,
            description: "Literal credential-like value assigned in source".to_string(),
            file_path: file_path.to_string(),
            line_number: Some(line),
            recommendation_text: "Move secrets to environment variables or a secrets manager"
                .to_string(),
        });
    }
}

fn detect_type_safety(
    text: &str,
    file_path: &str,
    out: &mut Vec<TypeSafetyFinding>,
    line_offset: u32,
) {
    for m in RE_ANY_USAGE.find_iter(text) {
        let line = line_offset + 1 + line_number_of(text, m.start());
        out.push(TypeSafetyFinding {
            finding_type: "any_usage".to_string(),
            description: "`any` type used, defeating static type checking".to_string(),
            file_path: file_path.to_string(),
            line_number: Some(line),
            recommendation_text: "Replace `any` with a precise type or generic".to_string(),
        });
    }

    for caps in RE_UNANNOTATED_PARAM_FN.captures_iter(text) {
        let params = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        if params.trim().is_empty() {
            continue;
        }
        let has_unannotated = params
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .any(|p| !p.contains(':'));
        if has_unannotated {
            let whole = caps.get(0).unwrap();
            let line = line_offset + 1 + line_number_of(text, whole.start());
            out.push(TypeSafetyFinding {
                finding_type: "missing_types".to_string(),
                description: "Function parameter(s) without a type annotation".to_string(),
                file_path: file_path.to_string(),
                line_number: Some(line),
                recommendation_text: "Annotate every parameter with an explicit type".to_string(),
            });
        }
    }
}

fn detect_performance(
    text: &str,
    file_path: &str,
    out: &mut Vec<PerformanceFinding>,
    line_offset: u32,
) {
    for m in RE_FS_SYNC.find_iter(text) {
        let line = line_offset + 1 + line_number_of(text, m.start());
        out.push(PerformanceFinding {
            finding_type: "sync_operation".to_string(),
            description: format!("Blocking filesystem call `{}`", m.as_str()),
            file_path: file_path.to_string(),
            line_number: Some(line),
            recommendation_text: "Use the async `fs/promises` equivalent".to_string(),
        });
    }

    if RE_SET_INTERVAL.is_match(text) && !RE_CLEAR_INTERVAL.is_match(text) {
        out.push(PerformanceFinding {
            finding_type: "memory_leak".to_string(),
            description: "`setInterval` found with no matching `clearInterval` in this file"
                .to_string(),
            file_path: file_path.to_string(),
            line_number: None,
            recommendation_text: "Store the interval handle and clear it on teardown".to_string(),
        });
    }

    for m in RE_INEFFICIENT_LOOP.find_iter(text) {
        let line = line_offset + 1 + line_number_of(text, m.start());
        out.push(PerformanceFinding {
            finding_type: "inefficient_loop".to_string(),
            description: "Array built with repeated `.push()` inside a `for` loop".to_string(),
            file_path: file_path.to_string(),
            line_number: Some(line),
            recommendation_text: "Consider `.map()`/preallocation instead of incremental push"
                .to_string(),
        });
    }
}

enum Direction {
    Before,
    After,
}

fn line_number_of(text: &str, byte_offset: usize) -> u32 {
    text[..byte_offset].matches('\n').count() as u32
}

fn surrounding_lines(text: &str, byte_offset: usize, direction: Direction, count: usize) -> String {
    match direction {
        Direction::Before => {
            let before = &text[..byte_offset];
            before
                .lines()
                .rev()
                .take(count)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join("\n")
        }
        Direction::After => {
            let after = &text[byte_offset..];
            after.lines().skip(1).take(count).collect::<Vec<_>>().join("\n")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_empty_result() {
        let result = detect("", "empty.ts");
        assert!(result.patterns.is_empty());
        assert!(result.security.is_empty());
        assert!(result.type_safety.is_empty());
        assert!(result.performance.is_empty());
    }

    #[test]
    fn language_detection_depends_only_on_extension() {
        assert_eq!(detect_language("a/b/c.ts"), "TypeScript");
        assert_eq!(detect_language("c.py"), "Python");
        assert_eq!(detect_language("c.weird"), "Unknown");
    }

    #[test]
    fn content_hash_is_deterministic() {
        assert_eq!(content_hash("const x = 1;"), content_hash("const x = 1;"));
        assert_ne!(content_hash("const x = 1;"), content_hash("const x = 2;"));
    }

    #[test]
    fn detects_mixed_issues_in_app_ts() {
        let text = r#"
import express from 'express';

const app = express();

function handler(req, res) {
  const config: any = req.body;
  const data = fs.readFileSync('./file.txt');
  res.send(data);
}
"#;
        let result = detect(text, "app.ts");

        assert!(result.patterns.iter().any(|p| p.pattern_type == "import_statement"));
        assert!(result.patterns.iter().any(|p| p.pattern_type == "function_declaration"));

        assert!(result
            .security
            .iter()
            .any(|f| f.finding_type == "missing_middleware" && f.severity == Severity::High));

        let any_finding = result
            .type_safety
            .iter()
            .find(|f| f.finding_type == "any_usage")
            .expect("any_usage finding");
        assert!(any_finding.line_number.is_some());

        assert!(result
            .performance
            .iter()
            .any(|f| f.finding_type == "sync_operation"));
    }

    #[test]
    fn detects_insecure_config_literal() {
        let text = r#"const apiKey = "sk-1234567890";"#;
        let result = detect(text, "config.ts");
        assert!(result
            .security
            .iter()
            .any(|f| f.finding_type == "insecure_config" && f.severity == Severity::Critical));
    }

    #[test]
    fn detects_memory_leak_without_clear_interval() {
        let text = "setInterval(() => poll(), 1000);";
        let result = detect(text, "poller.ts");
        assert!(result.performance.iter().any(|f| f.finding_type == "memory_leak"));

        let text_cleared = "const id = setInterval(() => poll(), 1000); clearInterval(id);";
        let result_cleared = detect(text_cleared, "poller.ts");
        assert!(!result_cleared
            .performance
            .iter()
            .any(|f| f.finding_type == "memory_leak"));
    }

    #[test]
    fn multiple_rules_may_match_overlapping_ranges() {
        // `await` inside an async arrow function matches both
        // arrow_function and async_operation independently — no cross-rule
        // dedup (spec §4.5 edge case policy).
        let text = "const run = async () => { await doThing(); };";
        let result = detect(text, "run.ts");
        assert!(result.patterns.iter().any(|p| p.pattern_type == "arrow_function"));
        assert!(result.patterns.iter().any(|p| p.pattern_type == "async_operation"));
    }
}
