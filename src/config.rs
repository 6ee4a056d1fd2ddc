//! Scanner configuration (spec §6).
//!
//! Mirrors the builder-style configuration structs used throughout the
//! teacher codebase (`GitHubConfig`, `CacheConfig`): a plain struct with a
//! sensible `Default` and `with_*` setters. Unlike the teacher's own
//! server-side `config` crate usage (file/env based bootstrap), this crate
//! never reads files or secrets itself (spec §1 non-goal) — the embedding
//! application constructs a `ScannerConfig` explicitly.
//!
//! The single environment variable the core honors
//! (`GITHUB_SCANNER_FILE_LIMIT`, spec §6) is resolved lazily inside
//! `ScannerConfig::file_limit_override`, not at construction time, so the
//! struct itself stays a pure value usable in tests without env leakage.

const FILE_LIMIT_ENV_VAR: &str = "GITHUB_SCANNER_FILE_LIMIT";

/// Extension set eligible for scanning (spec §4.4).
pub const CODE_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "py", "java", "go"];

/// Path fragments that exclude a file from scanning regardless of extension.
pub const EXCLUDED_PATH_FRAGMENTS: &[&str] = &["node_modules", "dist", "build"];

#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Bearer token for the remote code-forge API. `None` means unauthenticated
    /// mode (lower `file_limit()`, spec §4.1).
    pub remote_token: Option<String>,

    /// Worker-pool cap for concurrent file processing (spec §6).
    pub max_concurrent_files: usize,

    /// Cap on in-flight remote calls.
    pub max_concurrent_api: usize,

    pub cache_enabled: bool,
    pub cache_ttl_ms: u64,
    pub cache_max_entries: usize,

    pub streaming_enabled: bool,
    pub streaming_threshold_bytes: u64,

    pub memory_threshold_bytes: u64,

    /// Explicit batch-size override; `None` defers to the governor.
    pub batch_size_override: Option<usize>,

    pub timeout_ms: u64,

    pub training_data_path: std::path::PathBuf,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            remote_token: None,
            max_concurrent_files: 4,
            max_concurrent_api: 3,
            cache_enabled: true,
            cache_ttl_ms: 300_000,
            cache_max_entries: 2000,
            streaming_enabled: true,
            streaming_threshold_bytes: 1_048_576,
            memory_threshold_bytes: 209_715_200,
            batch_size_override: None,
            timeout_ms: 30_000,
            training_data_path: std::path::PathBuf::from("training-data"),
        }
    }
}

impl ScannerConfig {
    pub fn authenticated(token: impl Into<String>) -> Self {
        Self {
            remote_token: Some(token.into()),
            max_concurrent_files: 8,
            max_concurrent_api: 5,
            ..Default::default()
        }
    }

    pub fn with_training_data_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.training_data_path = path.into();
        self
    }

    pub fn with_batch_size_override(mut self, size: usize) -> Self {
        self.batch_size_override = Some(size);
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.remote_token.is_some()
    }

    /// Env override wins over everything else (spec §4.1/§6).
    pub fn file_limit_override_from_env() -> Option<usize> {
        std::env::var(FILE_LIMIT_ENV_VAR)
            .ok()
            .and_then(|v| v.parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_unauthenticated() {
        let cfg = ScannerConfig::default();
        assert!(!cfg.is_authenticated());
        assert_eq!(cfg.max_concurrent_files, 4);
    }

    #[test]
    fn authenticated_raises_concurrency_defaults() {
        let cfg = ScannerConfig::authenticated("ghp_test");
        assert!(cfg.is_authenticated());
        assert_eq!(cfg.max_concurrent_files, 8);
        assert_eq!(cfg.max_concurrent_api, 5);
    }
}
