//! Error taxonomy for the code intelligence engine.
//!
//! Mirrors the closed error set from the design: validation failures at
//! public boundaries, remote code-forge errors (subdivided by retryability),
//! timeouts, and persistence failures. `ValidationFailure` (the quality
//! validator's structured outcome) is intentionally *not* part of this enum
//! — it is a normal return value, never an exception.

use chrono::{DateTime, Utc};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Top-level error type returned at every public boundary of the engine.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("fatal error: {0}")]
    Fatal(String),
}

impl CoreError {
    /// A stable, short code safe to surface to callers. The full error is
    /// logged separately via `tracing`; raw error text never reaches
    /// user-visible fields (spec §7).
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Validation(_) => "validation_error",
            CoreError::Remote(RemoteError::NotFound { .. }) => "remote_not_found",
            CoreError::Remote(RemoteError::Forbidden {
                kind: ForbiddenKind::Quota,
                ..
            }) => "remote_quota_exhausted",
            CoreError::Remote(RemoteError::Forbidden {
                kind: ForbiddenKind::Access,
                ..
            }) => "remote_access_denied",
            CoreError::Remote(RemoteError::Transient(_)) => "remote_transient",
            CoreError::Remote(RemoteError::Fatal(_)) => "remote_fatal",
            CoreError::Timeout(_) => "timeout",
            CoreError::Persistence(_) => "persistence_error",
            CoreError::Fatal(_) => "fatal",
        }
    }

    /// Whether the retry executor (C2) should retry this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::Remote(RemoteError::Forbidden {
                kind: ForbiddenKind::Quota,
                ..
            }) | CoreError::Remote(RemoteError::Transient(_))
        )
    }
}

/// Errors originating from the remote code-forge client (C3).
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden ({kind:?}): {message}")]
    Forbidden {
        kind: ForbiddenKind,
        message: String,
        /// Remaining quota at the time of failure, if known.
        remaining: Option<i64>,
        reset_at: Option<DateTime<Utc>>,
    },

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("fatal remote failure: {0}")]
    Fatal(String),
}

/// Subdivision of `RemoteError::Forbidden` per spec §4.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForbiddenKind {
    /// Rate-limit/quota exhaustion — retryable.
    Quota,
    /// Access denied (bad token, insufficient scope) — not retryable.
    Access,
}

/// Errors from the persistence layer (C10).
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type PersistenceResult<T> = std::result::Result<T, PersistenceError>;
