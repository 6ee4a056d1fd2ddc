//! Remote code-forge domain models (spec §4.3), modeled after
//! `github::models` in the teacher but trimmed to exactly what the three
//! supported operations need: tree entries, blob content, and rate-limit
//! state.

use serde::{Deserialize, Serialize};

/// One entry in a repository's recursive tree listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub sha: String,
    #[serde(default)]
    pub size: Option<u64>,
}

impl FileEntry {
    pub fn is_blob(&self) -> bool {
        self.entry_type == "blob"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TreeResponse {
    pub tree: Vec<FileEntry>,
    #[serde(default)]
    pub truncated: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BlobResponse {
    pub content: String,
    pub encoding: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RepoResponse {
    pub default_branch: String,
}

/// Raw rate-limit payload shape (`{"rate": {"remaining": .., "reset": ..}}`).
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RateLimitResponse {
    pub rate: RateLimitCore,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RateLimitCore {
    pub remaining: i64,
    pub reset: i64,
}
