//! File Cache (spec §3, §4.4).
//!
//! An in-memory LRU cache with absolute per-entry TTL, keyed by
//! `(repo_full_name, path, sha)`. Modeled after the teacher's
//! `cache_layer::CacheLayer` entry/expiry bookkeeping, trimmed to the
//! single in-memory tier this crate needs (no Redis backend — that concern
//! belongs to whatever embeds this engine, spec §1).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct FileCacheKey {
    pub repo_full_name: String,
    pub path: String,
    pub sha: String,
}

struct CacheEntry {
    value: String,
    expires_at: Instant,
    last_accessed: Instant,
}

struct Inner {
    entries: HashMap<FileCacheKey, CacheEntry>,
    max_entries: usize,
    ttl: Duration,
}

/// Shared, concurrency-safe file cache (spec §5: "concurrent map with LRU;
/// TTL is absolute — cache miss on expiry").
#[derive(Clone)]
pub struct FileCache {
    inner: Arc<Mutex<Inner>>,
}

impl FileCache {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: HashMap::new(),
                max_entries,
                ttl,
            })),
        }
    }

    /// Cache miss on TTL expiry, per spec §3/§4.4.
    pub async fn get(&self, key: &FileCacheKey) -> Option<String> {
        let mut inner = self.inner.lock().await;
        let now = Instant::now();
        let hit = match inner.entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => None,
            None => None,
        };
        if hit.is_some() {
            if let Some(entry) = inner.entries.get_mut(key) {
                entry.last_accessed = now;
            }
        } else {
            inner.entries.remove(key);
        }
        hit
    }

    pub async fn set(&self, key: FileCacheKey, value: String) {
        let mut inner = self.inner.lock().await;
        let ttl = inner.ttl;
        let now = Instant::now();

        if inner.entries.len() >= inner.max_entries && !inner.entries.contains_key(&key) {
            Self::evict_lru(&mut inner);
        }

        inner.entries.insert(
            key,
            CacheEntry {
                value,
                expires_at: now + ttl,
                last_accessed: now,
            },
        );
    }

    fn evict_lru(inner: &mut Inner) {
        if let Some(lru_key) = inner
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_accessed)
            .map(|(k, _)| k.clone())
        {
            inner.entries.remove(&lru_key);
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(path: &str) -> FileCacheKey {
        FileCacheKey {
            repo_full_name: "owner/repo".into(),
            path: path.into(),
            sha: "sha1".into(),
        }
    }

    #[tokio::test]
    async fn hit_then_miss_after_ttl() {
        let cache = FileCache::new(10, Duration::from_millis(50));
        cache.set(key("a.ts"), "content".into()).await;
        assert_eq!(cache.get(&key("a.ts")).await, Some("content".into()));
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(cache.get(&key("a.ts")).await, None);
    }

    #[tokio::test]
    async fn evicts_lru_on_overflow() {
        let cache = FileCache::new(2, Duration::from_secs(60));
        cache.set(key("a.ts"), "a".into()).await;
        cache.set(key("b.ts"), "b".into()).await;
        // touch a.ts so it's the most-recently used
        let _ = cache.get(&key("a.ts")).await;
        cache.set(key("c.ts"), "c".into()).await;
        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.get(&key("b.ts")).await, None);
        assert_eq!(cache.get(&key("a.ts")).await, Some("a".into()));
        assert_eq!(cache.get(&key("c.ts")).await, Some("c".into()));
    }
}
