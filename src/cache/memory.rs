use async_trait::async_trait;
use dashmap::DashMap;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use super::{CacheResult, LinkCache};

/// Thread-safe in-memory cache with per-entry expiry.
///
/// Backed by a DashMap so reads are concurrent and lock-free for most cases.
/// Expired entries are dropped lazily when they are next read.
#[derive(Clone, Debug)]
pub struct MemoryCache {
    inner: Arc<DashMap<String, Entry>>,
}

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
        }
    }

    /// Number of entries currently held, including ones that have expired but
    /// not been read since.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LinkCache for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let now = Instant::now();
        if let Some(entry) = self.inner.get(key) {
            if entry.expires_at > now {
                return Ok(Some(entry.value.clone()));
            }
        }
        // Either absent or expired; the guard above is released by now.
        self.inner.remove_if(key, |_, entry| entry.expires_at <= now);
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        self.inner.insert(
            key.to_owned(),
            Entry {
                value: value.to_owned(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.inner.remove(key);
        Ok(())
    }
}
