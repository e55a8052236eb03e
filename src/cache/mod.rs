//! Volatile, TTL-bounded cache in front of the store.
//!
//! The cache is advisory: a miss or an error must only cost latency. Callers
//! in the service layer log and swallow every `CacheError`.

mod memory;
mod redis_cache;

pub use memory::MemoryCache;
pub use redis_cache::RedisCache;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::CacheError;

pub type CacheResult<T> = Result<T, CacheError>;

/// Default time-to-live for cache entries.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

#[async_trait]
pub trait LinkCache: Send + Sync + 'static {
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    async fn delete(&self, key: &str) -> CacheResult<()>;
}

/// Cache key for a short code.
pub fn url_key(short_code: &str) -> String {
    format!("url:{short_code}")
}

/// Store-only mode: every lookup misses and every write is dropped.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullCache;

#[async_trait]
impl LinkCache for NullCache {
    async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> CacheResult<()> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> CacheResult<()> {
        Ok(())
    }
}
