//! Store and cache doubles shared by the unit tests.

use async_trait::async_trait;
use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use tokio::sync::Notify;

use crate::{
    cache::{CacheResult, LinkCache, MemoryCache},
    config::AppConfig,
    error::{CacheError, StoreError},
    models::{UrlRecord, UserRecord},
    registry::UserLinkRegistry,
    service::MappingService,
    store::{DeleteOutcome, LinkStore, MemoryStore, PutOutcome, StoreResult},
    AppState,
};

/// Memory cache that counts every call and every hit.
#[derive(Default)]
pub struct CountingCache {
    inner: MemoryCache,
    pub gets: AtomicUsize,
    pub hits: AtomicUsize,
    pub sets: AtomicUsize,
    pub deletes: AtomicUsize,
}

impl CountingCache {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LinkCache for CountingCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let value = self.inner.get(key).await?;
        if value.is_some() {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(key).await
    }
}

/// A cache whose every operation fails.
pub struct BrokenCache;

#[async_trait]
impl LinkCache for BrokenCache {
    async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
        Err(CacheError::Backend("connection refused".into()))
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> CacheResult<()> {
        Err(CacheError::Backend("connection refused".into()))
    }

    async fn delete(&self, _key: &str) -> CacheResult<()> {
        Err(CacheError::Backend("connection refused".into()))
    }
}

/// Memory cache whose `set` parks until `open` is called, so a test can run
/// other operations while a cache fill is in flight.
#[derive(Default)]
pub struct GatedCache {
    inner: MemoryCache,
    opened: AtomicBool,
    pub set_entered: Notify,
    release: Notify,
}

impl GatedCache {
    pub fn open(&self) {
        self.opened.store(true, Ordering::SeqCst);
        self.release.notify_one();
    }
}

#[async_trait]
impl LinkCache for GatedCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        if !self.opened.load(Ordering::SeqCst) {
            self.set_entered.notify_one();
            self.release.notified().await;
        }
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.inner.delete(key).await
    }
}

/// Memory store with switchable failures.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_increment: AtomicBool,
    pub fail_user_delete: AtomicBool,
    pub fail_reads: AtomicBool,
    pub fail_url_deletes: Mutex<HashSet<String>>,
}

impl FlakyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_delete_of(&self, short_code: &str) {
        self.fail_url_deletes
            .lock()
            .unwrap()
            .insert(short_code.to_owned());
    }

    pub fn heal(&self) {
        self.fail_url_deletes.lock().unwrap().clear();
        self.fail_increment.store(false, Ordering::SeqCst);
        self.fail_user_delete.store(false, Ordering::SeqCst);
        self.fail_reads.store(false, Ordering::SeqCst);
    }
}

fn injected() -> StoreError {
    StoreError::Backend("injected failure".into())
}

#[async_trait]
impl LinkStore for FlakyStore {
    async fn get_url(&self, short_code: &str) -> StoreResult<Option<UrlRecord>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.get_url(short_code).await
    }

    async fn put_url_if_absent(&self, record: &UrlRecord) -> StoreResult<PutOutcome> {
        self.inner.put_url_if_absent(record).await
    }

    async fn put_url(&self, record: &UrlRecord) -> StoreResult<()> {
        self.inner.put_url(record).await
    }

    async fn increment_visits(&self, short_code: &str) -> StoreResult<Option<i64>> {
        if self.fail_increment.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.increment_visits(short_code).await
    }

    async fn delete_url(&self, short_code: &str) -> StoreResult<DeleteOutcome> {
        if self.fail_url_deletes.lock().unwrap().contains(short_code) {
            return Err(injected());
        }
        self.inner.delete_url(short_code).await
    }

    async fn urls_by_owner(&self, owner_id: i64) -> StoreResult<Vec<UrlRecord>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.urls_by_owner(owner_id).await
    }

    async fn get_user(&self, user_id: i64) -> StoreResult<Option<UserRecord>> {
        self.inner.get_user(user_id).await
    }

    async fn put_user_if_absent(&self, user: &UserRecord) -> StoreResult<PutOutcome> {
        self.inner.put_user_if_absent(user).await
    }

    async fn delete_user(&self, user_id: i64) -> StoreResult<DeleteOutcome> {
        if self.fail_user_delete.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.delete_user(user_id).await
    }
}

/// Application state over an in-memory store and cache, with the default
/// configuration.
pub fn test_state() -> Arc<AppState> {
    let config = AppConfig::from_lookup(|_| None).unwrap();
    let store: Arc<dyn LinkStore> = Arc::new(MemoryStore::new());
    let cache: Arc<dyn LinkCache> = Arc::new(MemoryCache::new());
    let mappings = MappingService::new(store.clone(), cache, config.cache_ttl);
    let registry = UserLinkRegistry::new(store, mappings.clone(), config.cascade_concurrency);

    Arc::new(AppState {
        config,
        mappings,
        registry,
    })
}
