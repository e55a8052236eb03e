//! Mapping service: create, resolve, and delete short-URL records.
//!
//! Reads are cache-aside: the cache is consulted first and filled from the
//! store on a miss. Writes go to the store only; the cache is never populated
//! on create and is invalidated on delete.
//!
//! Every resolve, hit or miss, ends with the store's atomic visit increment.
//! If the store no longer has the record, the resolve evicts whatever it may
//! have cached and reports NotFound, so a cache fill that lands after a
//! delete cannot outlive the resolve that wrote it. The only stale redirect
//! left is a resolve whose increment ran before the store delete, which
//! happened-before the delete anyway.

use std::{sync::Arc, time::Duration};
use tracing::instrument;

use crate::{
    cache::{url_key, LinkCache},
    codegen::{generate_code, validate_url},
    error::{CacheError, ShortenError, StoreError},
    models::{CreateOutcome, UrlRecord},
    store::{DeleteOutcome, LinkStore, PutOutcome},
};

#[derive(Clone)]
pub struct MappingService {
    store: Arc<dyn LinkStore>,
    cache: Arc<dyn LinkCache>,
    ttl: Duration,
}

impl MappingService {
    pub fn new(store: Arc<dyn LinkStore>, cache: Arc<dyn LinkCache>, ttl: Duration) -> Self {
        Self { store, cache, ttl }
    }

    /// Create the mapping for `original_url`, or return the existing one if the
    /// same URL was shortened before.
    ///
    /// Concurrent creates of one URL are settled by the store's conditional
    /// put: exactly one reports `created`, the rest get the stored record.
    #[instrument(skip(self))]
    pub async fn create_mapping(
        &self,
        original_url: &str,
        owner_id: Option<i64>,
    ) -> Result<CreateOutcome, ShortenError> {
        let original_url = original_url.trim();
        validate_url(original_url)?;

        let short_code = generate_code(original_url);
        let record = UrlRecord::new(short_code.clone(), original_url.to_owned(), owner_id);

        // A second attempt covers a record deleted between our failed put and
        // the follow-up read.
        for _ in 0..2 {
            match self.store.put_url_if_absent(&record).await? {
                PutOutcome::Created => {
                    tracing::info!("Created mapping {} -> {}", short_code, original_url);
                    return Ok(CreateOutcome {
                        record,
                        created: true,
                    });
                }
                PutOutcome::AlreadyExists => match self.store.get_url(&short_code).await? {
                    Some(existing) if existing.original_url == record.original_url => {
                        tracing::debug!("Mapping {} already exists", short_code);
                        return Ok(CreateOutcome {
                            record: existing,
                            created: false,
                        });
                    }
                    Some(existing) => {
                        tracing::error!(
                            "Hash collision on {}: stored {} vs requested {}",
                            short_code,
                            existing.original_url,
                            original_url
                        );
                        return Err(ShortenError::HashCollision { short_code });
                    }
                    None => continue,
                },
            }
        }

        Err(StoreError::Backend(format!(
            "mapping {short_code} reported as existing but could not be read"
        ))
        .into())
    }

    /// Resolve a short code to its record and count the visit.
    ///
    /// The returned record carries the post-increment `visit_count` when the
    /// increment succeeded. A failed increment is logged and never fails the
    /// resolve. An increment that finds no record means a delete won the race:
    /// the cache entry is evicted and the resolve is NotFound. The increment is
    /// awaited before returning so a caller sees its own visit.
    #[instrument(skip(self))]
    pub async fn resolve_mapping(&self, short_code: &str) -> Result<UrlRecord, ShortenError> {
        if short_code.is_empty() {
            return Err(ShortenError::Validation("shortCode is required".into()));
        }

        let mut record = match self.cached(short_code).await {
            Some(record) => record,
            None => {
                let record = self
                    .store
                    .get_url(short_code)
                    .await?
                    .ok_or(ShortenError::NotFound)?;
                self.fill_cache(&record).await;
                record
            }
        };

        match self.store.increment_visits(short_code).await {
            Ok(Some(count)) => record.visit_count = count,
            Ok(None) => {
                tracing::debug!("Mapping {} deleted during resolve; evicting", short_code);
                self.evict(&url_key(short_code)).await;
                return Err(ShortenError::NotFound);
            }
            Err(e) => {
                tracing::error!("Failed to count visit for {}: {:?}", short_code, e)
            }
        }

        Ok(record)
    }

    /// Read a mapping straight from the store, without counting a visit.
    #[instrument(skip(self))]
    pub async fn get_mapping(&self, short_code: &str) -> Result<UrlRecord, ShortenError> {
        self.store
            .get_url(short_code)
            .await?
            .ok_or(ShortenError::NotFound)
    }

    /// Delete a mapping and invalidate its cache entry.
    #[instrument(skip(self))]
    pub async fn delete_mapping(&self, short_code: &str) -> Result<(), ShortenError> {
        let outcome = self.store.delete_url(short_code).await?;

        // Invalidate even on NotFound: a leftover entry would keep redirecting.
        if let Err(e) = self.cache.delete(&url_key(short_code)).await {
            tracing::warn!("Cache invalidation failed for {}: {}", short_code, e);
        }

        match outcome {
            DeleteOutcome::Deleted => {
                tracing::info!("Deleted mapping {}", short_code);
                Ok(())
            }
            DeleteOutcome::NotFound => Err(ShortenError::NotFound),
        }
    }

    async fn cached(&self, short_code: &str) -> Option<UrlRecord> {
        let key = url_key(short_code);
        let raw = match self.cache.get(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Cache read failed for {}: {}", short_code, e);
                return None;
            }
        };

        match serde_json::from_str::<UrlRecord>(&raw).map_err(CacheError::from) {
            Ok(record) if record.short_code == short_code => Some(record),
            Ok(_) => {
                tracing::warn!("Cache entry {} holds another code; evicting", key);
                self.evict(&key).await;
                None
            }
            Err(e) => {
                tracing::warn!("Cache entry {} unusable: {}; evicting", key, e);
                self.evict(&key).await;
                None
            }
        }
    }

    async fn fill_cache(&self, record: &UrlRecord) {
        let value = match serde_json::to_string(record) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Could not encode {} for the cache: {}", record.short_code, e);
                return;
            }
        };
        if let Err(e) = self
            .cache
            .set(&url_key(&record.short_code), &value, self.ttl)
            .await
        {
            tracing::warn!("Cache write failed for {}: {}", record.short_code, e);
        }
    }

    async fn evict(&self, key: &str) {
        if let Err(e) = self.cache.delete(key).await {
            tracing::warn!("Cache eviction failed for {}: {}", key, e);
        }
    }
}
