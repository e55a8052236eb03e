use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::Arc;

use super::{DeleteOutcome, LinkStore, PutOutcome, StoreResult};
use crate::models::{UrlRecord, UserRecord};

/// In-process store backed by DashMap, selected with `DATABASE_URL=memory`.
///
/// Conditional puts go through the entry API and the visit counter is bumped
/// under the shard's write guard, so both are atomic per key. The ownership
/// query walks every mapping; fine for a single process, not for large data.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    urls: Arc<DashMap<String, UrlRecord>>,
    users: Arc<DashMap<i64, UserRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored mappings.
    #[cfg(test)]
    pub fn url_count(&self) -> usize {
        self.urls.len()
    }
}

#[async_trait]
impl LinkStore for MemoryStore {
    async fn get_url(&self, short_code: &str) -> StoreResult<Option<UrlRecord>> {
        Ok(self.urls.get(short_code).map(|r| r.clone()))
    }

    async fn put_url_if_absent(&self, record: &UrlRecord) -> StoreResult<PutOutcome> {
        Ok(match self.urls.entry(record.short_code.clone()) {
            Entry::Occupied(_) => PutOutcome::AlreadyExists,
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                PutOutcome::Created
            }
        })
    }

    async fn put_url(&self, record: &UrlRecord) -> StoreResult<()> {
        self.urls.insert(record.short_code.clone(), record.clone());
        Ok(())
    }

    async fn increment_visits(&self, short_code: &str) -> StoreResult<Option<i64>> {
        Ok(self.urls.get_mut(short_code).map(|mut r| {
            r.visit_count += 1;
            r.visit_count
        }))
    }

    async fn delete_url(&self, short_code: &str) -> StoreResult<DeleteOutcome> {
        Ok(match self.urls.remove(short_code) {
            Some(_) => DeleteOutcome::Deleted,
            None => DeleteOutcome::NotFound,
        })
    }

    async fn urls_by_owner(&self, owner_id: i64) -> StoreResult<Vec<UrlRecord>> {
        let mut records: Vec<UrlRecord> = self
            .urls
            .iter()
            .filter(|r| r.owner_id == Some(owner_id))
            .map(|r| r.value().clone())
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records)
    }

    async fn get_user(&self, user_id: i64) -> StoreResult<Option<UserRecord>> {
        Ok(self.users.get(&user_id).map(|u| u.clone()))
    }

    async fn put_user_if_absent(&self, user: &UserRecord) -> StoreResult<PutOutcome> {
        Ok(match self.users.entry(user.user_id) {
            Entry::Occupied(_) => PutOutcome::AlreadyExists,
            Entry::Vacant(slot) => {
                slot.insert(user.clone());
                PutOutcome::Created
            }
        })
    }

    async fn delete_user(&self, user_id: i64) -> StoreResult<DeleteOutcome> {
        Ok(match self.users.remove(&user_id) {
            Some(_) => DeleteOutcome::Deleted,
            None => DeleteOutcome::NotFound,
        })
    }
}
