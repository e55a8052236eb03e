//! Durable key-value storage for URL mappings and users.
//!
//! Two collections: `urls` keyed by short code and `users` keyed by user id,
//! plus one secondary index over `urls.owner_id`. Adapters provide no
//! cross-collection integrity; the registry owns that.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;

use crate::{
    error::StoreError,
    models::{UrlRecord, UserRecord},
};

pub type StoreResult<T> = Result<T, StoreError>;

/// Outcome of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Created,
    AlreadyExists,
}

/// Outcome of a delete. Deleting an absent key is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

#[async_trait]
pub trait LinkStore: Send + Sync + 'static {
    /// Fetch a mapping by short code.
    async fn get_url(&self, short_code: &str) -> StoreResult<Option<UrlRecord>>;

    /// Write `record` only if no mapping exists for its short code.
    async fn put_url_if_absent(&self, record: &UrlRecord) -> StoreResult<PutOutcome>;

    /// Unconditional upsert.
    async fn put_url(&self, record: &UrlRecord) -> StoreResult<()>;

    /// Atomically add one to the visit counter. Returns the new count, or
    /// `None` if the mapping does not exist.
    async fn increment_visits(&self, short_code: &str) -> StoreResult<Option<i64>>;

    async fn delete_url(&self, short_code: &str) -> StoreResult<DeleteOutcome>;

    /// Query the ownership index.
    async fn urls_by_owner(&self, owner_id: i64) -> StoreResult<Vec<UrlRecord>>;

    async fn get_user(&self, user_id: i64) -> StoreResult<Option<UserRecord>>;

    async fn put_user_if_absent(&self, user: &UserRecord) -> StoreResult<PutOutcome>;

    async fn delete_user(&self, user_id: i64) -> StoreResult<DeleteOutcome>;

    /// Release pooled connections. Called once at shutdown.
    async fn close(&self) {}
}
