use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A short-URL mapping from the `urls` table.
///
/// The same shape is JSON-encoded into the cache, so the serde field names are
/// also the cache wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UrlRecord {
    pub short_code: String,
    pub original_url: String,
    pub owner_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub visit_count: i64,
}

impl UrlRecord {
    /// A fresh record as written on first creation: zero visits, stamped now.
    pub fn new(short_code: String, original_url: String, owner_id: Option<i64>) -> Self {
        Self {
            short_code,
            original_url,
            owner_id,
            created_at: Utc::now(),
            visit_count: 0,
        }
    }
}

/// A user from the `users` table. `password` holds an Argon2 PHC string and is
/// never serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub created_at: DateTime<Utc>,
}

/// Input for registering a user. A missing `user_id` is generated.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub user_id: Option<i64>,
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Result of `create_mapping`. `created == false` means the code already
/// mapped to the same URL and the existing record was returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOutcome {
    pub record: UrlRecord,
    pub created: bool,
}

/// Summary of a fully successful cascade delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeReport {
    pub user_id: i64,
    pub deleted_codes: Vec<String>,
    /// False when the user record was already gone (a retried cascade).
    pub user_deleted: bool,
}
