//! Users and the short codes they own.
//!
//! Ownership lives on the mapping records (`owner_id`) and is looked up
//! through the store's ownership index. Nothing in the store ties the two
//! collections together, so deleting a user is a cascade driven from here:
//! owned mappings first, then the user record. The cascade is not atomic;
//! a partial failure is reported and the whole cascade can simply be re-run.

use argon2::{Argon2, PasswordHasher};
use chrono::Utc;
use futures::{stream, StreamExt};
use password_hash::SaltString;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    error::{CascadeFailure, CascadeStage, ShortenError},
    models::{CascadeReport, NewUser, UserRecord},
    service::MappingService,
    store::{DeleteOutcome, LinkStore, PutOutcome},
};

#[derive(Clone)]
pub struct UserLinkRegistry {
    store: Arc<dyn LinkStore>,
    mappings: MappingService,
    /// Upper bound on mapping deletes in flight during one cascade.
    concurrency: usize,
}

impl UserLinkRegistry {
    pub fn new(store: Arc<dyn LinkStore>, mappings: MappingService, concurrency: usize) -> Self {
        Self {
            store,
            mappings,
            concurrency: concurrency.max(1),
        }
    }

    #[instrument(skip(self, new_user), fields(user_id = ?new_user.user_id))]
    pub async fn create_user(&self, new_user: NewUser) -> Result<UserRecord, ShortenError> {
        let name = required("name", &new_user.name)?;
        let email = required("email", &new_user.email)?;
        if !email.contains('@') {
            return Err(ShortenError::Validation("email is malformed".into()));
        }
        if new_user.password.is_empty() {
            return Err(ShortenError::Validation("password is required".into()));
        }

        let user = UserRecord {
            user_id: new_user.user_id.unwrap_or_else(generate_user_id),
            name: name.to_owned(),
            email: email.to_owned(),
            password: hash_password(&new_user.password)?,
            created_at: Utc::now(),
        };

        match self.store.put_user_if_absent(&user).await? {
            PutOutcome::Created => {
                tracing::info!("Created user {}", user.user_id);
                Ok(user)
            }
            PutOutcome::AlreadyExists => Err(ShortenError::Conflict(format!(
                "user {} already exists",
                user.user_id
            ))),
        }
    }

    #[instrument(skip(self))]
    pub async fn get_user(&self, user_id: i64) -> Result<UserRecord, ShortenError> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or(ShortenError::NotFound)
    }

    /// Delete every mapping owned by `user_id`, then the user record.
    ///
    /// Mapping deletes run concurrently, at most `concurrency` at a time, and
    /// all of them finish before the user record is touched. Mappings that are
    /// already gone count as deleted. Succeeds only if every step succeeded;
    /// otherwise returns `PartialFailure` naming the failed codes and stage.
    /// Re-running a finished cascade succeeds with an empty report.
    #[instrument(skip(self))]
    pub async fn delete_user_cascade(&self, user_id: i64) -> Result<CascadeReport, ShortenError> {
        let owned = self.store.urls_by_owner(user_id).await?;
        tracing::debug!("User {} owns {} mapping(s)", user_id, owned.len());

        let mappings = &self.mappings;
        let results: Vec<(String, Result<(), ShortenError>)> =
            stream::iter(owned.into_iter().map(|record| record.short_code))
                .map(|code| async move {
                    let result = match mappings.delete_mapping(&code).await {
                        Err(ShortenError::NotFound) => Ok(()),
                        other => other,
                    };
                    (code, result)
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        let mut deleted_codes = Vec::new();
        let mut failed_codes = Vec::new();
        for (code, result) in results {
            match result {
                Ok(()) => deleted_codes.push(code),
                Err(e) => {
                    tracing::error!("Cascade for user {}: deleting {} failed: {}", user_id, code, e);
                    failed_codes.push(code);
                }
            }
        }
        deleted_codes.sort();
        failed_codes.sort();

        let (user_deleted, user_failed) = match self.store.delete_user(user_id).await {
            Ok(DeleteOutcome::Deleted) => (true, false),
            Ok(DeleteOutcome::NotFound) => (false, false),
            Err(e) => {
                tracing::error!("Cascade for user {}: deleting user record failed: {}", user_id, e);
                (false, true)
            }
        };

        let stage = match (failed_codes.is_empty(), user_failed) {
            (true, false) => None,
            (false, false) => Some(CascadeStage::Urls),
            (true, true) => Some(CascadeStage::User),
            (false, true) => Some(CascadeStage::UrlsAndUser),
        };

        if let Some(stage) = stage {
            return Err(ShortenError::PartialFailure(CascadeFailure {
                user_id,
                stage,
                failed_codes,
                deleted_codes,
            }));
        }

        tracing::info!(
            "Deleted user {} and {} mapping(s)",
            user_id,
            deleted_codes.len()
        );
        Ok(CascadeReport {
            user_id,
            deleted_codes,
            user_deleted,
        })
    }
}

fn required<'a>(field: &str, value: &'a str) -> Result<&'a str, ShortenError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ShortenError::Validation(format!("{field} is required")));
    }
    Ok(value)
}

/// A random positive 48-bit id: the top six bytes of the SHA-256 of a v4 UUID.
fn generate_user_id() -> i64 {
    let digest = Sha256::digest(Uuid::new_v4().as_bytes());
    let mut bytes = [0u8; 8];
    bytes[2..].copy_from_slice(&digest[..6]);
    i64::from_be_bytes(bytes)
}

fn hash_password(password: &str) -> Result<String, ShortenError> {
    let salt = SaltString::encode_b64(&rand::random::<[u8; 16]>())
        .map_err(|e| ShortenError::Internal(format!("salt encoding failed: {e}")))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ShortenError::Internal(format!("password hashing failed: {e}")))?;
    Ok(hash.to_string())
}
