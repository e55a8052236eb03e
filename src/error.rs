use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Failure reported by a durable store adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Failure reported by a cache adapter. Never leaves the service layer; every
/// cache error degrades to a store lookup.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("cache value could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("cache backend error: {0}")]
    Backend(String),
}

/// Which part of a cascade delete did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CascadeStage {
    /// One or more owned URL records could not be deleted.
    Urls,
    /// The owned URLs are gone but the user record delete failed.
    User,
    /// Both stages had failures.
    UrlsAndUser,
}

/// Details of a cascade that only partly completed. Re-running the cascade is
/// safe: already-deleted codes are no-ops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeFailure {
    pub user_id: i64,
    pub stage: CascadeStage,
    pub failed_codes: Vec<String>,
    pub deleted_codes: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ShortenError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("short code {short_code} already maps to a different URL")]
    HashCollision { short_code: String },

    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("cascade delete only partly completed: {0:?}")]
    PartialFailure(CascadeFailure),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<JsonRejection> for ShortenError {
    fn from(rejection: JsonRejection) -> Self {
        ShortenError::Validation(rejection.body_text())
    }
}

impl IntoResponse for ShortenError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ShortenError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, json!({ "error": msg }))
            }
            ShortenError::Conflict(msg) => (StatusCode::CONFLICT, json!({ "error": msg })),
            ShortenError::HashCollision { short_code } => (
                StatusCode::CONFLICT,
                json!({
                    "error": "Short code is already taken by a different URL",
                    "shortCode": short_code,
                }),
            ),
            ShortenError::NotFound => (StatusCode::NOT_FOUND, json!({ "error": "Not found" })),
            ShortenError::Store(e) => {
                tracing::error!("Store failure: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal error" }),
                )
            }
            ShortenError::Internal(msg) => {
                tracing::error!("Internal failure: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal error" }),
                )
            }
            ShortenError::PartialFailure(failure) => {
                tracing::error!("Partial cascade failure: {:?}", failure);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "error": "Cascade delete did not complete; retry the request",
                        "stage": failure.stage,
                        "failedCodes": failure.failed_codes,
                        "deletedCodes": failure.deleted_codes,
                    }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
