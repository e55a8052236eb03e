use crate::{
    codegen,
    error::ShortenError,
    models::{CascadeReport, NewUser, UrlRecord, UserRecord},
    AppState,
};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

// ── Request / response types ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUrlRequest {
    original_url: Option<String>,
    domain_name: Option<String>,
    owner_id: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MappingResponse {
    #[serde(flatten)]
    record: UrlRecord,
    short_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    created: Option<bool>,
}

impl MappingResponse {
    fn new(record: UrlRecord, base_url: &str, created: Option<bool>) -> Self {
        let short_url = format!("{}/{}", base_url, record.short_code);
        Self {
            record,
            short_url,
            created,
        }
    }
}

// ── URLs ───────────────────────────────────────────────────────────────────

/// POST /api/urls
///
/// 201 when a new mapping was written, 200 when the URL was already
/// shortened and the existing mapping is returned.
pub async fn create_url(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateUrlRequest>, JsonRejection>,
) -> Result<Response, ShortenError> {
    let Json(req) = payload?;
    let url = codegen::normalize_input(req.original_url.as_deref(), req.domain_name.as_deref())?;
    let outcome = state.mappings.create_mapping(&url, req.owner_id).await?;

    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    let body = MappingResponse::new(outcome.record, &state.config.base_url, Some(outcome.created));
    Ok((status, Json(body)).into_response())
}

/// GET /api/urls/:code
pub async fn get_url(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Response, ShortenError> {
    let record = state.mappings.get_mapping(&code).await?;
    Ok(Json(MappingResponse::new(record, &state.config.base_url, None)).into_response())
}

/// DELETE /api/urls/:code
pub async fn delete_url(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Response, ShortenError> {
    state.mappings.delete_mapping(&code).await?;
    Ok(Json(json!({ "message": "URL deleted successfully", "shortCode": code })).into_response())
}

// ── Users ──────────────────────────────────────────────────────────────────

/// POST /api/users
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> Result<(StatusCode, Json<UserRecord>), ShortenError> {
    let Json(new_user) = payload?;
    let user = state.registry.create_user(new_user).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /api/users/:id
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
) -> Result<Json<UserRecord>, ShortenError> {
    Ok(Json(state.registry.get_user(user_id).await?))
}

/// DELETE /api/users/:id
///
/// Removes the user and every mapping it owns.
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
) -> Result<Json<CascadeReport>, ShortenError> {
    Ok(Json(state.registry.delete_user_cascade(user_id).await?))
}
