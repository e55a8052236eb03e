use crate::{codegen, error::ShortenError, AppState};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// GET /:code
///
/// Resolves through the cache-aside path (which also counts the visit) and
/// answers with a 301 to the original URL. Paths that cannot be a short code
/// are 404 without touching the cache or store.
pub async fn redirect(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Response, ShortenError> {
    if !codegen::is_short_code(&code) {
        return Err(ShortenError::NotFound);
    }
    let record = state.mappings.resolve_mapping(&code).await?;

    Ok((
        StatusCode::MOVED_PERMANENTLY,
        [(header::LOCATION, record.original_url)],
    )
        .into_response())
}
