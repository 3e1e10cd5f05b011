//! Upload API endpoints
//!
//! - PUT /api/v1/uploads/signed/{key}?expires=&signature= accepts the body
//!   of a direct upload granted by a signed URL
//! - `store_form_file` backs the per-resource multipart upload routes

use axum::{
    body::Bytes,
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderMap},
    routing::put,
    Router,
};
use serde::Deserialize;

use crate::api::common::FormData;
use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::{messages, ApiResponse, ApiResult};
use crate::models::UploadedFile;

#[derive(Debug, Deserialize)]
pub struct SignedQuery {
    pub expires: i64,
    pub signature: String,
}

/// The signature in the query string is the credential
pub fn public_router() -> Router<AppState> {
    Router::new().route("/uploads/signed/{*key}", put(put_signed))
}

async fn put_signed(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<SignedQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<UploadedFile> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream");
    let stored = state
        .upload_service
        .put_signed(&key, query.expires, &query.signature, &body, content_type)
        .await?;
    Ok(upload_response(stored))
}

/// Store the `file` field of a multipart body under `prefix`
pub async fn store_form_file(
    state: &AppState,
    multipart: Multipart,
    prefix: &str,
    max_size: u64,
    images_only: bool,
) -> ApiResult<UploadedFile> {
    let form = FormData::read(multipart).await?;
    let file = form
        .file("file")
        .ok_or_else(|| ApiError::validation_error("No file provided"))?;
    if images_only && !file.is_image() {
        return Err(ApiError::validation_error(format!(
            "Invalid file type: {}",
            file.content_type
        )));
    }
    let stored = state
        .upload_service
        .upload(file.request(prefix, max_size))
        .await?;
    Ok(upload_response(stored))
}

fn upload_response(stored: UploadedFile) -> ApiResponse<UploadedFile> {
    if stored.duplicated {
        ApiResponse::ok(messages::FILE_ALREADY_EXISTS, stored)
    } else {
        ApiResponse::created(messages::UPLOADED, stored)
    }
}
