//! Site document API endpoints
//!
//! - /magazine: current print edition (PDF upload)
//! - /live: live stream link and toggle
//! - /pauta: editorial agenda image
//! - /pages/{kind}: about, contact and usage-terms pages

use axum::{
    extract::{Multipart, Path, State},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};

use crate::api::common::FormData;
use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::{messages, ApiResponse, ApiResult};
use crate::models::{DocumentKind, LiveStream, Magazine, PageContent, Pauta};
use crate::services::{LiveInput, PageInput, SiteUpload};

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/magazine", get(get_magazine))
        .route("/live", get(get_live))
        .route("/pauta", get(get_pauta))
        .route("/pages/{kind}", get(get_page))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/magazine", post(upload_magazine))
        .route("/live", put(put_live))
        .route("/pauta", put(put_pauta))
        .route("/pages/{kind}", put(put_page))
}

fn page_kind(raw: &str) -> Result<DocumentKind, ApiError> {
    raw.parse::<DocumentKind>()
        .ok()
        .filter(DocumentKind::is_page)
        .ok_or_else(|| ApiError::not_found(format!("Page {} not found", raw)))
}

/// Saved document, or the already stored file under `duplicate_message`
fn upload_response<T: serde::Serialize>(
    outcome: SiteUpload<T>,
    duplicate_message: &str,
) -> Response {
    match outcome {
        SiteUpload::Saved(document) => ApiResponse::ok(messages::UPDATED, document).into_response(),
        SiteUpload::Duplicate(existing) => {
            ApiResponse::ok(duplicate_message, existing).into_response()
        }
    }
}

async fn get_magazine(State(state): State<AppState>) -> ApiResult<Option<Magazine>> {
    Ok(ApiResponse::ok(messages::OK, state.site_service.magazine().await?))
}

async fn upload_magazine(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = FormData::read(multipart).await?;
    let file = form
        .file("file")
        .ok_or_else(|| ApiError::validation_error("No file provided"))?;
    let outcome = state.site_service.upload_magazine(file).await?;
    Ok(upload_response(outcome, messages::MAGAZINE_ALREADY_EXISTS))
}

async fn get_live(State(state): State<AppState>) -> ApiResult<LiveStream> {
    Ok(ApiResponse::ok(messages::OK, state.site_service.live().await?))
}

async fn put_live(
    State(state): State<AppState>,
    Json(body): Json<LiveInput>,
) -> ApiResult<LiveStream> {
    let live = state.site_service.put_live(&body).await?;
    Ok(ApiResponse::ok(messages::UPDATED, live))
}

async fn get_pauta(State(state): State<AppState>) -> ApiResult<Option<Pauta>> {
    Ok(ApiResponse::ok(messages::OK, state.site_service.pauta().await?))
}

async fn put_pauta(State(state): State<AppState>, multipart: Multipart) -> Result<Response, ApiError> {
    let form = FormData::read(multipart).await?;
    let image_url = form.non_empty("imageUrl");
    let outcome = state
        .site_service
        .put_pauta(form.file("file"), image_url.as_deref())
        .await?;
    Ok(upload_response(outcome, messages::PAUTA_ALREADY_EXISTS))
}

async fn get_page(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> ApiResult<Option<PageContent>> {
    let page = state.site_service.page(page_kind(&kind)?).await?;
    Ok(ApiResponse::ok(messages::OK, page))
}

async fn put_page(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(body): Json<PageInput>,
) -> ApiResult<PageContent> {
    let page = state.site_service.put_page(page_kind(&kind)?, &body).await?;
    Ok(ApiResponse::ok(messages::UPDATED, page))
}
