//! Banner API endpoints
//!
//! Every banner route needs a signed-in account; writes are admin only.

use axum::{
    extract::{Multipart, Path, State},
    routing::{get, patch, post},
    Json, Router,
};

use crate::api::common::ReorderBody;
use crate::api::middleware::AppState;
use crate::api::responses::{messages, ApiResponse, ApiResult};
use crate::api::upload::store_form_file;
use crate::models::{Banner, CreateBannerInput, UpdateBannerInput, UploadedFile};

const UPLOAD_PREFIX: &str = "banners";

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/banners", get(list_banners))
        .route("/banners/{id}", get(get_banner))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/banners", post(create_banner))
        .route("/banners/upload", post(upload_image))
        .route(
            "/banners/{id}",
            axum::routing::put(update_banner).delete(remove_banner),
        )
        .route("/banners/{id}/order", patch(reorder_banner))
}

async fn list_banners(State(state): State<AppState>) -> ApiResult<Vec<Banner>> {
    Ok(ApiResponse::ok(messages::OK, state.banner_service.list().await?))
}

async fn get_banner(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Banner> {
    Ok(ApiResponse::ok(messages::OK, state.banner_service.find(id).await?))
}

async fn create_banner(
    State(state): State<AppState>,
    Json(body): Json<CreateBannerInput>,
) -> ApiResult<Banner> {
    let banner = state.banner_service.create(&body).await?;
    Ok(ApiResponse::created(messages::CREATED, banner))
}

async fn upload_image(State(state): State<AppState>, multipart: Multipart) -> ApiResult<UploadedFile> {
    let max = state.upload_service.config().max_image_size;
    store_form_file(&state, multipart, UPLOAD_PREFIX, max, true).await
}

async fn update_banner(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateBannerInput>,
) -> ApiResult<Banner> {
    let banner = state.banner_service.update(id, &body).await?;
    Ok(ApiResponse::ok(messages::UPDATED, banner))
}

async fn remove_banner(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    state.banner_service.remove(id).await?;
    Ok(ApiResponse::message(messages::REMOVED))
}

async fn reorder_banner(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<ReorderBody>,
) -> ApiResult<Banner> {
    let banner = state.banner_service.reorder(id, &body.raw_index()?).await?;
    Ok(ApiResponse::ok(messages::REORDERED, banner))
}
