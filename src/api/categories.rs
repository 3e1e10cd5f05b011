//! Category API endpoints
//!
//! Creation takes a multipart body so a thumbnail can travel with the fields.

use axum::{
    extract::{Multipart, Path, Query, State},
    routing::{get, patch, post},
    Json, Router,
};

use crate::api::common::{FormData, ReorderBody};
use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::{messages, ApiResponse, ApiResult};
use crate::models::{Category, CreateCategoryInput, ListParams, PagedResult, UpdateCategoryInput};

const THUMBNAIL_PREFIX: &str = "categories";

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories))
        .route("/categories/{id}", get(get_category))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/categories", post(create_category))
        .route(
            "/categories/{id}",
            axum::routing::put(update_category).delete(remove_category),
        )
        .route("/categories/{id}/order", patch(reorder_category))
}

async fn list_categories(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<PagedResult<Category>> {
    let page = state.category_service.list(&params.normalized()).await?;
    Ok(ApiResponse::ok(messages::OK, page))
}

async fn get_category(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Category> {
    Ok(ApiResponse::ok(messages::OK, state.category_service.find(id).await?))
}

async fn create_category(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Category> {
    let form = FormData::read(multipart).await?;
    let name = form
        .non_empty("name")
        .ok_or_else(|| ApiError::validation_error("Name is required"))?;
    let parent_id = match form.non_empty("parentId") {
        Some(raw) => Some(
            raw.parse::<i64>()
                .map_err(|_| ApiError::validation_error("Invalid parentId"))?,
        ),
        None => None,
    };

    let thumbnail_url = match form.file("file") {
        Some(file) if !file.is_image() => {
            return Err(ApiError::validation_error("Thumbnail must be an image"));
        }
        Some(file) => {
            let max = state.upload_service.config().max_image_size;
            let stored = state
                .upload_service
                .upload(file.request(THUMBNAIL_PREFIX, max))
                .await?;
            Some(stored.url)
        }
        None => None,
    };

    let input = CreateCategoryInput {
        name,
        slug: form.non_empty("slug").unwrap_or_default(),
        description: form.non_empty("description"),
        parent_id,
        is_visible: form.flag("isVisible"),
        color: form.non_empty("color"),
        is_featured: form.flag("isFeatured"),
        thumbnail_url,
    };
    let category = state.category_service.create(&input).await?;
    Ok(ApiResponse::created(messages::CREATED, category))
}

async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateCategoryInput>,
) -> ApiResult<Category> {
    let category = state.category_service.update(id, &body).await?;
    Ok(ApiResponse::ok(messages::UPDATED, category))
}

async fn remove_category(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    state.category_service.remove(id).await?;
    Ok(ApiResponse::message(messages::REMOVED))
}

async fn reorder_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<ReorderBody>,
) -> ApiResult<Category> {
    let category = state
        .category_service
        .reorder(id, &body.raw_index()?)
        .await?;
    Ok(ApiResponse::ok(messages::REORDERED, category))
}
