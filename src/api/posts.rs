//! Post API endpoints

use axum::{
    extract::{Multipart, Path, Query, State},
    routing::{get, post},
    Json, Router,
};

use crate::api::middleware::{AppState, AuthenticatedUser};
use crate::api::responses::{messages, ApiResponse, ApiResult};
use crate::api::upload::store_form_file;
use crate::models::{CreatePostInput, ListParams, PagedResult, PostDetail, UpdatePostInput, UploadedFile};

const UPLOAD_PREFIX: &str = "posts";

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts))
        .route("/posts/featured", get(featured_posts))
        .route("/posts/{id}", get(get_post))
        .route("/posts/{id}/view", post(register_view))
}

/// Admins, main editors and editors
pub fn writer_router() -> Router<AppState> {
    Router::new()
        .route("/posts", post(create_post))
        .route("/posts/upload", post(upload_file))
}

/// Admins and main editors
pub fn staff_router() -> Router<AppState> {
    Router::new().route("/posts/{id}", axum::routing::put(update_post).delete(remove_post))
}

async fn list_posts(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<PagedResult<PostDetail>> {
    let page = state.post_service.list(&params.normalized()).await?;
    Ok(ApiResponse::ok(messages::OK, page))
}

async fn featured_posts(State(state): State<AppState>) -> ApiResult<Vec<PostDetail>> {
    Ok(ApiResponse::ok(messages::OK, state.post_service.featured().await?))
}

async fn get_post(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<PostDetail> {
    Ok(ApiResponse::ok(messages::OK, state.post_service.find(id).await?))
}

async fn register_view(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    state.post_service.register_view(id).await?;
    Ok(ApiResponse::message(messages::OK))
}

async fn create_post(
    State(state): State<AppState>,
    AuthenticatedUser(author): AuthenticatedUser,
    Json(body): Json<CreatePostInput>,
) -> ApiResult<PostDetail> {
    let post = state.post_service.create(&author, &body).await?;
    Ok(ApiResponse::created(messages::CREATED, post))
}

async fn upload_file(State(state): State<AppState>, multipart: Multipart) -> ApiResult<UploadedFile> {
    let max = state.upload_service.config().max_file_size;
    store_form_file(&state, multipart, UPLOAD_PREFIX, max, false).await
}

async fn update_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdatePostInput>,
) -> ApiResult<PostDetail> {
    let post = state.post_service.update(id, &body).await?;
    Ok(ApiResponse::ok(messages::UPDATED, post))
}

async fn remove_post(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    state.post_service.remove(id).await?;
    Ok(ApiResponse::message(messages::REMOVED))
}
