//! Tag API endpoints

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};

use crate::api::middleware::AppState;
use crate::api::responses::{messages, ApiResponse, ApiResult};
use crate::models::{CreateTagInput, Tag, UpdateTagInput};

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/tags", get(list_tags))
        .route("/tags/{id}", get(get_tag))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/tags", post(create_tag))
        .route("/tags/{id}", axum::routing::put(update_tag).delete(remove_tag))
}

async fn list_tags(State(state): State<AppState>) -> ApiResult<Vec<Tag>> {
    Ok(ApiResponse::ok(messages::OK, state.tag_service.list().await?))
}

async fn get_tag(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Tag> {
    Ok(ApiResponse::ok(messages::OK, state.tag_service.find(id).await?))
}

async fn create_tag(
    State(state): State<AppState>,
    Json(body): Json<CreateTagInput>,
) -> ApiResult<Tag> {
    let tag = state.tag_service.create(&body).await?;
    Ok(ApiResponse::created(messages::CREATED, tag))
}

async fn update_tag(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateTagInput>,
) -> ApiResult<Tag> {
    let tag = state.tag_service.update(id, &body).await?;
    Ok(ApiResponse::ok(messages::UPDATED, tag))
}

async fn remove_tag(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    state.tag_service.remove(id).await?;
    Ok(ApiResponse::message(messages::REMOVED))
}
