//! Embedded video API endpoints

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};

use crate::api::middleware::AppState;
use crate::api::responses::{messages, ApiResponse, ApiResult};
use crate::models::{CreateVideoInput, UpdateVideoInput, Video};

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/videos", get(list_videos))
        .route("/videos/{id}", get(get_video))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/videos", post(create_video))
        .route("/videos/{id}", axum::routing::put(update_video).delete(remove_video))
}

async fn list_videos(State(state): State<AppState>) -> ApiResult<Vec<Video>> {
    Ok(ApiResponse::ok(messages::OK, state.video_service.list().await?))
}

async fn get_video(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Video> {
    Ok(ApiResponse::ok(messages::OK, state.video_service.find(id).await?))
}

async fn create_video(
    State(state): State<AppState>,
    Json(body): Json<CreateVideoInput>,
) -> ApiResult<Video> {
    let video = state.video_service.create(&body).await?;
    Ok(ApiResponse::created(messages::CREATED, video))
}

async fn update_video(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateVideoInput>,
) -> ApiResult<Video> {
    let video = state.video_service.update(id, &body).await?;
    Ok(ApiResponse::ok(messages::UPDATED, video))
}

async fn remove_video(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    state.video_service.remove(id).await?;
    Ok(ApiResponse::message(messages::REMOVED))
}
