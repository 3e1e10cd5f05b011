//! Webstory API endpoints
//!
//! Creation is multipart: `videoFile`, optional `coverFile`, `title`,
//! `description`, `isFeatured` and `slides` as a JSON array.

use axum::{
    extract::{Multipart, Path, Query, State},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};

use crate::api::common::{FormData, ReorderBody};
use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::{messages, ApiResponse, ApiResult};
use crate::models::{ListParams, PagedResult, UpdateWebstoryInput, Webstory};
use crate::services::{NewWebstory, WebstoryCreated};

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/webstories", get(list_webstories))
        .route("/webstories/{id}", get(get_webstory))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/webstories", post(create_webstory))
        .route(
            "/webstories/{id}",
            axum::routing::put(update_webstory).delete(remove_webstory),
        )
        .route("/webstories/{id}/order", patch(reorder_webstory))
}

async fn list_webstories(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<PagedResult<Webstory>> {
    let page = state.webstory_service.list(&params.normalized()).await?;
    Ok(ApiResponse::ok(messages::OK, page))
}

async fn get_webstory(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Webstory> {
    Ok(ApiResponse::ok(messages::OK, state.webstory_service.find(id).await?))
}

async fn create_webstory(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut form = FormData::read(multipart).await?;
    let submission = NewWebstory {
        title: form.non_empty("title").unwrap_or_default(),
        description: form.non_empty("description"),
        is_featured: form.flag("isFeatured").unwrap_or(false),
        slides: form.json("slides")?.unwrap_or_default(),
        video: form.take_file("videoFile"),
        cover: form.take_file("coverFile"),
    };
    let response = match state.webstory_service.create(&submission).await? {
        WebstoryCreated::Created(webstory) => {
            ApiResponse::created(messages::CREATED, webstory).into_response()
        }
        WebstoryCreated::Duplicate(existing) => {
            ApiResponse::ok(messages::WEBSTORY_ALREADY_EXISTS, existing).into_response()
        }
    };
    Ok(response)
}

async fn update_webstory(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateWebstoryInput>,
) -> ApiResult<Webstory> {
    let webstory = state.webstory_service.update(id, &body).await?;
    Ok(ApiResponse::ok(messages::UPDATED, webstory))
}

async fn remove_webstory(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    state.webstory_service.remove(id).await?;
    Ok(ApiResponse::message(messages::REMOVED))
}

async fn reorder_webstory(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<ReorderBody>,
) -> ApiResult<Webstory> {
    let webstory = state
        .webstory_service
        .reorder(id, &body.raw_index()?)
        .await?;
    Ok(ApiResponse::ok(messages::REORDERED, webstory))
}
