//! Relevant API endpoints
//!
//! Media goes straight to storage through a signed URL; the relevant is then
//! created from the returned keys.

use axum::{
    extract::{Path, Query, State},
    routing::{get, patch, post},
    Json, Router,
};

use crate::api::common::ReorderBody;
use crate::api::middleware::AppState;
use crate::api::responses::{messages, ApiResponse, ApiResult};
use crate::models::{CreateRelevantInput, ListParams, PagedResult, Relevant, UpdateRelevantInput};
use crate::services::{SignedUpload, SignedUrlRequest};

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/relevants", get(list_relevants))
        .route("/relevants/{id}", get(get_relevant))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/relevants", post(create_relevant))
        .route("/relevants/signed-url", post(signed_url))
        .route(
            "/relevants/{id}",
            axum::routing::put(update_relevant).delete(remove_relevant),
        )
        .route("/relevants/{id}/order", patch(reorder_relevant))
}

async fn list_relevants(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<PagedResult<Relevant>> {
    let page = state.relevant_service.list(&params.normalized()).await?;
    Ok(ApiResponse::ok(messages::OK, page))
}

async fn get_relevant(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Relevant> {
    Ok(ApiResponse::ok(messages::OK, state.relevant_service.find(id).await?))
}

async fn signed_url(
    State(state): State<AppState>,
    Json(body): Json<SignedUrlRequest>,
) -> ApiResult<SignedUpload> {
    Ok(ApiResponse::ok(messages::OK, state.relevant_service.signed_url(&body)?))
}

async fn create_relevant(
    State(state): State<AppState>,
    Json(body): Json<CreateRelevantInput>,
) -> ApiResult<Relevant> {
    let relevant = state.relevant_service.create(&body).await?;
    Ok(ApiResponse::created(messages::CREATED, relevant))
}

async fn update_relevant(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateRelevantInput>,
) -> ApiResult<Relevant> {
    let relevant = state.relevant_service.update(id, &body).await?;
    Ok(ApiResponse::ok(messages::UPDATED, relevant))
}

async fn remove_relevant(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    state.relevant_service.remove(id).await?;
    Ok(ApiResponse::message(messages::REMOVED))
}

async fn reorder_relevant(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<ReorderBody>,
) -> ApiResult<Relevant> {
    let relevant = state
        .relevant_service
        .reorder(id, &body.raw_index()?)
        .await?;
    Ok(ApiResponse::ok(messages::REORDERED, relevant))
}
