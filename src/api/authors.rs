//! Columnist API endpoints

use axum::{
    extract::{Multipart, Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::FormData;
use crate::api::middleware::AppState;
use crate::api::responses::{messages, ApiResponse, ApiResult};
use crate::models::Author;

#[derive(Debug, Deserialize)]
pub struct RenameAuthorRequest {
    pub name: String,
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/authors", get(list_authors))
        .route("/authors/{id}", get(get_author))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/authors", post(create_author))
        .route("/authors/{id}", axum::routing::put(rename_author).delete(remove_author))
}

async fn list_authors(State(state): State<AppState>) -> ApiResult<Vec<Author>> {
    Ok(ApiResponse::ok(messages::OK, state.author_service.list().await?))
}

async fn get_author(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Author> {
    Ok(ApiResponse::ok(messages::OK, state.author_service.find(id).await?))
}

async fn create_author(State(state): State<AppState>, multipart: Multipart) -> ApiResult<Author> {
    let form = FormData::read(multipart).await?;
    let name = form.text("name").unwrap_or_default();
    let author = state.author_service.create(name, form.file("file")).await?;
    Ok(ApiResponse::created(messages::CREATED, author))
}

async fn rename_author(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<RenameAuthorRequest>,
) -> ApiResult<Author> {
    let author = state.author_service.rename(id, &body.name).await?;
    Ok(ApiResponse::ok(messages::UPDATED, author))
}

async fn remove_author(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    state.author_service.remove(id).await?;
    Ok(ApiResponse::message(messages::REMOVED))
}
