//! Staff management API endpoints

use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post},
    Json, Router,
};

use crate::api::middleware::{AppState, AuthenticatedUser};
use crate::api::responses::{messages, ApiResponse, ApiResult};
use crate::models::{ListParams, PagedResult, UpdateUserInput, User, UserInvite};
use crate::services::InviteUserInput;

/// `/users/me` for any signed-in account
pub fn protected_router() -> Router<AppState> {
    Router::new().route("/users/me", get(me))
}

/// Admins and main editors
pub fn staff_router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/invites", get(list_invites))
        .route("/users/invite", post(invite))
        .route("/users/invites/{id}/resend", post(resend_invite))
        .route("/users/{id}", get(get_user).put(update_user))
}

pub fn admin_router() -> Router<AppState> {
    Router::new().route("/users/{id}", delete(delete_user))
}

async fn me(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> ApiResult<User> {
    let user = state.user_service.me(user.id).await?;
    Ok(ApiResponse::ok(messages::OK, user))
}

async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<PagedResult<User>> {
    let page = state.user_service.list(&params.normalized()).await?;
    Ok(ApiResponse::ok(messages::OK, page))
}

async fn list_invites(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<PagedResult<UserInvite>> {
    let page = state.user_service.list_invited(&params.normalized()).await?;
    Ok(ApiResponse::ok(messages::OK, page))
}

async fn invite(
    State(state): State<AppState>,
    AuthenticatedUser(inviter): AuthenticatedUser,
    Json(body): Json<InviteUserInput>,
) -> ApiResult<UserInvite> {
    let invite = state.user_service.invite(&inviter, &body).await?;
    Ok(ApiResponse::created(messages::INVITE_SENT, invite))
}

async fn resend_invite(
    State(state): State<AppState>,
    AuthenticatedUser(inviter): AuthenticatedUser,
    Path(id): Path<i64>,
) -> ApiResult<UserInvite> {
    let invite = state.user_service.resend_invite(&inviter, id).await?;
    Ok(ApiResponse::ok(messages::INVITE_SENT, invite))
}

async fn get_user(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<User> {
    let user = state.user_service.find(id).await?;
    Ok(ApiResponse::ok(messages::OK, user))
}

async fn update_user(
    State(state): State<AppState>,
    AuthenticatedUser(editor): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateUserInput>,
) -> ApiResult<User> {
    let user = state.user_service.update(&editor, id, &body).await?;
    Ok(ApiResponse::ok(messages::UPDATED, user))
}

async fn delete_user(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    state.user_service.soft_delete(&actor, id).await?;
    Ok(ApiResponse::message(messages::REMOVED))
}
