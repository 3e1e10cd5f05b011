//! Authentication API endpoints
//!
//! - POST /api/v1/auth/login
//! - POST /api/v1/auth/reset-password
//! - GET  /api/v1/auth/invite/{token}
//! - POST /api/v1/auth/accept-invite
//! - POST /api/v1/auth/reader/send-code
//! - POST /api/v1/auth/reader/signup
//! - POST /api/v1/auth/logout (authenticated)
//! - PUT  /api/v1/auth/change-password (authenticated)

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{extract_bearer_token, extract_client_ip, AppState, AuthenticatedUser};
use crate::api::responses::{messages, ApiResponse, ApiResult};
use crate::services::{
    AcceptInviteInput, ChangePasswordInput, InviteInfo, LoginInput, LoginResult,
    ReaderSignupInput, ResetPasswordInput,
};

#[derive(Debug, Deserialize)]
pub struct SendCodeRequest {
    pub email: String,
}

/// Routes open to anonymous clients
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/reset-password", post(reset_password))
        .route("/auth/invite/{token}", get(validate_invite))
        .route("/auth/accept-invite", post(accept_invite))
        .route("/auth/reader/send-code", post(send_reader_code))
        .route("/auth/reader/signup", post(reader_signup))
}

/// Routes for any signed-in account
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/auth/logout", post(logout))
        .route("/auth/change-password", put(change_password))
}

fn login_message(result: &LoginResult) -> &'static str {
    if result.must_change_password {
        messages::PASSWORD_CHANGE_REQUIRED
    } else {
        messages::LOGIN_SUCCESS
    }
}

async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<LoginInput>,
) -> ApiResult<LoginResult> {
    let ip = extract_client_ip(&headers);
    let result = state.auth_service.login(&body, ip).await?;
    Ok(ApiResponse::ok(login_message(&result), result))
}

async fn reset_password(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordInput>,
) -> ApiResult<()> {
    state.auth_service.reset_password_with_code(&body).await?;
    Ok(ApiResponse::message(messages::PASSWORD_RESET))
}

async fn validate_invite(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<InviteInfo> {
    let info = state.auth_service.validate_invite_token(&token).await?;
    Ok(ApiResponse::ok(messages::INVITE_VALID, info))
}

async fn accept_invite(
    State(state): State<AppState>,
    Json(body): Json<AcceptInviteInput>,
) -> ApiResult<LoginResult> {
    let result = state.auth_service.accept_invite(&body).await?;
    Ok(ApiResponse::created(messages::INVITE_ACCEPTED, result))
}

async fn send_reader_code(
    State(state): State<AppState>,
    Json(body): Json<SendCodeRequest>,
) -> ApiResult<()> {
    state.auth_service.send_reader_signup_code(&body.email).await?;
    Ok(ApiResponse::message(messages::CODE_SENT))
}

async fn reader_signup(
    State(state): State<AppState>,
    Json(body): Json<ReaderSignupInput>,
) -> ApiResult<LoginResult> {
    let result = state.auth_service.signup_reader(&body).await?;
    Ok(ApiResponse::created(messages::SIGNUP_SUCCESS, result))
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<()> {
    if let Some(token) = extract_bearer_token(&headers) {
        state.auth_service.logout(&token).await?;
    }
    Ok(ApiResponse::message(messages::LOGOUT_SUCCESS))
}

async fn change_password(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<ChangePasswordInput>,
) -> ApiResult<()> {
    state.auth_service.change_password(user.id, &body).await?;
    Ok(ApiResponse::message(messages::PASSWORD_CHANGED))
}
