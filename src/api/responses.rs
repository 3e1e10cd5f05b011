//! Shared API response types
//!
//! Every successful response uses the same envelope:
//! `{"error": false, "message": ..., "data": ...}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Message codes returned in the success envelope
pub mod messages {
    pub const OK: &str = "OK";
    pub const CREATED: &str = "CREATED";
    pub const UPDATED: &str = "UPDATED";
    pub const REMOVED: &str = "REMOVED";
    pub const REORDERED: &str = "REORDERED";
    pub const UPLOADED: &str = "UPLOADED";
    pub const FILE_ALREADY_EXISTS: &str = "FILE_ALREADY_EXISTS";

    pub const LOGIN_SUCCESS: &str = "LOGIN_SUCCESS";
    pub const PASSWORD_CHANGE_REQUIRED: &str = "PASSWORD_CHANGE_REQUIRED";
    pub const PASSWORD_RESET: &str = "PASSWORD_RESET";
    pub const PASSWORD_CHANGED: &str = "PASSWORD_CHANGED";
    pub const LOGOUT_SUCCESS: &str = "LOGOUT_SUCCESS";
    pub const INVITE_VALID: &str = "INVITE_VALID";
    pub const INVITE_ACCEPTED: &str = "INVITE_ACCEPTED";
    pub const INVITE_SENT: &str = "INVITE_SENT";
    pub const CODE_SENT: &str = "CODE_SENT";
    pub const SIGNUP_SUCCESS: &str = "SIGNUP_SUCCESS";

    pub const WEBSTORY_ALREADY_EXISTS: &str = "WEBSTORY_ALREADY_EXISTS";
    pub const MAGAZINE_ALREADY_EXISTS: &str = "MAGAZINE_ALREADY_EXISTS";
    pub const PAUTA_ALREADY_EXISTS: &str = "PAUTA_ALREADY_EXISTS";
    pub const SUBSCRIBED: &str = "SUBSCRIBED";
}

/// Success envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub error: bool,
    pub message: String,
    pub data: T,
    #[serde(skip)]
    status: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            error: false,
            message: message.into(),
            data,
            status: StatusCode::OK,
        }
    }

    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            ..Self::ok(message, data)
        }
    }
}

impl ApiResponse<()> {
    /// Envelope with `"data": null`
    pub fn message(message: impl Into<String>) -> Self {
        Self::ok(message, ())
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(&self)).into_response()
    }
}

/// Handler result type
pub type ApiResult<T> = Result<ApiResponse<T>, crate::api::middleware::ApiError>;
