//! API middleware
//!
//! Contains:
//! - The shared application state
//! - `ApiError` and the error envelope
//! - Bearer token authentication and role guards

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::net::IpAddr;
use std::sync::Arc;

use crate::cache::Cache;
use crate::config::Config;
use crate::db::repositories::{
    SqlxAuthorRepository, SqlxBannerRepository, SqlxCategoryRepository, SqlxDashboardRepository,
    SqlxInviteRepository, SqlxNewsletterRepository, SqlxOrderingRepository, SqlxPostRepository,
    SqlxRelevantRepository, SqlxSiteDocumentRepository, SqlxStoredObjectRepository,
    SqlxTagRepository, SqlxUserRepository, SqlxVideoRepository, SqlxWebstoryRepository,
};
use crate::db::DynDatabasePool;
use crate::models::User;
use crate::services::{
    AuthError, AuthService, AuthorService, BannerService, CategoryService, ContentError,
    DashboardService, EmailService, LocalObjectStore, Mailer, NewsletterService,
    OrderingService, PostService, RelevantService, SiteService, TagService, TokenService,
    TwitterService, UploadService, UserService, VideoService, WebstoryService,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
    pub user_service: Arc<UserService>,
    pub post_service: Arc<PostService>,
    pub category_service: Arc<CategoryService>,
    pub tag_service: Arc<TagService>,
    pub banner_service: Arc<BannerService>,
    pub webstory_service: Arc<WebstoryService>,
    pub relevant_service: Arc<RelevantService>,
    pub video_service: Arc<VideoService>,
    pub author_service: Arc<AuthorService>,
    pub site_service: Arc<SiteService>,
    pub newsletter_service: Arc<NewsletterService>,
    pub dashboard_service: Arc<DashboardService>,
    pub upload_service: Arc<UploadService>,
    pub twitter_service: Arc<TwitterService>,
}

impl AppState {
    /// Wire repositories and services over one pool, cache and mailer
    pub fn new(
        config: &Config,
        pool: DynDatabasePool,
        cache: Arc<Cache>,
        mailer: Arc<dyn Mailer>,
    ) -> anyhow::Result<Self> {
        let users = SqlxUserRepository::boxed(pool.clone());
        let invites = SqlxInviteRepository::boxed(pool.clone());
        let categories = SqlxCategoryRepository::boxed(pool.clone());
        let tags = SqlxTagRepository::boxed(pool.clone());

        let email = Arc::new(EmailService::new(mailer, &config.auth));
        let tokens = Arc::new(TokenService::from_config(&config.auth));
        let ordering = Arc::new(OrderingService::new(SqlxOrderingRepository::boxed(pool.clone())));
        let uploads = Arc::new(UploadService::new(
            Arc::new(LocalObjectStore::new(config.storage.path.clone())),
            SqlxStoredObjectRepository::boxed(pool.clone()),
            config.storage.clone(),
        ));

        Ok(Self {
            auth_service: Arc::new(AuthService::new(
                users.clone(),
                invites.clone(),
                cache,
                tokens,
                email.clone(),
                config.auth.clone(),
            )),
            user_service: Arc::new(UserService::new(
                users.clone(),
                invites,
                email.clone(),
                &config.auth,
            )),
            post_service: Arc::new(PostService::new(
                SqlxPostRepository::boxed(pool.clone()),
                categories.clone(),
                tags.clone(),
                users,
            )),
            category_service: Arc::new(CategoryService::new(categories, ordering.clone())),
            tag_service: Arc::new(TagService::new(tags)),
            banner_service: Arc::new(BannerService::new(
                SqlxBannerRepository::boxed(pool.clone()),
                ordering.clone(),
            )),
            webstory_service: Arc::new(WebstoryService::new(
                SqlxWebstoryRepository::boxed(pool.clone()),
                ordering.clone(),
                uploads.clone(),
            )),
            relevant_service: Arc::new(RelevantService::new(
                SqlxRelevantRepository::boxed(pool.clone()),
                ordering,
                uploads.clone(),
            )),
            video_service: Arc::new(VideoService::new(SqlxVideoRepository::boxed(pool.clone()))),
            author_service: Arc::new(AuthorService::new(
                SqlxAuthorRepository::boxed(pool.clone()),
                uploads.clone(),
            )),
            site_service: Arc::new(SiteService::new(
                SqlxSiteDocumentRepository::boxed(pool.clone()),
                uploads.clone(),
            )),
            newsletter_service: Arc::new(NewsletterService::new(
                SqlxNewsletterRepository::boxed(pool.clone()),
                email,
            )),
            dashboard_service: Arc::new(DashboardService::new(SqlxDashboardRepository::boxed(pool))),
            upload_service: uploads,
            twitter_service: Arc::new(TwitterService::new(config.twitter.clone())?),
        })
    }
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// Error response for API errors.
///
/// Serialized as `{"error": true, "code", "message", "data": null}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("ACCESS_DENIED", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        match self.code.as_str() {
            "UNAUTHORIZED" | "TOKEN_REVOKED" => StatusCode::UNAUTHORIZED,
            "ACCESS_DENIED" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "CONFLICT" => StatusCode::CONFLICT,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "RATE_LIMIT" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": true,
            "code": self.code,
            "message": self.message,
            "data": null,
        });
        (self.status(), Json(body)).into_response()
    }
}

impl From<ContentError> for ApiError {
    fn from(err: ContentError) -> Self {
        match err {
            ContentError::NotFound(what) => ApiError::not_found(format!("{} not found", what)),
            ContentError::Conflict(message) => ApiError::conflict(message),
            ContentError::Validation(message) => ApiError::validation_error(message),
            ContentError::Unauthorized(message) => ApiError::unauthorized(message),
            ContentError::Internal(e) => {
                tracing::error!("Request failed: {:#}", e);
                ApiError::internal_error("Internal server error")
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => ApiError::unauthorized("Invalid credentials"),
            AuthError::PasswordMismatch => {
                ApiError::validation_error("PASSWORD_CONFIRMATION_MISMATCH")
            }
            AuthError::WeakPassword(message) => ApiError::validation_error(message),
            AuthError::InvalidOrExpiredCode => ApiError::validation_error("INVALID_OR_EXPIRED_CODE"),
            AuthError::InvalidOrExpiredInvitation => {
                ApiError::validation_error("INVALID_OR_EXPIRED_INVITATION_TOKEN")
            }
            AuthError::InviteAlreadyUsed => ApiError::validation_error("INVITE_ALREADY_USED"),
            AuthError::UserExists => ApiError::conflict("USER_ALREADY_EXISTS"),
            AuthError::InvitedUserExists => ApiError::validation_error("USER_ALREADY_EXISTS"),
            AuthError::AlreadyInvited => ApiError::conflict("USER_ALREADY_INVITED"),
            AuthError::Forbidden(code) => ApiError::forbidden(code),
            AuthError::TokenRevoked => ApiError::new("TOKEN_REVOKED", "Token has been revoked"),
            AuthError::NotFound(what) => ApiError::not_found(format!("{} not found", what)),
            AuthError::Validation(message) => ApiError::validation_error(message),
            AuthError::RateLimited => {
                ApiError::new("RATE_LIMIT", "Too many attempts, try again later")
            }
            AuthError::ProvisioningReverted(_) => {
                ApiError::validation_error("INVITE_PROCESS_REVERTED")
            }
            AuthError::Internal(e) => {
                tracing::error!("Request failed: {:#}", e);
                ApiError::internal_error("Internal server error")
            }
        }
    }
}

/// Bearer token from the `Authorization` header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Client address as reported by a fronting proxy
pub fn extract_client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(ip) = forwarded.split(',').next().and_then(|ip| ip.trim().parse().ok()) {
            return Some(ip);
        }
    }
    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|ip| ip.trim().parse().ok())
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let user = state.auth_service.authenticate(&token).await?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

fn require_role(request: &Request, allowed: fn(&User) -> bool) -> Result<(), ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !allowed(&user.0) {
        return Err(ApiError::forbidden("ACCESS_DENIED"));
    }
    Ok(())
}

/// Admin authorization middleware
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    require_role(&request, User::is_admin)?;
    Ok(next.run(request).await)
}

/// Admins and main editors
pub async fn require_staff_manager(request: Request, next: Next) -> Result<Response, ApiError> {
    require_role(&request, User::is_staff_manager)?;
    Ok(next.run(request).await)
}

/// Any newsroom role that may write posts
pub async fn require_writer(request: Request, next: Next) -> Result<Response, ApiError> {
    require_role(&request, User::can_write)?;
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(name: &'static str, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_extract_bearer_token() {
        let h = headers("authorization", "Bearer abc.def.ghi");
        assert_eq!(extract_bearer_token(&h), Some("abc.def.ghi".to_string()));
    }

    #[test]
    fn test_extract_bearer_token_rejects_other_schemes() {
        assert!(extract_bearer_token(&headers("authorization", "Basic dXNlcg==")).is_none());
        assert!(extract_bearer_token(&headers("authorization", "Bearer ")).is_none());
        assert!(extract_bearer_token(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_extract_client_ip() {
        let h = headers("x-forwarded-for", "203.0.113.7, 10.0.0.1");
        assert_eq!(extract_client_ip(&h), Some("203.0.113.7".parse().unwrap()));
        let h = headers("x-real-ip", "198.51.100.2");
        assert_eq!(extract_client_ip(&h), Some("198.51.100.2".parse().unwrap()));
        assert!(extract_client_ip(&headers("x-forwarded-for", "garbage")).is_none());
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::unauthorized("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::new("TOKEN_REVOKED", "x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::forbidden("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::conflict("x").status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::validation_error("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::new("RATE_LIMIT", "x").status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ApiError::internal_error("x").status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_auth_error_codes() {
        assert_eq!(
            ApiError::from(AuthError::ProvisioningReverted("db".into())),
            ApiError::validation_error("INVITE_PROCESS_REVERTED")
        );
        assert_eq!(
            ApiError::from(AuthError::InvitedUserExists).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::from(AuthError::UserExists).status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::from(AuthError::TokenRevoked).code, "TOKEN_REVOKED");
        assert_eq!(
            ApiError::from(AuthError::Forbidden("ADMIN_CANNOT_BE_INVITED".into())),
            ApiError::forbidden("ADMIN_CANNOT_BE_INVITED")
        );
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let err = ApiError::from(ContentError::Internal(anyhow::anyhow!("disk on fire")));
        assert_eq!(err.code, "INTERNAL_ERROR");
        assert!(!err.message.contains("disk"));
    }
}
