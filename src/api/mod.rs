//! API layer - HTTP handlers and routing
//!
//! Every endpoint lives under `/api/v1`. Routes are grouped by the role they
//! require; each group carries its own guard layers:
//! - public: no token
//! - protected: any signed-in account
//! - writer: ADMIN, MAIN_EDITOR, EDITOR
//! - staff: ADMIN, MAIN_EDITOR
//! - admin: ADMIN only
//!
//! Stored objects are served read-only under `/uploads`.

pub mod auth;
pub mod authors;
pub mod banners;
pub mod categories;
pub mod common;
pub mod dashboard;
pub mod middleware;
pub mod newsletter;
pub mod posts;
pub mod relevants;
pub mod responses;
pub mod site;
pub mod social;
pub mod tags;
pub mod upload;
pub mod users;
pub mod videos;
pub mod webstories;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::config::Config;

pub use middleware::{ApiError, AppState, AuthenticatedUser};
pub use responses::{ApiResponse, ApiResult};

/// Room for multipart boundaries and text fields on top of the file itself
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Build the `/api/v1` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    let admin_routes = Router::new()
        .merge(users::admin_router())
        .merge(categories::admin_router())
        .merge(tags::admin_router())
        .merge(banners::admin_router())
        .merge(webstories::admin_router())
        .merge(relevants::admin_router())
        .merge(videos::admin_router())
        .merge(authors::admin_router())
        .merge(site::admin_router())
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    let staff_routes = Router::new()
        .merge(users::staff_router())
        .merge(posts::staff_router())
        .route_layer(axum_middleware::from_fn(middleware::require_staff_manager))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    let writer_routes = Router::new()
        .merge(posts::writer_router())
        .route_layer(axum_middleware::from_fn(middleware::require_writer))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    let protected_routes = Router::new()
        .merge(auth::protected_router())
        .merge(users::protected_router())
        .merge(banners::protected_router())
        .merge(dashboard::protected_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .merge(auth::public_router())
        .merge(posts::public_router())
        .merge(categories::public_router())
        .merge(tags::public_router())
        .merge(webstories::public_router())
        .merge(relevants::public_router())
        .merge(videos::public_router())
        .merge(authors::public_router())
        .merge(site::public_router())
        .merge(newsletter::public_router())
        .merge(social::public_router())
        .merge(upload::public_router())
        .merge(admin_routes)
        .merge(staff_routes)
        .merge(writer_routes)
        .merge(protected_routes)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    let allow_origin = if allowed.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(allowed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, config: &Config) -> Router {
    let body_limit = config.storage.max_file_size as usize + MULTIPART_OVERHEAD;

    Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .nest_service("/uploads", ServeDir::new(&config.storage.path))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.server.cors_origins))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::create_cache;
    use crate::config::CacheConfig;
    use crate::db::{create_test_pool, migrations};
    use crate::services::{normalize_email, RecordingMailer};
    use axum::http::{HeaderName, StatusCode};
    use axum_test::multipart::{MultipartForm, Part};
    use axum_test::TestServer;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tempfile::TempDir;

    const ADMIN_PASSWORD: &str = "changeme123";

    struct TestApp {
        server: TestServer,
        mailer: Arc<RecordingMailer>,
        config: Config,
        _dir: TempDir,
    }

    async fn setup() -> TestApp {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.path = dir.path().to_path_buf();
        config.storage.public_base_url = "http://cdn.test/uploads".to_string();

        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let cache = create_cache(&CacheConfig::default()).await.unwrap();
        let mailer = Arc::new(RecordingMailer::new());
        let state = AppState::new(&config, pool, cache, mailer.clone()).unwrap();
        state.user_service.seed_admin(&config.auth).await.unwrap();

        let server = TestServer::new(build_router(state, &config)).unwrap();
        TestApp {
            server,
            mailer,
            config,
            _dir: dir,
        }
    }

    fn bearer(token: &str) -> (HeaderName, HeaderValue) {
        (
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        )
    }

    fn strong_text(html: &str) -> String {
        html.split("<strong>")
            .nth(1)
            .and_then(|rest| rest.split("</strong>").next())
            .unwrap()
            .to_string()
    }

    impl TestApp {
        async fn login(&self, email: &str, password: &str) -> Value {
            self.server
                .post("/api/v1/auth/login")
                .json(&json!({"email": email, "password": password}))
                .await
                .json::<Value>()
        }

        async fn admin_token(&self) -> String {
            let body = self.login(&self.config.auth.seed_admin_email, ADMIN_PASSWORD).await;
            body["data"]["accessToken"].as_str().unwrap().to_string()
        }

        /// Invite an editor and accept the invitation; returns their token
        async fn editor_token(&self, admin: &str, email: &str) -> String {
            let (name, value) = bearer(admin);
            self.server
                .post("/api/v1/users/invite")
                .add_header(name, value)
                .json(&json!({"email": email, "role": "EDITOR"}))
                .await
                .assert_status(StatusCode::CREATED);
            let html = self.mailer.last_to(&normalize_email(email)).unwrap().html;
            let token = html
                .split("invitationToken=")
                .nth(1)
                .and_then(|rest| rest.split('"').next())
                .unwrap()
                .to_string();
            let body = self
                .server
                .post("/api/v1/auth/accept-invite")
                .json(&json!({
                    "invitationToken": token,
                    "firstName": "Edna",
                    "lastName": "Souza",
                    "password": "Editor#2024",
                    "repeatPassword": "Editor#2024",
                }))
                .await
                .json::<Value>();
            body["data"]["accessToken"].as_str().unwrap().to_string()
        }
    }

    #[tokio::test]
    async fn test_seeded_admin_must_change_password() {
        let app = setup().await;
        let body = app.login("admin@admin.com", ADMIN_PASSWORD).await;
        assert_eq!(body["error"], false);
        assert_eq!(body["message"], "PASSWORD_CHANGE_REQUIRED");
        assert_eq!(body["data"]["user"]["role"], "ADMIN");

        let code = strong_text(&app.mailer.last_to("admin@admin.com").unwrap().html);
        app.server
            .post("/api/v1/auth/reset-password")
            .json(&json!({
                "email": "admin@admin.com",
                "code": code,
                "newPassword": "Newsroom#1",
                "repeatNewPassword": "Newsroom#1",
            }))
            .await
            .assert_status_ok();

        let body = app.login("admin@admin.com", "Newsroom#1").await;
        assert_eq!(body["message"], "LOGIN_SUCCESS");
        assert_eq!(body["data"]["mustChangePassword"], false);
    }

    #[tokio::test]
    async fn test_bad_login_uses_error_envelope() {
        let app = setup().await;
        let response = app
            .server
            .post("/api/v1/auth/login")
            .json(&json!({"email": "admin@admin.com", "password": "wrong"}))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        let body = response.json::<Value>();
        assert_eq!(body["error"], true);
        assert_eq!(body["code"], "UNAUTHORIZED");
        assert!(body["data"].is_null());
    }

    #[tokio::test]
    async fn test_logout_revokes_token() {
        let app = setup().await;
        let token = app.admin_token().await;
        let (name, value) = bearer(&token);

        app.server
            .get("/api/v1/users/me")
            .add_header(name.clone(), value.clone())
            .await
            .assert_status_ok();
        app.server
            .post("/api/v1/auth/logout")
            .add_header(name.clone(), value.clone())
            .await
            .assert_status_ok();

        let response = app
            .server
            .get("/api/v1/users/me")
            .add_header(name, value)
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(response.json::<Value>()["code"], "TOKEN_REVOKED");
    }

    #[tokio::test]
    async fn test_missing_token_is_rejected() {
        let app = setup().await;
        app.server
            .get("/api/v1/dashboard")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        app.server
            .get("/api/v1/banners")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_invite_and_role_guards() {
        let app = setup().await;
        let admin = app.admin_token().await;
        let (name, value) = bearer(&admin);

        let response = app
            .server
            .post("/api/v1/users/invite")
            .add_header(name, value)
            .json(&json!({"email": "boss@portal.com", "role": "ADMIN"}))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);
        assert_eq!(response.json::<Value>()["message"], "ADMIN_CANNOT_BE_INVITED");

        let editor = app.editor_token(&admin, "edna@portal.com").await;
        let (name, value) = bearer(&editor);

        app.server
            .post("/api/v1/tags")
            .add_header(name.clone(), value.clone())
            .json(&json!({"name": "Agro"}))
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let response = app
            .server
            .post("/api/v1/posts")
            .add_header(name, value)
            .json(&json!({
                "title": "Safra recorde",
                "content": {"blocks": []},
                "slug": "safra-recorde",
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body = response.json::<Value>();
        assert_eq!(body["data"]["author"]["firstName"], "Edna");

        let listed = app.server.get("/api/v1/posts").await.json::<Value>();
        assert_eq!(listed["data"]["total"], 1);
    }

    #[tokio::test]
    async fn test_accept_invite_twice_is_rejected() {
        let app = setup().await;
        let admin = app.admin_token().await;
        app.editor_token(&admin, "rui@portal.com").await;
        let html = app.mailer.last_to("rui@portal.com").unwrap().html;
        let token = html
            .split("invitationToken=")
            .nth(1)
            .and_then(|rest| rest.split('"').next())
            .unwrap();

        let response = app
            .server
            .get(&format!("/api/v1/auth/invite/{}", token))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["message"], "INVITE_ALREADY_USED");
    }

    #[tokio::test]
    async fn test_reader_signup() {
        let app = setup().await;
        app.server
            .post("/api/v1/auth/reader/send-code")
            .json(&json!({"email": "leitor@campo.com"}))
            .await
            .assert_status_ok();
        let code = strong_text(&app.mailer.last_to("leitor@campo.com").unwrap().html);

        let response = app
            .server
            .post("/api/v1/auth/reader/signup")
            .json(&json!({
                "firstName": "Lia",
                "lastName": "Prado",
                "jobRole": "Agrônoma",
                "email": "leitor@campo.com",
                "code": code,
                "password": "Leitor#99",
                "repeatPassword": "Leitor#99",
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        assert_eq!(response.json::<Value>()["data"]["user"]["role"], "READER");

        app.server
            .post("/api/v1/auth/reader/send-code")
            .json(&json!({"email": "leitor@campo.com"}))
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_banner_reorder() {
        let app = setup().await;
        let admin = app.admin_token().await;
        let (name, value) = bearer(&admin);

        let mut ids = Vec::new();
        for text in ["a", "b", "c"] {
            let body = app
                .server
                .post("/api/v1/banners")
                .add_header(name.clone(), value.clone())
                .json(&json!({"text": text}))
                .await
                .json::<Value>();
            ids.push(body["data"]["id"].as_i64().unwrap());
        }

        let moved = app
            .server
            .patch(&format!("/api/v1/banners/{}/order", ids[2]))
            .add_header(name.clone(), value.clone())
            .json(&json!({"order": 0}))
            .await
            .json::<Value>();
        assert_eq!(moved["data"]["order"], 0);

        let listed = app
            .server
            .get("/api/v1/banners")
            .add_header(name.clone(), value.clone())
            .await
            .json::<Value>();
        let order: Vec<i64> = listed["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|b| b["id"].as_i64().unwrap())
            .collect();
        assert_eq!(order, vec![ids[2], ids[0], ids[1]]);

        let response = app
            .server
            .patch(&format!("/api/v1/banners/{}/order", ids[0]))
            .add_header(name, value)
            .json(&json!({"order": "abc"}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_magazine_upload_dedup() {
        let app = setup().await;
        let admin = app.admin_token().await;
        let (name, value) = bearer(&admin);

        let form = || {
            MultipartForm::new().add_part(
                "file",
                Part::bytes(b"%PDF-1.4 edicao".to_vec())
                    .file_name("edicao.pdf")
                    .mime_type("application/pdf"),
            )
        };
        let first = app
            .server
            .post("/api/v1/magazine")
            .add_header(name.clone(), value.clone())
            .multipart(form())
            .await
            .json::<Value>();
        assert_eq!(first["message"], "UPDATED");
        let pdf_url = first["data"]["pdfUrl"].as_str().unwrap().to_string();
        assert!(pdf_url.starts_with("http://cdn.test/uploads/magazine/"));

        let second = app
            .server
            .post("/api/v1/magazine")
            .add_header(name, value)
            .multipart(form())
            .await
            .json::<Value>();
        assert_eq!(second["message"], "MAGAZINE_ALREADY_EXISTS");
        assert_eq!(second["data"]["duplicated"], true);

        let current = app.server.get("/api/v1/magazine").await.json::<Value>();
        assert_eq!(current["data"]["pdfUrl"], pdf_url);
    }

    #[tokio::test]
    async fn test_signed_upload_flow() {
        let app = setup().await;
        let admin = app.admin_token().await;
        let (name, value) = bearer(&admin);

        let grant = app
            .server
            .post("/api/v1/relevants/signed-url")
            .add_header(name.clone(), value.clone())
            .json(&json!({"filename": "clip.mp4", "contentType": "video/mp4"}))
            .await
            .json::<Value>();
        let upload_url = grant["data"]["uploadUrl"].as_str().unwrap().to_string();
        let key = grant["data"]["key"].as_str().unwrap().to_string();
        assert!(key.starts_with("relevants/video/"));

        let tampered = upload_url.replace("signature=", "signature=00");
        app.server
            .put(&tampered)
            .bytes(b"video-bytes".to_vec().into())
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        app.server
            .put(&upload_url)
            .content_type("video/mp4")
            .bytes(b"video-bytes".to_vec().into())
            .await
            .assert_status(StatusCode::CREATED);

        let created = app
            .server
            .post("/api/v1/relevants")
            .add_header(name, value)
            .json(&json!({"title": "Colheita", "videoKey": key}))
            .await;
        created.assert_status(StatusCode::CREATED);
        assert_eq!(
            created.json::<Value>()["data"]["videoUrl"],
            format!("http://cdn.test/uploads/{}", key)
        );
    }

    #[tokio::test]
    async fn test_pages_and_live() {
        let app = setup().await;
        let admin = app.admin_token().await;
        let (name, value) = bearer(&admin);

        let empty = app.server.get("/api/v1/pages/about").await.json::<Value>();
        assert!(empty["data"].is_null());
        app.server
            .get("/api/v1/pages/unknown")
            .await
            .assert_status(StatusCode::NOT_FOUND);

        app.server
            .put("/api/v1/pages/about")
            .add_header(name.clone(), value.clone())
            .json(&json!({"content": {"text": "Quem somos"}}))
            .await
            .assert_status_ok();
        let page = app.server.get("/api/v1/pages/about").await.json::<Value>();
        assert_eq!(page["data"]["content"]["text"], "Quem somos");

        let live = app.server.get("/api/v1/live").await.json::<Value>();
        assert_eq!(live["data"]["isEnabled"], false);
        app.server
            .put("/api/v1/live")
            .add_header(name, value)
            .json(&json!({"link": "https://youtube.com/live/x", "isEnabled": true}))
            .await
            .assert_status_ok();
        let live = app.server.get("/api/v1/live").await.json::<Value>();
        assert_eq!(live["data"]["isEnabled"], true);
    }

    #[tokio::test]
    async fn test_newsletter_and_feed() {
        let app = setup().await;
        app.server
            .post("/api/v1/newsletter")
            .json(&json!({"name": "Rita", "email": "rita@campo.com"}))
            .await
            .assert_status(StatusCode::CREATED);
        let response = app
            .server
            .post("/api/v1/newsletter")
            .json(&json!({"name": "Rita", "email": "rita@campo.com"}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["message"], "EMAIL_ALREADY_SUBSCRIBED");

        let feed = app.server.get("/api/v1/twitter/tweets").await;
        feed.assert_status_ok();
        assert!(feed.json::<Value>()["data"].is_null());
    }

    #[tokio::test]
    async fn test_dashboard_counts() {
        let app = setup().await;
        let admin = app.admin_token().await;
        let (name, value) = bearer(&admin);
        app.server
            .post("/api/v1/banners")
            .add_header(name.clone(), value.clone())
            .json(&json!({"text": "Feira"}))
            .await
            .assert_status(StatusCode::CREATED);

        let summary = app
            .server
            .get("/api/v1/dashboard")
            .add_header(name, value)
            .await
            .json::<Value>();
        assert_eq!(summary["data"]["activeBannersThisMonth"], 1);
        assert_eq!(summary["data"]["totalPostsThisMonth"], 0);
    }

    #[tokio::test]
    async fn test_invited_editor_logs_in_with_invited_spelling() {
        let app = setup().await;
        let admin = app.admin_token().await;
        app.editor_token(&admin, "Edna@Portal.com").await;

        let body = app.login("Edna@Portal.com", "Editor#2024").await;
        assert_eq!(body["error"], false);
        assert_eq!(body["data"]["user"]["email"], "edna@portal.com");
    }

    #[tokio::test]
    async fn test_invite_conflicts_with_reader_of_other_case() {
        let app = setup().await;
        app.server
            .post("/api/v1/auth/reader/send-code")
            .json(&json!({"email": "Bia@Campo.com"}))
            .await
            .assert_status_ok();
        let code = strong_text(&app.mailer.last_to("bia@campo.com").unwrap().html);
        app.server
            .post("/api/v1/auth/reader/signup")
            .json(&json!({
                "firstName": "Bia",
                "lastName": "Campos",
                "jobRole": "Produtora",
                "email": "Bia@Campo.com",
                "code": code,
                "password": "Leitor#99",
                "repeatPassword": "Leitor#99",
            }))
            .await
            .assert_status(StatusCode::CREATED);

        let admin = app.admin_token().await;
        let (name, value) = bearer(&admin);
        let response = app
            .server
            .post("/api/v1/users/invite")
            .add_header(name, value)
            .json(&json!({"email": "bia@campo.com", "role": "EDITOR"}))
            .await;
        response.assert_status(StatusCode::CONFLICT);
        assert_eq!(response.json::<Value>()["message"], "USER_ALREADY_EXISTS");
    }

    #[tokio::test]
    async fn test_router_answers_cors_requests() {
        let app = setup().await;
        let response = app
            .server
            .get("/api/v1/live")
            .add_header(header::ORIGIN, HeaderValue::from_static("http://localhost:3000"))
            .await;
        response.assert_status_ok();
        assert_eq!(
            response.header(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            "http://localhost:3000"
        );
    }

    #[test]
    fn test_cors_layer_ignores_invalid_origins() {
        let _ = cors_layer(&["http://localhost:3000".to_string(), "bad\norigin".to_string()]);
        let _ = cors_layer(&[]);
    }
}
