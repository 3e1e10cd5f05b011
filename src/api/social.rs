//! Social feed API endpoint

use axum::{extract::State, routing::get, Router};

use crate::api::middleware::AppState;
use crate::api::responses::{messages, ApiResponse, ApiResult};

pub fn public_router() -> Router<AppState> {
    Router::new().route("/twitter/tweets", get(recent_tweets))
}

/// Always succeeds; `data` is null when the feed is unavailable
async fn recent_tweets(State(state): State<AppState>) -> ApiResult<Option<serde_json::Value>> {
    let tweets = state.twitter_service.recent_tweets().await;
    Ok(ApiResponse::ok(messages::OK, tweets))
}
