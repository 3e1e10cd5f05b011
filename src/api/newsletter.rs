//! Newsletter API endpoint

use axum::{extract::State, routing::post, Json, Router};

use crate::api::middleware::AppState;
use crate::api::responses::{messages, ApiResponse, ApiResult};
use crate::models::NewsletterSubscription;
use crate::services::SubscribeInput;

pub fn public_router() -> Router<AppState> {
    Router::new().route("/newsletter", post(subscribe))
}

async fn subscribe(
    State(state): State<AppState>,
    Json(body): Json<SubscribeInput>,
) -> ApiResult<NewsletterSubscription> {
    let subscription = state.newsletter_service.subscribe(&body).await?;
    Ok(ApiResponse::created(messages::SUBSCRIBED, subscription))
}
