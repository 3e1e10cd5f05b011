//! Dashboard API endpoint

use axum::{extract::State, routing::get, Router};

use crate::api::middleware::AppState;
use crate::api::responses::{messages, ApiResponse, ApiResult};
use crate::models::MonthlySummary;

pub fn protected_router() -> Router<AppState> {
    Router::new().route("/dashboard", get(monthly_summary))
}

async fn monthly_summary(State(state): State<AppState>) -> ApiResult<MonthlySummary> {
    let summary = state.dashboard_service.monthly_summary().await?;
    Ok(ApiResponse::ok(messages::OK, summary))
}
