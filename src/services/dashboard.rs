//! Editorial dashboard counters

use crate::db::repositories::DashboardRepository;
use crate::models::MonthlySummary;
use crate::services::error::ContentError;
use chrono::{DateTime, Datelike, TimeZone, Utc};
use std::sync::Arc;

pub struct DashboardService {
    repo: Arc<dyn DashboardRepository>,
}

impl DashboardService {
    pub fn new(repo: Arc<dyn DashboardRepository>) -> Self {
        Self { repo }
    }

    /// Rows created since the start of the current UTC month
    pub async fn monthly_summary(&self) -> Result<MonthlySummary, ContentError> {
        let since = month_start(Utc::now());
        Ok(self.repo.created_since(since).await?)
    }
}

/// 00:00 UTC on the first day of `now`'s month
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}
