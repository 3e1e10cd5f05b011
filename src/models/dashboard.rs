//! Dashboard summary model

use serde::{Deserialize, Serialize};

/// Rows created since the start of the current month
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySummary {
    pub total_posts_this_month: i64,
    pub active_banners_this_month: i64,
    pub web_stories_this_month: i64,
    pub categories_this_month: i64,
}
