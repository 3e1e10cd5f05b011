//! Relevant model
//!
//! Relevants are highlight videos uploaded straight to storage through a
//! signed URL. The row keeps both the object keys and the public URLs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relevant {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub video_key: String,
    pub video_url: String,
    pub cover_key: Option<String>,
    pub cover_url: Option<String>,
    #[serde(rename = "order")]
    pub sort_order: i64,
    pub removed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRelevantInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub video_key: String,
    #[serde(default)]
    pub cover_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRelevantInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub video_key: Option<String>,
    pub cover_key: Option<String>,
}
