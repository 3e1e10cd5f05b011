//! Post model
//!
//! Post bodies are rich-text editor documents, kept as opaque JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{Category, Tag};

/// News post
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: serde_json::Value,
    pub status: PostStatus,
    pub author_id: i64,
    pub category_id: Option<i64>,
    pub parent_id: Option<i64>,
    pub thumbnail_url: Option<String>,
    pub slug: String,
    pub summary: Option<String>,
    pub is_featured: bool,
    pub views: i64,
    pub removed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Publication state. `Removed` mirrors the soft-delete flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Posted,
    Removed,
}

impl Default for PostStatus {
    fn default() -> Self {
        Self::Draft
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostStatus::Draft => write!(f, "draft"),
            PostStatus::Posted => write!(f, "posted"),
            PostStatus::Removed => write!(f, "removed"),
        }
    }
}

impl FromStr for PostStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(PostStatus::Draft),
            "posted" => Ok(PostStatus::Posted),
            "removed" => Ok(PostStatus::Removed),
            _ => Err(anyhow::anyhow!("Invalid post status: {}", s)),
        }
    }
}

/// Public view of a post's author
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostAuthor {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// Post together with its author, category and tags
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: Post,
    pub author: Option<PostAuthor>,
    pub category: Option<Category>,
    pub tags: Vec<Tag>,
}

/// Input for creating a post
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostInput {
    pub title: String,
    pub content: serde_json::Value,
    #[serde(default)]
    pub status: PostStatus,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub tag_ids: Vec<i64>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    pub slug: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub is_featured: bool,
}

/// Partial post update. `tag_ids`, when present, replaces the whole tag set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePostInput {
    pub title: Option<String>,
    pub content: Option<serde_json::Value>,
    pub status: Option<PostStatus>,
    pub category_id: Option<i64>,
    pub parent_id: Option<i64>,
    pub tag_ids: Option<Vec<i64>>,
    pub thumbnail_url: Option<String>,
    pub slug: Option<String>,
    pub summary: Option<String>,
    pub is_featured: Option<bool>,
}

impl Post {
    /// Apply a partial update in place
    pub fn apply(&mut self, input: &UpdatePostInput) {
        if let Some(title) = &input.title {
            self.title = title.clone();
        }
        if let Some(content) = &input.content {
            self.content = content.clone();
        }
        if let Some(status) = input.status {
            self.status = status;
        }
        if input.category_id.is_some() {
            self.category_id = input.category_id;
        }
        if input.parent_id.is_some() {
            self.parent_id = input.parent_id;
        }
        if input.thumbnail_url.is_some() {
            self.thumbnail_url = input.thumbnail_url.clone();
        }
        if let Some(slug) = &input.slug {
            self.slug = slug.clone();
        }
        if input.summary.is_some() {
            self.summary = input.summary.clone();
        }
        if let Some(featured) = input.is_featured {
            self.is_featured = featured;
        }
    }
}
