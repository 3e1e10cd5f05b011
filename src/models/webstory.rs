//! Webstory model
//!
//! A webstory is a short vertical video with an optional cover and an
//! ordered list of image slides.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Webstory {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub cover_image_url: Option<String>,
    pub is_featured: bool,
    #[serde(rename = "order")]
    pub sort_order: i64,
    pub removed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub slides: Vec<WebstorySlide>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebstorySlide {
    pub id: i64,
    pub webstory_id: i64,
    pub image_url: String,
    pub text: Option<String>,
    #[serde(rename = "order")]
    pub sort_order: i64,
}

/// Slide as submitted by the editor. Missing `order` falls back to position.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SlideInput {
    pub image_url: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub order: Option<i64>,
}

/// Fields for inserting a webstory once its media is stored
#[derive(Debug, Clone, Default)]
pub struct CreateWebstoryInput {
    pub title: String,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub cover_image_url: Option<String>,
    pub is_featured: bool,
    pub slides: Vec<SlideInput>,
}

/// Partial update. `slides`, when present, replaces every slide.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWebstoryInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub cover_image_url: Option<String>,
    pub is_featured: Option<bool>,
    pub slides: Option<Vec<SlideInput>>,
}

impl Webstory {
    pub fn apply(&mut self, input: &UpdateWebstoryInput) {
        if let Some(title) = &input.title {
            self.title = title.clone();
        }
        if input.description.is_some() {
            self.description = input.description.clone();
        }
        if input.video_url.is_some() {
            self.video_url = input.video_url.clone();
        }
        if input.cover_image_url.is_some() {
            self.cover_image_url = input.cover_image_url.clone();
        }
        if let Some(featured) = input.is_featured {
            self.is_featured = featured;
        }
    }
}
