//! Banner model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Homepage carousel slide
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Banner {
    pub id: i64,
    pub image_url: Option<String>,
    pub text: Option<String>,
    pub link: Option<String>,
    #[serde(rename = "order")]
    pub sort_order: i64,
    pub removed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBannerInput {
    pub image_url: Option<String>,
    pub text: Option<String>,
    pub link: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBannerInput {
    pub image_url: Option<String>,
    pub text: Option<String>,
    pub link: Option<String>,
}

impl Banner {
    pub fn apply(&mut self, input: &UpdateBannerInput) {
        if input.image_url.is_some() {
            self.image_url = input.image_url.clone();
        }
        if input.text.is_some() {
            self.text = input.text.clone();
        }
        if input.link.is_some() {
            self.link = input.link.clone();
        }
    }
}
