//! Category model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Editorial section. `order` positions it in the portal menu.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub parent_id: Option<i64>,
    #[serde(rename = "order")]
    pub sort_order: i64,
    pub is_visible: bool,
    pub color: Option<String>,
    pub is_featured: bool,
    pub thumbnail_url: Option<String>,
    pub removed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a category
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryInput {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub is_visible: Option<bool>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub is_featured: Option<bool>,
    #[serde(skip)]
    pub thumbnail_url: Option<String>,
}

/// Partial category update
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCategoryInput {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub is_featured: Option<bool>,
    pub is_visible: Option<bool>,
}

impl Category {
    pub fn apply(&mut self, input: &UpdateCategoryInput) {
        if let Some(name) = &input.name {
            self.name = name.clone();
        }
        if let Some(slug) = &input.slug {
            self.slug = slug.clone();
        }
        if input.description.is_some() {
            self.description = input.description.clone();
        }
        if input.color.is_some() {
            self.color = input.color.clone();
        }
        if let Some(featured) = input.is_featured {
            self.is_featured = featured;
        }
        if let Some(visible) = input.is_visible {
            self.is_visible = visible;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_order_serialized_as_order() {
        let now = Utc::now();
        let category = Category {
            id: 1,
            name: "Agro".to_string(),
            slug: "agro".to_string(),
            description: None,
            parent_id: None,
            sort_order: 4,
            is_visible: true,
            color: Some("#00ff00".to_string()),
            is_featured: false,
            thumbnail_url: None,
            removed: false,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&category).unwrap();
        assert_eq!(json["order"], 4);
        assert_eq!(json["isVisible"], true);
        assert!(json.get("sortOrder").is_none());
    }
}
