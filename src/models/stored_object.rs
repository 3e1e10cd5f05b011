//! Stored object model
//!
//! Every file written to object storage is recorded with the SHA-256 of its
//! content so identical uploads resolve to the same object.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredObject {
    pub id: i64,
    /// Lower-case hex SHA-256 of the content
    pub content_hash: String,
    pub object_key: String,
    pub url: String,
    pub size: i64,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
}

/// Result of an upload, as returned to clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub url: String,
    pub key: String,
    pub size: i64,
    pub content_type: String,
    /// True when the content matched an existing object and nothing was written
    pub duplicated: bool,
}

impl UploadedFile {
    pub fn from_object(object: &StoredObject, duplicated: bool) -> Self {
        Self {
            url: object.url.clone(),
            key: object.object_key.clone(),
            size: object.size,
            content_type: object.content_type.clone(),
            duplicated,
        }
    }
}
