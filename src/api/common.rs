//! Common API utilities and shared types

use axum::extract::Multipart;
use serde::Deserialize;
use std::collections::HashMap;

use crate::api::middleware::ApiError;
use crate::services::FilePart;

// ============================================================================
// Reorder
// ============================================================================

/// Body of a reorder request: `{"order": 2}` or `{"newIndex": "2"}`
#[derive(Debug, Deserialize)]
pub struct ReorderBody {
    #[serde(alias = "newIndex")]
    pub order: Option<serde_json::Value>,
}

impl ReorderBody {
    /// The requested index as text, left for the ordering service to parse
    pub fn raw_index(&self) -> Result<String, ApiError> {
        match &self.order {
            Some(serde_json::Value::Number(n)) => Ok(n.to_string()),
            Some(serde_json::Value::String(s)) => Ok(s.clone()),
            _ => Err(ApiError::validation_error("INVALID_ORDER")),
        }
    }
}

// ============================================================================
// Multipart
// ============================================================================

/// A multipart body split into text fields and files
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: HashMap<String, FilePart>,
}

impl FormData {
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = FormData::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::validation_error(format!("Failed to read multipart: {}", e)))?
        {
            let name = field.name().unwrap_or("").to_string();
            if let Some(filename) = field.file_name().map(str::to_string) {
                let content_type = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::validation_error(format!("Failed to read file: {}", e)))?;
                form.files.insert(
                    name,
                    FilePart {
                        bytes: bytes.to_vec(),
                        filename,
                        content_type,
                    },
                );
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::validation_error(format!("Failed to read field: {}", e)))?;
                form.fields.insert(name, value);
            }
        }
        Ok(form)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Text field with surrounding whitespace removed, `None` when blank
    pub fn non_empty(&self, name: &str) -> Option<String> {
        self.text(name)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    /// `"true"` / `"1"` as true, anything else present as false
    pub fn flag(&self, name: &str) -> Option<bool> {
        self.text(name)
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "on"))
    }

    pub fn file(&self, name: &str) -> Option<&FilePart> {
        self.files.get(name)
    }

    pub fn take_file(&mut self, name: &str) -> Option<FilePart> {
        self.files.remove(name)
    }

    /// A JSON-encoded field
    pub fn json<T: serde::de::DeserializeOwned>(&self, name: &str) -> Result<Option<T>, ApiError> {
        match self.non_empty(name) {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| ApiError::validation_error(format!("Invalid {}: {}", name, e))),
            None => Ok(None),
        }
    }

    #[cfg(test)]
    pub fn with_field(mut self, name: &str, value: &str) -> Self {
        self.fields.insert(name.to_string(), value.to_string());
        self
    }
}
