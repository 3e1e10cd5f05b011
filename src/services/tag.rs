//! Tag service

use crate::db::repositories::TagRepository;
use crate::models::{CreateTagInput, Tag, UpdateTagInput};
use crate::services::error::ContentError;
use crate::services::validation::generate_slug;
use std::sync::Arc;

pub struct TagService {
    repo: Arc<dyn TagRepository>,
}

impl TagService {
    pub fn new(repo: Arc<dyn TagRepository>) -> Self {
        Self { repo }
    }

    pub async fn create(&self, input: &CreateTagInput) -> Result<Tag, ContentError> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(ContentError::validation("Name is required"));
        }
        let slug = resolve_slug(name, input.slug.as_deref())?;
        if self.repo.get_by_slug(&slug).await?.is_some() {
            return Err(ContentError::Conflict(format!("Tag slug '{}' already exists", slug)));
        }
        let tag = self.repo.create(name, &slug).await?;
        tracing::info!(tag_id = tag.id, slug = %tag.slug, "Tag created");
        Ok(tag)
    }

    pub async fn list(&self) -> Result<Vec<Tag>, ContentError> {
        Ok(self.repo.list().await?)
    }

    pub async fn find(&self, id: i64) -> Result<Tag, ContentError> {
        match self.repo.get_by_id(id).await? {
            Some(tag) if !tag.removed => Ok(tag),
            _ => Err(ContentError::not_found(format!("Tag {}", id))),
        }
    }

    pub async fn update(&self, id: i64, input: &UpdateTagInput) -> Result<Tag, ContentError> {
        let mut tag = self.find(id).await?;
        if let Some(name) = &input.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(ContentError::validation("Name is required"));
            }
            tag.name = name.to_string();
        }
        if let Some(slug) = &input.slug {
            let slug = resolve_slug(&tag.name, Some(slug))?;
            if let Some(other) = self.repo.get_by_slug(&slug).await? {
                if other.id != id {
                    return Err(ContentError::Conflict(format!("Tag slug '{}' already exists", slug)));
                }
            }
            tag.slug = slug;
        }
        Ok(self.repo.update(&tag).await?)
    }

    pub async fn remove(&self, id: i64) -> Result<(), ContentError> {
        if !self.repo.soft_delete(id).await? {
            return Err(ContentError::not_found(format!("Tag {}", id)));
        }
        Ok(())
    }
}

fn resolve_slug(name: &str, slug: Option<&str>) -> Result<String, ContentError> {
    let slug = match slug.map(str::trim) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => generate_slug(name),
    };
    if slug.is_empty() {
        return Err(ContentError::validation("Slug is required"));
    }
    Ok(slug)
}
