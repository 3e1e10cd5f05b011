//! Embedded video service

use crate::db::repositories::VideoRepository;
use crate::models::{CreateVideoInput, UpdateVideoInput, Video};
use crate::services::error::ContentError;
use std::sync::Arc;

pub struct VideoService {
    repo: Arc<dyn VideoRepository>,
}

impl VideoService {
    pub fn new(repo: Arc<dyn VideoRepository>) -> Self {
        Self { repo }
    }

    pub async fn create(&self, input: &CreateVideoInput) -> Result<Video, ContentError> {
        if input.embed.trim().is_empty() {
            return Err(ContentError::validation("Embed is required"));
        }
        let video = self.repo.create(input).await?;
        tracing::info!(video_id = video.id, "Video created");
        Ok(video)
    }

    pub async fn list(&self) -> Result<Vec<Video>, ContentError> {
        Ok(self.repo.list().await?)
    }

    pub async fn find(&self, id: i64) -> Result<Video, ContentError> {
        match self.repo.get_by_id(id).await? {
            Some(video) if !video.removed => Ok(video),
            _ => Err(ContentError::not_found(format!("Video {}", id))),
        }
    }

    pub async fn update(&self, id: i64, input: &UpdateVideoInput) -> Result<Video, ContentError> {
        let mut video = self.find(id).await?;
        if let Some(description) = &input.description {
            video.description = description.clone();
        }
        if let Some(embed) = &input.embed {
            if embed.trim().is_empty() {
                return Err(ContentError::validation("Embed is required"));
            }
            video.embed = embed.clone();
        }
        if let Some(featured) = input.is_featured {
            video.is_featured = featured;
        }
        Ok(self.repo.update(&video).await?)
    }

    pub async fn remove(&self, id: i64) -> Result<(), ContentError> {
        if !self.repo.soft_delete(id).await? {
            return Err(ContentError::not_found(format!("Video {}", id)));
        }
        Ok(())
    }
}
