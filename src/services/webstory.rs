//! Webstory service
//!
//! A webstory is created from an uploaded video. Uploading a video whose
//! content is already stored creates nothing and reports the existing object.

use crate::db::repositories::{OrderedTable, WebstoryRepository};
use crate::models::{
    CreateWebstoryInput, ListParams, PagedResult, SlideInput, UpdateWebstoryInput, UploadedFile,
    Webstory,
};
use crate::services::error::ContentError;
use crate::services::ordering::OrderingService;
use crate::services::upload::{FilePart, UploadService};
use std::sync::Arc;

const VIDEO_PREFIX: &str = "webstories/video";
const COVER_PREFIX: &str = "webstories/cover";

/// Multipart submission for a new webstory
#[derive(Debug, Clone, Default)]
pub struct NewWebstory {
    pub title: String,
    pub description: Option<String>,
    pub is_featured: bool,
    pub slides: Vec<SlideInput>,
    pub video: Option<FilePart>,
    pub cover: Option<FilePart>,
}

/// Outcome of a create request
#[derive(Debug, Clone)]
pub enum WebstoryCreated {
    Created(Webstory),
    /// The video was already stored; nothing was created
    Duplicate(UploadedFile),
}

pub struct WebstoryService {
    repo: Arc<dyn WebstoryRepository>,
    ordering: Arc<OrderingService>,
    uploads: Arc<UploadService>,
}

impl WebstoryService {
    pub fn new(
        repo: Arc<dyn WebstoryRepository>,
        ordering: Arc<OrderingService>,
        uploads: Arc<UploadService>,
    ) -> Self {
        Self {
            repo,
            ordering,
            uploads,
        }
    }

    pub async fn create(&self, submission: &NewWebstory) -> Result<WebstoryCreated, ContentError> {
        let title = submission.title.trim();
        if title.is_empty() {
            return Err(ContentError::validation("Title is required"));
        }
        let video = submission
            .video
            .as_ref()
            .ok_or_else(|| ContentError::validation("videoFile is required"))?;
        if !video.is_video() {
            return Err(ContentError::validation("videoFile must be a video"));
        }
        if let Some(cover) = &submission.cover {
            if !cover.is_image() {
                return Err(ContentError::validation("coverFile must be an image"));
            }
        }
        validate_slides(&submission.slides)?;

        let limits = self.uploads.config();
        let stored_video = self
            .uploads
            .upload(video.request(VIDEO_PREFIX, limits.max_file_size))
            .await?;
        if stored_video.duplicated {
            tracing::info!(key = %stored_video.key, "Webstory video already stored");
            return Ok(WebstoryCreated::Duplicate(stored_video));
        }
        let cover_url = match &submission.cover {
            Some(cover) => Some(
                self.uploads
                    .upload(cover.request(COVER_PREFIX, limits.max_image_size))
                    .await?
                    .url,
            ),
            None => None,
        };

        let order = self.ordering.next_order(OrderedTable::Webstories).await?;
        let webstory = self
            .repo
            .create(
                &CreateWebstoryInput {
                    title: title.to_string(),
                    description: submission.description.clone(),
                    video_url: Some(stored_video.url),
                    cover_image_url: cover_url,
                    is_featured: submission.is_featured,
                    slides: submission.slides.clone(),
                },
                order,
            )
            .await?;
        tracing::info!(webstory_id = webstory.id, slides = webstory.slides.len(), "Webstory created");
        Ok(WebstoryCreated::Created(webstory))
    }

    pub async fn list(&self, params: &ListParams) -> Result<PagedResult<Webstory>, ContentError> {
        let (webstories, total) = self.repo.list(params).await?;
        Ok(PagedResult::new(webstories, total, params))
    }

    pub async fn find(&self, id: i64) -> Result<Webstory, ContentError> {
        match self.repo.get_by_id(id).await? {
            Some(webstory) if !webstory.removed => Ok(webstory),
            _ => Err(ContentError::not_found(format!("Webstory {}", id))),
        }
    }

    /// Partial update. Given slides replace all existing ones atomically.
    pub async fn update(&self, id: i64, input: &UpdateWebstoryInput) -> Result<Webstory, ContentError> {
        let mut webstory = self.find(id).await?;
        if let Some(title) = &input.title {
            if title.trim().is_empty() {
                return Err(ContentError::validation("Title is required"));
            }
        }
        if let Some(slides) = &input.slides {
            validate_slides(slides)?;
        }
        webstory.apply(input);
        webstory.title = webstory.title.trim().to_string();
        let updated = self.repo.update(&webstory, input.slides.as_deref()).await?;
        tracing::info!(webstory_id = id, "Webstory updated");
        Ok(updated)
    }

    pub async fn remove(&self, id: i64) -> Result<(), ContentError> {
        if !self.repo.soft_delete(id).await? {
            return Err(ContentError::not_found(format!("Webstory {}", id)));
        }
        tracing::info!(webstory_id = id, "Webstory removed");
        Ok(())
    }

    pub async fn reorder(&self, id: i64, raw_index: &str) -> Result<Webstory, ContentError> {
        self.ordering
            .reorder(OrderedTable::Webstories, id, raw_index)
            .await?;
        self.find(id).await
    }
}

fn validate_slides(slides: &[SlideInput]) -> Result<(), ContentError> {
    if slides.iter().any(|s| s.image_url.trim().is_empty()) {
        return Err(ContentError::validation("Every slide needs an imageUrl"));
    }
    Ok(())
}
