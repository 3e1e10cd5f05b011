//! Relevant service
//!
//! Relevant videos are uploaded by the browser straight to storage. The
//! service hands out signed upload URLs and then records the keys.

use crate::db::repositories::{OrderedTable, RelevantRepository};
use crate::models::{CreateRelevantInput, ListParams, PagedResult, Relevant, UpdateRelevantInput};
use crate::services::error::ContentError;
use crate::services::ordering::OrderingService;
use crate::services::upload::{SignedUpload, UploadService};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedUrlRequest {
    pub filename: String,
    pub content_type: String,
}

pub struct RelevantService {
    repo: Arc<dyn RelevantRepository>,
    ordering: Arc<OrderingService>,
    uploads: Arc<UploadService>,
}

impl RelevantService {
    pub fn new(
        repo: Arc<dyn RelevantRepository>,
        ordering: Arc<OrderingService>,
        uploads: Arc<UploadService>,
    ) -> Self {
        Self {
            repo,
            ordering,
            uploads,
        }
    }

    /// Signed direct-upload URL for a relevant's video or cover
    pub fn signed_url(&self, request: &SignedUrlRequest) -> Result<SignedUpload, ContentError> {
        let prefix = if request.content_type.starts_with("video/") {
            "relevants/video"
        } else if request.content_type.starts_with("image/") {
            "relevants/cover"
        } else {
            return Err(ContentError::validation(format!(
                "Unsupported content type: {}",
                request.content_type
            )));
        };
        self.uploads
            .signed_upload(prefix, &request.filename, &request.content_type)
    }

    pub async fn create(&self, input: &CreateRelevantInput) -> Result<Relevant, ContentError> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(ContentError::validation("Title is required"));
        }
        let video_key = input.video_key.trim();
        if video_key.is_empty() {
            return Err(ContentError::validation("videoKey is required"));
        }
        self.require_object(video_key).await?;
        let cover_key = input
            .cover_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty());
        if let Some(key) = cover_key {
            self.require_object(key).await?;
        }

        let input = CreateRelevantInput {
            title: title.to_string(),
            description: input.description.clone(),
            video_key: video_key.to_string(),
            cover_key: cover_key.map(str::to_string),
        };
        let video_url = self.uploads.public_url(&input.video_key);
        let cover_url = input.cover_key.as_deref().map(|k| self.uploads.public_url(k));
        let order = self.ordering.next_order(OrderedTable::Relevants).await?;
        let relevant = self
            .repo
            .create(&input, &video_url, cover_url.as_deref(), order)
            .await?;
        tracing::info!(relevant_id = relevant.id, order, "Relevant created");
        Ok(relevant)
    }

    pub async fn list(&self, params: &ListParams) -> Result<PagedResult<Relevant>, ContentError> {
        let (relevants, total) = self.repo.list(params).await?;
        Ok(PagedResult::new(relevants, total, params))
    }

    pub async fn find(&self, id: i64) -> Result<Relevant, ContentError> {
        match self.repo.get_by_id(id).await? {
            Some(relevant) if !relevant.removed => Ok(relevant),
            _ => Err(ContentError::not_found(format!("Relevant {}", id))),
        }
    }

    /// Partial update. Changed keys recompute their public URLs.
    pub async fn update(&self, id: i64, input: &UpdateRelevantInput) -> Result<Relevant, ContentError> {
        let mut relevant = self.find(id).await?;
        if let Some(title) = &input.title {
            let title = title.trim();
            if title.is_empty() {
                return Err(ContentError::validation("Title is required"));
            }
            relevant.title = title.to_string();
        }
        if input.description.is_some() {
            relevant.description = input.description.clone();
        }
        if let Some(key) = &input.video_key {
            let key = key.trim();
            self.require_object(key).await?;
            relevant.video_url = self.uploads.public_url(key);
            relevant.video_key = key.to_string();
        }
        if let Some(key) = &input.cover_key {
            let key = key.trim();
            if key.is_empty() {
                relevant.cover_key = None;
                relevant.cover_url = None;
            } else {
                self.require_object(key).await?;
                relevant.cover_url = Some(self.uploads.public_url(key));
                relevant.cover_key = Some(key.to_string());
            }
        }
        let updated = self.repo.update(&relevant).await?;
        tracing::info!(relevant_id = id, "Relevant updated");
        Ok(updated)
    }

    pub async fn remove(&self, id: i64) -> Result<(), ContentError> {
        if !self.repo.soft_delete(id).await? {
            return Err(ContentError::not_found(format!("Relevant {}", id)));
        }
        tracing::info!(relevant_id = id, "Relevant removed");
        Ok(())
    }

    pub async fn reorder(&self, id: i64, raw_index: &str) -> Result<Relevant, ContentError> {
        self.ordering
            .reorder(OrderedTable::Relevants, id, raw_index)
            .await?;
        self.find(id).await
    }

    async fn require_object(&self, key: &str) -> Result<(), ContentError> {
        if !self.uploads.object_exists(key).await? {
            return Err(ContentError::validation(format!("No uploaded object at {}", key)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::db::repositories::{
        SqlxOrderingRepository, SqlxRelevantRepository, SqlxStoredObjectRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::services::upload::LocalObjectStore;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, Arc<UploadService>, RelevantService) {
        let dir = TempDir::new().unwrap();
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let uploads = Arc::new(UploadService::new(
            Arc::new(LocalObjectStore::new(dir.path())),
            SqlxStoredObjectRepository::boxed(pool.clone()),
            StorageConfig {
                path: dir.path().to_path_buf(),
                ..Default::default()
            },
        ));
        let service = RelevantService::new(
            SqlxRelevantRepository::boxed(pool.clone()),
            Arc::new(OrderingService::new(SqlxOrderingRepository::boxed(pool))),
            uploads.clone(),
        );
        (dir, uploads, service)
    }

    /// Request a signed URL and upload through it, returning the key
    async fn upload_signed(
        uploads: &UploadService,
        service: &RelevantService,
        bytes: &[u8],
        content_type: &str,
    ) -> String {
        let grant = service
            .signed_url(&SignedUrlRequest {
                filename: "file".to_string(),
                content_type: content_type.to_string(),
            })
            .unwrap();
        let expires = grant.expires_at.timestamp();
        let signature = uploads.sign(&grant.key, expires).unwrap();
        uploads
            .put_signed(&grant.key, expires, &signature, bytes, content_type)
            .await
            .unwrap()
            .key
    }

    #[tokio::test]
    async fn test_signed_url_prefixes() {
        let (_dir, _uploads, service) = setup().await;
        let video = service
            .signed_url(&SignedUrlRequest {
                filename: "a.mp4".to_string(),
                content_type: "video/mp4".to_string(),
            })
            .unwrap();
        assert!(video.key.starts_with("relevants/video/"));
        let cover = service
            .signed_url(&SignedUrlRequest {
                filename: "a.png".to_string(),
                content_type: "image/png".to_string(),
            })
            .unwrap();
        assert!(cover.key.starts_with("relevants/cover/"));
        assert!(matches!(
            service.signed_url(&SignedUrlRequest {
                filename: "a.pdf".to_string(),
                content_type: "application/pdf".to_string(),
            }),
            Err(ContentError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_create_update_remove() {
        let (_dir, uploads, service) = setup().await;
        let video_key = upload_signed(&uploads, &service, b"video", "video/mp4").await;
        let cover_key = upload_signed(&uploads, &service, b"cover", "image/png").await;

        let relevant = service
            .create(&CreateRelevantInput {
                title: "Entrevista".to_string(),
                description: None,
                video_key: video_key.clone(),
                cover_key: Some(cover_key.clone()),
            })
            .await
            .unwrap();
        assert_eq!(relevant.video_url, uploads.public_url(&video_key));
        assert_eq!(relevant.cover_url, Some(uploads.public_url(&cover_key)));

        let other_video = upload_signed(&uploads, &service, b"video-2", "video/mp4").await;
        let updated = service
            .update(
                relevant.id,
                &UpdateRelevantInput {
                    video_key: Some(other_video.clone()),
                    cover_key: Some(String::new()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.video_url, uploads.public_url(&other_video));
        assert!(updated.cover_url.is_none());

        service.remove(relevant.id).await.unwrap();
        assert!(matches!(service.find(relevant.id).await, Err(ContentError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_create_requires_uploaded_video() {
        let (_dir, _uploads, service) = setup().await;
        assert!(matches!(
            service
                .create(&CreateRelevantInput {
                    title: "X".to_string(),
                    description: None,
                    video_key: "relevants/video/nope.mp4".to_string(),
                    cover_key: None,
                })
                .await,
            Err(ContentError::Validation(_))
        ));
    }
}
