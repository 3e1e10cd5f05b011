//! Columnist service

use crate::db::repositories::AuthorRepository;
use crate::models::Author;
use crate::services::error::ContentError;
use crate::services::upload::{FilePart, UploadService};
use std::sync::Arc;

const PHOTO_PREFIX: &str = "authors";

pub struct AuthorService {
    repo: Arc<dyn AuthorRepository>,
    uploads: Arc<UploadService>,
}

impl AuthorService {
    pub fn new(repo: Arc<dyn AuthorRepository>, uploads: Arc<UploadService>) -> Self {
        Self { repo, uploads }
    }

    /// Create an author, storing the optional photo first
    pub async fn create(&self, name: &str, photo: Option<&FilePart>) -> Result<Author, ContentError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ContentError::validation("Name is required"));
        }
        let photo_url = match photo {
            Some(file) => {
                if !file.is_image() {
                    return Err(ContentError::validation("Photo must be an image"));
                }
                let max = self.uploads.config().max_image_size;
                Some(self.uploads.upload(file.request(PHOTO_PREFIX, max)).await?.url)
            }
            None => None,
        };
        let author = self.repo.create(name, photo_url.as_deref()).await?;
        tracing::info!(author_id = author.id, "Author created");
        Ok(author)
    }

    pub async fn list(&self) -> Result<Vec<Author>, ContentError> {
        Ok(self.repo.list().await?)
    }

    pub async fn find(&self, id: i64) -> Result<Author, ContentError> {
        match self.repo.get_by_id(id).await? {
            Some(author) if !author.removed => Ok(author),
            _ => Err(ContentError::not_found(format!("Author {}", id))),
        }
    }

    pub async fn rename(&self, id: i64, name: &str) -> Result<Author, ContentError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ContentError::validation("Name is required"));
        }
        let mut author = self.find(id).await?;
        author.name = name.to_string();
        Ok(self.repo.update(&author).await?)
    }

    pub async fn remove(&self, id: i64) -> Result<(), ContentError> {
        if !self.repo.soft_delete(id).await? {
            return Err(ContentError::not_found(format!("Author {}", id)));
        }
        Ok(())
    }
}
