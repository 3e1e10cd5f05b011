//! Site singleton documents
//!
//! The magazine PDF, live stream toggle, editorial agenda (pauta) and the
//! static pages each exist at most once and are replaced wholesale.

use crate::db::repositories::SiteDocumentRepository;
use crate::models::{DocumentKind, LiveStream, Magazine, PageContent, Pauta, UploadedFile};
use crate::services::error::ContentError;
use crate::services::upload::{FilePart, UploadService};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const MAGAZINE_PREFIX: &str = "magazine";
const PAUTA_PREFIX: &str = "pauta";

/// Result of replacing a document from an upload
#[derive(Debug, Clone)]
pub enum SiteUpload<T> {
    Saved(T),
    /// The file was already stored; the document was left unchanged
    Duplicate(UploadedFile),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveInput {
    pub link: Option<String>,
    pub is_enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageInput {
    #[serde(default)]
    pub content: serde_json::Value,
}

pub struct SiteService {
    repo: Arc<dyn SiteDocumentRepository>,
    uploads: Arc<UploadService>,
}

impl SiteService {
    pub fn new(repo: Arc<dyn SiteDocumentRepository>, uploads: Arc<UploadService>) -> Self {
        Self { repo, uploads }
    }

    async fn read<T: DeserializeOwned>(&self, kind: DocumentKind) -> Result<Option<T>, ContentError> {
        match self.repo.get(kind).await? {
            Some(document) => Ok(Some(document.decode()?)),
            None => Ok(None),
        }
    }

    async fn write<T: Serialize>(&self, kind: DocumentKind, value: &T) -> Result<(), ContentError> {
        let payload = serde_json::to_value(value)
            .map_err(|e| anyhow::anyhow!("Failed to encode {} document: {}", kind, e))?;
        self.repo.upsert(kind, &payload).await?;
        tracing::info!(kind = %kind, "Site document saved");
        Ok(())
    }

    pub async fn magazine(&self) -> Result<Option<Magazine>, ContentError> {
        self.read(DocumentKind::Magazine).await
    }

    /// Replace the current edition with an uploaded PDF
    pub async fn upload_magazine(&self, file: &FilePart) -> Result<SiteUpload<Magazine>, ContentError> {
        if file.content_type != "application/pdf" {
            return Err(ContentError::validation("Magazine must be a PDF"));
        }
        let max = self.uploads.config().max_magazine_size;
        let stored = self.uploads.upload(file.request(MAGAZINE_PREFIX, max)).await?;
        if stored.duplicated {
            return Ok(SiteUpload::Duplicate(stored));
        }
        let magazine = Magazine { pdf_url: stored.url };
        self.write(DocumentKind::Magazine, &magazine).await?;
        Ok(SiteUpload::Saved(magazine))
    }

    pub async fn page(&self, kind: DocumentKind) -> Result<Option<PageContent>, ContentError> {
        require_page(kind)?;
        self.read(kind).await
    }

    pub async fn put_page(&self, kind: DocumentKind, input: &PageInput) -> Result<PageContent, ContentError> {
        require_page(kind)?;
        if input.content.is_null() {
            return Err(ContentError::validation("Content is required"));
        }
        let page = PageContent {
            content: input.content.clone(),
        };
        self.write(kind, &page).await?;
        Ok(page)
    }

    /// Live stream settings, disabled with an empty link until first saved
    pub async fn live(&self) -> Result<LiveStream, ContentError> {
        Ok(self.read(DocumentKind::Live).await?.unwrap_or_default())
    }

    pub async fn put_live(&self, input: &LiveInput) -> Result<LiveStream, ContentError> {
        let (Some(link), Some(is_enabled)) = (&input.link, input.is_enabled) else {
            return Err(ContentError::validation("link and isEnabled are required"));
        };
        let live = LiveStream {
            link: link.trim().to_string(),
            is_enabled,
        };
        self.write(DocumentKind::Live, &live).await?;
        Ok(live)
    }

    pub async fn pauta(&self) -> Result<Option<Pauta>, ContentError> {
        self.read(DocumentKind::Pauta).await
    }

    /// Replace the agenda image from an upload or an existing URL
    pub async fn put_pauta(
        &self,
        file: Option<&FilePart>,
        image_url: Option<&str>,
    ) -> Result<SiteUpload<Pauta>, ContentError> {
        let image_url = match (file, image_url.map(str::trim).filter(|u| !u.is_empty())) {
            (Some(file), _) => {
                if !file.is_image() {
                    return Err(ContentError::validation("Pauta must be an image"));
                }
                let max = self.uploads.config().max_image_size;
                let stored = self.uploads.upload(file.request(PAUTA_PREFIX, max)).await?;
                if stored.duplicated {
                    return Ok(SiteUpload::Duplicate(stored));
                }
                stored.url
            }
            (None, Some(url)) => url.to_string(),
            (None, None) => return Err(ContentError::validation("file or imageUrl is required")),
        };
        let pauta = Pauta { image_url };
        self.write(DocumentKind::Pauta, &pauta).await?;
        Ok(SiteUpload::Saved(pauta))
    }
}

fn require_page(kind: DocumentKind) -> Result<(), ContentError> {
    if !kind.is_page() {
        return Err(ContentError::not_found(format!("Page {}", kind)));
    }
    Ok(())
}
