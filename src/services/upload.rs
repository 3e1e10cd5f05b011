//! Object storage with content deduplication
//!
//! Uploads are keyed by SHA-256 of their bytes. A second upload of the same
//! content resolves to the object already stored and writes nothing.
//!
//! Large media can be sent straight to storage through a signed URL:
//! `PUT /api/v1/uploads/signed/{key}?expires=..&signature=..`, where the
//! signature is HMAC-SHA256 of `{key}:{expires}` under the storage secret.

use crate::config::StorageConfig;
use crate::db::repositories::{NewStoredObject, StoredObjectRepository};
use crate::models::UploadedFile;
use crate::services::error::ContentError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Key prefixes a signed URL may target
pub const SIGNED_PREFIXES: &[&str] = &["relevants/video", "relevants/cover"];

/// Where object bytes live
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<()>;

    async fn exists(&self, key: &str) -> Result<bool>;
}

/// Object store on the local filesystem
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if !is_safe_key(key) {
            anyhow::bail!("Invalid object key: {}", key);
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, key: &str, bytes: &[u8], _content_type: &str) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write object {}", key))?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }
}

/// Relative path made only of normal components
fn is_safe_key(key: &str) -> bool {
    !key.is_empty()
        && !key.contains('\\')
        && Path::new(key)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

/// A file received from a client
#[derive(Debug, Clone, Copy)]
pub struct UploadRequest<'a> {
    pub bytes: &'a [u8],
    pub filename: &'a str,
    pub content_type: &'a str,
    pub prefix: &'a str,
    pub max_size: u64,
}

/// A file field read from a multipart body
#[derive(Debug, Clone)]
pub struct FilePart {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: String,
}

impl FilePart {
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }

    pub fn is_video(&self) -> bool {
        self.content_type.starts_with("video/")
    }

    pub fn request<'a>(&'a self, prefix: &'a str, max_size: u64) -> UploadRequest<'a> {
        UploadRequest {
            bytes: &self.bytes,
            filename: &self.filename,
            content_type: &self.content_type,
            prefix,
            max_size,
        }
    }
}

/// Direct-upload grant returned to clients
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedUpload {
    pub upload_url: String,
    pub key: String,
    pub public_url: String,
    pub expires_at: DateTime<Utc>,
}

pub struct UploadService {
    store: Arc<dyn ObjectStore>,
    objects: Arc<dyn StoredObjectRepository>,
    config: StorageConfig,
}

impl UploadService {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        objects: Arc<dyn StoredObjectRepository>,
        config: StorageConfig,
    ) -> Self {
        Self {
            store,
            objects,
            config,
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn public_url(&self, key: &str) -> String {
        self.config.public_url(key)
    }

    /// Whether bytes were ever stored under `key`
    pub async fn object_exists(&self, key: &str) -> Result<bool, ContentError> {
        if self.objects.get_by_key(key).await?.is_some() {
            return Ok(true);
        }
        Ok(is_safe_key(key) && self.store.exists(key).await?)
    }

    /// Store a file under `{prefix}/{uuid}{.ext}` unless its content is known
    pub async fn upload(&self, request: UploadRequest<'_>) -> Result<UploadedFile, ContentError> {
        let key = format!(
            "{}/{}{}",
            request.prefix.trim_matches('/'),
            Uuid::new_v4(),
            extension_for(request.filename, request.content_type)
        );
        self.store_at(&key, request.bytes, request.content_type, request.max_size)
            .await
    }

    async fn store_at(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: &str,
        max_size: u64,
    ) -> Result<UploadedFile, ContentError> {
        if bytes.is_empty() {
            return Err(ContentError::validation("Empty file"));
        }
        if bytes.len() as u64 > max_size {
            return Err(ContentError::validation(format!(
                "File too large. Maximum size: {} MB",
                max_size / 1024 / 1024
            )));
        }

        let hash = sha256_hex(bytes);
        if let Some(existing) = self.objects.get_by_hash(&hash).await? {
            tracing::info!(key = %existing.object_key, "Duplicate upload, reusing stored object");
            return Ok(UploadedFile::from_object(&existing, true));
        }

        self.store.put(key, bytes, content_type).await?;
        let url = self.public_url(key);
        let object = self
            .objects
            .create(&NewStoredObject {
                content_hash: &hash,
                object_key: key,
                url: &url,
                size: bytes.len() as i64,
                content_type,
            })
            .await?;
        tracing::info!(key = %object.object_key, size = object.size, "Stored object");
        Ok(UploadedFile::from_object(&object, false))
    }

    /// `hex(HMAC-SHA256(secret, "{key}:{expires}"))`
    pub fn sign(&self, key: &str, expires: i64) -> Result<String, ContentError> {
        let mac = self.mac_for(key, expires)?;
        Ok(mac
            .finalize()
            .into_bytes()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect())
    }

    fn mac_for(&self, key: &str, expires: i64) -> Result<HmacSha256, ContentError> {
        let mut mac = HmacSha256::new_from_slice(self.config.signing_secret.as_bytes())
            .map_err(|e| anyhow::anyhow!("Invalid signing secret: {}", e))?;
        mac.update(format!("{}:{}", key, expires).as_bytes());
        Ok(mac)
    }

    /// Grant a direct upload of `filename` under `prefix`
    pub fn signed_upload(
        &self,
        prefix: &str,
        filename: &str,
        content_type: &str,
    ) -> Result<SignedUpload, ContentError> {
        let key = format!(
            "{}/{}{}",
            prefix.trim_matches('/'),
            Uuid::new_v4(),
            extension_for(filename, content_type)
        );
        let expires_at = Utc::now() + chrono::Duration::seconds(self.config.signed_url_ttl_seconds as i64);
        let expires = expires_at.timestamp();
        let signature = self.sign(&key, expires)?;
        Ok(SignedUpload {
            upload_url: format!(
                "/api/v1/uploads/signed/{}?expires={}&signature={}",
                key, expires, signature
            ),
            public_url: self.public_url(&key),
            key,
            expires_at: Utc
                .timestamp_opt(expires, 0)
                .single()
                .unwrap_or(expires_at),
        })
    }

    /// Accept bytes sent to a signed URL
    pub async fn put_signed(
        &self,
        key: &str,
        expires: i64,
        signature: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<UploadedFile, ContentError> {
        let provided = decode_hex(signature)
            .ok_or_else(|| ContentError::Unauthorized("INVALID_SIGNATURE".to_string()))?;
        self.mac_for(key, expires)?
            .verify_slice(&provided)
            .map_err(|_| ContentError::Unauthorized("INVALID_SIGNATURE".to_string()))?;
        if expires < Utc::now().timestamp() {
            return Err(ContentError::Unauthorized("SIGNATURE_EXPIRED".to_string()));
        }
        if !SIGNED_PREFIXES
            .iter()
            .any(|prefix| key.starts_with(&format!("{}/", prefix)))
            || !is_safe_key(key)
        {
            return Err(ContentError::validation("Key outside signed upload area"));
        }
        self.store_at(key, bytes, content_type, self.config.max_file_size)
            .await
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn decode_hex(input: &str) -> Option<Vec<u8>> {
    if input.len() % 2 != 0 {
        return None;
    }
    (0..input.len())
        .step_by(2)
        .map(|i| input.get(i..i + 2).and_then(|pair| u8::from_str_radix(pair, 16).ok()))
        .collect()
}

/// `.ext` from the file name, else from the content type, else empty
pub fn extension_for(filename: &str, content_type: &str) -> String {
    if let Some((_, ext)) = filename.rsplit_once('.') {
        if !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return format!(".{}", ext.to_lowercase());
        }
    }
    let ext = match content_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/quicktime" => "mov",
        "application/pdf" => "pdf",
        _ => return String::new(),
    };
    format!(".{}", ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxStoredObjectRepository;
    use crate::db::{create_test_pool, migrations};
    use tempfile::TempDir;

    async fn setup() -> (TempDir, UploadService) {
        let dir = TempDir::new().unwrap();
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let config = StorageConfig {
            path: dir.path().to_path_buf(),
            ..Default::default()
        };
        let service = UploadService::new(
            Arc::new(LocalObjectStore::new(dir.path())),
            SqlxStoredObjectRepository::boxed(pool),
            config,
        );
        (dir, service)
    }

    fn request<'a>(bytes: &'a [u8], prefix: &'a str) -> UploadRequest<'a> {
        UploadRequest {
            bytes,
            filename: "Foto.PNG",
            content_type: "image/png",
            prefix,
            max_size: 1024,
        }
    }

    #[tokio::test]
    async fn test_upload_writes_and_dedups() {
        let (dir, service) = setup().await;
        let first = service.upload(request(b"png-bytes", "banners")).await.unwrap();
        assert!(!first.duplicated);
        assert!(first.key.starts_with("banners/"));
        assert!(first.key.ends_with(".png"));
        assert_eq!(first.url, format!("http://localhost:3003/uploads/{}", first.key));
        assert!(dir.path().join(&first.key).exists());

        let second = service.upload(request(b"png-bytes", "posts")).await.unwrap();
        assert!(second.duplicated);
        assert_eq!(second.key, first.key);
        assert!(!dir.path().join("posts").exists());
    }

    #[tokio::test]
    async fn test_upload_rejects_empty_and_large() {
        let (_dir, service) = setup().await;
        assert!(matches!(
            service.upload(request(b"", "banners")).await,
            Err(ContentError::Validation(_))
        ));
        let big = vec![1u8; 2048];
        assert!(matches!(
            service.upload(request(&big, "banners")).await,
            Err(ContentError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_signed_upload_roundtrip() {
        let (dir, service) = setup().await;
        let grant = service
            .signed_upload("relevants/video", "clip.mp4", "video/mp4")
            .unwrap();
        assert!(grant.key.starts_with("relevants/video/"));
        assert!(grant.upload_url.contains(&grant.key));

        let expires = grant.expires_at.timestamp();
        let signature = service.sign(&grant.key, expires).unwrap();
        let stored = service
            .put_signed(&grant.key, expires, &signature, b"video", "video/mp4")
            .await
            .unwrap();
        assert_eq!(stored.key, grant.key);
        assert_eq!(stored.url, grant.public_url);
        assert!(dir.path().join(&grant.key).exists());
        assert!(service.object_exists(&grant.key).await.unwrap());
        assert!(!service.object_exists("relevants/video/missing.mp4").await.unwrap());
    }

    #[tokio::test]
    async fn test_put_signed_rejections() {
        let (_dir, service) = setup().await;
        let key = "relevants/cover/a.png";
        let future = Utc::now().timestamp() + 60;

        assert!(matches!(
            service.put_signed(key, future, "deadbeef", b"x", "image/png").await,
            Err(ContentError::Unauthorized(_))
        ));
        assert!(matches!(
            service.put_signed(key, future, "not-hex", b"x", "image/png").await,
            Err(ContentError::Unauthorized(_))
        ));

        let past = Utc::now().timestamp() - 60;
        let signature = service.sign(key, past).unwrap();
        assert!(matches!(
            service.put_signed(key, past, &signature, b"x", "image/png").await,
            Err(ContentError::Unauthorized(code)) if code == "SIGNATURE_EXPIRED"
        ));

        let outside = "banners/a.png";
        let signature = service.sign(outside, future).unwrap();
        assert!(matches!(
            service.put_signed(outside, future, &signature, b"x", "image/png").await,
            Err(ContentError::Validation(_))
        ));
    }

    #[test]
    fn test_safe_keys() {
        assert!(is_safe_key("posts/a.png"));
        assert!(!is_safe_key("../etc/passwd"));
        assert!(!is_safe_key("/abs/path"));
        assert!(!is_safe_key("posts\\a.png"));
        assert!(!is_safe_key(""));
    }

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("Foto.JPEG", "image/jpeg"), ".jpeg");
        assert_eq!(extension_for("blob", "video/mp4"), ".mp4");
        assert_eq!(extension_for("blob", "application/x-unknown"), "");
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
