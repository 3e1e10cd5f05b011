//! Site document repository
//!
//! One row per [`DocumentKind`], payload stored as JSON text.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{DocumentKind, SiteDocument};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait SiteDocumentRepository: Send + Sync {
    async fn get(&self, kind: DocumentKind) -> Result<Option<SiteDocument>>;

    /// Insert or replace the payload for `kind`
    async fn upsert(&self, kind: DocumentKind, payload: &serde_json::Value) -> Result<SiteDocument>;
}

pub struct SqlxSiteDocumentRepository {
    pool: DynDatabasePool,
}

impl SqlxSiteDocumentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SiteDocumentRepository> {
        Arc::new(Self::new(pool))
    }
}

const SELECT_DOCUMENT: &str = "SELECT payload, updated_at FROM site_documents WHERE kind = ?";

fn decode_document(kind: DocumentKind, payload: &str, updated_at: DateTime<Utc>) -> Result<SiteDocument> {
    let payload = serde_json::from_str(payload)
        .with_context(|| format!("Invalid JSON stored for {}", kind))?;
    Ok(SiteDocument {
        kind,
        payload,
        updated_at,
    })
}

#[async_trait]
impl SiteDocumentRepository for SqlxSiteDocumentRepository {
    async fn get(&self, kind: DocumentKind) -> Result<Option<SiteDocument>> {
        let row = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(SELECT_DOCUMENT)
                .bind(kind.as_str())
                .fetch_optional(p)
                .await
                .context("Failed to get site document")?
                .map(|row| (row.get::<String, _>("payload"), row.get::<DateTime<Utc>, _>("updated_at"))),
            Backend::Mysql(p) => sqlx::query(SELECT_DOCUMENT)
                .bind(kind.as_str())
                .fetch_optional(p)
                .await
                .context("Failed to get site document")?
                .map(|row| (row.get::<String, _>("payload"), row.get::<DateTime<Utc>, _>("updated_at"))),
        };
        row.map(|(payload, updated_at)| decode_document(kind, &payload, updated_at))
            .transpose()
    }

    async fn upsert(&self, kind: DocumentKind, payload: &serde_json::Value) -> Result<SiteDocument> {
        let json = serde_json::to_string(payload).context("Failed to encode site document")?;
        match self.pool.backend() {
            Backend::Sqlite(p) => upsert_sqlite(p, kind, &json).await?,
            Backend::Mysql(p) => upsert_mysql(p, kind, &json).await?,
        }
        self.get(kind)
            .await?
            .context("Site document not found after upsert")
    }
}

async fn upsert_sqlite(pool: &SqlitePool, kind: DocumentKind, payload: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO site_documents (kind, payload, updated_at) VALUES (?, ?, ?)
         ON CONFLICT(kind) DO UPDATE SET payload = excluded.payload, updated_at = excluded.updated_at",
    )
    .bind(kind.as_str())
    .bind(payload)
    .bind(Utc::now())
    .execute(pool)
    .await
    .context("Failed to save site document")?;
    Ok(())
}

async fn upsert_mysql(pool: &MySqlPool, kind: DocumentKind, payload: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO site_documents (kind, payload, updated_at) VALUES (?, ?, ?)
         ON DUPLICATE KEY UPDATE payload = VALUES(payload), updated_at = VALUES(updated_at)",
    )
    .bind(kind.as_str())
    .bind(payload)
    .bind(Utc::now())
    .execute(pool)
    .await
    .context("Failed to save site document")?;
    Ok(())
}
