//! Stored object repository
//!
//! Index of everything written to object storage, keyed by content hash.

use crate::db::{Backend, DynDatabasePool};
use crate::models::StoredObject;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

/// Fields of an object about to be recorded
#[derive(Debug, Clone)]
pub struct NewStoredObject<'a> {
    pub content_hash: &'a str,
    pub object_key: &'a str,
    pub url: &'a str,
    pub size: i64,
    pub content_type: &'a str,
}

#[async_trait]
pub trait StoredObjectRepository: Send + Sync {
    async fn get_by_hash(&self, content_hash: &str) -> Result<Option<StoredObject>>;

    async fn get_by_key(&self, object_key: &str) -> Result<Option<StoredObject>>;

    async fn create(&self, object: &NewStoredObject<'_>) -> Result<StoredObject>;
}

pub struct SqlxStoredObjectRepository {
    pool: DynDatabasePool,
}

impl SqlxStoredObjectRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn StoredObjectRepository> {
        Arc::new(Self::new(pool))
    }
}

const OBJECT_COLUMNS: &str = "id, content_hash, object_key, url, size, content_type, created_at";

const INSERT_OBJECT: &str = r#"
    INSERT INTO stored_objects (content_hash, object_key, url, size, content_type, created_at)
    VALUES (?, ?, ?, ?, ?, ?)
"#;

fn select_where(clause: &str) -> String {
    format!("SELECT {} FROM stored_objects WHERE {}", OBJECT_COLUMNS, clause)
}

macro_rules! row_to_object {
    ($row:expr) => {
        StoredObject {
            id: $row.get("id"),
            content_hash: $row.get("content_hash"),
            object_key: $row.get("object_key"),
            url: $row.get("url"),
            size: $row.get("size"),
            content_type: $row.get("content_type"),
            created_at: $row.get("created_at"),
        }
    };
}

impl SqlxStoredObjectRepository {
    async fn find_one(&self, column: &str, value: &str) -> Result<Option<StoredObject>> {
        let sql = select_where(&format!("{} = ?", column));
        let object = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(&sql)
                .bind(value)
                .fetch_optional(p)
                .await
                .context("Failed to get stored object")?
                .map(|row| row_to_object!(row)),
            Backend::Mysql(p) => sqlx::query(&sql)
                .bind(value)
                .fetch_optional(p)
                .await
                .context("Failed to get stored object")?
                .map(|row| row_to_object!(row)),
        };
        Ok(object)
    }
}

#[async_trait]
impl StoredObjectRepository for SqlxStoredObjectRepository {
    async fn get_by_hash(&self, content_hash: &str) -> Result<Option<StoredObject>> {
        self.find_one("content_hash", content_hash).await
    }

    async fn get_by_key(&self, object_key: &str) -> Result<Option<StoredObject>> {
        self.find_one("object_key", object_key).await
    }

    async fn create(&self, object: &NewStoredObject<'_>) -> Result<StoredObject> {
        let now = Utc::now();
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                sqlx::query(INSERT_OBJECT)
                    .bind(object.content_hash)
                    .bind(object.object_key)
                    .bind(object.url)
                    .bind(object.size)
                    .bind(object.content_type)
                    .bind(now)
                    .execute(p)
                    .await
                    .context("Failed to record stored object")?;
            }
            Backend::Mysql(p) => {
                sqlx::query(INSERT_OBJECT)
                    .bind(object.content_hash)
                    .bind(object.object_key)
                    .bind(object.url)
                    .bind(object.size)
                    .bind(object.content_type)
                    .bind(now)
                    .execute(p)
                    .await
                    .context("Failed to record stored object")?;
            }
        }
        self.get_by_hash(object.content_hash)
            .await?
            .context("Stored object not found after insert")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    fn object<'a>(hash: &'a str, key: &'a str) -> NewStoredObject<'a> {
        NewStoredObject {
            content_hash: hash,
            object_key: key,
            url: "https://cdn.test/x",
            size: 3,
            content_type: "image/png",
        }
    }

    #[tokio::test]
    async fn test_lookup_by_hash_and_key() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let repo = SqlxStoredObjectRepository::new(pool);

        let created = repo.create(&object("abc", "posts/a.png")).await.unwrap();
        assert_eq!(created.size, 3);
        assert_eq!(repo.get_by_key("posts/a.png").await.unwrap().unwrap().id, created.id);
        assert!(repo.get_by_hash("def").await.unwrap().is_none());
        assert!(repo.create(&object("abc", "posts/b.png")).await.is_err());
    }
}
