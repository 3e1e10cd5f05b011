//! Embedded video repository

use crate::db::{Backend, DynDatabasePool};
use crate::models::{CreateVideoInput, Video};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait VideoRepository: Send + Sync {
    async fn create(&self, input: &CreateVideoInput) -> Result<Video>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Video>>;

    async fn update(&self, video: &Video) -> Result<Video>;

    async fn soft_delete(&self, id: i64) -> Result<bool>;

    /// Non-removed videos, featured first, then newest
    async fn list(&self) -> Result<Vec<Video>>;
}

pub struct SqlxVideoRepository {
    pool: DynDatabasePool,
}

impl SqlxVideoRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn VideoRepository> {
        Arc::new(Self::new(pool))
    }
}

const VIDEO_COLUMNS: &str = "id, description, embed, is_featured, removed, created_at, updated_at";

const INSERT_VIDEO: &str = r#"
    INSERT INTO videos (description, embed, is_featured, removed, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?)
"#;

const UPDATE_VIDEO: &str =
    "UPDATE videos SET description = ?, embed = ?, is_featured = ?, updated_at = ? WHERE id = ?";

const SOFT_DELETE_VIDEO: &str =
    "UPDATE videos SET removed = ?, updated_at = ? WHERE id = ? AND removed = ?";

fn select_where(clause: &str) -> String {
    format!("SELECT {} FROM videos WHERE {}", VIDEO_COLUMNS, clause)
}

macro_rules! row_to_video {
    ($row:expr) => {
        Video {
            id: $row.get("id"),
            description: $row.get("description"),
            embed: $row.get("embed"),
            is_featured: $row.get("is_featured"),
            removed: $row.get("removed"),
            created_at: $row.get("created_at"),
            updated_at: $row.get("updated_at"),
        }
    };
}

#[async_trait]
impl VideoRepository for SqlxVideoRepository {
    async fn create(&self, input: &CreateVideoInput) -> Result<Video> {
        let now = Utc::now();
        let id = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(INSERT_VIDEO)
                .bind(&input.description)
                .bind(&input.embed)
                .bind(input.is_featured)
                .bind(false)
                .bind(now)
                .bind(now)
                .execute(p)
                .await
                .context("Failed to create video")?
                .last_insert_rowid(),
            Backend::Mysql(p) => sqlx::query(INSERT_VIDEO)
                .bind(&input.description)
                .bind(&input.embed)
                .bind(input.is_featured)
                .bind(false)
                .bind(now)
                .bind(now)
                .execute(p)
                .await
                .context("Failed to create video")?
                .last_insert_id() as i64,
        };
        self.get_by_id(id)
            .await?
            .context("Video not found after insert")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Video>> {
        let sql = select_where("id = ?");
        let video = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get video")?
                .map(|row| row_to_video!(row)),
            Backend::Mysql(p) => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get video")?
                .map(|row| row_to_video!(row)),
        };
        Ok(video)
    }

    async fn update(&self, video: &Video) -> Result<Video> {
        let now = Utc::now();
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                sqlx::query(UPDATE_VIDEO)
                    .bind(&video.description)
                    .bind(&video.embed)
                    .bind(video.is_featured)
                    .bind(now)
                    .bind(video.id)
                    .execute(p)
                    .await
                    .context("Failed to update video")?;
            }
            Backend::Mysql(p) => {
                sqlx::query(UPDATE_VIDEO)
                    .bind(&video.description)
                    .bind(&video.embed)
                    .bind(video.is_featured)
                    .bind(now)
                    .bind(video.id)
                    .execute(p)
                    .await
                    .context("Failed to update video")?;
            }
        }
        self.get_by_id(video.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Video not found after update"))
    }

    async fn soft_delete(&self, id: i64) -> Result<bool> {
        let now = Utc::now();
        let affected = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(SOFT_DELETE_VIDEO)
                .bind(true)
                .bind(now)
                .bind(id)
                .bind(false)
                .execute(p)
                .await
                .context("Failed to remove video")?
                .rows_affected(),
            Backend::Mysql(p) => sqlx::query(SOFT_DELETE_VIDEO)
                .bind(true)
                .bind(now)
                .bind(id)
                .bind(false)
                .execute(p)
                .await
                .context("Failed to remove video")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn list(&self) -> Result<Vec<Video>> {
        let sql = select_where("removed = ? ORDER BY is_featured DESC, created_at DESC, id DESC");
        let videos = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(&sql)
                .bind(false)
                .fetch_all(p)
                .await
                .context("Failed to list videos")?
                .into_iter()
                .map(|row| row_to_video!(row))
                .collect(),
            Backend::Mysql(p) => sqlx::query(&sql)
                .bind(false)
                .fetch_all(p)
                .await
                .context("Failed to list videos")?
                .into_iter()
                .map(|row| row_to_video!(row))
                .collect(),
        };
        Ok(videos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxVideoRepository {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        SqlxVideoRepository::new(pool)
    }

    fn input(description: &str, is_featured: bool) -> CreateVideoInput {
        CreateVideoInput {
            description: description.to_string(),
            embed: format!("https://video.test/embed/{}", description),
            is_featured,
        }
    }

    #[tokio::test]
    async fn test_list_featured_first_then_newest() {
        let repo = setup_test_repo().await;
        repo.create(&input("old", false)).await.unwrap();
        repo.create(&input("star", true)).await.unwrap();
        repo.create(&input("new", false)).await.unwrap();

        let names: Vec<_> = repo
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.description)
            .collect();
        assert_eq!(names, vec!["star", "new", "old"]);
    }

    #[tokio::test]
    async fn test_update_and_soft_delete() {
        let repo = setup_test_repo().await;
        let mut video = repo.create(&input("clip", false)).await.unwrap();
        video.is_featured = true;
        assert!(repo.update(&video).await.unwrap().is_featured);
        assert!(repo.soft_delete(video.id).await.unwrap());
        assert!(repo.list().await.unwrap().is_empty());
    }
}
