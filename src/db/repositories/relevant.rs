//! Relevant repository

use crate::db::{Backend, DynDatabasePool};
use crate::models::{CreateRelevantInput, ListParams, Relevant};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait RelevantRepository: Send + Sync {
    /// Insert with the public URLs already resolved from the keys
    async fn create(
        &self,
        input: &CreateRelevantInput,
        video_url: &str,
        cover_url: Option<&str>,
        sort_order: i64,
    ) -> Result<Relevant>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Relevant>>;

    async fn update(&self, relevant: &Relevant) -> Result<Relevant>;

    async fn soft_delete(&self, id: i64) -> Result<bool>;

    /// Non-removed relevants by position, title search
    async fn list(&self, params: &ListParams) -> Result<(Vec<Relevant>, i64)>;
}

pub struct SqlxRelevantRepository {
    pool: DynDatabasePool,
}

impl SqlxRelevantRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn RelevantRepository> {
        Arc::new(Self::new(pool))
    }
}

const RELEVANT_COLUMNS: &str = "id, title, description, video_key, video_url, cover_key, cover_url, \
                                sort_order, removed, created_at, updated_at";

const INSERT_RELEVANT: &str = r#"
    INSERT INTO relevants (title, description, video_key, video_url, cover_key, cover_url,
                           sort_order, removed, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const UPDATE_RELEVANT: &str = r#"
    UPDATE relevants
    SET title = ?, description = ?, video_key = ?, video_url = ?, cover_key = ?, cover_url = ?,
        updated_at = ?
    WHERE id = ?
"#;

const SOFT_DELETE_RELEVANT: &str =
    "UPDATE relevants SET removed = ?, updated_at = ? WHERE id = ? AND removed = ?";

const COUNT_RELEVANTS: &str =
    "SELECT COUNT(*) AS count FROM relevants WHERE removed = ? AND LOWER(title) LIKE ? ESCAPE '!'";

fn select_where(clause: &str) -> String {
    format!("SELECT {} FROM relevants WHERE {}", RELEVANT_COLUMNS, clause)
}

macro_rules! row_to_relevant {
    ($row:expr) => {
        Relevant {
            id: $row.get("id"),
            title: $row.get("title"),
            description: $row.get("description"),
            video_key: $row.get("video_key"),
            video_url: $row.get("video_url"),
            cover_key: $row.get("cover_key"),
            cover_url: $row.get("cover_url"),
            sort_order: $row.get("sort_order"),
            removed: $row.get("removed"),
            created_at: $row.get("created_at"),
            updated_at: $row.get("updated_at"),
        }
    };
}

#[async_trait]
impl RelevantRepository for SqlxRelevantRepository {
    async fn create(
        &self,
        input: &CreateRelevantInput,
        video_url: &str,
        cover_url: Option<&str>,
        sort_order: i64,
    ) -> Result<Relevant> {
        let now = Utc::now();
        let id = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(INSERT_RELEVANT)
                .bind(&input.title)
                .bind(&input.description)
                .bind(&input.video_key)
                .bind(video_url)
                .bind(&input.cover_key)
                .bind(cover_url)
                .bind(sort_order)
                .bind(false)
                .bind(now)
                .bind(now)
                .execute(p)
                .await
                .context("Failed to create relevant")?
                .last_insert_rowid(),
            Backend::Mysql(p) => sqlx::query(INSERT_RELEVANT)
                .bind(&input.title)
                .bind(&input.description)
                .bind(&input.video_key)
                .bind(video_url)
                .bind(&input.cover_key)
                .bind(cover_url)
                .bind(sort_order)
                .bind(false)
                .bind(now)
                .bind(now)
                .execute(p)
                .await
                .context("Failed to create relevant")?
                .last_insert_id() as i64,
        };
        self.get_by_id(id)
            .await?
            .context("Relevant not found after insert")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Relevant>> {
        let sql = select_where("id = ?");
        let relevant = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get relevant")?
                .map(|row| row_to_relevant!(row)),
            Backend::Mysql(p) => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get relevant")?
                .map(|row| row_to_relevant!(row)),
        };
        Ok(relevant)
    }

    async fn update(&self, relevant: &Relevant) -> Result<Relevant> {
        let now = Utc::now();
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                sqlx::query(UPDATE_RELEVANT)
                    .bind(&relevant.title)
                    .bind(&relevant.description)
                    .bind(&relevant.video_key)
                    .bind(&relevant.video_url)
                    .bind(&relevant.cover_key)
                    .bind(&relevant.cover_url)
                    .bind(now)
                    .bind(relevant.id)
                    .execute(p)
                    .await
                    .context("Failed to update relevant")?;
            }
            Backend::Mysql(p) => {
                sqlx::query(UPDATE_RELEVANT)
                    .bind(&relevant.title)
                    .bind(&relevant.description)
                    .bind(&relevant.video_key)
                    .bind(&relevant.video_url)
                    .bind(&relevant.cover_key)
                    .bind(&relevant.cover_url)
                    .bind(now)
                    .bind(relevant.id)
                    .execute(p)
                    .await
                    .context("Failed to update relevant")?;
            }
        }
        self.get_by_id(relevant.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Relevant not found after update"))
    }

    async fn soft_delete(&self, id: i64) -> Result<bool> {
        let now = Utc::now();
        let affected = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(SOFT_DELETE_RELEVANT)
                .bind(true)
                .bind(now)
                .bind(id)
                .bind(false)
                .execute(p)
                .await
                .context("Failed to remove relevant")?
                .rows_affected(),
            Backend::Mysql(p) => sqlx::query(SOFT_DELETE_RELEVANT)
                .bind(true)
                .bind(now)
                .bind(id)
                .bind(false)
                .execute(p)
                .await
                .context("Failed to remove relevant")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn list(&self, params: &ListParams) -> Result<(Vec<Relevant>, i64)> {
        let pattern = params.like_pattern();
        let sql = select_where(
            "removed = ? AND LOWER(title) LIKE ? ESCAPE '!' ORDER BY sort_order ASC, id ASC LIMIT ? OFFSET ?",
        );
        let result = match self.pool.backend() {
            Backend::Sqlite(p) => {
                let items = sqlx::query(&sql)
                    .bind(false)
                    .bind(&pattern)
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(p)
                    .await
                    .context("Failed to list relevants")?
                    .into_iter()
                    .map(|row| row_to_relevant!(row))
                    .collect();
                let total: i64 = sqlx::query(COUNT_RELEVANTS)
                    .bind(false)
                    .bind(&pattern)
                    .fetch_one(p)
                    .await
                    .context("Failed to count relevants")?
                    .get("count");
                (items, total)
            }
            Backend::Mysql(p) => {
                let items = sqlx::query(&sql)
                    .bind(false)
                    .bind(&pattern)
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(p)
                    .await
                    .context("Failed to list relevants")?
                    .into_iter()
                    .map(|row| row_to_relevant!(row))
                    .collect();
                let total: i64 = sqlx::query(COUNT_RELEVANTS)
                    .bind(false)
                    .bind(&pattern)
                    .fetch_one(p)
                    .await
                    .context("Failed to count relevants")?
                    .get("count");
                (items, total)
            }
        };
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxRelevantRepository {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        SqlxRelevantRepository::new(pool)
    }

    fn input(title: &str) -> CreateRelevantInput {
        CreateRelevantInput {
            title: title.to_string(),
            description: None,
            video_key: format!("relevants/video/{}.mp4", title),
            cover_key: None,
        }
    }

    #[tokio::test]
    async fn test_create_keeps_keys_and_urls() {
        let repo = setup_test_repo().await;
        let relevant = repo
            .create(&input("enchente"), "https://cdn.test/relevants/video/enchente.mp4", None, 0)
            .await
            .unwrap();
        assert_eq!(relevant.video_key, "relevants/video/enchente.mp4");
        assert!(relevant.video_url.ends_with("enchente.mp4"));
        assert!(relevant.cover_url.is_none());
    }

    #[tokio::test]
    async fn test_list_by_position_with_search() {
        let repo = setup_test_repo().await;
        repo.create(&input("segundo"), "u2", None, 1).await.unwrap();
        repo.create(&input("primeiro"), "u1", None, 0).await.unwrap();

        let (items, total) = repo.list(&ListParams::default()).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(items[0].title, "primeiro");

        let (found, total) = repo
            .list(&ListParams::default().with_search("SEG"))
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(found[0].title, "segundo");
    }

    #[tokio::test]
    async fn test_update_and_remove() {
        let repo = setup_test_repo().await;
        let mut relevant = repo.create(&input("a"), "u", None, 0).await.unwrap();
        relevant.cover_key = Some("relevants/cover/a.jpg".to_string());
        relevant.cover_url = Some("https://cdn.test/relevants/cover/a.jpg".to_string());
        let updated = repo.update(&relevant).await.unwrap();
        assert_eq!(updated.cover_key.as_deref(), Some("relevants/cover/a.jpg"));

        assert!(repo.soft_delete(updated.id).await.unwrap());
        let (items, _) = repo.list(&ListParams::default()).await.unwrap();
        assert!(items.is_empty());
    }
}
