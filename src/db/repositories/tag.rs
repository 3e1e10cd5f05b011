//! Tag repository

use crate::db::{Backend, DynDatabasePool};
use crate::models::Tag;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait TagRepository: Send + Sync {
    async fn create(&self, name: &str, slug: &str) -> Result<Tag>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Tag>>;

    async fn update(&self, tag: &Tag) -> Result<Tag>;

    async fn soft_delete(&self, id: i64) -> Result<bool>;

    /// Non-removed tags by name
    async fn list(&self) -> Result<Vec<Tag>>;

    /// Non-removed tags among `ids`
    async fn get_many(&self, ids: &[i64]) -> Result<Vec<Tag>>;

    /// Tags attached to a post
    async fn get_for_post(&self, post_id: i64) -> Result<Vec<Tag>>;
}

pub struct SqlxTagRepository {
    pool: DynDatabasePool,
}

impl SqlxTagRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TagRepository> {
        Arc::new(Self::new(pool))
    }
}

const TAG_COLUMNS: &str = "id, name, slug, removed, created_at, updated_at";

const INSERT_TAG: &str =
    "INSERT INTO tags (name, slug, removed, created_at, updated_at) VALUES (?, ?, ?, ?, ?)";

const UPDATE_TAG: &str = "UPDATE tags SET name = ?, slug = ?, updated_at = ? WHERE id = ?";

const SOFT_DELETE_TAG: &str =
    "UPDATE tags SET removed = ?, updated_at = ? WHERE id = ? AND removed = ?";

fn select_where(clause: &str) -> String {
    format!("SELECT {} FROM tags WHERE {}", TAG_COLUMNS, clause)
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn post_tags_query() -> &'static str {
    r#"
    SELECT t.id, t.name, t.slug, t.removed, t.created_at, t.updated_at
    FROM tags t
    INNER JOIN post_tags pt ON pt.tag_id = t.id
    WHERE pt.post_id = ? AND t.removed = ?
    ORDER BY t.name ASC
    "#
}

#[async_trait]
impl TagRepository for SqlxTagRepository {
    async fn create(&self, name: &str, slug: &str) -> Result<Tag> {
        let now = Utc::now();
        let id = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(INSERT_TAG)
                .bind(name)
                .bind(slug)
                .bind(false)
                .bind(now)
                .bind(now)
                .execute(p)
                .await
                .context("Failed to create tag")?
                .last_insert_rowid(),
            Backend::Mysql(p) => sqlx::query(INSERT_TAG)
                .bind(name)
                .bind(slug)
                .bind(false)
                .bind(now)
                .bind(now)
                .execute(p)
                .await
                .context("Failed to create tag")?
                .last_insert_id() as i64,
        };
        self.get_by_id(id)
            .await?
            .context("Tag not found after insert")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>> {
        let sql = select_where("id = ?");
        match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get tag")?
                .as_ref()
                .map(row_to_tag_sqlite)
                .transpose(),
            Backend::Mysql(p) => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get tag")?
                .as_ref()
                .map(row_to_tag_mysql)
                .transpose(),
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Tag>> {
        let sql = select_where("slug = ?");
        match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(&sql)
                .bind(slug)
                .fetch_optional(p)
                .await
                .context("Failed to get tag by slug")?
                .as_ref()
                .map(row_to_tag_sqlite)
                .transpose(),
            Backend::Mysql(p) => sqlx::query(&sql)
                .bind(slug)
                .fetch_optional(p)
                .await
                .context("Failed to get tag by slug")?
                .as_ref()
                .map(row_to_tag_mysql)
                .transpose(),
        }
    }

    async fn update(&self, tag: &Tag) -> Result<Tag> {
        let now = Utc::now();
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                sqlx::query(UPDATE_TAG)
                    .bind(&tag.name)
                    .bind(&tag.slug)
                    .bind(now)
                    .bind(tag.id)
                    .execute(p)
                    .await
                    .context("Failed to update tag")?;
            }
            Backend::Mysql(p) => {
                sqlx::query(UPDATE_TAG)
                    .bind(&tag.name)
                    .bind(&tag.slug)
                    .bind(now)
                    .bind(tag.id)
                    .execute(p)
                    .await
                    .context("Failed to update tag")?;
            }
        }
        self.get_by_id(tag.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Tag not found after update"))
    }

    async fn soft_delete(&self, id: i64) -> Result<bool> {
        let now = Utc::now();
        let affected = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(SOFT_DELETE_TAG)
                .bind(true)
                .bind(now)
                .bind(id)
                .bind(false)
                .execute(p)
                .await
                .context("Failed to remove tag")?
                .rows_affected(),
            Backend::Mysql(p) => sqlx::query(SOFT_DELETE_TAG)
                .bind(true)
                .bind(now)
                .bind(id)
                .bind(false)
                .execute(p)
                .await
                .context("Failed to remove tag")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn list(&self) -> Result<Vec<Tag>> {
        let sql = select_where("removed = ? ORDER BY name ASC, id ASC");
        match self.pool.backend() {
            Backend::Sqlite(p) => list_tags_sqlite(p, &sql, &[]).await,
            Backend::Mysql(p) => list_tags_mysql(p, &sql, &[]).await,
        }
    }

    async fn get_many(&self, ids: &[i64]) -> Result<Vec<Tag>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = select_where(&format!(
            "removed = ? AND id IN ({}) ORDER BY name ASC",
            placeholders(ids.len())
        ));
        match self.pool.backend() {
            Backend::Sqlite(p) => list_tags_sqlite(p, &sql, ids).await,
            Backend::Mysql(p) => list_tags_mysql(p, &sql, ids).await,
        }
    }

    async fn get_for_post(&self, post_id: i64) -> Result<Vec<Tag>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                let rows = sqlx::query(post_tags_query())
                    .bind(post_id)
                    .bind(false)
                    .fetch_all(p)
                    .await
                    .context("Failed to load post tags")?;
                rows.iter().map(row_to_tag_sqlite).collect()
            }
            Backend::Mysql(p) => {
                let rows = sqlx::query(post_tags_query())
                    .bind(post_id)
                    .bind(false)
                    .fetch_all(p)
                    .await
                    .context("Failed to load post tags")?;
                rows.iter().map(row_to_tag_mysql).collect()
            }
        }
    }
}

/// `sql` binds `removed = false` first, then each id
async fn list_tags_sqlite(pool: &SqlitePool, sql: &str, ids: &[i64]) -> Result<Vec<Tag>> {
    let mut query = sqlx::query(sql).bind(false);
    for id in ids {
        query = query.bind(*id);
    }
    let rows = query.fetch_all(pool).await.context("Failed to list tags")?;
    rows.iter().map(row_to_tag_sqlite).collect()
}

fn row_to_tag_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Tag> {
    Ok(Tag {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        removed: row.get("removed"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

async fn list_tags_mysql(pool: &MySqlPool, sql: &str, ids: &[i64]) -> Result<Vec<Tag>> {
    let mut query = sqlx::query(sql).bind(false);
    for id in ids {
        query = query.bind(*id);
    }
    let rows = query.fetch_all(pool).await.context("Failed to list tags")?;
    rows.iter().map(row_to_tag_mysql).collect()
}

fn row_to_tag_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Tag> {
    Ok(Tag {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        removed: row.get("removed"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxTagRepository {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        SqlxTagRepository::new(pool)
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let repo = setup_test_repo().await;
        let tag = repo.create("Soja", "soja").await.unwrap();
        assert!(tag.id > 0);
        assert_eq!(repo.get_by_slug("soja").await.unwrap().unwrap().id, tag.id);
        assert!(repo.create("Soja 2", "soja").await.is_err());
    }

    #[tokio::test]
    async fn test_list_sorted_and_hides_removed() {
        let repo = setup_test_repo().await;
        repo.create("Trigo", "trigo").await.unwrap();
        repo.create("Arroz", "arroz").await.unwrap();
        let gone = repo.create("Cafe", "cafe").await.unwrap();
        assert!(repo.soft_delete(gone.id).await.unwrap());
        assert!(!repo.soft_delete(gone.id).await.unwrap());

        let names: Vec<_> = repo.list().await.unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["Arroz", "Trigo"]);
    }

    #[tokio::test]
    async fn test_get_many_skips_unknown_ids() {
        let repo = setup_test_repo().await;
        let a = repo.create("A", "a").await.unwrap();
        let b = repo.create("B", "b").await.unwrap();
        let found = repo.get_many(&[a.id, b.id, 999]).await.unwrap();
        assert_eq!(found.len(), 2);
        assert!(repo.get_many(&[]).await.unwrap().is_empty());
    }
}
