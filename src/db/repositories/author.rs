//! Columnist repository

use crate::db::{Backend, DynDatabasePool};
use crate::models::Author;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait AuthorRepository: Send + Sync {
    async fn create(&self, name: &str, photo_url: Option<&str>) -> Result<Author>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Author>>;

    async fn update(&self, author: &Author) -> Result<Author>;

    async fn soft_delete(&self, id: i64) -> Result<bool>;

    /// Non-removed authors by name
    async fn list(&self) -> Result<Vec<Author>>;
}

pub struct SqlxAuthorRepository {
    pool: DynDatabasePool,
}

impl SqlxAuthorRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AuthorRepository> {
        Arc::new(Self::new(pool))
    }
}

const AUTHOR_COLUMNS: &str = "id, name, photo_url, removed, created_at, updated_at";

const INSERT_AUTHOR: &str = r#"
    INSERT INTO authors (name, photo_url, removed, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?)
"#;

const UPDATE_AUTHOR: &str =
    "UPDATE authors SET name = ?, photo_url = ?, updated_at = ? WHERE id = ?";

const SOFT_DELETE_AUTHOR: &str =
    "UPDATE authors SET removed = ?, updated_at = ? WHERE id = ? AND removed = ?";

fn select_where(clause: &str) -> String {
    format!("SELECT {} FROM authors WHERE {}", AUTHOR_COLUMNS, clause)
}

macro_rules! row_to_author {
    ($row:expr) => {
        Author {
            id: $row.get("id"),
            name: $row.get("name"),
            photo_url: $row.get("photo_url"),
            removed: $row.get("removed"),
            created_at: $row.get("created_at"),
            updated_at: $row.get("updated_at"),
        }
    };
}

#[async_trait]
impl AuthorRepository for SqlxAuthorRepository {
    async fn create(&self, name: &str, photo_url: Option<&str>) -> Result<Author> {
        let now = Utc::now();
        let id = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(INSERT_AUTHOR)
                .bind(name)
                .bind(photo_url)
                .bind(false)
                .bind(now)
                .bind(now)
                .execute(p)
                .await
                .context("Failed to create author")?
                .last_insert_rowid(),
            Backend::Mysql(p) => sqlx::query(INSERT_AUTHOR)
                .bind(name)
                .bind(photo_url)
                .bind(false)
                .bind(now)
                .bind(now)
                .execute(p)
                .await
                .context("Failed to create author")?
                .last_insert_id() as i64,
        };
        self.get_by_id(id)
            .await?
            .context("Author not found after insert")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Author>> {
        let sql = select_where("id = ?");
        let author = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get author")?
                .map(|row| row_to_author!(row)),
            Backend::Mysql(p) => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get author")?
                .map(|row| row_to_author!(row)),
        };
        Ok(author)
    }

    async fn update(&self, author: &Author) -> Result<Author> {
        let now = Utc::now();
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                sqlx::query(UPDATE_AUTHOR)
                    .bind(&author.name)
                    .bind(&author.photo_url)
                    .bind(now)
                    .bind(author.id)
                    .execute(p)
                    .await
                    .context("Failed to update author")?;
            }
            Backend::Mysql(p) => {
                sqlx::query(UPDATE_AUTHOR)
                    .bind(&author.name)
                    .bind(&author.photo_url)
                    .bind(now)
                    .bind(author.id)
                    .execute(p)
                    .await
                    .context("Failed to update author")?;
            }
        }
        self.get_by_id(author.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Author not found after update"))
    }

    async fn soft_delete(&self, id: i64) -> Result<bool> {
        let now = Utc::now();
        let affected = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(SOFT_DELETE_AUTHOR)
                .bind(true)
                .bind(now)
                .bind(id)
                .bind(false)
                .execute(p)
                .await
                .context("Failed to remove author")?
                .rows_affected(),
            Backend::Mysql(p) => sqlx::query(SOFT_DELETE_AUTHOR)
                .bind(true)
                .bind(now)
                .bind(id)
                .bind(false)
                .execute(p)
                .await
                .context("Failed to remove author")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn list(&self) -> Result<Vec<Author>> {
        let sql = select_where("removed = ? ORDER BY name ASC, id ASC");
        let authors = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(&sql)
                .bind(false)
                .fetch_all(p)
                .await
                .context("Failed to list authors")?
                .into_iter()
                .map(|row| row_to_author!(row))
                .collect(),
            Backend::Mysql(p) => sqlx::query(&sql)
                .bind(false)
                .fetch_all(p)
                .await
                .context("Failed to list authors")?
                .into_iter()
                .map(|row| row_to_author!(row))
                .collect(),
        };
        Ok(authors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxAuthorRepository {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        SqlxAuthorRepository::new(pool)
    }

    #[tokio::test]
    async fn test_list_by_name() {
        let repo = setup_test_repo().await;
        repo.create("Zélia", None).await.unwrap();
        repo.create("Antônio", Some("https://cdn.test/authors/a.jpg"))
            .await
            .unwrap();
        let names: Vec<_> = repo.list().await.unwrap().into_iter().map(|a| a.name).collect();
        assert_eq!(names, vec!["Antônio", "Zélia"]);
    }

    #[tokio::test]
    async fn test_rename_and_remove() {
        let repo = setup_test_repo().await;
        let mut author = repo.create("Ana", None).await.unwrap();
        author.name = "Ana Lima".to_string();
        assert_eq!(repo.update(&author).await.unwrap().name, "Ana Lima");
        assert!(repo.soft_delete(author.id).await.unwrap());
        assert!(repo.list().await.unwrap().is_empty());
        assert!(repo.get_by_id(author.id).await.unwrap().unwrap().removed);
    }
}
