//! Banner repository

use crate::db::{Backend, DynDatabasePool};
use crate::models::{Banner, CreateBannerInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait BannerRepository: Send + Sync {
    async fn create(&self, input: &CreateBannerInput, sort_order: i64) -> Result<Banner>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Banner>>;

    async fn update(&self, banner: &Banner) -> Result<Banner>;

    async fn soft_delete(&self, id: i64) -> Result<bool>;

    /// Non-removed banners by position
    async fn list(&self) -> Result<Vec<Banner>>;
}

pub struct SqlxBannerRepository {
    pool: DynDatabasePool,
}

impl SqlxBannerRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn BannerRepository> {
        Arc::new(Self::new(pool))
    }
}

const BANNER_COLUMNS: &str =
    "id, image_url, text, link, sort_order, removed, created_at, updated_at";

const INSERT_BANNER: &str = r#"
    INSERT INTO banners (image_url, text, link, sort_order, removed, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?)
"#;

const UPDATE_BANNER: &str =
    "UPDATE banners SET image_url = ?, text = ?, link = ?, updated_at = ? WHERE id = ?";

const SOFT_DELETE_BANNER: &str =
    "UPDATE banners SET removed = ?, updated_at = ? WHERE id = ? AND removed = ?";

fn select_where(clause: &str) -> String {
    format!("SELECT {} FROM banners WHERE {}", BANNER_COLUMNS, clause)
}

macro_rules! row_to_banner {
    ($row:expr) => {
        Banner {
            id: $row.get("id"),
            image_url: $row.get("image_url"),
            text: $row.get("text"),
            link: $row.get("link"),
            sort_order: $row.get("sort_order"),
            removed: $row.get("removed"),
            created_at: $row.get("created_at"),
            updated_at: $row.get("updated_at"),
        }
    };
}

#[async_trait]
impl BannerRepository for SqlxBannerRepository {
    async fn create(&self, input: &CreateBannerInput, sort_order: i64) -> Result<Banner> {
        let now = Utc::now();
        let id = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(INSERT_BANNER)
                .bind(&input.image_url)
                .bind(&input.text)
                .bind(&input.link)
                .bind(sort_order)
                .bind(false)
                .bind(now)
                .bind(now)
                .execute(p)
                .await
                .context("Failed to create banner")?
                .last_insert_rowid(),
            Backend::Mysql(p) => sqlx::query(INSERT_BANNER)
                .bind(&input.image_url)
                .bind(&input.text)
                .bind(&input.link)
                .bind(sort_order)
                .bind(false)
                .bind(now)
                .bind(now)
                .execute(p)
                .await
                .context("Failed to create banner")?
                .last_insert_id() as i64,
        };
        self.get_by_id(id)
            .await?
            .context("Banner not found after insert")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Banner>> {
        let sql = select_where("id = ?");
        let banner = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get banner")?
                .map(|row| row_to_banner!(row)),
            Backend::Mysql(p) => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get banner")?
                .map(|row| row_to_banner!(row)),
        };
        Ok(banner)
    }

    async fn update(&self, banner: &Banner) -> Result<Banner> {
        let now = Utc::now();
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                sqlx::query(UPDATE_BANNER)
                    .bind(&banner.image_url)
                    .bind(&banner.text)
                    .bind(&banner.link)
                    .bind(now)
                    .bind(banner.id)
                    .execute(p)
                    .await
                    .context("Failed to update banner")?;
            }
            Backend::Mysql(p) => {
                sqlx::query(UPDATE_BANNER)
                    .bind(&banner.image_url)
                    .bind(&banner.text)
                    .bind(&banner.link)
                    .bind(now)
                    .bind(banner.id)
                    .execute(p)
                    .await
                    .context("Failed to update banner")?;
            }
        }
        self.get_by_id(banner.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Banner not found after update"))
    }

    async fn soft_delete(&self, id: i64) -> Result<bool> {
        let now = Utc::now();
        let affected = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(SOFT_DELETE_BANNER)
                .bind(true)
                .bind(now)
                .bind(id)
                .bind(false)
                .execute(p)
                .await
                .context("Failed to remove banner")?
                .rows_affected(),
            Backend::Mysql(p) => sqlx::query(SOFT_DELETE_BANNER)
                .bind(true)
                .bind(now)
                .bind(id)
                .bind(false)
                .execute(p)
                .await
                .context("Failed to remove banner")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn list(&self) -> Result<Vec<Banner>> {
        let sql = select_where("removed = ? ORDER BY sort_order ASC, id ASC");
        let banners = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(&sql)
                .bind(false)
                .fetch_all(p)
                .await
                .context("Failed to list banners")?
                .into_iter()
                .map(|row| row_to_banner!(row))
                .collect(),
            Backend::Mysql(p) => sqlx::query(&sql)
                .bind(false)
                .fetch_all(p)
                .await
                .context("Failed to list banners")?
                .into_iter()
                .map(|row| row_to_banner!(row))
                .collect(),
        };
        Ok(banners)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxBannerRepository {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        SqlxBannerRepository::new(pool)
    }

    fn input(text: &str) -> CreateBannerInput {
        CreateBannerInput {
            image_url: Some(format!("https://cdn.test/{}.jpg", text)),
            text: Some(text.to_string()),
            link: None,
        }
    }

    #[tokio::test]
    async fn test_list_by_position() {
        let repo = setup_test_repo().await;
        repo.create(&input("second"), 1).await.unwrap();
        repo.create(&input("first"), 0).await.unwrap();
        let gone = repo.create(&input("gone"), 2).await.unwrap();
        repo.soft_delete(gone.id).await.unwrap();

        let texts: Vec<_> = repo
            .list()
            .await
            .unwrap()
            .into_iter()
            .filter_map(|b| b.text)
            .collect();
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_update_fields() {
        let repo = setup_test_repo().await;
        let mut banner = repo.create(&input("promo"), 0).await.unwrap();
        banner.link = Some("https://portal.test/promo".to_string());
        let updated = repo.update(&banner).await.unwrap();
        assert_eq!(updated.link.as_deref(), Some("https://portal.test/promo"));
        assert_eq!(updated.sort_order, 0);
    }

    #[tokio::test]
    async fn test_soft_delete_twice() {
        let repo = setup_test_repo().await;
        let banner = repo.create(&input("x"), 0).await.unwrap();
        assert!(repo.soft_delete(banner.id).await.unwrap());
        assert!(!repo.soft_delete(banner.id).await.unwrap());
        assert!(repo.get_by_id(banner.id).await.unwrap().unwrap().removed);
    }
}
