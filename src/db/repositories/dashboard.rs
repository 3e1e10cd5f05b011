//! Dashboard counters

use crate::db::{Backend, DynDatabasePool};
use crate::models::MonthlySummary;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait DashboardRepository: Send + Sync {
    /// Rows created at or after `since`
    async fn created_since(&self, since: DateTime<Utc>) -> Result<MonthlySummary>;
}

pub struct SqlxDashboardRepository {
    pool: DynDatabasePool,
}

impl SqlxDashboardRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn DashboardRepository> {
        Arc::new(Self::new(pool))
    }
}

const COUNT_POSTS: &str = "SELECT COUNT(*) AS count FROM posts WHERE created_at >= ?";
const COUNT_ACTIVE_BANNERS: &str =
    "SELECT COUNT(*) AS count FROM banners WHERE created_at >= ? AND removed = ?";
const COUNT_WEBSTORIES: &str = "SELECT COUNT(*) AS count FROM webstories WHERE created_at >= ?";
const COUNT_CATEGORIES: &str = "SELECT COUNT(*) AS count FROM categories WHERE created_at >= ?";

#[async_trait]
impl DashboardRepository for SqlxDashboardRepository {
    async fn created_since(&self, since: DateTime<Utc>) -> Result<MonthlySummary> {
        let mut summary = MonthlySummary::default();
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                summary.total_posts_this_month = sqlx::query(COUNT_POSTS)
                    .bind(since)
                    .fetch_one(p)
                    .await
                    .context("Failed to count posts")?
                    .get("count");
                summary.active_banners_this_month = sqlx::query(COUNT_ACTIVE_BANNERS)
                    .bind(since)
                    .bind(false)
                    .fetch_one(p)
                    .await
                    .context("Failed to count banners")?
                    .get("count");
                summary.web_stories_this_month = sqlx::query(COUNT_WEBSTORIES)
                    .bind(since)
                    .fetch_one(p)
                    .await
                    .context("Failed to count webstories")?
                    .get("count");
                summary.categories_this_month = sqlx::query(COUNT_CATEGORIES)
                    .bind(since)
                    .fetch_one(p)
                    .await
                    .context("Failed to count categories")?
                    .get("count");
            }
            Backend::Mysql(p) => {
                summary.total_posts_this_month = sqlx::query(COUNT_POSTS)
                    .bind(since)
                    .fetch_one(p)
                    .await
                    .context("Failed to count posts")?
                    .get("count");
                summary.active_banners_this_month = sqlx::query(COUNT_ACTIVE_BANNERS)
                    .bind(since)
                    .bind(false)
                    .fetch_one(p)
                    .await
                    .context("Failed to count banners")?
                    .get("count");
                summary.web_stories_this_month = sqlx::query(COUNT_WEBSTORIES)
                    .bind(since)
                    .fetch_one(p)
                    .await
                    .context("Failed to count webstories")?
                    .get("count");
                summary.categories_this_month = sqlx::query(COUNT_CATEGORIES)
                    .bind(since)
                    .fetch_one(p)
                    .await
                    .context("Failed to count categories")?
                    .get("count");
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{BannerRepository, SqlxBannerRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::CreateBannerInput;
    use chrono::Duration;

    #[tokio::test]
    async fn test_counts_only_recent_active_rows() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let banners = SqlxBannerRepository::new(pool.clone());
        let input = CreateBannerInput {
            image_url: None,
            text: Some("a".to_string()),
            link: None,
        };
        banners.create(&input, 0).await.unwrap();
        let gone = banners.create(&input, 1).await.unwrap();
        banners.soft_delete(gone.id).await.unwrap();

        let repo = SqlxDashboardRepository::new(pool);
        let summary = repo
            .created_since(Utc::now() - Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(summary.active_banners_this_month, 1);
        assert_eq!(summary.total_posts_this_month, 0);

        let future = repo
            .created_since(Utc::now() + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(future, MonthlySummary::default());
    }
}
