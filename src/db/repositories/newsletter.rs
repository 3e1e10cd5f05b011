//! Newsletter subscription repository

use crate::db::{Backend, DynDatabasePool};
use crate::models::NewsletterSubscription;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait NewsletterRepository: Send + Sync {
    async fn get_by_email(&self, email: &str) -> Result<Option<NewsletterSubscription>>;

    async fn create(&self, name: &str, email: &str) -> Result<NewsletterSubscription>;
}

pub struct SqlxNewsletterRepository {
    pool: DynDatabasePool,
}

impl SqlxNewsletterRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn NewsletterRepository> {
        Arc::new(Self::new(pool))
    }
}

const SELECT_BY_EMAIL: &str =
    "SELECT id, name, email, created_at FROM newsletter_subscriptions WHERE email = ?";

const INSERT_SUBSCRIPTION: &str =
    "INSERT INTO newsletter_subscriptions (name, email, created_at) VALUES (?, ?, ?)";

macro_rules! row_to_subscription {
    ($row:expr) => {
        NewsletterSubscription {
            id: $row.get("id"),
            name: $row.get("name"),
            email: $row.get("email"),
            created_at: $row.get("created_at"),
        }
    };
}

#[async_trait]
impl NewsletterRepository for SqlxNewsletterRepository {
    async fn get_by_email(&self, email: &str) -> Result<Option<NewsletterSubscription>> {
        let subscription = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(SELECT_BY_EMAIL)
                .bind(email)
                .fetch_optional(p)
                .await
                .context("Failed to get subscription")?
                .map(|row| row_to_subscription!(row)),
            Backend::Mysql(p) => sqlx::query(SELECT_BY_EMAIL)
                .bind(email)
                .fetch_optional(p)
                .await
                .context("Failed to get subscription")?
                .map(|row| row_to_subscription!(row)),
        };
        Ok(subscription)
    }

    async fn create(&self, name: &str, email: &str) -> Result<NewsletterSubscription> {
        let now = Utc::now();
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                sqlx::query(INSERT_SUBSCRIPTION)
                    .bind(name)
                    .bind(email)
                    .bind(now)
                    .execute(p)
                    .await
                    .context("Failed to create subscription")?;
            }
            Backend::Mysql(p) => {
                sqlx::query(INSERT_SUBSCRIPTION)
                    .bind(name)
                    .bind(email)
                    .bind(now)
                    .execute(p)
                    .await
                    .context("Failed to create subscription")?;
            }
        }
        self.get_by_email(email)
            .await?
            .context("Subscription not found after insert")
    }
}
