//! Position storage for manually ordered lists
//!
//! Banners, categories, webstories and relevants carry a `sort_order`
//! column. This repository reads the live ordering of one of those tables
//! and writes a new one atomically.

use crate::db::{Backend, DynDatabasePool};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use std::fmt;
use std::sync::Arc;

/// Tables that take part in manual ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderedTable {
    Banners,
    Categories,
    Webstories,
    Relevants,
}

impl OrderedTable {
    pub fn table_name(&self) -> &'static str {
        match self {
            OrderedTable::Banners => "banners",
            OrderedTable::Categories => "categories",
            OrderedTable::Webstories => "webstories",
            OrderedTable::Relevants => "relevants",
        }
    }
}

impl fmt::Display for OrderedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// Row identity and current position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub id: i64,
    pub order: i64,
}

#[async_trait]
pub trait OrderingRepository: Send + Sync {
    /// Non-removed rows by (order asc, id asc)
    async fn positions(&self, table: OrderedTable) -> Result<Vec<Position>>;

    /// Write every given position in a single transaction
    async fn apply(&self, table: OrderedTable, positions: &[Position]) -> Result<()>;

    /// Position for a newly created row: highest existing order plus one
    async fn next_order(&self, table: OrderedTable) -> Result<i64>;
}

pub struct SqlxOrderingRepository {
    pool: DynDatabasePool,
}

impl SqlxOrderingRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn OrderingRepository> {
        Arc::new(Self::new(pool))
    }
}

fn positions_query(table: OrderedTable) -> String {
    format!(
        "SELECT id, sort_order FROM {} WHERE removed = ? ORDER BY sort_order ASC, id ASC",
        table.table_name()
    )
}

fn update_query(table: OrderedTable) -> String {
    format!("UPDATE {} SET sort_order = ? WHERE id = ?", table.table_name())
}

fn next_order_query(table: OrderedTable) -> String {
    format!(
        "SELECT COALESCE(MAX(sort_order) + 1, 0) AS next_order FROM {}",
        table.table_name()
    )
}

#[async_trait]
impl OrderingRepository for SqlxOrderingRepository {
    async fn positions(&self, table: OrderedTable) -> Result<Vec<Position>> {
        let sql = positions_query(table);
        let positions = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(&sql)
                .bind(false)
                .fetch_all(p)
                .await
                .with_context(|| format!("Failed to read {} ordering", table))?
                .iter()
                .map(|row| Position {
                    id: row.get("id"),
                    order: row.get("sort_order"),
                })
                .collect(),
            Backend::Mysql(p) => sqlx::query(&sql)
                .bind(false)
                .fetch_all(p)
                .await
                .with_context(|| format!("Failed to read {} ordering", table))?
                .iter()
                .map(|row| Position {
                    id: row.get("id"),
                    order: row.get("sort_order"),
                })
                .collect(),
        };
        Ok(positions)
    }

    async fn apply(&self, table: OrderedTable, positions: &[Position]) -> Result<()> {
        if positions.is_empty() {
            return Ok(());
        }
        let sql = update_query(table);
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                let mut tx = p.begin().await?;
                for position in positions {
                    sqlx::query(&sql)
                        .bind(position.order)
                        .bind(position.id)
                        .execute(&mut *tx)
                        .await
                        .with_context(|| format!("Failed to reorder {} row {}", table, position.id))?;
                }
                tx.commit().await.context("Failed to commit reorder")?;
            }
            Backend::Mysql(p) => {
                let mut tx = p.begin().await?;
                for position in positions {
                    sqlx::query(&sql)
                        .bind(position.order)
                        .bind(position.id)
                        .execute(&mut *tx)
                        .await
                        .with_context(|| format!("Failed to reorder {} row {}", table, position.id))?;
                }
                tx.commit().await.context("Failed to commit reorder")?;
            }
        }
        tracing::debug!("Rewrote {} position(s) in {}", positions.len(), table);
        Ok(())
    }

    async fn next_order(&self, table: OrderedTable) -> Result<i64> {
        let sql = next_order_query(table);
        let next: i64 = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(&sql)
                .fetch_one(p)
                .await
                .with_context(|| format!("Failed to compute next {} order", table))?
                .get("next_order"),
            Backend::Mysql(p) => sqlx::query(&sql)
                .fetch_one(p)
                .await
                .with_context(|| format!("Failed to compute next {} order", table))?
                .get("next_order"),
        };
        Ok(next)
    }
}
