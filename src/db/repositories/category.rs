//! Category repository

use crate::db::{Backend, DynDatabasePool};
use crate::models::{Category, CreateCategoryInput, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Insert a category at the given position
    async fn create(&self, input: &CreateCategoryInput, sort_order: i64) -> Result<Category>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>>;

    /// Any row, removed ones included, holding `name` or `slug`, other than `exclude_id`
    async fn find_conflict(
        &self,
        name: &str,
        slug: &str,
        exclude_id: Option<i64>,
    ) -> Result<Option<Category>>;

    async fn update(&self, category: &Category) -> Result<Category>;

    async fn soft_delete(&self, id: i64) -> Result<bool>;

    /// Non-removed categories by position, then name
    async fn list(&self, params: &ListParams) -> Result<(Vec<Category>, i64)>;
}

pub struct SqlxCategoryRepository {
    pool: DynDatabasePool,
}

impl SqlxCategoryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CategoryRepository> {
        Arc::new(Self::new(pool))
    }
}

const CATEGORY_COLUMNS: &str = "id, name, slug, description, parent_id, sort_order, is_visible, \
                                color, is_featured, thumbnail_url, removed, created_at, updated_at";

const INSERT_CATEGORY: &str = r#"
    INSERT INTO categories (name, slug, description, parent_id, sort_order, is_visible, color,
                            is_featured, thumbnail_url, removed, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const UPDATE_CATEGORY: &str = r#"
    UPDATE categories
    SET name = ?, slug = ?, description = ?, color = ?, is_featured = ?, is_visible = ?,
        thumbnail_url = ?, updated_at = ?
    WHERE id = ?
"#;

const SOFT_DELETE_CATEGORY: &str =
    "UPDATE categories SET removed = ?, updated_at = ? WHERE id = ? AND removed = ?";

const COUNT_CATEGORIES: &str =
    "SELECT COUNT(*) AS count FROM categories WHERE removed = ? AND LOWER(name) LIKE ? ESCAPE '!'";

fn select_by_id() -> String {
    format!("SELECT {} FROM categories WHERE id = ?", CATEGORY_COLUMNS)
}

fn conflict_query() -> String {
    format!(
        "SELECT {} FROM categories WHERE (name = ? OR slug = ?) AND id <> ? LIMIT 1",
        CATEGORY_COLUMNS
    )
}

fn list_query() -> String {
    format!(
        "SELECT {} FROM categories WHERE removed = ? AND LOWER(name) LIKE ? ESCAPE '!' \
         ORDER BY sort_order ASC, name ASC LIMIT ? OFFSET ?",
        CATEGORY_COLUMNS
    )
}

#[async_trait]
impl CategoryRepository for SqlxCategoryRepository {
    async fn create(&self, input: &CreateCategoryInput, sort_order: i64) -> Result<Category> {
        match self.pool.backend() {
            Backend::Sqlite(p) => create_category_sqlite(p, input, sort_order).await,
            Backend::Mysql(p) => create_category_mysql(p, input, sort_order).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => get_category_sqlite(p, id).await,
            Backend::Mysql(p) => get_category_mysql(p, id).await,
        }
    }

    async fn find_conflict(
        &self,
        name: &str,
        slug: &str,
        exclude_id: Option<i64>,
    ) -> Result<Option<Category>> {
        let sql = conflict_query();
        let exclude = exclude_id.unwrap_or(0);
        match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(&sql)
                .bind(name)
                .bind(slug)
                .bind(exclude)
                .fetch_optional(p)
                .await
                .context("Failed to check category uniqueness")?
                .as_ref()
                .map(row_to_category_sqlite)
                .transpose(),
            Backend::Mysql(p) => sqlx::query(&sql)
                .bind(name)
                .bind(slug)
                .bind(exclude)
                .fetch_optional(p)
                .await
                .context("Failed to check category uniqueness")?
                .as_ref()
                .map(row_to_category_mysql)
                .transpose(),
        }
    }

    async fn update(&self, category: &Category) -> Result<Category> {
        match self.pool.backend() {
            Backend::Sqlite(p) => update_category_sqlite(p, category).await,
            Backend::Mysql(p) => update_category_mysql(p, category).await,
        }
    }

    async fn soft_delete(&self, id: i64) -> Result<bool> {
        let now = Utc::now();
        let affected = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(SOFT_DELETE_CATEGORY)
                .bind(true)
                .bind(now)
                .bind(id)
                .bind(false)
                .execute(p)
                .await
                .context("Failed to remove category")?
                .rows_affected(),
            Backend::Mysql(p) => sqlx::query(SOFT_DELETE_CATEGORY)
                .bind(true)
                .bind(now)
                .bind(id)
                .bind(false)
                .execute(p)
                .await
                .context("Failed to remove category")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn list(&self, params: &ListParams) -> Result<(Vec<Category>, i64)> {
        match self.pool.backend() {
            Backend::Sqlite(p) => list_categories_sqlite(p, params).await,
            Backend::Mysql(p) => list_categories_mysql(p, params).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_category_sqlite(
    pool: &SqlitePool,
    input: &CreateCategoryInput,
    sort_order: i64,
) -> Result<Category> {
    let now = Utc::now();
    let result = sqlx::query(INSERT_CATEGORY)
        .bind(&input.name)
        .bind(&input.slug)
        .bind(&input.description)
        .bind(input.parent_id)
        .bind(sort_order)
        .bind(input.is_visible.unwrap_or(true))
        .bind(&input.color)
        .bind(input.is_featured.unwrap_or(false))
        .bind(&input.thumbnail_url)
        .bind(false)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create category")?;

    get_category_sqlite(pool, result.last_insert_rowid())
        .await?
        .context("Category not found after insert")
}

async fn get_category_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Category>> {
    let row = sqlx::query(&select_by_id())
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get category")?;
    row.as_ref().map(row_to_category_sqlite).transpose()
}

async fn update_category_sqlite(pool: &SqlitePool, category: &Category) -> Result<Category> {
    sqlx::query(UPDATE_CATEGORY)
        .bind(&category.name)
        .bind(&category.slug)
        .bind(&category.description)
        .bind(&category.color)
        .bind(category.is_featured)
        .bind(category.is_visible)
        .bind(&category.thumbnail_url)
        .bind(Utc::now())
        .bind(category.id)
        .execute(pool)
        .await
        .context("Failed to update category")?;

    get_category_sqlite(pool, category.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Category not found after update"))
}

async fn list_categories_sqlite(
    pool: &SqlitePool,
    params: &ListParams,
) -> Result<(Vec<Category>, i64)> {
    let pattern = params.like_pattern();
    let rows = sqlx::query(&list_query())
        .bind(false)
        .bind(&pattern)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list categories")?;
    let total: i64 = sqlx::query(COUNT_CATEGORIES)
        .bind(false)
        .bind(&pattern)
        .fetch_one(pool)
        .await
        .context("Failed to count categories")?
        .get("count");
    let categories = rows
        .iter()
        .map(row_to_category_sqlite)
        .collect::<Result<Vec<_>>>()?;
    Ok((categories, total))
}

fn row_to_category_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Category> {
    Ok(Category {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        description: row.get("description"),
        parent_id: row.get("parent_id"),
        sort_order: row.get("sort_order"),
        is_visible: row.get("is_visible"),
        color: row.get("color"),
        is_featured: row.get("is_featured"),
        thumbnail_url: row.get("thumbnail_url"),
        removed: row.get("removed"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_category_mysql(
    pool: &MySqlPool,
    input: &CreateCategoryInput,
    sort_order: i64,
) -> Result<Category> {
    let now = Utc::now();
    let result = sqlx::query(INSERT_CATEGORY)
        .bind(&input.name)
        .bind(&input.slug)
        .bind(&input.description)
        .bind(input.parent_id)
        .bind(sort_order)
        .bind(input.is_visible.unwrap_or(true))
        .bind(&input.color)
        .bind(input.is_featured.unwrap_or(false))
        .bind(&input.thumbnail_url)
        .bind(false)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create category")?;

    get_category_mysql(pool, result.last_insert_id() as i64)
        .await?
        .context("Category not found after insert")
}

async fn get_category_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Category>> {
    let row = sqlx::query(&select_by_id())
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get category")?;
    row.as_ref().map(row_to_category_mysql).transpose()
}

async fn update_category_mysql(pool: &MySqlPool, category: &Category) -> Result<Category> {
    sqlx::query(UPDATE_CATEGORY)
        .bind(&category.name)
        .bind(&category.slug)
        .bind(&category.description)
        .bind(&category.color)
        .bind(category.is_featured)
        .bind(category.is_visible)
        .bind(&category.thumbnail_url)
        .bind(Utc::now())
        .bind(category.id)
        .execute(pool)
        .await
        .context("Failed to update category")?;

    get_category_mysql(pool, category.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Category not found after update"))
}

async fn list_categories_mysql(
    pool: &MySqlPool,
    params: &ListParams,
) -> Result<(Vec<Category>, i64)> {
    let pattern = params.like_pattern();
    let rows = sqlx::query(&list_query())
        .bind(false)
        .bind(&pattern)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list categories")?;
    let total: i64 = sqlx::query(COUNT_CATEGORIES)
        .bind(false)
        .bind(&pattern)
        .fetch_one(pool)
        .await
        .context("Failed to count categories")?
        .get("count");
    let categories = rows
        .iter()
        .map(row_to_category_mysql)
        .collect::<Result<Vec<_>>>()?;
    Ok((categories, total))
}

fn row_to_category_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Category> {
    Ok(Category {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        description: row.get("description"),
        parent_id: row.get("parent_id"),
        sort_order: row.get("sort_order"),
        is_visible: row.get("is_visible"),
        color: row.get("color"),
        is_featured: row.get("is_featured"),
        thumbnail_url: row.get("thumbnail_url"),
        removed: row.get("removed"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
