//! User repository
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for account storage
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL

use crate::db::{Backend, DynDatabasePool};
use crate::models::{CreateUserInput, ListParams, User, UserRole};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new account
    async fn create(&self, input: &CreateUserInput) -> Result<User>;

    /// Get user by ID, removed accounts included
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by email, removed accounts included
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Persist profile fields, role and flags
    async fn update(&self, user: &User) -> Result<User>;

    /// Replace the password hash and the must-change flag
    async fn set_password(&self, id: i64, password_hash: &str, must_change: bool) -> Result<()>;

    /// Flag the account as removed. Returns false when no row matched.
    async fn soft_delete(&self, id: i64) -> Result<bool>;

    /// Physically delete a row. Only used to roll back a half-finished signup.
    async fn hard_delete(&self, id: i64) -> Result<()>;

    /// Count every account
    async fn count(&self) -> Result<i64>;

    /// Non-removed accounts, newest first, filtered by email or name
    async fn list(&self, params: &ListParams) -> Result<(Vec<User>, i64)>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, job_role, role, \
                            must_change_password, removed, created_at, updated_at";

const INSERT_USER: &str = r#"
    INSERT INTO users (email, password_hash, first_name, last_name, job_role, role,
                       must_change_password, removed, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const UPDATE_USER: &str = r#"
    UPDATE users
    SET email = ?, first_name = ?, last_name = ?, job_role = ?, role = ?,
        must_change_password = ?, removed = ?, updated_at = ?
    WHERE id = ?
"#;

const SET_PASSWORD: &str =
    "UPDATE users SET password_hash = ?, must_change_password = ?, updated_at = ? WHERE id = ?";

const SOFT_DELETE_USER: &str = "UPDATE users SET removed = ?, updated_at = ? WHERE id = ?";

const LIST_FILTER: &str = "removed = ? AND (LOWER(email) LIKE ? ESCAPE '!' OR LOWER(first_name) LIKE ? ESCAPE '!' \
                           OR LOWER(last_name) LIKE ? ESCAPE '!')";

fn select_by(column: &str) -> String {
    format!("SELECT {} FROM users WHERE {} = ?", USER_COLUMNS, column)
}

fn list_query() -> String {
    format!(
        "SELECT {} FROM users WHERE {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        USER_COLUMNS, LIST_FILTER
    )
}

fn count_query() -> String {
    format!("SELECT COUNT(*) AS count FROM users WHERE {}", LIST_FILTER)
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, input: &CreateUserInput) -> Result<User> {
        match self.pool.backend() {
            Backend::Sqlite(p) => create_user_sqlite(p, input).await,
            Backend::Mysql(p) => create_user_mysql(p, input).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => get_user_by_id_sqlite(p, id).await,
            Backend::Mysql(p) => get_user_by_id_mysql(p, id).await,
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => get_user_by_email_sqlite(p, email).await,
            Backend::Mysql(p) => get_user_by_email_mysql(p, email).await,
        }
    }

    async fn update(&self, user: &User) -> Result<User> {
        match self.pool.backend() {
            Backend::Sqlite(p) => update_user_sqlite(p, user).await,
            Backend::Mysql(p) => update_user_mysql(p, user).await,
        }
    }

    async fn set_password(&self, id: i64, password_hash: &str, must_change: bool) -> Result<()> {
        let now = Utc::now();
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                sqlx::query(SET_PASSWORD)
                    .bind(password_hash)
                    .bind(must_change)
                    .bind(now)
                    .bind(id)
                    .execute(p)
                    .await
                    .context("Failed to update password")?;
            }
            Backend::Mysql(p) => {
                sqlx::query(SET_PASSWORD)
                    .bind(password_hash)
                    .bind(must_change)
                    .bind(now)
                    .bind(id)
                    .execute(p)
                    .await
                    .context("Failed to update password")?;
            }
        }
        Ok(())
    }

    async fn soft_delete(&self, id: i64) -> Result<bool> {
        let now = Utc::now();
        let affected = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(SOFT_DELETE_USER)
                .bind(true)
                .bind(now)
                .bind(id)
                .execute(p)
                .await
                .context("Failed to remove user")?
                .rows_affected(),
            Backend::Mysql(p) => sqlx::query(SOFT_DELETE_USER)
                .bind(true)
                .bind(now)
                .bind(id)
                .execute(p)
                .await
                .context("Failed to remove user")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn hard_delete(&self, id: i64) -> Result<()> {
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                sqlx::query("DELETE FROM users WHERE id = ?")
                    .bind(id)
                    .execute(p)
                    .await
                    .context("Failed to delete user")?;
            }
            Backend::Mysql(p) => {
                sqlx::query("DELETE FROM users WHERE id = ?")
                    .bind(id)
                    .execute(p)
                    .await
                    .context("Failed to delete user")?;
            }
        }
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        let row = match self.pool.backend() {
            Backend::Sqlite(p) => {
                let row = sqlx::query("SELECT COUNT(*) AS count FROM users")
                    .fetch_one(p)
                    .await
                    .context("Failed to count users")?;
                row.get::<i64, _>("count")
            }
            Backend::Mysql(p) => {
                let row = sqlx::query("SELECT COUNT(*) AS count FROM users")
                    .fetch_one(p)
                    .await
                    .context("Failed to count users")?;
                row.get::<i64, _>("count")
            }
        };
        Ok(row)
    }

    async fn list(&self, params: &ListParams) -> Result<(Vec<User>, i64)> {
        match self.pool.backend() {
            Backend::Sqlite(p) => list_users_sqlite(p, params).await,
            Backend::Mysql(p) => list_users_mysql(p, params).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(pool: &SqlitePool, input: &CreateUserInput) -> Result<User> {
    let now = Utc::now();
    let result = sqlx::query(INSERT_USER)
        .bind(&input.email)
        .bind(&input.password_hash)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.job_role)
        .bind(input.role.to_string())
        .bind(input.must_change_password)
        .bind(false)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create user")?;

    get_user_by_id_sqlite(pool, result.last_insert_rowid())
        .await?
        .context("User not found after insert")
}

async fn get_user_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(&select_by("id"))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;
    row.as_ref().map(row_to_user_sqlite).transpose()
}

async fn get_user_by_email_sqlite(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let row = sqlx::query(&select_by("email"))
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by email")?;
    row.as_ref().map(row_to_user_sqlite).transpose()
}

async fn update_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    sqlx::query(UPDATE_USER)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.job_role)
        .bind(user.role.to_string())
        .bind(user.must_change_password)
        .bind(user.removed)
        .bind(Utc::now())
        .bind(user.id)
        .execute(pool)
        .await
        .context("Failed to update user")?;

    get_user_by_id_sqlite(pool, user.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("User not found after update"))
}

async fn list_users_sqlite(pool: &SqlitePool, params: &ListParams) -> Result<(Vec<User>, i64)> {
    let pattern = params.like_pattern();
    let rows = sqlx::query(&list_query())
        .bind(false)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list users")?;

    let total: i64 = sqlx::query(&count_query())
        .bind(false)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .fetch_one(pool)
        .await
        .context("Failed to count users")?
        .get("count");

    let users = rows.iter().map(row_to_user_sqlite).collect::<Result<Vec<_>>>()?;
    Ok((users, total))
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    let role_str: String = row.get("role");
    let role = UserRole::from_str(&role_str)
        .with_context(|| format!("Invalid role in database: {}", role_str))?;

    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        job_role: row.get("job_role"),
        role,
        must_change_password: row.get("must_change_password"),
        removed: row.get("removed"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(pool: &MySqlPool, input: &CreateUserInput) -> Result<User> {
    let now = Utc::now();
    let result = sqlx::query(INSERT_USER)
        .bind(&input.email)
        .bind(&input.password_hash)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.job_role)
        .bind(input.role.to_string())
        .bind(input.must_change_password)
        .bind(false)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create user")?;

    get_user_by_id_mysql(pool, result.last_insert_id() as i64)
        .await?
        .context("User not found after insert")
}

async fn get_user_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(&select_by("id"))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;
    row.as_ref().map(row_to_user_mysql).transpose()
}

async fn get_user_by_email_mysql(pool: &MySqlPool, email: &str) -> Result<Option<User>> {
    let row = sqlx::query(&select_by("email"))
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by email")?;
    row.as_ref().map(row_to_user_mysql).transpose()
}

async fn update_user_mysql(pool: &MySqlPool, user: &User) -> Result<User> {
    sqlx::query(UPDATE_USER)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.job_role)
        .bind(user.role.to_string())
        .bind(user.must_change_password)
        .bind(user.removed)
        .bind(Utc::now())
        .bind(user.id)
        .execute(pool)
        .await
        .context("Failed to update user")?;

    get_user_by_id_mysql(pool, user.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("User not found after update"))
}

async fn list_users_mysql(pool: &MySqlPool, params: &ListParams) -> Result<(Vec<User>, i64)> {
    let pattern = params.like_pattern();
    let rows = sqlx::query(&list_query())
        .bind(false)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list users")?;

    let total: i64 = sqlx::query(&count_query())
        .bind(false)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .fetch_one(pool)
        .await
        .context("Failed to count users")?
        .get("count");

    let users = rows.iter().map(row_to_user_mysql).collect::<Result<Vec<_>>>()?;
    Ok((users, total))
}

fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> Result<User> {
    let role_str: String = row.get("role");
    let role = UserRole::from_str(&role_str)
        .with_context(|| format!("Invalid role in database: {}", role_str))?;

    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        job_role: row.get("job_role"),
        role,
        must_change_password: row.get("must_change_password"),
        removed: row.get("removed"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
