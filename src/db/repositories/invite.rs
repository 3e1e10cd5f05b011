//! User invitation repository

use crate::db::{Backend, DynDatabasePool};
use crate::models::{CreateInviteInput, InviteStatus, ListParams, UserInvite, UserRole};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

#[async_trait]
pub trait InviteRepository: Send + Sync {
    async fn create(&self, input: &CreateInviteInput) -> Result<UserInvite>;

    async fn get_by_id(&self, id: i64) -> Result<Option<UserInvite>>;

    async fn get_by_token(&self, token: &str) -> Result<Option<UserInvite>>;

    /// Pending, unused, unexpired invite for an email, if any
    async fn find_open_for_email(&self, email: &str, now: DateTime<Utc>)
        -> Result<Option<UserInvite>>;

    /// Issue a fresh token and expiry, putting the invite back to pending
    async fn refresh(&self, id: i64, token: &str, expires_at: DateTime<Utc>) -> Result<UserInvite>;

    /// Mark the invite consumed
    async fn mark_accepted(&self, id: i64, at: DateTime<Utc>) -> Result<()>;

    /// Undo `mark_accepted`
    async fn reset_pending(&self, id: i64) -> Result<()>;

    /// Invites, newest first, filtered by email
    async fn list(&self, params: &ListParams) -> Result<(Vec<UserInvite>, i64)>;
}

pub struct SqlxInviteRepository {
    pool: DynDatabasePool,
}

impl SqlxInviteRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn InviteRepository> {
        Arc::new(Self::new(pool))
    }
}

const INVITE_COLUMNS: &str = "id, email, invitation_token, role, status, expires_at, used, \
                              accepted_at, created_at, updated_at";

const INSERT_INVITE: &str = r#"
    INSERT INTO user_invites (email, invitation_token, role, status, expires_at, used,
                              accepted_at, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, NULL, ?, ?)
"#;

const REFRESH_INVITE: &str = r#"
    UPDATE user_invites
    SET invitation_token = ?, expires_at = ?, status = ?, used = ?, accepted_at = NULL, updated_at = ?
    WHERE id = ?
"#;

const ACCEPT_INVITE: &str =
    "UPDATE user_invites SET status = ?, used = ?, accepted_at = ?, updated_at = ? WHERE id = ?";

const RESET_INVITE: &str =
    "UPDATE user_invites SET status = ?, used = ?, accepted_at = NULL, updated_at = ? WHERE id = ?";

/// Lookup key for a single invite
#[derive(Clone, Copy)]
enum InviteKey<'a> {
    Id(i64),
    Token(&'a str),
}

impl InviteKey<'_> {
    fn column(&self) -> &'static str {
        match self {
            InviteKey::Id(_) => "id",
            InviteKey::Token(_) => "invitation_token",
        }
    }
}

fn select_by(column: &str) -> String {
    format!("SELECT {} FROM user_invites WHERE {} = ?", INVITE_COLUMNS, column)
}

fn open_for_email_query() -> String {
    format!(
        "SELECT {} FROM user_invites WHERE email = ? AND status = ? AND used = ? AND expires_at >= ? \
         ORDER BY id DESC LIMIT 1",
        INVITE_COLUMNS
    )
}

fn list_query() -> String {
    format!(
        "SELECT {} FROM user_invites WHERE LOWER(email) LIKE ? ESCAPE '!' \
         ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        INVITE_COLUMNS
    )
}

const COUNT_INVITES: &str = "SELECT COUNT(*) AS count FROM user_invites WHERE LOWER(email) LIKE ? ESCAPE '!'";

#[async_trait]
impl InviteRepository for SqlxInviteRepository {
    async fn create(&self, input: &CreateInviteInput) -> Result<UserInvite> {
        let now = Utc::now();
        let invite = match self.pool.backend() {
            Backend::Sqlite(p) => {
                let result = sqlx::query(INSERT_INVITE)
                    .bind(&input.email)
                    .bind(&input.invitation_token)
                    .bind(input.role.to_string())
                    .bind(InviteStatus::Pending.to_string())
                    .bind(input.expires_at)
                    .bind(false)
                    .bind(now)
                    .bind(now)
                    .execute(p)
                    .await
                    .context("Failed to create invite")?;
                get_invite_sqlite(p, InviteKey::Id(result.last_insert_rowid())).await?
            }
            Backend::Mysql(p) => {
                let result = sqlx::query(INSERT_INVITE)
                    .bind(&input.email)
                    .bind(&input.invitation_token)
                    .bind(input.role.to_string())
                    .bind(InviteStatus::Pending.to_string())
                    .bind(input.expires_at)
                    .bind(false)
                    .bind(now)
                    .bind(now)
                    .execute(p)
                    .await
                    .context("Failed to create invite")?;
                get_invite_mysql(p, InviteKey::Id(result.last_insert_id() as i64)).await?
            }
        };
        invite.context("Invite not found after insert")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<UserInvite>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => get_invite_sqlite(p, InviteKey::Id(id)).await,
            Backend::Mysql(p) => get_invite_mysql(p, InviteKey::Id(id)).await,
        }
    }

    async fn get_by_token(&self, token: &str) -> Result<Option<UserInvite>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => get_invite_sqlite(p, InviteKey::Token(token)).await,
            Backend::Mysql(p) => get_invite_mysql(p, InviteKey::Token(token)).await,
        }
    }

    async fn find_open_for_email(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserInvite>> {
        let sql = open_for_email_query();
        let pending = InviteStatus::Pending.to_string();
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                let row = sqlx::query(&sql)
                    .bind(email)
                    .bind(&pending)
                    .bind(false)
                    .bind(now)
                    .fetch_optional(p)
                    .await
                    .context("Failed to look up open invite")?;
                row.as_ref().map(row_to_invite_sqlite).transpose()
            }
            Backend::Mysql(p) => {
                let row = sqlx::query(&sql)
                    .bind(email)
                    .bind(&pending)
                    .bind(false)
                    .bind(now)
                    .fetch_optional(p)
                    .await
                    .context("Failed to look up open invite")?;
                row.as_ref().map(row_to_invite_mysql).transpose()
            }
        }
    }

    async fn refresh(&self, id: i64, token: &str, expires_at: DateTime<Utc>) -> Result<UserInvite> {
        let pending = InviteStatus::Pending.to_string();
        let now = Utc::now();
        let invite = match self.pool.backend() {
            Backend::Sqlite(p) => {
                sqlx::query(REFRESH_INVITE)
                    .bind(token)
                    .bind(expires_at)
                    .bind(&pending)
                    .bind(false)
                    .bind(now)
                    .bind(id)
                    .execute(p)
                    .await
                    .context("Failed to refresh invite")?;
                get_invite_sqlite(p, InviteKey::Id(id)).await?
            }
            Backend::Mysql(p) => {
                sqlx::query(REFRESH_INVITE)
                    .bind(token)
                    .bind(expires_at)
                    .bind(&pending)
                    .bind(false)
                    .bind(now)
                    .bind(id)
                    .execute(p)
                    .await
                    .context("Failed to refresh invite")?;
                get_invite_mysql(p, InviteKey::Id(id)).await?
            }
        };
        invite.ok_or_else(|| anyhow::anyhow!("Invite not found after refresh"))
    }

    async fn mark_accepted(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        let accepted = InviteStatus::Accepted.to_string();
        let affected = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(ACCEPT_INVITE)
                .bind(&accepted)
                .bind(true)
                .bind(at)
                .bind(at)
                .bind(id)
                .execute(p)
                .await
                .context("Failed to mark invite accepted")?
                .rows_affected(),
            Backend::Mysql(p) => sqlx::query(ACCEPT_INVITE)
                .bind(&accepted)
                .bind(true)
                .bind(at)
                .bind(at)
                .bind(id)
                .execute(p)
                .await
                .context("Failed to mark invite accepted")?
                .rows_affected(),
        };
        if affected == 0 {
            anyhow::bail!("Invite {} disappeared while being accepted", id);
        }
        Ok(())
    }

    async fn reset_pending(&self, id: i64) -> Result<()> {
        let pending = InviteStatus::Pending.to_string();
        let now = Utc::now();
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                sqlx::query(RESET_INVITE)
                    .bind(&pending)
                    .bind(false)
                    .bind(now)
                    .bind(id)
                    .execute(p)
                    .await
                    .context("Failed to reset invite")?;
            }
            Backend::Mysql(p) => {
                sqlx::query(RESET_INVITE)
                    .bind(&pending)
                    .bind(false)
                    .bind(now)
                    .bind(id)
                    .execute(p)
                    .await
                    .context("Failed to reset invite")?;
            }
        }
        Ok(())
    }

    async fn list(&self, params: &ListParams) -> Result<(Vec<UserInvite>, i64)> {
        let pattern = params.like_pattern();
        let sql = list_query();
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                let rows = sqlx::query(&sql)
                    .bind(&pattern)
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(p)
                    .await
                    .context("Failed to list invites")?;
                let total: i64 = sqlx::query(COUNT_INVITES)
                    .bind(&pattern)
                    .fetch_one(p)
                    .await
                    .context("Failed to count invites")?
                    .get("count");
                let invites = rows.iter().map(row_to_invite_sqlite).collect::<Result<Vec<_>>>()?;
                Ok((invites, total))
            }
            Backend::Mysql(p) => {
                let rows = sqlx::query(&sql)
                    .bind(&pattern)
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(p)
                    .await
                    .context("Failed to list invites")?;
                let total: i64 = sqlx::query(COUNT_INVITES)
                    .bind(&pattern)
                    .fetch_one(p)
                    .await
                    .context("Failed to count invites")?
                    .get("count");
                let invites = rows.iter().map(row_to_invite_mysql).collect::<Result<Vec<_>>>()?;
                Ok((invites, total))
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn get_invite_sqlite(pool: &SqlitePool, key: InviteKey<'_>) -> Result<Option<UserInvite>> {
    let sql = select_by(key.column());
    let query = match key {
        InviteKey::Id(id) => sqlx::query(&sql).bind(id),
        InviteKey::Token(token) => sqlx::query(&sql).bind(token),
    };
    let row = query
        .fetch_optional(pool)
        .await
        .context("Failed to get invite")?;
    row.as_ref().map(row_to_invite_sqlite).transpose()
}

fn row_to_invite_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<UserInvite> {
    let role: String = row.get("role");
    let status: String = row.get("status");
    Ok(UserInvite {
        id: row.get("id"),
        email: row.get("email"),
        invitation_token: row.get("invitation_token"),
        role: UserRole::from_str(&role)?,
        status: InviteStatus::from_str(&status)?,
        expires_at: row.get("expires_at"),
        used: row.get("used"),
        accepted_at: row.get("accepted_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn get_invite_mysql(pool: &MySqlPool, key: InviteKey<'_>) -> Result<Option<UserInvite>> {
    let sql = select_by(key.column());
    let query = match key {
        InviteKey::Id(id) => sqlx::query(&sql).bind(id),
        InviteKey::Token(token) => sqlx::query(&sql).bind(token),
    };
    let row = query
        .fetch_optional(pool)
        .await
        .context("Failed to get invite")?;
    row.as_ref().map(row_to_invite_mysql).transpose()
}

fn row_to_invite_mysql(row: &sqlx::mysql::MySqlRow) -> Result<UserInvite> {
    let role: String = row.get("role");
    let status: String = row.get("status");
    Ok(UserInvite {
        id: row.get("id"),
        email: row.get("email"),
        invitation_token: row.get("invitation_token"),
        role: UserRole::from_str(&role)?,
        status: InviteStatus::from_str(&status)?,
        expires_at: row.get("expires_at"),
        used: row.get("used"),
        accepted_at: row.get("accepted_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
