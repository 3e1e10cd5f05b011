//! User and invitation models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A back-office or reader account.
///
/// Accounts are never deleted through the API. `removed` hides them from
/// listings and blocks login.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub email: String,
    /// Argon2 PHC string
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub job_role: Option<String>,
    pub role: UserRole,
    pub must_change_password: bool,
    pub removed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Admins and main editors manage the newsroom staff
    pub fn is_staff_manager(&self) -> bool {
        matches!(self.role, UserRole::Admin | UserRole::MainEditor)
    }

    /// Roles allowed to write posts
    pub fn can_write(&self) -> bool {
        matches!(
            self.role,
            UserRole::Admin | UserRole::MainEditor | UserRole::Editor
        )
    }
}

/// Account role, stored and serialized in upper case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Admin,
    MainEditor,
    Editor,
    Reader,
}

impl Default for UserRole {
    fn default() -> Self {
        Self::Editor
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Admin => write!(f, "ADMIN"),
            UserRole::MainEditor => write!(f, "MAIN_EDITOR"),
            UserRole::Editor => write!(f, "EDITOR"),
            UserRole::Reader => write!(f, "READER"),
        }
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ADMIN" => Ok(UserRole::Admin),
            "MAIN_EDITOR" => Ok(UserRole::MainEditor),
            "EDITOR" => Ok(UserRole::Editor),
            "READER" => Ok(UserRole::Reader),
            _ => Err(anyhow::anyhow!("Invalid user role: {}", s)),
        }
    }
}

/// Fields for inserting a user. The password is already hashed.
#[derive(Debug, Clone)]
pub struct CreateUserInput {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub job_role: Option<String>,
    pub role: UserRole,
    pub must_change_password: bool,
}

/// Partial profile update from the staff management screen
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserInput {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<UserRole>,
}

impl UpdateUserInput {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.role.is_none()
    }
}

/// Lifecycle of an invitation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteStatus {
    Pending,
    Accepted,
    Expired,
}

impl fmt::Display for InviteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InviteStatus::Pending => write!(f, "pending"),
            InviteStatus::Accepted => write!(f, "accepted"),
            InviteStatus::Expired => write!(f, "expired"),
        }
    }
}

impl FromStr for InviteStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(InviteStatus::Pending),
            "accepted" => Ok(InviteStatus::Accepted),
            "expired" => Ok(InviteStatus::Expired),
            _ => Err(anyhow::anyhow!("Invalid invite status: {}", s)),
        }
    }
}

/// Invitation for a staff member to create their account
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInvite {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub invitation_token: String,
    pub role: UserRole,
    pub status: InviteStatus,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserInvite {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    pub fn is_consumed(&self) -> bool {
        self.used || self.status == InviteStatus::Accepted
    }

    /// Status as reported to clients: a pending invite past its expiry is `expired`
    pub fn effective_status(&self, now: DateTime<Utc>) -> InviteStatus {
        if self.status == InviteStatus::Pending && self.is_expired(now) {
            InviteStatus::Expired
        } else {
            self.status
        }
    }
}

/// Fields for inserting a fresh invite
#[derive(Debug, Clone)]
pub struct CreateInviteInput {
    pub email: String,
    pub invitation_token: String,
    pub role: UserRole,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn invite(status: InviteStatus, expires_in: i64, used: bool) -> UserInvite {
        let now = Utc::now();
        UserInvite {
            id: 1,
            email: "new@newsroom.test".to_string(),
            invitation_token: "token".to_string(),
            role: UserRole::Editor,
            status,
            expires_at: now + Duration::seconds(expires_in),
            used,
            accepted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_user_role_display_and_parse() {
        assert_eq!(UserRole::MainEditor.to_string(), "MAIN_EDITOR");
        assert_eq!(UserRole::from_str("main_editor").unwrap(), UserRole::MainEditor);
        assert_eq!(UserRole::from_str("READER").unwrap(), UserRole::Reader);
        assert!(UserRole::from_str("author").is_err());
    }

    #[test]
    fn test_user_role_serde_uses_upper_case() {
        let json = serde_json::to_string(&UserRole::MainEditor).unwrap();
        assert_eq!(json, "\"MAIN_EDITOR\"");
        let role: UserRole = serde_json::from_str("\"ADMIN\"").unwrap();
        assert_eq!(role, UserRole::Admin);
    }

    #[test]
    fn test_effective_status_reports_expired() {
        let now = Utc::now();
        assert_eq!(
            invite(InviteStatus::Pending, -10, false).effective_status(now),
            InviteStatus::Expired
        );
        assert_eq!(
            invite(InviteStatus::Pending, 600, false).effective_status(now),
            InviteStatus::Pending
        );
        assert_eq!(
            invite(InviteStatus::Accepted, -10, true).effective_status(now),
            InviteStatus::Accepted
        );
    }

    #[test]
    fn test_consumed_invite() {
        assert!(invite(InviteStatus::Pending, 600, true).is_consumed());
        assert!(invite(InviteStatus::Accepted, 600, false).is_consumed());
        assert!(!invite(InviteStatus::Pending, 600, false).is_consumed());
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let now = Utc::now();
        let user = User {
            id: 7,
            email: "ed@newsroom.test".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            first_name: "Ed".to_string(),
            last_name: "Itor".to_string(),
            job_role: None,
            role: UserRole::Editor,
            must_change_password: false,
            removed: false,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["firstName"], "Ed");
        assert_eq!(user.full_name(), "Ed Itor");
        assert!(user.can_write());
        assert!(!user.is_staff_manager());
        assert!(!user.is_admin());

        let reader = User {
            role: UserRole::Reader,
            ..user
        };
        assert!(!reader.can_write());
    }
}
