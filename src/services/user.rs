//! User service
//!
//! Staff management: invitations, profile updates, soft deletion and the
//! bootstrap admin account.
//!
//! Role rules:
//! - nobody can be invited as ADMIN
//! - readers register themselves and are never invited
//! - a MAIN_EDITOR may only invite EDITORs and never grant ADMIN or MAIN_EDITOR
//! - a MAIN_EDITOR may not edit another ADMIN or MAIN_EDITOR account

use crate::config::AuthConfig;
use crate::db::repositories::{InviteRepository, UserRepository};
use crate::models::{
    CreateInviteInput, CreateUserInput, ListParams, PagedResult, UpdateUserInput, User,
    UserInvite, UserRole,
};
use crate::services::email::EmailService;
use crate::services::error::AuthError;
use crate::services::password::hash_password;
use crate::services::validation::{is_valid_email, normalize_email};
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteUserInput {
    pub email: String,
    pub role: UserRole,
}

pub struct UserService {
    users: Arc<dyn UserRepository>,
    invites: Arc<dyn InviteRepository>,
    email: Arc<EmailService>,
    invite_ttl: Duration,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        invites: Arc<dyn InviteRepository>,
        email: Arc<EmailService>,
        config: &AuthConfig,
    ) -> Self {
        Self {
            users,
            invites,
            email,
            invite_ttl: Duration::seconds(config.invite_ttl_seconds as i64),
        }
    }

    pub async fn me(&self, user_id: i64) -> Result<User, AuthError> {
        self.find(user_id).await
    }

    pub async fn find(&self, id: i64) -> Result<User, AuthError> {
        match self.users.get_by_id(id).await? {
            Some(user) if !user.removed => Ok(user),
            _ => Err(AuthError::NotFound(format!("User {}", id))),
        }
    }

    /// Invite a staff member by email
    pub async fn invite(&self, inviter: &User, input: &InviteUserInput) -> Result<UserInvite, AuthError> {
        let email = normalize_email(&input.email);
        if !is_valid_email(&email) {
            return Err(AuthError::Validation("Invalid email".to_string()));
        }
        check_invite_role(inviter, input.role)?;

        if self.users.get_by_email(&email).await?.is_some() {
            return Err(AuthError::UserExists);
        }
        if self
            .invites
            .find_open_for_email(&email, Utc::now())
            .await?
            .is_some()
        {
            return Err(AuthError::AlreadyInvited);
        }

        let invite = self
            .invites
            .create(&CreateInviteInput {
                email,
                invitation_token: Uuid::new_v4().to_string(),
                role: input.role,
                expires_at: Utc::now() + self.invite_ttl,
            })
            .await?;
        self.email
            .send_invite(&invite.email, &invite.invitation_token)
            .await?;

        tracing::info!(invite_id = invite.id, inviter_id = inviter.id, role = %invite.role, "User invited");
        Ok(invite)
    }

    /// Issue a fresh token for an invite that has not been accepted
    pub async fn resend_invite(&self, inviter: &User, invite_id: i64) -> Result<UserInvite, AuthError> {
        let invite = self
            .invites
            .get_by_id(invite_id)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("Invite {}", invite_id)))?;
        check_invite_role(inviter, invite.role)?;
        if invite.is_consumed() {
            return Err(AuthError::InviteAlreadyUsed);
        }

        let refreshed = self
            .invites
            .refresh(
                invite.id,
                &Uuid::new_v4().to_string(),
                Utc::now() + self.invite_ttl,
            )
            .await?;
        self.email
            .send_invite(&refreshed.email, &refreshed.invitation_token)
            .await?;

        tracing::info!(invite_id = refreshed.id, "Invite resent");
        Ok(refreshed)
    }

    pub async fn list(&self, params: &ListParams) -> Result<PagedResult<User>, AuthError> {
        let (users, total) = self.users.list(params).await?;
        Ok(PagedResult::new(users, total, params))
    }

    /// Invites with expired pending ones reported as `expired`
    pub async fn list_invited(&self, params: &ListParams) -> Result<PagedResult<UserInvite>, AuthError> {
        let (invites, total) = self.invites.list(params).await?;
        let now = Utc::now();
        Ok(PagedResult::new(invites, total, params).map(|mut invite| {
            invite.status = invite.effective_status(now);
            invite
        }))
    }

    pub async fn update(&self, editor: &User, id: i64, input: &UpdateUserInput) -> Result<User, AuthError> {
        let mut user = self.find(id).await?;

        if editor.role == UserRole::MainEditor
            && user.id != editor.id
            && matches!(user.role, UserRole::Admin | UserRole::MainEditor)
        {
            return Err(AuthError::Forbidden("ROLE_NOT_ALLOWED".to_string()));
        }
        if let Some(role) = input.role {
            if editor.role == UserRole::MainEditor
                && matches!(role, UserRole::Admin | UserRole::MainEditor)
            {
                return Err(AuthError::Forbidden("ROLE_NOT_ALLOWED".to_string()));
            }
            user.role = role;
        }
        if let Some(email) = &input.email {
            let email = normalize_email(email);
            if !is_valid_email(&email) {
                return Err(AuthError::Validation("Invalid email".to_string()));
            }
            if email != user.email {
                if let Some(other) = self.users.get_by_email(&email).await? {
                    if other.id != user.id {
                        return Err(AuthError::UserExists);
                    }
                }
                user.email = email;
            }
        }
        if let Some(first_name) = &input.first_name {
            user.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = &input.last_name {
            user.last_name = last_name.trim().to_string();
        }

        let updated = self.users.update(&user).await?;
        tracing::info!(user_id = updated.id, editor_id = editor.id, "User updated");
        Ok(updated)
    }

    pub async fn soft_delete(&self, actor: &User, id: i64) -> Result<(), AuthError> {
        if actor.id == id {
            return Err(AuthError::Validation("CANNOT_DELETE_SELF".to_string()));
        }
        if !self.users.soft_delete(id).await? {
            return Err(AuthError::NotFound(format!("User {}", id)));
        }
        tracing::info!(user_id = id, actor_id = actor.id, "User removed");
        Ok(())
    }

    /// Create the bootstrap admin when the users table is empty.
    ///
    /// Returns the created account, or `None` when users already exist.
    pub async fn seed_admin(&self, config: &AuthConfig) -> Result<Option<User>, AuthError> {
        if self.users.count().await? > 0 {
            return Ok(None);
        }
        let admin = self
            .users
            .create(&CreateUserInput {
                email: normalize_email(&config.seed_admin_email),
                password_hash: hash_password(&config.seed_admin_password)?,
                first_name: "Admin".to_string(),
                last_name: String::new(),
                job_role: None,
                role: UserRole::Admin,
                must_change_password: true,
            })
            .await?;
        tracing::info!(email = %admin.email, "Seeded admin account");
        Ok(Some(admin))
    }
}

fn check_invite_role(inviter: &User, role: UserRole) -> Result<(), AuthError> {
    match role {
        UserRole::Admin => Err(AuthError::Forbidden("ADMIN_CANNOT_BE_INVITED".to_string())),
        UserRole::Reader => Err(AuthError::Validation("READER_CANNOT_BE_INVITED".to_string())),
        UserRole::MainEditor if inviter.role == UserRole::MainEditor => {
            Err(AuthError::Forbidden("ROLE_NOT_ALLOWED".to_string()))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxInviteRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::InviteStatus;
    use crate::services::email::RecordingMailer;

    struct Harness {
        users: Arc<dyn UserRepository>,
        invites: Arc<dyn InviteRepository>,
        mailer: Arc<RecordingMailer>,
        service: UserService,
    }

    async fn setup() -> Harness {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let users = SqlxUserRepository::boxed(pool.clone());
        let invites = SqlxInviteRepository::boxed(pool);
        let mailer = Arc::new(RecordingMailer::new());
        let config = AuthConfig::default();
        let email = Arc::new(EmailService::new(mailer.clone(), &config));
        let service = UserService::new(users.clone(), invites.clone(), email, &config);
        Harness {
            users,
            invites,
            mailer,
            service,
        }
    }

    async fn staff(h: &Harness, email: &str, role: UserRole) -> User {
        h.users
            .create(&CreateUserInput {
                email: email.to_string(),
                password_hash: "x".to_string(),
                first_name: "Staff".to_string(),
                last_name: "Member".to_string(),
                job_role: None,
                role,
                must_change_password: false,
            })
            .await
            .unwrap()
    }

    fn invite_input(email: &str, role: UserRole) -> InviteUserInput {
        InviteUserInput {
            email: email.to_string(),
            role,
        }
    }

    #[tokio::test]
    async fn test_invite_sends_link() {
        let h = setup().await;
        let admin = staff(&h, "admin@portal.test", UserRole::Admin).await;
        let invite = h
            .service
            .invite(&admin, &invite_input("Novo@Portal.test", UserRole::MainEditor))
            .await
            .unwrap();
        assert_eq!(invite.email, "novo@portal.test");
        assert_eq!(invite.status, InviteStatus::Pending);
        assert!(Uuid::parse_str(&invite.invitation_token).is_ok());
        assert!(invite.expires_at > Utc::now());

        let mail = h.mailer.last_to("novo@portal.test").unwrap();
        assert!(mail.html.contains(&format!("invitationToken={}", invite.invitation_token)));
        assert!(mail.html.contains("email=novo%40portal.test"));
    }

    #[tokio::test]
    async fn test_invite_role_rules() {
        let h = setup().await;
        let admin = staff(&h, "admin@portal.test", UserRole::Admin).await;
        let main = staff(&h, "chefe@portal.test", UserRole::MainEditor).await;

        assert!(matches!(
            h.service.invite(&admin, &invite_input("a@portal.test", UserRole::Admin)).await,
            Err(AuthError::Forbidden(code)) if code == "ADMIN_CANNOT_BE_INVITED"
        ));
        assert!(matches!(
            h.service.invite(&admin, &invite_input("a@portal.test", UserRole::Reader)).await,
            Err(AuthError::Validation(_))
        ));
        assert!(matches!(
            h.service.invite(&main, &invite_input("a@portal.test", UserRole::MainEditor)).await,
            Err(AuthError::Forbidden(_))
        ));
        assert!(h
            .service
            .invite(&main, &invite_input("a@portal.test", UserRole::Editor))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_invite_conflicts() {
        let h = setup().await;
        let admin = staff(&h, "admin@portal.test", UserRole::Admin).await;
        assert!(matches!(
            h.service.invite(&admin, &invite_input("admin@portal.test", UserRole::Editor)).await,
            Err(AuthError::UserExists)
        ));
        h.service
            .invite(&admin, &invite_input("novo@portal.test", UserRole::Editor))
            .await
            .unwrap();
        assert!(matches!(
            h.service.invite(&admin, &invite_input("novo@portal.test", UserRole::Editor)).await,
            Err(AuthError::AlreadyInvited)
        ));
    }

    #[tokio::test]
    async fn test_resend_invite_rotates_token() {
        let h = setup().await;
        let admin = staff(&h, "admin@portal.test", UserRole::Admin).await;
        let invite = h
            .service
            .invite(&admin, &invite_input("novo@portal.test", UserRole::Editor))
            .await
            .unwrap();
        let resent = h.service.resend_invite(&admin, invite.id).await.unwrap();
        assert_ne!(resent.invitation_token, invite.invitation_token);
        assert_eq!(h.mailer.sent().len(), 2);

        h.invites.mark_accepted(invite.id, Utc::now()).await.unwrap();
        assert!(matches!(
            h.service.resend_invite(&admin, invite.id).await,
            Err(AuthError::InviteAlreadyUsed)
        ));
        assert!(matches!(
            h.service.resend_invite(&admin, 999).await,
            Err(AuthError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_invited_reports_expired() {
        let h = setup().await;
        h.invites
            .create(&CreateInviteInput {
                email: "old@portal.test".to_string(),
                invitation_token: Uuid::new_v4().to_string(),
                role: UserRole::Editor,
                expires_at: Utc::now() - Duration::hours(1),
            })
            .await
            .unwrap();
        let page = h.service.list_invited(&ListParams::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].status, InviteStatus::Expired);
    }

    #[tokio::test]
    async fn test_update_rules() {
        let h = setup().await;
        let main = staff(&h, "chefe@portal.test", UserRole::MainEditor).await;
        let editor = staff(&h, "ed@portal.test", UserRole::Editor).await;
        staff(&h, "taken@portal.test", UserRole::Editor).await;

        let promote = UpdateUserInput {
            role: Some(UserRole::Admin),
            ..Default::default()
        };
        assert!(matches!(
            h.service.update(&main, editor.id, &promote).await,
            Err(AuthError::Forbidden(_))
        ));

        let clash = UpdateUserInput {
            email: Some("taken@portal.test".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            h.service.update(&main, editor.id, &clash).await,
            Err(AuthError::UserExists)
        ));

        let rename = UpdateUserInput {
            first_name: Some("Bia".to_string()),
            email: Some("ed@portal.test".to_string()),
            ..Default::default()
        };
        let updated = h.service.update(&main, editor.id, &rename).await.unwrap();
        assert_eq!(updated.first_name, "Bia");
        assert_eq!(updated.email, "ed@portal.test");
    }

    #[tokio::test]
    async fn test_main_editor_cannot_edit_senior_accounts() {
        let h = setup().await;
        let admin = staff(&h, "admin@portal.test", UserRole::Admin).await;
        let main = staff(&h, "chefe@portal.test", UserRole::MainEditor).await;
        let peer = staff(&h, "par@portal.test", UserRole::MainEditor).await;

        let demote = UpdateUserInput {
            role: Some(UserRole::Editor),
            ..Default::default()
        };
        assert!(matches!(
            h.service.update(&main, admin.id, &demote).await,
            Err(AuthError::Forbidden(_))
        ));
        let reemail = UpdateUserInput {
            email: Some("outro@portal.test".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            h.service.update(&main, peer.id, &reemail).await,
            Err(AuthError::Forbidden(_))
        ));
        assert_eq!(h.service.find(peer.id).await.unwrap().email, "par@portal.test");

        let rename = UpdateUserInput {
            first_name: Some("Chefe".to_string()),
            ..Default::default()
        };
        assert_eq!(
            h.service.update(&main, main.id, &rename).await.unwrap().first_name,
            "Chefe"
        );
        assert_eq!(
            h.service.update(&admin, peer.id, &demote).await.unwrap().role,
            UserRole::Editor
        );
    }

    #[tokio::test]
    async fn test_email_case_variants_conflict() {
        let h = setup().await;
        let admin = staff(&h, "admin@portal.test", UserRole::Admin).await;
        staff(&h, "bia@campo.com", UserRole::Reader).await;

        assert!(matches!(
            h.service.invite(&admin, &invite_input(" Bia@Campo.com ", UserRole::Editor)).await,
            Err(AuthError::UserExists)
        ));
        let editor = staff(&h, "ed@portal.test", UserRole::Editor).await;
        let clash = UpdateUserInput {
            email: Some("BIA@campo.com".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            h.service.update(&admin, editor.id, &clash).await,
            Err(AuthError::UserExists)
        ));
    }

    #[tokio::test]
    async fn test_soft_delete() {
        let h = setup().await;
        let admin = staff(&h, "admin@portal.test", UserRole::Admin).await;
        let editor = staff(&h, "ed@portal.test", UserRole::Editor).await;

        assert!(matches!(
            h.service.soft_delete(&admin, admin.id).await,
            Err(AuthError::Validation(_))
        ));
        h.service.soft_delete(&admin, editor.id).await.unwrap();
        assert!(matches!(h.service.find(editor.id).await, Err(AuthError::NotFound(_))));
        let page = h.service.list(&ListParams::default()).await.unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn test_seed_admin_only_when_empty() {
        let h = setup().await;
        let config = AuthConfig::default();
        let admin = h.service.seed_admin(&config).await.unwrap().unwrap();
        assert_eq!(admin.role, UserRole::Admin);
        assert!(admin.must_change_password);
        assert!(h.service.seed_admin(&config).await.unwrap().is_none());
        assert_eq!(h.users.count().await.unwrap(), 1);
    }
}
