//! Authentication service
//!
//! Login, logout with token blacklisting, password reset codes, the
//! invitation acceptance workflow and reader self-signup.
//!
//! Accepting an invite creates an account and then consumes the invite.
//! If anything fails once account creation has started, the partial
//! account is deleted and the invite returned to pending before the error
//! is reported.

use crate::cache::{keys, Cache, CacheLayer};
use crate::config::AuthConfig;
use crate::db::repositories::{InviteRepository, UserRepository};
use crate::models::{CreateUserInput, User, UserInvite, UserRole};
use crate::services::email::{generate_verification_code, EmailService};
use crate::services::error::AuthError;
use crate::services::password::{hash_password, validate_password_policy, verify_password};
use crate::services::rate_limiter::LoginRateLimiter;
use crate::services::token::TokenService;
use crate::services::validation::{is_valid_email, normalize_email};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

/// Minimum length of a reader's job description
const MIN_JOB_ROLE_LENGTH: usize = 4;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoginUser {
    pub id: i64,
    pub email: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    pub access_token: String,
    pub must_change_password: bool,
    pub user: LoginUser,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordInput {
    pub email: String,
    pub code: String,
    pub new_password: String,
    pub repeat_new_password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordInput {
    pub new_password: String,
    pub repeat_new_password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptInviteInput {
    pub invitation_token: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub repeat_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InviteInfo {
    pub email: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReaderSignupInput {
    pub first_name: String,
    pub last_name: String,
    pub job_role: String,
    pub email: String,
    pub code: String,
    pub password: String,
    pub repeat_password: String,
}

pub struct AuthService {
    users: Arc<dyn UserRepository>,
    invites: Arc<dyn InviteRepository>,
    cache: Arc<Cache>,
    tokens: Arc<TokenService>,
    email: Arc<EmailService>,
    limiter: Arc<LoginRateLimiter>,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        invites: Arc<dyn InviteRepository>,
        cache: Arc<Cache>,
        tokens: Arc<TokenService>,
        email: Arc<EmailService>,
        config: AuthConfig,
    ) -> Self {
        Self {
            users,
            invites,
            cache,
            tokens,
            email,
            limiter: Arc::new(LoginRateLimiter::new()),
            config,
        }
    }

    pub fn rate_limiter(&self) -> Arc<LoginRateLimiter> {
        self.limiter.clone()
    }

    /// Check credentials and issue an access token.
    ///
    /// Accounts flagged `must_change_password` also get a reset code by mail.
    pub async fn login(&self, input: &LoginInput, ip: Option<IpAddr>) -> Result<LoginResult, AuthError> {
        if let Some(ip) = ip {
            if self.limiter.is_ip_limited(ip).await {
                return Err(AuthError::RateLimited);
            }
            self.limiter.record_ip_request(ip).await;
        }
        let email = normalize_email(&input.email);
        if self.limiter.is_email_limited(&email).await {
            return Err(AuthError::RateLimited);
        }

        let user = match self.users.get_by_email(&email).await? {
            Some(user) if !user.removed => user,
            _ => {
                self.limiter.record_failed_attempt(&email).await;
                return Err(AuthError::InvalidCredentials);
            }
        };
        if !verify_password(&input.password, &user.password_hash)? {
            self.limiter.record_failed_attempt(&email).await;
            return Err(AuthError::InvalidCredentials);
        }
        self.limiter.clear_email_attempts(&email).await;

        if user.must_change_password {
            let code = generate_verification_code();
            self.cache
                .set(
                    &keys::reset_code(&user.email),
                    &code,
                    Duration::from_secs(self.config.reset_code_ttl_seconds),
                )
                .await?;
            self.email.send_password_reset_code(&user.email, &code).await?;
        }

        tracing::info!(user_id = user.id, "User logged in");
        self.login_result(&user)
    }

    /// Set a new password using the code mailed at login
    pub async fn reset_password_with_code(&self, input: &ResetPasswordInput) -> Result<(), AuthError> {
        check_new_password(&input.new_password, &input.repeat_new_password)?;

        let email = normalize_email(&input.email);
        let key = keys::reset_code(&email);
        let stored: Option<String> = self.cache.get(&key).await?;
        if stored.as_deref() != Some(input.code.as_str()) {
            return Err(AuthError::InvalidOrExpiredCode);
        }

        let user = self
            .users
            .get_by_email(&email)
            .await?
            .ok_or_else(|| AuthError::NotFound("User not found".to_string()))?;

        let hash = hash_password(&input.new_password)?;
        self.users.set_password(user.id, &hash, false).await?;
        self.cache.delete(&key).await?;
        tracing::info!(user_id = user.id, "Password reset with code");
        Ok(())
    }

    pub async fn change_password(&self, user_id: i64, input: &ChangePasswordInput) -> Result<(), AuthError> {
        check_new_password(&input.new_password, &input.repeat_new_password)?;
        let user = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::NotFound("User not found".to_string()))?;
        let hash = hash_password(&input.new_password)?;
        self.users.set_password(user.id, &hash, false).await?;
        self.cache.delete(&keys::reset_code(&user.email)).await?;
        Ok(())
    }

    /// Blacklist a token for the rest of its lifetime.
    /// Tokens that cannot be decoded or have already expired are ignored.
    pub async fn logout(&self, token: &str) -> Result<(), AuthError> {
        let Some(claims) = self.tokens.decode_unverified_expiry(token) else {
            return Ok(());
        };
        let remaining = claims.exp - Utc::now().timestamp();
        if remaining > 0 {
            self.cache
                .set(
                    &keys::blacklisted_token(token),
                    &true,
                    Duration::from_secs(remaining as u64),
                )
                .await?;
            tracing::info!(user_id = claims.sub, "Token revoked");
        }
        Ok(())
    }

    /// Resolve the user behind a bearer token
    pub async fn authenticate(&self, token: &str) -> Result<User, AuthError> {
        let claims = self
            .tokens
            .verify(token)
            .map_err(|_| AuthError::InvalidCredentials)?;
        if self.cache.exists(&keys::blacklisted_token(token)).await? {
            return Err(AuthError::TokenRevoked);
        }
        match self.users.get_by_id(claims.sub).await? {
            Some(user) if !user.removed => Ok(user),
            _ => Err(AuthError::InvalidCredentials),
        }
    }

    /// Invite usable for account creation
    pub async fn check_invitation_token(&self, token: &str) -> Result<UserInvite, AuthError> {
        let invite = self
            .invites
            .get_by_token(token)
            .await?
            .ok_or(AuthError::InvalidOrExpiredInvitation)?;
        if invite.is_expired(Utc::now()) {
            return Err(AuthError::InvalidOrExpiredInvitation);
        }
        if invite.is_consumed() {
            return Err(AuthError::InviteAlreadyUsed);
        }
        Ok(invite)
    }

    pub async fn validate_invite_token(&self, token: &str) -> Result<InviteInfo, AuthError> {
        let invite = self.check_invitation_token(token).await?;
        Ok(InviteInfo {
            email: invite.email,
            role: invite.role,
        })
    }

    /// Create the invited account and log it in
    pub async fn accept_invite(&self, input: &AcceptInviteInput) -> Result<LoginResult, AuthError> {
        check_new_password(&input.password, &input.repeat_password)?;
        let invite = self.check_invitation_token(&input.invitation_token).await?;
        if self.users.get_by_email(&invite.email).await?.is_some() {
            return Err(AuthError::InvitedUserExists);
        }

        let password_hash = hash_password(&input.password)?;
        let new_user = CreateUserInput {
            email: invite.email.clone(),
            password_hash,
            first_name: input.first_name.trim().to_string(),
            last_name: input.last_name.trim().to_string(),
            job_role: None,
            role: invite.role,
            must_change_password: false,
        };

        let user = match self.users.create(&new_user).await {
            Ok(user) => user,
            Err(e) => {
                tracing::error!(invite_id = invite.id, "Account creation failed: {:#}", e);
                self.revert_provisioning(None, invite.id).await;
                return Err(AuthError::ProvisioningReverted(e.to_string()));
            }
        };

        if let Err(e) = self.invites.mark_accepted(invite.id, Utc::now()).await {
            tracing::error!(invite_id = invite.id, "Failed to consume invite: {:#}", e);
            self.revert_provisioning(Some(user.id), invite.id).await;
            return Err(AuthError::ProvisioningReverted(e.to_string()));
        }

        match self.login_result(&user) {
            Ok(result) => {
                tracing::info!(user_id = user.id, invite_id = invite.id, "Invite accepted");
                Ok(result)
            }
            Err(e) => {
                tracing::error!(invite_id = invite.id, "Failed to log in new account: {}", e);
                self.revert_provisioning(Some(user.id), invite.id).await;
                Err(AuthError::ProvisioningReverted(e.to_string()))
            }
        }
    }

    /// Undo a partial acceptance. Failures are logged, never returned,
    /// so the caller still reports the original error.
    async fn revert_provisioning(&self, user_id: Option<i64>, invite_id: i64) {
        if let Some(user_id) = user_id {
            tracing::warn!(user_id, "Reverting invite acceptance: deleting partial account");
            if let Err(e) = self.users.hard_delete(user_id).await {
                tracing::error!(user_id, "Failed to delete partial account: {:#}", e);
            }
        }
        tracing::warn!(invite_id, "Reverting invite acceptance: resetting invite to pending");
        if let Err(e) = self.invites.reset_pending(invite_id).await {
            tracing::error!(invite_id, "Failed to reset invite: {:#}", e);
        }
    }

    /// Mail a verification code to a prospective reader
    pub async fn send_reader_signup_code(&self, email: &str) -> Result<(), AuthError> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            return Err(AuthError::Validation("Invalid email".to_string()));
        }
        if self.users.get_by_email(&email).await?.is_some() {
            return Err(AuthError::UserExists);
        }
        let code = generate_verification_code();
        self.cache
            .set(
                &keys::reader_signup(&email),
                &code,
                Duration::from_secs(self.config.signup_code_ttl_seconds),
            )
            .await?;
        self.email.send_reader_signup_code(&email, &code).await?;
        Ok(())
    }

    /// Create a reader account from a verified code and log it in
    pub async fn signup_reader(&self, input: &ReaderSignupInput) -> Result<LoginResult, AuthError> {
        if input.job_role.trim().chars().count() < MIN_JOB_ROLE_LENGTH {
            return Err(AuthError::Validation(format!(
                "Job role must be at least {} characters",
                MIN_JOB_ROLE_LENGTH
            )));
        }
        check_new_password(&input.password, &input.repeat_password)?;

        let email = normalize_email(&input.email);
        let key = keys::reader_signup(&email);
        let stored: Option<String> = self.cache.get(&key).await?;
        if stored.as_deref() != Some(input.code.as_str()) {
            return Err(AuthError::InvalidOrExpiredCode);
        }
        if self.users.get_by_email(&email).await?.is_some() {
            return Err(AuthError::UserExists);
        }

        let user = self
            .users
            .create(&CreateUserInput {
                email,
                password_hash: hash_password(&input.password)?,
                first_name: input.first_name.trim().to_string(),
                last_name: input.last_name.trim().to_string(),
                job_role: Some(input.job_role.trim().to_string()),
                role: UserRole::Reader,
                must_change_password: false,
            })
            .await?;
        self.cache.delete(&key).await?;
        tracing::info!(user_id = user.id, "Reader signed up");
        self.login_result(&user)
    }

    fn login_result(&self, user: &User) -> Result<LoginResult, AuthError> {
        let issued = self.tokens.issue(user)?;
        Ok(LoginResult {
            access_token: issued.token,
            must_change_password: user.must_change_password,
            user: LoginUser {
                id: user.id,
                email: user.email.clone(),
                role: user.role,
            },
        })
    }
}

fn check_new_password(password: &str, repeat: &str) -> Result<(), AuthError> {
    if password != repeat {
        return Err(AuthError::PasswordMismatch);
    }
    validate_password_policy(password).map_err(AuthError::WeakPassword)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::create_cache;
    use crate::config::CacheConfig;
    use crate::db::repositories::{SqlxInviteRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{CreateInviteInput, InviteStatus, ListParams};
    use crate::services::email::RecordingMailer;
    use anyhow::Result as AnyResult;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration as ChronoDuration};

    const PASSWORD: &str = "Segredo#1";

    struct Harness {
        users: Arc<dyn UserRepository>,
        invites: Arc<dyn InviteRepository>,
        cache: Arc<Cache>,
        mailer: Arc<RecordingMailer>,
        service: AuthService,
    }

    /// Build the service, letting the caller wrap the invite store
    async fn setup_with_invites(
        wrap: impl FnOnce(Arc<dyn InviteRepository>) -> Arc<dyn InviteRepository>,
    ) -> Harness {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let users = SqlxUserRepository::boxed(pool.clone());
        let invites = wrap(SqlxInviteRepository::boxed(pool.clone()));
        let cache = create_cache(&CacheConfig::default()).await.unwrap();
        let mailer = Arc::new(RecordingMailer::new());
        let config = AuthConfig::default();
        let email = Arc::new(EmailService::new(mailer.clone(), &config));
        let tokens = Arc::new(TokenService::from_config(&config));
        let service = AuthService::new(
            users.clone(),
            invites.clone(),
            cache.clone(),
            tokens,
            email,
            config,
        );
        Harness {
            users,
            invites,
            cache,
            mailer,
            service,
        }
    }

    async fn setup() -> Harness {
        setup_with_invites(|invites| invites).await
    }

    async fn create_user(h: &Harness, email: &str, must_change: bool) -> User {
        h.users
            .create(&CreateUserInput {
                email: email.to_string(),
                password_hash: hash_password(PASSWORD).unwrap(),
                first_name: "Ana".to_string(),
                last_name: "Lima".to_string(),
                job_role: None,
                role: UserRole::Editor,
                must_change_password: must_change,
            })
            .await
            .unwrap()
    }

    async fn create_invite(invites: &Arc<dyn InviteRepository>, email: &str, ttl_secs: i64) -> UserInvite {
        invites
            .create(&CreateInviteInput {
                email: email.to_string(),
                invitation_token: uuid::Uuid::new_v4().to_string(),
                role: UserRole::Editor,
                expires_at: Utc::now() + ChronoDuration::seconds(ttl_secs),
            })
            .await
            .unwrap()
    }

    fn login(email: &str, password: &str) -> LoginInput {
        LoginInput {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    fn accept(token: &str, password: &str, repeat: &str) -> AcceptInviteInput {
        AcceptInviteInput {
            invitation_token: token.to_string(),
            first_name: "Novo".to_string(),
            last_name: "Editor".to_string(),
            password: password.to_string(),
            repeat_password: repeat.to_string(),
        }
    }

    #[tokio::test]
    async fn test_login_success() {
        let h = setup().await;
        let user = create_user(&h, "ana@portal.test", false).await;
        let result = h.service.login(&login("ana@portal.test", PASSWORD), None).await.unwrap();
        assert!(!result.must_change_password);
        assert_eq!(result.user.id, user.id);
        let authed = h.service.authenticate(&result.access_token).await.unwrap();
        assert_eq!(authed.id, user.id);
        assert!(h.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_login_rejects_wrong_password_and_removed_user() {
        let h = setup().await;
        let user = create_user(&h, "ana@portal.test", false).await;
        assert!(matches!(
            h.service.login(&login("ana@portal.test", "Errada#1"), None).await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            h.service.login(&login("ghost@portal.test", PASSWORD), None).await,
            Err(AuthError::InvalidCredentials)
        ));
        h.users.soft_delete(user.id).await.unwrap();
        assert!(matches!(
            h.service.login(&login("ana@portal.test", PASSWORD), None).await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_login_rate_limited_after_failures() {
        let h = setup().await;
        create_user(&h, "ana@portal.test", false).await;
        for _ in 0..5 {
            let _ = h.service.login(&login("ana@portal.test", "Errada#1"), None).await;
        }
        assert!(matches!(
            h.service.login(&login("ana@portal.test", PASSWORD), None).await,
            Err(AuthError::RateLimited)
        ));
    }

    #[tokio::test]
    async fn test_must_change_password_flow() {
        let h = setup().await;
        create_user(&h, "ana@portal.test", true).await;
        let result = h.service.login(&login("ana@portal.test", PASSWORD), None).await.unwrap();
        assert!(result.must_change_password);

        let code: String = h.cache.get("reset:code:ana@portal.test").await.unwrap().unwrap();
        assert!(h.mailer.last_to("ana@portal.test").unwrap().html.contains(&code));

        let mut input = ResetPasswordInput {
            email: "ana@portal.test".to_string(),
            code: "000000x".to_string(),
            new_password: "Nova#Senha1".to_string(),
            repeat_new_password: "Nova#Senha1".to_string(),
        };
        assert!(matches!(
            h.service.reset_password_with_code(&input).await,
            Err(AuthError::InvalidOrExpiredCode)
        ));

        input.code = code;
        h.service.reset_password_with_code(&input).await.unwrap();
        let user = h.users.get_by_email("ana@portal.test").await.unwrap().unwrap();
        assert!(!user.must_change_password);
        assert!(!h.cache.exists("reset:code:ana@portal.test").await.unwrap());
        assert!(h.service.login(&login("ana@portal.test", "Nova#Senha1"), None).await.is_ok());
    }

    #[tokio::test]
    async fn test_reset_password_mismatch() {
        let h = setup().await;
        let input = ResetPasswordInput {
            email: "a@b.c".to_string(),
            code: "123456".to_string(),
            new_password: "Nova#Senha1".to_string(),
            repeat_new_password: "Nova#Senha2".to_string(),
        };
        assert!(matches!(
            h.service.reset_password_with_code(&input).await,
            Err(AuthError::PasswordMismatch)
        ));
    }

    #[tokio::test]
    async fn test_change_password_enforces_policy() {
        let h = setup().await;
        let user = create_user(&h, "ana@portal.test", true).await;
        let weak = ChangePasswordInput {
            new_password: "fraca".to_string(),
            repeat_new_password: "fraca".to_string(),
        };
        assert!(matches!(
            h.service.change_password(user.id, &weak).await,
            Err(AuthError::WeakPassword(_))
        ));
        let strong = ChangePasswordInput {
            new_password: "Forte#123".to_string(),
            repeat_new_password: "Forte#123".to_string(),
        };
        h.service.change_password(user.id, &strong).await.unwrap();
        assert!(!h.users.get_by_id(user.id).await.unwrap().unwrap().must_change_password);
    }

    #[tokio::test]
    async fn test_logout_blacklists_token() {
        let h = setup().await;
        create_user(&h, "ana@portal.test", false).await;
        let result = h.service.login(&login("ana@portal.test", PASSWORD), None).await.unwrap();
        h.service.logout(&result.access_token).await.unwrap();
        assert!(matches!(
            h.service.authenticate(&result.access_token).await,
            Err(AuthError::TokenRevoked)
        ));
        h.service.logout("garbage").await.unwrap();
    }

    #[tokio::test]
    async fn test_authenticate_rejects_removed_user() {
        let h = setup().await;
        let user = create_user(&h, "ana@portal.test", false).await;
        let result = h.service.login(&login("ana@portal.test", PASSWORD), None).await.unwrap();
        h.users.soft_delete(user.id).await.unwrap();
        assert!(matches!(
            h.service.authenticate(&result.access_token).await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_check_invitation_token() {
        let h = setup().await;
        assert!(matches!(
            h.service.check_invitation_token("missing").await,
            Err(AuthError::InvalidOrExpiredInvitation)
        ));
        let expired = create_invite(&h.invites, "old@portal.test", -10).await;
        assert!(matches!(
            h.service.check_invitation_token(&expired.invitation_token).await,
            Err(AuthError::InvalidOrExpiredInvitation)
        ));
        let used = create_invite(&h.invites, "used@portal.test", 3600).await;
        h.invites.mark_accepted(used.id, Utc::now()).await.unwrap();
        assert!(matches!(
            h.service.check_invitation_token(&used.invitation_token).await,
            Err(AuthError::InviteAlreadyUsed)
        ));
        let ok = create_invite(&h.invites, "ok@portal.test", 3600).await;
        let info = h.service.validate_invite_token(&ok.invitation_token).await.unwrap();
        assert_eq!(info.email, "ok@portal.test");
        assert_eq!(info.role, UserRole::Editor);
    }

    #[tokio::test]
    async fn test_accept_invite_creates_account_once() {
        let h = setup().await;
        let invite = create_invite(&h.invites, "novo@portal.test", 3600).await;
        let result = h
            .service
            .accept_invite(&accept(&invite.invitation_token, PASSWORD, PASSWORD))
            .await
            .unwrap();
        assert_eq!(result.user.email, "novo@portal.test");
        assert_eq!(result.user.role, UserRole::Editor);

        let stored = h.invites.get_by_id(invite.id).await.unwrap().unwrap();
        assert!(stored.used);
        assert_eq!(stored.status, InviteStatus::Accepted);
        assert!(stored.accepted_at.is_some());

        assert!(matches!(
            h.service
                .accept_invite(&accept(&invite.invitation_token, PASSWORD, PASSWORD))
                .await,
            Err(AuthError::InviteAlreadyUsed)
        ));
    }

    #[tokio::test]
    async fn test_accept_invite_validations() {
        let h = setup().await;
        let invite = create_invite(&h.invites, "ana@portal.test", 3600).await;
        assert!(matches!(
            h.service
                .accept_invite(&accept(&invite.invitation_token, PASSWORD, "Outra#1"))
                .await,
            Err(AuthError::PasswordMismatch)
        ));
        create_user(&h, "ana@portal.test", false).await;
        assert!(matches!(
            h.service
                .accept_invite(&accept(&invite.invitation_token, PASSWORD, PASSWORD))
                .await,
            Err(AuthError::InvitedUserExists)
        ));
    }

    /// Invite store whose `mark_accepted` always fails
    struct FailingAccept {
        inner: Arc<dyn InviteRepository>,
    }

    #[async_trait]
    impl InviteRepository for FailingAccept {
        async fn create(&self, input: &CreateInviteInput) -> AnyResult<UserInvite> {
            self.inner.create(input).await
        }
        async fn get_by_id(&self, id: i64) -> AnyResult<Option<UserInvite>> {
            self.inner.get_by_id(id).await
        }
        async fn get_by_token(&self, token: &str) -> AnyResult<Option<UserInvite>> {
            self.inner.get_by_token(token).await
        }
        async fn find_open_for_email(
            &self,
            email: &str,
            now: DateTime<Utc>,
        ) -> AnyResult<Option<UserInvite>> {
            self.inner.find_open_for_email(email, now).await
        }
        async fn refresh(&self, id: i64, token: &str, expires_at: DateTime<Utc>) -> AnyResult<UserInvite> {
            self.inner.refresh(id, token, expires_at).await
        }
        async fn mark_accepted(&self, _id: i64, _at: DateTime<Utc>) -> AnyResult<()> {
            anyhow::bail!("simulated write failure")
        }
        async fn reset_pending(&self, id: i64) -> AnyResult<()> {
            self.inner.reset_pending(id).await
        }
        async fn list(&self, params: &ListParams) -> AnyResult<(Vec<UserInvite>, i64)> {
            self.inner.list(params).await
        }
    }

    #[tokio::test]
    async fn test_accept_invite_compensates_on_failure() {
        let h = setup_with_invites(|inner| Arc::new(FailingAccept { inner })).await;
        let invite = create_invite(&h.invites, "novo@portal.test", 3600).await;

        let result = h
            .service
            .accept_invite(&accept(&invite.invitation_token, PASSWORD, PASSWORD))
            .await;
        assert!(matches!(result, Err(AuthError::ProvisioningReverted(_))));

        assert!(h.users.get_by_email("novo@portal.test").await.unwrap().is_none());
        assert_eq!(h.users.count().await.unwrap(), 0);
        let stored = h.invites.get_by_id(invite.id).await.unwrap().unwrap();
        assert_eq!(stored.status, InviteStatus::Pending);
        assert!(!stored.used);
        assert!(stored.accepted_at.is_none());
    }

    #[tokio::test]
    async fn test_reader_signup_flow() {
        let h = setup().await;
        h.service.send_reader_signup_code("leitor@portal.test").await.unwrap();
        let code: String = h.cache.get("reader:signup:leitor@portal.test").await.unwrap().unwrap();

        let mut input = ReaderSignupInput {
            first_name: "Leo".to_string(),
            last_name: "Leitor".to_string(),
            job_role: "Agrônomo".to_string(),
            email: "leitor@portal.test".to_string(),
            code: "999999x".to_string(),
            password: PASSWORD.to_string(),
            repeat_password: PASSWORD.to_string(),
        };
        assert!(matches!(
            h.service.signup_reader(&input).await,
            Err(AuthError::InvalidOrExpiredCode)
        ));

        input.code = code;
        let result = h.service.signup_reader(&input).await.unwrap();
        assert_eq!(result.user.role, UserRole::Reader);
        assert!(!h.cache.exists("reader:signup:leitor@portal.test").await.unwrap());

        assert!(matches!(
            h.service.send_reader_signup_code("leitor@portal.test").await,
            Err(AuthError::UserExists)
        ));
    }

    #[tokio::test]
    async fn test_email_case_and_whitespace_are_ignored() {
        let h = setup().await;
        create_user(&h, "ana@portal.test", true).await;
        let result = h.service.login(&login(" Ana@Portal.TEST", PASSWORD), None).await.unwrap();
        assert_eq!(result.user.email, "ana@portal.test");

        let code: String = h.cache.get("reset:code:ana@portal.test").await.unwrap().unwrap();
        let reset = ResetPasswordInput {
            email: "ANA@portal.test ".to_string(),
            code,
            new_password: "Nova#Senha1".to_string(),
            repeat_new_password: "Nova#Senha1".to_string(),
        };
        h.service.reset_password_with_code(&reset).await.unwrap();

        h.service.send_reader_signup_code(" Leitor@Portal.test").await.unwrap();
        let code: String = h.cache.get("reader:signup:leitor@portal.test").await.unwrap().unwrap();
        let signup = ReaderSignupInput {
            first_name: "Leo".to_string(),
            last_name: "Leitor".to_string(),
            job_role: "Agrônomo".to_string(),
            email: "LEITOR@portal.test".to_string(),
            code,
            password: PASSWORD.to_string(),
            repeat_password: PASSWORD.to_string(),
        };
        let result = h.service.signup_reader(&signup).await.unwrap();
        assert_eq!(result.user.email, "leitor@portal.test");
        assert!(matches!(
            h.service.send_reader_signup_code("Leitor@PORTAL.test").await,
            Err(AuthError::UserExists)
        ));
    }

    #[tokio::test]
    async fn test_reader_signup_requires_job_role() {
        let h = setup().await;
        let input = ReaderSignupInput {
            first_name: "Leo".to_string(),
            last_name: "Leitor".to_string(),
            job_role: "ab".to_string(),
            email: "leitor@portal.test".to_string(),
            code: "123456".to_string(),
            password: PASSWORD.to_string(),
            repeat_password: PASSWORD.to_string(),
        };
        assert!(matches!(
            h.service.signup_reader(&input).await,
            Err(AuthError::Validation(_))
        ));
    }
}
