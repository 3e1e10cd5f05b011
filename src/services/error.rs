//! Service error types

/// Errors from the content services (posts, categories, media, site documents)
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique name, slug or email already taken
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Rejected upload signature
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ContentError {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        ContentError::NotFound(what.to_string())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ContentError::Validation(message.into())
    }
}

/// Errors from authentication and account provisioning
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Unknown email, removed account, wrong password or bad token
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Weak password: {0}")]
    WeakPassword(String),

    #[error("Invalid or expired code")]
    InvalidOrExpiredCode,

    #[error("Invalid or expired invitation token")]
    InvalidOrExpiredInvitation,

    #[error("Invitation already used")]
    InviteAlreadyUsed,

    #[error("User already exists")]
    UserExists,

    /// The invited email registered by other means before accepting
    #[error("User already exists for this invitation")]
    InvitedUserExists,

    #[error("User already invited")]
    AlreadyInvited,

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Token revoked")]
    TokenRevoked,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Too many attempts, try again later")]
    RateLimited,

    /// Account creation failed and was rolled back
    #[error("Invitation processing reverted: {0}")]
    ProvisioningReverted(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
