//! Access token issuing and verification (HS256 JWT)

use crate::config::AuthConfig;
use crate::models::{User, UserRole};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Claims carried by every access token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// User id
    pub sub: i64,
    pub role: UserRole,
    pub email: String,
    pub name: String,
    pub iat: i64,
    pub exp: i64,
}

/// A freshly signed token and its expiry
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl_seconds: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::seconds(ttl_seconds as i64),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(&config.jwt_secret, config.token_ttl_seconds)
    }

    pub fn issue(&self, user: &User) -> Result<IssuedToken> {
        let now = Utc::now();
        let expires_at = now + self.ttl;
        let claims = Claims {
            sub: user.id,
            role: user.role,
            email: user.email.clone(),
            name: user.full_name(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .context("Failed to sign access token")?;
        Ok(IssuedToken { token, expires_at })
    }

    /// Check signature and expiry
    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        decode::<Claims>(token, &self.decoding_key, &validation).map(|data| data.claims)
    }

    /// Read the claims of a correctly signed token even if it has expired
    pub fn decode_unverified_expiry(&self, token: &str) -> Option<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: 7,
            email: "editor@portal.test".to_string(),
            password_hash: String::new(),
            first_name: "Maria".to_string(),
            last_name: "Souza".to_string(),
            job_role: None,
            role: UserRole::Editor,
            must_change_password: false,
            removed: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_issue_and_verify() {
        let service = TokenService::new("secret", 3600);
        let issued = service.issue(&user()).unwrap();
        let claims = service.verify(&issued.token).unwrap();
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.role, UserRole::Editor);
        assert_eq!(claims.name, "Maria Souza");
        assert_eq!(claims.exp, issued.expires_at.timestamp());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issued = TokenService::new("secret", 3600).issue(&user()).unwrap();
        assert!(TokenService::new("other", 3600).verify(&issued.token).is_err());
        assert!(TokenService::new("other", 3600)
            .decode_unverified_expiry(&issued.token)
            .is_none());
    }

    #[test]
    fn test_expired_token_rejected_but_decodable() {
        let service = TokenService::new("secret", 3600);
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: 1,
            role: UserRole::Admin,
            email: "a@b.c".to_string(),
            name: "A".to_string(),
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"secret")).unwrap();
        assert!(service.verify(&token).is_err());
        assert_eq!(service.decode_unverified_expiry(&token).unwrap().exp, now - 3600);
    }

    #[test]
    fn test_garbage_token() {
        let service = TokenService::new("secret", 3600);
        assert!(service.verify("not-a-jwt").is_err());
        assert!(service.decode_unverified_expiry("not-a-jwt").is_none());
    }
}
