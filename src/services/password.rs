//! Password hashing and policy
//!
//! Hashes are Argon2id PHC strings with a random salt per password.

use anyhow::{Context, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Minimum accepted password length, in characters
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Hash a password using Argon2id with secure defaults.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))
        .context("Password hashing failed")?;

    Ok(password_hash.to_string())
}

/// Verify a password against a stored hash.
///
/// Returns `Ok(false)` on mismatch and an error only for a malformed hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))
        .context("Failed to parse password hash")?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow::anyhow!("Password verification failed: {}", e))
            .context("Password verification error"),
    }
}

/// Check a new password against the account policy.
///
/// Requires at least six characters including an uppercase letter, a
/// lowercase letter, a digit and a symbol. The error names the first rule
/// that failed.
pub fn validate_password_policy(password: &str) -> std::result::Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        ));
    }
    if !password.chars().any(char::is_uppercase) {
        return Err("Password must contain an uppercase letter".to_string());
    }
    if !password.chars().any(char::is_lowercase) {
        return Err("Password must contain a lowercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain a digit".to_string());
    }
    if password.chars().all(char::is_alphanumeric) {
        return Err("Password must contain a symbol".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password_produces_argon2id_hash() {
        let hash = hash_password("Secret#1").expect("Failed to hash password");
        assert!(hash.starts_with("$argon2id$"), "Hash should use Argon2id");
    }

    #[test]
    fn test_hash_password_produces_different_hashes() {
        let hash1 = hash_password("same_password").expect("Failed to hash password");
        let hash2 = hash_password("same_password").expect("Failed to hash password");
        assert_ne!(hash1, hash2, "Random salt should produce different hashes");
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("Correct#1").expect("Failed to hash password");
        assert!(verify_password("Correct#1", &hash).unwrap());
        assert!(!verify_password("Wrong#1", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_invalid_hash() {
        assert!(verify_password("password", "invalid_hash_format").is_err());
    }

    #[test]
    fn test_policy_accepts_strong_password() {
        assert!(validate_password_policy("Abc#12").is_ok());
        assert!(validate_password_policy("Çidade-2024").is_ok());
    }

    #[test]
    fn test_policy_names_failed_rule() {
        assert!(validate_password_policy("Ab#1").unwrap_err().contains("at least"));
        assert!(validate_password_policy("abc#123").unwrap_err().contains("uppercase"));
        assert!(validate_password_policy("ABC#123").unwrap_err().contains("lowercase"));
        assert!(validate_password_policy("Abc#def").unwrap_err().contains("digit"));
        assert!(validate_password_policy("Abc1234").unwrap_err().contains("symbol"));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(20))]

            /// Passwords shorter than the minimum are always rejected
            #[test]
            fn short_passwords_rejected(password in ".{0,5}") {
                prop_assert!(validate_password_policy(&password).is_err());
            }

            /// Any password built from one of each class plus padding passes
            #[test]
            fn composed_passwords_accepted(
                upper in "[A-Z]",
                lower in "[a-z]",
                digit in "[0-9]",
                symbol in "[!@#$%&*?_-]",
                padding in "[a-zA-Z0-9]{2,20}"
            ) {
                let password = format!("{}{}{}{}{}", padding, upper, symbol, lower, digit);
                prop_assert!(validate_password_policy(&password).is_ok());
            }

            /// Purely alphanumeric passwords never pass
            #[test]
            fn alphanumeric_only_rejected(password in "[a-zA-Z0-9]{6,30}") {
                prop_assert!(validate_password_policy(&password).is_err());
            }
        }
    }
}
