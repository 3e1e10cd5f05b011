//! Rate limiter for login attempts
//!
//! - 5 failed attempts per email in 15 minutes
//! - 10 login requests per IP address per minute

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::RwLock;

const MAX_FAILED_PER_EMAIL: usize = 5;
const MAX_REQUESTS_PER_IP: usize = 10;

pub struct LoginRateLimiter {
    email_attempts: Arc<RwLock<HashMap<String, Vec<DateTime<Utc>>>>>,
    ip_attempts: Arc<RwLock<HashMap<IpAddr, Vec<DateTime<Utc>>>>>,
}

impl LoginRateLimiter {
    pub fn new() -> Self {
        Self {
            email_attempts: Arc::new(RwLock::new(HashMap::new())),
            ip_attempts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn is_email_limited(&self, email: &str) -> bool {
        let mut attempts = self.email_attempts.write().await;
        let cutoff = Utc::now() - Duration::minutes(15);
        let entry = attempts.entry(email.to_lowercase()).or_default();
        entry.retain(|time| *time > cutoff);
        entry.len() >= MAX_FAILED_PER_EMAIL
    }

    pub async fn record_failed_attempt(&self, email: &str) {
        let mut attempts = self.email_attempts.write().await;
        attempts
            .entry(email.to_lowercase())
            .or_default()
            .push(Utc::now());
    }

    /// Forget failures after a successful login
    pub async fn clear_email_attempts(&self, email: &str) {
        self.email_attempts.write().await.remove(&email.to_lowercase());
    }

    pub async fn is_ip_limited(&self, ip: IpAddr) -> bool {
        let mut attempts = self.ip_attempts.write().await;
        let cutoff = Utc::now() - Duration::minutes(1);
        let entry = attempts.entry(ip).or_default();
        entry.retain(|time| *time > cutoff);
        entry.len() >= MAX_REQUESTS_PER_IP
    }

    pub async fn record_ip_request(&self, ip: IpAddr) {
        self.ip_attempts
            .write()
            .await
            .entry(ip)
            .or_default()
            .push(Utc::now());
    }

    /// Drop expired entries
    pub async fn cleanup(&self) {
        let now = Utc::now();
        let email_cutoff = now - Duration::minutes(15);
        let ip_cutoff = now - Duration::minutes(1);

        self.email_attempts.write().await.retain(|_, times| {
            times.retain(|time| *time > email_cutoff);
            !times.is_empty()
        });
        self.ip_attempts.write().await.retain(|_, times| {
            times.retain(|time| *time > ip_cutoff);
            !times.is_empty()
        });
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[tokio::test]
    async fn test_email_rate_limit() {
        let limiter = LoginRateLimiter::new();
        for _ in 0..4 {
            assert!(!limiter.is_email_limited("editor@portal.test").await);
            limiter.record_failed_attempt("editor@portal.test").await;
        }
        limiter.record_failed_attempt("editor@portal.test").await;
        assert!(limiter.is_email_limited("editor@portal.test").await);

        limiter.clear_email_attempts("editor@portal.test").await;
        assert!(!limiter.is_email_limited("editor@portal.test").await);
    }

    #[tokio::test]
    async fn test_ip_rate_limit() {
        let limiter = LoginRateLimiter::new();
        let ip = IpAddr::from_str("127.0.0.1").unwrap();
        for _ in 0..9 {
            assert!(!limiter.is_ip_limited(ip).await);
            limiter.record_ip_request(ip).await;
        }
        limiter.record_ip_request(ip).await;
        assert!(limiter.is_ip_limited(ip).await);
    }

    #[tokio::test]
    async fn test_email_is_case_insensitive() {
        let limiter = LoginRateLimiter::new();
        for email in ["A@B.C", "a@b.c", "A@b.C", "a@B.c", "a@b.C"] {
            limiter.record_failed_attempt(email).await;
        }
        assert!(limiter.is_email_limited("a@b.c").await);
    }

    #[tokio::test]
    async fn test_cleanup_keeps_recent_entries() {
        let limiter = LoginRateLimiter::new();
        limiter.record_failed_attempt("a@b.c").await;
        limiter.cleanup().await;
        assert_eq!(limiter.email_attempts.read().await.len(), 1);
    }
}
