//! Configuration management
//!
//! Configuration is read from `config.yml` and may be overridden through
//! `NEWSDESK_*` environment variables. Missing values fall back to defaults,
//! so an absent or empty file yields a runnable development setup.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub twitter: TwitterConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// Origins allowed by CORS
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3003
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub driver: DatabaseDriver,
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/newsdesk.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    #[default]
    Sqlite,
    Mysql,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub driver: CacheDriver,
    #[serde(default)]
    pub redis_url: Option<String>,
    /// Fallback TTL for entries stored without an explicit one
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
    /// Upper bound on in-memory entries
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            driver: CacheDriver::default(),
            redis_url: None,
            ttl_seconds: default_ttl(),
            max_capacity: default_max_capacity(),
        }
    }
}

fn default_ttl() -> u64 {
    3600
}

fn default_max_capacity() -> u64 {
    100_000
}

/// Cache driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheDriver {
    #[default]
    Memory,
    Redis,
}

/// Authentication, invitation and account provisioning settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret used to sign access tokens
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default = "default_token_ttl")]
    pub token_ttl_seconds: u64,
    #[serde(default = "default_reset_code_ttl")]
    pub reset_code_ttl_seconds: u64,
    #[serde(default = "default_signup_code_ttl")]
    pub signup_code_ttl_seconds: u64,
    #[serde(default = "default_invite_ttl")]
    pub invite_ttl_seconds: u64,
    /// Frontend page that redeems invitations
    #[serde(default = "default_invite_accept_url")]
    pub invite_accept_url: String,
    /// Frontend page where readers confirm their signup code
    #[serde(default = "default_reader_verify_url")]
    pub reader_verify_url: String,
    #[serde(default = "default_seed_admin_email")]
    pub seed_admin_email: String,
    #[serde(default = "default_seed_admin_password")]
    pub seed_admin_password: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            token_ttl_seconds: default_token_ttl(),
            reset_code_ttl_seconds: default_reset_code_ttl(),
            signup_code_ttl_seconds: default_signup_code_ttl(),
            invite_ttl_seconds: default_invite_ttl(),
            invite_accept_url: default_invite_accept_url(),
            reader_verify_url: default_reader_verify_url(),
            seed_admin_email: default_seed_admin_email(),
            seed_admin_password: default_seed_admin_password(),
        }
    }
}

fn default_jwt_secret() -> String {
    "change-me".to_string()
}

fn default_token_ttl() -> u64 {
    3600
}

fn default_reset_code_ttl() -> u64 {
    300
}

fn default_signup_code_ttl() -> u64 {
    600
}

fn default_invite_ttl() -> u64 {
    3600
}

fn default_invite_accept_url() -> String {
    "http://localhost:3000/aceitar-convite".to_string()
}

fn default_reader_verify_url() -> String {
    "http://localhost:3000/verificar-cadastro".to_string()
}

fn default_seed_admin_email() -> String {
    "admin@admin.com".to_string()
}

fn default_seed_admin_password() -> String {
    "changeme123".to_string()
}

/// Object storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for stored objects
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
    /// Public URL prefix under which objects are reachable
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    /// Secret for signed upload URLs
    #[serde(default = "default_signing_secret")]
    pub signing_secret: String,
    #[serde(default = "default_signed_url_ttl")]
    pub signed_url_ttl_seconds: u64,
    /// Size limit for generic uploads (videos included)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Size limit for image uploads
    #[serde(default = "default_max_image_size")]
    pub max_image_size: u64,
    #[serde(default = "default_max_magazine_size")]
    pub max_magazine_size: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            public_base_url: default_public_base_url(),
            signing_secret: default_signing_secret(),
            signed_url_ttl_seconds: default_signed_url_ttl(),
            max_file_size: default_max_file_size(),
            max_image_size: default_max_image_size(),
            max_magazine_size: default_max_magazine_size(),
        }
    }
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_public_base_url() -> String {
    "http://localhost:3003/uploads".to_string()
}

fn default_signing_secret() -> String {
    "change-me-too".to_string()
}

fn default_signed_url_ttl() -> u64 {
    900
}

fn default_max_file_size() -> u64 {
    50 * 1024 * 1024
}

fn default_max_image_size() -> u64 {
    10 * 1024 * 1024
}

fn default_max_magazine_size() -> u64 {
    10 * 1024 * 1024
}

impl StorageConfig {
    /// Public URL for an object key
    pub fn public_url(&self, key: &str) -> String {
        format!(
            "{}/{}",
            self.public_base_url.trim_end_matches('/'),
            key.trim_start_matches('/')
        )
    }
}

/// Outgoing mail configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// When disabled, messages are only logged
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_username: String,
    #[serde(default)]
    pub smtp_password: String,
    #[serde(default = "default_from_address")]
    pub from_address: String,
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: String::new(),
            smtp_port: default_smtp_port(),
            smtp_username: String::new(),
            smtp_password: String::new(),
            from_address: default_from_address(),
            from_name: default_from_name(),
        }
    }
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from_address() -> String {
    "no-reply@localhost".to_string()
}

fn default_from_name() -> String {
    "Newsdesk".to_string()
}

/// Social feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitterConfig {
    #[serde(default)]
    pub bearer_token: Option<String>,
    #[serde(default = "default_twitter_username")]
    pub username: String,
    #[serde(default = "default_twitter_api_base")]
    pub api_base: String,
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            bearer_token: None,
            username: default_twitter_username(),
            api_base: default_twitter_api_base(),
        }
    }
}

fn default_twitter_username() -> String {
    "fpagropecuaria".to_string()
}

fn default_twitter_api_base() -> String {
    "https://api.twitter.com/2".to_string()
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file.
    ///
    /// A missing or empty file yields the default configuration.
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            message: format_yaml_error(&e),
        })
    }

    /// Load configuration from file, apply environment overrides and validate.
    ///
    /// Recognised variables:
    /// - NEWSDESK_HOST, NEWSDESK_PORT, NEWSDESK_CORS_ORIGINS (comma separated)
    /// - NEWSDESK_DATABASE_DRIVER, NEWSDESK_DATABASE_URL
    /// - NEWSDESK_CACHE_DRIVER, NEWSDESK_REDIS_URL
    /// - NEWSDESK_JWT_SECRET, NEWSDESK_INVITE_ACCEPT_URL, NEWSDESK_READER_VERIFY_URL
    /// - NEWSDESK_STORAGE_PATH, NEWSDESK_PUBLIC_BASE_URL, NEWSDESK_SIGNING_SECRET
    /// - NEWSDESK_SMTP_HOST, NEWSDESK_SMTP_PORT, NEWSDESK_SMTP_USERNAME, NEWSDESK_SMTP_PASSWORD
    /// - NEWSDESK_TWITTER_BEARER_TOKEN
    pub fn load_with_env(path: &std::path::Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("NEWSDESK_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("NEWSDESK_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(origins) = std::env::var("NEWSDESK_CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        if let Ok(driver) = std::env::var("NEWSDESK_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {}
            }
        }
        if let Ok(url) = std::env::var("NEWSDESK_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(driver) = std::env::var("NEWSDESK_CACHE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "memory" => self.cache.driver = CacheDriver::Memory,
                "redis" => self.cache.driver = CacheDriver::Redis,
                _ => {}
            }
        }
        if let Ok(url) = std::env::var("NEWSDESK_REDIS_URL") {
            self.cache.redis_url = Some(url);
        }

        if let Ok(secret) = std::env::var("NEWSDESK_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Ok(url) = std::env::var("NEWSDESK_INVITE_ACCEPT_URL") {
            self.auth.invite_accept_url = url;
        }
        if let Ok(url) = std::env::var("NEWSDESK_READER_VERIFY_URL") {
            self.auth.reader_verify_url = url;
        }

        if let Ok(path) = std::env::var("NEWSDESK_STORAGE_PATH") {
            self.storage.path = PathBuf::from(path);
        }
        if let Ok(url) = std::env::var("NEWSDESK_PUBLIC_BASE_URL") {
            self.storage.public_base_url = url;
        }
        if let Ok(secret) = std::env::var("NEWSDESK_SIGNING_SECRET") {
            self.storage.signing_secret = secret;
        }

        if let Ok(host) = std::env::var("NEWSDESK_SMTP_HOST") {
            self.mail.smtp_host = host;
            self.mail.enabled = !self.mail.smtp_host.is_empty();
        }
        if let Ok(port) = std::env::var("NEWSDESK_SMTP_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.mail.smtp_port = port;
            }
        }
        if let Ok(user) = std::env::var("NEWSDESK_SMTP_USERNAME") {
            self.mail.smtp_username = user;
        }
        if let Ok(pass) = std::env::var("NEWSDESK_SMTP_PASSWORD") {
            self.mail.smtp_password = pass;
        }

        if let Ok(token) = std::env::var("NEWSDESK_TWITTER_BEARER_TOKEN") {
            self.twitter.bearer_token = Some(token).filter(|t| !t.is_empty());
        }
    }

    /// Reject settings the server cannot start with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError("server.port must be non-zero".into()));
        }
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::ValidationError("database.url must not be empty".into()));
        }
        if self.cache.driver == CacheDriver::Redis && self.cache.redis_url.is_none() {
            return Err(ConfigError::ValidationError(
                "cache.redis_url is required when cache.driver is redis".into(),
            ));
        }
        if self.auth.jwt_secret.is_empty() {
            return Err(ConfigError::ValidationError("auth.jwt_secret must not be empty".into()));
        }
        let ttls = [
            ("auth.token_ttl_seconds", self.auth.token_ttl_seconds),
            ("auth.reset_code_ttl_seconds", self.auth.reset_code_ttl_seconds),
            ("auth.signup_code_ttl_seconds", self.auth.signup_code_ttl_seconds),
            ("auth.invite_ttl_seconds", self.auth.invite_ttl_seconds),
            ("storage.signed_url_ttl_seconds", self.storage.signed_url_ttl_seconds),
        ];
        if let Some((name, _)) = ttls.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::ValidationError(format!("{} must be non-zero", name)));
        }
        if self.mail.enabled && self.mail.smtp_host.is_empty() {
            return Err(ConfigError::ValidationError(
                "mail.smtp_host is required when mail is enabled".into(),
            ));
        }
        Ok(())
    }
}

/// Format YAML parsing error with location
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!("at line {}, column {}: {}", location.line(), location.column(), e)
    } else {
        e.to_string()
    }
}

// Shared by every test that touches process environment.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn config_strategy() -> impl Strategy<Value = Config> {
        (
            1u16..=65535,
            prop_oneof![Just(DatabaseDriver::Sqlite), Just(DatabaseDriver::Mysql)],
            "[a-z][a-z0-9_/]{0,20}\\.db",
            1u64..=86400,
            "[a-zA-Z0-9]{8,32}",
        )
            .prop_map(|(port, driver, url, ttl, secret)| {
                let mut config = Config::default();
                config.server.port = port;
                config.database.driver = driver;
                config.database.url = url;
                config.auth.token_ttl_seconds = ttl;
                config.auth.jwt_secret = secret;
                config
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        #[test]
        fn config_survives_yaml_roundtrip(config in config_strategy()) {
            let yaml = serde_yaml::to_string(&config).expect("serialize");
            let mut file = NamedTempFile::new().expect("temp file");
            write!(file, "{}", yaml).expect("write");

            let parsed = Config::load(file.path()).expect("parse");
            prop_assert_eq!(parsed.server.port, config.server.port);
            prop_assert_eq!(parsed.database.driver, config.database.driver);
            prop_assert_eq!(&parsed.database.url, &config.database.url);
            prop_assert_eq!(parsed.auth.token_ttl_seconds, config.auth.token_ttl_seconds);
            prop_assert_eq!(&parsed.auth.jwt_secret, &config.auth.jwt_secret);
            prop_assert!(parsed.validate().is_ok());
        }

        #[test]
        fn wrong_types_are_parse_errors(yaml in prop_oneof![
            Just("server:\n  port: true\n"),
            Just("server: [1, 2]\n"),
            Just("database:\n  driver: postgres\n"),
            Just("cache:\n  driver: memcached\n"),
            Just("auth:\n  token_ttl_seconds: -5\n"),
        ]) {
            let mut file = NamedTempFile::new().expect("temp file");
            write!(file, "{}", yaml).expect("write");
            let is_parse_error = matches!(Config::load(file.path()), Err(ConfigError::ParseError { .. }));
            prop_assert!(is_parse_error);
        }
    }
}
