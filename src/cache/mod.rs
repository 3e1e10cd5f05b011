//! Cache layer
//!
//! Short-lived key/value state with per-entry expiry: password reset codes,
//! reader signup codes and the JWT blacklist.
//! - In-memory cache (moka), the default for a single instance
//! - Redis cache, optional, shared between instances
//!
//! # Usage
//!
//! ```rust,ignore
//! use newsdesk::cache::{create_cache, keys, CacheLayer};
//! use newsdesk::config::CacheConfig;
//!
//! let cache = create_cache(&CacheConfig::default()).await?;
//! cache.set(&keys::reset_code("a@b.c"), &"123456", Duration::from_secs(300)).await?;
//! ```

pub mod memory;
#[cfg(feature = "redis-cache")]
pub mod redis;

use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{CacheConfig, CacheDriver};

/// Cache layer trait
///
/// The methods are generic, so this is not object safe. Use the [`Cache`]
/// enum for runtime selection.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    /// Store `value` under `key`, expiring after `ttl`
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    async fn exists(&self, key: &str) -> Result<bool>;
}

pub use memory::MemoryCache;
#[cfg(feature = "redis-cache")]
pub use redis::RedisCache;

/// Cache key layout
pub mod keys {
    /// Password reset code for a staff account
    pub fn reset_code(email: &str) -> String {
        format!("reset:code:{}", email)
    }

    /// Email verification code for a reader signup
    pub fn reader_signup(email: &str) -> String {
        format!("reader:signup:{}", email)
    }

    /// Marker for a token revoked by logout
    pub fn blacklisted_token(token: &str) -> String {
        format!("blacklist:token:{}", token)
    }
}

/// Runtime-selected cache backend
#[derive(Debug)]
pub enum Cache {
    Memory(MemoryCache),
    #[cfg(feature = "redis-cache")]
    Redis(RedisCache),
}

#[async_trait]
impl CacheLayer for Cache {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        match self {
            Cache::Memory(cache) => cache.get(key).await,
            #[cfg(feature = "redis-cache")]
            Cache::Redis(cache) => cache.get(key).await,
        }
    }

    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        match self {
            Cache::Memory(cache) => cache.set(key, value, ttl).await,
            #[cfg(feature = "redis-cache")]
            Cache::Redis(cache) => cache.set(key, value, ttl).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match self {
            Cache::Memory(cache) => cache.delete(key).await,
            #[cfg(feature = "redis-cache")]
            Cache::Redis(cache) => cache.delete(key).await,
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        match self {
            Cache::Memory(cache) => cache.exists(key).await,
            #[cfg(feature = "redis-cache")]
            Cache::Redis(cache) => cache.exists(key).await,
        }
    }
}

/// Create the cache backend named in the configuration
///
/// # Errors
/// - Redis is configured but the `redis-cache` feature is not enabled
/// - Redis is configured without a URL, or the connection fails
pub async fn create_cache(config: &CacheConfig) -> Result<Arc<Cache>> {
    match config.driver {
        CacheDriver::Memory => Ok(Arc::new(Cache::Memory(MemoryCache::with_capacity(
            config.max_capacity,
        )))),
        CacheDriver::Redis => {
            #[cfg(feature = "redis-cache")]
            {
                let redis_url = config.redis_url.as_ref().ok_or_else(|| {
                    anyhow::anyhow!(
                        "Redis URL is required when using the Redis cache driver. \
                         Set 'redis_url' in the cache section or NEWSDESK_REDIS_URL."
                    )
                })?;
                let cache = RedisCache::new(redis_url).await?;
                Ok(Arc::new(Cache::Redis(cache)))
            }

            #[cfg(not(feature = "redis-cache"))]
            {
                anyhow::bail!(
                    "Redis cache driver is configured but the 'redis-cache' feature is not enabled. \
                     Either enable the feature with `--features redis-cache` or use the 'memory' driver."
                )
            }
        }
    }
}
