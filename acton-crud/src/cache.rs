//! Named cache stores and the get-or-compute helpers used by the caching layer
//!
//! A cache store holds JSON values under `(name, key)` pairs. The caching
//! layer addresses several names at once: a lookup tries each name in order,
//! a store writes to all of them.
//!
//! # Example
//!
//! ```rust,ignore
//! use acton_crud::cache::{compute_if_absent, MemoryCacheStore};
//!
//! let store = MemoryCacheStore::new();
//! let names = vec!["companies".to_string()];
//! let company: CompanyDto = compute_if_absent(&store, &names, "42", || async {
//!     load_company(42).await
//! })
//! .await?;
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::config::CacheConfig;
use crate::error::Result;

/// Storage behind the caching layer
#[async_trait]
pub trait CacheStore: fmt::Debug + Send + Sync {
    /// Cached value, if any
    async fn get(&self, name: &str, key: &str) -> Result<Option<Value>>;

    /// Store a value, replacing any previous one
    async fn put(&self, name: &str, key: &str, value: Value) -> Result<()>;

    /// Remove one entry
    async fn evict(&self, name: &str, key: &str) -> Result<()>;

    /// Remove every entry of a cache
    async fn evict_all(&self, name: &str) -> Result<()>;
}

/// Return the first cached value found under `names`, or run `supplier`
/// and store its result under every name
///
/// A failing supplier propagates its error unchanged and nothing is stored.
/// A cached value that no longer deserializes is treated as a miss.
pub async fn compute_if_absent<T, F, Fut>(
    store: &dyn CacheStore,
    names: &[String],
    key: &str,
    supplier: F,
) -> Result<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    for name in names {
        if let Some(cached) = store.get(name, key).await? {
            match serde_json::from_value(cached) {
                Ok(value) => {
                    tracing::debug!(cache = %name, key, "cache hit");
                    return Ok(value);
                }
                Err(e) => {
                    tracing::warn!(cache = %name, key, error = %e, "discarding unreadable cache entry");
                }
            }
        }
    }

    tracing::debug!(cache = ?names, key, "cache miss");
    let value = supplier().await?;
    put(store, names, key, &value).await?;
    Ok(value)
}

/// Store `value` under `key` in every cache of `names`
pub async fn put<T: Serialize>(store: &dyn CacheStore, names: &[String], key: &str, value: &T) -> Result<()> {
    let json = serde_json::to_value(value)?;
    for name in names {
        store.put(name, key, json.clone()).await?;
    }
    Ok(())
}

/// Remove `key` from every cache of `names`
pub async fn evict(store: &dyn CacheStore, names: &[String], key: &str) -> Result<()> {
    for name in names {
        store.evict(name, key).await?;
    }
    tracing::debug!(cache = ?names, key, "cache entry evicted");
    Ok(())
}

/// Empty every cache of `names`
pub async fn evict_all(store: &dyn CacheStore, names: &[String]) -> Result<()> {
    for name in names {
        store.evict_all(name).await?;
    }
    tracing::debug!(cache = ?names, "caches cleared");
    Ok(())
}

/// Build the store described by the `cache` configuration section
///
/// Redis is used when configured and the `cache` feature is enabled,
/// otherwise an in-memory store.
pub async fn store_from_config(config: &CacheConfig) -> Result<Arc<dyn CacheStore>> {
    #[cfg(feature = "cache")]
    if let Some(redis) = &config.redis {
        let store = RedisCacheStore::connect(redis, config.ttl_secs).await?;
        return Ok(Arc::new(store));
    }

    if config.redis.is_some() {
        tracing::warn!("Redis cache configured but the `cache` feature is disabled; using memory store");
    }
    Ok(Arc::new(MemoryCacheStore::new()))
}

/// In-process cache store
///
/// Clones share the same entries. Entries never expire.
#[derive(Clone, Default)]
pub struct MemoryCacheStore {
    entries: Arc<DashMap<(String, String), Value>>,
}

impl MemoryCacheStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` is cached under `name`
    pub fn contains(&self, name: &str, key: &str) -> bool {
        self.entries.contains_key(&(name.to_string(), key.to_string()))
    }

    /// Number of entries across all caches
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no cache holds an entry
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for MemoryCacheStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCacheStore")
            .field("entries", &self.entries.len())
            .finish()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, name: &str, key: &str) -> Result<Option<Value>> {
        Ok(self
            .entries
            .get(&(name.to_string(), key.to_string()))
            .map(|entry| entry.value().clone()))
    }

    async fn put(&self, name: &str, key: &str, value: Value) -> Result<()> {
        self.entries.insert((name.to_string(), key.to_string()), value);
        Ok(())
    }

    async fn evict(&self, name: &str, key: &str) -> Result<()> {
        self.entries.remove(&(name.to_string(), key.to_string()));
        Ok(())
    }

    async fn evict_all(&self, name: &str) -> Result<()> {
        self.entries.retain(|(cache, _), _| cache != name);
        Ok(())
    }
}

#[cfg(feature = "cache")]
pub use redis_impl::{create_pool, RedisCacheStore};

#[cfg(feature = "cache")]
mod redis_impl {
    use std::time::Duration;

    use async_trait::async_trait;
    use deadpool_redis::{Config as DeadpoolConfig, Pool, Runtime};
    use serde_json::Value;

    use super::CacheStore;
    use crate::config::RedisConfig;
    use crate::error::{Error, Result};

    /// Keys scanned per SCAN round trip
    const SCAN_COUNT: usize = 100;

    /// Create a Redis connection pool, retrying with exponential backoff
    pub async fn create_pool(config: &RedisConfig) -> Result<Pool> {
        let mut attempt = 0;
        let base_delay = Duration::from_secs(config.retry_delay_secs);

        loop {
            match try_create_pool(config).await {
                Ok(pool) => {
                    if attempt > 0 {
                        tracing::info!(
                            "Redis cache connection established after {} attempt(s)",
                            attempt + 1
                        );
                    } else {
                        tracing::info!(
                            "Redis cache pool created: max_connections={}",
                            config.max_connections
                        );
                    }
                    return Ok(pool);
                }
                Err(e) => {
                    attempt += 1;

                    if attempt > config.max_retries {
                        tracing::error!(
                            "Failed to connect to Redis after {} attempts: {}",
                            config.max_retries + 1,
                            e
                        );
                        return Err(e);
                    }

                    let delay = base_delay * 2_u32.pow(attempt.saturating_sub(1));
                    tracing::warn!(
                        "Redis connection attempt {} failed: {}. Retrying in {:?}...",
                        attempt,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn try_create_pool(config: &RedisConfig) -> Result<Pool> {
        let pool = DeadpoolConfig::from_url(&config.url)
            .builder()
            .map_err(|e| Error::Cache(format!("Failed to build Redis pool: {}", e)))?
            .max_size(config.max_connections)
            .wait_timeout(Some(Duration::from_secs(config.connection_timeout_secs)))
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| Error::Cache(format!("Failed to create Redis pool: {}", e)))?;

        // Fail fast on an unreachable server
        drop(connection(&pool).await?);
        Ok(pool)
    }

    async fn connection(pool: &Pool) -> Result<deadpool_redis::Connection> {
        pool.get()
            .await
            .map_err(|e| Error::Cache(format!("Failed to get Redis connection: {}", e)))
    }

    /// Redis-backed cache store
    ///
    /// Entries live under `{prefix}{name}::{key}` as JSON strings.
    #[derive(Clone)]
    pub struct RedisCacheStore {
        pool: Pool,
        key_prefix: String,
        ttl_secs: Option<u64>,
    }

    impl std::fmt::Debug for RedisCacheStore {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("RedisCacheStore")
                .field("key_prefix", &self.key_prefix)
                .field("ttl_secs", &self.ttl_secs)
                .finish()
        }
    }

    impl RedisCacheStore {
        /// Store over an existing pool
        pub fn new(pool: Pool, key_prefix: impl Into<String>, ttl_secs: Option<u64>) -> Self {
            Self {
                pool,
                key_prefix: key_prefix.into(),
                ttl_secs,
            }
        }

        /// Create a pool from configuration and wrap it
        pub async fn connect(config: &RedisConfig, ttl_secs: Option<u64>) -> Result<Self> {
            let pool = create_pool(config).await?;
            Ok(Self::new(pool, config.key_prefix.clone(), ttl_secs))
        }

        pub(super) fn entry_key(&self, name: &str, key: &str) -> String {
            format!("{}{}::{}", self.key_prefix, name, key)
        }

        fn cache_pattern(&self, name: &str) -> String {
            format!("{}{}::*", self.key_prefix, name)
        }
    }

    #[async_trait]
    impl CacheStore for RedisCacheStore {
        async fn get(&self, name: &str, key: &str) -> Result<Option<Value>> {
            use deadpool_redis::redis::AsyncCommands;

            let mut conn = connection(&self.pool).await?;
            let json: Option<String> = conn.get(self.entry_key(name, key)).await?;
            json.map(|j| serde_json::from_str(&j).map_err(Error::from))
                .transpose()
        }

        async fn put(&self, name: &str, key: &str, value: Value) -> Result<()> {
            use deadpool_redis::redis::AsyncCommands;

            let json = serde_json::to_string(&value)?;
            let entry = self.entry_key(name, key);
            let mut conn = connection(&self.pool).await?;
            match self.ttl_secs {
                Some(ttl) => conn.set_ex::<_, _, ()>(&entry, json, ttl).await?,
                None => conn.set::<_, _, ()>(&entry, json).await?,
            }
            Ok(())
        }

        async fn evict(&self, name: &str, key: &str) -> Result<()> {
            use deadpool_redis::redis::AsyncCommands;

            let mut conn = connection(&self.pool).await?;
            conn.del::<_, ()>(self.entry_key(name, key)).await?;
            Ok(())
        }

        async fn evict_all(&self, name: &str) -> Result<()> {
            use deadpool_redis::redis::AsyncCommands;

            let pattern = self.cache_pattern(name);
            let mut conn = connection(&self.pool).await?;
            let mut cursor: u64 = 0;
            loop {
                let (next, keys): (u64, Vec<String>) = deadpool_redis::redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(&pattern)
                    .arg("COUNT")
                    .arg(SCAN_COUNT)
                    .query_async(&mut conn)
                    .await?;
                if !keys.is_empty() {
                    conn.del::<_, ()>(keys).await?;
                }
                if next == 0 {
                    return Ok(());
                }
                cursor = next;
            }
        }
    }
}
