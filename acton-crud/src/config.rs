//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to lowest):
//! 1. Environment variables (prefix: `ACTON_`, nested keys separated by `__`,
//!    e.g. `ACTON_BULK__BATCH_SIZE=100`)
//! 2. A TOML file (`./config.toml`, or an explicit path)
//! 3. Default values

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,

    /// Bulk persistence configuration
    #[serde(default)]
    pub bulk: BulkConfig,

    /// Pagination limits
    #[serde(default)]
    pub pagination: PaginationConfig,

    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Service identity and log level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name, used in logs
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Log level or `EnvFilter` directive
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

/// Bulk persistence configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkConfig {
    /// Items written between flushes
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Clear the write session after every flush
    #[serde(default = "default_false")]
    pub clear_context_after_flush: bool,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            clear_context_after_flush: default_false(),
        }
    }
}

/// Pagination limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Page size used when a request does not specify one
    #[serde(default = "default_page_size")]
    pub default_page_size: u64,

    /// Largest page size a request may ask for
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether caching layers are installed
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Entry time-to-live in seconds; entries never expire when unset
    #[serde(default)]
    pub ttl_secs: Option<u64>,

    /// Redis store; the in-memory store is used when unset
    #[serde(default)]
    pub redis: Option<RedisConfig>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            ttl_secs: None,
            redis: None,
        }
    }
}

/// Redis configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL (redis://host:port)
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_redis_max_connections")]
    pub max_connections: usize,

    /// Connection timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,

    /// Maximum retry attempts for establishing the Redis connection
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay between retry attempts in seconds
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,

    /// Prefix for every cache key
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

fn default_service_name() -> String {
    "acton-crud".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_batch_size() -> usize {
    50
}

fn default_page_size() -> u64 {
    20
}

fn default_max_page_size() -> u64 {
    100
}

fn default_redis_max_connections() -> usize {
    20
}

fn default_connection_timeout() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_delay() -> u64 {
    2
}

fn default_key_prefix() -> String {
    "acton:".to_string()
}

fn default_true() -> bool {
    true
}

fn default_false() -> bool {
    false
}

impl Config {
    /// Load configuration from `./config.toml` (when present) and the
    /// environment
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    /// Load configuration from a specific file and the environment
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            tracing::info!("Loading configuration from: {}", path.display());
        } else {
            tracing::debug!("No configuration file at {}, using defaults", path.display());
        }

        let config: Config = Self::figment(path).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// The provider chain: defaults, then the TOML file, then `ACTON_`
    /// environment variables
    pub fn figment(path: impl AsRef<Path>) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("ACTON_").split("__"))
    }

    /// Reject settings the engines cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.bulk.batch_size == 0 {
            return Err(figment::Error::from("bulk.batch_size must be greater than zero".to_string()).into());
        }
        if self.pagination.max_page_size == 0 {
            return Err(
                figment::Error::from("pagination.max_page_size must be greater than zero".to_string()).into(),
            );
        }
        Ok(())
    }

    /// Get Redis URL
    pub fn redis_url(&self) -> Option<&str> {
        self.cache.redis.as_ref().map(|r| r.url.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("temp file");
        file.write_all(contents.as_bytes()).expect("write config");
        file
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service.log_level, "info");
        assert_eq!(config.bulk.batch_size, 50);
        assert!(!config.bulk.clear_context_after_flush);
        assert_eq!(config.pagination.default_page_size, 20);
        assert_eq!(config.pagination.max_page_size, 100);
        assert!(config.cache.enabled);
        assert!(config.redis_url().is_none());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load_from("/nonexistent/acton-crud/config.toml").unwrap();
        assert_eq!(config.bulk, BulkConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let file = write_config(
            r#"
            [service]
            name = "companies"

            [bulk]
            batch_size = 200
            clear_context_after_flush = true

            [cache.redis]
            url = "redis://localhost:6379"
            "#,
        );
        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.service.name, "companies");
        assert_eq!(config.service.log_level, "info");
        assert_eq!(config.bulk.batch_size, 200);
        assert!(config.bulk.clear_context_after_flush);
        assert_eq!(config.pagination.max_page_size, 100);
        let redis = config.cache.redis.expect("redis section");
        assert_eq!(redis.max_retries, 5);
        assert_eq!(redis.key_prefix, "acton:");
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let file = write_config("[bulk]\nbatch_size = 0\n");
        let err = Config::load_from(file.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn test_malformed_file_is_a_config_error() {
        let file = write_config("[bulk]\nbatch_size = \"many\"\n");
        assert!(matches!(Config::load_from(file.path()), Err(Error::Config(_))));
    }
}
