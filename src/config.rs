//! Configuration Module
//!
//! Process configuration loaded from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Four days, the freshness window for rendered pages and static assets.
pub const DEFAULT_FRESHNESS_SECS: u64 = 345_600;

// == Log Format ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "dev" => Ok(LogFormat::Pretty),
            "compact" | "short" | "tiny" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format `{other}`")),
        }
    }
}

// == Cache Backend Kind ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackendKind {
    Memory,
    Redis,
}

impl FromStr for CacheBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(CacheBackendKind::Memory),
            "redis" => Ok(CacheBackendKind::Redis),
            other => Err(format!("unknown cache backend `{other}`")),
        }
    }
}

// == Redis Settings ==
/// Connection parameters for the Redis cache store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    pub db: u32,
    pub password: Option<String>,
    pub pool_size: usize,
    /// Bound on pool checkout and on each command
    pub timeout_ms: u64,
}

impl RedisSettings {
    pub fn url(&self) -> String {
        match &self.password {
            Some(password) => format!(
                "redis://:{}@{}:{}/{}",
                password, self.host, self.port, self.db
            ),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            db: 0,
            password: None,
            pool_size: 16,
            timeout_ms: 500,
        }
    }
}

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub port: u16,
    /// Base URL of the upstream content API
    pub api_base: String,
    /// Directory served for unmatched paths
    pub static_dir: String,
    pub log_format: LogFormat,
    pub cache_backend: CacheBackendKind,
    pub redis: RedisSettings,
    /// Lifetime of cached upstream payloads, in seconds
    pub cache_ttl: u64,
    /// Capacity of the in-memory store
    pub max_entries: usize,
    /// Expiry sweep interval of the in-memory store, in seconds
    pub cleanup_interval: u64,
    pub upstream_timeout_ms: u64,
    /// `max-age` sent with rendered pages, in seconds
    pub freshness_secs: u64,
    pub error_template: String,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `PORT` - HTTP server port (default: 3000)
    /// - `API_BASE` - upstream API base URL (default: `http://localhost/api/`)
    /// - `STATIC_DIR` - static asset directory (default: `public`)
    /// - `LOG_FORMAT` - `pretty`, `compact` or `json` (default: `pretty`)
    /// - `CACHE_BACKEND` - `memory` or `redis` (default: `memory`)
    /// - `REDIS_HOST`, `REDIS_PORT`, `REDIS_DB`, `REDIS_PASSWORD`,
    ///   `REDIS_POOL_SIZE`, `STORE_TIMEOUT_MS` - Redis connection
    /// - `CACHE_TTL` - cached payload lifetime in seconds (default: 345600)
    /// - `MAX_ENTRIES` - in-memory capacity (default: 10000)
    /// - `CLEANUP_INTERVAL` - in-memory sweep interval in seconds (default: 60)
    /// - `UPSTREAM_TIMEOUT_MS` - upstream request timeout (default: 5000)
    /// - `FRESHNESS_SECS` - page `max-age` (default: 345600)
    /// - `ERROR_TEMPLATE` - error page template (default: `error.html`)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            port: parse_env("PORT").unwrap_or(defaults.port),
            api_base: env::var("API_BASE").unwrap_or(defaults.api_base),
            static_dir: env::var("STATIC_DIR").unwrap_or(defaults.static_dir),
            log_format: parse_env("LOG_FORMAT").unwrap_or(defaults.log_format),
            cache_backend: parse_env("CACHE_BACKEND").unwrap_or(defaults.cache_backend),
            redis: RedisSettings {
                host: env::var("REDIS_HOST").unwrap_or(defaults.redis.host),
                port: parse_env("REDIS_PORT").unwrap_or(defaults.redis.port),
                db: parse_env("REDIS_DB").unwrap_or(defaults.redis.db),
                password: env::var("REDIS_PASSWORD").ok().filter(|p| !p.is_empty()),
                pool_size: parse_env("REDIS_POOL_SIZE").unwrap_or(defaults.redis.pool_size),
                timeout_ms: parse_env("STORE_TIMEOUT_MS").unwrap_or(defaults.redis.timeout_ms),
            },
            cache_ttl: parse_env("CACHE_TTL").unwrap_or(defaults.cache_ttl),
            max_entries: parse_env("MAX_ENTRIES").unwrap_or(defaults.max_entries),
            cleanup_interval: parse_env("CLEANUP_INTERVAL").unwrap_or(defaults.cleanup_interval),
            upstream_timeout_ms: parse_env("UPSTREAM_TIMEOUT_MS")
                .unwrap_or(defaults.upstream_timeout_ms),
            freshness_secs: parse_env("FRESHNESS_SECS").unwrap_or(defaults.freshness_secs),
            error_template: env::var("ERROR_TEMPLATE").unwrap_or(defaults.error_template),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }
}

fn parse_env<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            api_base: "http://localhost/api/".to_string(),
            static_dir: "public".to_string(),
            log_format: LogFormat::Pretty,
            cache_backend: CacheBackendKind::Memory,
            redis: RedisSettings::default(),
            cache_ttl: DEFAULT_FRESHNESS_SECS,
            max_entries: 10_000,
            cleanup_interval: 60,
            upstream_timeout_ms: 5_000,
            freshness_secs: DEFAULT_FRESHNESS_SECS,
            error_template: "error.html".to_string(),
        }
    }
}
