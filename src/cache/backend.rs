//! Cache backends
//!
//! [`CacheBackend`] is the capability the pipeline and the invalidator
//! share. Two implementations ship with the crate: an in-process store and a
//! pooled Redis client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::redis::AsyncCommands;
use deadpool_redis::{Pool, PoolConfig, Runtime, Timeouts};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::cache::CacheStore;
use crate::config::RedisSettings;
use crate::error::StoreError;

/// Shared key/value store used for cache-aside reads and invalidation.
///
/// Implementations synchronize internally; callers never lock.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Returns the stored value, `Ok(None)` on a miss.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Stores `value` under `key` for `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Deletes every key in `keys` and returns how many existed.
    async fn delete(&self, keys: &[String]) -> Result<u64, StoreError>;

    /// Releases connections. Called once on shutdown.
    async fn close(&self) {}
}

// == Memory Backend ==
/// In-process backend over a lock-guarded [`CacheStore`].
#[derive(Clone)]
pub struct MemoryBackend {
    store: Arc<RwLock<CacheStore>>,
}

impl MemoryBackend {
    pub fn new(max_entries: usize) -> Self {
        Self {
            store: Arc::new(RwLock::new(CacheStore::new(max_entries))),
        }
    }

    /// Handle to the underlying store, for the expiry sweep task.
    pub fn store(&self) -> Arc<RwLock<CacheStore>> {
        Arc::clone(&self.store)
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        // Write lock: reads refresh LRU order and drop expired entries
        Ok(self.store.write().await.get(key))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.store
            .write()
            .await
            .set(key.to_string(), value.to_string(), Some(ttl))
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, StoreError> {
        Ok(self.store.write().await.delete_many(keys))
    }
}

// == Redis Backend ==
/// Redis-backed store behind a deadpool connection pool.
///
/// Every command is bounded by the configured timeout so a hung server
/// surfaces as [`StoreError::Timeout`].
#[derive(Clone)]
pub struct RedisBackend {
    pool: Pool,
    timeout: Duration,
}

impl RedisBackend {
    /// Builds the pool and checks out one connection to prove the server is
    /// reachable.
    pub async fn connect(settings: &RedisSettings) -> Result<Self, StoreError> {
        let timeout = Duration::from_millis(settings.timeout_ms);

        let mut config = deadpool_redis::Config::from_url(settings.url());
        let mut pool_config = PoolConfig::new(settings.pool_size);
        pool_config.timeouts = Timeouts {
            wait: Some(timeout),
            create: Some(timeout),
            recycle: Some(timeout),
        };
        config.pool = Some(pool_config);

        let pool = config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let backend = Self { pool, timeout };

        backend.connection().await?;
        info!(
            host = %settings.host,
            port = settings.port,
            db = settings.db,
            "Connected to Redis cache store"
        );
        Ok(backend)
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection, StoreError> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn bounded<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: std::future::Future<Output = Result<T, deadpool_redis::redis::RedisError>>,
    {
        match tokio::time::timeout(self.timeout, op).await {
            Ok(result) => result.map_err(|e| StoreError::Unavailable(e.to_string())),
            Err(_) => Err(StoreError::Timeout(self.timeout.as_millis() as u64)),
        }
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection().await?;
        self.bounded(conn.get::<_, Option<String>>(key)).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        // Redis rejects SETEX 0
        let seconds = ttl.as_secs().max(1);
        self.bounded(conn.set_ex::<_, _, ()>(key, value, seconds)).await
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, StoreError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection().await?;
        self.bounded(conn.del::<_, u64>(keys)).await
    }

    async fn close(&self) {
        debug!("Closing Redis connection pool");
        self.pool.close();
    }
}
