//! Route cache invalidation (control plane).
//!
//! Unlike the read path, store failures here are surfaced: an explicit
//! invalidation must be confirmed, not silently dropped.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::cache::CacheBackend;
use crate::error::{PipelineError, Result};
use crate::models::InvalidationRequest;

/// Deletes cache entries and optionally writes replacement values.
#[derive(Clone)]
pub struct Invalidator {
    cache: Arc<dyn CacheBackend>,
    ttl: Duration,
}

impl Invalidator {
    /// `ttl` applies to reseeded values.
    pub fn new(cache: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    /// Deletes every target key. Returns how many existed.
    pub async fn evict(&self, request: &InvalidationRequest) -> Result<u64> {
        let removed = self
            .cache
            .delete(&request.target_keys)
            .await
            .map_err(PipelineError::Invalidation)?;

        info!(
            targets = ?request.target_keys,
            removed,
            "Evicted route cache entries"
        );
        Ok(removed)
    }

    /// Deletes the target keys, then writes each reseed pair in order.
    ///
    /// Not transactional: if a write fails the deleted keys stay deleted.
    pub async fn evict_and_reseed(&self, request: &InvalidationRequest) -> Result<u64> {
        let removed = self.evict(request).await?;

        for (key, value) in &request.reseed {
            if let Err(err) = self.cache.set(key, value, self.ttl).await {
                warn!(key = %key, error = %err, "Reseed write failed");
                return Err(PipelineError::Invalidation(err));
            }
        }

        if !request.reseed.is_empty() {
            info!(count = request.reseed.len(), "Reseeded route cache entries");
        }
        Ok(removed)
    }
}
