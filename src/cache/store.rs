//! Cache Store Module
//!
//! In-process key/value table with TTL expiry and LRU capacity eviction.
//! Not synchronized by itself; [`MemoryBackend`](super::MemoryBackend)
//! wraps it in a lock.

use std::collections::HashMap;
use std::time::Duration;

use crate::cache::{CacheEntry, LruTracker, MAX_KEY_LENGTH};
use crate::error::StoreError;

// == Cache Store ==
#[derive(Debug)]
pub struct CacheStore {
    entries: HashMap<String, CacheEntry>,
    lru: LruTracker,
    max_entries: usize,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a store that holds at most `max_entries` entries.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            max_entries,
        }
    }

    // == Set ==
    /// Stores a payload, replacing any previous value and resetting its TTL.
    ///
    /// At capacity the least recently used entry is evicted first.
    pub fn set(&mut self, key: String, value: String, ttl: Option<Duration>) -> Result<(), StoreError> {
        if key.is_empty() || key.len() > MAX_KEY_LENGTH {
            return Err(StoreError::InvalidKey(format!(
                "key must be 1..={} bytes, got {}",
                MAX_KEY_LENGTH,
                key.len()
            )));
        }

        let is_overwrite = self.entries.contains_key(&key);
        if !is_overwrite && self.entries.len() >= self.max_entries {
            match self.lru.evict_oldest() {
                Some(evicted) => {
                    self.entries.remove(&evicted);
                }
                None => {
                    return Err(StoreError::CapacityExhausted(format!(
                        "store holds no evictable entries (capacity {})",
                        self.max_entries
                    )))
                }
            }
        }

        self.lru.touch(&key);
        self.entries.insert(key, CacheEntry::new(value, ttl));
        Ok(())
    }

    // == Get ==
    /// Returns the live value for `key`; expired entries are dropped and read
    /// as absent.
    pub fn get(&mut self, key: &str) -> Option<String> {
        let expired = self.entries.get(key)?.is_expired();
        if expired {
            self.entries.remove(key);
            self.lru.remove(key);
            return None;
        }

        self.lru.touch(key);
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    // == Delete ==
    /// Removes `key`, reporting whether it was present.
    pub fn delete(&mut self, key: &str) -> bool {
        self.lru.remove(key);
        self.entries.remove(key).is_some()
    }

    /// Removes every key in `keys`; absent keys are skipped.
    pub fn delete_many(&mut self, keys: &[String]) -> u64 {
        keys.iter().filter(|key| self.delete(key)).count() as u64
    }

    // == Cleanup Expired ==
    /// Removes all expired entries, returning how many were dropped.
    pub fn cleanup_expired(&mut self) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.entries.remove(key);
            self.lru.remove(key);
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
