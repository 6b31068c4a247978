//! Cache Module
//!
//! Route cache for raw upstream payloads: content-derived keys, the
//! [`CacheBackend`] capability, and an in-process store with TTL expiration
//! and LRU eviction.

mod backend;
mod entry;
mod key;
mod lru;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use backend::{CacheBackend, MemoryBackend, RedisBackend};
pub use entry::CacheEntry;
pub use key::CacheKey;
pub use store::CacheStore;

pub(crate) use lru::LruTracker;

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;
