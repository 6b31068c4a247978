//! Cache Entry Module
//!
//! A stored upstream payload together with its insertion time and TTL.

use std::time::Duration;

use chrono::{DateTime, Utc};

// == Cache Entry ==
/// A single cached payload.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Raw upstream payload
    pub value: String,
    /// When the entry was written
    pub inserted_at: DateTime<Utc>,
    /// Lifetime from `inserted_at`; `None` never expires
    pub ttl: Option<Duration>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry stamped with the current time.
    pub fn new(value: String, ttl: Option<Duration>) -> Self {
        Self {
            value,
            inserted_at: Utc::now(),
            ttl,
        }
    }

    // == Expires At ==
    /// Absolute expiry time, if the entry has a TTL.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.ttl.map(|ttl| {
            // TTLs too large for chrono never expire in practice
            let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
            self.inserted_at
                .checked_add_signed(ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        })
    }

    // == Is Expired ==
    /// An entry is expired once the current time reaches its expiry time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at() {
            Some(expires) => now >= expires,
            None => false,
        }
    }

    // == Time To Live ==
    /// Remaining lifetime, zero once expired, `None` without a TTL.
    #[cfg(test)]
    pub(crate) fn ttl_remaining(&self) -> Option<Duration> {
        self.expires_at()
            .map(|expires| (expires - Utc::now()).to_std().unwrap_or(Duration::ZERO))
    }
}
