//! A single cached value plus its bookkeeping

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One entry in a [`CacheStore`](super::CacheStore)
///
/// The same shape is written to disk when persistence is enabled, so field
/// names double as the on-disk record format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    /// Key the entry is stored under
    pub key: String,
    /// The cached payload
    pub value: V,
    /// When the entry was written
    pub created_at: DateTime<Utc>,
    /// Last successful read, or the write time if never read
    pub last_accessed_at: DateTime<Utc>,
    /// `created_at + ttl`
    pub expires_at: DateTime<Utc>,
    /// Number of successful reads since the last write
    pub access_count: u64,
}

impl<V> CacheEntry<V> {
    pub fn new(key: impl Into<String>, value: V, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            key: key.into(),
            value,
            created_at: now,
            last_accessed_at: now,
            expires_at: now + ttl,
            access_count: 0,
        }
    }

    /// An entry is logically absent from the moment `now` reaches `expires_at`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Records a successful read
    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.last_accessed_at = now;
        self.access_count += 1;
    }
}
