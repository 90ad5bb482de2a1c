//! Hit/miss accounting for a cache store

use serde::Serialize;

/// Monotonic counters kept under the store lock
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Counters {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub evictions: u64,
}

/// Point-in-time snapshot returned by [`CacheStore::stats`](super::CacheStore::stats)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    /// Entries physically held, expired or not
    pub total_entries: usize,
    /// Entries that would be returned by `get`
    pub active_entries: usize,
    /// Entries past their expiry that have not been purged yet
    pub expired_entries: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    /// Explicit deletes, lazy purges, sweeps, clears and evictions
    pub deletes: u64,
    /// Entries removed to make room for a new key
    pub evictions: u64,
    /// `hits / (hits + misses)`, or 0 before any lookup
    pub hit_rate: f64,
}

impl CacheStats {
    pub(crate) fn new(
        counters: Counters,
        total_entries: usize,
        expired_entries: usize,
        max_size: usize,
    ) -> Self {
        let lookups = counters.hits + counters.misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            counters.hits as f64 / lookups as f64
        };

        Self {
            total_entries,
            active_entries: total_entries - expired_entries,
            expired_entries,
            max_size,
            hits: counters.hits,
            misses: counters.misses,
            sets: counters.sets,
            deletes: counters.deletes,
            evictions: counters.evictions,
            hit_rate,
        }
    }
}
