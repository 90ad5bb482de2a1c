//! Thread-safe TTL cache with approximate-LRU eviction
//!
//! `CacheStore` is the one shared mutable resource of the application. All
//! reads and writes go through a single mutex; callers that need to do slow
//! work on a miss (network fetches) must do it between `lookup` and `set`,
//! never while holding anything from the store.

use chrono::Duration;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

use super::stats::Counters;
use super::{CacheEntry, CacheStats, Clock, DiskPersistence, SystemClock};

/// Default time-to-live for entries written without an explicit TTL
pub const DEFAULT_TTL_SECS: i64 = 3600;

/// Default maximum number of entries
pub const DEFAULT_MAX_SIZE: usize = 1000;

/// Admission and expiry settings for a store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// When false, every lookup misses and writes are dropped
    pub enabled: bool,
    /// TTL applied by `set` when none is given
    pub default_ttl: Duration,
    /// Upper bound on the number of entries held
    pub max_size: usize,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl: Duration::seconds(DEFAULT_TTL_SECS),
            max_size: DEFAULT_MAX_SIZE,
        }
    }
}

/// Outcome of a [`CacheStore::lookup`]
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<V> {
    /// Entry present and unexpired
    Fresh(V),
    /// Entry was present but expired; it has been purged and counted as a miss
    Stale(V),
    /// Nothing stored under the key
    Missing,
}

impl<V> Lookup<V> {
    /// The value only if it was fresh
    pub fn fresh(self) -> Option<V> {
        match self {
            Lookup::Fresh(value) => Some(value),
            Lookup::Stale(_) | Lookup::Missing => None,
        }
    }
}

struct StoreInner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    counters: Counters,
}

/// Key/value cache shared across query tasks
///
/// Construct one per value type at startup and hand it around in an `Arc`.
/// With a [`DiskPersistence`] attached, unexpired entries are loaded on
/// construction and every mutation is mirrored to disk after the in-memory
/// write. Disk failures are logged and otherwise ignored.
pub struct CacheStore<V> {
    inner: Mutex<StoreInner<V>>,
    policy: CachePolicy,
    clock: Arc<dyn Clock>,
    persistence: Option<DiskPersistence>,
}

impl<V> fmt::Debug for CacheStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStore")
            .field("policy", &self.policy)
            .field("clock", &self.clock)
            .field("persistence", &self.persistence)
            .finish_non_exhaustive()
    }
}

impl<V> CacheStore<V>
where
    V: Clone + Serialize + DeserializeOwned,
{
    /// Creates an in-memory store using the system clock
    pub fn new(policy: CachePolicy) -> Self {
        Self::open(policy, Arc::new(SystemClock), None)
    }

    /// Creates a store, hydrating it from `persistence` when given
    pub fn open(
        policy: CachePolicy,
        clock: Arc<dyn Clock>,
        persistence: Option<DiskPersistence>,
    ) -> Self {
        let policy = CachePolicy {
            max_size: policy.max_size.max(1),
            ..policy
        };

        let store = Self {
            inner: Mutex::new(StoreInner {
                entries: HashMap::new(),
                counters: Counters::default(),
            }),
            policy,
            clock,
            persistence,
        };
        store.hydrate();
        store
    }

    /// Loads unexpired persisted entries, keeping at most `max_size` of them
    ///
    /// Records are written on mutation only, so a record's `last_accessed_at`
    /// is the time it was last set. Trimming keeps the most recently written.
    fn hydrate(&self) {
        let Some(persistence) = self.persistence.as_ref() else {
            return;
        };
        if !self.policy.enabled {
            return;
        }

        let mut loaded = persistence.load::<V>(self.clock.now());
        if loaded.len() > self.policy.max_size {
            loaded.sort_by(|a, b| {
                b.last_accessed_at
                    .cmp(&a.last_accessed_at)
                    .then_with(|| a.key.cmp(&b.key))
            });
            for dropped in loaded.drain(self.policy.max_size..) {
                self.forget(&dropped.key);
            }
        }

        debug!(
            dir = %persistence.dir().display(),
            count = loaded.len(),
            "loaded persisted cache entries"
        );

        let mut inner = self.lock();
        for entry in loaded {
            inner.entries.insert(entry.key.clone(), entry);
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner<V>> {
        // Every operation leaves the map and counters consistent before it can panic.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The effective policy, with `max_size` already raised to at least 1
    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// The disk binding, if this store mirrors its entries
    pub fn persistence(&self) -> Option<&DiskPersistence> {
        self.persistence.as_ref()
    }

    /// Returns the value for `key` if present and unexpired
    pub fn get(&self, key: &str) -> Option<V> {
        self.lookup(key).fresh()
    }

    /// Looks up `key`, handing back an expired value as [`Lookup::Stale`]
    ///
    /// Bookkeeping is identical to `get`: a hit bumps the entry's access time
    /// and count, an expired entry is removed and counted as a miss and a delete.
    pub fn lookup(&self, key: &str) -> Lookup<V> {
        let now = self.clock.now();
        let mut guard = self.lock();
        let inner = &mut *guard;

        if !self.policy.enabled {
            inner.counters.misses += 1;
            return Lookup::Missing;
        }

        match inner.entries.get_mut(key) {
            None => {
                inner.counters.misses += 1;
                return Lookup::Missing;
            }
            Some(entry) if !entry.is_expired(now) => {
                entry.touch(now);
                inner.counters.hits += 1;
                return Lookup::Fresh(entry.value.clone());
            }
            Some(_) => {}
        }

        inner.counters.misses += 1;
        match inner.entries.remove(key) {
            Some(expired) => {
                inner.counters.deletes += 1;
                self.forget(key);
                Lookup::Stale(expired.value)
            }
            None => Lookup::Missing,
        }
    }

    /// Stores `value` under `key`
    ///
    /// A new key arriving at capacity evicts exactly one entry first.
    /// Overwriting an existing key never evicts and resets its access time.
    ///
    /// # Arguments
    /// * `key` - Cache key (e.g., "year:2024")
    /// * `value` - The value to cache
    /// * `ttl` - Lifetime of the entry, or `None` for the policy default
    pub fn set(&self, key: &str, value: V, ttl: Option<Duration>) {
        if !self.policy.enabled {
            return;
        }

        let ttl = ttl.unwrap_or(self.policy.default_ttl);
        let now = self.clock.now();
        let mut guard = self.lock();
        let inner = &mut *guard;

        if !inner.entries.contains_key(key) && inner.entries.len() >= self.policy.max_size {
            self.evict_one(inner);
        }

        inner
            .entries
            .insert(key.to_string(), CacheEntry::new(key, value, now, ttl));
        inner.counters.sets += 1;

        if let Some(entry) = inner.entries.get(key) {
            self.persist(entry);
        }
    }

    /// Removes `key`, returning whether anything was removed
    pub fn delete(&self, key: &str) -> bool {
        let mut inner = self.lock();
        let removed = inner.entries.remove(key).is_some();
        if removed {
            inner.counters.deletes += 1;
        }
        self.forget(key);
        removed
    }

    /// Removes every entry; each one counts as a delete
    pub fn clear(&self) {
        let mut inner = self.lock();
        let cleared = inner.entries.len();
        inner.entries.clear();
        inner.counters.deletes += cleared as u64;

        if let Some(persistence) = self.persistence.as_ref() {
            if let Err(e) = persistence.remove_all() {
                warn!(dir = %persistence.dir().display(), error = %e, "failed to clear persisted cache");
            }
        }
    }

    /// Removes all expired entries, returning how many were removed
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut inner = self.lock();

        let expired: Vec<String> = inner
            .entries
            .values()
            .filter(|entry| entry.is_expired(now))
            .map(|entry| entry.key.clone())
            .collect();

        for key in &expired {
            inner.entries.remove(key);
            self.forget(key);
        }
        inner.counters.deletes += expired.len() as u64;

        if !expired.is_empty() {
            debug!(removed = expired.len(), "swept expired cache entries");
        }
        expired.len()
    }

    /// Zeroes the hit/miss/set/delete/eviction counters, keeping the entries
    pub fn reset_stats(&self) {
        self.lock().counters = Counters::default();
    }

    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let inner = self.lock();
        let expired = inner
            .entries
            .values()
            .filter(|entry| entry.is_expired(now))
            .count();
        CacheStats::new(inner.counters, inner.entries.len(), expired, self.policy.max_size)
    }

    /// Number of entries held, including expired ones not yet purged
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether an unexpired entry exists, without touching it or the counters
    pub fn contains_key(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.lock()
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    /// Time left before `key` expires, without touching it or the counters
    ///
    /// # Returns
    /// * `Some(remaining)` if an unexpired entry exists
    /// * `None` if the key is missing, expired, or the store is disabled
    pub fn time_to_live(&self, key: &str) -> Option<Duration> {
        let now = self.clock.now();
        self.lock()
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.expires_at - now)
    }

    /// Evicts the least recently accessed entry, lowest key first on ties
    fn evict_one(&self, inner: &mut StoreInner<V>) {
        let victim = inner
            .entries
            .values()
            .min_by(|a, b| {
                a.last_accessed_at
                    .cmp(&b.last_accessed_at)
                    .then_with(|| a.key.cmp(&b.key))
            })
            .map(|entry| entry.key.clone());

        if let Some(key) = victim {
            inner.entries.remove(&key);
            inner.counters.deletes += 1;
            inner.counters.evictions += 1;
            debug!(key = %key, "evicted cache entry");
            self.forget(&key);
        }
    }

    fn persist(&self, entry: &CacheEntry<V>) {
        if let Some(persistence) = self.persistence.as_ref() {
            if let Err(e) = persistence.write(entry) {
                warn!(key = %entry.key, error = %e, "failed to persist cache entry");
            }
        }
    }

    fn forget(&self, key: &str) {
        if let Some(persistence) = self.persistence.as_ref() {
            if let Err(e) = persistence.remove(key) {
                warn!(key = %key, error = %e, "failed to remove persisted cache entry");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use chrono::{TimeZone, Utc};
    use std::thread;
    use tempfile::TempDir;

    fn policy(max_size: usize) -> CachePolicy {
        CachePolicy {
            enabled: true,
            default_ttl: Duration::seconds(60),
            max_size,
        }
    }

    fn test_store(max_size: usize) -> (CacheStore<String>, ManualClock) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let store = CacheStore::open(policy(max_size), Arc::new(clock.clone()), None);
        (store, clock)
    }

    fn value(s: &str) -> String {
        s.to_string()
    }

    #[test]
    fn test_set_then_get_returns_value() {
        let (store, _clock) = test_store(10);

        store.set("year:2024", value("days"), None);

        assert_eq!(store.get("year:2024"), Some(value("days")));
        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.sets, 1);
    }

    #[test]
    fn test_get_missing_key_counts_miss() {
        let (store, _clock) = test_store(10);

        assert_eq!(store.get("nope"), None);
        assert_eq!(store.stats().misses, 1);
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let (store, clock) = test_store(10);
        store.set("k", value("v"), Some(Duration::seconds(30)));

        clock.advance(Duration::seconds(29));
        assert_eq!(store.get("k"), Some(value("v")));

        clock.advance(Duration::seconds(1));
        let misses_before = store.stats().misses;
        assert_eq!(store.get("k"), None);

        let stats = store.stats();
        assert_eq!(stats.misses, misses_before + 1);
        assert_eq!(stats.deletes, 1);
        assert_eq!(stats.total_entries, 0);
    }

    #[test]
    fn test_default_ttl_applies_when_none_given() {
        let (store, clock) = test_store(10);
        store.set("k", value("v"), None);

        clock.advance(Duration::seconds(60));

        assert_eq!(store.get("k"), None);
    }

    #[test]
    fn test_lookup_hands_back_stale_value_once() {
        let (store, clock) = test_store(10);
        store.set("k", value("old"), Some(Duration::seconds(5)));
        clock.advance(Duration::seconds(10));

        assert_eq!(store.lookup("k"), Lookup::Stale(value("old")));
        assert_eq!(store.lookup("k"), Lookup::Missing);

        let stats = store.stats();
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.deletes, 1);
    }

    #[test]
    fn test_hit_updates_access_bookkeeping() {
        let (store, clock) = test_store(10);
        store.set("k", value("v"), None);
        clock.advance(Duration::seconds(3));

        store.get("k");
        store.get("k");

        let inner = store.lock();
        let entry = inner.entries.get("k").unwrap();
        assert_eq!(entry.access_count, 2);
        assert_eq!(entry.last_accessed_at, clock.now());
    }

    #[test]
    fn test_overwrite_resets_access_time_and_never_evicts() {
        let (store, clock) = test_store(2);
        store.set("a", value("1"), None);
        store.set("b", value("2"), None);
        clock.advance(Duration::seconds(1));
        store.get("a");

        store.set("a", value("3"), None);

        assert_eq!(store.len(), 2);
        assert_eq!(store.stats().evictions, 0);
        let inner = store.lock();
        let entry = inner.entries.get("a").unwrap();
        assert_eq!(entry.value, "3");
        assert_eq!(entry.access_count, 0);
        assert_eq!(entry.last_accessed_at, clock.now());
    }

    #[test]
    fn test_eviction_removes_least_recently_accessed() {
        let (store, clock) = test_store(2);
        store.set("a", value("1"), None);
        clock.advance(Duration::seconds(1));
        store.set("b", value("2"), None);
        clock.advance(Duration::seconds(1));
        store.get("a");
        clock.advance(Duration::seconds(1));

        store.set("c", value("3"), None);

        assert!(store.contains_key("a"));
        assert!(!store.contains_key("b"));
        assert!(store.contains_key("c"));
        let stats = store.stats();
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.deletes, 1);
    }

    #[test]
    fn test_eviction_ties_break_on_lowest_key() {
        let (store, _clock) = test_store(2);
        store.set("b", value("1"), None);
        store.set("a", value("2"), None);

        store.set("c", value("3"), None);

        assert!(!store.contains_key("a"));
        assert!(store.contains_key("b"));
    }

    #[test]
    fn test_size_never_exceeds_max() {
        let (store, clock) = test_store(5);
        for i in 0..50 {
            store.set(&format!("key:{i}"), value("v"), None);
            clock.advance(Duration::milliseconds(10));
            assert!(store.len() <= 5);
        }
        assert_eq!(store.stats().evictions, 45);
    }

    #[test]
    fn test_delete() {
        let (store, _clock) = test_store(10);
        store.set("k", value("v"), None);

        assert!(store.delete("k"));
        assert!(!store.delete("k"));
        assert_eq!(store.get("k"), None);
        assert_eq!(store.stats().deletes, 1);
    }

    #[test]
    fn test_clear_counts_removed_entries_as_deletes() {
        let (store, _clock) = test_store(10);
        store.set("a", value("1"), None);
        store.set("b", value("2"), None);
        store.set("c", value("3"), None);
        store.delete("c");

        store.clear();

        assert_eq!(store.get("a"), None);
        assert_eq!(store.get("b"), None);
        assert_eq!(store.stats().deletes, 3);
    }

    #[test]
    fn test_sweep_expired_removes_only_expired() {
        let (store, clock) = test_store(10);
        store.set("short", value("1"), Some(Duration::seconds(5)));
        store.set("long", value("2"), Some(Duration::seconds(500)));
        clock.advance(Duration::seconds(10));

        assert_eq!(store.stats().expired_entries, 1);
        assert_eq!(store.sweep_expired(), 1);

        let stats = store.stats();
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.expired_entries, 0);
        assert_eq!(stats.deletes, 1);
        assert!(store.contains_key("long"));
    }

    #[test]
    fn test_hit_rate() {
        let (store, _clock) = test_store(10);
        assert_eq!(store.stats().hit_rate, 0.0);

        store.set("k", value("v"), None);
        store.get("k");
        store.get("k");
        store.get("k");
        store.get("missing");

        assert!((store.stats().hit_rate - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_time_to_live_counts_down_without_bookkeeping() {
        let (store, clock) = test_store(10);
        store.set("k", value("v"), Some(Duration::seconds(30)));
        clock.advance(Duration::seconds(12));

        assert_eq!(store.time_to_live("k"), Some(Duration::seconds(18)));
        assert_eq!(store.time_to_live("missing"), None);

        clock.advance(Duration::seconds(18));
        assert_eq!(store.time_to_live("k"), None);

        let stats = store.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn test_reset_stats() {
        let (store, _clock) = test_store(10);
        store.set("k", value("v"), None);
        store.get("k");

        store.reset_stats();

        let stats = store.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.sets, 0);
        assert_eq!(stats.total_entries, 1);
    }

    #[test]
    fn test_disabled_store_never_caches() {
        let store: CacheStore<String> = CacheStore::new(CachePolicy {
            enabled: false,
            ..Default::default()
        });

        store.set("k", value("v"), None);

        assert_eq!(store.get("k"), None);
        assert!(store.is_empty());
        let stats = store.stats();
        assert_eq!(stats.sets, 0);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_zero_max_size_is_treated_as_one() {
        let (store, _clock) = test_store(0);
        store.set("a", value("1"), None);
        store.set("b", value("2"), None);

        assert_eq!(store.len(), 1);
        assert!(store.contains_key("b"));
    }

    #[test]
    fn test_concurrent_access_keeps_bounds_and_counts() {
        let store: Arc<CacheStore<String>> = Arc::new(CacheStore::new(policy(16)));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..100 {
                        let key = format!("year:{}", (t * 100 + i) % 40);
                        store.set(&key, format!("{t}-{i}"), None);
                        store.get(&key);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("worker thread panicked");
        }

        let stats = store.stats();
        assert!(stats.total_entries <= 16);
        assert_eq!(stats.sets, 800);
        assert_eq!(stats.hits + stats.misses, 800);
    }

    fn persistent_store(
        dir: &TempDir,
        clock: &ManualClock,
        max_size: usize,
    ) -> CacheStore<String> {
        CacheStore::open(
            policy(max_size),
            Arc::new(clock.clone()),
            Some(DiskPersistence::new(dir.path())),
        )
    }

    #[test]
    fn test_persistence_survives_restart() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());

        let store = persistent_store(&dir, &clock, 10);
        store.set("year:2024", value("days"), None);
        drop(store);

        let restarted = persistent_store(&dir, &clock, 10);
        assert_eq!(restarted.get("year:2024"), Some(value("days")));
    }

    #[test]
    fn test_persisted_entry_expired_at_restart_is_removed() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());

        let store = persistent_store(&dir, &clock, 10);
        store.set("year:2024", value("days"), Some(Duration::seconds(30)));
        let path = store.persistence().unwrap().record_path("year:2024");
        drop(store);
        assert!(path.exists());

        clock.advance(Duration::seconds(31));
        let restarted = persistent_store(&dir, &clock, 10);

        assert_eq!(restarted.get("year:2024"), None);
        assert!(!path.exists(), "Expired record should be deleted on load");
    }

    #[test]
    fn test_delete_and_eviction_remove_records() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let store = persistent_store(&dir, &clock, 1);
        let persistence = store.persistence().unwrap().clone();

        store.set("a", value("1"), None);
        assert!(persistence.record_path("a").exists());

        store.set("b", value("2"), None);
        assert!(!persistence.record_path("a").exists(), "Evicted record should be removed");

        store.delete("b");
        assert!(!persistence.record_path("b").exists());
    }

    #[test]
    fn test_clear_removes_all_records() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let clock = ManualClock::default();
        let store = persistent_store(&dir, &clock, 10);
        store.set("a", value("1"), None);
        store.set("b", value("2"), None);

        store.clear();

        let restarted = persistent_store(&dir, &clock, 10);
        assert!(restarted.is_empty());
    }

    #[test]
    fn test_hydration_respects_max_size() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());

        let store = persistent_store(&dir, &clock, 10);
        for key in ["a", "b", "c"] {
            store.set(key, value(key), None);
            clock.advance(Duration::seconds(1));
        }
        drop(store);

        let restarted = persistent_store(&dir, &clock, 2);
        assert_eq!(restarted.len(), 2);
        assert!(!restarted.contains_key("a"));
        assert!(restarted.contains_key("b"));
        assert!(restarted.contains_key("c"));
    }

    #[test]
    fn test_hydration_ranks_by_write_not_read() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());

        let store = persistent_store(&dir, &clock, 10);
        for key in ["a", "b", "c"] {
            store.set(key, value(key), None);
            clock.advance(Duration::seconds(1));
        }
        // Reads only touch memory
        assert_eq!(store.get("a"), Some(value("a")));
        drop(store);

        let restarted = persistent_store(&dir, &clock, 2);
        assert!(!restarted.contains_key("a"));
        assert!(restarted.contains_key("b"));
        assert!(restarted.contains_key("c"));
    }

    #[test]
    fn test_unwritable_persistence_is_swallowed() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "file in the way").unwrap();

        let store: CacheStore<String> = CacheStore::open(
            policy(10),
            Arc::new(SystemClock),
            Some(DiskPersistence::new(&blocker)),
        );
        store.set("k", value("v"), None);

        assert_eq!(store.get("k"), Some(value("v")));
    }
}
