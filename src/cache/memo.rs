//! Cache-aside memoization over a shared store
//!
//! `Memoized` wraps an async operation so that repeated calls with arguments
//! that derive the same key are answered from a [`CacheStore`]. Only
//! successful results are cached.

use chrono::Duration;
use futures::future::BoxFuture;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::trace;

use super::{CacheStats, CacheStore};

type KeyFn<A> = Box<dyn Fn(&A) -> String + Send + Sync>;
type Operation<A, V, E> = Box<dyn Fn(A) -> BoxFuture<'static, Result<V, E>> + Send + Sync>;
type TtlFn<V> = Box<dyn Fn(&V) -> Option<Duration> + Send + Sync>;

/// How long a memoized result is kept
enum Expiry<V> {
    /// The store's default TTL
    Default,
    Fixed(Duration),
    /// Decided per result; `None` means the result is not cached
    PerValue(TtlFn<V>),
}

/// An async operation whose `Ok` results are cached by derived key
pub struct Memoized<A, V, E> {
    store: Arc<CacheStore<V>>,
    key_fn: KeyFn<A>,
    operation: Operation<A, V, E>,
    expiry: Expiry<V>,
}

impl<A, V, E> Memoized<A, V, E>
where
    V: Clone + Serialize + DeserializeOwned,
{
    /// Wraps `operation`, caching results in `store` under `key_fn(args)`
    ///
    /// Entries use the store's default TTL unless [`with_ttl`](Self::with_ttl) is called.
    pub fn new<K, F>(store: Arc<CacheStore<V>>, key_fn: K, operation: F) -> Self
    where
        K: Fn(&A) -> String + Send + Sync + 'static,
        F: Fn(A) -> BoxFuture<'static, Result<V, E>> + Send + Sync + 'static,
    {
        Self {
            store,
            key_fn: Box::new(key_fn),
            operation: Box::new(operation),
            expiry: Expiry::Default,
        }
    }

    /// Caches every result for `ttl`
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.expiry = Expiry::Fixed(ttl);
        self
    }

    /// Decides each result's TTL from the result itself
    ///
    /// Use this when a result must not outlive the data it was computed
    /// from. A `None` from `ttl_fn` leaves that result uncached.
    pub fn with_ttl_fn<T>(mut self, ttl_fn: T) -> Self
    where
        T: Fn(&V) -> Option<Duration> + Send + Sync + 'static,
    {
        self.expiry = Expiry::PerValue(Box::new(ttl_fn));
        self
    }

    fn ttl_for(&self, value: &V) -> Option<Duration> {
        match &self.expiry {
            Expiry::Default => Some(self.store.policy().default_ttl),
            Expiry::Fixed(ttl) => Some(*ttl),
            Expiry::PerValue(ttl_fn) => ttl_fn(value),
        }
    }

    pub fn key_for(&self, args: &A) -> String {
        (self.key_fn)(args)
    }

    /// Returns the cached result for `args`, running the operation on a miss
    ///
    /// The operation runs without any cache lock held. Two concurrent misses
    /// for the same key both run it and the later write wins.
    pub async fn invoke(&self, args: A) -> Result<V, E> {
        let key = self.key_for(&args);
        if let Some(value) = self.store.get(&key) {
            trace!(key = %key, "memoized hit");
            return Ok(value);
        }

        let value = (self.operation)(args).await?;
        match self.ttl_for(&value) {
            Some(ttl) => self.store.set(&key, value.clone(), Some(ttl)),
            None => trace!(key = %key, "memoized result not cached"),
        }
        Ok(value)
    }

    /// Runs the operation for each argument to populate the cache
    ///
    /// Failures are skipped. Returns the number of arguments that succeeded.
    pub async fn warm<I>(&self, args: I) -> usize
    where
        I: IntoIterator<Item = A>,
    {
        let mut warmed = 0;
        for arg in args {
            if self.invoke(arg).await.is_ok() {
                warmed += 1;
            }
        }
        warmed
    }

    /// Clears the whole backing store, not just this operation's keys
    pub fn cache_clear(&self) {
        self.store.clear();
    }

    pub fn cache_info(&self) -> CacheStats {
        self.store.stats()
    }
}
