//! In-process TTL cache with optional disk persistence
//!
//! `CacheStore` is a size-bounded, thread-safe key/value store whose entries
//! expire after a TTL. A store can be backed by `DiskPersistence`, in which
//! case entries survive restarts. `Memoized` layers cache-aside memoization on
//! top of a store, and `SweepHandle` purges expired entries in the background.

mod clock;
mod entry;
mod memo;
mod persist;
mod stats;
mod store;
mod sweep;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::CacheEntry;
pub use memo::Memoized;
pub use persist::{hash_key, DiskPersistence, PersistenceError};
pub use stats::CacheStats;
pub use store::{CachePolicy, CacheStore, Lookup, DEFAULT_MAX_SIZE, DEFAULT_TTL_SECS};
pub use sweep::{SweepConfig, SweepHandle, SweepMessage};
