//! Runtime configuration
//!
//! Plain settings structs built from CLI flags and environment variables
//! (see [`crate::cli`]), plus the glue that turns them into cache stores and
//! a holiday source.

use chrono::Duration;
use clap::ValueEnum;
use directories::ProjectDirs;
use serde::{de::DeserializeOwned, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::{
    CachePolicy, CacheStore, Clock, DiskPersistence, DEFAULT_MAX_SIZE, DEFAULT_TTL_SECS,
};
use crate::holiday::source::{default_mirrors, DEFAULT_TIMEOUT_SECS};
use crate::holiday::{HttpHolidaySource, SourceError, DEFAULT_YEAR_TTL_HOURS};

/// Fallback cache directory when no XDG cache path can be determined
const FALLBACK_CACHE_DIR: &str = "cache";

/// Where cache entries live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum CacheBackend {
    /// Process memory only
    #[default]
    Memory,
    /// Memory, mirrored to one JSON file per entry
    Persistent,
}

impl CacheBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheBackend::Memory => "memory",
            CacheBackend::Persistent => "persistent",
        }
    }
}

/// Settings shared by every cache store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub enabled: bool,
    /// TTL for entries written without an explicit one
    pub default_ttl: Duration,
    pub max_size: usize,
    pub backend: CacheBackend,
    /// Root directory for persisted stores
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl: Duration::seconds(DEFAULT_TTL_SECS),
            max_size: DEFAULT_MAX_SIZE,
            backend: CacheBackend::Memory,
            dir: default_cache_dir(),
        }
    }
}

impl CacheConfig {
    pub fn policy(&self) -> CachePolicy {
        CachePolicy {
            enabled: self.enabled,
            default_ttl: self.default_ttl,
            max_size: self.max_size,
        }
    }

    /// Persistence for the store called `namespace`, if the backend is persistent
    ///
    /// Each namespace gets its own sub-directory so stores holding different
    /// value types never read each other's records.
    pub fn persistence(&self, namespace: &str) -> Option<DiskPersistence> {
        match self.backend {
            CacheBackend::Memory => None,
            CacheBackend::Persistent => Some(DiskPersistence::new(self.dir.join(namespace))),
        }
    }

    /// Builds the store called `namespace`
    pub fn open_store<V>(&self, namespace: &str, clock: Arc<dyn Clock>) -> CacheStore<V>
    where
        V: Clone + Serialize + DeserializeOwned,
    {
        CacheStore::open(self.policy(), clock, self.persistence(namespace))
    }
}

/// Settings for the holiday feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    /// URL templates containing `{year}`, tried in order
    pub mirrors: Vec<String>,
    pub timeout: std::time::Duration,
    /// How long a fetched year stays fresh
    pub year_ttl: Duration,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            mirrors: default_mirrors(),
            timeout: std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            year_ttl: Duration::hours(DEFAULT_YEAR_TTL_HOURS),
        }
    }
}

impl SourceConfig {
    pub fn build_source(&self) -> Result<HttpHolidaySource, SourceError> {
        HttpHolidaySource::with_config(self.mirrors.clone(), self.timeout)
    }
}

/// Everything needed to start the application
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppConfig {
    pub cache: CacheConfig,
    pub source: SourceConfig,
}

/// XDG cache directory (`~/.cache/cnholiday` on Linux)
pub fn default_cache_dir() -> PathBuf {
    ProjectDirs::from("", "", "cnholiday")
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(FALLBACK_CACHE_DIR))
}
