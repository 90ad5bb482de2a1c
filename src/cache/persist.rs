//! Disk backing for cache entries
//!
//! Provides `DiskPersistence`, which mirrors each cache entry into its own
//! pretty-printed JSON file. File names are the SHA-256 of the key so that
//! keys such as `year:2024` never have to be filesystem-safe.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use super::CacheEntry;

/// Extension used for persisted records
const RECORD_EXTENSION: &str = "json";

/// Errors raised while reading or writing a persisted record
///
/// These never leave the cache layer; the store logs and drops them.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Filesystem operation failed
    #[error("cache file I/O failed: {0}")]
    Io(#[from] io::Error),

    /// Record could not be encoded or decoded
    #[error("cache record is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),

    /// Record decoded but does not belong at this path
    #[error("cache record for key '{0}' is stored under the wrong file name")]
    Misplaced(String),
}

/// Reads and writes persisted cache records in a single directory
#[derive(Debug, Clone)]
pub struct DiskPersistence {
    /// Directory where record files are stored
    dir: PathBuf,
}

impl DiskPersistence {
    /// Creates a persistence adapter rooted at `dir`
    ///
    /// The directory is created lazily on first load or write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the path of the record file for `key`
    pub fn record_path(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", hash_key(key), RECORD_EXTENSION))
    }

    /// Ensures the record directory exists
    fn ensure_dir(&self) -> io::Result<()> {
        fs::create_dir_all(&self.dir)
    }

    /// Writes (or overwrites) the record for `entry.key`
    pub fn write<V: Serialize>(&self, entry: &CacheEntry<V>) -> Result<(), PersistenceError> {
        self.ensure_dir()?;
        let json = serde_json::to_string_pretty(entry)?;
        fs::write(self.record_path(&entry.key), json)?;
        Ok(())
    }

    /// Removes the record for `key`
    ///
    /// Returns `Ok(false)` when there was no record to remove.
    pub fn remove(&self, key: &str) -> Result<bool, PersistenceError> {
        match fs::remove_file(self.record_path(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Removes every record file in the directory, returning how many were removed
    pub fn remove_all(&self) -> Result<usize, PersistenceError> {
        let mut removed = 0;
        for path in self.record_files()? {
            fs::remove_file(&path)?;
            removed += 1;
        }
        Ok(removed)
    }

    /// Loads every unexpired record
    ///
    /// Expired, unreadable and misplaced records are deleted from disk rather
    /// than reported. The returned entries are in no particular order.
    ///
    /// # Arguments
    /// * `now` - Records with `expires_at <= now` are treated as expired
    ///
    /// # Returns
    /// * The surviving entries; empty if the directory is missing or unreadable
    pub fn load<V: DeserializeOwned>(&self, now: DateTime<Utc>) -> Vec<CacheEntry<V>> {
        if let Err(e) = self.ensure_dir() {
            warn!(dir = %self.dir.display(), error = %e, "cannot create cache directory");
            return Vec::new();
        }

        let files = match self.record_files() {
            Ok(files) => files,
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "cannot list cache directory");
                return Vec::new();
            }
        };

        let mut entries = Vec::with_capacity(files.len());
        for path in files {
            match self.read_record::<V>(&path) {
                Ok(entry) if entry.is_expired(now) => {
                    debug!(key = %entry.key, "dropping expired cache record");
                    discard(&path);
                }
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "dropping unreadable cache record");
                    discard(&path);
                }
            }
        }
        entries
    }

    fn read_record<V: DeserializeOwned>(&self, path: &Path) -> Result<CacheEntry<V>, PersistenceError> {
        let content = fs::read_to_string(path)?;
        let entry: CacheEntry<V> = serde_json::from_str(&content)?;
        if self.record_path(&entry.key) != path {
            return Err(PersistenceError::Misplaced(entry.key));
        }
        Ok(entry)
    }

    /// Lists the record files in the directory
    fn record_files(&self) -> Result<Vec<PathBuf>, PersistenceError> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        for dir_entry in read_dir {
            let path = dir_entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == RECORD_EXTENSION) {
                files.push(path);
            }
        }
        Ok(files)
    }
}

/// SHA-256 hex digest of a cache key
pub fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!(path = %path.display(), error = %e, "cannot delete cache record");
    }
}
