//! Yearly holiday feed clients
//!
//! This module provides the `HolidaySource` abstraction the query engine
//! fetches through, an HTTP implementation that reads the holiday-cn JSON
//! files from a list of mirrors, and a fixed in-memory implementation.

use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

use super::DayRecord;

/// Primary mirror; `{year}` is replaced with the requested year
pub const PRIMARY_MIRROR: &str =
    "https://cdn.jsdelivr.net/gh/NateScarlet/holiday-cn@master/{year}.json";

/// Backup mirror, tried when the primary fails
pub const BACKUP_MIRROR: &str =
    "https://raw.githubusercontent.com/NateScarlet/holiday-cn/master/{year}.json";

/// Per-request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Errors that can occur when fetching a year of holiday data
#[derive(Debug, Error)]
pub enum SourceError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Mirror answered with a non-success status
    #[error("{url} returned HTTP {status}")]
    BadStatus { url: String, status: u16 },

    /// Failed to parse JSON response
    #[error("Failed to parse holiday feed: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Every configured mirror failed
    #[error("all {attempts} mirrors failed for {year}")]
    AllMirrorsFailed { year: i32, attempts: usize },

    /// The source has no data for the year
    #[error("no holiday data for {0}")]
    YearNotAvailable(i32),
}

/// Something that can produce a year's day records
///
/// Implementations own their timeouts and fallbacks and must resolve within
/// bounded time. Callers treat any error as "unavailable".
pub trait HolidaySource: Send + Sync {
    fn fetch_year(
        &self,
        year: i32,
    ) -> impl Future<Output = Result<Vec<DayRecord>, SourceError>> + Send;
}

/// Top-level shape of a holiday-cn year file
#[derive(Debug, Deserialize)]
struct YearFeed {
    #[serde(default)]
    days: Vec<DayRecord>,
}

/// Parses a holiday-cn year document into its day records
pub fn parse_feed(body: &str) -> Result<Vec<DayRecord>, SourceError> {
    let feed: YearFeed = serde_json::from_str(body)?;
    Ok(feed.days)
}

/// Client for the holiday-cn feed over HTTP
#[derive(Debug, Clone)]
pub struct HttpHolidaySource {
    client: Client,
    /// URL templates containing `{year}`, tried in order
    mirrors: Vec<String>,
}

impl Default for HttpHolidaySource {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpHolidaySource {
    /// Create a source using the default mirrors and timeout
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            mirrors: default_mirrors(),
        }
    }

    /// Create a source with custom mirrors and request timeout
    ///
    /// # Arguments
    /// * `mirrors` - URL templates containing `{year}`, tried in order
    /// * `timeout` - Per-request timeout applied to every mirror
    ///
    /// # Returns
    /// * `Ok(HttpHolidaySource)` on success
    /// * `Err(SourceError::RequestFailed)` if the HTTP client cannot be built
    pub fn with_config(mirrors: Vec<String>, timeout: Duration) -> Result<Self, SourceError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, mirrors })
    }

    pub fn mirrors(&self) -> &[String] {
        &self.mirrors
    }

    /// Expands a mirror template for `year`
    fn mirror_url(template: &str, year: i32) -> String {
        template.replace("{year}", &year.to_string())
    }

    /// Fetches and parses one mirror
    async fn fetch_from(&self, url: &str) -> Result<Vec<DayRecord>, SourceError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::BadStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let text = response.text().await?;
        parse_feed(&text)
    }
}

impl HolidaySource for HttpHolidaySource {
    async fn fetch_year(&self, year: i32) -> Result<Vec<DayRecord>, SourceError> {
        for template in &self.mirrors {
            let url = Self::mirror_url(template, year);
            match self.fetch_from(&url).await {
                Ok(days) => {
                    debug!(year, url = %url, days = days.len(), "fetched holiday feed");
                    return Ok(days);
                }
                Err(e) => warn!(year, url = %url, error = %e, "holiday mirror failed"),
            }
        }

        error!(year, "could not fetch holiday data from any mirror");
        Err(SourceError::AllMirrorsFailed {
            year,
            attempts: self.mirrors.len(),
        })
    }
}

/// The built-in mirror list
pub fn default_mirrors() -> Vec<String> {
    vec![PRIMARY_MIRROR.to_string(), BACKUP_MIRROR.to_string()]
}

/// A source serving fixed per-year data
///
/// Counts fetches, can be switched off to simulate an outage, and can have
/// a year replaced to simulate an amended feed.
#[derive(Debug)]
pub struct InMemorySource {
    years: Mutex<HashMap<i32, Vec<DayRecord>>>,
    available: AtomicBool,
    fetches: AtomicUsize,
}

impl Default for InMemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySource {
    pub fn new() -> Self {
        Self {
            years: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn with_year(mut self, year: i32, days: Vec<DayRecord>) -> Self {
        self.years
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(year, days);
        self
    }

    /// Replaces the records served for `year`
    pub fn set_year(&self, year: i32, days: Vec<DayRecord>) {
        self.years
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(year, days);
    }

    /// Simulates the source going down or coming back
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of `fetch_year` calls so far, successful or not
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl HolidaySource for InMemorySource {
    async fn fetch_year(&self, year: i32) -> Result<Vec<DayRecord>, SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.available.load(Ordering::SeqCst) {
            return Err(SourceError::YearNotAvailable(year));
        }
        self.years
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&year)
            .cloned()
            .ok_or(SourceError::YearNotAvailable(year))
    }
}
