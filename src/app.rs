//! Application wiring and command execution
//!
//! `App` owns the two cache stores (fetched years and memoized day lookups)
//! and the query service built over them, and turns parsed [`Command`]s
//! into serializable [`Output`].

use chrono::Datelike;
use serde::Serialize;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::cache::{
    CacheStats, CacheStore, Clock, SweepConfig, SweepHandle, SweepMessage, SystemClock,
};
use crate::cli::{CacheAction, Command, ShellLine};
use crate::config::{AppConfig, CacheBackend, CacheConfig};
use crate::holiday::{
    china_today, parse_date, DayInfo, DayRecord, HolidayCheck, HolidayEngine, HolidayEntry,
    HolidaySource, HttpHolidaySource, NextHoliday, QueryError, SourceError, WeekdayInfo,
};
use crate::service::HolidayService;

/// Store namespace for fetched year data
pub const YEARS_NAMESPACE: &str = "years";
/// Store namespace for memoized day lookups
pub const DAYS_NAMESPACE: &str = "days";

/// Every entry of one kind for a year
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearListing<T> {
    pub year: i32,
    pub items: Vec<T>,
    pub total_count: usize,
}

impl<T> YearListing<T> {
    pub fn new(year: i32, items: Vec<T>) -> Self {
        let total_count = items.len();
        Self {
            year,
            items,
            total_count,
        }
    }
}

/// Cache settings as reported by `cache stats`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheSummary {
    pub enabled: bool,
    pub cache_type: &'static str,
    pub default_ttl_secs: i64,
    pub max_size: usize,
    /// Only set for the persistent backend
    pub dir: Option<String>,
}

impl From<&CacheConfig> for CacheSummary {
    fn from(config: &CacheConfig) -> Self {
        let dir = match config.backend {
            CacheBackend::Memory => None,
            CacheBackend::Persistent => Some(config.dir.display().to_string()),
        };
        Self {
            enabled: config.enabled,
            cache_type: config.backend.as_str(),
            default_ttl_secs: config.default_ttl.num_seconds(),
            max_size: config.max_size,
            dir,
        }
    }
}

/// Statistics for both stores plus the active configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsReport {
    pub years: CacheStats,
    pub days: CacheStats,
    pub config: CacheSummary,
}

/// Result of one command
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Output {
    Day(DayInfo),
    Check(HolidayCheck),
    Listing(YearListing<HolidayEntry>),
    Next(NextHoliday),
    Weekday(WeekdayInfo),
    Stats(StatsReport),
    Cleared { cleared: usize },
    Swept { removed: usize },
}

impl Output {
    pub fn to_json(&self, pretty: bool) -> Result<String, serde_json::Error> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }
}

/// Renders a command result, successful or not, as JSON
pub fn render(
    result: &Result<Output, QueryError>,
    pretty: bool,
) -> Result<String, serde_json::Error> {
    match result {
        Ok(output) => output.to_json(pretty),
        Err(e) if pretty => serde_json::to_string_pretty(&e.to_failure()),
        Err(e) => serde_json::to_string(&e.to_failure()),
    }
}

/// Resolves an optional user-supplied date, defaulting to today in China
fn resolve_date(input: Option<&str>) -> Result<chrono::NaiveDate, QueryError> {
    match input {
        Some(text) => parse_date(text),
        None => Ok(china_today()),
    }
}

/// The running application
pub struct App<S = HttpHolidaySource> {
    service: HolidayService<S>,
    year_store: Arc<CacheStore<Vec<DayRecord>>>,
    day_store: Arc<CacheStore<DayInfo>>,
    cache_config: CacheConfig,
}

impl App<HttpHolidaySource> {
    /// Builds the application with the HTTP feed and the system clock
    pub fn from_config(config: &AppConfig) -> Result<Self, SourceError> {
        let source = config.source.build_source()?;
        Ok(Self::with_source(config, source, Arc::new(SystemClock)))
    }
}

impl<S> App<S>
where
    S: HolidaySource + 'static,
{
    pub fn with_source(config: &AppConfig, source: S, clock: Arc<dyn Clock>) -> Self {
        let year_store = Arc::new(config.cache.open_store(YEARS_NAMESPACE, Arc::clone(&clock)));
        let day_store = Arc::new(config.cache.open_store(DAYS_NAMESPACE, clock));

        let engine = Arc::new(
            HolidayEngine::new(Arc::clone(&year_store), source).with_ttl(config.source.year_ttl),
        );
        let service = HolidayService::new(engine, Arc::clone(&day_store));

        info!(
            cache_type = config.cache.backend.as_str(),
            enabled = config.cache.enabled,
            years = year_store.len(),
            days = day_store.len(),
            "cache ready"
        );

        Self {
            service,
            year_store,
            day_store,
            cache_config: config.cache.clone(),
        }
    }

    pub fn service(&self) -> &HolidayService<S> {
        &self.service
    }

    pub fn stats(&self) -> StatsReport {
        StatsReport {
            years: self.year_store.stats(),
            days: self.day_store.stats(),
            config: CacheSummary::from(&self.cache_config),
        }
    }

    /// Runs a single command
    pub async fn execute(&self, command: &Command) -> Result<Output, QueryError> {
        debug!(?command, "executing command");
        match command {
            Command::Day { date } => {
                let date = resolve_date(date.as_deref())?;
                self.service.lookup_day(date).await.map(Output::Day)
            }
            Command::Check { date } => {
                let date = resolve_date(date.as_deref())?;
                self.service.is_holiday(date).await.map(Output::Check)
            }
            Command::Holidays { year } => {
                let year = year.unwrap_or_else(|| china_today().year());
                let items = self.service.list_holidays_for_year(year).await?;
                Ok(Output::Listing(YearListing::new(year, items)))
            }
            Command::Workdays { year } => {
                let year = year.unwrap_or_else(|| china_today().year());
                let items = self.service.list_compensatory_workdays_for_year(year).await?;
                Ok(Output::Listing(YearListing::new(year, items)))
            }
            Command::Next { from } => {
                let from = resolve_date(from.as_deref())?;
                self.service.next_holiday(from).await.map(Output::Next)
            }
            Command::Countdown { from } => {
                let from = resolve_date(from.as_deref())?;
                self.service.countdown(from).await.map(Output::Next)
            }
            Command::Weekday { date } => {
                let date = parse_date(date)?;
                Ok(Output::Weekday(self.service.weekday(date)))
            }
            Command::Cache { action } => Ok(self.cache_command(*action)),
            Command::Shell => Err(QueryError::InvalidInput(
                "shell cannot be started from inside a shell".to_string(),
            )),
        }
    }

    fn cache_command(&self, action: CacheAction) -> Output {
        match action {
            CacheAction::Stats => Output::Stats(self.stats()),
            CacheAction::Clear => {
                let cleared = self.year_store.len() + self.day_store.len();
                self.year_store.clear();
                self.day_store.clear();
                info!(cleared, "cache cleared");
                Output::Cleared { cleared }
            }
            CacheAction::Sweep => {
                let removed = self.year_store.sweep_expired() + self.day_store.sweep_expired();
                Output::Swept { removed }
            }
            CacheAction::ResetStats => {
                self.year_store.reset_stats();
                self.day_store.reset_stats();
                Output::Stats(self.stats())
            }
        }
    }

    /// Reads one command per line from `input` and writes one JSON line per result
    ///
    /// Expired entries are swept in the background while the shell is open.
    /// Stops at end of input or on `exit`/`quit`.
    pub async fn run_shell<R, W>(
        &self,
        input: R,
        mut output: W,
        sweep: SweepConfig,
    ) -> io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let sweep = SweepConfig {
            enabled: sweep.enabled && self.cache_config.enabled,
            ..sweep
        };
        let mut sweepers = vec![
            SweepHandle::spawn(Arc::clone(&self.year_store), sweep.clone()),
            SweepHandle::spawn(Arc::clone(&self.day_store), sweep),
        ];

        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line == "exit" || line == "quit" {
                break;
            }

            let rendered = match ShellLine::parse_line(line) {
                Ok(parsed) => {
                    let result = self.execute(&parsed.command).await;
                    render(&result, false).map_err(io::Error::other)?
                }
                Err(e) => {
                    let failure = QueryError::InvalidInput(e.to_string().trim().to_string());
                    render(&Err(failure), false).map_err(io::Error::other)?
                }
            };
            output.write_all(rendered.as_bytes()).await?;
            output.write_all(b"\n").await?;
            output.flush().await?;

            for sweeper in &mut sweepers {
                while let Some(SweepMessage::Swept { removed }) = sweeper.try_recv() {
                    debug!(removed, "background sweep");
                }
            }
        }

        for sweeper in sweepers {
            sweeper.shutdown().await;
        }
        Ok(())
    }
}
