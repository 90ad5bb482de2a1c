//! Command-line interface parsing for cnholiday
//!
//! This module handles parsing of CLI arguments using clap. Cache and feed
//! settings can also come from the environment (`CACHE_TTL`, `CACHE_TYPE`,
//! ...), which is how long-running embeddings are expected to configure them.

use chrono::Duration;
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{default_cache_dir, AppConfig, CacheBackend, CacheConfig, SourceConfig};
use crate::holiday::source::{default_mirrors, DEFAULT_TIMEOUT_SECS};
use crate::holiday::DEFAULT_YEAR_TTL_HOURS;

/// cnholiday - Chinese public holiday and compensatory workday queries
#[derive(Parser, Debug)]
#[command(name = "cnholiday")]
#[command(about = "Chinese public holiday queries backed by a local TTL cache")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub cache: CacheArgs,

    #[command(flatten)]
    pub source: SourceArgs,

    /// Log everything down to trace level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Cache settings
#[derive(Args, Debug, Clone)]
pub struct CacheArgs {
    /// Enable or disable caching (true/false)
    #[arg(long, env = "CACHE_ENABLED", default_value = "true", action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    pub cache_enabled: bool,

    /// Default cache entry TTL in seconds
    #[arg(long, env = "CACHE_TTL", default_value_t = 3600, value_name = "SECONDS")]
    pub cache_ttl: u32,

    /// Maximum number of entries per cache store
    #[arg(long, env = "CACHE_MAX_SIZE", default_value_t = 1000, value_parser = clap::value_parser!(u32).range(1..))]
    pub cache_max_size: u32,

    /// Keep the cache in memory only, or mirror it to disk
    #[arg(long, env = "CACHE_TYPE", value_enum, default_value_t = CacheBackend::Memory)]
    pub cache_type: CacheBackend,

    /// Directory for the persistent cache [default: XDG cache dir]
    #[arg(long, env = "CACHE_DIR", value_name = "PATH")]
    pub cache_dir: Option<PathBuf>,
}

impl CacheArgs {
    pub fn to_config(&self) -> CacheConfig {
        CacheConfig {
            enabled: self.cache_enabled,
            default_ttl: Duration::seconds(i64::from(self.cache_ttl)),
            max_size: self.cache_max_size as usize,
            backend: self.cache_type,
            dir: self.cache_dir.clone().unwrap_or_else(default_cache_dir),
        }
    }
}

/// Holiday feed settings
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// How long a fetched year of holiday data stays fresh, in seconds
    #[arg(long, env = "HOLIDAY_CACHE_TTL", default_value_t = DEFAULT_YEAR_TTL_HOURS as u32 * 3600, value_name = "SECONDS")]
    pub year_ttl: u32,

    /// Feed URL template containing {year}; repeat to add fallbacks
    #[arg(long = "mirror", env = "HOLIDAY_MIRRORS", value_delimiter = ',', value_name = "URL")]
    pub mirrors: Vec<String>,

    /// Per-request timeout in seconds
    #[arg(long, env = "HOLIDAY_TIMEOUT", default_value_t = DEFAULT_TIMEOUT_SECS, value_name = "SECONDS")]
    pub timeout: u64,
}

impl SourceArgs {
    pub fn to_config(&self) -> SourceConfig {
        let mirrors = if self.mirrors.is_empty() {
            default_mirrors()
        } else {
            self.mirrors.clone()
        };
        SourceConfig {
            mirrors,
            timeout: std::time::Duration::from_secs(self.timeout),
            year_ttl: Duration::seconds(i64::from(self.year_ttl)),
        }
    }
}

impl Cli {
    pub fn app_config(&self) -> AppConfig {
        AppConfig {
            cache: self.cache.to_config(),
            source: self.source.to_config(),
        }
    }
}

/// Queries and maintenance commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show how a date is classified (defaults to today, China time)
    Day {
        /// YYYY-MM-DD, YYYY/MM/DD or YYYYMMDD
        date: Option<String>,
    },
    /// Answer whether a date is a day off
    Check {
        date: Option<String>,
    },
    /// List the public holidays of a year
    Holidays {
        #[arg(long)]
        year: Option<i32>,
    },
    /// List the compensatory workdays of a year
    Workdays {
        #[arg(long)]
        year: Option<i32>,
    },
    /// Show the next public holiday
    Next {
        #[arg(long)]
        from: Option<String>,
    },
    /// Days left until the next public holiday
    Countdown {
        #[arg(long)]
        from: Option<String>,
    },
    /// Show the day of the week for a date
    Weekday {
        date: String,
    },
    /// Inspect or maintain the cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Read commands from stdin, one per line, sharing one cache
    Shell,
}

/// Cache maintenance actions
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheAction {
    /// Show hit/miss statistics and configuration
    Stats,
    /// Remove every cache entry
    Clear,
    /// Remove expired cache entries
    Sweep,
    /// Zero the hit/miss counters, keeping cached entries
    ResetStats,
}

/// A single line typed into `cnholiday shell`
#[derive(Parser, Debug)]
#[command(name = "cnholiday", no_binary_name = true, disable_version_flag = true)]
pub struct ShellLine {
    #[command(subcommand)]
    pub command: Command,
}

impl ShellLine {
    /// Parses a whitespace-separated command line
    pub fn parse_line(line: &str) -> Result<Self, clap::Error> {
        Self::try_parse_from(line.split_whitespace())
    }
}
