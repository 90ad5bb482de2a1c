//! Tracing subscriber setup
//!
//! Logs always go to stderr so stdout carries nothing but command output.

use thiserror::Error;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to install tracing subscriber: {0}")]
    Init(String),
}

/// Base filter directive for the given verbosity flags
pub fn default_level(verbose: bool, quiet: bool) -> &'static str {
    if verbose {
        "trace"
    } else if quiet {
        "error"
    } else {
        "info"
    }
}

/// Installs the global subscriber
///
/// `RUST_LOG` overrides the level picked from `verbose`/`quiet`. Fails if a
/// subscriber is already installed.
pub fn init_tracing(verbose: bool, quiet: bool, json_output: bool) -> Result<(), LoggingError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(verbose, quiet)));

    if json_output {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .try_init()
            .map_err(|e| LoggingError::Init(e.to_string()))
    } else {
        fmt()
            .compact()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .try_init()
            .map_err(|e| LoggingError::Init(e.to_string()))
    }
}
