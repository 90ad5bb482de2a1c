//! Caller-visible query failures

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by holiday queries
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The feed failed and nothing usable is cached for the year
    #[error("holiday data for {year} is unavailable")]
    DataUnavailable { year: i32 },

    /// Both years were available but neither has a holiday after `from`
    #[error("no upcoming holiday after {from}")]
    NoUpcomingHoliday { from: NaiveDate },

    /// Malformed date or year argument
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl QueryError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::DataUnavailable { .. } => "DATA_UNAVAILABLE",
            QueryError::NoUpcomingHoliday { .. } => "NO_UPCOMING_HOLIDAY",
            QueryError::InvalidInput(_) => "INVALID_INPUT",
        }
    }

    pub fn to_failure(&self) -> QueryFailure {
        QueryFailure {
            error_code: self.code().to_string(),
            message: self.to_string(),
        }
    }
}

/// Serializable form of a [`QueryError`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFailure {
    pub error_code: String,
    pub message: String,
}
