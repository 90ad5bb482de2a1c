//! Core data models for holiday queries
//!
//! This module contains the day records delivered by the yearly feed, the
//! result types returned by the query engine, and small date helpers shared
//! by the engine and the CLI.

pub mod engine;
pub mod error;
pub mod source;

pub use engine::{year_key, HolidayEngine, DEFAULT_YEAR_TTL_HOURS};
pub use error::{QueryError, QueryFailure};
pub use source::{HolidaySource, HttpHolidaySource, InMemorySource, SourceError};

use chrono::{Datelike, Duration, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Years accepted by the query surface
pub const SUPPORTED_YEARS: RangeInclusive<i32> = 1000..=9999;

/// China Standard Time offset from UTC
const CST_OFFSET_HOURS: i64 = 8;

/// Date formats accepted from callers, tried in order
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];

/// Name given to dates with no special arrangement
pub const NORMAL_DAY_NAME: &str = "普通日";
/// Note for an ordinary weekend
pub const WEEKEND_NOTE: &str = "周末";
/// Note for an ordinary weekday
pub const WEEKDAY_NOTE: &str = "工作日";

const WEEKDAY_NAMES_EN: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

const WEEKDAY_NAMES_CN: [&str; 7] = [
    "星期一", "星期二", "星期三", "星期四", "星期五", "星期六", "星期日",
];

/// One day of a year's holiday feed
///
/// Field names on the wire follow the feed (`isOffDay`). A record with
/// `is_off_day = true` is a rest day; `false` with a name is a weekend
/// turned into a working day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayRecord {
    /// Holiday or workday label, may be empty
    #[serde(default)]
    pub name: String,
    /// Calendar date
    pub date: NaiveDate,
    /// Whether work is suspended on this date
    pub is_off_day: bool,
    /// Free-text note, if the feed provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl DayRecord {
    pub fn new(date: NaiveDate, name: impl Into<String>, is_off_day: bool) -> Self {
        Self {
            name: name.into(),
            date,
            is_off_day,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// A named rest day
    pub fn is_named_holiday(&self) -> bool {
        self.is_off_day && !self.name.is_empty()
    }

    /// A named working day that would otherwise be a rest day
    pub fn is_compensatory_workday(&self) -> bool {
        !self.is_off_day && !self.name.is_empty()
    }
}

/// How a date is classified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayKind {
    /// Listed in the feed as a rest day
    Holiday,
    /// Listed in the feed as a working day
    Work,
    /// Not in the feed; classified by weekday
    Normal,
}

/// Result of looking up a single date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayInfo {
    pub date: NaiveDate,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DayKind,
    pub is_holiday: bool,
    pub is_work_day: bool,
    pub note: Option<String>,
    pub weekday_name_en: String,
}

/// Yes/no view of a [`DayInfo`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolidayCheck {
    pub date: NaiveDate,
    pub is_holiday: bool,
    pub is_work_day: bool,
    #[serde(rename = "type")]
    pub kind: DayKind,
    pub name: String,
}

impl From<DayInfo> for HolidayCheck {
    fn from(info: DayInfo) -> Self {
        Self {
            date: info.date,
            is_holiday: info.is_holiday,
            is_work_day: info.is_work_day,
            kind: info.kind,
            name: info.name,
        }
    }
}

/// A named holiday or compensatory workday in a yearly listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolidayEntry {
    pub date: NaiveDate,
    pub name: String,
    pub note: Option<String>,
    pub weekday_name_en: String,
}

impl From<&DayRecord> for HolidayEntry {
    fn from(record: &DayRecord) -> Self {
        Self {
            date: record.date,
            name: record.name.clone(),
            note: record.note.clone(),
            weekday_name_en: weekday_name_en(record.date).to_string(),
        }
    }
}

/// The first holiday strictly after a reference date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextHoliday {
    pub date: NaiveDate,
    pub name: String,
    pub note: Option<String>,
    /// Calendar days from the reference date
    pub days_until: i64,
    pub weekday_name_en: String,
}

impl NextHoliday {
    pub fn new(record: &DayRecord, from: NaiveDate) -> Self {
        Self {
            date: record.date,
            name: record.name.clone(),
            note: record.note.clone(),
            days_until: (record.date - from).num_days(),
            weekday_name_en: weekday_name_en(record.date).to_string(),
        }
    }
}

/// Day-of-week details for a date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekdayInfo {
    pub date: NaiveDate,
    /// 1 for Monday through 7 for Sunday
    pub weekday_index: u32,
    pub weekday_name_cn: String,
    pub weekday_name_en: String,
    pub is_weekend: bool,
}

/// Day-of-week details for `date`; needs no feed data
pub fn weekday_info(date: NaiveDate) -> WeekdayInfo {
    let index = date.weekday().num_days_from_monday() as usize;
    WeekdayInfo {
        date,
        weekday_index: date.weekday().number_from_monday(),
        weekday_name_cn: WEEKDAY_NAMES_CN[index].to_string(),
        weekday_name_en: WEEKDAY_NAMES_EN[index].to_string(),
        is_weekend: is_weekend(date),
    }
}

pub fn weekday_name_en(date: NaiveDate) -> &'static str {
    WEEKDAY_NAMES_EN[date.weekday().num_days_from_monday() as usize]
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Today's date in China Standard Time
pub fn china_today() -> NaiveDate {
    (Utc::now() + Duration::hours(CST_OFFSET_HOURS)).date_naive()
}

/// Parses a caller-supplied date
///
/// Accepts `YYYY-MM-DD`, `YYYY/MM/DD` and `YYYYMMDD`.
///
/// # Arguments
/// * `input` - The date text, surrounding whitespace ignored
///
/// # Returns
/// * `Ok(NaiveDate)` for a real calendar date within [`SUPPORTED_YEARS`]
/// * `Err(QueryError::InvalidInput)` otherwise
pub fn parse_date(input: &str) -> Result<NaiveDate, QueryError> {
    let trimmed = input.trim();
    let date = DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
        .ok_or_else(|| {
            QueryError::InvalidInput(format!("invalid date '{input}', expected YYYY-MM-DD"))
        })?;
    validate_year(date.year())?;
    Ok(date)
}

/// Rejects years outside [`SUPPORTED_YEARS`]
pub fn validate_year(year: i32) -> Result<i32, QueryError> {
    if SUPPORTED_YEARS.contains(&year) {
        Ok(year)
    } else {
        Err(QueryError::InvalidInput(format!(
            "year {year} is out of range {}..={}",
            SUPPORTED_YEARS.start(),
            SUPPORTED_YEARS.end()
        )))
    }
}
