//! Holiday query engine
//!
//! Answers per-date and per-year questions from a year-keyed cache of feed
//! data. A year's records are cached under `year:<Y>`; on a miss the feed is
//! fetched with no cache lock held and the result written back.
//!
//! When the feed is down, an expired copy of the year is served instead and
//! kept around for a short retry window. With no copy at all the query fails
//! with `DataUnavailable` rather than guessing.

use chrono::{Datelike, Duration, NaiveDate};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{
    is_weekend, validate_year, weekday_name_en, DayInfo, DayKind, DayRecord, HolidayCheck,
    HolidayEntry, HolidaySource, NextHoliday, QueryError, NORMAL_DAY_NAME, SUPPORTED_YEARS,
    WEEKDAY_NOTE, WEEKEND_NOTE,
};
use crate::cache::{CacheStore, Lookup};

/// TTL for a cached year of feed data
pub const DEFAULT_YEAR_TTL_HOURS: i64 = 24;

/// How long a stale year is kept after a failed refresh before retrying the feed
const STALE_RETRY_MINUTES: i64 = 5;

/// Cache key for a year's day records
pub fn year_key(year: i32) -> String {
    format!("year:{year}")
}

/// Query engine over a year-keyed cache and a holiday source
pub struct HolidayEngine<S> {
    store: Arc<CacheStore<Vec<DayRecord>>>,
    source: S,
    ttl: Duration,
}

impl<S: HolidaySource> HolidayEngine<S> {
    /// Creates an engine caching years for [`DEFAULT_YEAR_TTL_HOURS`]
    pub fn new(store: Arc<CacheStore<Vec<DayRecord>>>, source: S) -> Self {
        Self {
            store,
            source,
            ttl: Duration::hours(DEFAULT_YEAR_TTL_HOURS),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn store(&self) -> &Arc<CacheStore<Vec<DayRecord>>> {
        &self.store
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// How much longer `year`'s cached records stay fresh
    ///
    /// Answers derived from a year must not outlive it. After a stale
    /// fallback this is the short retry window, not the full year TTL.
    ///
    /// # Arguments
    /// * `year` - The calendar year whose cache entry to inspect
    ///
    /// # Returns
    /// * `Some(remaining)` while the year is cached and unexpired
    /// * `None` if it is missing or expired
    pub fn year_time_to_live(&self, year: i32) -> Option<Duration> {
        self.store.time_to_live(&year_key(year))
    }

    /// Returns a year's day records from cache or the feed
    pub async fn year_records(&self, year: i32) -> Result<Vec<DayRecord>, QueryError> {
        validate_year(year)?;
        let key = year_key(year);

        let stale = match self.store.lookup(&key) {
            Lookup::Fresh(days) => return Ok(days),
            Lookup::Stale(days) => Some(days),
            Lookup::Missing => None,
        };

        match self.source.fetch_year(year).await {
            Ok(days) => {
                debug!(year, days = days.len(), "caching holiday year");
                self.store.set(&key, days.clone(), Some(self.ttl));
                Ok(days)
            }
            Err(e) => match stale {
                Some(days) => {
                    warn!(year, error = %e, "holiday feed unavailable, serving stale data");
                    self.store
                        .set(&key, days.clone(), Some(Duration::minutes(STALE_RETRY_MINUTES)));
                    Ok(days)
                }
                None => {
                    warn!(year, error = %e, "holiday feed unavailable and nothing cached");
                    Err(QueryError::DataUnavailable { year })
                }
            },
        }
    }

    /// Classifies a single date
    ///
    /// Dates listed in the feed are `holiday` or `work`; anything else is
    /// `normal` and counts as a holiday only on weekends.
    pub async fn lookup_day(&self, date: NaiveDate) -> Result<DayInfo, QueryError> {
        let days = self.year_records(date.year()).await?;
        let weekday = weekday_name_en(date).to_string();

        let info = match days.iter().find(|day| day.date == date) {
            Some(record) => DayInfo {
                date,
                name: record.name.clone(),
                kind: if record.is_off_day {
                    DayKind::Holiday
                } else {
                    DayKind::Work
                },
                is_holiday: record.is_off_day,
                is_work_day: !record.is_off_day,
                note: record.note.clone(),
                weekday_name_en: weekday,
            },
            None => {
                let weekend = is_weekend(date);
                DayInfo {
                    date,
                    name: NORMAL_DAY_NAME.to_string(),
                    kind: DayKind::Normal,
                    is_holiday: weekend,
                    is_work_day: !weekend,
                    note: Some(if weekend { WEEKEND_NOTE } else { WEEKDAY_NOTE }.to_string()),
                    weekday_name_en: weekday,
                }
            }
        };
        Ok(info)
    }

    pub async fn is_holiday(&self, date: NaiveDate) -> Result<HolidayCheck, QueryError> {
        self.lookup_day(date).await.map(HolidayCheck::from)
    }

    /// Named rest days of `year`, in date order
    pub async fn list_holidays_for_year(&self, year: i32) -> Result<Vec<HolidayEntry>, QueryError> {
        let days = self.year_records(year).await?;
        Ok(sorted_entries(&days, DayRecord::is_named_holiday))
    }

    /// Weekend days turned into working days in `year`, in date order
    pub async fn list_compensatory_workdays_for_year(
        &self,
        year: i32,
    ) -> Result<Vec<HolidayEntry>, QueryError> {
        let days = self.year_records(year).await?;
        Ok(sorted_entries(&days, DayRecord::is_compensatory_workday))
    }

    /// The first named holiday strictly after `from`
    ///
    /// Searches the rest of `from`'s year, then the whole of the next year.
    /// The next year is only fetched when the current one has nothing left.
    ///
    /// # Arguments
    /// * `from` - The reference date; a holiday on `from` itself is skipped
    ///
    /// # Returns
    /// * `Ok(NextHoliday)` with the day count from `from`
    /// * `Err(DataUnavailable)` for the first year that had to be consulted and could not be loaded
    /// * `Err(NoUpcomingHoliday)` when both years loaded, or the next year is
    ///   past the supported range, and nothing qualifies
    pub async fn next_holiday(&self, from: NaiveDate) -> Result<NextHoliday, QueryError> {
        let year = from.year();
        let current = self.year_records(year).await?;
        if let Some(record) = first_holiday_after(&current, from) {
            return Ok(NextHoliday::new(record, from));
        }

        let next_year = year + 1;
        if !SUPPORTED_YEARS.contains(&next_year) {
            return Err(QueryError::NoUpcomingHoliday { from });
        }
        let following = self.year_records(next_year).await?;
        first_holiday_after(&following, from)
            .map(|record| NextHoliday::new(record, from))
            .ok_or(QueryError::NoUpcomingHoliday { from })
    }

    /// Days remaining until the next holiday
    pub async fn countdown(&self, from: NaiveDate) -> Result<NextHoliday, QueryError> {
        self.next_holiday(from).await
    }
}

/// Earliest named holiday after `from`, scanning every record
fn first_holiday_after(days: &[DayRecord], from: NaiveDate) -> Option<&DayRecord> {
    days.iter()
        .filter(|day| day.is_named_holiday() && day.date > from)
        .min_by_key(|day| day.date)
}

fn sorted_entries(days: &[DayRecord], keep: impl Fn(&DayRecord) -> bool) -> Vec<HolidayEntry> {
    let mut entries: Vec<HolidayEntry> = days
        .iter()
        .filter(|day| keep(*day))
        .map(HolidayEntry::from)
        .collect();
    entries.sort_by_key(|entry| entry.date);
    entries
}
