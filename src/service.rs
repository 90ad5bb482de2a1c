//! Query surface used by the CLI
//!
//! `HolidayService` fronts a [`HolidayEngine`] and memoizes single-date
//! lookups in their own store under `<year>:<date>` keys, so repeated
//! questions about the same day skip the record scan entirely. A memoized
//! day never outlives the cached year it was computed from.

use chrono::{Datelike, NaiveDate};
use futures::FutureExt;
use std::sync::Arc;

use crate::cache::{CacheStore, Memoized};
use crate::holiday::{
    weekday_info, DayInfo, HolidayCheck, HolidayEngine, HolidayEntry, HolidaySource, NextHoliday,
    QueryError, WeekdayInfo,
};

/// Cache key for a memoized single-date lookup
pub fn day_key(date: NaiveDate) -> String {
    format!("{}:{}", date.year(), date)
}

/// Holiday queries with per-date memoization
pub struct HolidayService<S> {
    engine: Arc<HolidayEngine<S>>,
    day_lookup: Memoized<NaiveDate, DayInfo, QueryError>,
}

impl<S> HolidayService<S>
where
    S: HolidaySource + 'static,
{
    /// Wraps `engine`, memoizing day lookups in `day_store`
    ///
    /// Each day is kept only for what is left of its year's cache entry, so
    /// a day computed from a stale year expires with the stale retry window.
    pub fn new(engine: Arc<HolidayEngine<S>>, day_store: Arc<CacheStore<DayInfo>>) -> Self {
        let lookup_engine = Arc::clone(&engine);
        let ttl_engine = Arc::clone(&engine);
        let day_lookup = Memoized::new(
            day_store,
            |date: &NaiveDate| day_key(*date),
            move |date: NaiveDate| {
                let engine = Arc::clone(&lookup_engine);
                async move { engine.lookup_day(date).await }.boxed()
            },
        )
        .with_ttl_fn(move |info: &DayInfo| ttl_engine.year_time_to_live(info.date.year()));

        Self { engine, day_lookup }
    }

    pub fn engine(&self) -> &HolidayEngine<S> {
        &self.engine
    }

    pub async fn lookup_day(&self, date: NaiveDate) -> Result<DayInfo, QueryError> {
        self.day_lookup.invoke(date).await
    }

    pub async fn is_holiday(&self, date: NaiveDate) -> Result<HolidayCheck, QueryError> {
        self.lookup_day(date).await.map(HolidayCheck::from)
    }

    pub async fn list_holidays_for_year(&self, year: i32) -> Result<Vec<HolidayEntry>, QueryError> {
        self.engine.list_holidays_for_year(year).await
    }

    pub async fn list_compensatory_workdays_for_year(
        &self,
        year: i32,
    ) -> Result<Vec<HolidayEntry>, QueryError> {
        self.engine.list_compensatory_workdays_for_year(year).await
    }

    pub async fn next_holiday(&self, from: NaiveDate) -> Result<NextHoliday, QueryError> {
        self.engine.next_holiday(from).await
    }

    pub async fn countdown(&self, from: NaiveDate) -> Result<NextHoliday, QueryError> {
        self.engine.countdown(from).await
    }

    pub fn weekday(&self, date: NaiveDate) -> WeekdayInfo {
        weekday_info(date)
    }

    /// Pre-computes lookups for every date listed in `year`'s feed
    ///
    /// Returns how many days were cached.
    pub async fn warm_year(&self, year: i32) -> usize {
        let Ok(days) = self.engine.year_records(year).await else {
            return 0;
        };
        self.day_lookup
            .warm(days.iter().map(|day| day.date).collect::<Vec<_>>())
            .await
    }
}
