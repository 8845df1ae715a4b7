use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Longest span a single calendar request may cover.
pub const MAX_RANGE_DAYS: i64 = 400;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    #[error("`from` ({from}) is after `to` ({to})")]
    Inverted { from: NaiveDate, to: NaiveDate },
    #[error("range covers {0} days, at most {max} are allowed", max = MAX_RANGE_DAYS)]
    TooLong(i64),
    #[error("invalid month {year}-{month}")]
    InvalidMonth { year: i32, month: u32 },
    #[error("the week of {0} falls outside the supported calendar")]
    OutOfBounds(NaiveDate),
}

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, RangeError> {
        if start > end {
            return Err(RangeError::Inverted { from: start, to: end });
        }
        let range = DateRange { start, end };
        let len = range.len_days();
        if len > MAX_RANGE_DAYS {
            return Err(RangeError::TooLong(len));
        }
        Ok(range)
    }

    pub fn single(day: NaiveDate) -> Self {
        DateRange { start: day, end: day }
    }

    /// Monday to Sunday of the week containing `day`. Fails for the first
    /// and last partial weeks chrono can represent.
    pub fn week_of(day: NaiveDate) -> Result<Self, RangeError> {
        let start = day
            .checked_sub_days(Days::new(u64::from(day.weekday().num_days_from_monday())))
            .ok_or(RangeError::OutOfBounds(day))?;
        let end = start.checked_add_days(Days::new(6)).ok_or(RangeError::OutOfBounds(day))?;
        Ok(DateRange { start, end })
    }

    pub fn month(year: i32, month: u32) -> Result<Self, RangeError> {
        let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or(RangeError::InvalidMonth { year, month })?;
        let next = start
            .checked_add_months(chrono::Months::new(1))
            .ok_or(RangeError::InvalidMonth { year, month })?;
        let end = next.pred_opt().ok_or(RangeError::InvalidMonth { year, month })?;
        Ok(DateRange { start, end })
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        day >= self.start && day <= self.end
    }

    pub fn len_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }

    /// Half-open UTC instant bounds `[start 00:00, end + 1 day 00:00)`. On
    /// the last representable day the upper bound is the latest instant.
    pub fn utc_bounds(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let from = self.start.and_time(NaiveTime::MIN).and_utc();
        let to = self
            .end
            .succ_opt()
            .map(|next| next.and_time(NaiveTime::MIN).and_utc())
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        (from, to)
    }
}
