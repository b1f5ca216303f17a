//! Budget periods
//!
//! A period is one calendar month for one owner. [`Month`] is the calendar
//! value (navigation, parsing, date ranges); [`BudgetPeriod`] is the stored
//! period instance with its `Open -> Closed` state.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{OwnerId, PeriodId};

/// A calendar month, e.g. "2025-01"
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Month {
    year: i32,
    month: u32,
}

/// Years a budget month may fall in; keeps every month's neighbours
/// representable as dates
const YEARS: std::ops::RangeInclusive<i32> = 1..=9999;

impl Month {
    /// Create a month, rejecting months outside 1..=12 and years outside
    /// 1..=9999
    pub fn new(year: i32, month: u32) -> Result<Self, PeriodParseError> {
        if !(1..=12).contains(&month) {
            return Err(PeriodParseError::InvalidMonth(month));
        }
        if !YEARS.contains(&year) {
            return Err(PeriodParseError::YearOutOfRange(year));
        }
        Ok(Self { year, month })
    }

    /// The month containing `date`
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// First day of the month
    pub fn start_date(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Last day of the month (inclusive)
    pub fn end_date(&self) -> NaiveDate {
        self.next()
            .start_date()
            .pred_opt()
            .unwrap_or(NaiveDate::MIN)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        Self::containing(date) == *self
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn prev(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// Parse "YYYY-MM"
    pub fn parse(s: &str) -> Result<Self, PeriodParseError> {
        let s = s.trim();
        let (year, month) = s
            .split_once('-')
            .ok_or_else(|| PeriodParseError::InvalidFormat(s.to_string()))?;
        let year: i32 = year
            .parse()
            .map_err(|_| PeriodParseError::InvalidFormat(s.to_string()))?;
        let month: u32 = month
            .parse()
            .map_err(|_| PeriodParseError::InvalidFormat(s.to_string()))?;
        Self::new(year, month)
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Lifecycle state of a period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PeriodStatus {
    #[default]
    Open,
    Closed,
}

impl fmt::Display for PeriodStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "Open"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

/// One owner's budget period for one month
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetPeriod {
    pub id: PeriodId,
    pub owner_id: OwnerId,
    pub month: Month,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: PeriodStatus,

    /// Set in the same commit that writes this period's rollover
    #[serde(default)]
    pub rollover_applied: bool,

    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl BudgetPeriod {
    /// A fresh open period for `month`
    pub fn open(owner_id: OwnerId, month: Month) -> Self {
        Self {
            id: PeriodId::new(),
            owner_id,
            month,
            start_date: month.start_date(),
            end_date: month.end_date(),
            status: PeriodStatus::Open,
            rollover_applied: false,
            created_at: Utc::now(),
            closed_at: None,
        }
    }

    /// The open period that directly follows this one
    pub fn successor(&self) -> Self {
        Self::open(self.owner_id, self.month.next())
    }

    pub fn is_open(&self) -> bool {
        self.status == PeriodStatus::Open
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }

    /// A period has elapsed once `today` is past its last day
    pub fn has_elapsed(&self, today: NaiveDate) -> bool {
        today > self.end_date
    }

    pub fn close(&mut self) {
        self.status = PeriodStatus::Closed;
        self.closed_at = Some(Utc::now());
    }
}

impl fmt::Display for BudgetPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.month)
    }
}

/// Error type for period parsing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeriodParseError {
    #[error("Invalid period format: {0}")]
    InvalidFormat(String),
    #[error("Invalid month: {0}")]
    InvalidMonth(u32),
    #[error("Year out of range: {0}")]
    YearOutOfRange(i32),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_month_bounds() {
        let feb = Month::new(2024, 2).unwrap();
        assert_eq!(feb.start_date(), date(2024, 2, 1));
        assert_eq!(feb.end_date(), date(2024, 2, 29));

        let dec = Month::new(2024, 12).unwrap();
        assert_eq!(dec.end_date(), date(2024, 12, 31));
    }

    #[test]
    fn test_month_navigation() {
        let dec = Month::new(2024, 12).unwrap();
        assert_eq!(dec.next(), Month::new(2025, 1).unwrap());
        assert_eq!(dec.next().prev(), dec);
    }

    #[test]
    fn test_parse_and_display() {
        let m = Month::parse("2025-03").unwrap();
        assert_eq!(m.to_string(), "2025-03");
        assert_eq!(Month::parse("2025-13"), Err(PeriodParseError::InvalidMonth(13)));
        assert!(Month::parse("March").is_err());
        assert_eq!(
            Month::parse("2147483647-01"),
            Err(PeriodParseError::YearOutOfRange(i32::MAX))
        );
        assert_eq!(Month::new(-5, 6), Err(PeriodParseError::YearOutOfRange(-5)));
    }

    #[test]
    fn test_extreme_months_have_dates() {
        let last = Month::new(9999, 12).unwrap();
        assert_eq!(last.end_date(), date(9999, 12, 31));
        let first = Month::new(1, 1).unwrap();
        assert_eq!(first.start_date(), date(1, 1, 1));
        assert_eq!(first.prev().end_date(), date(0, 12, 31));
    }

    #[test]
    fn test_successor_is_contiguous() {
        let jan = BudgetPeriod::open(OwnerId::new(), Month::new(2025, 1).unwrap());
        let feb = jan.successor();
        assert_eq!(feb.start_date, jan.end_date + Duration::days(1));
        assert_eq!(feb.owner_id, jan.owner_id);
        assert!(feb.is_open());
    }

    #[test]
    fn test_has_elapsed_only_after_last_day() {
        let jan = BudgetPeriod::open(OwnerId::new(), Month::new(2025, 1).unwrap());
        assert!(!jan.has_elapsed(date(2025, 1, 15)));
        assert!(!jan.has_elapsed(date(2025, 1, 31)));
        assert!(jan.has_elapsed(date(2025, 2, 1)));
    }

    #[test]
    fn test_close() {
        let mut period = BudgetPeriod::open(OwnerId::new(), Month::new(2025, 1).unwrap());
        period.close();
        assert_eq!(period.status, PeriodStatus::Closed);
        assert!(period.closed_at.is_some());
    }
}
