//! Calendar month arithmetic.
//!
//! All ledger math happens at month granularity: a timestamp is truncated to the first
//! day of its month, and joining or leaving partway through a month counts as the whole
//! month. [`Month`] is that truncated value.

use crate::errors::{Error, Result};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A calendar month, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Month {
    year: i32,
    month: u32,
}

impl Month {
    /// Builds a month from a year and a 1-based month number.
    #[must_use]
    pub const fn new(year: i32, month: u32) -> Option<Self> {
        if month >= 1 && month <= 12 {
            Some(Self { year, month })
        } else {
            None
        }
    }

    /// Truncates any date or timestamp to its month.
    #[must_use]
    pub fn of<D: Datelike>(date: &D) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The month containing `now`.
    #[must_use]
    pub fn current(now: DateTime<Utc>) -> Self {
        Self::of(&now)
    }

    /// Parses the `YYYY-MM` form used by payment forms.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInput`] when the text is not a valid month.
    pub fn parse(text: &str) -> Result<Self> {
        NaiveDate::parse_from_str(&format!("{}-01", text.trim()), "%Y-%m-%d")
            .map(|date| Self::of(&date))
            .map_err(|e| Error::InvalidInput {
                message: format!("'{text}' is not a month in YYYY-MM form: {e}"),
            })
    }

    /// Year of the month
    #[must_use]
    pub const fn year(self) -> i32 {
        self.year
    }

    /// 1-based month number
    #[must_use]
    pub const fn month(self) -> u32 {
        self.month
    }

    /// First day of the month, the form stored in `for_month` and `effective_month`.
    #[must_use]
    pub fn first_day(self) -> NaiveDate {
        // year and month always come from a valid chrono date
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// The following month.
    #[must_use]
    pub const fn next(self) -> Self {
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

    /// Every month from `start` through `end`, both inclusive. Empty when `start > end`.
    pub fn range_inclusive(start: Self, end: Self) -> impl Iterator<Item = Self> {
        std::iter::successors(Some(start).filter(|first| *first <= end), move |month| {
            Some(month.next()).filter(|next| *next <= end)
        })
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}
