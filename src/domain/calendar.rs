//! Active month
//!
//! Ledgers are kept per calendar month. The account tracks which month is
//! currently open and advances one month at a time.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Calendar month/year pair. `month` is 1-based (January = 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawActiveMonth")]
pub struct ActiveMonth {
    year: u32,
    month: u32,
}

#[derive(Deserialize)]
struct RawActiveMonth {
    year: u32,
    month: u32,
}

impl TryFrom<RawActiveMonth> for ActiveMonth {
    type Error = String;

    fn try_from(raw: RawActiveMonth) -> Result<Self, Self::Error> {
        ActiveMonth::new(raw.month, raw.year)
            .ok_or_else(|| format!("month out of range: {}", raw.month))
    }
}

impl ActiveMonth {
    /// Build a month. Returns `None` unless `1 <= month <= 12`.
    pub fn new(month: u32, year: u32) -> Option<Self> {
        if (1..=12).contains(&month) {
            Some(Self { year, month })
        } else {
            None
        }
    }

    /// Month containing the given instant (UTC).
    pub fn of(date: &DateTime<Utc>) -> Self {
        Self {
            year: date.year().max(0) as u32,
            month: date.month(),
        }
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn year(&self) -> u32 {
        self.year
    }

    /// The following month; December wraps to January of the next year.
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

    pub fn contains(&self, date: &DateTime<Utc>) -> bool {
        Self::of(date) == *self
    }
}

impl fmt::Display for ActiveMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.year, self.month)
    }
}
