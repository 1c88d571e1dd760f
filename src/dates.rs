//! Day-level calendar arithmetic.
//!
//! Every date in LunaTrack is a plain calendar day with no time of day and no
//! time zone. Arithmetic goes through [`chrono::NaiveDate`], which counts days
//! directly, so results never depend on the host's locale or on daylight-saving
//! transitions.

use std::fmt;
use std::str::FromStr;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::DateError;

/// A calendar day, canonically written as `YYYY-MM-DD`.
///
/// Ordering is chronological. Because the textual form is fixed-width, sorting
/// the formatted strings gives the same order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CalendarDate(NaiveDate);

impl CalendarDate {
    /// Parse a strict `YYYY-MM-DD` string.
    ///
    /// Rejects anything that is not exactly four year digits, two month digits
    /// and two day digits separated by `-`, and anything that is not a real
    /// Gregorian date (e.g. `2023-02-29`).
    pub fn parse(s: &str) -> Result<Self, DateError> {
        if !has_iso_shape(s) {
            return Err(DateError::InvalidDateFormat(s.to_string()));
        }

        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(CalendarDate)
            .map_err(|_| DateError::InvalidDateFormat(s.to_string()))
    }

    /// Build a date from its components, if they denote a real day.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(CalendarDate)
    }

    /// Signed number of whole days from `self` to `other` (`other - self`).
    pub fn diff_days(self, other: CalendarDate) -> i64 {
        other.0.signed_duration_since(self.0).num_days()
    }

    /// The date `n` days after `self`; `n` may be negative.
    pub fn add_days(self, n: i64) -> Result<Self, DateError> {
        let shifted = if n >= 0 {
            self.0.checked_add_days(Days::new(n.unsigned_abs()))
        } else {
            self.0.checked_sub_days(Days::new(n.unsigned_abs()))
        };

        shifted.map(CalendarDate).ok_or(DateError::OutOfRange {
            date: self.to_string(),
            days: n,
        })
    }
}

impl From<NaiveDate> for CalendarDate {
    fn from(date: NaiveDate) -> Self {
        CalendarDate(date)
    }
}

/// `YYYY-MM-DD` with every position checked, since chrono's `%Y` alone would
/// also accept signs and short years.
fn has_iso_shape(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for CalendarDate {
    type Err = DateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CalendarDate::parse(s)
    }
}

impl Serialize for CalendarDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CalendarDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        CalendarDate::parse(&raw).map_err(serde::de::Error::custom)
    }
}
