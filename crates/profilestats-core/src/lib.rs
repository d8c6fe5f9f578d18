#![deny(clippy::all)]

mod aggregator;
pub mod color;
pub mod contributions;
mod error;
mod estimate;
pub mod github;
pub mod languages;
pub mod ledger;
pub mod npm;
pub mod period;
pub mod pipeline;

pub use aggregator::*;
pub use error::{Result, StatsError};
pub use estimate::*;

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Canonical `YYYY-MM` identifier of a calendar month.
///
/// Stored as the first day of the month so ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthKey(NaiveDate);

impl MonthKey {
    pub fn of(date: NaiveDate) -> Self {
        Self(period::month_start(date))
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m"))
    }
}

impl FromStr for MonthKey {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        let well_formed = bytes.len() == 7
            && bytes[4] == b'-'
            && bytes[..4].iter().all(u8::is_ascii_digit)
            && bytes[5..].iter().all(u8::is_ascii_digit);
        if !well_formed {
            return Err(format!("'{}' is not a YYYY-MM month key", s));
        }

        NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d")
            .map(Self)
            .map_err(|_| format!("'{}' is not a valid month", s))
    }
}

impl TryFrom<String> for MonthKey {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MonthKey> for String {
    fn from(key: MonthKey) -> Self {
        key.to_string()
    }
}

/// One (month, count) observation. `date` is always the first day of the month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthlyPoint {
    pub date: NaiveDate,
    pub count: u64,
}

impl MonthlyPoint {
    pub fn new(date: NaiveDate, count: u64) -> Self {
        Self {
            date: period::month_start(date),
            count,
        }
    }

    pub fn key(&self) -> MonthKey {
        MonthKey::of(self.date)
    }
}

/// Ascending monthly series plus the raw total it was derived from.
///
/// `total` is never touched by estimation; only chart-facing copies of
/// `points` are.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MonthlySeries {
    pub points: Vec<MonthlyPoint>,
    pub total: u64,
}

pub type ContributionSeries = MonthlySeries;
pub type DownloadSeries = MonthlySeries;

impl MonthlySeries {
    pub fn months(&self) -> impl Iterator<Item = MonthKey> + '_ {
        self.points.iter().map(MonthlyPoint::key)
    }
}
