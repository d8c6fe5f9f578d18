//! Calendar-month boundaries for the trailing year.
//!
//! Everything here works on local wall-clock dates. The only place a UTC
//! offset is applied is [`upstream_instant`], right before a boundary is sent
//! to GitHub.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, Months, NaiveDate, NaiveDateTime, NaiveTime,
    TimeZone, Utc,
};
use serde::Serialize;

use crate::MonthKey;

/// Months in the chart window: 11 full months plus the current one.
pub const WINDOW_MONTHS: u32 = 12;

const PERIOD_DATE_FORMAT: &str = "%Y-%m-%d";

pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Last day of the month containing `date`.
pub fn month_end(date: NaiveDate) -> NaiveDate {
    month_start(date)
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(NaiveDate::MAX)
}

/// First day of the month `months` calendar months before `date`'s month.
pub fn months_back(date: NaiveDate, months: u32) -> NaiveDate {
    month_start(date)
        .checked_sub_months(Months::new(months))
        .unwrap_or(NaiveDate::MIN)
}

fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    let last_milli = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
    date.and_time(last_milli)
}

/// Convert a local wall-clock boundary to the instant sent upstream.
///
/// GitHub buckets contribution days in UTC, so the real instant is shifted
/// forward by the local offset: local midnight goes out as midnight UTC of the
/// same calendar day.
pub fn upstream_instant(local: NaiveDateTime, offset: FixedOffset) -> DateTime<Utc> {
    let shift = Duration::seconds(i64::from(offset.local_minus_utc()));
    offset
        .from_local_datetime(&local)
        .earliest()
        .map_or_else(|| local.and_utc(), |instant| instant.with_timezone(&Utc) + shift)
}

/// One upstream contribution query window, in local wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContributionRange {
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
}

impl ContributionRange {
    pub fn upstream_bounds(&self, offset: FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            upstream_instant(self.from, offset),
            upstream_instant(self.to, offset),
        )
    }
}

/// A calendar month inside the chart window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Period {
    pub key: MonthKey,
    pub start: NaiveDate,
    /// Last day of the month, or today for the current month.
    pub end: NaiveDate,
}

impl Period {
    /// `start:end` as used by the npm download-point API.
    pub fn range(&self) -> String {
        format!(
            "{}:{}",
            self.start.format(PERIOD_DATE_FORMAT),
            self.end.format(PERIOD_DATE_FORMAT)
        )
    }
}

#[derive(Debug, Clone)]
pub struct LastYearPeriods {
    pub now: DateTime<FixedOffset>,
    /// Current month-to-date plus the 10 full months before it.
    pub recent: ContributionRange,
    /// The 11th full month before the current one, derived from `recent`.
    pub oldest: ContributionRange,
    /// Oldest first, current month last.
    pub periods: Vec<Period>,
}

impl LastYearPeriods {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        let local = now.naive_local();
        let today = local.date();

        let recent = ContributionRange {
            from: start_of_day(months_back(today, WINDOW_MONTHS - 2)),
            to: local,
        };

        let oldest_to = end_of_day(recent.from.date().pred_opt().unwrap_or(NaiveDate::MIN));
        let oldest = ContributionRange {
            from: start_of_day(month_start(oldest_to.date())),
            to: oldest_to,
        };

        let periods = (0..WINDOW_MONTHS)
            .rev()
            .map(|back| {
                let start = months_back(today, back);
                let end = if back == 0 { today } else { month_end(start) };
                Period {
                    key: MonthKey::of(start),
                    start,
                    end,
                }
            })
            .collect();

        Self {
            now,
            recent,
            oldest,
            periods,
        }
    }

    pub fn offset(&self) -> FixedOffset {
        *self.now.offset()
    }

    pub fn current(&self) -> Period {
        current_period(self.now.naive_local().date())
    }
}

/// The in-progress month, ending today.
pub fn current_period(today: NaiveDate) -> Period {
    let start = month_start(today);
    Period {
        key: MonthKey::of(start),
        start,
        end: today,
    }
}
