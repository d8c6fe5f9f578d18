use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::period::{month_end, month_start};
use crate::{MonthlyPoint, MonthlySeries};

/// Fraction of `month` elapsed at `now`, measured from the first day at 00:00
/// to the last day at 00:00, clamped into `[0, 1]`.
pub fn estimation_ratio(month: NaiveDate, now: NaiveDateTime) -> f64 {
    let start = month_start(month).and_time(NaiveTime::MIN);
    let end = month_end(month).and_time(NaiveTime::MIN);

    let elapsed = (now - start).num_milliseconds() as f64;
    let span = (end - start).num_milliseconds() as f64;

    (elapsed / span).clamp(0.0, 1.0)
}

/// Chart-facing copy of `points` with the last (in-progress) month projected
/// to a full-month value.
///
/// Nothing changes on the last day of the month. The projected value is not
/// capped, so very early in a month it can be large. At a ratio of exactly 0
/// there is nothing to project from and the raw count is kept.
pub fn estimate_current_period(points: &[MonthlyPoint], now: NaiveDateTime) -> Vec<MonthlyPoint> {
    let mut estimated = points.to_vec();

    let Some(last) = estimated.last_mut() else {
        return estimated;
    };

    if now.date() == month_end(last.date) {
        return estimated;
    }

    let ratio = estimation_ratio(last.date, now);
    if ratio > 0.0 {
        last.count = (last.count as f64 / ratio).round() as u64;
    }

    estimated
}

/// Same as [`estimate_current_period`], keeping the raw `total`.
pub fn estimate_series(series: &MonthlySeries, now: NaiveDateTime) -> MonthlySeries {
    MonthlySeries {
        points: estimate_current_period(&series.points, now),
        total: series.total,
    }
}
