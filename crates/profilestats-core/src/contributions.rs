//! GitHub contribution calendar → monthly series.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::period::month_start;
use crate::{ContributionSeries, MonthlyPoint, Result, StatsError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionDay {
    pub date: NaiveDate,
    #[serde(rename = "contributionCount")]
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionWeek {
    #[serde(rename = "contributionDays", default)]
    pub days: Vec<ContributionDay>,
}

/// Raw `contributionCalendar` payload for one queried range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionCalendar {
    #[serde(default)]
    pub total_contributions: Option<u64>,
    #[serde(default)]
    pub weeks: Vec<ContributionWeek>,
}

impl ContributionCalendar {
    pub fn days(&self) -> impl Iterator<Item = &ContributionDay> {
        self.weeks.iter().flat_map(|week| week.days.iter())
    }

    /// Reported total, or the sum of the day counts when upstream omitted it.
    pub fn total(&self) -> u64 {
        self.total_contributions
            .unwrap_or_else(|| self.days().map(|day| day.count).sum())
    }

    /// Join two sequentially fetched ranges, older range first.
    ///
    /// Must happen before [`normalize`]: a month can span the boundary between
    /// the two fetches.
    pub fn merge(older: ContributionCalendar, newer: ContributionCalendar) -> ContributionCalendar {
        let total = older.total() + newer.total();
        let mut weeks = older.weeks;
        weeks.extend(newer.weeks);

        ContributionCalendar {
            total_contributions: Some(total),
            weeks,
        }
    }
}

/// Collapse days into one point per encountered month.
///
/// Days are consumed in the order received. A day belonging to an earlier
/// month than the last emitted point is rejected.
pub fn normalize(calendar: &ContributionCalendar) -> Result<ContributionSeries> {
    let mut points: Vec<MonthlyPoint> = Vec::with_capacity(13);

    for day in calendar.days() {
        let month = month_start(day.date);

        match points.last_mut() {
            Some(last) if last.date == month => last.count += day.count,
            Some(last) if last.date > month => {
                return Err(StatsError::invalid_payload(
                    "GitHub contribution calendar",
                    format!("day {} follows month {}", day.date, last.key()),
                ));
            }
            _ => points.push(MonthlyPoint::new(month, day.count)),
        }
    }

    Ok(ContributionSeries {
        points,
        total: calendar.total(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn day(y: i32, m: u32, d: u32, count: u64) -> ContributionDay {
        ContributionDay {
            date: date(y, m, d),
            count,
        }
    }

    fn calendar(weeks: Vec<Vec<ContributionDay>>) -> ContributionCalendar {
        let total = weeks.iter().flatten().map(|d| d.count).sum();
        ContributionCalendar {
            total_contributions: Some(total),
            weeks: weeks
                .into_iter()
                .map(|days| ContributionWeek { days })
                .collect(),
        }
    }

    #[test]
    fn test_normalize_collapses_same_month_days() {
        let cal = calendar(vec![
            vec![day(2023, 3, 29, 2), day(2023, 3, 30, 3)],
            vec![day(2023, 3, 31, 4), day(2023, 4, 1, 1), day(2023, 4, 2, 1)],
        ]);

        let series = normalize(&cal).unwrap();

        assert_eq!(
            series.points,
            vec![
                MonthlyPoint::new(date(2023, 3, 1), 9),
                MonthlyPoint::new(date(2023, 4, 1), 2),
            ]
        );
        assert_eq!(series.total, 11);
    }

    #[test]
    fn test_normalize_empty_calendar() {
        let series = normalize(&ContributionCalendar::default()).unwrap();
        assert!(series.points.is_empty());
        assert_eq!(series.total, 0);
    }

    #[test]
    fn test_normalize_dates_strictly_increasing() {
        let mut days = Vec::new();
        let mut current = date(2022, 11, 20);
        while current <= date(2023, 11, 19) {
            days.push(ContributionDay {
                date: current,
                count: u64::from(current.day() % 4),
            });
            current = current.succ_opt().unwrap();
        }
        let weeks: Vec<Vec<ContributionDay>> = days.chunks(7).map(|w| w.to_vec()).collect();

        let series = normalize(&calendar(weeks)).unwrap();

        assert_eq!(series.points.len(), 13);
        assert!(series.points.windows(2).all(|w| w[0].date < w[1].date));
        let mut keys: Vec<_> = series.months().collect();
        keys.dedup();
        assert_eq!(keys.len(), series.points.len());
    }

    #[test]
    fn test_normalize_rejects_earlier_month_after_later() {
        let cal = calendar(vec![vec![day(2023, 4, 1, 1), day(2023, 3, 31, 1)]]);
        let err = normalize(&cal).unwrap_err();
        assert!(matches!(err, StatsError::InvalidPayload { .. }));
    }

    #[test]
    fn test_total_falls_back_to_day_sum() {
        let cal = ContributionCalendar {
            total_contributions: None,
            weeks: vec![ContributionWeek {
                days: vec![day(2023, 1, 1, 5), day(2023, 1, 2, 6)],
            }],
        };
        assert_eq!(cal.total(), 11);
        assert_eq!(normalize(&cal).unwrap().total, 11);
    }

    #[test]
    fn test_merge_puts_older_range_first_and_sums_totals() {
        let older = calendar(vec![vec![day(2022, 3, 30, 1), day(2022, 3, 31, 2)]]);
        let newer = calendar(vec![vec![day(2022, 4, 1, 3)]]);

        let merged = ContributionCalendar::merge(older, newer);

        let dates: Vec<NaiveDate> = merged.days().map(|d| d.date).collect();
        assert_eq!(dates, vec![date(2022, 3, 30), date(2022, 3, 31), date(2022, 4, 1)]);
        assert_eq!(merged.total_contributions, Some(6));
    }

    #[test]
    fn test_split_straddling_month_matches_single_pass() {
        // The split lands mid-week and mid-month: March appears in both halves.
        let all_days = vec![
            day(2023, 2, 27, 1),
            day(2023, 2, 28, 2),
            day(2023, 3, 1, 3),
            day(2023, 3, 2, 4),
            day(2023, 3, 3, 5),
            day(2023, 3, 4, 6),
        ];
        let single = normalize(&calendar(vec![all_days.clone()])).unwrap();

        let older = calendar(vec![all_days[..3].to_vec()]);
        let newer = calendar(vec![all_days[3..].to_vec()]);
        let merged = normalize(&ContributionCalendar::merge(older.clone(), newer.clone())).unwrap();

        assert_eq!(merged, single);
        assert_eq!(
            merged.points,
            vec![
                MonthlyPoint::new(date(2023, 2, 1), 3),
                MonthlyPoint::new(date(2023, 3, 1), 18),
            ]
        );

        // Normalizing each half separately would emit March twice.
        let mut separate = normalize(&older).unwrap().points;
        separate.extend(normalize(&newer).unwrap().points);
        assert_eq!(separate.len(), 3);
        assert_ne!(separate, single.points);
    }

    #[test]
    fn test_deserialize_github_calendar() {
        let json = r#"{
            "totalContributions": 7,
            "weeks": [
                { "contributionDays": [
                    { "contributionCount": 3, "date": "2023-05-30" },
                    { "contributionCount": 4, "date": "2023-06-01" }
                ] }
            ]
        }"#;

        let cal: ContributionCalendar = serde_json::from_str(json).unwrap();
        assert_eq!(cal.total_contributions, Some(7));
        assert_eq!(cal.days().count(), 2);
        assert_eq!(normalize(&cal).unwrap().points.len(), 2);
    }
}
