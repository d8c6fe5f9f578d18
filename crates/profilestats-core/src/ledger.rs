//! Persisted month-key → download count history.
//!
//! Only the current month is fetched from npm on each run; older months come
//! from the ledger. A ledger that cannot be read is always an error and is
//! never reinitialized.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::period::Period;
use crate::{DownloadSeries, MonthKey, MonthlyPoint, Result, StatsError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DownloadLedger(BTreeMap<MonthKey, u64>);

impl DownloadLedger {
    pub fn get(&self, key: MonthKey) -> Option<u64> {
        self.0.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Overwrite the count for `key`, leaving every other month untouched.
    pub fn merge_current(&mut self, key: MonthKey, count: u64) {
        self.0.insert(key, count);
    }

    /// One point per period, oldest first; months never recorded count as 0.
    pub fn project(&self, periods: &[Period]) -> DownloadSeries {
        let points: Vec<MonthlyPoint> = periods
            .iter()
            .map(|period| MonthlyPoint::new(period.start, self.get(period.key).unwrap_or(0)))
            .collect();
        let total = points.iter().map(|point| point.count).sum();

        DownloadSeries { points, total }
    }
}

impl FromIterator<(MonthKey, u64)> for DownloadLedger {
    fn from_iter<I: IntoIterator<Item = (MonthKey, u64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Where the ledger lives between runs.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn read(&self) -> Result<DownloadLedger>;
    async fn write(&self, ledger: &DownloadLedger) -> Result<()>;
}

/// Merge the fresh current-month value, persist the whole ledger, then window it.
pub async fn record_current_downloads<S: LedgerStore + ?Sized>(
    store: &S,
    current: &Period,
    count: u64,
    periods: &[Period],
) -> Result<(DownloadLedger, DownloadSeries)> {
    let mut ledger = store.read().await?;
    ledger.merge_current(current.key, count);
    store.write(&ledger).await?;

    let series = ledger.project(periods);
    Ok((ledger, series))
}

/// Pretty-printed JSON object on disk, e.g. `{ "2023-01": 100 }`.
#[derive(Debug, Clone)]
pub struct JsonFileLedger {
    path: PathBuf,
}

impl JsonFileLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn parse(&self, content: &str) -> Result<DownloadLedger> {
        serde_json::from_str(content)
            .map_err(|e| StatsError::persistence(&self.path, format!("malformed ledger: {}", e)))
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("ledger");
        self.path
            .with_file_name(format!(".tmp-{}-{}", name, std::process::id()))
    }
}

#[async_trait]
impl LedgerStore for JsonFileLedger {
    async fn read(&self) -> Result<DownloadLedger> {
        debug!(path = %self.path.display(), "reading download ledger");

        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| StatsError::persistence(&self.path, e))?;
        self.parse(&content)
    }

    async fn write(&self, ledger: &DownloadLedger) -> Result<()> {
        debug!(path = %self.path.display(), months = ledger.len(), "writing download ledger");

        let mut content = serde_json::to_string_pretty(ledger)
            .map_err(|e| StatsError::persistence(&self.path, e))?;
        content.push('\n');

        let temp_path = self.temp_path();
        tokio::fs::write(&temp_path, content)
            .await
            .map_err(|e| StatsError::persistence(&temp_path, e))?;

        if let Err(err) = tokio::fs::rename(&temp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(StatsError::persistence(&self.path, err));
        }
        Ok(())
    }
}

/// In-memory store. `None` behaves like a missing file.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    ledger: Mutex<Option<DownloadLedger>>,
    writes: Mutex<usize>,
}

impl MemoryLedger {
    pub fn new(ledger: DownloadLedger) -> Self {
        Self {
            ledger: Mutex::new(Some(ledger)),
            writes: Mutex::new(0),
        }
    }

    pub fn missing() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Option<DownloadLedger> {
        self.ledger
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn write_count(&self) -> usize {
        *self
            .writes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn read(&self) -> Result<DownloadLedger> {
        self.snapshot()
            .ok_or_else(|| StatsError::persistence("<memory>", "ledger has never been written"))
    }

    async fn write(&self, ledger: &DownloadLedger) -> Result<()> {
        *self
            .ledger
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(ledger.clone());
        *self
            .writes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::LastYearPeriods;
    use chrono::{FixedOffset, TimeZone};

    fn key(s: &str) -> MonthKey {
        s.parse().unwrap()
    }

    fn periods_ending(y: i32, m: u32, d: u32) -> LastYearPeriods {
        let now = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(y, m, d, 12, 0, 0)
            .unwrap();
        LastYearPeriods::new(now)
    }

    #[test]
    fn test_merge_current_overwrites_only_current_key() {
        let mut ledger: DownloadLedger = [(key("2023-01"), 100), (key("2023-02"), 10)]
            .into_iter()
            .collect();

        ledger.merge_current(key("2023-02"), 50);

        assert_eq!(ledger.get(key("2023-01")), Some(100));
        assert_eq!(ledger.get(key("2023-02")), Some(50));
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_merge_current_is_idempotent() {
        let base: DownloadLedger = [(key("2022-12"), 7)].into_iter().collect();

        let mut once = base.clone();
        once.merge_current(key("2023-01"), 42);

        let mut twice = base;
        twice.merge_current(key("2023-01"), 42);
        twice.merge_current(key("2023-01"), 42);

        assert_eq!(once, twice);
    }

    #[test]
    fn test_project_window_defaults_missing_months_to_zero() {
        let mut ledger: DownloadLedger = [(key("2023-01"), 100)].into_iter().collect();
        ledger.merge_current(key("2023-02"), 50);

        let year = periods_ending(2023, 2, 20);
        let series = ledger.project(&year.periods);

        assert_eq!(series.points.len(), 12);
        assert_eq!(series.points[0].key(), key("2022-03"));
        assert_eq!(series.points[11].key(), key("2023-02"));
        for point in &series.points[..10] {
            assert_eq!(point.count, 0);
        }
        assert_eq!(series.points[10].count, 100);
        assert_eq!(series.points[11].count, 50);
        assert_eq!(series.total, 150);
    }

    #[test]
    fn test_project_ignores_months_outside_window() {
        let ledger: DownloadLedger = [(key("2020-01"), 999), (key("2023-02"), 1)]
            .into_iter()
            .collect();
        let series = ledger.project(&periods_ending(2023, 2, 1).periods);
        assert_eq!(series.total, 1);
    }

    #[tokio::test]
    async fn test_record_current_downloads_end_to_end() {
        let store = MemoryLedger::new([(key("2023-01"), 100)].into_iter().collect());
        let year = periods_ending(2023, 2, 14);

        let (ledger, series) = record_current_downloads(&store, &year.current(), 50, &year.periods)
            .await
            .unwrap();

        let expected: DownloadLedger = [(key("2023-01"), 100), (key("2023-02"), 50)]
            .into_iter()
            .collect();
        assert_eq!(ledger, expected);
        assert_eq!(store.snapshot(), Some(expected));
        assert_eq!(store.write_count(), 1);
        assert_eq!(series.total, 150);
    }

    #[tokio::test]
    async fn test_record_current_downloads_missing_ledger_is_fatal() {
        let store = MemoryLedger::missing();
        let year = periods_ending(2023, 2, 14);

        let err = record_current_downloads(&store, &year.current(), 50, &year.periods)
            .await
            .unwrap_err();

        assert!(matches!(err, StatsError::Persistence { .. }));
        assert_eq!(store.write_count(), 0);
        assert!(store.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileLedger::new(dir.path().join("history.json"));
        let ledger: DownloadLedger = [(key("2022-11"), 12_345_678_901), (key("2023-01"), 0)]
            .into_iter()
            .collect();

        store.write(&ledger).await.unwrap();
        let content = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(content, "{\n  \"2022-11\": 12345678901,\n  \"2023-01\": 0\n}\n");

        assert_eq!(store.read().await.unwrap(), ledger);
        let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[tokio::test]
    async fn test_json_file_missing_is_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileLedger::new(dir.path().join("absent.json"));
        assert!(matches!(
            store.read().await.unwrap_err(),
            StatsError::Persistence { .. }
        ));
    }

    #[test]
    fn test_parse_rejects_malformed_content() {
        let store = JsonFileLedger::new("history.json");
        for bad in [
            "not json",
            "[1, 2]",
            r#"{"2023-1": 3}"#,
            r#"{"2023-01": -3}"#,
            r#"{"2023-01": "3"}"#,
        ] {
            assert!(
                matches!(store.parse(bad), Err(StatsError::Persistence { .. })),
                "accepted {:?}",
                bad
            );
        }
        assert!(store.parse("{}").unwrap().is_empty());
    }
}
