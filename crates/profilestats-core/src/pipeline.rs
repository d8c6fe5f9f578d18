//! Sequencing of the stats and languages runs over injected upstream capabilities.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::contributions::{normalize, ContributionCalendar};
use crate::languages::{
    reduce_languages, LanguageChartData, LanguageDistribution, LanguageSettings,
    RepositoryLanguages,
};
use crate::ledger::{record_current_downloads, LedgerStore};
use crate::npm::PackageSet;
use crate::period::{LastYearPeriods, Period};
use crate::{
    build_stats_chart, estimate_series, ContributionSeries, DownloadSeries, MonthlyPoint,
    MonthlySeries, Result, StatsChartData, StatsChartSettings,
};

#[async_trait]
pub trait ContributionSource: Send + Sync {
    /// Raw calendar between two upstream instants (already offset-adjusted).
    async fn contribution_calendar(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<ContributionCalendar>;
}

#[async_trait]
pub trait LanguageSource: Send + Sync {
    async fn repository_languages(&self) -> Result<Vec<RepositoryLanguages>>;
}

#[async_trait]
pub trait DownloadSource: Send + Sync {
    async fn maintainer_packages(&self) -> Result<PackageSet>;
    async fn period_downloads(&self, packages: &PackageSet, period: &Period) -> Result<u64>;
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    pub periods: Vec<Period>,
    /// Raw series; the chart holds the estimated copies.
    pub contributions: ContributionSeries,
    pub downloads: DownloadSeries,
    pub packages: PackageSet,
    pub current_downloads: u64,
    pub chart: StatsChartData,
}

#[derive(Debug, Clone, Serialize)]
pub struct LanguageReport {
    pub repositories: usize,
    pub distribution: LanguageDistribution,
    pub chart: LanguageChartData,
}

/// Everything a full run produces; nothing is persisted unless both parts succeed.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileReport {
    pub stats: StatsReport,
    pub languages: LanguageReport,
}

pub struct StatsPipeline<C, D, S> {
    contributions: C,
    downloads: D,
    ledger: S,
    settings: StatsChartSettings,
}

impl<C, D, S> StatsPipeline<C, D, S>
where
    C: ContributionSource,
    D: DownloadSource,
    S: LedgerStore,
{
    pub fn new(contributions: C, downloads: D, ledger: S, settings: StatsChartSettings) -> Self {
        Self {
            contributions,
            downloads,
            ledger,
            settings,
        }
    }

    pub fn ledger(&self) -> &S {
        &self.ledger
    }

    /// Both contribution ranges, recent first, merged before normalizing.
    pub async fn fetch_contributions(&self, year: &LastYearPeriods) -> Result<ContributionSeries> {
        let offset = year.offset();

        let (from, to) = year.recent.upstream_bounds(offset);
        let recent = self.contributions.contribution_calendar(from, to).await?;

        let (from, to) = year.oldest.upstream_bounds(offset);
        let oldest = self.contributions.contribution_calendar(from, to).await?;

        let series = normalize(&ContributionCalendar::merge(oldest, recent))?;
        info!(
            months = series.points.len(),
            total = series.total,
            "normalized GitHub contributions"
        );
        Ok(align_to_periods(&series, &year.periods))
    }

    /// Fresh current-month downloads merged into the ledger, windowed.
    pub async fn fetch_downloads(
        &self,
        year: &LastYearPeriods,
    ) -> Result<(PackageSet, u64, DownloadSeries)> {
        let packages = self.downloads.maintainer_packages().await?;
        info!(
            unscoped = packages.unscoped.len(),
            scoped = packages.scoped.len(),
            "found npm packages"
        );

        let current = year.current();
        let count = self.downloads.period_downloads(&packages, &current).await?;
        info!(month = %current.key, downloads = count, "fetched current npm downloads");

        let (_, series) =
            record_current_downloads(&self.ledger, &current, count, &year.periods).await?;
        Ok((packages, count, series))
    }

    pub async fn build_stats(&self, now: DateTime<FixedOffset>) -> Result<StatsReport> {
        // Bad colors must fail before the ledger is written.
        self.settings.series_colors()?;

        let year = LastYearPeriods::new(now);
        let local_now = now.naive_local();

        let contributions = self.fetch_contributions(&year).await?;
        let (packages, current_downloads, downloads) = self.fetch_downloads(&year).await?;

        let chart = build_stats_chart(
            &estimate_series(&contributions, local_now),
            &estimate_series(&downloads, local_now),
            &self.settings,
        )?;

        Ok(StatsReport {
            periods: year.periods,
            contributions,
            downloads,
            packages,
            current_downloads,
            chart,
        })
    }

    /// Languages, then stats. The stats run is the only stage that writes the
    /// ledger, so it goes last.
    pub async fn build_profile<L: LanguageSource + ?Sized>(
        &self,
        languages: &L,
        language_settings: &LanguageSettings,
        now: DateTime<FixedOffset>,
    ) -> Result<ProfileReport> {
        let languages = build_languages(languages, language_settings).await?;
        let stats = self.build_stats(now).await?;
        Ok(ProfileReport { stats, languages })
    }
}

pub async fn build_languages<L: LanguageSource + ?Sized>(
    source: &L,
    settings: &LanguageSettings,
) -> Result<LanguageReport> {
    let repositories = source.repository_languages().await?;
    let distribution = reduce_languages(&repositories, settings)?;
    info!(
        repositories = repositories.len(),
        languages = distribution.len(),
        "reduced GitHub languages"
    );

    Ok(LanguageReport {
        repositories: repositories.len(),
        chart: LanguageChartData::from(distribution.as_slice()),
        distribution,
    })
}

/// One point per period; months outside the window are dropped, missing ones are 0.
fn align_to_periods(series: &MonthlySeries, periods: &[Period]) -> MonthlySeries {
    let points: Vec<MonthlyPoint> = periods
        .iter()
        .map(|period| {
            let count = series
                .points
                .iter()
                .find(|point| point.key() == period.key)
                .map_or(0, |point| point.count);
            MonthlyPoint::new(period.start, count)
        })
        .collect();

    let outside = series
        .months()
        .filter(|key| !periods.iter().any(|period| period.key == *key))
        .count();
    if outside > 0 {
        debug!(months = outside, "dropped contribution months outside the window");
    }

    MonthlySeries {
        points,
        total: series.total,
    }
}
