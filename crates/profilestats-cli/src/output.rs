use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};
use profilestats_core::ledger::DownloadLedger;
use profilestats_core::period::Period;
use profilestats_core::pipeline::{LanguageReport, ProfileReport, StatsReport};
use profilestats_core::{format_count, MonthlySeries};
use serde::Serialize;

use crate::config::ProfileConfig;

pub const STATS_FILE: &str = "stats.json";
pub const LANGUAGES_FILE: &str = "languages.json";
pub const VARIABLES_FILE: &str = "variables.json";

fn atomic_write_file(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    if !parent.exists() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let temp_path = parent.join(format!(
        ".tmp-{}-{}",
        path.file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("dataset"),
        std::process::id()
    ));

    let mut file = fs::File::create(&temp_path)
        .with_context(|| format!("failed to create {}", temp_path.display()))?;
    file.write_all(contents.as_bytes())?;
    file.write_all(b"\n")?;
    drop(file);

    if let Err(err) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(err).with_context(|| format!("failed to write {}", path.display()));
    }
    Ok(())
}

/// Template keys of both charts in one flat map.
fn template_variables(report: &ProfileReport, config: &ProfileConfig) -> BTreeMap<String, String> {
    let mut variables = report.stats.chart.template_variables(&config.stats);
    variables.extend(
        report
            .languages
            .chart
            .template_variables(&config.languages.chart),
    );
    variables
}

/// Write every renderer-facing dataset into `dir`. Returns the written paths.
pub fn write_datasets(
    dir: &Path,
    report: &ProfileReport,
    config: &ProfileConfig,
) -> Result<Vec<PathBuf>> {
    // Serialize everything up front so nothing is written when one fails.
    let files = [
        (STATS_FILE, serde_json::to_string_pretty(&report.stats.chart)?),
        (
            LANGUAGES_FILE,
            serde_json::to_string_pretty(&report.languages.chart)?,
        ),
        (
            VARIABLES_FILE,
            serde_json::to_string_pretty(&template_variables(report, config))?,
        ),
    ];

    let mut written = Vec::with_capacity(files.len());
    for (name, contents) in files {
        let path = dir.join(name);
        atomic_write_file(&path, &contents)?;
        tracing::debug!(path = %path.display(), "wrote dataset");
        written.push(path);
    }
    Ok(written)
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header);
    table
}

fn right(value: String) -> Cell {
    Cell::new(value).set_alignment(CellAlignment::Right)
}

pub fn stats_table(report: &StatsReport) -> Table {
    let mut table = new_table(vec!["Month", "Contributions", "Downloads", "Chart (est.)"]);

    for (index, period) in report.periods.iter().enumerate() {
        let contributions = report.contributions.points.get(index).map_or(0, |p| p.count);
        let downloads = report.downloads.points.get(index).map_or(0, |p| p.count);
        let estimated = format!(
            "{} / {}",
            format_count(report.chart.contributions.values.get(index).copied().unwrap_or(0)),
            format_count(report.chart.downloads.values.get(index).copied().unwrap_or(0)),
        );

        table.add_row(vec![
            Cell::new(period.key.to_string()),
            right(format_count(contributions)),
            right(format_count(downloads)),
            right(estimated),
        ]);
    }
    table
}

pub fn print_stats(report: &StatsReport) {
    println!("{}", stats_table(report));
    println!(
        "\n{} {} | {} {} ({} packages)",
        "Contributions:".bright_black(),
        format_count(report.contributions.total).green().bold(),
        "Downloads:".bright_black(),
        format_count(report.downloads.total).yellow().bold(),
        report.packages.len()
    );
}

pub fn print_languages(report: &LanguageReport) {
    let mut table = new_table(vec!["Language", "Weight", "Color"]);
    for share in &report.distribution {
        table.add_row(vec![
            Cell::new(&share.name),
            right(format!("{}%", share.weight)),
            Cell::new(&share.color),
        ]);
    }

    println!("{}", table);
    println!(
        "\n{}",
        format!("Across {} repositories", report.repositories).bright_black()
    );
}

#[derive(Debug, Serialize)]
pub struct LedgerMonth {
    pub month: String,
    pub downloads: u64,
    pub estimated: u64,
}

#[derive(Debug, Serialize)]
pub struct LedgerWindow {
    pub months: Vec<LedgerMonth>,
    pub total: u64,
    pub stored_months: usize,
}

impl LedgerWindow {
    pub fn new(
        ledger: &DownloadLedger,
        periods: &[Period],
        raw: &MonthlySeries,
        estimated: &MonthlySeries,
    ) -> Self {
        let months = periods
            .iter()
            .zip(raw.points.iter().zip(&estimated.points))
            .map(|(period, (raw, estimated))| LedgerMonth {
                month: period.key.to_string(),
                downloads: raw.count,
                estimated: estimated.count,
            })
            .collect();

        Self {
            months,
            total: raw.total,
            stored_months: ledger.len(),
        }
    }
}

pub fn print_ledger(window: &LedgerWindow, path: &Path) {
    let mut table = new_table(vec!["Month", "Downloads", "Estimated"]);
    for month in &window.months {
        table.add_row(vec![
            Cell::new(&month.month),
            right(format_count(month.downloads)),
            right(format_count(month.estimated)),
        ]);
    }

    println!("{}", table);
    println!(
        "\n{} {} | {}",
        "Total:".bright_black(),
        format_count(window.total).yellow().bold(),
        format!(
            "{} months stored in {}",
            window.stored_months,
            path.display()
        )
        .bright_black()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use profilestats_core::build_stats_chart;
    use profilestats_core::languages::{LanguageChartData, LanguageShare};
    use profilestats_core::npm::PackageSet;

    fn empty_report(config: &ProfileConfig) -> ProfileReport {
        let series = MonthlySeries::default();
        let shares: &[LanguageShare] = &[];
        ProfileReport {
            stats: StatsReport {
                periods: Vec::new(),
                contributions: series.clone(),
                downloads: series.clone(),
                packages: PackageSet::default(),
                current_downloads: 0,
                chart: build_stats_chart(&series, &series, &config.stats).unwrap(),
            },
            languages: LanguageReport {
                repositories: 0,
                distribution: Vec::new(),
                chart: LanguageChartData::from(shares),
            },
        }
    }

    #[test]
    fn test_write_datasets_merges_chart_variables() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProfileConfig::default();

        let written = write_datasets(dir.path(), &empty_report(&config), &config).unwrap();
        assert_eq!(written.len(), 3);

        let variables: BTreeMap<String, String> = serde_json::from_str(
            &fs::read_to_string(dir.path().join(VARIABLES_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(variables["GITHUB_TOTAL"], "0");
        assert_eq!(variables["VIEW_BOX_WIDTH"], "850");
        assert_eq!(variables["LANGUAGE_CHART_MAX_WIDTH"], "416");
        assert_eq!(variables["LANGUAGES_COUNT"], "0");
    }

    #[test]
    fn test_atomic_write_creates_parent_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("stats.json");

        atomic_write_file(&path, "{}").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "{}\n");
        let entries: Vec<_> = fs::read_dir(path.parent().unwrap()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_atomic_write_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("variables.json");
        fs::write(&path, "old").unwrap();

        atomic_write_file(&path, "new").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new\n");
    }
}
