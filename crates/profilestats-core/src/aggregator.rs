//! Contributions + downloads → renderer-facing stats dataset.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::color::{stats_chart_colors, ChartColors};
use crate::{MonthlySeries, Result, StatsError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegendSettings {
    pub width: u32,
    pub margin_x: u32,
    pub margin_y: u32,
}

impl Default for LegendSettings {
    fn default() -> Self {
        Self {
            width: 180,
            margin_x: 14,
            margin_y: 18,
        }
    }
}

/// Fixed layout and color tokens of the stats chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsChartSettings {
    pub width: u32,
    pub height: u32,
    pub wrapper_border: u32,
    pub legend: LegendSettings,
    /// Keeps the contribution scale stable from one run to the next.
    pub contributions_axis_max: u64,
    pub y_axis_tick_count: u32,
    pub tension: f64,
    pub separator_color: String,
    /// Base color of the contributions line; every other token derives from it.
    pub github_color: String,
    pub npm_color: String,
}

impl Default for StatsChartSettings {
    fn default() -> Self {
        Self {
            width: 850,
            height: 220,
            wrapper_border: 1,
            legend: LegendSettings::default(),
            contributions_axis_max: 1000,
            y_axis_tick_count: 6,
            tension: 0.275,
            separator_color: "#ff0fff".to_string(),
            github_color: "#39d353".to_string(),
            npm_color: "#ffd353".to_string(),
        }
    }
}

impl StatsChartSettings {
    /// Derived contributions and downloads colors, in that order.
    pub fn series_colors(&self) -> Result<(ChartColors, ChartColors)> {
        Ok((
            stats_chart_colors(&self.github_color)?,
            stats_chart_colors(&self.npm_color)?,
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AxisBounds {
    pub min: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDataset {
    pub label: String,
    pub values: Vec<u64>,
    /// Raw total, never the estimated one.
    pub total: u64,
    #[serde(flatten)]
    pub colors: ChartColors,
    pub axis: AxisBounds,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsChartData {
    /// `YYYY-MM` on odd indices only.
    pub labels: Vec<String>,
    pub contributions: ChartDataset,
    pub downloads: ChartDataset,
    pub tension: f64,
    pub y_axis_tick_count: u32,
}

/// Zip two date-aligned monthly series into the chart dataset.
///
/// Both series must cover the identical months in the identical order.
pub fn build_stats_chart(
    contributions: &MonthlySeries,
    downloads: &MonthlySeries,
    settings: &StatsChartSettings,
) -> Result<StatsChartData> {
    if contributions.points.len() != downloads.points.len() {
        return Err(StatsError::SeriesMismatch(format!(
            "{} contribution months vs {} download months",
            contributions.points.len(),
            downloads.points.len()
        )));
    }

    if let Some((c, d)) = contributions
        .points
        .iter()
        .zip(&downloads.points)
        .find(|(c, d)| c.date != d.date)
    {
        return Err(StatsError::SeriesMismatch(format!(
            "contribution month {} aligned with download month {}",
            c.key(),
            d.key()
        )));
    }

    let (github_colors, npm_colors) = settings.series_colors()?;

    let labels = contributions
        .points
        .iter()
        .enumerate()
        .map(|(index, point)| {
            if index % 2 == 0 {
                String::new()
            } else {
                point.key().to_string()
            }
        })
        .collect();

    Ok(StatsChartData {
        labels,
        contributions: ChartDataset {
            label: "GitHub contributions".to_string(),
            values: contributions.points.iter().map(|p| p.count).collect(),
            total: contributions.total,
            colors: github_colors,
            axis: AxisBounds {
                min: 0,
                max: Some(settings.contributions_axis_max),
            },
        },
        downloads: ChartDataset {
            label: "npm downloads".to_string(),
            values: downloads.points.iter().map(|p| p.count).collect(),
            total: downloads.total,
            colors: npm_colors,
            axis: AxisBounds { min: 0, max: None },
        },
        tension: settings.tension,
        y_axis_tick_count: settings.y_axis_tick_count,
    })
}

impl StatsChartData {
    /// Flat key → value map for the template step.
    pub fn template_variables(&self, settings: &StatsChartSettings) -> BTreeMap<String, String> {
        let border = settings.wrapper_border;
        let inner_width = settings
            .width
            .saturating_sub(settings.legend.width)
            .saturating_sub(border * 2);

        let mut variables = BTreeMap::new();
        let mut set = |key: &str, value: String| {
            variables.insert(key.to_string(), value);
        };

        set("GITHUB_TOTAL", format_count(self.contributions.total));
        set("NPM_TOTAL", format_count(self.downloads.total));
        set("LEGEND_GITHUB_TITLE_COLOR", self.contributions.colors.legend_color.clone());
        set("LEGEND_GITHUB_VALUE_COLOR", self.contributions.colors.border_color.clone());
        set("LEGEND_NPM_TITLE_COLOR", self.downloads.colors.legend_color.clone());
        set("LEGEND_NPM_VALUE_COLOR", self.downloads.colors.border_color.clone());
        set("SEPARATOR_COLOR", settings.separator_color.clone());
        set("CHART_WIDTH", inner_width.to_string());
        set("CHART_HEIGHT", settings.height.saturating_sub(border * 2).to_string());
        set("LEGEND_X", (inner_width + settings.legend.margin_x).to_string());
        set("LEGEND_Y", (border + settings.legend.margin_y).to_string());
        set("VIEW_BOX_WIDTH", settings.width.to_string());
        set("VIEW_BOX_HEIGHT", settings.height.to_string());
        set("WRAPPER_WIDTH", settings.width.saturating_sub(border).to_string());
        set("WRAPPER_HEIGHT", settings.height.saturating_sub(border).to_string());

        variables
    }
}

/// `1234567` → `1,234,567`
pub fn format_count(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MonthlyPoint;
    use chrono::NaiveDate;

    fn month(m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, m, 1).unwrap()
    }

    fn series(counts: &[u64], total: u64) -> MonthlySeries {
        MonthlySeries {
            points: counts
                .iter()
                .enumerate()
                .map(|(i, count)| MonthlyPoint::new(month(i as u32 + 1), *count))
                .collect(),
            total,
        }
    }

    #[test]
    fn test_build_stats_chart_parallel_arrays() {
        let contributions = series(&[1, 2, 3, 4], 9);
        let downloads = series(&[10, 20, 30, 40], 100);

        let chart =
            build_stats_chart(&contributions, &downloads, &StatsChartSettings::default()).unwrap();

        assert_eq!(chart.contributions.values, vec![1, 2, 3, 4]);
        assert_eq!(chart.downloads.values, vec![10, 20, 30, 40]);
        assert_eq!(chart.contributions.total, 9);
        assert_eq!(chart.downloads.total, 100);
        assert_eq!(chart.labels.len(), 4);
    }

    #[test]
    fn test_labels_suppressed_on_even_indices() {
        let s = series(&[0; 5], 0);
        let chart = build_stats_chart(&s, &s, &StatsChartSettings::default()).unwrap();
        assert_eq!(chart.labels, vec!["", "2023-02", "", "2023-04", ""]);
    }

    #[test]
    fn test_axis_bounds() {
        let settings = StatsChartSettings {
            contributions_axis_max: 750,
            ..Default::default()
        };
        let s = series(&[5, 6], 11);
        let chart = build_stats_chart(&s, &s, &settings).unwrap();

        assert_eq!(chart.contributions.axis, AxisBounds { min: 0, max: Some(750) });
        assert_eq!(chart.downloads.axis, AxisBounds { min: 0, max: None });
    }

    #[test]
    fn test_length_mismatch_is_error() {
        let err = build_stats_chart(
            &series(&[1, 2, 3], 6),
            &series(&[1, 2], 3),
            &StatsChartSettings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, StatsError::SeriesMismatch(_)));
    }

    #[test]
    fn test_date_mismatch_is_error() {
        let contributions = series(&[1, 2], 3);
        let mut downloads = series(&[1, 2], 3);
        downloads.points[1] = MonthlyPoint::new(month(3), 2);

        let err =
            build_stats_chart(&contributions, &downloads, &StatsChartSettings::default()).unwrap_err();
        assert!(err.to_string().contains("2023-02"));
    }

    #[test]
    fn test_serialized_shape() {
        let s = series(&[1, 2], 3);
        let chart = build_stats_chart(&s, &s, &StatsChartSettings::default()).unwrap();
        let json = serde_json::to_value(&chart).unwrap();

        assert_eq!(json["labels"], serde_json::json!(["", "2023-02"]));
        assert_eq!(json["contributions"]["borderColor"], "rgb(57, 211, 83)");
        assert_eq!(json["contributions"]["backgroundColor"], "rgba(57, 211, 83, 0.075)");
        assert_eq!(json["contributions"]["legendColor"], "rgba(81, 187, 99, 0.65)");
        assert_eq!(json["contributions"]["axis"]["max"], 1000);
        assert!(json["downloads"]["axis"].get("max").is_none());
    }

    #[test]
    fn test_template_variables() {
        let settings = StatsChartSettings::default();
        let chart = build_stats_chart(&series(&[1], 1234), &series(&[2], 5), &settings).unwrap();

        let vars = chart.template_variables(&settings);

        assert_eq!(vars["GITHUB_TOTAL"], "1,234");
        assert_eq!(vars["NPM_TOTAL"], "5");
        assert_eq!(vars["CHART_WIDTH"], "668");
        assert_eq!(vars["CHART_HEIGHT"], "218");
        assert_eq!(vars["LEGEND_X"], "682");
        assert_eq!(vars["LEGEND_Y"], "19");
        assert_eq!(vars["VIEW_BOX_WIDTH"], "850");
        assert_eq!(vars["WRAPPER_HEIGHT"], "219");
        assert_eq!(vars["LEGEND_NPM_VALUE_COLOR"], "rgb(255, 211, 83)");
        assert_eq!(vars["LEGEND_GITHUB_TITLE_COLOR"], "rgba(81, 187, 99, 0.65)");
        assert_eq!(vars["SEPARATOR_COLOR"], "#ff0fff");
    }

    #[test]
    fn test_series_colors_derive_from_base() {
        let settings = StatsChartSettings {
            npm_color: "#ff0000".to_string(),
            ..Default::default()
        };
        let s = series(&[1], 1);
        let chart = build_stats_chart(&s, &s, &settings).unwrap();

        assert_eq!(chart.downloads.colors.border_color, "rgb(255, 0, 0)");
        assert_eq!(chart.downloads.colors.background_color, "rgba(255, 0, 0, 0.075)");
        assert_eq!(chart.contributions.colors.border_color, "rgb(57, 211, 83)");
    }

    #[test]
    fn test_invalid_series_color_is_error() {
        let settings = StatsChartSettings {
            github_color: "not-a-color".to_string(),
            ..Default::default()
        };
        let s = series(&[1], 1);
        let err = build_stats_chart(&s, &s, &settings).unwrap_err();
        assert!(matches!(err, StatsError::Configuration(_)));
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(1234567), "1,234,567");
    }
}
