//! Repository language sizes → bounded, colored distribution.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::color::{languages_chart_colors, ChartColors};
use crate::{LegendSettings, Result, StatsError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageSize {
    pub name: String,
    /// Bytes attributed to the language in one repository.
    pub size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryLanguages {
    pub repository: String,
    pub languages: Vec<LanguageSize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageShare {
    pub name: String,
    /// Truncated percentage of all bytes, floor-boosted.
    pub weight: u64,
    /// Base color, as configured or taken from the palette.
    pub color: String,
    pub chart_colors: ChartColors,
}

pub type LanguageDistribution = Vec<LanguageShare>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageSettings {
    pub top_n: usize,
    /// Shares under this percentage get `boost` added.
    pub floor: u64,
    pub boost: u64,
    /// Display color by language name, matched case-insensitively.
    pub colors: HashMap<String, String>,
    /// Handed out in order to languages missing from `colors`.
    pub fallback_palette: Vec<String>,
    pub chart: LanguageChartSettings,
}

/// Layout of the languages chart: a fixed-size doughnut with the legend to its right.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageChartSettings {
    pub width: u32,
    pub height: u32,
    pub wrapper_border: u32,
    pub legend: LegendSettings,
}

impl Default for LanguageChartSettings {
    fn default() -> Self {
        Self {
            width: 220,
            height: 220,
            wrapper_border: 1,
            legend: LegendSettings::default(),
        }
    }
}

impl LanguageChartSettings {
    /// Full rendered width, also the largest width the README may display it at.
    pub fn max_width(&self) -> u32 {
        self.width + self.legend.width + self.legend.margin_x + self.wrapper_border * 2
    }
}

impl Default for LanguageSettings {
    fn default() -> Self {
        let colors = [
            ("typescript", "#3178c6"),
            ("javascript", "#f1e05a"),
            ("rust", "#dea584"),
            ("css", "#563d7c"),
            ("html", "#e34c26"),
            ("shell", "#89e051"),
            ("astro", "#ff5a03"),
            ("vue", "#41b883"),
            ("python", "#3572a5"),
            ("go", "#00add8"),
            ("mdx", "#fcb32c"),
        ]
        .into_iter()
        .map(|(name, color)| (name.to_string(), color.to_string()))
        .collect();

        Self {
            top_n: 6,
            floor: 5,
            boost: 5,
            colors,
            fallback_palette: ["#5000ff", "#009999", "#ff0fff", "#39d353", "#ffd353", "#ff6b6b"]
                .into_iter()
                .map(String::from)
                .collect(),
            chart: LanguageChartSettings::default(),
        }
    }
}

/// Sum bytes per language across repositories.
pub fn language_totals(repositories: &[RepositoryLanguages]) -> BTreeMap<String, u64> {
    let mut totals = BTreeMap::new();
    for language in repositories.iter().flat_map(|repo| &repo.languages) {
        *totals.entry(language.name.clone()).or_insert(0) += language.size;
    }
    totals
}

pub fn reduce_languages(
    repositories: &[RepositoryLanguages],
    settings: &LanguageSettings,
) -> Result<LanguageDistribution> {
    let totals = language_totals(repositories);
    let grand_total: u64 = totals.values().sum();
    if grand_total == 0 {
        return Ok(Vec::new());
    }

    let mut weights: Vec<(String, u64)> = totals
        .into_iter()
        .map(|(name, size)| {
            let percent = (u128::from(size) * 100 / u128::from(grand_total)) as u64;
            let weight = if percent < settings.floor {
                percent + settings.boost
            } else {
                percent
            };
            (name, weight)
        })
        .collect();

    weights.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    weights.truncate(settings.top_n);

    let configured: HashMap<String, &String> = settings
        .colors
        .iter()
        .map(|(name, color)| (name.to_lowercase(), color))
        .collect();
    let mut palette = settings.fallback_palette.iter();

    weights
        .into_iter()
        .map(|(name, weight)| {
            let color = match configured.get(&name.to_lowercase()) {
                Some(color) => (*color).clone(),
                None => palette.next().cloned().ok_or_else(|| {
                    StatsError::Configuration(format!(
                        "no color configured for language '{}' and the fallback palette is exhausted",
                        name
                    ))
                })?,
            };
            let chart_colors = languages_chart_colors(&color).map_err(|e| match e {
                StatsError::Configuration(reason) => {
                    StatsError::Configuration(format!("language '{}': {}", name, reason))
                }
                other => other,
            })?;
            Ok(LanguageShare {
                name,
                weight,
                color,
                chart_colors,
            })
        })
        .collect()
}

/// Renderer-facing parallel arrays for the languages chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageChartData {
    pub labels: Vec<String>,
    pub values: Vec<u64>,
    pub background_colors: Vec<String>,
    pub border_colors: Vec<String>,
    pub legend_colors: Vec<String>,
}

impl From<&[LanguageShare]> for LanguageChartData {
    fn from(shares: &[LanguageShare]) -> Self {
        let mut chart = Self {
            labels: Vec::with_capacity(shares.len()),
            values: Vec::with_capacity(shares.len()),
            background_colors: Vec::with_capacity(shares.len()),
            border_colors: Vec::with_capacity(shares.len()),
            legend_colors: Vec::with_capacity(shares.len()),
        };

        for share in shares {
            chart.labels.push(share.name.clone());
            chart.values.push(share.weight);
            chart
                .background_colors
                .push(share.chart_colors.background_color.clone());
            chart.border_colors.push(share.chart_colors.border_color.clone());
            chart.legend_colors.push(share.chart_colors.legend_color.clone());
        }
        chart
    }
}

impl LanguageChartData {
    /// Layout keys of the languages chart for the template step.
    pub fn template_variables(&self, settings: &LanguageChartSettings) -> BTreeMap<String, String> {
        let border = settings.wrapper_border;
        let max_width = settings.max_width();

        let mut variables = BTreeMap::new();
        let mut set = |key: &str, value: u32| {
            variables.insert(key.to_string(), value.to_string());
        };

        set("LANGUAGE_CHART_MAX_WIDTH", max_width);
        set("LANGUAGES_CHART_WIDTH", settings.width);
        set("LANGUAGES_CHART_HEIGHT", settings.height);
        set("LANGUAGES_LEGEND_X", border + settings.width + settings.legend.margin_x);
        set("LANGUAGES_LEGEND_Y", border + settings.legend.margin_y);
        set("LANGUAGES_VIEW_BOX_WIDTH", max_width);
        set("LANGUAGES_VIEW_BOX_HEIGHT", settings.height + border * 2);
        set("LANGUAGES_WRAPPER_WIDTH", max_width.saturating_sub(border));
        set("LANGUAGES_WRAPPER_HEIGHT", settings.height + border);

        variables.insert("LANGUAGES_COUNT".to_string(), self.labels.len().to_string());
        variables
    }
}
