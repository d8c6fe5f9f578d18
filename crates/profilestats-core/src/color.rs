//! Chart color tokens derived from a single base color.

use csscolorparser::Color;
use serde::Serialize;

use crate::{Result, StatsError};

const BACKGROUND_ALPHA: f32 = 0.075;

#[derive(Debug, Clone, Copy)]
struct LegendTone {
    desaturate: f32,
    alpha: f32,
}

const STATS_LEGEND: LegendTone = LegendTone {
    desaturate: 0.2,
    alpha: 0.65,
};

const LANGUAGES_LEGEND: LegendTone = LegendTone {
    desaturate: 0.1,
    alpha: 0.9,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartColors {
    /// Area fill under a series or slice.
    pub background_color: String,
    /// The base color itself.
    pub border_color: String,
    pub legend_color: String,
}

/// Colors of one line of the stats chart.
pub fn stats_chart_colors(base: &str) -> Result<ChartColors> {
    derive(base, STATS_LEGEND)
}

/// Colors of one slice of the languages chart.
pub fn languages_chart_colors(base: &str) -> Result<ChartColors> {
    derive(base, LANGUAGES_LEGEND)
}

fn derive(base: &str, legend: LegendTone) -> Result<ChartColors> {
    let color = csscolorparser::parse(base)
        .map_err(|e| StatsError::Configuration(format!("invalid color '{}': {}", base, e)))?;

    Ok(ChartColors {
        background_color: rgb_string(&with_alpha(&color, BACKGROUND_ALPHA)),
        border_color: rgb_string(&color),
        legend_color: rgb_string(&with_alpha(
            &desaturate(&color, legend.desaturate),
            legend.alpha,
        )),
    })
}

fn with_alpha(color: &Color, alpha: f32) -> Color {
    Color::new(color.r, color.g, color.b, alpha)
}

/// Lower HSL saturation by an absolute `amount`.
fn desaturate(color: &Color, amount: f32) -> Color {
    let [h, s, l, a] = color.to_hsla();
    Color::from_hsla(h, (s - amount).clamp(0.0, 1.0), l, a)
}

/// `rgb(r, g, b)` when opaque, `rgba(r, g, b, a)` otherwise.
fn rgb_string(color: &Color) -> String {
    let [r, g, b, _] = color.to_rgba8();
    let alpha = (f64::from(color.a) * 1000.0).round() / 1000.0;

    if alpha < 1.0 {
        format!("rgba({}, {}, {}, {})", r, g, b, alpha)
    } else {
        format!("rgb({}, {}, {})", r, g, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_colors_from_hex() {
        let colors = stats_chart_colors("#39d353").unwrap();
        assert_eq!(colors.background_color, "rgba(57, 211, 83, 0.075)");
        assert_eq!(colors.border_color, "rgb(57, 211, 83)");
        assert_eq!(colors.legend_color, "rgba(81, 187, 99, 0.65)");
    }

    #[test]
    fn test_languages_colors_use_lighter_legend_tone() {
        let colors = languages_chart_colors("#dea584").unwrap();
        assert_eq!(colors.background_color, "rgba(222, 165, 132, 0.075)");
        assert_eq!(colors.border_color, "rgb(222, 165, 132)");
        assert_eq!(colors.legend_color, "rgba(214, 167, 140, 0.9)");
    }

    #[test]
    fn test_translucent_base_keeps_its_alpha_on_border() {
        let colors = stats_chart_colors("rgba(64, 196, 99, 0.3)").unwrap();
        assert_eq!(colors.border_color, "rgba(64, 196, 99, 0.3)");
        assert_eq!(colors.background_color, "rgba(64, 196, 99, 0.075)");
    }

    #[test]
    fn test_named_color() {
        let colors = languages_chart_colors("white").unwrap();
        assert_eq!(colors.border_color, "rgb(255, 255, 255)");
        // No saturation to remove.
        assert_eq!(colors.legend_color, "rgba(255, 255, 255, 0.9)");
    }

    #[test]
    fn test_invalid_color_is_configuration_error() {
        let err = stats_chart_colors("#12345z").unwrap_err();
        assert!(matches!(err, StatsError::Configuration(_)));
        assert!(err.to_string().contains("#12345z"));
    }
}
