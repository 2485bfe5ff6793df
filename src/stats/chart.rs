//! SVG chart generation for BD-rate results.
//!
//! Generates grouped bar charts: one cluster per category (encoder
//! configuration) and one bar per series (encoder version) in each cluster.
//! All charts support light and dark mode via CSS media queries.

use std::fmt::Write as _;

/// One bar per category for a single series.
#[derive(Debug, Clone)]
pub struct BarSeries {
    /// Series identifier (used in legend).
    pub name: String,
    /// CSS color for the series.
    pub color: String,
    /// Value per category, in category order. `None` leaves a gap.
    pub values: Vec<Option<f64>>,
}

/// Data for a grouped bar chart.
#[derive(Debug, Clone, Default)]
pub struct BarChart {
    /// Category labels along the X axis.
    pub categories: Vec<String>,
    /// Series drawn side by side inside each category.
    pub series: Vec<BarSeries>,
}

/// Chart configuration.
#[derive(Debug, Clone)]
pub struct ChartConfig {
    /// Chart title.
    pub title: String,
    /// X-axis label.
    pub x_label: String,
    /// Y-axis label.
    pub y_label: String,
    /// Chart width in pixels.
    pub width: u32,
    /// Chart height in pixels.
    pub height: u32,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            title: "BD-Rate Comparison".to_string(),
            x_label: "Configuration".to_string(),
            y_label: "BD-Rate (%)".to_string(),
            width: 800,
            height: 480,
        }
    }
}

impl ChartConfig {
    /// Creates a new chart configuration with the given title.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Sets the X-axis label.
    #[must_use]
    pub fn with_x_label(mut self, label: impl Into<String>) -> Self {
        self.x_label = label.into();
        self
    }

    /// Sets the Y-axis label.
    #[must_use]
    pub fn with_y_label(mut self, label: impl Into<String>) -> Self {
        self.y_label = label.into();
        self
    }

    /// Sets the chart dimensions.
    #[must_use]
    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

/// Generates a grouped bar chart as SVG.
///
/// Bars grow up or down from the zero line, so negative BD-rates (savings)
/// hang below it. Returns an empty string when there is nothing to draw.
///
/// # Example
///
/// ```rust
/// use vvc_eval::stats::chart::{generate_bar_svg, BarChart, BarSeries, ChartConfig};
///
/// let chart = BarChart {
///     categories: vec!["AI".to_string(), "RA".to_string()],
///     series: vec![BarSeries {
///         name: "Approx".to_string(),
///         color: "#e74c3c".to_string(),
///         values: vec![Some(1.8), Some(-0.4)],
///     }],
/// };
///
/// let svg = generate_bar_svg(&chart, &ChartConfig::new("BD-Rate"));
/// assert!(svg.starts_with("<svg"));
/// ```
#[must_use]
pub fn generate_bar_svg(chart: &BarChart, config: &ChartConfig) -> String {
    let values: Vec<f64> = chart
        .series
        .iter()
        .flat_map(|s| s.values.iter().flatten().copied())
        .filter(|v| v.is_finite())
        .collect();
    if chart.categories.is_empty() || values.is_empty() {
        return String::new();
    }

    let (min_y, max_y) = bounds_with_zero(&values, 0.1);

    let width = config.width;
    let height = config.height;
    let margin_top = 50;
    let margin_right = 140;
    let margin_bottom = 70;
    let margin_left = 90;
    let plot_width = width - margin_left - margin_right;
    let plot_height = height - margin_top - margin_bottom;

    let scale_y = |v: f64| -> f64 {
        f64::from(margin_top) + (1.0 - (v - min_y) / (max_y - min_y)) * f64::from(plot_height)
    };

    let cluster_width = f64::from(plot_width) / chart.categories.len() as f64;
    let bar_width = cluster_width * 0.9 / chart.series.len().max(1) as f64;
    let cluster_x = |i: usize| f64::from(margin_left) + i as f64 * cluster_width;

    let mut svg = String::with_capacity(8192);

    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {} {}">"#,
        width, height
    );

    svg.push_str(
        r#"<style>
  :root {
    --bg-color: #ffffff;
    --text-color: #1a1a1a;
    --grid-color: #e0e0e0;
    --axis-color: #333333;
    --legend-bg: #ffffff;
    --legend-border: #cccccc;
  }
  @media (prefers-color-scheme: dark) {
    :root {
      --bg-color: #1a1a1a;
      --text-color: #e0e0e0;
      --grid-color: #404040;
      --axis-color: #b0b0b0;
      --legend-bg: #2a2a2a;
      --legend-border: #505050;
    }
  }
  .background { fill: var(--bg-color); }
  .title { font: bold 18px system-ui, sans-serif; fill: var(--text-color); }
  .axis-label { font: 13px system-ui, sans-serif; fill: var(--text-color); }
  .tick-label { font: 11px system-ui, sans-serif; fill: var(--text-color); }
  .legend { font: 13px system-ui, sans-serif; fill: var(--text-color); }
  .grid { stroke: var(--grid-color); stroke-width: 1; }
  .axis { stroke: var(--axis-color); stroke-width: 1.5; }
  .bar { stroke: grey; stroke-width: 1; }
  .legend-bg { fill: var(--legend-bg); stroke: var(--legend-border); }
</style>
"#,
    );

    let _ = writeln!(
        svg,
        r#"<rect class="background" width="{}" height="{}"/>"#,
        width, height
    );

    let _ = writeln!(
        svg,
        r#"<text x="{}" y="30" text-anchor="middle" class="title">{}</text>"#,
        f64::from(width) / 2.0,
        escape(&config.title)
    );

    // Horizontal grid and Y ticks
    for i in 0..=5 {
        let y_val = min_y + f64::from(i) / 5.0 * (max_y - min_y);
        let y = scale_y(y_val);
        let _ = writeln!(
            svg,
            r#"<line x1="{}" y1="{:.2}" x2="{}" y2="{:.2}" class="grid"/>"#,
            margin_left,
            y,
            width - margin_right,
            y
        );
        let _ = writeln!(
            svg,
            r#"<text x="{}" y="{:.2}" text-anchor="end" class="tick-label">{:.2}</text>"#,
            margin_left - 10,
            y + 4.0,
            y_val
        );
    }

    // Y axis and zero line
    let _ = writeln!(
        svg,
        r#"<line x1="{}" y1="{}" x2="{}" y2="{}" class="axis"/>"#,
        margin_left,
        margin_top,
        margin_left,
        height - margin_bottom
    );
    let zero = scale_y(0.0);
    let _ = writeln!(
        svg,
        r#"<line x1="{}" y1="{:.2}" x2="{}" y2="{:.2}" class="axis"/>"#,
        margin_left,
        zero,
        width - margin_right,
        zero
    );

    // Bars
    for (s_idx, s) in chart.series.iter().enumerate() {
        for (c_idx, value) in s.values.iter().copied().enumerate().take(chart.categories.len()) {
            let Some(v) = value.filter(|v| v.is_finite()) else {
                continue;
            };
            let x = cluster_x(c_idx) + cluster_width * 0.05 + s_idx as f64 * bar_width;
            let y_top = scale_y(v.max(0.0));
            let bar_height = (scale_y(v.min(0.0)) - y_top).max(0.5);
            let _ = writeln!(
                svg,
                r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="{}" class="bar"><title>{}: {:.3}</title></rect>"#,
                x,
                y_top,
                bar_width,
                bar_height,
                s.color,
                escape(&s.name),
                v
            );
        }
    }

    // Category labels, centered under each cluster
    for (i, category) in chart.categories.iter().enumerate() {
        let _ = writeln!(
            svg,
            r#"<text x="{:.2}" y="{}" text-anchor="middle" class="tick-label">{}</text>"#,
            cluster_x(i) + cluster_width / 2.0,
            height - margin_bottom + 20,
            escape(category)
        );
    }

    let _ = writeln!(
        svg,
        r#"<text x="{}" y="{}" text-anchor="middle" class="axis-label">{}</text>"#,
        f64::from(margin_left + plot_width / 2),
        height - 20,
        escape(&config.x_label)
    );

    let _ = writeln!(
        svg,
        r#"<text x="25" y="{}" text-anchor="middle" class="axis-label" transform="rotate(-90 25 {})">{}</text>"#,
        f64::from(height) / 2.0,
        f64::from(height) / 2.0,
        escape(&config.y_label)
    );

    // Legend
    let legend_x = width - margin_right + 15;
    let legend_y = margin_top + 20;
    let legend_height = 20 + chart.series.len() as u32 * 25;

    let _ = writeln!(
        svg,
        r#"<rect x="{}" y="{}" width="115" height="{}" rx="4" class="legend-bg"/>"#,
        legend_x,
        legend_y - 15,
        legend_height
    );

    for (i, s) in chart.series.iter().enumerate() {
        let y_offset = legend_y + i as u32 * 25;
        let _ = writeln!(
            svg,
            r#"<rect x="{}" y="{}" width="10" height="10" fill="{}"/>"#,
            legend_x + 10,
            y_offset,
            s.color
        );
        let _ = writeln!(
            svg,
            r#"<text x="{}" y="{}" class="legend">{}</text>"#,
            legend_x + 28,
            y_offset + 9,
            escape(&s.name)
        );
    }

    svg.push_str("</svg>\n");
    svg
}

/// Calculates min/max bounds with padding, always including zero.
fn bounds_with_zero(values: &[f64], padding: f64) -> (f64, f64) {
    let min = values.iter().copied().fold(0.0, f64::min);
    let max = values.iter().copied().fold(0.0, f64::max);
    let range = (max - min).max(1.0);
    (min - range * padding, max + range * padding)
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Standard color palette, cycled per series.
pub mod colors {
    /// Red.
    pub const RED: &str = "#e74c3c";
    /// Blue.
    pub const BLUE: &str = "#3498db";
    /// Green.
    pub const GREEN: &str = "#27ae60";
    /// Orange.
    pub const ORANGE: &str = "#e67e22";
    /// Purple.
    pub const PURPLE: &str = "#9b59b6";

    /// Palette in assignment order.
    pub const PALETTE: [&str; 5] = [BLUE, RED, GREEN, ORANGE, PURPLE];

    /// Color for the `i`-th series.
    #[must_use]
    pub fn nth(i: usize) -> &'static str {
        PALETTE[i % PALETTE.len()]
    }
}
