/// SVG chart writer
///
/// Renders the area histogram as a bar chart and channel histograms as
/// overlaid line charts. Output is a standalone SVG file that any browser
/// can open.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use super::PlotSink;
use crate::error::{PipelineError, Result};
use crate::stats::{AreaHistogram, ChannelHistogram};

/// Chart styling constants
const CHART_WIDTH: f64 = 900.0;
const CHART_HEIGHT: f64 = 540.0;
const MARGIN_TOP: f64 = 60.0;
const MARGIN_RIGHT: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 90.0;
const MARGIN_LEFT: f64 = 80.0;

const COLOR_BAR: &str = "#87ceeb"; // skyblue
const COLOR_EDGE: &str = "#000000";
const COLOR_GRID: &str = "#dddddd";
const COLOR_AXIS: &str = "#2c3e50";
const COLOR_TEXT: &str = "#2c3e50";

/// Line colors for R, G, B channels
const CHANNEL_COLORS: [(&str, &str); 3] = [
    ("Red", "#e74c3c"),
    ("Green", "#2ecc71"),
    ("Blue", "#3498db"),
];

/// Writes charts as SVG files
#[derive(Debug, Clone)]
pub struct SvgChart {
    output: PathBuf,
}

impl SvgChart {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self { output: output.into() }
    }

    /// Write a per-channel intensity chart of one image
    pub fn channel_histogram(&self, hist: &ChannelHistogram) -> Result<()> {
        write_svg(&self.output, &render_channel_histogram(hist))
    }
}

impl PlotSink for SvgChart {
    fn area_histogram(&mut self, hist: &AreaHistogram) -> Result<()> {
        write_svg(&self.output, &render_area_histogram(hist))
    }
}

fn write_svg(path: &Path, svg: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
        }
    }
    std::fs::write(path, svg).map_err(|e| PipelineError::io(path, e))
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Header, background, title, grid and axes shared by both charts
fn chart_frame(svg: &mut String, title: &str, x_label: &str, y_label: &str, y_max: f64) {
    let plot_width = CHART_WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_height = CHART_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;

    // Writing into a String cannot fail
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {w} {h}" width="{w}" height="{h}">"#,
        w = CHART_WIDTH,
        h = CHART_HEIGHT
    );
    let _ = write!(
        svg,
        r#"<rect width="{}" height="{}" fill="white"/>"#,
        CHART_WIDTH, CHART_HEIGHT
    );
    let _ = write!(
        svg,
        r#"<text x="{}" y="35" text-anchor="middle" font-family="Arial, sans-serif" font-size="18" font-weight="bold" fill="{}">{}</text>"#,
        CHART_WIDTH / 2.0,
        COLOR_TEXT,
        escape_xml(title)
    );

    // Grid lines with y tick labels
    for i in 0..=5 {
        let y = MARGIN_TOP + plot_height - (i as f64 / 5.0) * plot_height;
        let value = (i as f64 / 5.0) * y_max;
        let _ = write!(
            svg,
            r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="1"/>"#,
            MARGIN_LEFT,
            y,
            MARGIN_LEFT + plot_width,
            y,
            COLOR_GRID
        );
        let _ = write!(
            svg,
            r#"<text x="{}" y="{}" text-anchor="end" font-family="Arial, sans-serif" font-size="12" fill="{}">{:.0}</text>"#,
            MARGIN_LEFT - 10.0,
            y + 4.0,
            COLOR_TEXT,
            value
        );
    }

    // Axes
    let _ = write!(
        svg,
        r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="2"/>"#,
        MARGIN_LEFT,
        MARGIN_TOP + plot_height,
        MARGIN_LEFT + plot_width,
        MARGIN_TOP + plot_height,
        COLOR_AXIS
    );
    let _ = write!(
        svg,
        r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="2"/>"#,
        MARGIN_LEFT,
        MARGIN_TOP,
        MARGIN_LEFT,
        MARGIN_TOP + plot_height,
        COLOR_AXIS
    );

    // Axis labels
    let _ = write!(
        svg,
        r#"<text x="{}" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="14" fill="{}">{}</text>"#,
        MARGIN_LEFT + plot_width / 2.0,
        CHART_HEIGHT - 20.0,
        COLOR_TEXT,
        escape_xml(x_label)
    );
    let _ = write!(
        svg,
        r#"<text x="20" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="14" fill="{}" transform="rotate(-90 20 {})">{}</text>"#,
        CHART_HEIGHT / 2.0,
        COLOR_TEXT,
        CHART_HEIGHT / 2.0,
        escape_xml(y_label)
    );
}

/// Bar chart of the area distribution, one bar per bin
pub fn render_area_histogram(hist: &AreaHistogram) -> String {
    let plot_width = CHART_WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_height = CHART_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    let y_max = (hist.peak() as f64).max(1.0);

    let mut svg = String::new();
    chart_frame(
        &mut svg,
        "Distribution of Image Areas",
        "Area (pixels)",
        "Number of Images",
        y_max,
    );

    if hist.is_empty() {
        let _ = write!(
            svg,
            r#"<text x="{}" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="14" fill="{}">No readable images</text>"#,
            MARGIN_LEFT + plot_width / 2.0,
            MARGIN_TOP + plot_height / 2.0,
            COLOR_TEXT
        );
    }

    let slot = plot_width / hist.bins.len().max(1) as f64;
    for (i, bin) in hist.bins.iter().enumerate() {
        let bar_height = (bin.count as f64 / y_max) * plot_height;
        let x = MARGIN_LEFT + i as f64 * slot;
        let y = MARGIN_TOP + plot_height - bar_height;

        let _ = write!(
            svg,
            r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="{}" stroke="{}" stroke-width="1"><title>[{:.0}, {:.0}{}: {}</title></rect>"#,
            x,
            y,
            slot,
            bar_height,
            COLOR_BAR,
            COLOR_EDGE,
            bin.lower,
            bin.upper,
            if i + 1 == hist.bins.len() { "]" } else { ")" },
            bin.count
        );

        // Lower-bound tick label, rotated so large numbers fit
        let label_y = MARGIN_TOP + plot_height + 14.0;
        let _ = write!(
            svg,
            r#"<text x="{:.2}" y="{:.2}" text-anchor="end" font-family="Arial, sans-serif" font-size="10" fill="{}" transform="rotate(-45 {:.2} {:.2})">{:.0}</text>"#,
            x,
            label_y,
            COLOR_TEXT,
            x,
            label_y,
            bin.lower
        );
    }

    svg.push_str("</svg>");
    svg
}

/// Overlaid line chart of 256-level channel histograms
pub fn render_channel_histogram(hist: &ChannelHistogram) -> String {
    let plot_width = CHART_WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_height = CHART_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    let y_max = (hist.peak() as f64).max(1.0);

    let mut svg = String::new();
    chart_frame(&mut svg, "Image Histogram", "Pixel Intensity", "Pixel Count", y_max);

    for (channel, counts) in hist.data.iter().enumerate() {
        let (name, color) = CHANNEL_COLORS[channel % CHANNEL_COLORS.len()];

        let mut path = String::new();
        for (level, &count) in counts.iter().enumerate() {
            let x = MARGIN_LEFT + (level as f64 / 255.0) * plot_width;
            let y = MARGIN_TOP + plot_height - (count as f64 / y_max) * plot_height;
            let op = if level == 0 { "M" } else { " L" };
            let _ = write!(path, "{} {:.2} {:.2}", op, x, y);
        }
        let _ = write!(
            svg,
            r#"<path d="{}" fill="none" stroke="{}" stroke-width="1.5"/>"#,
            path, color
        );

        // Legend
        let legend_y = MARGIN_TOP + 10.0 + channel as f64 * 22.0;
        let _ = write!(
            svg,
            r#"<rect x="{}" y="{}" width="15" height="15" fill="{}"/>"#,
            CHART_WIDTH - MARGIN_RIGHT - 130.0,
            legend_y,
            color
        );
        let _ = write!(
            svg,
            r#"<text x="{}" y="{}" font-family="Arial, sans-serif" font-size="12" fill="{}">{} channel</text>"#,
            CHART_WIDTH - MARGIN_RIGHT - 110.0,
            legend_y + 12.0,
            COLOR_TEXT,
            name
        );
    }

    svg.push_str("</svg>");
    svg
}
