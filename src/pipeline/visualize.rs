//! Chart rendering for report tables.
//!
//! Charts are standalone SVG documents: a line chart for time-ordered series
//! and a horizontal bar chart for ranked series. Rendering is pure; only
//! [`save_chart`] and [`Visualizer::render_country_charts`] touch the disk.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

use crate::config::ChartConfig;
use crate::error::Result;
use crate::pipeline::reporting::{ReportRow, ReportSet, ReportTable};

const FONT: &str = "DejaVu Sans, Arial, sans-serif";
const LINE_COLOR: &str = "#1f77b4";
const BAR_COLOR: &str = "#87ceeb";
const GRID_COLOR: &str = "#b0b0b0";
const Y_TICKS: usize = 5;

pub const MONTHLY_CHART_FILE: &str = "country_monthly_revenue.svg";
pub const PRODUCTS_CHART_FILE: &str = "country_top_products.svg";

/// Titles and canvas size for one chart
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub width: u32,
    pub height: u32,
}

impl ChartSpec {
    pub fn new(title: impl Into<String>, config: &ChartConfig) -> Self {
        Self {
            title: title.into(),
            x_label: String::new(),
            y_label: String::new(),
            width: config.width,
            height: config.height,
        }
    }

    pub fn with_x_label(mut self, label: impl Into<String>) -> Self {
        self.x_label = label.into();
        self
    }

    pub fn with_y_label(mut self, label: impl Into<String>) -> Self {
        self.y_label = label.into();
        self
    }
}

/// Plot area inside the canvas
#[derive(Debug, Clone, Copy)]
struct Frame {
    left: f64,
    top: f64,
    right: f64,
    bottom: f64,
}

impl Frame {
    fn width(&self) -> f64 {
        self.right - self.left
    }

    fn height(&self) -> f64 {
        self.bottom - self.top
    }
}

/// Minimal SVG document builder
struct SvgDocument {
    width: u32,
    height: u32,
    body: String,
}

impl SvgDocument {
    fn new(width: u32, height: u32) -> Self {
        let mut doc = Self {
            width,
            height,
            body: String::new(),
        };
        doc.rect(0.0, 0.0, width as f64, height as f64, "#ffffff");
        doc
    }

    fn rect(&mut self, x: f64, y: f64, w: f64, h: f64, fill: &str) -> &mut Self {
        let _ = writeln!(
            self.body,
            r#"<rect x="{x:.1}" y="{y:.1}" width="{w:.1}" height="{h:.1}" fill="{fill}"/>"#
        );
        self
    }

    fn line(
        &mut self,
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        stroke: &str,
        dashed: bool,
    ) -> &mut Self {
        let dash = if dashed {
            r#" stroke-dasharray="4 4" stroke-opacity="0.6""#
        } else {
            ""
        };
        let _ = writeln!(
            self.body,
            r#"<line x1="{x1:.1}" y1="{y1:.1}" x2="{x2:.1}" y2="{y2:.1}" stroke="{stroke}" stroke-width="1"{dash}/>"#
        );
        self
    }

    fn polyline(&mut self, points: &[(f64, f64)], stroke: &str) -> &mut Self {
        let coords = points
            .iter()
            .map(|(x, y)| format!("{x:.1},{y:.1}"))
            .collect::<Vec<_>>()
            .join(" ");
        let _ = writeln!(
            self.body,
            r#"<polyline points="{coords}" fill="none" stroke="{stroke}" stroke-width="2"/>"#
        );
        self
    }

    fn circle(&mut self, cx: f64, cy: f64, r: f64, fill: &str) -> &mut Self {
        let _ = writeln!(
            self.body,
            r#"<circle cx="{cx:.1}" cy="{cy:.1}" r="{r:.1}" fill="{fill}"/>"#
        );
        self
    }

    fn text(&mut self, x: f64, y: f64, content: &str, style: TextStyle) -> &mut Self {
        let rotate = if style.rotate != 0.0 {
            format!(r#" transform="rotate({:.0} {x:.1} {y:.1})""#, style.rotate)
        } else {
            String::new()
        };
        let _ = writeln!(
            self.body,
            r#"<text x="{x:.1}" y="{y:.1}" font-family="{FONT}" font-size="{}" text-anchor="{}"{rotate}>{}</text>"#,
            style.size,
            style.anchor,
            escape_xml(content)
        );
        self
    }

    fn finish(self) -> String {
        format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">\n{}</svg>\n",
            self.body,
            w = self.width,
            h = self.height
        )
    }
}

#[derive(Debug, Clone, Copy)]
struct TextStyle {
    size: u32,
    anchor: &'static str,
    rotate: f64,
}

impl TextStyle {
    const fn new(size: u32, anchor: &'static str) -> Self {
        Self {
            size,
            anchor,
            rotate: 0.0,
        }
    }

    const TITLE: TextStyle = TextStyle::new(18, "middle");
    const LABEL: TextStyle = TextStyle::new(13, "middle");
    const TICK_END: TextStyle = TextStyle::new(11, "end");
    const TICK_MIDDLE: TextStyle = TextStyle::new(11, "middle");
    const TICK_START: TextStyle = TextStyle::new(11, "start");

    fn rotated(mut self, degrees: f64) -> Self {
        self.rotate = degrees;
        self
    }
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

/// Smallest 1/2/2.5/5 x 10^k at or above `value`
fn nice_ceiling(value: f64) -> f64 {
    if !value.is_finite() || value <= 0.0 {
        return 1.0;
    }
    let magnitude = 10f64.powf(value.log10().floor());
    [1.0, 2.0, 2.5, 5.0, 10.0]
        .iter()
        .map(|m| m * magnitude)
        .find(|candidate| value <= *candidate)
        .unwrap_or(10.0 * magnitude)
}

fn format_tick(value: f64, step: f64) -> String {
    if step >= 1.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}

/// Rows with a finite value; anything else violates the chart precondition
fn plottable(table: &ReportTable) -> Vec<&ReportRow> {
    let rows: Vec<&ReportRow> = table.rows.iter().filter(|r| r.revenue.is_finite()).collect();
    if rows.len() != table.rows.len() {
        warn!(
            report = %table.name,
            skipped = table.rows.len() - rows.len(),
            "Skipping non-finite values"
        );
    }
    rows
}

fn draw_chrome(doc: &mut SvgDocument, spec: &ChartSpec, frame: Frame) {
    doc.text(spec.width as f64 / 2.0, 32.0, &spec.title, TextStyle::TITLE);
    if !spec.x_label.is_empty() {
        doc.text(
            frame.left + frame.width() / 2.0,
            spec.height as f64 - 12.0,
            &spec.x_label,
            TextStyle::LABEL,
        );
    }
    if !spec.y_label.is_empty() {
        let (x, y) = (20.0, frame.top + frame.height() / 2.0);
        doc.text(x, y, &spec.y_label, TextStyle::LABEL.rotated(-90.0));
    }
}

fn draw_no_data(doc: &mut SvgDocument, frame: Frame) {
    doc.text(
        frame.left + frame.width() / 2.0,
        frame.top + frame.height() / 2.0,
        "No data",
        TextStyle::LABEL,
    );
}

/// Time-ordered line chart: x = period label in table order, y = value,
/// a marker at every point, dashed grid, x labels rotated 45 degrees.
pub fn render_line_chart(table: &ReportTable, spec: &ChartSpec) -> String {
    let rows = plottable(table);
    let mut doc = SvgDocument::new(spec.width, spec.height);
    let frame = Frame {
        left: 90.0,
        top: 56.0,
        right: spec.width as f64 - 30.0,
        bottom: spec.height as f64 - 96.0,
    };
    draw_chrome(&mut doc, spec, frame);

    if rows.is_empty() {
        draw_no_data(&mut doc, frame);
        doc.line(frame.left, frame.bottom, frame.right, frame.bottom, "#000000", false);
        return doc.finish();
    }

    let max = rows.iter().map(|r| r.revenue).fold(0.0_f64, f64::max);
    let min = rows.iter().map(|r| r.revenue).fold(0.0_f64, f64::min);
    let top = nice_ceiling(max);
    let bottom = if min < 0.0 { -nice_ceiling(-min) } else { 0.0 };
    let span = top - bottom;
    let y_of = |v: f64| frame.bottom - (v - bottom) / span * frame.height();

    let step = span / Y_TICKS as f64;
    for i in 0..=Y_TICKS {
        let value = bottom + step * i as f64;
        let y = y_of(value);
        doc.line(frame.left, y, frame.right, y, GRID_COLOR, true);
        doc.text(frame.left - 8.0, y + 4.0, &format_tick(value, step), TextStyle::TICK_END);
    }

    let x_of = |i: usize| {
        if rows.len() == 1 {
            frame.left + frame.width() / 2.0
        } else {
            frame.left + frame.width() * i as f64 / (rows.len() - 1) as f64
        }
    };

    let points: Vec<(f64, f64)> = rows
        .iter()
        .enumerate()
        .map(|(i, r)| (x_of(i), y_of(r.revenue)))
        .collect();

    for (i, row) in rows.iter().enumerate() {
        let x = x_of(i);
        doc.line(x, frame.top, x, frame.bottom, GRID_COLOR, true);
        doc.text(
            x,
            frame.bottom + 16.0,
            &row.label,
            TextStyle::TICK_END.rotated(-45.0),
        );
    }

    doc.line(frame.left, frame.bottom, frame.right, frame.bottom, "#000000", false);
    doc.line(frame.left, frame.top, frame.left, frame.bottom, "#000000", false);
    doc.polyline(&points, LINE_COLOR);
    for (x, y) in &points {
        doc.circle(*x, *y, 4.0, LINE_COLOR);
    }

    doc.finish()
}

/// Horizontal bar chart ordered by descending value, largest bar on top
pub fn render_bar_chart(table: &ReportTable, spec: &ChartSpec) -> String {
    let mut rows = plottable(table);
    rows.sort_by(|a, b| b.revenue.total_cmp(&a.revenue));

    let longest_label = rows.iter().map(|r| r.label.chars().count()).max().unwrap_or(0);
    let label_space = (longest_label as f64 * 6.6).clamp(60.0, spec.width as f64 * 0.45);

    let mut doc = SvgDocument::new(spec.width, spec.height);
    let frame = Frame {
        left: label_space + 16.0,
        top: 56.0,
        right: spec.width as f64 - 80.0,
        bottom: spec.height as f64 - 56.0,
    };
    draw_chrome(&mut doc, spec, frame);

    if rows.is_empty() {
        draw_no_data(&mut doc, frame);
        return doc.finish();
    }

    let max = nice_ceiling(rows.iter().map(|r| r.revenue).fold(0.0_f64, f64::max));
    let x_of = |v: f64| frame.left + v.max(0.0) / max * frame.width();

    let step = max / Y_TICKS as f64;
    for i in 0..=Y_TICKS {
        let value = step * i as f64;
        let x = x_of(value);
        doc.line(x, frame.top, x, frame.bottom, GRID_COLOR, true);
        doc.text(x, frame.bottom + 18.0, &format_tick(value, step), TextStyle::TICK_MIDDLE);
    }

    let slot = frame.height() / rows.len() as f64;
    let bar_height = slot * 0.7;
    for (i, row) in rows.iter().enumerate() {
        let y = frame.top + slot * i as f64 + (slot - bar_height) / 2.0;
        let center = y + bar_height / 2.0 + 4.0;
        doc.rect(frame.left, y, x_of(row.revenue) - frame.left, bar_height, BAR_COLOR);
        doc.text(frame.left - 8.0, center, &row.label, TextStyle::TICK_END);
        doc.text(
            x_of(row.revenue) + 6.0,
            center,
            &format!("{:.*}", table.precision, row.revenue),
            TextStyle::TICK_START,
        );
    }
    doc.line(frame.left, frame.top, frame.left, frame.bottom, "#000000", false);

    doc.finish()
}

pub fn save_chart(svg: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, svg)?;
    Ok(())
}

/// Renders the country-scoped reports into the configured output directory
#[derive(Debug, Clone)]
pub struct Visualizer {
    config: ChartConfig,
    currency_label: String,
}

impl Visualizer {
    pub fn new(config: &ChartConfig) -> Self {
        Self {
            config: config.clone(),
            currency_label: "Revenue (£)".to_string(),
        }
    }

    /// Line chart of the country's monthly revenue and bar chart of its top
    /// products. Returns the written paths.
    #[instrument(skip(self, reports), fields(dir = %self.config.output_dir.display()))]
    pub fn render_country_charts(&self, reports: &ReportSet) -> Result<Vec<PathBuf>> {
        let monthly = &reports.country_monthly_revenue;
        let monthly_spec = ChartSpec::new(monthly.title.clone(), &self.config)
            .with_x_label("Month")
            .with_y_label(self.currency_label.clone());
        let monthly_path = self.config.output_dir.join(MONTHLY_CHART_FILE);
        save_chart(&render_line_chart(monthly, &monthly_spec), &monthly_path)?;

        let products = &reports.country_top_products;
        let products_spec = ChartSpec::new(products.title.clone(), &self.config)
            .with_x_label(self.currency_label.clone());
        let products_path = self.config.output_dir.join(PRODUCTS_CHART_FILE);
        save_chart(&render_bar_chart(products, &products_spec), &products_path)?;

        info!(
            monthly = %monthly_path.display(),
            products = %products_path.display(),
            "Charts written"
        );
        Ok(vec![monthly_path, products_path])
    }
}
