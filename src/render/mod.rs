//! Summary image: top countries by estimated GDP rendered to a PNG in the
//! cache directory after each successful refresh.

pub mod raster;

use chrono::{DateTime, Utc};
use image::Rgba;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::database_ops::settings::format_timestamp;
use crate::normalization::CountryRecord;
use raster::TextLine;

pub const IMAGE_WIDTH: u32 = 800;
pub const IMAGE_HEIGHT: u32 = 600;
pub const TOP_N: usize = 5;
pub const SUMMARY_FILE_NAME: &str = "summary.png";
pub const NO_POSITIVE_GDP: &str = "No countries with positive GDP found.";

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const INK: Rgba<u8> = Rgba([0x33, 0x33, 0x33, 255]);
const SECTION: Rgba<u8> = Rgba([0x55, 0x55, 0x55, 255]);
const MUTED: Rgba<u8> = Rgba([0x77, 0x77, 0x77, 255]);

/// Records with a strictly positive GDP, highest first, at most `n`.
/// Equal values keep their input order.
pub fn top_by_gdp(records: &[CountryRecord], n: usize) -> Vec<&CountryRecord> {
    let mut ranked: Vec<&CountryRecord> = records
        .iter()
        .filter(|r| r.estimated_gdp.is_some_and(|gdp| gdp > 0.0))
        .collect();
    ranked.sort_by(|a, b| {
        let (a, b) = (a.estimated_gdp.unwrap_or(0.0), b.estimated_gdp.unwrap_or(0.0));
        b.total_cmp(&a)
    });
    ranked.truncate(n);
    ranked
}

/// Thousands separators, at most two fraction digits, trailing zeros dropped:
/// `1234567.891` -> `1,234,567.89`, `1500.5` -> `1,500.5`.
pub fn format_gdp(value: f64) -> String {
    let cents = (value.abs() * 100.0).round() as u128;
    let (whole, frac) = (cents / 100, cents % 100);

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let mut out = String::new();
    if value < 0.0 && cents > 0 {
        out.push('-');
    }
    out.push_str(&grouped);
    if frac > 0 {
        let frac = format!("{frac:02}");
        out.push('.');
        out.push_str(frac.trim_end_matches('0'));
    }
    out
}

/// Fixed layout of the summary image.
pub fn summary_lines(
    records: &[CountryRecord],
    total: usize,
    refreshed_at: DateTime<Utc>,
) -> Vec<TextLine> {
    let line = |text: String, x: u32, y: u32, scale: u32, color: Rgba<u8>| TextLine {
        text,
        x,
        y,
        scale,
        color,
    };

    let mut lines = vec![
        line("Country Data Summary".into(), 50, 30, 3, INK),
        line(format!("Total Countries Processed: {total}"), 50, 90, 2, INK),
        line(
            format!("Last Refresh: {}", format_timestamp(refreshed_at)),
            50,
            130,
            2,
            MUTED,
        ),
        line("Top 5 Countries by Estimated GDP".into(), 50, 190, 2, SECTION),
    ];

    let top = top_by_gdp(records, TOP_N);
    if top.is_empty() {
        lines.push(line(NO_POSITIVE_GDP.into(), 70, 240, 2, INK));
    } else {
        for (i, country) in top.iter().enumerate() {
            let gdp = country.estimated_gdp.map(format_gdp).unwrap_or_default();
            lines.push(line(
                format!("{}. {} (GDP: {})", i + 1, country.name, gdp),
                70,
                240 + i as u32 * 30,
                2,
                INK,
            ));
        }
    }
    lines
}

/// Renders the summary PNG into a fixed path. Failures are logged, never
/// returned.
#[derive(Debug, Clone)]
pub struct SummaryRenderer {
    path: PathBuf,
}

impl SummaryRenderer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_cache_dir(cache_dir: impl AsRef<Path>) -> Self {
        Self::new(cache_dir.as_ref().join(SUMMARY_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns whether the image was written.
    pub fn render(&self, records: &[CountryRecord], total: usize, refreshed_at: DateTime<Utc>) -> bool {
        match self.try_render(records, total, refreshed_at) {
            Ok(()) => {
                info!(path = %self.path.display(), "summary image generated");
                true
            }
            Err(e) => {
                error!(path = %self.path.display(), error = ?e, "summary image generation failed");
                false
            }
        }
    }

    pub fn try_render(
        &self,
        records: &[CountryRecord],
        total: usize,
        refreshed_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let lines = summary_lines(records, total, refreshed_at);
        let canvas = raster::rasterize(IMAGE_WIDTH, IMAGE_HEIGHT, BACKGROUND, &lines);
        let png = raster::encode_png(&canvas)?;
        raster::write_atomic(&self.path, &png)
    }
}
