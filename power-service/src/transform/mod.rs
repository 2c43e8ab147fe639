//! Turning raw spreadsheet rows into clean, complete days of readings.
//!
//! Two spreadsheet layouts are supported. [`detect_layout`] picks one,
//! [`normalizer_for`] returns the matching [`RowNormalizer`], and
//! [`daily::retain_complete_days`] drops every day that is not fully covered.

pub mod daily;
pub mod tall;
pub mod wide;

use std::fmt;

use power_client::domain::Reading;
use time::UtcOffset;

use crate::error::ValidationError;

pub use daily::{retain_complete_days, DailyOutcome};
pub use tall::TallLayout;
pub use wide::WideLayout;

/// Quarter-hour samples in one complete day.
pub const SAMPLES_PER_DAY: usize = 96;

/// First-cell labels that mark a wide (one row per day) sheet.
const WIDE_SENTINELS: [&str; 2] = ["数据日期", "data date"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// One row per day with 96 sample columns.
    Wide,
    /// One row per sample with a timestamp and a power column.
    Tall,
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wide => f.write_str("wide"),
            Self::Tall => f.write_str("tall"),
        }
    }
}

/// Classify a sheet by its first cell. Anything unrecognised is treated as
/// tall; the tall normalizer rejects files without the columns it needs.
pub fn detect_layout(rows: &[Vec<String>]) -> Layout {
    match rows.first().and_then(|row| row.first()) {
        Some(cell) if WIDE_SENTINELS.contains(&cell.trim()) => Layout::Wide,
        _ => Layout::Tall,
    }
}

/// Per-file values the normalizers need besides the rows themselves.
#[derive(Debug, Clone)]
pub struct NormalizeContext {
    pub company: String,
    pub offset: UtcOffset,
    pub assumed_year: i32,
}

/// Candidate readings produced from one file, not yet checked for daily
/// completeness.
#[derive(Debug, Default)]
pub struct Normalized {
    pub candidates: Vec<Reading>,
    pub rows_skipped: usize,
}

/// Why a single row was left out.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RowError {
    #[error("row has only {0} cells")]
    TooShort(usize),
    #[error("day row has {0} samples, expected 96")]
    WrongSampleCount(usize),
    #[error("empty or zero sample in column {0}")]
    MissingSample(usize),
    #[error("invalid power value '{value}' in column {column}")]
    InvalidPower { column: usize, value: String },
    #[error("blank or zero power")]
    NoPower,
    #[error("invalid date or time '{0}'")]
    InvalidTimestamp(String),
    #[error("timestamp '{0}' is not on the 15-minute grid")]
    OffGrid(String),
}

pub trait RowNormalizer: Send + Sync {
    fn layout(&self) -> Layout;

    /// Convert every usable row. Bad rows are skipped and counted; only a
    /// structural problem with the whole file is an error.
    fn normalize(&self, rows: &[Vec<String>], ctx: &NormalizeContext) -> Result<Normalized, ValidationError>;
}

pub fn normalizer_for(layout: Layout) -> Box<dyn RowNormalizer> {
    match layout {
        Layout::Wide => Box::new(WideLayout),
        Layout::Tall => Box::new(TallLayout),
    }
}

fn record_skipped_row(layout: Layout, row: usize, err: &RowError) {
    tracing::debug!(%layout, row = row + 1, error = %err, "skipping spreadsheet row");
    metrics::counter!("ingest_rows_skipped_total", "layout" => layout.to_string()).increment(1);
}

/// Parse a power cell. Non-finite values are rejected along with text.
fn parse_power(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
