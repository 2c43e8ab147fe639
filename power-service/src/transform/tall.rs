use power_client::domain::Reading;
use time::OffsetDateTime;

use super::{
    parse_power, record_skipped_row, Layout, NormalizeContext, Normalized, RowError, RowNormalizer,
};
use crate::{error::ValidationError, timestamp};

const DATE_HEADERS: [&str; 4] = ["日期", "数据时间", "date", "data time"];
const POWER_HEADERS: [&str; 9] = [
    "瞬时有功",
    "功率有功",
    "E",
    "总",
    "总有功功率",
    "instantaneous active",
    "active power",
    "total",
    "total active power",
];

/// One header row, then one row per sample with a timestamp column and a
/// power column somewhere in it.
#[derive(Debug, Clone, Copy, Default)]
pub struct TallLayout;

impl RowNormalizer for TallLayout {
    fn layout(&self) -> Layout {
        Layout::Tall
    }

    fn normalize(&self, rows: &[Vec<String>], ctx: &NormalizeContext) -> Result<Normalized, ValidationError> {
        let header = rows.first().map(Vec::as_slice).unwrap_or_default();
        let (date_col, power_col) = locate_columns(header)?;
        let min_len = date_col.max(power_col) + 1;

        let mut out = Normalized::default();
        for (idx, row) in rows.iter().enumerate().skip(1) {
            if row.len() < min_len {
                record_skipped_row(Layout::Tall, idx, &RowError::TooShort(row.len()));
                out.rows_skipped += 1;
                continue;
            }

            match sample_reading(&row[date_col], &row[power_col], ctx) {
                Ok(reading) => out.candidates.push(reading),
                Err(e) => {
                    record_skipped_row(Layout::Tall, idx, &e);
                    out.rows_skipped += 1;
                }
            }
        }

        Ok(out)
    }
}

/// Find the timestamp and power columns. When several headers match, the
/// rightmost one wins.
fn locate_columns(header: &[String]) -> Result<(usize, usize), ValidationError> {
    let is_one_of = |candidates: &[&str], cell: &str| {
        let cell = cell.trim();
        candidates.iter().any(|c| c.eq_ignore_ascii_case(cell))
    };

    let date_col = header.iter().rposition(|cell| is_one_of(&DATE_HEADERS, cell));
    let power_col = header.iter().rposition(|cell| is_one_of(&POWER_HEADERS, cell));

    match (date_col, power_col) {
        (Some(d), Some(p)) => Ok((d, p)),
        (None, _) => Err(ValidationError::MissingColumn("date")),
        (_, None) => Err(ValidationError::MissingColumn("power")),
    }
}

fn sample_reading(ts_cell: &str, power_cell: &str, ctx: &NormalizeContext) -> Result<Reading, RowError> {
    let power_text = power_cell.trim();
    if power_text.is_empty() || power_text == "0" {
        return Err(RowError::NoPower);
    }
    let power = match parse_power(power_text) {
        Some(p) if p != 0.0 => p,
        _ => return Err(RowError::NoPower),
    };

    let ts = parse_sample_time(ts_cell, ctx).ok_or_else(|| RowError::InvalidTimestamp(ts_cell.to_string()))?;
    let reading = Reading::new(ts, ctx.company.as_str(), power);
    if !reading.is_on_quarter_hour() {
        return Err(RowError::OffGrid(ts_cell.trim().to_string()));
    }
    Ok(reading)
}

/// Accepts `YYYY-MM-DD HH:MM:SS`, or `MM-DD HH:MM` completed with the
/// assumed year and zero seconds.
fn parse_sample_time(text: &str, ctx: &NormalizeContext) -> Option<OffsetDateTime> {
    let text = text.trim();
    timestamp::parse_local(text, ctx.offset).or_else(|| {
        let completed = format!("{:04}-{text}:00", ctx.assumed_year);
        timestamp::parse_local(&completed, ctx.offset)
    })
}
