use power_client::domain::Reading;
use time::{Date, Time};

use super::{
    parse_power, record_skipped_row, Layout, NormalizeContext, Normalized, RowError, RowNormalizer, SAMPLES_PER_DAY,
};
use crate::{error::ValidationError, timestamp};

/// Title and column-header rows above the data.
const HEADER_ROWS: usize = 2;
/// Cell 0 is the date, cell 1 the quantity, cell 2 unused; samples follow.
const FIRST_SAMPLE_COLUMN: usize = 3;
const ACTIVE_POWER_LABELS: [&str; 2] = ["有功功率", "active power"];

/// One row per calendar day, one column per quarter hour from 00:00.
///
/// Only active-power rows are read. A row contributes all of its
/// [`SAMPLES_PER_DAY`] samples or none of them.
#[derive(Debug, Clone, Copy, Default)]
pub struct WideLayout;

impl RowNormalizer for WideLayout {
    fn layout(&self) -> Layout {
        Layout::Wide
    }

    fn normalize(&self, rows: &[Vec<String>], ctx: &NormalizeContext) -> Result<Normalized, ValidationError> {
        let mut out = Normalized::default();

        for (idx, row) in rows.iter().enumerate().skip(HEADER_ROWS) {
            let row = trim_trailing_empty(row);
            if row.is_empty() {
                continue;
            }
            if row.len() < FIRST_SAMPLE_COLUMN {
                record_skipped_row(Layout::Wide, idx, &RowError::TooShort(row.len()));
                out.rows_skipped += 1;
                continue;
            }
            if !ACTIVE_POWER_LABELS.contains(&row[1].trim()) {
                continue;
            }

            match day_row_readings(row, ctx) {
                Ok(readings) => out.candidates.extend(readings),
                Err(e) => {
                    record_skipped_row(Layout::Wide, idx, &e);
                    out.rows_skipped += 1;
                }
            }
        }

        Ok(out)
    }
}

fn trim_trailing_empty(row: &[String]) -> &[String] {
    let len = row
        .iter()
        .rposition(|cell| !cell.trim().is_empty())
        .map_or(0, |last| last + 1);
    &row[..len]
}

fn day_row_readings(row: &[String], ctx: &NormalizeContext) -> Result<Vec<Reading>, RowError> {
    let day = timestamp::parse_day(&row[0]).ok_or_else(|| RowError::InvalidTimestamp(row[0].clone()))?;
    let samples = &row[FIRST_SAMPLE_COLUMN..];
    if samples.len() != SAMPLES_PER_DAY {
        return Err(RowError::WrongSampleCount(samples.len()));
    }

    samples
        .iter()
        .enumerate()
        .map(|(slot, cell)| {
            let column = FIRST_SAMPLE_COLUMN + slot;
            let text = cell.trim();
            if text.is_empty() || text == "0" {
                return Err(RowError::MissingSample(column));
            }
            let power = parse_power(text).ok_or_else(|| RowError::InvalidPower {
                column,
                value: text.to_string(),
            })?;
            let ts = slot_time(day, slot)?.assume_offset(ctx.offset);
            Ok(Reading::new(ts, ctx.company.as_str(), power))
        })
        .collect()
}

/// Sample `slot` starts at `slot / 4` hours and `(slot % 4) * 15` minutes.
fn slot_time(day: Date, slot: usize) -> Result<time::PrimitiveDateTime, RowError> {
    let hour = u8::try_from(slot / 4).unwrap_or(u8::MAX);
    let minute = ((slot % 4) * 15) as u8;
    Time::from_hms(hour, minute, 0)
        .map(|t| day.with_time(t))
        .map_err(|_| RowError::InvalidTimestamp(format!("{day} {hour:02}:{minute:02}:00")))
}
