use std::{io::Cursor, path::Path};

use calamine::{Data, Reader, Xlsx};
use time::{macros::date, Duration, Time};

use crate::{
    error::{ServiceError, ValidationError},
    timestamp::TIMESTAMP_FORMAT,
};

/// Upload formats the service can decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Csv,
    Xlsx,
}

impl SheetFormat {
    /// Pick the decoder from the uploaded file's extension.
    pub fn from_file_name(name: &str) -> Result<Self, ValidationError> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("csv") => Ok(Self::Csv),
            Some("xlsx") => Ok(Self::Xlsx),
            _ => Err(ValidationError::UnsupportedFileType(name.to_string())),
        }
    }
}

/// Decode an uploaded spreadsheet into raw string rows.
///
/// Only the first worksheet of a workbook is read. Rows are positioned as in
/// the sheet (row 0 is the sheet's first row, cell 0 its column A) so that
/// the layout rules can address cells by fixed index.
pub fn read_rows(format: SheetFormat, bytes: &[u8]) -> Result<Vec<Vec<String>>, ServiceError> {
    match format {
        SheetFormat::Csv => read_csv_rows(bytes),
        SheetFormat::Xlsx => read_xlsx_rows(bytes),
    }
}

fn read_csv_rows(bytes: &[u8]) -> Result<Vec<Vec<String>>, ServiceError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| ServiceError::Spreadsheet(format!("failed to read CSV record: {e}")))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

fn read_xlsx_rows(bytes: &[u8]) -> Result<Vec<Vec<String>>, ServiceError> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))
        .map_err(|e| ServiceError::Spreadsheet(format!("failed to open workbook: {e}")))?;

    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| ServiceError::Spreadsheet("workbook has no sheets".to_string()))?;

    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| ServiceError::Spreadsheet(format!("failed to read worksheet '{sheet}': {e}")))?;

    // A range starts at its first used cell, not at A1.
    let (first_row, first_col) = range.start().unwrap_or((0, 0));
    let mut rows: Vec<Vec<String>> = vec![Vec::new(); first_row as usize];
    for row in range.rows() {
        let mut cells = vec![String::new(); first_col as usize];
        cells.extend(row.iter().map(cell_text));
        rows.push(cells);
    }
    Ok(rows)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Int(v) => v.to_string(),
        Data::Float(v) => v.to_string(),
        Data::Bool(v) => v.to_string(),
        Data::DateTime(dt) => excel_serial_text(dt.as_f64()).unwrap_or_else(|| dt.as_f64().to_string()),
    }
}

/// Render an Excel serial date (1900 system) as `YYYY-MM-DD HH:MM:SS`.
fn excel_serial_text(serial: f64) -> Option<String> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let seconds = (serial * 86_400.0).round() as i64;
    let dt = date!(1899-12-30)
        .with_time(Time::MIDNIGHT)
        .checked_add(Duration::seconds(seconds))?;
    dt.format(TIMESTAMP_FORMAT).ok()
}
