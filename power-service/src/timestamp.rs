//! Textual timestamp handling. Every timestamp crossing the service boundary
//! is `YYYY-MM-DD HH:MM:SS` interpreted in one configured UTC offset.

use time::{
    format_description::BorrowedFormatItem, macros::format_description, Date, OffsetDateTime,
    PrimitiveDateTime, UtcOffset,
};

use crate::error::ValidationError;

pub const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

pub const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Parse a local `YYYY-MM-DD HH:MM:SS` string, attaching `offset`.
pub fn parse_local(text: &str, offset: UtcOffset) -> Option<OffsetDateTime> {
    PrimitiveDateTime::parse(text.trim(), TIMESTAMP_FORMAT)
        .ok()
        .map(|dt| dt.assume_offset(offset))
}

/// Like [`parse_local`] but for caller-supplied values, where a bad string is
/// a validation failure.
pub fn parse_request(text: &str, offset: UtcOffset) -> Result<OffsetDateTime, ValidationError> {
    parse_local(text, offset).ok_or_else(|| ValidationError::InvalidTimestamp(text.to_string()))
}

/// Parse a calendar date, accepting either `YYYY-MM-DD` or a full timestamp at
/// midnight (spreadsheet date cells come back that way).
pub fn parse_day(text: &str) -> Option<Date> {
    let text = text.trim();
    if let Ok(day) = Date::parse(text, DATE_FORMAT) {
        return Some(day);
    }
    PrimitiveDateTime::parse(text, TIMESTAMP_FORMAT)
        .ok()
        .filter(|dt| dt.time() == time::Time::MIDNIGHT)
        .map(|dt| dt.date())
}

pub fn format_local(ts: OffsetDateTime, offset: UtcOffset) -> String {
    let local = ts.to_offset(offset);
    local
        .format(TIMESTAMP_FORMAT)
        .unwrap_or_else(|_| local.to_string())
}
