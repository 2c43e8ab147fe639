use crate::store::StoreError;

/// Problems with caller input or uploaded file structure. These are reported
/// synchronously to whoever made the request.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("invalid timestamp '{0}', expected YYYY-MM-DD HH:MM:SS")]
    InvalidTimestamp(String),
    #[error("unsupported calculation method: {0}")]
    UnsupportedMethod(String),
    #[error("required {0} column not found in spreadsheet header")]
    MissingColumn(&'static str),
    #[error("{name} must contain exactly two timestamps, got {len}")]
    MalformedPeriod { name: &'static str, len: usize },
    #[error("{name} must be a positive number, got {value}")]
    InvalidCapacity { name: &'static str, value: f64 },
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),
    #[error("missing form field '{0}'")]
    MissingField(&'static str),
    #[error("malformed request: {0}")]
    MalformedRequest(String),
}

#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("spreadsheet error: {0}")]
    Spreadsheet(String),
    #[error("ingest queue is full, retry later")]
    QueueFull,
    #[error("ingest queue is closed")]
    QueueClosed,
}
