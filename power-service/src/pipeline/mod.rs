//! File ingestion: decode, normalize, keep complete days, persist.
//!
//! [`ingest_job`] runs the whole flow for one uploaded file and is what both
//! the background [`worker::IngestQueue`] and the importer binary call.

pub mod worker;

use std::time::SystemTime;

use power_client::domain::Reading;
use time::{macros::offset, UtcOffset};

use crate::{
    error::{ServiceError, ValidationError},
    sources::{read_rows, SheetFormat},
    store::ReadingStore,
    transform::{self, Layout, NormalizeContext},
};

pub use worker::{IngestEvent, IngestQueue};

/// A payload stamped with the moment it entered the service.
#[derive(Debug, Clone)]
pub struct Envelope<T> {
    pub payload: T,
    pub received_at: SystemTime,
}

impl<T> Envelope<T> {
    pub fn new(payload: T) -> Self {
        Self {
            payload,
            received_at: SystemTime::now(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IngestSettings {
    pub offset: UtcOffset,
    pub assumed_year: i32,
    pub batch_size: usize,
    pub workers: usize,
    pub queue_capacity: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            offset: offset!(+8),
            assumed_year: 2024,
            batch_size: 500,
            workers: 2,
            queue_capacity: 16,
        }
    }
}

/// One uploaded file waiting to be ingested.
#[derive(Debug, Clone)]
pub struct IngestJob {
    pub id: u64,
    pub company: String,
    pub file_name: String,
    pub format: SheetFormat,
    pub bytes: Vec<u8>,
}

impl IngestJob {
    /// Checks what can be checked without reading the file: a company is
    /// named and the extension is one we can decode.
    pub fn new(
        id: u64,
        company: impl Into<String>,
        file_name: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<Self, ValidationError> {
        let company = company.into().trim().to_string();
        if company.is_empty() {
            return Err(ValidationError::MissingField("company"));
        }
        let file_name = file_name.into();
        let format = SheetFormat::from_file_name(&file_name)?;

        Ok(Self {
            id,
            company,
            file_name,
            format,
            bytes,
        })
    }
}

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub layout: Layout,
    pub rows_skipped: usize,
    pub candidates: usize,
    pub days_kept: usize,
    pub days_dropped: usize,
    pub persisted: usize,
    pub persist_failures: usize,
}

/// Readings that survived normalization and the completeness check.
#[derive(Debug)]
pub struct Cleaned {
    pub layout: Layout,
    pub readings: Vec<Reading>,
    pub rows_skipped: usize,
    pub candidates: usize,
    pub days_kept: usize,
    pub days_dropped: usize,
}

/// Run layout detection, row normalization and the daily completeness check
/// over raw rows. The returned readings are ascending by timestamp.
pub fn clean_rows(
    rows: &[Vec<String>],
    company: &str,
    settings: &IngestSettings,
) -> Result<Cleaned, ValidationError> {
    let layout = transform::detect_layout(rows);
    let ctx = NormalizeContext {
        company: company.to_string(),
        offset: settings.offset,
        assumed_year: settings.assumed_year,
    };

    let normalized = transform::normalizer_for(layout).normalize(rows, &ctx)?;
    let candidates = normalized.candidates.len();
    let daily = transform::retain_complete_days(normalized.candidates);

    Ok(Cleaned {
        layout,
        readings: daily.readings,
        rows_skipped: normalized.rows_skipped,
        candidates,
        days_kept: daily.days_kept,
        days_dropped: daily.days_dropped,
    })
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PersistOutcome {
    pub persisted: usize,
    pub failures: usize,
}

/// Write readings in chunks of `batch_size`. A failed chunk is retried one
/// reading at a time so a single bad row does not cost the whole chunk;
/// readings that still fail are logged, counted and skipped.
pub async fn persist_readings<S>(store: &S, readings: &[Reading], batch_size: usize) -> PersistOutcome
where
    S: ReadingStore + ?Sized,
{
    let mut outcome = PersistOutcome::default();

    for chunk in readings.chunks(batch_size.max(1)) {
        match store.persist_batch(chunk).await {
            Ok(()) => outcome.persisted += chunk.len(),
            Err(e) => {
                tracing::warn!(error = %e, batch = chunk.len(), "batch persist failed, falling back to single inserts");
                for reading in chunk {
                    match store.persist(reading).await {
                        Ok(()) => outcome.persisted += 1,
                        Err(e) => {
                            tracing::error!(
                                error = %e,
                                company = %reading.company,
                                ts = %reading.ts,
                                "failed to persist reading"
                            );
                            outcome.failures += 1;
                        }
                    }
                }
            }
        }
    }

    metrics::counter!("store_persisted_readings_total").increment(outcome.persisted as u64);
    if outcome.failures > 0 {
        metrics::counter!("store_persist_errors_total").increment(outcome.failures as u64);
    }
    outcome
}

/// Ingest one file end to end.
///
/// Decoding runs on the blocking pool since workbook parsing is CPU bound.
pub async fn ingest_job<S>(store: &S, job: IngestJob, settings: &IngestSettings) -> Result<IngestReport, ServiceError>
where
    S: ReadingStore + ?Sized,
{
    let IngestJob {
        id,
        company,
        file_name,
        format,
        bytes,
    } = job;

    let rows = tokio::task::spawn_blocking(move || read_rows(format, &bytes))
        .await
        .map_err(|e| ServiceError::Spreadsheet(format!("decoder task failed: {e}")))??;

    let cleaned = clean_rows(&rows, &company, settings)?;
    let persisted = persist_readings(store, &cleaned.readings, settings.batch_size).await;

    let report = IngestReport {
        layout: cleaned.layout,
        rows_skipped: cleaned.rows_skipped,
        candidates: cleaned.candidates,
        days_kept: cleaned.days_kept,
        days_dropped: cleaned.days_dropped,
        persisted: persisted.persisted,
        persist_failures: persisted.failures,
    };

    tracing::info!(
        job_id = id,
        company = %company,
        file = %file_name,
        layout = %report.layout,
        rows_skipped = report.rows_skipped,
        days_kept = report.days_kept,
        days_dropped = report.days_dropped,
        persisted = report.persisted,
        persist_failures = report.persist_failures,
        "ingested spreadsheet"
    );

    Ok(report)
}
