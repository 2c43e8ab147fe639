//! Persistence port for readings. The ingestion pipeline and the sizing
//! engine only ever see [`ReadingStore`]; which backend sits behind it is a
//! configuration choice.

pub mod memory;
pub mod questdb;

use std::{sync::Arc, time::Duration};

use power_client::domain::Reading;
use sqlx::postgres::PgPoolOptions;
use time::OffsetDateTime;

use crate::config::{AppConfig, StoreKind};

pub use memory::MemoryStore;
pub use questdb::QuestDbStore;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("insert failed: {0}")]
    Insert(String),
    #[error("range query failed: {0}")]
    Query(String),
}

/// Insert/range-query access to stored readings.
///
/// Implementations must tolerate concurrent reads and writes; callers do no
/// locking. Duplicate inserts for the same `(company, ts)` may happen.
#[async_trait::async_trait]
pub trait ReadingStore: Send + Sync {
    async fn persist(&self, reading: &Reading) -> Result<(), StoreError>;

    async fn persist_batch(&self, readings: &[Reading]) -> Result<(), StoreError> {
        for reading in readings {
            self.persist(reading).await?;
        }
        Ok(())
    }

    /// Readings of `company` with `start <= ts <= end`, ascending by `ts`.
    async fn query_range(
        &self,
        start: OffsetDateTime,
        end: OffsetDateTime,
        company: &str,
    ) -> Result<Vec<Reading>, StoreError>;
}

#[async_trait::async_trait]
impl<S> ReadingStore for Arc<S>
where
    S: ReadingStore + ?Sized,
{
    async fn persist(&self, reading: &Reading) -> Result<(), StoreError> {
        (**self).persist(reading).await
    }

    async fn persist_batch(&self, readings: &[Reading]) -> Result<(), StoreError> {
        (**self).persist_batch(readings).await
    }

    async fn query_range(
        &self,
        start: OffsetDateTime,
        end: OffsetDateTime,
        company: &str,
    ) -> Result<Vec<Reading>, StoreError> {
        (**self).query_range(start, end, company).await
    }
}

/// Build the store selected by `store.kind`.
pub async fn connect(cfg: &AppConfig) -> anyhow::Result<Arc<dyn ReadingStore>> {
    match cfg.store.kind {
        StoreKind::Memory => {
            tracing::warn!("using in-memory reading store; data is lost on restart");
            Ok(Arc::new(MemoryStore::default()))
        }
        StoreKind::Questdb => {
            let qdb = cfg
                .questdb
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("store.kind = \"questdb\" requires a [questdb] section"))?;
            let pool = PgPoolOptions::new()
                .max_connections(qdb.max_connections)
                .connect(&qdb.uri)
                .await?;
            Ok(Arc::new(QuestDbStore::new(
                pool,
                qdb.max_retries,
                Duration::from_millis(qdb.retry_backoff_ms),
            )))
        }
    }
}
