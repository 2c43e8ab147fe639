use std::{slice, time::Duration};

use power_client::{db::power_data_queries, domain::Reading};
use sqlx::postgres::PgPool;
use time::OffsetDateTime;

use super::{ReadingStore, StoreError};

/// QuestDB over the PostgreSQL wire protocol.
///
/// Expects the `power_data` table from `sql/schema/01_power_data.sql`.
pub struct QuestDbStore {
    pool: PgPool,
    max_retries: u32,
    retry_backoff: Duration,
}

impl QuestDbStore {
    pub fn new(pool: PgPool, max_retries: u32, retry_backoff: Duration) -> Self {
        Self {
            pool,
            max_retries,
            retry_backoff,
        }
    }
}

#[async_trait::async_trait]
impl ReadingStore for QuestDbStore {
    async fn persist(&self, reading: &Reading) -> Result<(), StoreError> {
        power_data_queries::insert_readings(&self.pool, slice::from_ref(reading))
            .await
            .map_err(|e| StoreError::Insert(e.to_string()))
    }

    async fn persist_batch(&self, readings: &[Reading]) -> Result<(), StoreError> {
        if readings.is_empty() {
            return Ok(());
        }

        let mut attempt: u32 = 0;
        loop {
            match power_data_queries::insert_readings(&self.pool, readings).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    let sleep_for = self.retry_backoff * attempt;
                    tracing::warn!(
                        error = %e,
                        attempt,
                        "questdb batch insert failed, retrying with backoff"
                    );
                    tokio::time::sleep(sleep_for).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, batch = readings.len(), "questdb batch insert failed, giving up");
                    return Err(StoreError::Insert(e.to_string()));
                }
            }
        }
    }

    async fn query_range(
        &self,
        start: OffsetDateTime,
        end: OffsetDateTime,
        company: &str,
    ) -> Result<Vec<Reading>, StoreError> {
        power_data_queries::readings_in_range(&self.pool, company, start, end)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))
    }
}
