use std::collections::BTreeMap;

use power_client::domain::Reading;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use super::{ReadingStore, StoreError};

/// Process-local store keyed by `(company, ts)`.
///
/// A second insert for the same key overwrites the first, which mirrors the
/// dedup-upsert behaviour of the QuestDB table.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: RwLock<BTreeMap<(String, OffsetDateTime), f64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl ReadingStore for MemoryStore {
    async fn persist(&self, reading: &Reading) -> Result<(), StoreError> {
        self.rows
            .write()
            .await
            .insert((reading.company.clone(), reading.ts), reading.power);
        Ok(())
    }

    async fn persist_batch(&self, readings: &[Reading]) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        for r in readings {
            rows.insert((r.company.clone(), r.ts), r.power);
        }
        Ok(())
    }

    async fn query_range(
        &self,
        start: OffsetDateTime,
        end: OffsetDateTime,
        company: &str,
    ) -> Result<Vec<Reading>, StoreError> {
        // BTreeMap::range panics on an inverted range.
        if end < start {
            return Ok(Vec::new());
        }

        let rows = self.rows.read().await;
        let from = (company.to_string(), start);
        let to = (company.to_string(), end);
        Ok(rows
            .range(from..=to)
            .map(|((company, ts), power)| Reading::new(*ts, company.clone(), *power))
            .collect())
    }
}
