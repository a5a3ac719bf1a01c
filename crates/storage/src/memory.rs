//! In-process statistics store.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;
use zonal_stats::{QaRecord, RecordKey, StatsSink, StatsTable, ZonalStatRecord};

/// Upserting store backed by ordered maps.
///
/// Rows are keyed by (dataset, valid_date, pcode, leadtime); a later
/// write replaces the earlier row, matching the database upsert. The
/// reported count is the number of distinct keys written.
#[derive(Debug, Default)]
pub struct MemoryStatsStore {
    rows: Mutex<BTreeMap<(String, RecordKey), ZonalStatRecord>>,
    qa: Mutex<Vec<QaRecord>>,
}

impl MemoryStatsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored rows of a dataset in key order.
    pub async fn rows(&self, dataset: &str) -> Vec<ZonalStatRecord> {
        self.rows
            .lock()
            .await
            .iter()
            .filter(|((name, _), _)| name == dataset)
            .map(|(_, record)| record.clone())
            .collect()
    }

    /// Total number of stored rows across datasets.
    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }

    pub async fn qa_records(&self) -> Vec<QaRecord> {
        self.qa.lock().await.clone()
    }
}

#[async_trait]
impl StatsSink for MemoryStatsStore {
    async fn upsert(&self, dataset: &str, table: &StatsTable) -> zonal_stats::Result<usize> {
        let mut rows = self.rows.lock().await;
        let mut written = BTreeSet::new();
        for record in table.iter() {
            let key = record.key();
            written.insert(key.clone());
            rows.insert((dataset.to_string(), key), record.clone());
        }
        debug!(dataset = %dataset, rows = written.len(), total = rows.len(), "Upserted rows in memory");
        Ok(written.len())
    }

    async fn record_qa(&self, record: QaRecord) -> zonal_stats::Result<()> {
        self.qa.lock().await.push(record);
        Ok(())
    }
}
