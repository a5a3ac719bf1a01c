//! Persistence and QA collaborators.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::record::StatsTable;

/// One failed (iso3, adm_level) unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaRecord {
    /// When the failure was recorded.
    pub date: DateTime<Utc>,
    pub iso3: String,
    /// `None` when the failure happened before any admin level was processed.
    pub adm_level: Option<u8>,
    pub dataset: String,
    pub error: String,
    pub stack_trace: String,
}

impl QaRecord {
    pub fn new(
        dataset: impl Into<String>,
        iso3: impl Into<String>,
        adm_level: Option<u8>,
        error: impl Into<String>,
        stack_trace: impl Into<String>,
    ) -> Self {
        Self {
            date: Utc::now(),
            iso3: iso3.into(),
            adm_level,
            dataset: dataset.into(),
            error: error.into(),
            stack_trace: stack_trace.into(),
        }
    }
}

/// Destination for computed statistics and QA rows.
///
/// Upserts are keyed on (valid_date, pcode, leadtime) within a dataset, so
/// writing the same table twice leaves one row per key holding the values
/// of the last write.
#[async_trait]
pub trait StatsSink: Send + Sync {
    /// Insert or replace every row of `table`, returning the number of rows written.
    async fn upsert(&self, dataset: &str, table: &StatsTable) -> Result<usize>;

    /// Record a failed unit.
    async fn record_qa(&self, record: QaRecord) -> Result<()>;
}
