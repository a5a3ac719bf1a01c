//! Output rows of a batch run.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::stats::ZoneStats;

/// Issue information carried by forecast rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastInfo {
    pub issued_date: NaiveDate,
    /// Months between issue and valid date.
    pub leadtime: u32,
}

/// Natural key of a row, unique within one dataset.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub valid_date: NaiveDate,
    pub pcode: String,
    pub leadtime: Option<u32>,
}

/// Statistics of one admin unit for one (valid date, leadtime).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZonalStatRecord {
    pub iso3: String,
    pub adm_level: u8,
    pub pcode: String,
    pub valid_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast: Option<ForecastInfo>,
    #[serde(flatten)]
    pub stats: ZoneStats,
}

impl ZonalStatRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey {
            valid_date: self.valid_date,
            pcode: self.pcode.clone(),
            leadtime: self.leadtime(),
        }
    }

    pub fn leadtime(&self) -> Option<u32> {
        self.forecast.map(|f| f.leadtime)
    }

    pub fn issued_date(&self) -> Option<NaiveDate> {
        self.forecast.map(|f| f.issued_date)
    }

    pub fn is_forecast(&self) -> bool {
        self.forecast.is_some()
    }
}

/// Rows produced by one run, in (date, leadtime, label) order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsTable {
    records: Vec<ZonalStatRecord>,
}

impl StatsTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: ZonalStatRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[ZonalStatRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &ZonalStatRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// True when any row carries forecast information.
    pub fn is_forecast(&self) -> bool {
        self.records.iter().any(ZonalStatRecord::is_forecast)
    }

    /// Rows matching a pcode, in table order.
    pub fn for_pcode<'a>(&'a self, pcode: &'a str) -> impl Iterator<Item = &'a ZonalStatRecord> {
        self.records.iter().filter(move |r| r.pcode == pcode)
    }
}

impl FromIterator<ZonalStatRecord> for StatsTable {
    fn from_iter<I: IntoIterator<Item = ZonalStatRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for StatsTable {
    type Item = ZonalStatRecord;
    type IntoIter = std::vec::IntoIter<ZonalStatRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}
