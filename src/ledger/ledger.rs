use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::record::{AgingBucket, RecordInput, SessionRecord};
use crate::errors::LedgerError;

const CURRENT_SCHEMA_VERSION: u8 = 1;

/// Ordered collection of session records. Records are addressed by position;
/// there is no per-record deletion, only a bulk clear.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionLedger {
    pub name: String,
    #[serde(default)]
    pub records: Vec<SessionRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default = "SessionLedger::schema_version_default")]
    pub schema_version: u8,
}

impl SessionLedger {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            records: Vec::new(),
            created_at: now,
            updated_at: now,
            schema_version: CURRENT_SCHEMA_VERSION,
        }
    }

    /// Validates and appends a record, returning its index. A failed add
    /// leaves the collection unchanged.
    pub fn add(&mut self, input: &RecordInput, today: NaiveDate) -> Result<usize, LedgerError> {
        let record = SessionRecord::from_input(input, today)?;
        self.records.push(record);
        self.touch();
        Ok(self.records.len() - 1)
    }

    /// Overwrites the record at `index` with freshly validated fields,
    /// recomputing derived state exactly as `add` does.
    pub fn edit(
        &mut self,
        index: usize,
        input: &RecordInput,
        today: NaiveDate,
    ) -> Result<(), LedgerError> {
        let len = self.records.len();
        if index >= len {
            return Err(LedgerError::IndexOutOfRange { index, len });
        }
        let record = SessionRecord::from_input(input, today)?;
        self.records[index] = record;
        self.touch();
        Ok(())
    }

    /// Empties the collection. Indices of prior records become invalid.
    pub fn clear(&mut self) {
        self.records.clear();
        self.touch();
    }

    /// Sums outstanding balances grouped by aging bucket. Buckets with no
    /// records are omitted.
    pub fn summarize(&self) -> BTreeMap<AgingBucket, f64> {
        let mut totals = BTreeMap::new();
        for record in &self.records {
            *totals.entry(record.aging_bucket).or_insert(0.0) += record.outstanding;
        }
        totals
    }

    /// Recomputes every record's derived fields against a new reference day.
    pub fn refresh(&mut self, today: NaiveDate) {
        for record in &mut self.records {
            record.recompute(today);
        }
    }

    pub fn record(&self, index: usize) -> Option<&SessionRecord> {
        self.records.get(index)
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn schema_version_default() -> u8 {
        CURRENT_SCHEMA_VERSION
    }
}
