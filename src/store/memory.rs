// src/store/memory.rs
use chrono::NaiveDate;

use super::{check_batch, Dataset, MergeStats, SalesStore};
use crate::error::{StoreReadError, StoreWriteError};
use crate::model::SalesRecord;

/// Process-local store. Counts round trips so callers can assert one write per date.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    data: Dataset,
    writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<SalesRecord>) -> Self {
        Self { data: Dataset::from_records(records), writes: 0 }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.data
    }

    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl SalesStore for MemoryStore {
    fn load(&self) -> Result<Vec<SalesRecord>, StoreReadError> {
        Ok(self.data.to_vec())
    }

    fn write_batch(&mut self, date: NaiveDate, records: &[SalesRecord]) -> Result<MergeStats, StoreWriteError> {
        check_batch(date, records)?;
        self.writes += 1;
        Ok(self.data.merge(records))
    }
}
