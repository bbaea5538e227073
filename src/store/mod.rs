// src/store/mod.rs
//! Persistent sales dataset.
//!
//! The scrape pipeline is the only writer and always goes through
//! [`SalesStore::write_batch`]: one date, one round trip, keyed upsert. The
//! forecast pipeline only calls [`SalesStore::load`].

use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::error::{StoreReadError, StoreWriteError};
use crate::model::SalesRecord;

mod csv_store;
mod merge;
mod memory;

pub use csv_store::CsvStore;
pub use merge::{Dataset, MergeStats};
pub use memory::MemoryStore;

pub trait SalesStore {
    /// Every record currently stored, in (date, identifier) order.
    fn load(&self) -> Result<Vec<SalesRecord>, StoreReadError>;

    /// Dates with at least one stored row.
    fn dates_present(&self) -> Result<BTreeSet<NaiveDate>, StoreReadError> {
        Ok(self.load()?.into_iter().map(|r| r.date).collect())
    }

    /// Upsert all records of one date as a single write. Either the whole
    /// batch becomes visible or none of it does.
    fn write_batch(
        &mut self,
        date: NaiveDate,
        records: &[SalesRecord],
    ) -> Result<MergeStats, StoreWriteError>;
}

/// Reject batches that would break the store's invariants before touching it.
pub(crate) fn check_batch(date: NaiveDate, records: &[SalesRecord]) -> Result<(), StoreWriteError> {
    for r in records {
        if r.date != date {
            return Err(StoreWriteError::Rejected {
                date,
                reason: format!("record for {} in batch for {date}", r.date),
            });
        }
        if r.identifier.is_empty() {
            return Err(StoreWriteError::Rejected { date, reason: s!("empty identifier") });
        }
        let bad_qty = !(r.quantity.is_finite() && r.quantity >= 0.0);
        let bad_rev = r.revenue.is_some_and(|v| !(v.is_finite() && v >= 0.0));
        if bad_qty || bad_rev {
            return Err(StoreWriteError::Rejected {
                date,
                reason: format!("negative or non-finite amount for {}", r.identifier),
            });
        }
    }
    Ok(())
}
