// src/store/merge.rs
use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::model::{RecordKey, SalesRecord};

/// What one merge did to the dataset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl MergeStats {
    pub fn written(&self) -> usize {
        self.inserted + self.updated
    }
}

/// In-memory image of the store. At most one record per (date, identifier).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dataset {
    rows: BTreeMap<RecordKey, SalesRecord>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later records win on duplicate keys.
    pub fn from_records<I: IntoIterator<Item = SalesRecord>>(records: I) -> Self {
        let mut ds = Self::new();
        for r in records {
            ds.rows.insert(r.key(), r);
        }
        ds
    }

    /// Keyed upsert: same key → replaced, new key → inserted, everything else
    /// untouched. Applying the same batch twice changes nothing the second time.
    pub fn merge(&mut self, records: &[SalesRecord]) -> MergeStats {
        let mut stats = MergeStats::default();
        for r in records {
            match self.rows.get_mut(&r.key()) {
                Some(existing) if *existing == *r => stats.unchanged += 1,
                Some(existing) => {
                    *existing = r.clone();
                    stats.updated += 1;
                }
                None => {
                    self.rows.insert(r.key(), r.clone());
                    stats.inserted += 1;
                }
            }
        }
        stats
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, date: NaiveDate, identifier: &str) -> Option<&SalesRecord> {
        self.rows.get(&RecordKey { date, identifier: identifier.to_string() })
    }

    pub fn records(&self) -> impl Iterator<Item = &SalesRecord> {
        self.rows.values()
    }

    pub fn to_vec(&self) -> Vec<SalesRecord> {
        self.rows.values().cloned().collect()
    }

    pub fn dates(&self) -> BTreeSet<NaiveDate> {
        self.rows.keys().map(|k| k.date).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(d: u32, id: &str, q: f64) -> SalesRecord {
        SalesRecord::new(ymd!(2024, 3, d), id, q)
    }

    #[test]
    fn merge_inserts_then_updates() {
        let mut ds = Dataset::new();
        let s1 = ds.merge(&[rec(1, "SKU1", 10.0)]);
        assert_eq!(s1, MergeStats { inserted: 1, updated: 0, unchanged: 0 });

        let s2 = ds.merge(&[rec(1, "SKU1", 12.0)]);
        assert_eq!(s2, MergeStats { inserted: 0, updated: 1, unchanged: 0 });
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.get(ymd!(2024, 3, 1), "SKU1").unwrap().quantity, 12.0);
    }

    #[test]
    fn merge_twice_is_a_no_op() {
        let batch = vec![rec(1, "A", 1.0), rec(1, "B", 2.0)];
        let mut ds = Dataset::from_records(vec![rec(2, "A", 5.0)]);
        ds.merge(&batch);
        let once = ds.clone();
        let stats = ds.merge(&batch);
        assert_eq!(ds, once);
        assert_eq!(stats.written(), 0);
        assert_eq!(stats.unchanged, 2);
    }

    #[test]
    fn other_keys_are_untouched() {
        let mut ds = Dataset::from_records(vec![rec(1, "A", 1.0), rec(2, "A", 2.0)]);
        ds.merge(&[rec(2, "A", 9.0)]);
        assert_eq!(ds.get(ymd!(2024, 3, 1), "A").unwrap().quantity, 1.0);
        assert_eq!(ds.get(ymd!(2024, 3, 2), "A").unwrap().quantity, 9.0);
    }
}
