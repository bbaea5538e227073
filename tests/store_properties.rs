// tests/store_properties.rs
use std::collections::BTreeSet;

use chrono::{Days, NaiveDate};
use proptest::prelude::*;

use sales_scrape::model::SalesRecord;
use sales_scrape::store::{CsvStore, MemoryStore, SalesStore};

fn base() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

/// A day's batch: up to 8 identifiers, each at most once, like the extractor emits.
fn batch() -> impl Strategy<Value = (u64, Vec<SalesRecord>)> {
    (0u64..5, prop::collection::btree_map("[A-D][0-9]", 0u32..500, 0..8)).prop_map(|(offset, items)| {
        let date = base() + Days::new(offset);
        let recs = items.into_iter().map(|(id, q)| SalesRecord::new(date, id, q as f64)).collect();
        (offset, recs)
    })
}

proptest! {
    #[test]
    fn writing_a_batch_twice_changes_nothing_the_second_time((offset, recs) in batch()) {
        let date = base() + Days::new(offset);
        let mut store = MemoryStore::new();
        store.write_batch(date, &recs).unwrap();
        let once = store.load().unwrap();

        let stats = store.write_batch(date, &recs).unwrap();
        prop_assert_eq!(stats.written(), 0);
        prop_assert_eq!(stats.unchanged, recs.len());
        prop_assert_eq!(store.load().unwrap(), once);
    }

    #[test]
    fn keys_stay_unique_across_any_sequence_of_writes(batches in prop::collection::vec(batch(), 1..12)) {
        let mut store = MemoryStore::new();
        for (offset, recs) in &batches {
            store.write_batch(base() + Days::new(*offset), recs).unwrap();
        }
        let all = store.load().unwrap();
        let keys: BTreeSet<_> = all.iter().map(|r| r.key()).collect();
        prop_assert_eq!(keys.len(), all.len());

        // The last write of each key wins.
        for (offset, recs) in &batches {
            let date = base() + Days::new(*offset);
            for r in recs {
                let last = batches
                    .iter()
                    .rev()
                    .filter(|(o, _)| base() + Days::new(*o) == date)
                    .find_map(|(_, rs)| rs.iter().find(|x| x.identifier == r.identifier))
                    .unwrap();
                prop_assert_eq!(store.dataset().get(date, &r.identifier), Some(last));
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn csv_store_matches_memory_store(batches in prop::collection::vec(batch(), 1..6)) {
        let dir = tempfile::tempdir().unwrap();
        let mut csv = CsvStore::new(dir.path().join("sales.csv"));
        let mut mem = MemoryStore::new();
        for (offset, recs) in &batches {
            let date = base() + Days::new(*offset);
            csv.write_batch(date, recs).unwrap();
            mem.write_batch(date, recs).unwrap();
        }
        prop_assert_eq!(csv.load().unwrap(), mem.load().unwrap());
    }
}
