// src/store/csv_store.rs
//! Spreadsheet-shaped store kept as one CSV file:
//! `date,identifier,quantity,revenue`, one row per (date, identifier).
//!
//! Writes go to a sibling temp file which is then renamed over the original,
//! so a failed write never leaves a half-written sheet behind.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::debug;

use super::{check_batch, Dataset, MergeStats, SalesStore};
use crate::config::consts::STORE_HEADERS;
use crate::csv::{parse_rows, rows_to_string};
use crate::error::{StoreReadError, StoreWriteError};
use crate::model::SalesRecord;

#[derive(Clone, Debug)]
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_dataset(&self) -> Result<Dataset, StoreReadError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Dataset::new()),
            Err(e) => return Err(self.read_err(e)),
        };

        let mut rows = parse_rows(&text).into_iter().enumerate().peekable();
        if let Some((_, first)) = rows.peek() {
            if first.first().map(|c| c.eq_ignore_ascii_case(STORE_HEADERS[0])).unwrap_or(false) {
                rows.next();
            }
        }

        let mut records = Vec::new();
        for (i, row) in rows {
            records.push(parse_record(&row).map_err(|reason| StoreReadError::Malformed { line: i + 1, reason })?);
        }
        Ok(Dataset::from_records(records))
    }

    fn write_dataset(&self, ds: &Dataset) -> Result<(), StoreWriteError> {
        let rows: Vec<Vec<String>> = ds.records().map(format_record).collect();
        let contents = rows_to_string(&STORE_HEADERS, &rows);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.write_err(e))?;
            }
        }
        let tmp = self.tmp_path();
        fs::write(&tmp, contents).map_err(|e| self.write_err(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            self.write_err(e)
        })
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "sales.csv".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn read_err(&self, source: io::Error) -> StoreReadError {
        StoreReadError::Io { path: self.path.display().to_string(), source }
    }

    fn write_err(&self, source: io::Error) -> StoreWriteError {
        StoreWriteError::Io { path: self.path.display().to_string(), source }
    }
}

impl SalesStore for CsvStore {
    fn load(&self) -> Result<Vec<SalesRecord>, StoreReadError> {
        Ok(self.read_dataset()?.to_vec())
    }

    fn write_batch(&mut self, date: NaiveDate, records: &[SalesRecord]) -> Result<MergeStats, StoreWriteError> {
        check_batch(date, records)?;
        let mut ds = self.read_dataset()?;
        let stats = ds.merge(records);
        if stats.written() == 0 {
            debug!(%date, "batch identical to stored rows; nothing to write");
            return Ok(stats);
        }
        self.write_dataset(&ds)?;
        Ok(stats)
    }
}

fn format_record(r: &SalesRecord) -> Vec<String> {
    vec![
        r.date.format("%Y-%m-%d").to_string(),
        r.identifier.clone(),
        fmt_amount(r.quantity),
        r.revenue.map(fmt_amount).unwrap_or_default(),
    ]
}

// Whole numbers print without a trailing ".0" so the sheet stays readable.
fn fmt_amount(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 { format!("{}", v as i64) } else { v.to_string() }
}

fn parse_record(row: &[String]) -> Result<SalesRecord, String> {
    if row.len() < 3 {
        return Err(format!("expected at least 3 columns, found {}", row.len()));
    }
    let date = NaiveDate::parse_from_str(row[0].trim(), "%Y-%m-%d")
        .map_err(|e| format!("bad date {:?}: {e}", row[0]))?;
    let identifier = row[1].trim().to_string();
    if identifier.is_empty() {
        return Err(s!("empty identifier"));
    }
    let quantity: f64 = row[2].trim().parse().map_err(|e| format!("bad quantity {:?}: {e}", row[2]))?;
    let revenue = match row.get(3).map(|s| s.trim()).filter(|s| !s.is_empty()) {
        Some(v) => Some(v.parse::<f64>().map_err(|e| format!("bad revenue {v:?}: {e}"))?),
        None => None,
    };
    Ok(SalesRecord { date, identifier, quantity, revenue })
}
