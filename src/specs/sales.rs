// src/specs/sales.rs
//! Daily sales query result page → `SalesRecord`s.
//!
//! Layout (summary mode, grouped by POS): `<table id="dgProd">` whose data rows
//! carry exactly six cells:
//!
//! ```text
//! vendor | store code | barcode | product name | sales qty | stock qty
//! ```
//!
//! The first six-cell row is the header. Pager rows and decoration rows have a
//! different cell count and are ignored.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::core::html::{element_by_id, row_cells, tag_blocks_ci, to_lower};
use crate::core::sanitize::{clean_identifier, parse_amount};
use crate::error::ExtractionError;
use crate::model::SalesRecord;

pub const TABLE_ID: &str = "dgProd";
pub const COLUMNS: [&str; 6] = ["廠商名稱", "店內碼", "國際條碼", "商品名稱", "銷售量", "庫存量"];

const COL_STORE_CODE: usize = 1;
const COL_BARCODE: usize = 2;
const COL_QTY: usize = 4;

/// Markers proving we are looking at the query form, just without results.
const QUERY_FORM_MARKERS: [&str; 2] = ["ecrdate1", "btnsearch"];

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRow {
    /// 0-based index among the table's `<tr>` blocks.
    pub row: usize,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Extraction {
    pub records: Vec<SalesRecord>,
    pub skipped: Vec<SkippedRow>,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub fn extract(doc: &str, date: NaiveDate) -> Result<Extraction, ExtractionError> {
    let Some(table) = element_by_id(doc, "table", TABLE_ID) else {
        let lc = to_lower(doc);
        if QUERY_FORM_MARKERS.iter().any(|m| lc.contains(m)) {
            debug!(%date, "query page has no result table: no data for this date");
            return Ok(Extraction::default());
        }
        return Err(ExtractionError::UnrecognizedLayout {
            date,
            detail: format!("neither table#{TABLE_ID} nor the query form is present"),
        });
    };

    // Summed per identifier: one key per (date, identifier) leaves this function.
    let mut by_id: BTreeMap<String, f64> = BTreeMap::new();
    let mut skipped = Vec::new();
    let mut six_cell_rows = 0usize;
    let mut other_rows = 0usize;

    for (i, tr) in tag_blocks_ci(table, "<tr", "</tr>").into_iter().enumerate() {
        let cells = row_cells(tr);
        if cells.len() != COLUMNS.len() {
            if !cells.is_empty() {
                other_rows += 1;
            }
            continue;
        }
        six_cell_rows += 1;

        if is_header(&cells) {
            continue;
        }

        let id = match (clean_identifier(&cells[COL_BARCODE]), clean_identifier(&cells[COL_STORE_CODE])) {
            (barcode, _) if !barcode.is_empty() => barcode,
            (_, code) if !code.is_empty() => code,
            _ => {
                warn!(%date, row = i, "sales row without barcode or store code; skipped");
                skipped.push(SkippedRow { row: i, reason: s!("missing identifier") });
                continue;
            }
        };

        let raw_qty = &cells[COL_QTY];
        let Some(qty) = parse_amount(raw_qty) else {
            warn!(%date, row = i, identifier = %id, cell = %raw_qty, "unparseable quantity; skipped");
            skipped.push(SkippedRow { row: i, reason: format!("bad quantity {raw_qty:?}") });
            continue;
        };

        *by_id.entry(id).or_insert(0.0) += qty;
    }

    if six_cell_rows == 0 && other_rows > 0 {
        return Err(ExtractionError::UnrecognizedLayout {
            date,
            detail: format!("table#{TABLE_ID} has {other_rows} row(s), none with {} cells", COLUMNS.len()),
        });
    }

    let records = by_id
        .into_iter()
        .map(|(id, qty)| SalesRecord::new(date, id, qty))
        .collect();
    Ok(Extraction { records, skipped })
}

fn is_header(cells: &[String]) -> bool {
    cells[COL_QTY] == COLUMNS[COL_QTY] || cells[COL_BARCODE] == COLUMNS[COL_BARCODE]
}
