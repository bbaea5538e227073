// src/specs/mod.rs
//! # Scraping "specs"
//!
//! Page-specific knowledge of where the ground truth lives in the portal's
//! HTML and how to read it robustly.
//!
//! ## What lives here
//! - **Pure HTML parsing**: a fetched document + the date it was fetched for
//!   go in, normalised records come out. No network, no store.
//! - **Tolerant extraction** on top of `core::html` (case-insensitive tag
//!   blocks, tag stripping, whitespace/entity normalisation). One bad row is
//!   skipped and logged; only an unrecognisable page is an error.
//!
//! ## What does **not** live here
//! - Fetching and retry (`scrape`), persistence and merging (`store`).
//!
//! ## Typical call chain
//! ```text
//! runner → scrape::Orchestrator → DocumentSource::fetch(date)
//!                                ↘ specs::sales::extract(doc, date)
//!                                ↘ store::SalesStore::write_batch(date, records)
//! ```
//!
//! Specs are testable offline against captured pages.
pub mod sales;
