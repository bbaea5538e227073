// src/model.rs
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row of the persistent dataset: sales of one identifier on one day.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    pub date: NaiveDate,
    pub identifier: String,
    pub quantity: f64,
    pub revenue: Option<f64>,
}

impl SalesRecord {
    pub fn new(date: NaiveDate, identifier: impl Into<String>, quantity: f64) -> Self {
        Self { date, identifier: identifier.into(), quantity, revenue: None }
    }

    pub fn with_revenue(mut self, revenue: f64) -> Self {
        self.revenue = Some(revenue);
        self
    }

    pub fn key(&self) -> RecordKey {
        RecordKey { date: self.date, identifier: self.identifier.clone() }
    }
}

/// Uniqueness key of the store. Orders by date first so iteration is chronological.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordKey {
    pub date: NaiveDate,
    pub identifier: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeMode {
    /// Yesterday only, always overwritten.
    Daily,
    /// Explicit start date through today.
    Backfill,
}

impl ScrapeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrapeMode::Daily => "daily",
            ScrapeMode::Backfill => "backfill",
        }
    }
}

impl fmt::Display for ScrapeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Succeeded,
    /// Finished every date but some failed after retries.
    PartiallyFailed,
    /// Stopped early on a structural error.
    Aborted,
}

/// One orchestration invocation. Lives only as long as the run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScrapeRun {
    pub mode: ScrapeMode,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: RunStatus,
}

impl ScrapeRun {
    pub fn new(mode: ScrapeMode, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self { mode, start_date, end_date, status: RunStatus::Running }
    }

    /// Dates to process, oldest first, inclusive on both ends.
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.start_date
            .iter_days()
            .take_while(|d| *d <= self.end_date)
            .collect()
    }
}
