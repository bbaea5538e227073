// src/scrape/orchestrator.rs
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{Days, NaiveDate};
use tracing::{error, info, info_span, warn};

use super::retry::{retry, Exhausted};
use super::source::DocumentSource;
use crate::config::{Config, RetryPolicy, ScrapeOptions};
use crate::error::{ConfigurationError, StoreReadError, StoreWriteError};
use crate::model::{RunStatus, ScrapeMode, ScrapeRun};
use crate::orders::OrderSink;
use crate::progress::Progress;
use crate::specs::sales;
use crate::store::{MergeStats, SalesStore};

/// Dates to scrape and whether already-stored dates are scraped again.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScrapePlan {
    pub run: ScrapeRun,
    pub overwrite: bool,
}

impl ScrapePlan {
    /// Daily: yesterday only, always overwritten. Backfill: start through today.
    pub fn new(opts: &ScrapeOptions, today: NaiveDate) -> Result<Self, ConfigurationError> {
        match opts.mode {
            ScrapeMode::Daily => {
                let yesterday = today
                    .checked_sub_days(Days::new(1))
                    .ok_or_else(|| invalid_today(today))?;
                Ok(Self { run: ScrapeRun::new(ScrapeMode::Daily, yesterday, yesterday), overwrite: true })
            }
            ScrapeMode::Backfill => {
                let start = opts.backfill_start.ok_or(ConfigurationError::Missing("BACKFILL_START_DATE"))?;
                if start > today {
                    return Err(ConfigurationError::Invalid {
                        key: "BACKFILL_START_DATE",
                        value: start.to_string(),
                        reason: format!("after today ({today})"),
                    });
                }
                Ok(Self { run: ScrapeRun::new(ScrapeMode::Backfill, start, today), overwrite: opts.overwrite })
            }
        }
    }
}

fn invalid_today(today: NaiveDate) -> ConfigurationError {
    ConfigurationError::Invalid { key: "today", value: today.to_string(), reason: s!("no previous day") }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Extract,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Fetch => "fetch",
            Stage::Extract => "extract",
            Stage::Write => "write",
        })
    }
}

/// What happened to one target date.
#[derive(Clone, Debug, PartialEq)]
pub enum DateOutcome {
    Written {
        records: usize,
        stats: MergeStats,
        skipped_rows: usize,
        /// `None` when no order feed is configured.
        orders: Option<Result<usize, String>>,
    },
    /// Already stored and the plan does not overwrite.
    AlreadyPresent,
    /// The portal had no sales for this date. Nothing was written.
    NoData,
    Failed { stage: Stage, attempts: u32, error: String },
}

impl DateOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, DateOutcome::Failed { .. })
    }

    fn describe(&self) -> String {
        match self {
            DateOutcome::Written { records, stats, .. } => format!(
                "{records} record(s): {} inserted, {} updated, {} unchanged",
                stats.inserted, stats.updated, stats.unchanged
            ),
            DateOutcome::AlreadyPresent => s!("already stored; skipped"),
            DateOutcome::NoData => s!("no data"),
            DateOutcome::Failed { stage, attempts, error } => {
                format!("{stage} failed after {attempts} attempt(s): {error}")
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct RunSummary {
    pub run: ScrapeRun,
    pub outcomes: Vec<(NaiveDate, DateOutcome)>,
    /// Set when a structural error stopped the run early.
    pub abort_reason: Option<String>,
    /// Quantity per identifier across all written dates.
    pub totals: BTreeMap<String, f64>,
}

impl RunSummary {
    fn new(run: ScrapeRun) -> Self {
        Self { run, outcomes: Vec::new(), abort_reason: None, totals: BTreeMap::new() }
    }

    pub fn failed_dates(&self) -> Vec<NaiveDate> {
        self.outcomes.iter().filter(|(_, o)| o.is_failed()).map(|(d, _)| *d).collect()
    }

    pub fn written_dates(&self) -> Vec<NaiveDate> {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, DateOutcome::Written { .. }))
            .map(|(d, _)| *d)
            .collect()
    }

    pub fn records_written(&self) -> usize {
        self.outcomes
            .iter()
            .map(|(_, o)| match o {
                DateOutcome::Written { records, .. } => *records,
                _ => 0,
            })
            .sum()
    }

    pub fn outcome(&self, date: NaiveDate) -> Option<&DateOutcome> {
        self.outcomes.iter().find(|(d, _)| *d == date).map(|(_, o)| o)
    }

    pub fn is_success(&self) -> bool {
        self.run.status == RunStatus::Succeeded
    }

    /// Process exit code: 0 only if every date succeeded.
    pub fn exit_code(&self) -> u8 {
        if self.is_success() { 0 } else { 1 }
    }

    /// Identifiers with the largest total quantity, largest first.
    pub fn top_identifiers(&self, n: usize) -> Vec<(&str, f64)> {
        let mut v: Vec<(&str, f64)> = self.totals.iter().map(|(k, q)| (k.as_str(), *q)).collect();
        v.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        v.truncate(n);
        v
    }

    fn finish(&mut self) {
        self.run.status = if self.abort_reason.is_some() {
            RunStatus::Aborted
        } else if self.outcomes.iter().any(|(_, o)| o.is_failed()) {
            RunStatus::PartiallyFailed
        } else {
            RunStatus::Succeeded
        };
    }
}

/// Drives fetch → extract → write for every date of a plan, oldest first.
///
/// Per-date failures are recorded and the run continues. An unrecognized page
/// layout or a rejected login stops the run: every later date would fail the
/// same way.
pub struct Orchestrator<'a> {
    source: &'a mut dyn DocumentSource,
    store: &'a mut dyn SalesStore,
    fetch_retry: RetryPolicy,
    write_retry: RetryPolicy,
    orders: Option<&'a dyn OrderSink>,
}

impl<'a> Orchestrator<'a> {
    /// Fetch retries follow `cfg.retry`; store writes get `cfg.store_write_attempts`
    /// tries on the same backoff schedule.
    pub fn new(source: &'a mut dyn DocumentSource, store: &'a mut dyn SalesStore, cfg: &Config) -> Self {
        let fetch_retry = cfg.retry.clone();
        let write_retry = RetryPolicy { max_attempts: cfg.store_write_attempts.max(1), ..fetch_retry.clone() };
        Self { source, store, fetch_retry, write_retry, orders: None }
    }

    pub fn with_orders(mut self, sink: &'a dyn OrderSink) -> Self {
        self.orders = Some(sink);
        self
    }

    /// Errors only if the store cannot be read before the first date.
    pub fn run(
        &mut self,
        plan: &ScrapePlan,
        mut progress: Option<&mut dyn Progress>,
    ) -> Result<RunSummary, StoreReadError> {
        let span = info_span!("scrape", mode = %plan.run.mode, source = self.source.name());
        let _enter = span.enter();

        let present: BTreeSet<NaiveDate> = if plan.overwrite { BTreeSet::new() } else { self.store.dates_present()? };
        let dates = plan.run.dates();
        info!(start = %plan.run.start_date, end = %plan.run.end_date, dates = dates.len(), overwrite = plan.overwrite, "scrape started");

        let already = dates.iter().filter(|d| present.contains(d)).count();
        if let Some(p) = progress.as_deref_mut() {
            p.begin(dates.len());
            if already > 0 {
                p.log(&format!("{already} date(s) already stored; skipping them"));
            }
        }

        let mut summary = RunSummary::new(plan.run.clone());
        for date in dates {
            let outcome = if present.contains(&date) {
                DateOutcome::AlreadyPresent
            } else {
                match self.process_date(date, &mut summary.totals) {
                    Ok(o) => o,
                    Err(abort) => {
                        error!(%date, reason = %abort.reason, "aborting run");
                        if let Some(p) = progress.as_deref_mut() {
                            p.date_failed(date, &abort.reason);
                            p.log(&format!("run aborted at {date}: {}", abort.reason));
                        }
                        summary.outcomes.push((date, abort.outcome));
                        summary.abort_reason = Some(abort.reason);
                        break;
                    }
                }
            };

            let line = outcome.describe();
            if outcome.is_failed() {
                warn!(%date, "{line}");
            } else {
                info!(%date, "{line}");
            }
            if let Some(p) = progress.as_deref_mut() {
                if outcome.is_failed() {
                    p.date_failed(date, &line);
                } else {
                    p.date_done(date, &line);
                }
            }
            summary.outcomes.push((date, outcome));
        }

        summary.finish();
        info!(
            status = ?summary.run.status,
            written = summary.records_written(),
            failed = summary.failed_dates().len(),
            "scrape finished"
        );
        if let Some(p) = progress.as_deref_mut() {
            p.finish();
        }
        Ok(summary)
    }

    fn process_date(&mut self, date: NaiveDate, totals: &mut BTreeMap<String, f64>) -> Result<DateOutcome, Abort> {
        let source = &mut *self.source;
        let doc = match retry(&self.fetch_retry, "fetch", |e: &crate::error::FetchError| e.is_transient(), |_| {
            source.fetch(date)
        }) {
            Ok(doc) => doc,
            Err(Exhausted { error, attempts }) => {
                let outcome = DateOutcome::Failed { stage: Stage::Fetch, attempts, error: error.to_string() };
                if error.is_fatal() {
                    return Err(Abort { reason: error.to_string(), outcome });
                }
                return Ok(outcome);
            }
        };

        let extraction = sales::extract(&doc, date).map_err(|e| Abort {
            reason: e.to_string(),
            outcome: DateOutcome::Failed { stage: Stage::Extract, attempts: 1, error: e.to_string() },
        })?;
        if extraction.is_empty() {
            return Ok(DateOutcome::NoData);
        }

        let store = &mut *self.store;
        let records = &extraction.records;
        let stats = match retry(
            &self.write_retry,
            "store write",
            |e: &StoreWriteError| !matches!(e, StoreWriteError::Rejected { .. }),
            |_| store.write_batch(date, records),
        ) {
            Ok(stats) => stats,
            Err(Exhausted { error, attempts }) => {
                return Ok(DateOutcome::Failed { stage: Stage::Write, attempts, error: error.to_string() });
            }
        };

        for r in records {
            *totals.entry(r.identifier.clone()).or_insert(0.0) += r.quantity;
        }

        let orders = self.orders.map(|sink| match sink.post_day(date, records) {
            Ok(n) => Ok(n),
            Err(e) => {
                warn!(%date, error = %e, "order feed push failed");
                Err(e.to_string())
            }
        });

        Ok(DateOutcome::Written { records: records.len(), stats, skipped_rows: extraction.skipped.len(), orders })
    }
}

struct Abort {
    reason: String,
    outcome: DateOutcome,
}
