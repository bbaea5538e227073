// src/runner.rs
//! The two pipelines, wired from an immutable [`Config`].
//!
//! Callers construct the collaborators (document source, store, notifier) so
//! tests can swap in fixtures and in-memory stores.

use std::path::PathBuf;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{InsufficientDataError, PipelineError};
use crate::forecast::{report, ForecastEngine, ForecastResult};
use crate::notify::{self, notify_best_effort, Notifier};
use crate::orders::{HttpOrderFeed, OrderSink};
use crate::progress::Progress;
use crate::scrape::{DocumentSource, FixtureSource, Orchestrator, PortalSource, RunSummary, ScrapePlan};
use crate::store::SalesStore;

/// Fixture directory when configured, the live portal otherwise.
pub fn open_source(cfg: &Config) -> Result<Box<dyn DocumentSource>, PipelineError> {
    match &cfg.fixture_dir {
        Some(dir) => Ok(Box::new(FixtureSource::new(dir))),
        None => Ok(Box::new(PortalSource::new(cfg.portal.clone())?)),
    }
}

/// Order feed when configured. A client that cannot be built disables the feed.
pub fn open_orders(cfg: &Config) -> Option<HttpOrderFeed> {
    let opts = cfg.orders.clone()?;
    match HttpOrderFeed::new(opts) {
        Ok(feed) => Some(feed),
        Err(e) => {
            warn!(error = %e, "order feed disabled");
            None
        }
    }
}

/// Scrape pipeline. Per-date failures land in the summary; `Err` means the
/// run never started (bad configuration, unreadable store).
pub fn run_scrape(
    cfg: &Config,
    today: NaiveDate,
    source: &mut dyn DocumentSource,
    store: &mut dyn SalesStore,
    notifier: &dyn Notifier,
    orders: Option<&dyn OrderSink>,
    progress: Option<&mut dyn Progress>,
) -> Result<RunSummary, PipelineError> {
    cfg.validate_for_scrape(today)?;
    let plan = ScrapePlan::new(&cfg.scrape, today)?;

    let mut orch = Orchestrator::new(source, store, cfg);
    if let Some(sink) = orders {
        orch = orch.with_orders(sink);
    }

    let summary = match orch.run(&plan, progress) {
        Ok(s) => s,
        Err(e) => {
            notify_best_effort(notifier, &notify::scrape_failed(&e));
            return Err(e.into());
        }
    };
    notify_best_effort(notifier, &notify::scrape_summary(&summary));
    Ok(summary)
}

#[derive(Debug)]
pub enum ForecastOutcome {
    Completed { result: ForecastResult, files: Vec<PathBuf> },
    /// Not enough history. Not a failure.
    Skipped(InsufficientDataError),
}

impl ForecastOutcome {
    pub fn result(&self) -> Option<&ForecastResult> {
        match self {
            ForecastOutcome::Completed { result, .. } => Some(result),
            ForecastOutcome::Skipped(_) => None,
        }
    }
}

/// Forecast pipeline: load → features → engine → optional audit files → notify.
pub fn run_forecast(
    cfg: &Config,
    store: &dyn SalesStore,
    notifier: &dyn Notifier,
) -> Result<ForecastOutcome, PipelineError> {
    cfg.validate_for_forecast()?;

    let records = match store.load() {
        Ok(r) => r,
        Err(e) => {
            notify_best_effort(notifier, &notify::forecast_failed(&e));
            return Err(e.into());
        }
    };
    info!(records = records.len(), "history loaded");

    let engine = ForecastEngine::new(cfg.forecast.clone());
    let result = match engine.run(&records) {
        Ok(r) => r,
        Err(e) => {
            info!(available = e.available, required = e.required, "forecast skipped");
            notify_best_effort(notifier, &notify::forecast_skipped(&e));
            return Ok(ForecastOutcome::Skipped(e));
        }
    };

    let files = match &cfg.forecast.output_dir {
        Some(dir) => match report::write_audit(dir, &result) {
            Ok(files) => files,
            Err(e) => {
                notify_best_effort(notifier, &notify::forecast_failed(&e));
                return Err(e.into());
            }
        },
        None => Vec::new(),
    };

    info!(model = %result.metadata.model, points = result.points.len(), files = files.len(), "forecast complete");
    notify_best_effort(notifier, &notify::forecast_completed(&result));
    Ok(ForecastOutcome::Completed { result, files })
}
