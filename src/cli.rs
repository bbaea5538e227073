// src/cli.rs
use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};

use crate::config::options::{parse_date, parse_gap_policy, parse_mode, parse_target};
use crate::config::Config;
use crate::error::{ConfigurationError, PipelineError};
use crate::notify;
use crate::orders::OrderSink;
use crate::progress::{Progress, StderrProgress};
use crate::runner::{self, ForecastOutcome};
use crate::scrape::DateOutcome;
use crate::store::CsvStore;

/// Retail sales scraper and monthly forecaster.
///
/// Settings come from `.env` and the environment; flags override them.
#[derive(Debug, Parser)]
#[command(name = "sales-scrape", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Append logs to this file as well.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Path of the sales store (CSV).
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scrape the portal into the store.
    Scrape(ScrapeArgs),
    /// Forecast the next horizon from the stored history.
    Forecast(ForecastArgs),
}

#[derive(Debug, Args)]
pub struct ScrapeArgs {
    /// daily | backfill
    #[arg(long)]
    pub mode: Option<String>,

    /// First backfill date, YYYY-MM-DD.
    #[arg(long)]
    pub start: Option<String>,

    /// Re-scrape dates already in the store during backfill.
    #[arg(long)]
    pub overwrite: bool,

    /// Read cached `YYYY-MM-DD.html` pages instead of the live portal.
    #[arg(long)]
    pub fixtures: Option<PathBuf>,

    /// Pretend today is this date, YYYY-MM-DD.
    #[arg(long)]
    pub today: Option<String>,

    /// No per-date progress lines.
    #[arg(long, short)]
    pub quiet: bool,
}

#[derive(Debug, Args)]
pub struct ForecastArgs {
    /// Days to forecast.
    #[arg(long)]
    pub horizon: Option<u32>,

    /// Days of history to train on.
    #[arg(long)]
    pub training_window: Option<u32>,

    /// Minimum distinct days of history before forecasting.
    #[arg(long)]
    pub min_history: Option<u32>,

    /// quantity | revenue
    #[arg(long)]
    pub target: Option<String>,

    /// zero_fill | exclude
    #[arg(long)]
    pub gap_policy: Option<String>,

    /// Write forecast.csv, report.csv and model_description.csv here.
    #[arg(long)]
    pub output: Option<PathBuf>,
}

/// Parse arguments, run the chosen pipeline, return the process exit code.
pub fn run() -> Result<u8, PipelineError> {
    let cli = Cli::parse();
    let mut cfg = Config::from_env()?;
    apply_common(&mut cfg, &cli);
    crate::log::init(cfg.log_file.as_deref())?;

    match &cli.command {
        Command::Scrape(args) => {
            let today = apply_scrape(&mut cfg, args)?;
            scrape(&cfg, today, args.quiet)
        }
        Command::Forecast(args) => {
            apply_forecast(&mut cfg, args)?;
            forecast(&cfg)
        }
    }
}

pub fn apply_common(cfg: &mut Config, cli: &Cli) {
    if let Some(p) = &cli.log_file {
        cfg.log_file = Some(p.clone());
    }
    if let Some(p) = &cli.store {
        cfg.store_path = p.clone();
    }
}

/// Apply scrape flags and resolve "today".
pub fn apply_scrape(cfg: &mut Config, args: &ScrapeArgs) -> Result<NaiveDate, ConfigurationError> {
    if let Some(m) = &args.mode {
        cfg.scrape.mode = parse_mode(m)?;
    }
    if let Some(s) = &args.start {
        cfg.scrape.backfill_start = Some(parse_date("BACKFILL_START_DATE", s)?);
    }
    if args.overwrite {
        cfg.scrape.overwrite = true;
    }
    if let Some(dir) = &args.fixtures {
        cfg.fixture_dir = Some(dir.clone());
    }
    match &args.today {
        Some(t) => parse_date("today", t),
        None => Ok(Local::now().date_naive()),
    }
}

pub fn apply_forecast(cfg: &mut Config, args: &ForecastArgs) -> Result<(), ConfigurationError> {
    let f = &mut cfg.forecast;
    if let Some(v) = args.horizon {
        f.horizon_days = v;
    }
    if let Some(v) = args.training_window {
        f.training_window_days = v;
    }
    if let Some(v) = args.min_history {
        f.min_history_days = v;
    }
    if let Some(v) = &args.target {
        f.target = parse_target(v)?;
    }
    if let Some(v) = &args.gap_policy {
        f.gap_policy = parse_gap_policy(v)?;
    }
    if let Some(dir) = &args.output {
        f.output_dir = Some(dir.clone());
    }
    Ok(())
}

fn scrape(cfg: &Config, today: NaiveDate, quiet: bool) -> Result<u8, PipelineError> {
    // Fail on bad config before opening a portal session.
    cfg.validate_for_scrape(today)?;

    let mut source = runner::open_source(cfg)?;
    let mut store = CsvStore::new(&cfg.store_path);
    let notifier = notify::from_webhook(cfg.webhook_url.as_deref());
    let orders = runner::open_orders(cfg);

    let mut sink = StderrProgress::default();
    let progress: Option<&mut dyn Progress> = if quiet { None } else { Some(&mut sink) };

    let summary = runner::run_scrape(
        cfg,
        today,
        source.as_mut(),
        &mut store,
        notifier.as_ref(),
        orders.as_ref().map(|o| o as &dyn OrderSink),
        progress,
    )?;

    for (date, outcome) in &summary.outcomes {
        let status = match outcome {
            DateOutcome::Written { records, .. } => format!("written,{records}"),
            DateOutcome::AlreadyPresent => s!("skipped,0"),
            DateOutcome::NoData => s!("no_data,0"),
            DateOutcome::Failed { stage, .. } => format!("failed_{stage},0"),
        };
        println!("{date},{status}");
    }
    if let Some(reason) = &summary.abort_reason {
        eprintln!("Run aborted: {reason}");
    }
    Ok(summary.exit_code())
}

fn forecast(cfg: &Config) -> Result<u8, PipelineError> {
    let store = CsvStore::new(&cfg.store_path);
    let notifier = notify::from_webhook(cfg.webhook_url.as_deref());

    match runner::run_forecast(cfg, &store, notifier.as_ref())? {
        ForecastOutcome::Completed { result, files } => {
            for (id, total) in result.top_identifiers(usize::MAX) {
                println!("{id},{total:.2}");
            }
            for f in files {
                eprintln!("Wrote {}", f.display());
            }
        }
        ForecastOutcome::Skipped(e) => eprintln!("Forecast skipped: {e}"),
    }
    Ok(0)
}
