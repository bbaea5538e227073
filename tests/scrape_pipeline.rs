// tests/scrape_pipeline.rs
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fs;

use chrono::NaiveDate;

use sales_scrape::config::{Config, RetryPolicy};
use sales_scrape::error::{ConfigurationError, FetchError, NotifyError, OrderFeedError, PipelineError, StoreReadError, StoreWriteError};
use sales_scrape::model::{RunStatus, SalesRecord, ScrapeMode};
use sales_scrape::notify::Notifier;
use sales_scrape::orders::OrderSink;
use sales_scrape::runner::run_scrape;
use sales_scrape::scrape::{DateOutcome, DocumentSource, FixtureSource, Stage};
use sales_scrape::store::{CsvStore, MemoryStore, MergeStats, SalesStore};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn page(rows: &[(&str, f64)]) -> String {
    let mut body = String::new();
    for (id, qty) in rows {
        body.push_str(&format!(
            "<tr><td>ACME</td><td>S-{id}</td><td>{id}</td><td>Item {id}</td><td>{qty}</td><td>0</td></tr>\n"
        ));
    }
    format!(
        r#"<html><body><form id="form1"><input name="EcrDate1" value="">
        <table id="dgProd">
          <tr><td>廠商名稱</td><td>店內碼</td><td>國際條碼</td><td>商品名稱</td><td>銷售量</td><td>庫存量</td></tr>
          {body}
        </table></form></body></html>"#
    )
}

const NO_RESULTS: &str = r#"<form><input name="EcrDate1"><input type="submit" name="btnSearch" value="Search"></form>"#;
const MAINTENANCE: &str = "<html><body><h1>System maintenance</h1></body></html>";

/// Canned responses per date. The last response of a date repeats.
#[derive(Default)]
struct ScriptedSource {
    script: HashMap<NaiveDate, VecDeque<Result<String, FetchError>>>,
    calls: Vec<NaiveDate>,
}

impl ScriptedSource {
    fn respond(mut self, date: NaiveDate, r: Result<String, FetchError>) -> Self {
        self.script.entry(date).or_default().push_back(r);
        self
    }

    fn page(self, date: NaiveDate, rows: &[(&str, f64)]) -> Self {
        self.respond(date, Ok(page(rows)))
    }

    fn calls_for(&self, date: NaiveDate) -> usize {
        self.calls.iter().filter(|c| **c == date).count()
    }
}

impl DocumentSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    fn fetch(&mut self, date: NaiveDate) -> Result<String, FetchError> {
        self.calls.push(date);
        let Some(q) = self.script.get_mut(&date) else {
            return Err(FetchError::NotFound(date));
        };
        if q.len() > 1 {
            q.pop_front().unwrap()
        } else {
            q.front().cloned().unwrap()
        }
    }
}

#[derive(Default)]
struct Recorder(RefCell<Vec<String>>);

impl Notifier for Recorder {
    fn send(&self, message: &str) -> Result<(), NotifyError> {
        self.0.borrow_mut().push(message.to_string());
        Ok(())
    }
}

struct Unreachable;

impl Notifier for Unreachable {
    fn send(&self, _message: &str) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("connection refused".into()))
    }
}

/// Fails the first `failures` writes, then delegates.
struct FlakyStore {
    inner: MemoryStore,
    failures: usize,
}

impl SalesStore for FlakyStore {
    fn load(&self) -> Result<Vec<SalesRecord>, StoreReadError> {
        self.inner.load()
    }

    fn write_batch(&mut self, date: NaiveDate, records: &[SalesRecord]) -> Result<MergeStats, StoreWriteError> {
        if self.failures > 0 {
            self.failures -= 1;
            return Err(StoreWriteError::Io {
                path: "sheet".into(),
                source: std::io::Error::new(std::io::ErrorKind::TimedOut, "timeout"),
            });
        }
        self.inner.write_batch(date, records)
    }
}

fn config(mode: ScrapeMode, start: Option<NaiveDate>) -> Config {
    let mut cfg = Config::default();
    cfg.scrape.mode = mode;
    cfg.scrape.backfill_start = start;
    cfg.portal.account = Some("acct".into());
    cfg.portal.password = Some("pw".into());
    cfg.portal.auth_password = Some("auth".into());
    cfg.retry = RetryPolicy::immediate(3);
    cfg
}

fn transient() -> Result<String, FetchError> {
    Err(FetchError::Transient("connection reset".into()))
}

#[test]
fn daily_rerun_updates_instead_of_duplicating() {
    let cfg = config(ScrapeMode::Daily, None);
    let today = d(2024, 3, 2);
    let mut store = MemoryStore::new();
    let notes = Recorder::default();

    let mut src = ScriptedSource::default().page(d(2024, 3, 1), &[("SKU1", 10.0)]);
    let s = run_scrape(&cfg, today, &mut src, &mut store, &notes, None, None).unwrap();
    assert!(s.is_success());
    assert_eq!(store.load().unwrap(), vec![SalesRecord::new(d(2024, 3, 1), "SKU1", 10.0)]);

    let mut src = ScriptedSource::default().page(d(2024, 3, 1), &[("SKU1", 12.0)]);
    let s = run_scrape(&cfg, today, &mut src, &mut store, &notes, None, None).unwrap();
    assert_eq!(store.load().unwrap(), vec![SalesRecord::new(d(2024, 3, 1), "SKU1", 12.0)]);
    match s.outcome(d(2024, 3, 1)) {
        Some(DateOutcome::Written { stats, .. }) => assert_eq!(stats.updated, 1),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(notes.0.borrow().len(), 2);
}

#[test]
fn backfill_isolates_a_failing_date() {
    let cfg = config(ScrapeMode::Backfill, Some(d(2024, 1, 1)));
    let mut src = ScriptedSource::default()
        .page(d(2024, 1, 1), &[("A", 1.0)])
        .page(d(2024, 1, 2), &[("A", 2.0)])
        .respond(d(2024, 1, 3), transient())
        .page(d(2024, 1, 4), &[("A", 4.0)])
        .page(d(2024, 1, 5), &[("A", 5.0)]);
    let mut store = MemoryStore::new();
    let notes = Recorder::default();

    let s = run_scrape(&cfg, d(2024, 1, 5), &mut src, &mut store, &notes, None, None).unwrap();

    let stored: Vec<NaiveDate> = store.dataset().dates().into_iter().collect();
    assert_eq!(stored, vec![d(2024, 1, 1), d(2024, 1, 2), d(2024, 1, 4), d(2024, 1, 5)]);
    assert_eq!(s.written_dates(), stored);
    assert_eq!(s.failed_dates(), vec![d(2024, 1, 3)]);
    assert_eq!(src.calls_for(d(2024, 1, 3)), 3);
    assert_eq!(s.run.status, RunStatus::PartiallyFailed);
    assert_eq!(s.exit_code(), 1);

    let msg = &notes.0.borrow()[0];
    assert!(msg.contains("backfill run 2024-01-01 to 2024-01-05"), "{msg}");
    assert!(msg.contains("failed: 2024-01-03 (fetch)"), "{msg}");
}

#[test]
fn transient_failure_recovers_within_budget() {
    let cfg = config(ScrapeMode::Daily, None);
    let mut src = ScriptedSource::default()
        .respond(d(2024, 3, 1), transient())
        .page(d(2024, 3, 1), &[("SKU1", 3.0)]);
    let mut store = MemoryStore::new();

    let s = run_scrape(&cfg, d(2024, 3, 2), &mut src, &mut store, &Recorder::default(), None, None).unwrap();
    assert!(s.is_success());
    assert_eq!(src.calls_for(d(2024, 3, 1)), 2);
    assert_eq!(store.dataset().len(), 1);
}

#[test]
fn permanent_fetch_error_is_not_retried() {
    let cfg = config(ScrapeMode::Daily, None);
    let status = FetchError::Status { status: 403, url: "https://portal/q".into() };
    let mut src = ScriptedSource::default().respond(d(2024, 3, 1), Err(status));
    let mut store = MemoryStore::new();

    let s = run_scrape(&cfg, d(2024, 3, 2), &mut src, &mut store, &Recorder::default(), None, None).unwrap();
    assert_eq!(src.calls_for(d(2024, 3, 1)), 1);
    assert!(matches!(s.outcome(d(2024, 3, 1)), Some(DateOutcome::Failed { stage: Stage::Fetch, attempts: 1, .. })));
    assert_eq!(s.exit_code(), 1);
}

#[test]
fn unrecognized_page_aborts_the_run() {
    let cfg = config(ScrapeMode::Backfill, Some(d(2024, 1, 1)));
    let mut src = ScriptedSource::default()
        .page(d(2024, 1, 1), &[("A", 1.0)])
        .respond(d(2024, 1, 2), Ok(MAINTENANCE.into()))
        .page(d(2024, 1, 3), &[("A", 3.0)]);
    let mut store = MemoryStore::new();
    let notes = Recorder::default();

    let s = run_scrape(&cfg, d(2024, 1, 3), &mut src, &mut store, &notes, None, None).unwrap();
    assert_eq!(s.run.status, RunStatus::Aborted);
    assert!(s.abort_reason.as_deref().unwrap_or_default().contains("unrecognized document layout"));
    assert_eq!(src.calls_for(d(2024, 1, 3)), 0);
    assert_eq!(store.dataset().len(), 1);
    assert_eq!(s.exit_code(), 1);
    assert!(notes.0.borrow()[0].contains("aborted:"));
}

#[test]
fn rejected_login_aborts_the_run() {
    let cfg = config(ScrapeMode::Backfill, Some(d(2024, 1, 1)));
    let mut src = ScriptedSource::default()
        .respond(d(2024, 1, 1), Err(FetchError::LoginRejected("still on login page".into())));
    let mut store = MemoryStore::new();

    let s = run_scrape(&cfg, d(2024, 1, 3), &mut src, &mut store, &Recorder::default(), None, None).unwrap();
    assert_eq!(s.run.status, RunStatus::Aborted);
    assert_eq!(s.outcomes.len(), 1);
    assert_eq!(src.calls.len(), 1);
}

#[test]
fn backfill_skips_stored_dates_unless_overwriting() {
    let mut cfg = config(ScrapeMode::Backfill, Some(d(2024, 1, 1)));
    let script = || {
        ScriptedSource::default()
            .page(d(2024, 1, 1), &[("A", 1.0)])
            .page(d(2024, 1, 2), &[("A", 9.0)])
    };
    let mut store = MemoryStore::with_records(vec![SalesRecord::new(d(2024, 1, 2), "A", 2.0)]);

    let mut src = script();
    let s = run_scrape(&cfg, d(2024, 1, 2), &mut src, &mut store, &Recorder::default(), None, None).unwrap();
    assert_eq!(src.calls_for(d(2024, 1, 2)), 0);
    assert_eq!(s.outcome(d(2024, 1, 2)), Some(&DateOutcome::AlreadyPresent));
    assert_eq!(store.dataset().get(d(2024, 1, 2), "A").unwrap().quantity, 2.0);

    cfg.scrape.overwrite = true;
    let mut src = script();
    run_scrape(&cfg, d(2024, 1, 2), &mut src, &mut store, &Recorder::default(), None, None).unwrap();
    assert_eq!(src.calls_for(d(2024, 1, 2)), 1);
    assert_eq!(store.dataset().get(d(2024, 1, 2), "A").unwrap().quantity, 9.0);
}

#[test]
fn empty_portal_day_writes_nothing() {
    let cfg = config(ScrapeMode::Daily, None);
    let mut src = ScriptedSource::default().respond(d(2024, 3, 1), Ok(NO_RESULTS.into()));
    let mut store = MemoryStore::new();

    let s = run_scrape(&cfg, d(2024, 3, 2), &mut src, &mut store, &Recorder::default(), None, None).unwrap();
    assert_eq!(s.outcome(d(2024, 3, 1)), Some(&DateOutcome::NoData));
    assert_eq!(store.writes(), 0);
    assert_eq!(s.exit_code(), 0);
}

#[test]
fn store_write_is_retried_once_then_fails_the_date() {
    let cfg = config(ScrapeMode::Backfill, Some(d(2024, 1, 1)));
    let script = || {
        ScriptedSource::default()
            .page(d(2024, 1, 1), &[("A", 1.0)])
            .page(d(2024, 1, 2), &[("A", 2.0)])
    };

    // One failure: absorbed by the retry.
    let mut store = FlakyStore { inner: MemoryStore::new(), failures: 1 };
    let s = run_scrape(&cfg, d(2024, 1, 2), &mut script(), &mut store, &Recorder::default(), None, None).unwrap();
    assert!(s.is_success());
    assert_eq!(store.inner.dataset().len(), 2);

    // Two failures: the first date fails, the next one still lands.
    let mut store = FlakyStore { inner: MemoryStore::new(), failures: 2 };
    let s = run_scrape(&cfg, d(2024, 1, 2), &mut script(), &mut store, &Recorder::default(), None, None).unwrap();
    assert!(matches!(s.outcome(d(2024, 1, 1)), Some(DateOutcome::Failed { stage: Stage::Write, attempts: 2, .. })));
    assert_eq!(store.inner.dataset().dates().into_iter().collect::<Vec<_>>(), vec![d(2024, 1, 2)]);
    assert_eq!(s.exit_code(), 1);
}

#[test]
fn missing_backfill_start_fails_before_any_fetch() {
    let cfg = config(ScrapeMode::Backfill, None);
    let mut src = ScriptedSource::default();
    let notes = Recorder::default();
    let err = run_scrape(&cfg, d(2024, 1, 5), &mut src, &mut MemoryStore::new(), &notes, None, None).unwrap_err();
    assert!(matches!(err, PipelineError::Configuration(ConfigurationError::Missing("BACKFILL_START_DATE"))));
    assert!(src.calls.is_empty());
    assert!(notes.0.borrow().is_empty());
}

#[test]
fn notification_failure_does_not_fail_the_run() {
    let cfg = config(ScrapeMode::Daily, None);
    let mut src = ScriptedSource::default().page(d(2024, 3, 1), &[("SKU1", 1.0)]);
    let mut store = MemoryStore::new();
    let s = run_scrape(&cfg, d(2024, 3, 2), &mut src, &mut store, &Unreachable, None, None).unwrap();
    assert!(s.is_success());
    assert_eq!(store.dataset().len(), 1);
}

#[derive(Default)]
struct OrderLog {
    posted: RefCell<Vec<(NaiveDate, usize)>>,
    fail: bool,
}

impl OrderSink for OrderLog {
    fn post_day(&self, date: NaiveDate, records: &[SalesRecord]) -> Result<usize, OrderFeedError> {
        if self.fail {
            return Err(OrderFeedError::Status { status: 502, body: "bad gateway".into() });
        }
        let n = records.iter().filter(|r| r.quantity > 0.0).count();
        self.posted.borrow_mut().push((date, n));
        Ok(n)
    }
}

#[test]
fn order_feed_receives_each_written_date() {
    let cfg = config(ScrapeMode::Daily, None);
    let mut src = ScriptedSource::default().page(d(2024, 3, 1), &[("A", 2.0), ("B", 0.0)]);
    let orders = OrderLog::default();
    run_scrape(&cfg, d(2024, 3, 2), &mut src, &mut MemoryStore::new(), &Recorder::default(), Some(&orders), None)
        .unwrap();
    assert_eq!(*orders.posted.borrow(), vec![(d(2024, 3, 1), 1)]);
}

#[test]
fn order_feed_failure_leaves_the_date_written() {
    let cfg = config(ScrapeMode::Daily, None);
    let mut src = ScriptedSource::default().page(d(2024, 3, 1), &[("A", 2.0)]);
    let orders = OrderLog { fail: true, ..OrderLog::default() };
    let notes = Recorder::default();
    let s = run_scrape(&cfg, d(2024, 3, 2), &mut src, &mut MemoryStore::new(), &notes, Some(&orders), None).unwrap();
    assert!(s.is_success());
    assert!(matches!(s.outcome(d(2024, 3, 1)), Some(DateOutcome::Written { orders: Some(Err(_)), .. })));
    assert!(notes.0.borrow()[0].contains("order feed failed: 2024-03-01"));
}

#[test]
fn fixtures_into_csv_store() {
    let dir = tempfile::tempdir().unwrap();
    let pages = dir.path().join("pages");
    fs::create_dir_all(&pages).unwrap();
    fs::write(pages.join("2024-01-01.html"), page(&[("4710001", 3.0), ("4710002", 1.0)])).unwrap();
    fs::write(pages.join("2024-01-02.html"), page(&[("4710001", 5.0)])).unwrap();

    let mut cfg = config(ScrapeMode::Backfill, Some(d(2024, 1, 1)));
    cfg.fixture_dir = Some(pages.clone());
    let mut src = FixtureSource::new(&pages);
    let mut store = CsvStore::new(dir.path().join("store/sales.csv"));

    let s = run_scrape(&cfg, d(2024, 1, 2), &mut src, &mut store, &Recorder::default(), None, None).unwrap();
    assert!(s.is_success());
    assert_eq!(s.records_written(), 3);

    let text = fs::read_to_string(store.path()).unwrap();
    assert_eq!(
        text,
        "date,identifier,quantity,revenue\n\
         2024-01-01,4710001,3,\n\
         2024-01-01,4710002,1,\n\
         2024-01-02,4710001,5,\n"
    );

    // Same run again: nothing new is fetched or written.
    let s = run_scrape(&cfg, d(2024, 1, 2), &mut src, &mut store, &Recorder::default(), None, None).unwrap();
    assert!(s.outcomes.iter().all(|(_, o)| *o == DateOutcome::AlreadyPresent));
    assert_eq!(fs::read_to_string(store.path()).unwrap(), text);
}
