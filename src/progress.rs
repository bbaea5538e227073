// src/progress.rs
use chrono::NaiveDate;

/// Lightweight progress reporting for long-running scrapes.
/// The CLI implements this to print one line per date.
pub trait Progress {
    /// Called at the start with the number of dates to process.
    fn begin(&mut self, _total: usize) {}

    /// Free-form status line for human eyes.
    fn log(&mut self, _msg: &str) {}

    /// One date finished (written, skipped or empty).
    fn date_done(&mut self, _date: NaiveDate, _summary: &str) {}

    /// One date failed after retries.
    fn date_failed(&mut self, _date: NaiveDate, _error: &str) {}

    /// Called at the end, successful or not.
    fn finish(&mut self) {}
}

/// Prints `[n/total] date: …` lines to stderr.
#[derive(Default)]
pub struct StderrProgress {
    total: usize,
    seen: usize,
}

impl Progress for StderrProgress {
    fn begin(&mut self, total: usize) {
        self.total = total;
        self.seen = 0;
    }

    fn log(&mut self, msg: &str) {
        eprintln!("{msg}");
    }

    fn date_done(&mut self, date: NaiveDate, summary: &str) {
        self.seen += 1;
        eprintln!("[{}/{}] {date}: {summary}", self.seen, self.total);
    }

    fn date_failed(&mut self, date: NaiveDate, error: &str) {
        self.seen += 1;
        eprintln!("[{}/{}] {date}: FAILED {error}", self.seen, self.total);
    }
}
