// src/notify.rs
//! Notifier: plain-text run summaries sent to a chat webhook.
//! Delivery is best effort; a failed send is logged and otherwise ignored.

use std::fmt::Display;
use std::time::Duration;

use serde_json::json;
use tracing::{info, warn};

use crate::config::consts::{HTTP_TIMEOUT_SECS, TOP_IDENTIFIERS_IN_SUMMARY, USER_AGENT};
use crate::error::{InsufficientDataError, NotifyError};
use crate::forecast::ForecastResult;
use crate::model::RunStatus;
use crate::scrape::{DateOutcome, RunSummary};

pub trait Notifier {
    fn send(&self, message: &str) -> Result<(), NotifyError>;
}

/// Slack-compatible incoming webhook: `{"text": message}`.
pub struct SlackNotifier {
    client: reqwest::blocking::Client,
    url: String,
}

impl SlackNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self, NotifyError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        Ok(Self { client, url: url.into() })
    }
}

impl Notifier for SlackNotifier {
    fn send(&self, message: &str) -> Result<(), NotifyError> {
        let resp = self
            .client
            .post(&self.url)
            .json(&json!({ "text": message }))
            .send()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(NotifyError::Status(resp.status().as_u16()));
        }
        Ok(())
    }
}

/// Used when no webhook is configured.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, message: &str) -> Result<(), NotifyError> {
        info!(target: "notify", "{message}");
        Ok(())
    }
}

/// Webhook when configured, log-only otherwise. A webhook client that cannot
/// be built degrades to log-only.
pub fn from_webhook(url: Option<&str>) -> Box<dyn Notifier> {
    match url.map(SlackNotifier::new) {
        Some(Ok(n)) => Box::new(n),
        Some(Err(e)) => {
            warn!(error = %e, "webhook notifier unavailable; logging notifications instead");
            Box::new(LogNotifier)
        }
        None => Box::new(LogNotifier),
    }
}

/// Send and swallow failures. Returns whether the message went out.
pub fn notify_best_effort(notifier: &dyn Notifier, message: &str) -> bool {
    match notifier.send(message) {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "notification not delivered");
            false
        }
    }
}

/* ---------------- messages ---------------- */

pub fn scrape_summary(summary: &RunSummary) -> String {
    let run = &summary.run;
    let icon = match run.status {
        RunStatus::Succeeded => "✅",
        RunStatus::PartiallyFailed => "⚠️",
        RunStatus::Aborted | RunStatus::Running => "❌",
    };

    let mut written = 0;
    let mut inserted = 0;
    let mut updated = 0;
    let (mut present, mut empty) = (Vec::new(), Vec::new());
    let mut failed = Vec::new();
    let mut order_failures = Vec::new();
    for (date, outcome) in &summary.outcomes {
        match outcome {
            DateOutcome::Written { stats, orders, .. } => {
                written += 1;
                inserted += stats.inserted;
                updated += stats.updated;
                if let Some(Err(_)) = orders {
                    order_failures.push(date.to_string());
                }
            }
            DateOutcome::AlreadyPresent => present.push(date.to_string()),
            DateOutcome::NoData => empty.push(date.to_string()),
            DateOutcome::Failed { stage, .. } => failed.push(format!("{date} ({stage})")),
        }
    }

    let mut lines = vec![format!(
        "{icon} [scrape] {} run {} to {}: {written} date(s) stored, {} record(s) ({inserted} new, {updated} updated)",
        run.mode,
        run.start_date,
        run.end_date,
        summary.records_written(),
    )];
    if !present.is_empty() {
        lines.push(format!("already stored: {}", present.len()));
    }
    if !empty.is_empty() {
        lines.push(format!("no data: {}", empty.join(", ")));
    }
    if !failed.is_empty() {
        lines.push(format!("failed: {}", failed.join(", ")));
    }
    if !order_failures.is_empty() {
        lines.push(format!("order feed failed: {}", order_failures.join(", ")));
    }
    if let Some(reason) = &summary.abort_reason {
        lines.push(format!("aborted: {reason}"));
    }
    if let Some(top) = top_line(summary.top_identifiers(TOP_IDENTIFIERS_IN_SUMMARY)) {
        lines.push(top);
    }
    lines.join("\n")
}

pub fn scrape_failed(err: &dyn Display) -> String {
    format!("❌ [scrape] failed before any date was processed: {err}")
}

pub fn forecast_completed(result: &ForecastResult) -> String {
    let m = &result.metadata;
    let range = match (result.horizon.first(), result.horizon.last()) {
        (Some(a), Some(b)) => format!("{a} to {b}"),
        _ => s!("an empty horizon"),
    };
    let mut lines = vec![format!(
        "✅ [forecast] {} forecast for {range}: {} identifier(s), total {}",
        m.target.as_str(),
        result.identifiers(),
        fmt_qty(result.total()),
    )];

    let mut model = format!("model {} trained on {} to {}", m.model, m.training_start, m.training_end);
    match &m.validation {
        Some(v) => {
            model.push_str(&format!(", validation RMSE {:.2}, MAE {:.2}", v.rmse, v.mae));
            if let Some(p) = v.mape {
                model.push_str(&format!(", MAPE {:.1}%", p * 100.0));
            }
        }
        None => model.push_str(" (not validated)"),
    }
    lines.push(model);

    if let Some(top) = top_line(result.top_identifiers(TOP_IDENTIFIERS_IN_SUMMARY)) {
        lines.push(top);
    }
    lines.join("\n")
}

pub fn forecast_skipped(err: &InsufficientDataError) -> String {
    format!("⚠️ [forecast] skipped: {err}")
}

pub fn forecast_failed(err: &dyn Display) -> String {
    format!("🚨 [forecast] failed: {err}")
}

fn top_line(top: Vec<(&str, f64)>) -> Option<String> {
    if top.is_empty() {
        return None;
    }
    let list: Vec<String> = top.iter().map(|(id, q)| format!("{id} {}", fmt_qty(*q))).collect();
    Some(format!("top: {}", list.join(", ")))
}

fn fmt_qty(v: f64) -> String {
    if v.fract() == 0.0 { format!("{v:.0}") } else { format!("{v:.1}") }
}
