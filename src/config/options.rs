// src/config/options.rs
//! Immutable run configuration.
//!
//! Built once per run from a key lookup (`.env` + process environment in
//! production, a plain map in tests), then overridden by CLI flags and
//! validated for the pipeline about to run. Nothing downstream reads the
//! environment again.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;

use super::consts::*;
use crate::error::ConfigurationError;
use crate::model::ScrapeMode;

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub scrape: ScrapeOptions,
    pub portal: PortalCredentials,
    /// Read cached pages from here instead of the live portal.
    pub fixture_dir: Option<PathBuf>,
    pub store_path: PathBuf,
    pub webhook_url: Option<String>,
    pub orders: Option<OrdersOptions>,
    pub retry: RetryPolicy,
    /// Attempts per store write (first try + retries).
    pub store_write_attempts: u32,
    pub forecast: ForecastOptions,
    pub log_file: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScrapeOptions {
    pub mode: ScrapeMode,
    pub backfill_start: Option<NaiveDate>,
    /// Re-scrape dates already in the store during backfill.
    pub overwrite: bool,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self { mode: ScrapeMode::Daily, backfill_start: None, overwrite: false }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct PortalCredentials {
    pub base_url: String,
    pub account: Option<String>,
    pub password: Option<String>,
    pub auth_password: Option<String>,
}

// Keep secrets out of debug logs.
impl std::fmt::Debug for PortalCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortalCredentials")
            .field("base_url", &self.base_url)
            .field("account", &self.account)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("auth_password", &self.auth_password.as_ref().map(|_| "***"))
            .finish()
    }
}

impl Default for PortalCredentials {
    fn default() -> Self {
        Self {
            base_url: s!(PORTAL_BASE_URL),
            account: None,
            password: None,
            auth_password: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrdersOptions {
    pub endpoint: String,
    pub channel_id: u32,
}

/// Bounded exponential backoff: `initial * multiplier^(n-1)`, capped at `max_backoff`.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: f64,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: RETRY_MAX_ATTEMPTS,
            initial_backoff: Duration::from_millis(RETRY_BACKOFF_MS),
            multiplier: 2.0,
            max_backoff: Duration::from_millis(RETRY_MAX_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    /// No sleeping between attempts. For tests and fixture runs.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff: Duration::ZERO,
            multiplier: 1.0,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        if attempt == 0 || self.initial_backoff.is_zero() {
            return Duration::ZERO;
        }
        let factor = self.multiplier.max(1.0).powi(attempt as i32 - 1);
        let ms = (self.initial_backoff.as_millis() as f64 * factor).round() as u64;
        Duration::from_millis(ms).min(self.max_backoff)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ForecastTarget {
    Quantity,
    Revenue,
}

impl ForecastTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForecastTarget::Quantity => "quantity",
            ForecastTarget::Revenue => "revenue",
        }
    }
}

/// How days without a record are treated when building features.
/// The same policy drives both training and inference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GapPolicy {
    /// A missing day inside an identifier's observed span counts as zero sales.
    ZeroFill,
    /// Missing days carry no value; rows whose lags are missing are dropped.
    Exclude,
}

impl GapPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            GapPolicy::ZeroFill => "zero_fill",
            GapPolicy::Exclude => "exclude",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ForecastOptions {
    pub horizon_days: u32,
    pub training_window_days: u32,
    pub min_history_days: u32,
    pub validation_days: u32,
    pub target: ForecastTarget,
    pub gap_policy: GapPolicy,
    pub holidays: BTreeSet<NaiveDate>,
    pub ridge_lambda: f64,
    pub output_dir: Option<PathBuf>,
}

impl Default for ForecastOptions {
    fn default() -> Self {
        Self {
            horizon_days: FORECAST_HORIZON_DAYS,
            training_window_days: TRAINING_WINDOW_DAYS,
            min_history_days: FORECAST_MIN_HISTORY_DAYS,
            validation_days: FORECAST_VALIDATION_DAYS,
            target: ForecastTarget::Quantity,
            gap_policy: GapPolicy::ZeroFill,
            holidays: BTreeSet::new(),
            ridge_lambda: FORECAST_RIDGE_LAMBDA,
            output_dir: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scrape: ScrapeOptions::default(),
            portal: PortalCredentials::default(),
            fixture_dir: None,
            store_path: PathBuf::from(DEFAULT_STORE_FILE),
            webhook_url: None,
            orders: None,
            retry: RetryPolicy::default(),
            store_write_attempts: STORE_WRITE_ATTEMPTS,
            forecast: ForecastOptions::default(),
            log_file: None,
        }
    }
}

impl Config {
    /// Load `.env` (if present) and read the process environment.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        let _ = dotenv::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key → value lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut cfg = Config::default();

        if let Some(v) = get("SCRAPE_MODE") {
            cfg.scrape.mode = parse_mode(&v)?;
        }
        if let Some(v) = get("BACKFILL_START_DATE") {
            cfg.scrape.backfill_start = Some(parse_date("BACKFILL_START_DATE", &v)?);
        }
        if let Some(v) = get("BACKFILL_OVERWRITE") {
            cfg.scrape.overwrite = str_to_bool(&v);
        }

        if let Some(v) = get("PORTAL_BASE_URL") {
            cfg.portal.base_url = v.trim_end_matches('/').to_string();
        }
        cfg.portal.account = get("PORTAL_ACCOUNT");
        cfg.portal.password = get("PORTAL_PASSWORD");
        cfg.portal.auth_password = get("PORTAL_AUTH_PWD");

        cfg.fixture_dir = get("FIXTURE_DIR").map(PathBuf::from);
        if let Some(v) = get("SALES_STORE_PATH") {
            cfg.store_path = PathBuf::from(v);
        }
        cfg.webhook_url = get("SLACK_WEBHOOK_URL");

        if let Some(endpoint) = get("ORDERS_ENDPOINT") {
            let channel_id = match get("ORDERS_CHANNEL_ID") {
                Some(v) => parse_num("ORDERS_CHANNEL_ID", &v)?,
                None => ORDERS_CHANNEL_ID,
            };
            cfg.orders = Some(OrdersOptions { endpoint, channel_id });
        }

        if let Some(v) = get("RETRY_MAX_ATTEMPTS") {
            cfg.retry.max_attempts = parse_num("RETRY_MAX_ATTEMPTS", &v)?;
        }
        if let Some(v) = get("RETRY_BACKOFF_MS") {
            cfg.retry.initial_backoff = Duration::from_millis(parse_num("RETRY_BACKOFF_MS", &v)?);
        }
        if let Some(v) = get("RETRY_MAX_BACKOFF_MS") {
            cfg.retry.max_backoff = Duration::from_millis(parse_num("RETRY_MAX_BACKOFF_MS", &v)?);
        }
        if let Some(v) = get("STORE_WRITE_ATTEMPTS") {
            cfg.store_write_attempts = parse_num("STORE_WRITE_ATTEMPTS", &v)?;
        }

        let f = &mut cfg.forecast;
        if let Some(v) = get("FORECAST_HORIZON_DAYS") {
            f.horizon_days = parse_num("FORECAST_HORIZON_DAYS", &v)?;
        }
        if let Some(v) = get("TRAINING_WINDOW_DAYS") {
            f.training_window_days = parse_num("TRAINING_WINDOW_DAYS", &v)?;
        }
        if let Some(v) = get("FORECAST_MIN_HISTORY_DAYS") {
            f.min_history_days = parse_num("FORECAST_MIN_HISTORY_DAYS", &v)?;
        }
        if let Some(v) = get("FORECAST_VALIDATION_DAYS") {
            f.validation_days = parse_num("FORECAST_VALIDATION_DAYS", &v)?;
        }
        if let Some(v) = get("FORECAST_TARGET") {
            f.target = parse_target(&v)?;
        }
        if let Some(v) = get("FORECAST_GAP_POLICY") {
            f.gap_policy = parse_gap_policy(&v)?;
        }
        if let Some(v) = get("FORECAST_HOLIDAYS") {
            f.holidays = parse_date_list("FORECAST_HOLIDAYS", &v)?;
        }
        if let Some(v) = get("FORECAST_RIDGE_LAMBDA") {
            f.ridge_lambda = parse_num("FORECAST_RIDGE_LAMBDA", &v)?;
        }
        f.output_dir = get("FORECAST_OUTPUT_DIR").map(PathBuf::from);

        cfg.log_file = get("LOG_FILE").map(PathBuf::from);

        Ok(cfg)
    }

    /// Everything the scrape pipeline needs, checked before any I/O.
    pub fn validate_for_scrape(&self, today: NaiveDate) -> Result<(), ConfigurationError> {
        if self.scrape.mode == ScrapeMode::Backfill {
            let start = self
                .scrape
                .backfill_start
                .ok_or(ConfigurationError::Missing("BACKFILL_START_DATE"))?;
            if start > today {
                return Err(ConfigurationError::Invalid {
                    key: "BACKFILL_START_DATE",
                    value: start.to_string(),
                    reason: format!("after today ({today})"),
                });
            }
        }

        if self.fixture_dir.is_none() {
            if self.portal.account.is_none() {
                return Err(ConfigurationError::Missing("PORTAL_ACCOUNT"));
            }
            if self.portal.password.is_none() {
                return Err(ConfigurationError::Missing("PORTAL_PASSWORD"));
            }
            if self.portal.auth_password.is_none() {
                return Err(ConfigurationError::Missing("PORTAL_AUTH_PWD"));
            }
        }

        if self.retry.max_attempts == 0 {
            return Err(invalid("RETRY_MAX_ATTEMPTS", "0", "at least one attempt is required"));
        }
        if self.store_write_attempts == 0 {
            return Err(invalid("STORE_WRITE_ATTEMPTS", "0", "at least one attempt is required"));
        }
        Ok(())
    }

    pub fn validate_for_forecast(&self) -> Result<(), ConfigurationError> {
        let f = &self.forecast;
        if f.horizon_days == 0 {
            return Err(invalid("FORECAST_HORIZON_DAYS", "0", "horizon must be at least one day"));
        }
        if f.min_history_days == 0 {
            return Err(invalid("FORECAST_MIN_HISTORY_DAYS", "0", "must be at least one day"));
        }
        // History is only counted inside the training window.
        if f.min_history_days > f.training_window_days {
            return Err(ConfigurationError::Invalid {
                key: "FORECAST_MIN_HISTORY_DAYS",
                value: f.min_history_days.to_string(),
                reason: format!("longer than the training window ({})", f.training_window_days),
            });
        }
        if f.validation_days >= f.training_window_days {
            return Err(ConfigurationError::Invalid {
                key: "FORECAST_VALIDATION_DAYS",
                value: f.validation_days.to_string(),
                reason: format!("must be shorter than the training window ({})", f.training_window_days),
            });
        }
        if !(f.ridge_lambda.is_finite() && f.ridge_lambda >= 0.0) {
            return Err(ConfigurationError::Invalid {
                key: "FORECAST_RIDGE_LAMBDA",
                value: f.ridge_lambda.to_string(),
                reason: s!("must be a non-negative number"),
            });
        }
        Ok(())
    }
}

/* ---------- parsing helpers ---------- */

fn invalid(key: &'static str, value: &str, reason: &str) -> ConfigurationError {
    ConfigurationError::Invalid { key, value: s!(value), reason: s!(reason) }
}

pub fn str_to_bool(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "1" | "t" | "y")
}

pub fn parse_mode(value: &str) -> Result<ScrapeMode, ConfigurationError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "daily" => Ok(ScrapeMode::Daily),
        "backfill" => Ok(ScrapeMode::Backfill),
        _ => Err(invalid("SCRAPE_MODE", value, "expected daily or backfill")),
    }
}

pub fn parse_date(key: &'static str, value: &str) -> Result<NaiveDate, ConfigurationError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| invalid(key, value, &format!("expected YYYY-MM-DD: {e}")))
}

fn parse_date_list(key: &'static str, value: &str) -> Result<BTreeSet<NaiveDate>, ConfigurationError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse_date(key, s))
        .collect()
}

fn parse_num<T>(key: &'static str, value: &str) -> Result<T, ConfigurationError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| invalid(key, value, &e.to_string()))
}

pub fn parse_target(value: &str) -> Result<ForecastTarget, ConfigurationError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "quantity" | "qty" => Ok(ForecastTarget::Quantity),
        "revenue" => Ok(ForecastTarget::Revenue),
        _ => Err(invalid("FORECAST_TARGET", value, "expected quantity or revenue")),
    }
}

pub fn parse_gap_policy(value: &str) -> Result<GapPolicy, ConfigurationError> {
    match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
        "zero_fill" | "zero" => Ok(GapPolicy::ZeroFill),
        "exclude" => Ok(GapPolicy::Exclude),
        _ => Err(invalid("FORECAST_GAP_POLICY", value, "expected zero_fill or exclude")),
    }
}
