// src/config/consts.rs

// Portal
pub const PORTAL_BASE_URL: &str = "https://order.poya.com.tw";
pub const LOGIN_PATH: &str = "/LoginCom.aspx";
pub const QUERY_PATH: &str = "/SaleGenQueryAll.aspx";
pub const LOGIN_LANDING: &str = "Default.aspx";
pub const HTTP_TIMEOUT_SECS: u64 = 60;
pub const USER_AGENT: &str = concat!("sales_scrape/", env!("CARGO_PKG_VERSION"));

// Local store
pub const DEFAULT_STORE_FILE: &str = ".store/sales.csv";
pub const STORE_HEADERS: [&str; 4] = ["date", "identifier", "quantity", "revenue"];

// Retry
pub const RETRY_MAX_ATTEMPTS: u32 = 3;
pub const RETRY_BACKOFF_MS: u64 = 1_000;
pub const RETRY_MAX_BACKOFF_MS: u64 = 30_000;
pub const STORE_WRITE_ATTEMPTS: u32 = 2;

// Forecast
pub const FORECAST_HORIZON_DAYS: u32 = 30;
pub const TRAINING_WINDOW_DAYS: u32 = 365;
pub const FORECAST_MIN_HISTORY_DAYS: u32 = 30;
pub const FORECAST_VALIDATION_DAYS: u32 = 14;
pub const FORECAST_RIDGE_LAMBDA: f64 = 1.0;
pub const FEATURE_SET_VERSION: &str = "daily-v1";

// Order feed
pub const ORDERS_CHANNEL_ID: u32 = 170;
pub const ORDER_NO_FORMAT: &str = "poya%Y%m%d080000";

// Notifications
pub const TOP_IDENTIFIERS_IN_SUMMARY: usize = 5;
