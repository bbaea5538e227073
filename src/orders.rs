// src/orders.rs
//! Downstream order feed. After a date is stored, its positive quantities are
//! posted as one order so the ordering system can restock.
//!
//! ```json
//! {"data": {"channel_id": 170, "channel_order_no": "poya20240301080000",
//!           "orders": [{"barcode": "4710001", "sales_qty": 3}],
//!           "timestamp": "2024-03-02T06:00:01.123456"}}
//! ```

use std::time::Duration;

use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::info;

use crate::config::consts::{HTTP_TIMEOUT_SECS, ORDER_NO_FORMAT, USER_AGENT};
use crate::config::OrdersOptions;
use crate::error::OrderFeedError;
use crate::model::SalesRecord;

pub trait OrderSink {
    /// Post one date's sales. Returns the number of order lines sent;
    /// zero means nothing worth posting and no request was made.
    fn post_day(&self, date: NaiveDate, records: &[SalesRecord]) -> Result<usize, OrderFeedError>;
}

#[derive(Debug, Serialize, PartialEq)]
pub struct OrderLine {
    pub barcode: String,
    pub sales_qty: i64,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct OrderBody {
    pub channel_id: u32,
    pub channel_order_no: String,
    pub orders: Vec<OrderLine>,
    pub timestamp: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct OrderPayload {
    pub data: OrderBody,
}

/// Build the payload for `date`, or `None` when no record has a positive quantity.
pub fn build_payload(
    channel_id: u32,
    date: NaiveDate,
    records: &[SalesRecord],
    now: NaiveDateTime,
) -> Option<OrderPayload> {
    let orders: Vec<OrderLine> = records
        .iter()
        .filter(|r| r.quantity > 0.0)
        .map(|r| OrderLine { barcode: r.identifier.clone(), sales_qty: r.quantity.round() as i64 })
        .collect();
    if orders.is_empty() {
        return None;
    }
    Some(OrderPayload {
        data: OrderBody {
            channel_id,
            channel_order_no: date.format(ORDER_NO_FORMAT).to_string(),
            orders,
            timestamp: now.format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
        },
    })
}

pub struct HttpOrderFeed {
    client: reqwest::blocking::Client,
    opts: OrdersOptions,
}

impl HttpOrderFeed {
    pub fn new(opts: OrdersOptions) -> Result<Self, OrderFeedError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| OrderFeedError::Transport(e.to_string()))?;
        Ok(Self { client, opts })
    }
}

impl OrderSink for HttpOrderFeed {
    fn post_day(&self, date: NaiveDate, records: &[SalesRecord]) -> Result<usize, OrderFeedError> {
        let Some(payload) = build_payload(self.opts.channel_id, date, records, Local::now().naive_local()) else {
            info!(%date, "no positive quantities; order feed not called");
            return Ok(0);
        };
        let lines = payload.data.orders.len();
        info!(%date, lines, "posting orders");

        let resp = self
            .client
            .post(&self.opts.endpoint)
            .json(&payload)
            .send()
            .map_err(|e| OrderFeedError::Transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(OrderFeedError::Status { status: status.as_u16(), body });
        }
        Ok(lines)
    }
}
