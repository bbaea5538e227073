// src/error.rs
//! Error taxonomy shared by both pipelines.
//!
//! Per-date errors (`FetchError`, `StoreWriteError`) are isolated by the
//! orchestrator and never abort a multi-date run. Structural errors
//! (`ExtractionError`, `ConfigurationError`, a rejected portal login) abort
//! the run, since continuing would silently produce wrong data.

use chrono::NaiveDate;

/// The portal page could not be understood at all (layout changed).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    #[error("unrecognized document layout for {date}: {detail}")]
    UnrecognizedLayout { date: NaiveDate, detail: String },
}

/// Fetching a document for one date failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Network hiccup, timeout, HTTP 429/5xx. Retried.
    #[error("transient fetch failure: {0}")]
    Transient(String),

    /// Unexpected HTTP status that retrying will not fix.
    #[error("fetch failed with HTTP {status}: {url}")]
    Status { status: u16, url: String },

    /// Cached fixture missing for the requested date.
    #[error("no cached document for {0}")]
    NotFound(NaiveDate),

    /// Portal refused the credentials. Fatal to the run.
    #[error("portal login rejected: {0}")]
    LoginRejected(String),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }

    /// Errors that say nothing about a single date but about the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FetchError::LoginRejected(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreWriteError {
    #[error("store write failed at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("store rejected batch for {date}: {reason}")]
    Rejected { date: NaiveDate, reason: String },

    #[error(transparent)]
    Read(#[from] StoreReadError),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreReadError {
    #[error("store unreadable at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed store row {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("insufficient history: {available} day(s) available, {required} required")]
pub struct InsufficientDataError {
    pub available: usize,
    pub required: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("missing required configuration: {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport failed: {0}")]
    Transport(String),

    #[error("notification endpoint answered HTTP {0}")]
    Status(u16),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderFeedError {
    #[error("order feed transport failed: {0}")]
    Transport(String),

    #[error("order feed answered HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

/// Errors that end a pipeline run with a non-zero exit.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    StoreRead(#[from] StoreReadError),

    #[error("could not write output: {0}")]
    Output(#[from] std::io::Error),
}
