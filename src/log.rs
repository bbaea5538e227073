// src/log.rs
//! Logging setup, powered by tracing-subscriber.
//!
//! Console output goes to stderr and honours `RUST_LOG` (default `info`,
//! with the HTTP stack quietened). When a log file is configured, the same
//! events are appended there without ANSI colours.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const DEFAULT_DIRECTIVES: &str = "info,reqwest=warn,hyper=warn,hyper_util=warn,rustls=warn";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}

/// Install the global subscriber. A second call is a no-op.
pub fn init(log_file: Option<&Path>) -> io::Result<()> {
    let console = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_filter(env_filter());

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(env_filter()),
            )
        }
        None => None,
    };

    // Already initialised (tests, repeated calls): keep the first subscriber.
    let _ = tracing_subscriber::registry().with(console).with(file_layer).try_init();
    Ok(())
}
