// src/scrape/source.rs
//! Where documents come from. The orchestrator only sees [`DocumentSource`];
//! the live portal and cached fixture pages are interchangeable behind it.

use std::fs;
use std::io;
use std::path::PathBuf;

use chrono::NaiveDate;
use tracing::debug;

use crate::config::PortalCredentials;
use crate::core::net::PortalSession;
use crate::error::FetchError;

pub trait DocumentSource {
    /// Short label for logs.
    fn name(&self) -> &str;

    /// Raw page content holding the sales of `date`.
    fn fetch(&mut self, date: NaiveDate) -> Result<String, FetchError>;
}

/// Live retailer portal.
pub struct PortalSource {
    session: PortalSession,
}

impl PortalSource {
    pub fn new(creds: PortalCredentials) -> Result<Self, FetchError> {
        Ok(Self { session: PortalSession::new(creds)? })
    }
}

impl DocumentSource for PortalSource {
    fn name(&self) -> &str {
        "portal"
    }

    fn fetch(&mut self, date: NaiveDate) -> Result<String, FetchError> {
        let res = self.session.query_day(date);
        if let Err(e) = &res {
            if e.is_transient() {
                // ASP.NET sessions go stale after errors; log in again next attempt.
                self.session.reset();
            }
        }
        res
    }
}

/// Cached pages on disk, one `YYYY-MM-DD.html` per date.
pub struct FixtureSource {
    dir: PathBuf,
}

impl FixtureSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.html", date.format("%Y-%m-%d")))
    }
}

impl DocumentSource for FixtureSource {
    fn name(&self) -> &str {
        "fixtures"
    }

    fn fetch(&mut self, date: NaiveDate) -> Result<String, FetchError> {
        let path = self.path_for(date);
        debug!(path = %path.display(), "reading fixture");
        match fs::read(&path) {
            Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(FetchError::NotFound(date)),
            Err(e) => Err(FetchError::Transient(format!("{}: {e}", path.display()))),
        }
    }
}
