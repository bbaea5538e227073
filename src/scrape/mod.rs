// src/scrape/mod.rs
mod orchestrator;
mod retry;
mod source;

pub use orchestrator::{DateOutcome, Orchestrator, RunSummary, ScrapePlan, Stage};
pub use retry::{retry, Exhausted};
pub use source::{DocumentSource, FixtureSource, PortalSource};
