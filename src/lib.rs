// src/lib.rs
#[macro_use]
pub mod macros;

pub mod cli;
pub mod config;
pub mod core;
pub mod csv;
pub mod error;
pub mod forecast;
pub mod log;
pub mod model;
pub mod notify;
pub mod orders;
pub mod progress;
pub mod runner;
pub mod scrape;
pub mod specs;
pub mod store;
