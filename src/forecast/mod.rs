// src/forecast/mod.rs
//! Forecast pipeline: stored history → features → model selection → horizon.
//! Nothing here touches the network or the store; the runner feeds records in.

pub mod engine;
pub mod features;
pub mod metrics;
pub mod model;
pub mod report;

pub use engine::{ForecastEngine, ForecastPoint, ForecastResult, ModelMetadata, Validation};
pub use features::{row_for, FeatureRow, Series};
pub use model::{Regressor, Ridge, WeightedAverage};
