// src/forecast/report.rs
//! Audit output of a forecast run: three small CSV sheets.

use std::io;
use std::path::{Path, PathBuf};

use super::engine::ForecastResult;
use super::features::FEATURE_NAMES;
use crate::csv::write_table;

pub const FORECAST_FILE: &str = "forecast.csv";
pub const REPORT_FILE: &str = "report.csv";
pub const DESCRIPTION_FILE: &str = "model_description.csv";

/// Write `forecast.csv`, `report.csv` and `model_description.csv` into `dir`.
pub fn write_audit(dir: &Path, result: &ForecastResult) -> io::Result<Vec<PathBuf>> {
    let forecast_rows: Vec<Vec<String>> = result
        .points
        .iter()
        .map(|p| vec![p.identifier.clone(), p.date.format("%Y-%m-%d").to_string(), format!("{:.2}", p.predicted)])
        .collect();

    let paths = [dir.join(FORECAST_FILE), dir.join(REPORT_FILE), dir.join(DESCRIPTION_FILE)];
    write_table(&paths[0], &["identifier", "date", "predicted"], &forecast_rows)?;
    write_table(&paths[1], &["metric", "value"], &report_rows(result))?;
    write_table(&paths[2], &["item", "description"], &description_rows(result))?;
    Ok(paths.to_vec())
}

fn report_rows(result: &ForecastResult) -> Vec<Vec<String>> {
    let m = &result.metadata;
    let mut rows = vec![
        vec![s!("model"), m.model.clone()],
        vec![s!("training_rows"), m.training_rows.to_string()],
        vec![s!("identifiers"), result.identifiers().to_string()],
        vec![s!("horizon_total"), format!("{:.2}", result.total())],
    ];
    if let Some(v) = &m.validation {
        rows.push(vec![s!("validation_start"), v.start.to_string()]);
        rows.push(vec![s!("validation_rows"), v.rows.to_string()]);
        rows.push(vec![s!("rmse"), format!("{:.4}", v.rmse)]);
        rows.push(vec![s!("mae"), format!("{:.4}", v.mae)]);
        rows.push(vec![s!("mape"), v.mape.map(|x| format!("{:.4}", x)).unwrap_or_default()]);
    }
    for (name, score) in &m.candidates {
        rows.push(vec![format!("rmse:{name}"), format!("{score:.4}")]);
    }
    rows
}

fn description_rows(result: &ForecastResult) -> Vec<Vec<String>> {
    let m = &result.metadata;
    let horizon = match (result.horizon.first(), result.horizon.last()) {
        (Some(a), Some(b)) => format!("{a} to {b} ({} days)", result.horizon.len()),
        _ => s!("empty"),
    };
    vec![
        vec![s!("model"), m.description.clone()],
        vec![s!("features"), format!("{} ({})", FEATURE_NAMES.join(", "), m.feature_set_version)],
        vec![s!("target"), s!(m.target.as_str())],
        vec![s!("gap policy"), s!(m.gap_policy.as_str())],
        vec![s!("training window"), format!("{} to {}", m.training_start, m.training_end)],
        vec![s!("horizon"), horizon],
        vec![s!("fallback"), format!("{} identifier(s) forecast from their 7-day level", m.fallback_identifiers)],
    ]
}
