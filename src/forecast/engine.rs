// src/forecast/engine.rs
use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use tracing::{debug, info};

use super::features::{
    build_series, history_days, horizon_calendar, row_for, training_rows, training_window, FeatureRow, Series,
    MIN_PRIOR_DAYS, WINDOWS,
};
use super::metrics::{mae, mape, rmse};
use super::model::{candidates, Regressor};
use crate::config::consts::FEATURE_SET_VERSION;
use crate::config::{ForecastOptions, ForecastTarget, GapPolicy};
use crate::error::InsufficientDataError;
use crate::model::SalesRecord;

#[derive(Clone, Debug, PartialEq)]
pub struct ForecastPoint {
    pub identifier: String,
    pub date: NaiveDate,
    /// Never negative.
    pub predicted: f64,
}

/// Scores of the trailing validation window.
#[derive(Clone, Debug, PartialEq)]
pub struct Validation {
    pub start: NaiveDate,
    pub days: u32,
    pub rows: usize,
    pub rmse: f64,
    pub mae: f64,
    pub mape: Option<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModelMetadata {
    pub model: String,
    pub description: String,
    pub training_start: NaiveDate,
    pub training_end: NaiveDate,
    pub feature_set_version: &'static str,
    pub target: ForecastTarget,
    pub gap_policy: GapPolicy,
    pub training_rows: usize,
    /// `None` when the window was too short to hold out any rows.
    pub validation: Option<Validation>,
    /// Validation RMSE of every candidate, in evaluation order.
    pub candidates: Vec<(String, f64)>,
    /// Identifiers forecast from their recent level for lack of a full feature row.
    pub fallback_identifiers: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ForecastResult {
    pub horizon: Vec<NaiveDate>,
    pub points: Vec<ForecastPoint>,
    pub metadata: ModelMetadata,
}

impl ForecastResult {
    pub fn identifiers(&self) -> usize {
        self.totals_by_identifier().len()
    }

    pub fn totals_by_identifier(&self) -> BTreeMap<&str, f64> {
        let mut m: BTreeMap<&str, f64> = BTreeMap::new();
        for p in &self.points {
            *m.entry(p.identifier.as_str()).or_insert(0.0) += p.predicted;
        }
        m
    }

    /// Largest forecast totals over the horizon, largest first.
    pub fn top_identifiers(&self, n: usize) -> Vec<(&str, f64)> {
        let mut v: Vec<(&str, f64)> = self.totals_by_identifier().into_iter().collect();
        v.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        v.truncate(n);
        v
    }

    pub fn total(&self) -> f64 {
        self.points.iter().map(|p| p.predicted).sum()
    }
}

pub struct ForecastEngine {
    opts: ForecastOptions,
}

impl ForecastEngine {
    pub fn new(opts: ForecastOptions) -> Self {
        Self { opts }
    }

    /// Train, validate, select, refit and forecast the horizon.
    pub fn run(&self, records: &[SalesRecord]) -> Result<ForecastResult, InsufficientDataError> {
        let required = self.opts.min_history_days as usize;
        let Some((start, end)) = training_window(records, self.opts.training_window_days) else {
            return Err(InsufficientDataError { available: 0, required });
        };
        let available = history_days(records, start, end);
        if available < required {
            return Err(InsufficientDataError { available, required });
        }

        let series = build_series(records, self.opts.target, self.opts.gap_policy, start, end);
        let rows = training_rows(&series, &self.opts.holidays);
        if rows.is_empty() {
            return Err(InsufficientDataError { available, required: required.max(MIN_PRIOR_DAYS + 1) });
        }
        info!(%start, %end, series = series.len(), rows = rows.len(), "training window ready");

        let (best, validation, scores) = self.select(&rows, end);
        let mut model = best;
        let all: Vec<&FeatureRow> = rows.iter().collect();
        model.fit(&all);
        info!(model = %model.name(), "refit on full training window");

        let (horizon, points, fallback) = self.forecast_horizon(model.as_ref(), &series, end);

        Ok(ForecastResult {
            horizon,
            points,
            metadata: ModelMetadata {
                model: model.name(),
                description: model.describe(),
                training_start: start,
                training_end: end,
                feature_set_version: FEATURE_SET_VERSION,
                target: self.opts.target,
                gap_policy: self.opts.gap_policy,
                training_rows: rows.len(),
                validation,
                candidates: scores,
                fallback_identifiers: fallback,
            },
        })
    }

    /// Fit every candidate on rows before the validation window and keep the
    /// lowest RMSE. Without a usable split the first candidate is kept unscored.
    fn select(
        &self,
        rows: &[FeatureRow],
        end: NaiveDate,
    ) -> (Box<dyn Regressor>, Option<Validation>, Vec<(String, f64)>) {
        let mut pool = candidates(self.opts.ridge_lambda);
        let days = self.opts.validation_days;
        let val_start = end
            .checked_sub_days(Days::new(days.saturating_sub(1) as u64))
            .unwrap_or(end);

        let train: Vec<&FeatureRow> = rows.iter().filter(|r| r.date < val_start).collect();
        let held: Vec<&FeatureRow> = rows.iter().filter(|r| r.date >= val_start).collect();
        if days == 0 || train.is_empty() || held.is_empty() {
            debug!(days, train = train.len(), held = held.len(), "no validation split; keeping default model");
            return (pool.remove(0), None, Vec::new());
        }

        let actual: Vec<f64> = held.iter().filter_map(|r| r.target).collect();
        let mut scores = Vec::with_capacity(pool.len());
        let mut best: Option<(usize, f64, Vec<f64>)> = None;
        for (i, m) in pool.iter_mut().enumerate() {
            m.fit(&train);
            let pred: Vec<f64> = held.iter().map(|r| m.predict(r).max(0.0)).collect();
            let score = rmse(&actual, &pred);
            debug!(model = %m.name(), rmse = score, "validated");
            scores.push((m.name(), score));
            if best.as_ref().is_none_or(|(_, s, _)| score < *s) {
                best = Some((i, score, pred));
            }
        }

        let Some((i, score, pred)) = best else {
            return (pool.remove(0), None, scores);
        };
        let validation = Validation {
            start: val_start,
            days,
            rows: held.len(),
            rmse: score,
            mae: mae(&actual, &pred),
            mape: mape(&actual, &pred),
        };
        info!(model = %scores[i].0, rmse = score, "selected model");
        (pool.swap_remove(i), Some(validation), scores)
    }

    /// Recursive multi-step forecast: each predicted day is appended to the
    /// series before the next day's row is built.
    fn forecast_horizon(
        &self,
        model: &dyn Regressor,
        series: &[Series],
        end: NaiveDate,
    ) -> (Vec<NaiveDate>, Vec<ForecastPoint>, usize) {
        let horizon: Vec<NaiveDate> = horizon_calendar(end, self.opts.horizon_days, &self.opts.holidays)
            .into_iter()
            .map(|(d, _)| d)
            .collect();

        let mut points = Vec::with_capacity(horizon.len() * series.len());
        let mut fallback = 0;
        for s in series {
            let mut s = s.clone();
            let mut used_fallback = false;
            for &date in &horizon {
                let raw = match row_for(&s, date, &self.opts.holidays) {
                    Some(row) => model.predict(&row),
                    None => {
                        used_fallback = true;
                        s.recent_level(WINDOWS[0])
                    }
                };
                let predicted = if raw.is_finite() { raw.max(0.0) } else { 0.0 };
                s.push(predicted);
                points.push(ForecastPoint { identifier: s.identifier.clone(), date, predicted });
            }
            if used_fallback {
                fallback += 1;
            }
        }
        (horizon, points, fallback)
    }
}
