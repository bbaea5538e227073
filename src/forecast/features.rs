// src/forecast/features.rs
//! Feature Builder: SalesRecord history → per-identifier daily series →
//! `FeatureRow`s.
//!
//! Every row, for training and for the horizon alike, comes out of
//! [`row_for`], which only ever looks at the slice of the series strictly
//! before the row's date.

use std::collections::{BTreeMap, BTreeSet};
use std::f64::consts::PI;

use chrono::{Datelike, Days, NaiveDate};

use crate::config::{ForecastTarget, GapPolicy};
use crate::model::SalesRecord;

pub const LAGS: [usize; 3] = [1, 7, 14];
pub const WINDOWS: [usize; 2] = [7, 28];

/// Days of prior history a row needs before it has every lag.
pub const MIN_PRIOR_DAYS: usize = LAGS[LAGS.len() - 1];

pub const FEATURE_NAMES: [&str; 17] = [
    "lag_1", "lag_7", "lag_14",
    "mean_7", "mean_28",
    "std_7", "std_28",
    "dow_mon", "dow_tue", "dow_wed", "dow_thu", "dow_fri", "dow_sat", "dow_sun",
    "month_sin", "month_cos",
    "holiday",
];

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Calendar {
    /// 0 = Monday.
    pub weekday: u32,
    pub month: u32,
    pub holiday: bool,
}

impl Calendar {
    pub fn of(date: NaiveDate, holidays: &BTreeSet<NaiveDate>) -> Self {
        Self {
            weekday: date.weekday().num_days_from_monday(),
            month: date.month(),
            holiday: holidays.contains(&date),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FeatureRow {
    pub date: NaiveDate,
    pub identifier: String,
    /// Values at `date - k` for each k in [`LAGS`].
    pub lags: [f64; 3],
    /// Means over the [`WINDOWS`] days before `date`.
    pub rolling_mean: [f64; 2],
    /// Population standard deviations over the same windows.
    pub rolling_std: [f64; 2],
    pub calendar: Calendar,
    /// Observed value at `date`; `None` for horizon rows.
    pub target: Option<f64>,
}

impl FeatureRow {
    /// Numeric feature vector in [`FEATURE_NAMES`] order.
    pub fn vector(&self) -> Vec<f64> {
        let mut v = Vec::with_capacity(FEATURE_NAMES.len());
        v.extend_from_slice(&self.lags);
        v.extend_from_slice(&self.rolling_mean);
        v.extend_from_slice(&self.rolling_std);
        for d in 0..7 {
            v.push(if self.calendar.weekday == d { 1.0 } else { 0.0 });
        }
        let angle = 2.0 * PI * (self.calendar.month as f64 - 1.0) / 12.0;
        v.push(angle.sin());
        v.push(angle.cos());
        v.push(if self.calendar.holiday { 1.0 } else { 0.0 });
        v
    }

    pub fn lag(&self, k: usize) -> Option<f64> {
        LAGS.iter().position(|l| *l == k).map(|i| self.lags[i])
    }

    pub fn mean(&self, window: usize) -> Option<f64> {
        WINDOWS.iter().position(|w| *w == window).map(|i| self.rolling_mean[i])
    }
}

/// One identifier's daily values, contiguous from `start`.
/// `None` marks a gap kept under [`GapPolicy::Exclude`].
#[derive(Clone, Debug, PartialEq)]
pub struct Series {
    pub identifier: String,
    pub start: NaiveDate,
    values: Vec<Option<f64>>,
}

impl Series {
    pub fn new(identifier: impl Into<String>, start: NaiveDate, values: Vec<Option<f64>>) -> Self {
        Self { identifier: identifier.into(), start, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Last covered date, or the day before `start` when empty.
    pub fn end(&self) -> NaiveDate {
        offset(self.start, self.values.len() as i64 - 1)
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take(self.values.len())
    }

    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        let i = (date - self.start).num_days();
        if i < 0 {
            return None;
        }
        self.values.get(i as usize).copied().flatten()
    }

    /// Append the value of the day after [`Series::end`].
    pub fn push(&mut self, value: f64) {
        self.values.push(Some(value));
    }

    /// Values strictly before `date`.
    fn prior(&self, date: NaiveDate) -> &[Option<f64>] {
        let i = (date - self.start).num_days().clamp(0, self.values.len() as i64);
        &self.values[..i as usize]
    }

    /// Mean of the last `window` known values, used when a full row cannot be built.
    pub fn recent_level(&self, window: usize) -> f64 {
        let tail: Vec<f64> = self.values.iter().rev().take(window).flatten().copied().collect();
        if tail.is_empty() { 0.0 } else { tail.iter().sum::<f64>() / tail.len() as f64 }
    }
}

fn offset(date: NaiveDate, days: i64) -> NaiveDate {
    if days >= 0 {
        date.checked_add_days(Days::new(days as u64)).unwrap_or(date)
    } else {
        date.checked_sub_days(Days::new(days.unsigned_abs())).unwrap_or(date)
    }
}

/// Inclusive training window ending at the last date in `records`.
pub fn training_window(records: &[SalesRecord], days: u32) -> Option<(NaiveDate, NaiveDate)> {
    let end = records.iter().map(|r| r.date).max()?;
    Some((offset(end, -(days.max(1) as i64 - 1)), end))
}

/// Distinct dates with at least one record inside `[start, end]`.
pub fn history_days(records: &[SalesRecord], start: NaiveDate, end: NaiveDate) -> usize {
    records
        .iter()
        .filter(|r| r.date >= start && r.date <= end)
        .map(|r| r.date)
        .collect::<BTreeSet<_>>()
        .len()
}

/// One series per identifier, from its first observation in the window up to
/// `end`. Missing days are filled per `gap`. A record without revenue counts as
/// missing when forecasting revenue.
pub fn build_series(
    records: &[SalesRecord],
    target: ForecastTarget,
    gap: GapPolicy,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<Series> {
    let mut by_id: BTreeMap<&str, BTreeMap<NaiveDate, f64>> = BTreeMap::new();
    for r in records.iter().filter(|r| r.date >= start && r.date <= end) {
        let value = match target {
            ForecastTarget::Quantity => Some(r.quantity),
            ForecastTarget::Revenue => r.revenue,
        };
        if let Some(v) = value {
            *by_id.entry(r.identifier.as_str()).or_default().entry(r.date).or_insert(0.0) += v;
        }
    }

    by_id
        .into_iter()
        .filter_map(|(id, days)| {
            let first = *days.keys().next()?;
            let values = first
                .iter_days()
                .take_while(|d| *d <= end)
                .map(|d| match (days.get(&d), gap) {
                    (Some(v), _) => Some(*v),
                    (None, GapPolicy::ZeroFill) => Some(0.0),
                    (None, GapPolicy::Exclude) => None,
                })
                .collect();
            Some(Series::new(id, first, values))
        })
        .collect()
}

/// Feature row for `date` from values strictly before it.
///
/// `None` when there are fewer than [`MIN_PRIOR_DAYS`] prior days, when a lag
/// lands on a gap, or when a rolling window holds no known value.
pub fn row_for(series: &Series, date: NaiveDate, holidays: &BTreeSet<NaiveDate>) -> Option<FeatureRow> {
    let prior = series.prior(date);
    if prior.len() < MIN_PRIOR_DAYS {
        return None;
    }

    let mut lags = [0.0; 3];
    for (slot, k) in lags.iter_mut().zip(LAGS) {
        *slot = prior[prior.len() - k]?;
    }

    let mut rolling_mean = [0.0; 2];
    let mut rolling_std = [0.0; 2];
    for (i, w) in WINDOWS.into_iter().enumerate() {
        let known: Vec<f64> = prior[prior.len().saturating_sub(w)..].iter().flatten().copied().collect();
        if known.is_empty() {
            return None;
        }
        let n = known.len() as f64;
        let mean = known.iter().sum::<f64>() / n;
        let var = known.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        rolling_mean[i] = mean;
        rolling_std[i] = var.sqrt();
    }

    Some(FeatureRow {
        date,
        identifier: series.identifier.clone(),
        lags,
        rolling_mean,
        rolling_std,
        calendar: Calendar::of(date, holidays),
        target: series.get(date),
    })
}

/// Every row of `series` with an observed target.
pub fn training_rows(series: &[Series], holidays: &BTreeSet<NaiveDate>) -> Vec<FeatureRow> {
    series
        .iter()
        .flat_map(|s| s.dates().filter_map(move |d| row_for(s, d, holidays)))
        .filter(|r| r.target.is_some())
        .collect()
}

/// Calendar attributes of each horizon date after `last`.
pub fn horizon_calendar(last: NaiveDate, days: u32, holidays: &BTreeSet<NaiveDate>) -> Vec<(NaiveDate, Calendar)> {
    (1..=days as i64)
        .map(|i| {
            let d = offset(last, i);
            (d, Calendar::of(d, holidays))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn daily(id: &str, start: NaiveDate, qty: &[f64]) -> Vec<SalesRecord> {
        qty.iter()
            .enumerate()
            .map(|(i, q)| SalesRecord::new(offset(start, i as i64), id, *q))
            .collect()
    }

    #[test]
    fn zero_fill_and_exclude_differ_only_on_gaps() {
        let d0 = ymd!(2024, 1, 1);
        let recs = vec![SalesRecord::new(d0, "A", 2.0), SalesRecord::new(ymd!(2024, 1, 3), "A", 4.0)];
        let zf = build_series(&recs, ForecastTarget::Quantity, GapPolicy::ZeroFill, d0, ymd!(2024, 1, 4));
        let ex = build_series(&recs, ForecastTarget::Quantity, GapPolicy::Exclude, d0, ymd!(2024, 1, 4));
        assert_eq!(zf[0].get(ymd!(2024, 1, 2)), Some(0.0));
        assert_eq!(ex[0].get(ymd!(2024, 1, 2)), None);
        assert_eq!(zf[0].end(), ymd!(2024, 1, 4));
        assert_eq!(ex[0].len(), 4);
    }

    #[test]
    fn revenue_target_skips_records_without_revenue() {
        let d = ymd!(2024, 1, 1);
        let recs = vec![SalesRecord::new(d, "A", 1.0), SalesRecord::new(d, "B", 1.0).with_revenue(50.0)];
        let s = build_series(&recs, ForecastTarget::Revenue, GapPolicy::ZeroFill, d, d);
        assert_eq!(s.len(), 1);
        assert_eq!(s[0].identifier, "B");
    }

    #[test]
    fn row_uses_only_prior_values() {
        let start = ymd!(2024, 1, 1);
        let qty: Vec<f64> = (1..=20).map(|v| v as f64).collect();
        let s = build_series(&daily("A", start, &qty), ForecastTarget::Quantity, GapPolicy::ZeroFill, start, ymd!(2024, 1, 20));
        let row = row_for(&s[0], ymd!(2024, 1, 16), &BTreeSet::new()).unwrap();
        assert_eq!(row.lag(1), Some(15.0));
        assert_eq!(row.lag(7), Some(9.0));
        assert_eq!(row.lag(14), Some(2.0));
        assert_eq!(row.mean(7), Some(12.0));
        // 15 prior values, 1..=15
        assert_eq!(row.mean(28), Some(8.0));
        assert_eq!(row.target, Some(16.0));
    }

    #[test]
    fn too_little_history_builds_no_row() {
        let start = ymd!(2024, 1, 1);
        let s = build_series(&daily("A", start, &[1.0; 10]), ForecastTarget::Quantity, GapPolicy::ZeroFill, start, ymd!(2024, 1, 10));
        assert!(row_for(&s[0], ymd!(2024, 1, 10), &BTreeSet::new()).is_none());
        assert!(training_rows(&s, &BTreeSet::new()).is_empty());
    }

    #[test]
    fn exclude_drops_rows_whose_lag_is_a_gap() {
        let start = ymd!(2024, 1, 1);
        let mut recs = daily("A", start, &[1.0; 20]);
        recs.retain(|r| r.date != ymd!(2024, 1, 15));
        let s = build_series(&recs, ForecastTarget::Quantity, GapPolicy::Exclude, start, ymd!(2024, 1, 20));
        assert!(row_for(&s[0], ymd!(2024, 1, 16), &BTreeSet::new()).is_none());
        assert!(row_for(&s[0], ymd!(2024, 1, 17), &BTreeSet::new()).is_some());
    }

    #[test]
    fn calendar_vector_layout() {
        let mut holidays = BTreeSet::new();
        holidays.insert(ymd!(2024, 1, 1));
        let start = ymd!(2023, 12, 1);
        let s = build_series(&daily("A", start, &[1.0; 40]), ForecastTarget::Quantity, GapPolicy::ZeroFill, start, ymd!(2024, 1, 9));
        let row = row_for(&s[0], ymd!(2024, 1, 1), &holidays).unwrap();
        let v = row.vector();
        assert_eq!(v.len(), FEATURE_NAMES.len());
        // 2024-01-01 is a Monday in January
        assert_eq!(v[7], 1.0);
        assert!((v[15] - 1.0).abs() < 1e-12);
        assert_eq!(v[16], 1.0);
        assert_eq!(row.rolling_std, [0.0, 0.0]);
    }

    #[test]
    fn horizon_dates_follow_last_day() {
        let h = horizon_calendar(ymd!(2024, 2, 28), 3, &BTreeSet::new());
        let dates: Vec<NaiveDate> = h.iter().map(|(d, _)| *d).collect();
        assert_eq!(dates, vec![ymd!(2024, 2, 29), ymd!(2024, 3, 1), ymd!(2024, 3, 2)]);
    }
}
