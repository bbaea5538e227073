// src/forecast/model.rs
//! Candidate regressors. All of them read the same [`FeatureRow`]s.

use super::features::{FeatureRow, FEATURE_NAMES};

pub trait Regressor {
    fn name(&self) -> String;

    /// Fit on rows with an observed target. Rows without one are ignored.
    fn fit(&mut self, rows: &[&FeatureRow]);

    /// Raw prediction; callers clamp.
    fn predict(&self, row: &FeatureRow) -> f64;

    /// One line for the audit sheet.
    fn describe(&self) -> String;
}

/// Baseline weights over (last value, 7-day mean, 28-day mean).
pub const BASELINE_WEIGHTS: [(f64, f64, f64); 6] = [
    (0.5, 0.3, 0.2),
    (0.6, 0.2, 0.2),
    (0.4, 0.4, 0.2),
    (0.3, 0.3, 0.4),
    (0.7, 0.2, 0.1),
    (0.1, 0.1, 0.8),
];

/// Ridge first, so it wins ties.
pub fn candidates(ridge_lambda: f64) -> Vec<Box<dyn Regressor>> {
    let mut v: Vec<Box<dyn Regressor>> = vec![Box::new(Ridge::new(ridge_lambda))];
    v.extend(BASELINE_WEIGHTS.iter().map(|w| Box::new(WeightedAverage::new(*w)) as Box<dyn Regressor>));
    v
}

#[derive(Clone, Debug, PartialEq)]
pub struct WeightedAverage {
    pub weights: (f64, f64, f64),
}

impl WeightedAverage {
    pub fn new(weights: (f64, f64, f64)) -> Self {
        Self { weights }
    }
}

impl Regressor for WeightedAverage {
    fn name(&self) -> String {
        let (a, b, c) = self.weights;
        format!("weighted_average({a:.1},{b:.1},{c:.1})")
    }

    fn fit(&mut self, _rows: &[&FeatureRow]) {}

    fn predict(&self, row: &FeatureRow) -> f64 {
        let (a, b, c) = self.weights;
        a * row.lags[0] + b * row.rolling_mean[0] + c * row.rolling_mean[1]
    }

    fn describe(&self) -> String {
        let (a, b, c) = self.weights;
        format!(
            "weighted moving average: {:.0}% previous day, {:.0}% 7-day mean, {:.0}% 28-day mean",
            a * 100.0,
            b * 100.0,
            c * 100.0
        )
    }
}

/// L2-regularised least squares on standardised features. The intercept is
/// the target mean and is not penalised.
#[derive(Clone, Debug, PartialEq)]
pub struct Ridge {
    pub lambda: f64,
    means: Vec<f64>,
    scales: Vec<f64>,
    weights: Vec<f64>,
    intercept: f64,
}

impl Ridge {
    pub fn new(lambda: f64) -> Self {
        Self { lambda, means: Vec::new(), scales: Vec::new(), weights: Vec::new(), intercept: 0.0 }
    }

    /// Features with the largest standardised weights, largest first.
    pub fn strongest(&self, n: usize) -> Vec<(&'static str, f64)> {
        let mut v: Vec<(&'static str, f64)> = FEATURE_NAMES
            .iter()
            .zip(&self.weights)
            .filter(|(_, w)| w.abs() > 1e-9)
            .map(|(name, w)| (*name, *w))
            .collect();
        v.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
        v.truncate(n);
        v
    }
}

impl Regressor for Ridge {
    fn name(&self) -> String {
        format!("ridge(lambda={})", self.lambda)
    }

    fn fit(&mut self, rows: &[&FeatureRow]) {
        let data: Vec<(Vec<f64>, f64)> = rows.iter().filter_map(|r| Some((r.vector(), r.target?))).collect();
        let p = FEATURE_NAMES.len();
        self.means = vec![0.0; p];
        self.scales = vec![1.0; p];
        self.weights = vec![0.0; p];
        self.intercept = 0.0;
        if data.is_empty() {
            return;
        }

        let n = data.len() as f64;
        for (x, _) in &data {
            for j in 0..p {
                self.means[j] += x[j] / n;
            }
        }
        for j in 0..p {
            let var = data.iter().map(|(x, _)| (x[j] - self.means[j]).powi(2)).sum::<f64>() / n;
            // Constant columns standardise to zero and drop out.
            self.scales[j] = if var > 1e-12 { var.sqrt() } else { 1.0 };
        }
        self.intercept = data.iter().map(|(_, y)| y).sum::<f64>() / n;

        let z: Vec<Vec<f64>> = data
            .iter()
            .map(|(x, _)| (0..p).map(|j| (x[j] - self.means[j]) / self.scales[j]).collect())
            .collect();

        // Normal equations: (ZᵀZ + λI) w = Zᵀ(y - ȳ)
        let mut a = vec![vec![0.0; p]; p];
        let mut b = vec![0.0; p];
        for (zi, (_, y)) in z.iter().zip(&data) {
            let yc = y - self.intercept;
            for j in 0..p {
                b[j] += zi[j] * yc;
                for k in j..p {
                    a[j][k] += zi[j] * zi[k];
                }
            }
        }
        for j in 0..p {
            for k in 0..j {
                a[j][k] = a[k][j];
            }
            a[j][j] += self.lambda + 1e-9;
        }
        self.weights = solve(a, b);
    }

    fn predict(&self, row: &FeatureRow) -> f64 {
        if self.weights.is_empty() {
            return self.intercept;
        }
        row.vector()
            .iter()
            .enumerate()
            .map(|(j, x)| (x - self.means[j]) / self.scales[j] * self.weights[j])
            .sum::<f64>()
            + self.intercept
    }

    fn describe(&self) -> String {
        let base = format!("ridge regression on {} standardised features, lambda {}", FEATURE_NAMES.len(), self.lambda);
        let top = self.strongest(3);
        if top.is_empty() {
            return base;
        }
        let list: Vec<String> = top.iter().map(|(name, w)| format!("{name} {w:+.3}")).collect();
        format!("{base}; strongest: {}", list.join(", "))
    }
}

/// Gaussian elimination with partial pivoting. Near-singular pivots give a zero weight.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Vec<f64> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        a.swap(col, pivot);
        b.swap(col, pivot);
        let d = a[col][col];
        if d.abs() < 1e-12 {
            continue;
        }
        for row in col + 1..n {
            let f = a[row][col] / d;
            if f == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= f * a[col][k];
            }
            b[row] -= f * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let d = a[row][row];
        if d.abs() < 1e-12 {
            continue;
        }
        let s: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - s) / d;
    }
    x
}
