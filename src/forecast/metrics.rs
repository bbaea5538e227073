// src/forecast/metrics.rs

/// Root mean squared error. 0 for empty input.
pub fn rmse(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len().min(predicted.len());
    if n == 0 {
        return 0.0;
    }
    let sse: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).powi(2)).sum();
    (sse / n as f64).sqrt()
}

pub fn mae(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len().min(predicted.len());
    if n == 0 {
        return 0.0;
    }
    actual.iter().zip(predicted).map(|(a, p)| (a - p).abs()).sum::<f64>() / n as f64
}

/// Mean absolute percentage error over non-zero actuals, as a fraction.
/// `None` when every actual is zero.
pub fn mape(actual: &[f64], predicted: &[f64]) -> Option<f64> {
    let errs: Vec<f64> = actual
        .iter()
        .zip(predicted)
        .filter(|(a, _)| **a != 0.0)
        .map(|(a, p)| ((a - p) / a).abs())
        .collect();
    if errs.is_empty() {
        return None;
    }
    Some(errs.iter().sum::<f64>() / errs.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_errors() {
        let a = [1.0, 2.0, 0.0, 4.0];
        let p = [1.0, 4.0, 1.0, 2.0];
        assert!((rmse(&a, &p) - (9.0f64 / 4.0).sqrt()).abs() < 1e-12);
        assert!((mae(&a, &p) - 1.25).abs() < 1e-12);
        // zero actual is skipped: (0 + 1 + 0.5) / 3
        assert!((mape(&a, &p).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn mape_undefined_on_all_zero() {
        assert_eq!(mape(&[0.0, 0.0], &[1.0, 2.0]), None);
        assert_eq!(rmse(&[], &[]), 0.0);
    }
}
