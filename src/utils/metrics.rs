//! Holdout accuracy metrics.

use crate::error::{EngineError, Result};

/// Accuracy on a holdout split. Both values are always non-negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccuracyMetrics {
    /// Root mean squared error.
    pub rmse: f64,
    /// Mean absolute percentage error, in percent.
    pub mape_percent: f64,
}

/// RMSE between actual and predicted values. NaN on length mismatch or
/// empty input.
pub fn rmse(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() || actual.len() != predicted.len() {
        return f64::NAN;
    }
    let mse = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).powi(2))
        .sum::<f64>()
        / actual.len() as f64;
    mse.sqrt()
}

/// MAPE in percent. Each term divides by `max(|actual|, eps)` so zero
/// actuals yield a large-but-finite error instead of infinity.
pub fn mape_percent(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() || actual.len() != predicted.len() {
        return f64::NAN;
    }
    let sum: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).abs() / a.abs().max(f64::EPSILON))
        .sum();
    100.0 * sum / actual.len() as f64
}

/// Both holdout metrics at once, with dimension checks.
pub fn holdout_metrics(actual: &[f64], predicted: &[f64]) -> Result<AccuracyMetrics> {
    if actual.is_empty() || predicted.is_empty() {
        return Err(EngineError::EmptyData);
    }
    if actual.len() != predicted.len() {
        return Err(EngineError::DimensionMismatch {
            expected: actual.len(),
            got: predicted.len(),
        });
    }

    Ok(AccuracyMetrics {
        rmse: rmse(actual, predicted),
        mape_percent: mape_percent(actual, predicted),
    })
}
