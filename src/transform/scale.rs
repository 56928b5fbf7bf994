//! Scaling transforms.
//!
//! Two distinct scalers live here on purpose. Preprocessing standardizes
//! covariates globally across all brands (z-score with an epsilon-padded
//! denominator), while the sequence forecaster min-max scales each brand's
//! feature matrix in isolation. The asymmetry is part of the behavioral
//! contract and must not be unified.

use crate::error::{EngineError, Result};
use crate::utils::stats::{mean, sample_std};

/// Z-score a column in place: `(x - mean) / (std + epsilon)`.
///
/// The epsilon keeps constant columns finite (they collapse to zero).
/// NaN entries pass through untouched so later guards can see them.
pub fn standardize_with_epsilon(values: &mut [f64], epsilon: f64) {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return;
    }
    let m = mean(&finite);
    let denom = sample_std(&finite) + epsilon;
    for v in values.iter_mut() {
        if v.is_finite() {
            *v = (*v - m) / denom;
        }
    }
}

/// Column-wise min-max scaler over a multi-feature matrix, fitted on one
/// brand's full history. Constant columns scale to zero and invert back to
/// their constant value.
#[derive(Debug, Clone)]
pub struct MinMaxScaler {
    mins: Vec<f64>,
    ranges: Vec<f64>,
}

impl MinMaxScaler {
    /// Fit on a row-major matrix (`rows x features`).
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self> {
        let first = rows.first().ok_or(EngineError::EmptyData)?;
        let width = first.len();
        if width == 0 {
            return Err(EngineError::EmptyData);
        }

        let mut mins = vec![f64::INFINITY; width];
        let mut maxs = vec![f64::NEG_INFINITY; width];
        for row in rows {
            if row.len() != width {
                return Err(EngineError::DimensionMismatch {
                    expected: width,
                    got: row.len(),
                });
            }
            for (j, &v) in row.iter().enumerate() {
                mins[j] = mins[j].min(v);
                maxs[j] = maxs[j].max(v);
            }
        }

        let ranges = mins
            .iter()
            .zip(maxs.iter())
            .map(|(&lo, &hi)| {
                let range = hi - lo;
                if range.abs() < 1e-12 {
                    1.0
                } else {
                    range
                }
            })
            .collect();

        Ok(Self { mins, ranges })
    }

    pub fn num_features(&self) -> usize {
        self.mins.len()
    }

    /// Scale a full matrix into [0, 1] per column.
    pub fn transform(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        rows.iter().map(|row| self.transform_row(row)).collect()
    }

    /// Scale a single row.
    pub fn transform_row(&self, row: &[f64]) -> Result<Vec<f64>> {
        if row.len() != self.mins.len() {
            return Err(EngineError::DimensionMismatch {
                expected: self.mins.len(),
                got: row.len(),
            });
        }
        Ok(row
            .iter()
            .enumerate()
            .map(|(j, &v)| (v - self.mins[j]) / self.ranges[j])
            .collect())
    }

    /// Invert a full matrix back to the original scale.
    pub fn inverse_transform(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        rows.iter().map(|row| self.inverse_row(row)).collect()
    }

    /// Invert a single row.
    pub fn inverse_row(&self, row: &[f64]) -> Result<Vec<f64>> {
        if row.len() != self.mins.len() {
            return Err(EngineError::DimensionMismatch {
                expected: self.mins.len(),
                got: row.len(),
            });
        }
        Ok(row
            .iter()
            .enumerate()
            .map(|(j, &v)| v * self.ranges[j] + self.mins[j])
            .collect())
    }

    /// Invert only the given column of a scaled value.
    pub fn inverse_value(&self, column: usize, value: f64) -> f64 {
        value * self.ranges[column] + self.mins[column]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn standardize_zero_mean() {
        let mut values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        standardize_with_epsilon(&mut values, 1e-6);
        let m: f64 = values.iter().sum::<f64>() / values.len() as f64;
        assert_relative_eq!(m, 0.0, epsilon = 1e-10);
    }

    #[test]
    fn standardize_constant_column_collapses_to_zero() {
        let mut values = vec![7.0; 5];
        standardize_with_epsilon(&mut values, 1e-6);
        for v in &values {
            assert_relative_eq!(*v, 0.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn standardize_keeps_nans() {
        let mut values = vec![1.0, f64::NAN, 3.0];
        standardize_with_epsilon(&mut values, 1e-6);
        assert!(values[1].is_nan());
        assert!(values[0].is_finite());
    }

    #[test]
    fn minmax_scales_to_unit_interval() {
        let rows = vec![vec![0.0, 10.0], vec![50.0, 20.0], vec![100.0, 30.0]];
        let scaler = MinMaxScaler::fit(&rows).unwrap();
        let scaled = scaler.transform(&rows).unwrap();

        assert_relative_eq!(scaled[0][0], 0.0, epsilon = 1e-10);
        assert_relative_eq!(scaled[1][0], 0.5, epsilon = 1e-10);
        assert_relative_eq!(scaled[2][0], 1.0, epsilon = 1e-10);
        assert_relative_eq!(scaled[0][1], 0.0, epsilon = 1e-10);
        assert_relative_eq!(scaled[2][1], 1.0, epsilon = 1e-10);
    }

    #[test]
    fn minmax_round_trip_recovers_values() {
        let rows = vec![vec![3.0, -2.0, 7.5], vec![9.0, 4.0, 7.5], vec![6.0, 1.0, 7.5]];
        let scaler = MinMaxScaler::fit(&rows).unwrap();
        let scaled = scaler.transform(&rows).unwrap();
        let recovered = scaler.inverse_transform(&scaled).unwrap();

        for (orig, rec) in rows.iter().zip(recovered.iter()) {
            for (a, b) in orig.iter().zip(rec.iter()) {
                assert_relative_eq!(a, b, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn minmax_constant_column_is_stable() {
        let rows = vec![vec![5.0], vec![5.0], vec![5.0]];
        let scaler = MinMaxScaler::fit(&rows).unwrap();
        let scaled = scaler.transform(&rows).unwrap();
        assert_relative_eq!(scaled[1][0], 0.0, epsilon = 1e-10);
        assert_relative_eq!(scaler.inverse_value(0, 0.0), 5.0, epsilon = 1e-10);
    }

    #[test]
    fn minmax_rejects_ragged_rows() {
        let rows = vec![vec![1.0, 2.0], vec![3.0]];
        assert!(MinMaxScaler::fit(&rows).is_err());

        let scaler = MinMaxScaler::fit(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert!(scaler.transform_row(&[1.0]).is_err());
        assert!(scaler.inverse_row(&[1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn minmax_rejects_empty_input() {
        assert!(MinMaxScaler::fit(&[]).is_err());
    }
}
