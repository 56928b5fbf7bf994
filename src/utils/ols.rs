//! Least squares on a named design matrix.
//!
//! Backs the seasonal regression forecaster: trend, Fourier seasonality and
//! exogenous-regressor effects are each fitted as a least squares problem.
//! Solves the normal equations with a Cholesky decomposition; a small ridge
//! jitter on the diagonal keeps near-collinear designs solvable.

use crate::error::{EngineError, Result};

/// A column-named design matrix with a fixed row count.
#[derive(Debug, Clone)]
pub struct DesignMatrix {
    rows: usize,
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl DesignMatrix {
    /// An empty design with `rows` observations and no columns yet.
    pub fn new(rows: usize) -> Self {
        Self {
            rows,
            names: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// Append a named column. The column length must equal the row count.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        if values.len() != self.rows {
            return Err(EngineError::DimensionMismatch {
                expected: self.rows,
                got: values.len(),
            });
        }
        self.names.push(name.into());
        self.columns.push(values);
        Ok(())
    }

    pub fn num_rows(&self) -> usize {
        self.rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    fn column(&self, name: &str) -> Option<&[f64]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.columns[i].as_slice())
    }
}

/// Fitted least squares coefficients, keyed by the design column names.
#[derive(Debug, Clone)]
pub struct LeastSquaresFit {
    intercept: f64,
    coefficients: Vec<f64>,
    names: Vec<String>,
}

impl LeastSquaresFit {
    /// Fit `y = intercept + X @ beta`.
    ///
    /// With an empty design the intercept is the mean of `y`.
    pub fn fit(y: &[f64], design: &DesignMatrix) -> Result<Self> {
        let n = y.len();
        if n == 0 {
            return Err(EngineError::EmptyData);
        }
        if design.num_rows() != n {
            return Err(EngineError::DimensionMismatch {
                expected: n,
                got: design.num_rows(),
            });
        }

        let k = design.num_columns();
        if k == 0 {
            return Ok(Self {
                intercept: y.iter().sum::<f64>() / n as f64,
                coefficients: vec![],
                names: vec![],
            });
        }

        // Normal equations over [1, x1, ..., xk].
        let p = k + 1;
        let mut xtx = vec![vec![0.0; p]; p];
        let mut xty = vec![0.0; p];

        for obs in 0..n {
            xtx[0][0] += 1.0;
            xty[0] += y[obs];
            for i in 0..k {
                let xi = design.columns[i][obs];
                xtx[0][i + 1] += xi;
                xtx[i + 1][0] += xi;
                xty[i + 1] += xi * y[obs];
                for j in 0..k {
                    xtx[i + 1][j + 1] += xi * design.columns[j][obs];
                }
            }
        }

        // Ridge jitter for numerical stability.
        for (i, row) in xtx.iter_mut().enumerate() {
            row[i] += 1e-8;
        }

        let beta = solve_cholesky(&xtx, &xty)
            .ok_or_else(|| EngineError::Computation("normal equations not solvable".into()))?;

        Ok(Self {
            intercept: beta[0],
            coefficients: beta[1..].to_vec(),
            names: design.names.clone(),
        })
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn coefficient(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.coefficients[i])
    }

    /// Predict for a design carrying the same column names (matched by
    /// name, not position).
    pub fn predict(&self, design: &DesignMatrix) -> Result<Vec<f64>> {
        let mut predictions = vec![self.intercept; design.num_rows()];
        for (name, &coef) in self.names.iter().zip(self.coefficients.iter()) {
            let column = design.column(name).ok_or_else(|| {
                EngineError::InvalidParameter(format!("missing design column '{name}'"))
            })?;
            for (pred, &x) in predictions.iter_mut().zip(column.iter()) {
                *pred += coef * x;
            }
        }
        Ok(predictions)
    }

    /// Residuals `y - y_hat` on the fitting design.
    pub fn residuals(&self, y: &[f64], design: &DesignMatrix) -> Result<Vec<f64>> {
        let predictions = self.predict(design)?;
        if predictions.len() != y.len() {
            return Err(EngineError::DimensionMismatch {
                expected: y.len(),
                got: predictions.len(),
            });
        }
        Ok(y.iter()
            .zip(predictions.iter())
            .map(|(yi, pi)| yi - pi)
            .collect())
    }
}

/// Solve `A @ x = b` for symmetric positive definite `A` via Cholesky.
fn solve_cholesky(a: &[Vec<f64>], b: &[f64]) -> Option<Vec<f64>> {
    let n = b.len();
    if n == 0 || a.len() != n {
        return None;
    }

    let mut l = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i][j];
            for k in 0..j {
                sum -= l[i][k] * l[j][k];
            }
            if i == j {
                if sum <= 0.0 {
                    return None;
                }
                l[i][j] = sum.sqrt();
            } else {
                l[i][j] = sum / l[j][j];
            }
        }
    }

    let mut y = vec![0.0; n];
    for i in 0..n {
        let mut sum = b[i];
        for j in 0..i {
            sum -= l[i][j] * y[j];
        }
        y[i] = sum / l[i][i];
    }

    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = y[i];
        for j in (i + 1)..n {
            sum -= l[j][i] * x[j];
        }
        x[i] = sum / l[i][i];
    }

    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn fits_simple_linear_relation() {
        // y = 2 + 3x
        let x = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let y: Vec<f64> = x.iter().map(|v| 2.0 + 3.0 * v).collect();

        let mut design = DesignMatrix::new(5);
        design.push_column("x", x).unwrap();

        let fit = LeastSquaresFit::fit(&y, &design).unwrap();
        assert_relative_eq!(fit.intercept(), 2.0, epsilon = 1e-6);
        assert_relative_eq!(fit.coefficient("x").unwrap(), 3.0, epsilon = 1e-6);
    }

    #[test]
    fn fits_multiple_columns() {
        // y = 1 + 2*x1 + 3*x2, non-collinear columns
        let x1 = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let x2 = vec![0.5, 2.5, 1.0, 3.0, 1.5, 3.5, 2.0, 4.0];
        let y: Vec<f64> = x1
            .iter()
            .zip(x2.iter())
            .map(|(a, b)| 1.0 + 2.0 * a + 3.0 * b)
            .collect();

        let mut design = DesignMatrix::new(8);
        design.push_column("x1", x1).unwrap();
        design.push_column("x2", x2).unwrap();

        let fit = LeastSquaresFit::fit(&y, &design).unwrap();
        assert_relative_eq!(fit.intercept(), 1.0, epsilon = 1e-4);
        assert_relative_eq!(fit.coefficient("x1").unwrap(), 2.0, epsilon = 1e-4);
        assert_relative_eq!(fit.coefficient("x2").unwrap(), 3.0, epsilon = 1e-4);
    }

    #[test]
    fn empty_design_returns_mean() {
        let y = vec![2.0, 4.0, 6.0];
        let fit = LeastSquaresFit::fit(&y, &DesignMatrix::new(3)).unwrap();
        assert_relative_eq!(fit.intercept(), 4.0, epsilon = 1e-10);
    }

    #[test]
    fn predicts_on_new_design_by_name() {
        let x = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let y: Vec<f64> = x.iter().map(|v| 2.0 + 3.0 * v).collect();
        let mut design = DesignMatrix::new(5);
        design.push_column("x", x).unwrap();
        let fit = LeastSquaresFit::fit(&y, &design).unwrap();

        let mut future = DesignMatrix::new(2);
        future.push_column("x", vec![6.0, 7.0]).unwrap();
        let predictions = fit.predict(&future).unwrap();
        assert_relative_eq!(predictions[0], 20.0, epsilon = 1e-6);
        assert_relative_eq!(predictions[1], 23.0, epsilon = 1e-6);
    }

    #[test]
    fn predict_fails_on_missing_column() {
        let mut design = DesignMatrix::new(3);
        design.push_column("x", vec![1.0, 2.0, 3.0]).unwrap();
        let fit = LeastSquaresFit::fit(&[5.0, 8.0, 11.0], &design).unwrap();

        let other = DesignMatrix::new(2);
        assert!(fit.predict(&other).is_err());
    }

    #[test]
    fn residuals_sum_to_zero() {
        let x = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let y = vec![5.1, 7.9, 11.2, 13.8, 17.0];
        let mut design = DesignMatrix::new(5);
        design.push_column("x", x).unwrap();
        let fit = LeastSquaresFit::fit(&y, &design).unwrap();

        let residuals = fit.residuals(&y, &design).unwrap();
        let sum: f64 = residuals.iter().sum();
        assert!(sum.abs() < 1e-5);
    }

    #[test]
    fn mismatched_column_length_is_rejected() {
        let mut design = DesignMatrix::new(3);
        assert!(design.push_column("x", vec![1.0, 2.0]).is_err());
    }
}
