//! Numeric utilities shared by the forecasters.

pub mod metrics;
pub mod ols;
pub mod stats;

pub use metrics::{holdout_metrics, mape_percent, rmse, AccuracyMetrics};
pub use ols::{DesignMatrix, LeastSquaresFit};
pub use stats::{mean, median, quantile_normal, sample_std};
