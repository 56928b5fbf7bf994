//! Recurrent sequence forecaster.
//!
//! Trains a per-brand LSTM on sliding windows of a scaled multivariate
//! feature matrix, scores the chronological holdout in scaled space, then
//! rolls the window forward recursively for the forecast horizon. During
//! the rollout every non-target feature stays frozen at the brand's last
//! observed row; only the predicted target feeds back into the window.

pub mod lstm;

pub use lstm::LstmNetwork;

use crate::core::{
    BrandOutcome, BrandSeries, DailySeries, ForecastRecord, MetricsRecord, NUM_RATE_COVARIATES,
};
use crate::error::{EngineError, Result};
use crate::models::{future_dates, BrandForecaster};
use crate::transform::MinMaxScaler;
use crate::utils::metrics::holdout_metrics;
use tracing::debug;

/// Feature layout: target, popularity, the rate covariates, holiday flag.
pub const SEQUENCE_FEATURES: usize = NUM_RATE_COVARIATES + 3;
/// Column index of the sales target within a feature row.
const TARGET_COLUMN: usize = 0;
/// Covariate schema index of the holiday flag.
const HOLIDAY_COVARIATE: usize = 10;

/// Tuning for [`SequenceForecaster`].
#[derive(Debug, Clone)]
pub struct SequenceConfig {
    /// Sliding window length in days.
    pub window: usize,
    /// Hidden state width per layer.
    pub hidden_dim: usize,
    /// Number of stacked LSTM layers.
    pub num_layers: usize,
    /// Training epochs (full batch).
    pub epochs: usize,
    pub learning_rate: f64,
    /// Fraction of window samples used for training (chronological,
    /// floored).
    pub train_fraction: f64,
    /// Minimum number of window samples a brand must yield.
    pub min_samples: usize,
    /// Forward horizon in days.
    pub horizon: usize,
    /// Weight initialization seed; fixed per run so parallel brand order
    /// never changes the output.
    pub seed: u64,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            window: 7,
            hidden_dim: 64,
            num_layers: 2,
            epochs: 80,
            learning_rate: 1e-3,
            train_fraction: 0.8,
            min_samples: 20,
            horizon: crate::HORIZON_DAYS,
            seed: 42,
        }
    }
}

impl SequenceConfig {
    fn validate(&self) -> Result<()> {
        if self.window == 0 {
            return Err(EngineError::InvalidParameter(
                "window must be at least 1".into(),
            ));
        }
        if self.hidden_dim == 0 || self.num_layers == 0 {
            return Err(EngineError::InvalidParameter(
                "network dimensions must all be at least 1".into(),
            ));
        }
        if !(self.train_fraction > 0.0 && self.train_fraction < 1.0) {
            return Err(EngineError::InvalidParameter(format!(
                "train_fraction must be in (0, 1), got {}",
                self.train_fraction
            )));
        }
        if self.horizon == 0 {
            return Err(EngineError::InvalidParameter(
                "horizon must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// LSTM-based brand forecaster.
///
/// Holdout metrics are reported in scaled space: errors are comparable
/// across brands but not in sales units, unlike the seasonal model's.
#[derive(Debug, Clone, Default)]
pub struct SequenceForecaster {
    config: SequenceConfig,
}

impl SequenceForecaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SequenceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }
}

impl BrandForecaster for SequenceForecaster {
    fn name(&self) -> &'static str {
        "sequence_lstm"
    }

    fn forecast_brand(&self, series: &BrandSeries) -> Result<BrandOutcome> {
        let cfg = &self.config;
        let mut daily = series.daily()?;

        let dropped = daily.retain_finite_target();
        if dropped > 0 {
            debug!(
                brand = %daily.brand,
                dropped,
                "dropped rows with non-finite sales before windowing"
            );
        }

        let n = daily.len();
        if n < cfg.window + 1 {
            return Err(EngineError::InsufficientRows {
                needed: cfg.window + 1,
                got: n,
            });
        }

        let matrix = feature_matrix(&daily);
        if matrix
            .iter()
            .any(|row| row.iter().any(|v| !v.is_finite()))
        {
            return Err(EngineError::MissingValues);
        }

        // Scaler is fitted on the brand's full history, matching the
        // training regime the windows are drawn from.
        let scaler = MinMaxScaler::fit(&matrix)?;
        let scaled = scaler.transform(&matrix)?;

        let num_samples = n - cfg.window;
        if num_samples < cfg.min_samples {
            return Err(EngineError::InsufficientSamples {
                needed: cfg.min_samples,
                got: num_samples,
            });
        }

        let windows: Vec<Vec<Vec<f64>>> = (0..num_samples)
            .map(|i| scaled[i..i + cfg.window].to_vec())
            .collect();
        let labels: Vec<f64> = (0..num_samples)
            .map(|i| scaled[i + cfg.window][TARGET_COLUMN])
            .collect();

        let split = (num_samples as f64 * cfg.train_fraction).floor() as usize;
        if split == 0 {
            return Err(EngineError::InsufficientSamples {
                needed: 1,
                got: 0,
            });
        }
        if split >= num_samples {
            return Err(EngineError::EmptyHoldout);
        }

        let mut network =
            LstmNetwork::new(SEQUENCE_FEATURES, cfg.hidden_dim, cfg.num_layers, cfg.seed)?;
        let final_loss = network.fit(
            &windows[..split],
            &labels[..split],
            cfg.epochs,
            cfg.learning_rate,
        )?;
        debug!(
            brand = %daily.brand,
            train_samples = split,
            final_loss,
            "trained sequence model"
        );

        let holdout_pred: Vec<f64> = windows[split..]
            .iter()
            .map(|w| network.predict(w))
            .collect::<Result<_>>()?;
        let metrics = holdout_metrics(&labels[split..], &holdout_pred)?;

        // Recursive rollout. The template row freezes every feature except
        // the target at the last observed values.
        let template = scaled[n - 1].clone();
        let mut window: Vec<Vec<f64>> = scaled[n - cfg.window..].to_vec();
        let mut scaled_predictions = Vec::with_capacity(cfg.horizon);
        for _ in 0..cfg.horizon {
            let prediction = network.predict(&window)?;
            scaled_predictions.push(prediction);
            let mut next = template.clone();
            next[TARGET_COLUMN] = prediction;
            window.remove(0);
            window.push(next);
        }

        let dates = future_dates(
            daily.last_date().ok_or(EngineError::EmptyData)?,
            cfg.horizon,
        );
        let forecasts = dates
            .into_iter()
            .zip(scaled_predictions)
            .map(|(date, scaled_value)| ForecastRecord {
                date,
                brand: daily.brand.clone(),
                predicted_sales: scaler.inverse_value(TARGET_COLUMN, scaled_value),
                lower: None,
                upper: None,
            })
            .collect();

        Ok(BrandOutcome {
            forecasts,
            metrics: MetricsRecord {
                brand: daily.brand.clone(),
                rmse: metrics.rmse,
                mape_percent: metrics.mape_percent,
            },
        })
    }
}

/// Row-major feature matrix in the fixed sequence layout.
fn feature_matrix(daily: &DailySeries) -> Vec<Vec<f64>> {
    (0..daily.len())
        .map(|i| {
            let mut row = Vec::with_capacity(SEQUENCE_FEATURES);
            row.push(daily.target[i]);
            row.push(daily.popularity[i]);
            for c in 0..NUM_RATE_COVARIATES {
                row.push(daily.covariates[i][c]);
            }
            row.push(daily.covariates[i][HOLIDAY_COVARIATE]);
            row
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ProcessedRow, ProcessedTable, NUM_COVARIATES};
    use chrono::NaiveDate;

    fn make_table(days: usize, sales: impl Fn(usize) -> f64) -> ProcessedTable {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let rows = (0..days)
            .map(|d| {
                let mut covariates = [0.3; NUM_COVARIATES];
                covariates[0] = 0.3 + 0.02 * d as f64;
                ProcessedRow {
                    date: start + chrono::Duration::days(d as i64),
                    category: "Snacks".into(),
                    brand: "Acme".into(),
                    total_sales: sales(d),
                    quantity_sold: 1.0,
                    online_popularity: 40.0 + (d % 5) as f64,
                    covariates,
                    sales_lag_1: 0.0,
                    sales_ma_3: 0.0,
                    category_code: 0,
                    brand_code: 0,
                    region_code: 0,
                }
            })
            .collect();
        ProcessedTable::new(rows)
    }

    fn fast_config() -> SequenceConfig {
        SequenceConfig {
            window: 3,
            hidden_dim: 6,
            num_layers: 2,
            epochs: 20,
            min_samples: 5,
            horizon: 10,
            ..SequenceConfig::default()
        }
    }

    #[test]
    fn emits_a_full_future_horizon() {
        let table = make_table(40, |d| 100.0 + 3.0 * d as f64);
        let model = SequenceForecaster::with_config(fast_config()).unwrap();
        let outcome = model.forecast_brand(&table.brand_series("Acme")).unwrap();

        assert_eq!(outcome.forecasts.len(), 10);
        let last_observed = NaiveDate::from_ymd_opt(2024, 2, 9).unwrap();
        assert_eq!(
            outcome.forecasts[0].date,
            last_observed + chrono::Duration::days(1)
        );
        for pair in outcome.forecasts.windows(2) {
            assert_eq!((pair[1].date - pair[0].date).num_days(), 1);
        }
        for record in &outcome.forecasts {
            assert!(record.predicted_sales.is_finite());
            assert!(record.lower.is_none());
            assert!(record.upper.is_none());
        }
        assert!(outcome.metrics.rmse.is_finite());
    }

    #[test]
    fn same_seed_is_deterministic() {
        let table = make_table(40, |d| 100.0 + 3.0 * d as f64);
        let series = table.brand_series("Acme");
        let model = SequenceForecaster::with_config(fast_config()).unwrap();

        let a = model.forecast_brand(&series).unwrap();
        let b = model.forecast_brand(&series).unwrap();
        assert_eq!(a.forecasts, b.forecasts);
        assert_eq!(a.metrics, b.metrics);
    }

    #[test]
    fn short_series_is_skipped() {
        let table = make_table(5, |d| d as f64);
        let model = SequenceForecaster::new();
        let err = model
            .forecast_brand(&table.brand_series("Acme"))
            .unwrap_err();
        assert_eq!(err, EngineError::InsufficientRows { needed: 8, got: 5 });
    }

    #[test]
    fn too_few_windows_is_skipped() {
        // 12 rows clear the window guard but yield only 5 samples with the
        // default 20-sample minimum.
        let table = make_table(12, |d| d as f64);
        let model = SequenceForecaster::new();
        let err = model
            .forecast_brand(&table.brand_series("Acme"))
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::InsufficientSamples { needed: 20, got: 5 }
        );
    }

    #[test]
    fn feature_matrix_has_fixed_layout() {
        let table = make_table(10, |d| d as f64);
        let daily = table.brand_series("Acme").daily().unwrap();
        let matrix = feature_matrix(&daily);

        assert_eq!(matrix.len(), 10);
        assert_eq!(matrix[0].len(), SEQUENCE_FEATURES);
        assert_eq!(matrix[3][TARGET_COLUMN], 3.0);
        assert_eq!(matrix[3][1], daily.popularity[3]);
        assert_eq!(matrix[3][SEQUENCE_FEATURES - 1], 0.3); // holiday flag
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = SequenceConfig {
            window: 0,
            ..SequenceConfig::default()
        };
        assert!(SequenceForecaster::with_config(config).is_err());

        let config = SequenceConfig {
            train_fraction: 0.0,
            ..SequenceConfig::default()
        };
        assert!(SequenceForecaster::with_config(config).is_err());
    }
}
