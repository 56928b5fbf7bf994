//! Seasonal regression forecaster.
//!
//! A staged decomposition fitted per brand: a linear trend over time, a
//! multiplicative yearly/weekly Fourier seasonality on the detrended ratio,
//! and an additive least squares layer for exogenous regressors on what
//! remains. Uncertainty bounds come from the training residual spread under
//! a normal approximation.
//!
//! Exogenous regressors are admitted per brand: a column enters the model
//! only when its training split holds more than one distinct value, so
//! constant columns can never destabilize the fit.

use crate::core::{
    BrandOutcome, BrandSeries, DailySeries, ForecastRecord, MetricsRecord, COVARIATE_NAMES,
    NUM_COVARIATES,
};
use crate::error::{EngineError, Result};
use crate::models::{future_dates, BrandForecaster};
use crate::utils::metrics::holdout_metrics;
use crate::utils::ols::{DesignMatrix, LeastSquaresFit};
use crate::utils::stats::{quantile_normal, sample_std};
use std::collections::BTreeSet;
use tracing::debug;

/// Days per solar year, the yearly seasonality period.
const YEARLY_PERIOD: f64 = 365.25;
/// Days per week.
const WEEKLY_PERIOD: f64 = 7.0;
/// Minimum daily rows a brand needs before fitting is attempted.
const MIN_DAILY_ROWS: usize = 3;
/// Name of the popularity regressor column.
const TREND_SCORE: &str = "Trend_Score";

/// Tuning for [`SeasonalRegression`].
#[derive(Debug, Clone)]
pub struct SeasonalConfig {
    /// Number of yearly Fourier harmonics.
    pub yearly_order: usize,
    /// Number of weekly Fourier harmonics.
    pub weekly_order: usize,
    /// Fraction of the series used for training (chronological, floored).
    pub train_fraction: f64,
    /// Forward horizon in days.
    pub horizon: usize,
    /// Central coverage of the prediction interval, e.g. 0.95.
    pub interval_level: f64,
}

impl Default for SeasonalConfig {
    fn default() -> Self {
        Self {
            yearly_order: 10,
            weekly_order: 3,
            train_fraction: 0.8,
            horizon: crate::HORIZON_DAYS,
            interval_level: 0.95,
        }
    }
}

impl SeasonalConfig {
    fn validate(&self) -> Result<()> {
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
        if !(self.interval_level > 0.0 && self.interval_level < 1.0) {
            return Err(EngineError::InvalidParameter(format!(
                "interval_level must be in (0, 1), got {}",
                self.interval_level
            )));
        }
        Ok(())
    }
}

/// Trend + seasonality + exogenous-regressor forecaster with prediction
/// intervals.
#[derive(Debug, Clone, Default)]
pub struct SeasonalRegression {
    config: SeasonalConfig,
}

impl SeasonalRegression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SeasonalConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }
}

impl BrandForecaster for SeasonalRegression {
    fn name(&self) -> &'static str {
        "seasonal_regression"
    }

    fn forecast_brand(&self, series: &BrandSeries) -> Result<BrandOutcome> {
        let cfg = &self.config;
        let mut daily = series.daily()?;

        let dropped = daily.retain_finite_target();
        if dropped > 0 {
            debug!(
                brand = %daily.brand,
                dropped,
                "dropped rows with non-finite sales before fitting"
            );
        }

        let n = daily.len();
        if n < MIN_DAILY_ROWS {
            return Err(EngineError::InsufficientRows {
                needed: MIN_DAILY_ROWS,
                got: n,
            });
        }

        let split = daily.split_index(cfg.train_fraction);
        // The training split must at least determine the seasonal
        // coefficients plus trend slope and intercept, or the fit is
        // underdetermined.
        let min_train = 2 * (cfg.yearly_order + cfg.weekly_order) + 2;
        if split < min_train {
            return Err(EngineError::InsufficientRows {
                needed: min_train,
                got: split,
            });
        }
        if split >= n {
            return Err(EngineError::EmptyHoldout);
        }

        // Continuous time axis in days since the first observation, so
        // calendar gaps keep their true seasonal phase.
        let first = daily.dates[0];
        let taus: Vec<f64> = daily
            .dates
            .iter()
            .map(|d| (*d - first).num_days() as f64)
            .collect();

        let regressors = admitted_regressors(&daily, split);
        if regressors.is_empty() {
            return Err(EngineError::NoUsableRegressors);
        }
        debug!(
            brand = %daily.brand,
            admitted = regressors.len(),
            "admitted exogenous regressors"
        );
        for (_, column) in &regressors {
            if column[..split].iter().any(|v| !v.is_finite()) {
                return Err(EngineError::MissingValues);
            }
        }

        let model = SeasonalFit::fit(
            &daily.target[..split],
            &taus[..split],
            &regressors,
            split,
            cfg,
        )?;

        // Holdout accuracy in original units.
        let holdout_pred = model.predict(&taus[split..], &regressors, split, n - split)?;
        let metrics = holdout_metrics(&daily.target[split..], &holdout_pred)?;

        // Future regressors are forward-filled from the last observation.
        let dates = future_dates(
            daily.last_date().ok_or(EngineError::EmptyData)?,
            cfg.horizon,
        );
        let last_tau = taus[n - 1];
        let future_taus: Vec<f64> = (1..=cfg.horizon as i64)
            .map(|offset| last_tau + offset as f64)
            .collect();
        let frozen: Vec<(String, Vec<f64>)> = regressors
            .iter()
            .map(|(name, column)| (name.clone(), vec![column[n - 1]; cfg.horizon]))
            .collect();
        let predictions = model.predict(&future_taus, &frozen, 0, cfg.horizon)?;

        let z = quantile_normal(0.5 + cfg.interval_level / 2.0);
        let spread = z * model.residual_std;
        let forecasts = dates
            .into_iter()
            .zip(predictions)
            .map(|(date, predicted_sales)| ForecastRecord {
                date,
                brand: daily.brand.clone(),
                predicted_sales,
                lower: Some(predicted_sales - spread),
                upper: Some(predicted_sales + spread),
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

/// The three fitted stages plus the training residual spread.
struct SeasonalFit {
    trend: LeastSquaresFit,
    seasonal: LeastSquaresFit,
    exogenous: LeastSquaresFit,
    yearly_order: usize,
    weekly_order: usize,
    residual_std: f64,
}

impl SeasonalFit {
    fn fit(
        y: &[f64],
        taus: &[f64],
        regressors: &[(String, Vec<f64>)],
        split: usize,
        cfg: &SeasonalConfig,
    ) -> Result<Self> {
        // Stage 1: linear trend over time.
        let mut trend_design = DesignMatrix::new(split);
        trend_design.push_column("tau", taus.to_vec())?;
        let trend = LeastSquaresFit::fit(y, &trend_design)?;
        let trend_values = trend.predict(&trend_design)?;

        // Stage 2: multiplicative seasonality on the detrended ratio.
        let ratio: Vec<f64> = y
            .iter()
            .zip(trend_values.iter())
            .map(|(yi, ti)| if ti.abs() > 1e-8 { yi / ti - 1.0 } else { 0.0 })
            .collect();
        let seasonal_design = fourier_design(taus, cfg.yearly_order, cfg.weekly_order)?;
        let seasonal = LeastSquaresFit::fit(&ratio, &seasonal_design)?;
        let seasonal_values = seasonal.predict(&seasonal_design)?;

        // Stage 3: exogenous regressors on the remaining residual.
        let base: Vec<f64> = trend_values
            .iter()
            .zip(seasonal_values.iter())
            .map(|(t, s)| t * (1.0 + s))
            .collect();
        let residual: Vec<f64> = y.iter().zip(base.iter()).map(|(yi, bi)| yi - bi).collect();
        let mut exo_design = DesignMatrix::new(split);
        for (name, column) in regressors {
            exo_design.push_column(name.clone(), column[..split].to_vec())?;
        }
        let exogenous = LeastSquaresFit::fit(&residual, &exo_design)?;

        let final_residuals = exogenous.residuals(&residual, &exo_design)?;
        let residual_std = sample_std(&final_residuals);

        Ok(Self {
            trend,
            seasonal,
            exogenous,
            yearly_order: cfg.yearly_order,
            weekly_order: cfg.weekly_order,
            residual_std,
        })
    }

    /// Predict `count` values. Regressor columns are indexed starting at
    /// `offset`, so holdout prediction can slice the observed columns while
    /// future prediction passes frozen ones with offset zero.
    fn predict(
        &self,
        taus: &[f64],
        regressors: &[(String, Vec<f64>)],
        offset: usize,
        count: usize,
    ) -> Result<Vec<f64>> {
        if taus.len() != count {
            return Err(EngineError::DimensionMismatch {
                expected: count,
                got: taus.len(),
            });
        }

        let mut trend_design = DesignMatrix::new(count);
        trend_design.push_column("tau", taus.to_vec())?;
        let trend_values = self.trend.predict(&trend_design)?;

        let seasonal_design = fourier_design(taus, self.yearly_order, self.weekly_order)?;
        let seasonal_values = self.seasonal.predict(&seasonal_design)?;

        let mut exo_design = DesignMatrix::new(count);
        for (name, column) in regressors {
            exo_design.push_column(name.clone(), column[offset..offset + count].to_vec())?;
        }
        let exo_values = self.exogenous.predict(&exo_design)?;

        Ok(trend_values
            .iter()
            .zip(seasonal_values.iter())
            .zip(exo_values.iter())
            .map(|((t, s), e)| t * (1.0 + s) + e)
            .collect())
    }
}

/// Sin/cos harmonic columns for the yearly and weekly periods.
fn fourier_design(taus: &[f64], yearly_order: usize, weekly_order: usize) -> Result<DesignMatrix> {
    let mut design = DesignMatrix::new(taus.len());
    let mut push_harmonics = |prefix: &str, period: f64, order: usize| -> Result<()> {
        for k in 1..=order {
            let omega = 2.0 * std::f64::consts::PI * k as f64 / period;
            design.push_column(
                format!("{prefix}_sin_{k}"),
                taus.iter().map(|t| (omega * t).sin()).collect(),
            )?;
            design.push_column(
                format!("{prefix}_cos_{k}"),
                taus.iter().map(|t| (omega * t).cos()).collect(),
            )?;
        }
        Ok(())
    };
    push_harmonics("yearly", YEARLY_PERIOD, yearly_order)?;
    push_harmonics("weekly", WEEKLY_PERIOD, weekly_order)?;
    Ok(design)
}

/// Candidate regressors whose training split carries more than one distinct
/// finite value: the popularity score plus every covariate column.
fn admitted_regressors(daily: &DailySeries, split: usize) -> Vec<(String, Vec<f64>)> {
    let mut admitted = Vec::new();

    let mut consider = |name: &str, column: Vec<f64>| {
        let distinct: BTreeSet<u64> = column[..split]
            .iter()
            .filter(|v| v.is_finite())
            .map(|v| v.to_bits())
            .collect();
        if distinct.len() > 1 {
            admitted.push((name.to_string(), column));
        }
    };

    consider(TREND_SCORE, daily.popularity.clone());
    for index in 0..NUM_COVARIATES {
        consider(COVARIATE_NAMES[index], daily.covariate_column(index));
    }

    admitted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ProcessedRow, ProcessedTable};
    use chrono::NaiveDate;

    fn make_table(days: usize, sales: impl Fn(usize) -> f64) -> ProcessedTable {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let rows = (0..days)
            .map(|d| {
                let mut covariates = [0.5; NUM_COVARIATES];
                covariates[0] = 0.5 + 0.01 * d as f64; // varying competitor price
                ProcessedRow {
                    date: start + chrono::Duration::days(d as i64),
                    category: "Snacks".into(),
                    brand: "Acme".into(),
                    total_sales: sales(d),
                    quantity_sold: 1.0,
                    online_popularity: 50.0 + (d % 7) as f64,
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

    fn weekly_series(d: usize) -> f64 {
        let weekly = 1.0 + 0.2 * (2.0 * std::f64::consts::PI * d as f64 / 7.0).sin();
        (100.0 + 0.5 * d as f64) * weekly
    }

    #[test]
    fn emits_a_full_future_horizon() {
        let table = make_table(90, weekly_series);
        let model = SeasonalRegression::new();
        let outcome = model.forecast_brand(&table.brand_series("Acme")).unwrap();

        assert_eq!(outcome.forecasts.len(), crate::HORIZON_DAYS);
        let last_observed = NaiveDate::from_ymd_opt(2024, 3, 30).unwrap();
        assert_eq!(
            outcome.forecasts[0].date,
            last_observed + chrono::Duration::days(1)
        );
        for pair in outcome.forecasts.windows(2) {
            assert_eq!((pair[1].date - pair[0].date).num_days(), 1);
        }
    }

    #[test]
    fn bounds_bracket_the_point_forecast() {
        let table = make_table(90, weekly_series);
        let model = SeasonalRegression::new();
        let outcome = model.forecast_brand(&table.brand_series("Acme")).unwrap();

        for record in &outcome.forecasts {
            let lower = record.lower.unwrap();
            let upper = record.upper.unwrap();
            assert!(lower <= record.predicted_sales);
            assert!(record.predicted_sales <= upper);
        }
    }

    #[test]
    fn recovers_an_upward_trend() {
        let table = make_table(90, |d| 100.0 + 2.0 * d as f64);
        let model = SeasonalRegression::new();
        let outcome = model.forecast_brand(&table.brand_series("Acme")).unwrap();

        // The series grows by 2/day; the horizon mean must sit well above
        // the last training values.
        let horizon_mean: f64 = outcome
            .forecasts
            .iter()
            .map(|f| f.predicted_sales)
            .sum::<f64>()
            / outcome.forecasts.len() as f64;
        assert!(horizon_mean > 250.0, "horizon mean {horizon_mean}");
        assert!(outcome.metrics.rmse.is_finite());
        assert!(outcome.metrics.mape_percent < 25.0);
    }

    #[test]
    fn short_series_is_skipped() {
        let table = make_table(2, |d| 10.0 * d as f64);
        let model = SeasonalRegression::new();
        let err = model
            .forecast_brand(&table.brand_series("Acme"))
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::InsufficientRows {
                needed: MIN_DAILY_ROWS,
                got: 2
            }
        );
    }

    #[test]
    fn five_rows_cannot_determine_the_seasonal_fit() {
        let table = make_table(5, weekly_series);
        let model = SeasonalRegression::new();
        let err = model
            .forecast_brand(&table.brand_series("Acme"))
            .unwrap_err();
        // floor(5 * 0.8) = 4 training rows against 28 needed.
        assert_eq!(err, EngineError::InsufficientRows { needed: 28, got: 4 });
    }

    #[test]
    fn all_constant_regressors_is_skipped() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let rows = (0..60)
            .map(|d| ProcessedRow {
                date: start + chrono::Duration::days(d as i64),
                category: "Snacks".into(),
                brand: "Acme".into(),
                total_sales: weekly_series(d),
                quantity_sold: 1.0,
                online_popularity: 50.0,
                covariates: [0.5; NUM_COVARIATES],
                sales_lag_1: 0.0,
                sales_ma_3: 0.0,
                category_code: 0,
                brand_code: 0,
                region_code: 0,
            })
            .collect();
        let table = ProcessedTable::new(rows);

        let model = SeasonalRegression::new();
        let err = model
            .forecast_brand(&table.brand_series("Acme"))
            .unwrap_err();
        assert_eq!(err, EngineError::NoUsableRegressors);
    }

    #[test]
    fn all_nan_sales_is_skipped() {
        let table = make_table(30, |_| f64::NAN);
        let model = SeasonalRegression::new();
        let err = model
            .forecast_brand(&table.brand_series("Acme"))
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::InsufficientRows {
                needed: MIN_DAILY_ROWS,
                got: 0
            }
        );
    }

    #[test]
    fn constant_columns_are_never_admitted() {
        let table = make_table(40, weekly_series);
        let daily = table.brand_series("Acme").daily().unwrap();
        let admitted = admitted_regressors(&daily, 32);

        let names: Vec<&str> = admitted.iter().map(|(n, _)| n.as_str()).collect();
        // Popularity and competitor price vary; the other covariates are
        // constant 0.5 and must stay out.
        assert!(names.contains(&TREND_SCORE));
        assert!(names.contains(&"Competitor_Price"));
        assert!(!names.contains(&"Stock_Level"));
        assert!(!names.contains(&"Is_Holiday"));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = SeasonalConfig {
            train_fraction: 1.5,
            ..SeasonalConfig::default()
        };
        assert!(SeasonalRegression::with_config(config).is_err());

        let config = SeasonalConfig {
            horizon: 0,
            ..SeasonalConfig::default()
        };
        assert!(SeasonalRegression::with_config(config).is_err());
    }
}
