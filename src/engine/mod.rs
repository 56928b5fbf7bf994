//! Run orchestration: fan brands out over a thread pool, run one
//! forecaster per brand, and fold the results back together.
//!
//! Brands are mutually independent. A brand that fails is logged and
//! recorded as skipped; only a missing-input error aborts the run. Results
//! are merged in sorted brand order so the output is stable regardless of
//! worker scheduling.

use crate::core::{BrandOutcome, ForecastRecord, MetricsRecord, ProcessedTable, RunOutcome};
use crate::error::{EngineError, Result};
use crate::models::BrandForecaster;
use rayon::prelude::*;
use tracing::{info, warn};

/// Everything one forecaster run produces across all brands.
#[derive(Debug, Clone)]
pub struct EngineReport {
    pub forecasts: Vec<ForecastRecord>,
    pub metrics: Vec<MetricsRecord>,
    /// Brands that were skipped, with the reason. Absence from `metrics`
    /// always corresponds to presence here.
    pub skipped: Vec<(String, EngineError)>,
    pub outcome: RunOutcome,
}

/// Run one forecaster over every brand in the table.
pub fn run_forecaster<F: BrandForecaster>(
    table: &ProcessedTable,
    forecaster: &F,
) -> Result<EngineReport> {
    let brands = table.brands();
    if brands.is_empty() {
        info!(model = forecaster.name(), "no brands to forecast");
        return Ok(EngineReport {
            forecasts: Vec::new(),
            metrics: Vec::new(),
            skipped: Vec::new(),
            outcome: RunOutcome::Empty,
        });
    }

    info!(
        model = forecaster.name(),
        brands = brands.len(),
        "starting forecast run"
    );

    // collect() preserves the sorted brand order of the input.
    let results: Vec<(String, Result<BrandOutcome>)> = brands
        .par_iter()
        .map(|brand| {
            let series = table.brand_series(brand);
            (brand.clone(), forecaster.forecast_brand(&series))
        })
        .collect();

    let mut report = EngineReport {
        forecasts: Vec::new(),
        metrics: Vec::new(),
        skipped: Vec::new(),
        outcome: RunOutcome::Empty,
    };
    let mut forecasted = 0usize;

    for (brand, result) in results {
        match result {
            Ok(outcome) => {
                report.forecasts.extend(outcome.forecasts);
                report.metrics.push(outcome.metrics);
                forecasted += 1;
            }
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!(model = forecaster.name(), brand = %brand, error = %err, "skipping brand");
                report.skipped.push((brand, err));
            }
        }
    }

    report.outcome = if forecasted == 0 {
        RunOutcome::Empty
    } else {
        RunOutcome::Forecasted(forecasted)
    };
    info!(
        model = forecaster.name(),
        forecasted,
        skipped = report.skipped.len(),
        "forecast run finished"
    );
    Ok(report)
}
