//! Forecasting models.
//!
//! Both strategies implement [`BrandForecaster`] over the same per-brand
//! input contract, so the orchestration layer can run either one without
//! knowing which model family it holds.

pub mod recurrent;
pub mod seasonal;

use crate::core::{BrandOutcome, BrandSeries};
use crate::error::Result;
use chrono::{Duration, NaiveDate};

/// A model that forecasts one brand at a time.
///
/// Implementations must be `Sync`: the engine fans brands out across a
/// thread pool and shares one forecaster between workers.
pub trait BrandForecaster: Sync {
    /// Short model name, used in logs.
    fn name(&self) -> &'static str;

    /// Forecast a single brand. Errors are per-brand skips, never fatal.
    fn forecast_brand(&self, series: &BrandSeries) -> Result<BrandOutcome>;
}

/// The `horizon` consecutive dates strictly after `last`.
pub fn future_dates(last: NaiveDate, horizon: usize) -> Vec<NaiveDate> {
    (1..=horizon as i64)
        .map(|offset| last + Duration::days(offset))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn future_dates_start_the_day_after() {
        let last = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        let dates = future_dates(last, 3);
        assert_eq!(dates[0], NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());
        assert_eq!(dates[2], NaiveDate::from_ymd_opt(2024, 4, 3).unwrap());
    }

    #[test]
    fn future_dates_are_gap_free() {
        let last = NaiveDate::from_ymd_opt(2024, 2, 27).unwrap();
        let dates = future_dates(last, 5);
        assert_eq!(dates.len(), 5);
        for pair in dates.windows(2) {
            assert_eq!((pair[1] - pair[0]).num_days(), 1);
        }
    }
}
