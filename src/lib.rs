//! # brandcast
//!
//! Per-brand daily sales forecasting engine.
//!
//! Takes a raw per-transaction sales table, builds an aggregated feature
//! table with one row per (category, brand, date), and runs two independent
//! modeling strategies over every brand:
//!
//! - [`models::seasonal::SeasonalRegression`] — additive trend with
//!   multiplicative yearly/weekly seasonality plus exogenous regressors,
//!   projected 30 days forward with uncertainty bounds.
//! - [`models::recurrent::SequenceForecaster`] — a 2-layer LSTM over
//!   fixed-length feature windows, rolled forward recursively for 30 days.
//!
//! Both forecasters share the same per-brand data contract and emit a
//! forecast table and a metrics table keyed by brand. Brands are mutually
//! independent: one brand's failure is logged and skipped, never aborting
//! the run.

pub mod core;
pub mod engine;
pub mod error;
pub mod io;
pub mod models;
pub mod preprocess;
pub mod transform;
pub mod trend;
pub mod utils;

pub use error::{EngineError, Result};

/// Forward horizon, in days, shared by both forecasters.
pub const HORIZON_DAYS: usize = 30;

pub mod prelude {
    pub use crate::core::{
        BrandSeries, ForecastRecord, MetricsRecord, ProcessedTable, RawRecord, RunOutcome,
    };
    pub use crate::engine::{run_forecaster, EngineReport};
    pub use crate::error::{EngineError, Result};
    pub use crate::models::recurrent::SequenceForecaster;
    pub use crate::models::seasonal::SeasonalRegression;
    pub use crate::models::BrandForecaster;
    pub use crate::preprocess::preprocess;
    pub use crate::HORIZON_DAYS;
}
