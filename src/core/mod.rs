//! Core data structures: raw observations, the processed feature table,
//! per-brand series views, and the engine's output records.

mod observation;
mod outputs;
mod table;

pub use observation::{covariate_index, RawRecord, COVARIATE_NAMES, NUM_COVARIATES, NUM_RATE_COVARIATES};
pub use outputs::{BrandOutcome, ForecastRecord, MetricsRecord, RunOutcome};
pub use table::{BrandSeries, DailySeries, ProcessedRow, ProcessedTable};
