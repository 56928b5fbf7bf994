//! Error types for the brandcast engine.
//!
//! Only [`EngineError::MissingInput`] is fatal to a run; every other
//! variant is recoverable at the per-brand level and makes the
//! orchestration loop log the brand as skipped and continue.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur while preparing data or forecasting a brand.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Required input file/table is absent. Fatal: nothing can run without
    /// source data.
    #[error("missing input: {0}")]
    MissingInput(String),

    /// Input table or per-brand series is empty.
    #[error("empty input data")]
    EmptyData,

    /// Too few usable rows to fit or window a brand.
    #[error("insufficient rows: need at least {needed}, got {got}")]
    InsufficientRows { needed: usize, got: usize },

    /// Too few sliding-window samples after windowing.
    #[error("insufficient samples: need at least {needed}, got {got}")]
    InsufficientSamples { needed: usize, got: usize },

    /// The chronological holdout split contains no rows.
    #[error("empty holdout split")]
    EmptyHoldout,

    /// Every candidate regressor is constant in the training split.
    #[error("no usable regressors: all candidates constant in training split")]
    NoUsableRegressors,

    /// Missing values remain in the training split after cleaning.
    #[error("missing values remain in training split")]
    MissingValues,

    /// Two columns or vectors that must align do not.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Per-brand dates are not strictly increasing after aggregation.
    #[error("date order violation: {0}")]
    DateOrder(String),

    /// Invalid configuration or parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Numerical failure (singular system, non-finite loss, ...).
    #[error("computation error: {0}")]
    Computation(String),

    /// Failure reading or writing a table.
    #[error("table i/o error: {0}")]
    TableIo(String),
}

impl EngineError {
    /// Whether the error aborts the whole run instead of skipping a brand.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::MissingInput(_))
    }
}

impl From<csv::Error> for EngineError {
    fn from(err: csv::Error) -> Self {
        EngineError::TableIo(err.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::TableIo(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_are_descriptive() {
        let err = EngineError::MissingInput("data/raw/sales.csv".into());
        assert_eq!(err.to_string(), "missing input: data/raw/sales.csv");

        let err = EngineError::InsufficientRows { needed: 8, got: 5 };
        assert_eq!(err.to_string(), "insufficient rows: need at least 8, got 5");

        let err = EngineError::EmptyHoldout;
        assert_eq!(err.to_string(), "empty holdout split");

        let err = EngineError::NoUsableRegressors;
        assert_eq!(
            err.to_string(),
            "no usable regressors: all candidates constant in training split"
        );
    }

    #[test]
    fn only_missing_input_is_fatal() {
        assert!(EngineError::MissingInput("x".into()).is_fatal());
        assert!(!EngineError::EmptyData.is_fatal());
        assert!(!EngineError::InsufficientSamples { needed: 20, got: 3 }.is_fatal());
        assert!(!EngineError::MissingValues.is_fatal());
    }

    #[test]
    fn errors_are_clonable_and_comparable() {
        let err1 = EngineError::EmptyHoldout;
        let err2 = err1.clone();
        assert_eq!(err1, err2);
    }
}
