//! Durable engine outputs: forecast rows, per-brand metrics, and the
//! run-level outcome distinction.

use chrono::NaiveDate;
use serde::Serialize;

/// One forecast row. Dates are strictly after the brand's last observed
/// date; bounds are present only when the model provides them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastRecord {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Brand")]
    pub brand: String,
    #[serde(rename = "Predicted_Sales")]
    pub predicted_sales: f64,
    #[serde(rename = "Predicted_Sales_Lower")]
    pub lower: Option<f64>,
    #[serde(rename = "Predicted_Sales_Upper")]
    pub upper: Option<f64>,
}

/// Holdout accuracy for one brand under one model. Absent for skipped
/// brands; absence means "skipped", never "zero error".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsRecord {
    #[serde(rename = "Brand")]
    pub brand: String,
    #[serde(rename = "RMSE")]
    pub rmse: f64,
    #[serde(rename = "MAPE_Percent")]
    pub mape_percent: f64,
}

/// Everything one brand's forecasting pipeline produces.
#[derive(Debug, Clone)]
pub struct BrandOutcome {
    pub forecasts: Vec<ForecastRecord>,
    pub metrics: MetricsRecord,
}

/// Run-level terminal state. Callers must distinguish "ran but found
/// nothing forecastable" from "produced N results" explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every brand was skipped; the output tables are valid but empty.
    Empty,
    /// This many brands produced forecasts.
    Forecasted(usize),
}
