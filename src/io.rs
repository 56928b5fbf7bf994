//! CSV ingestion and result export.

use crate::core::{ForecastRecord, MetricsRecord, RawRecord};
use crate::error::{EngineError, Result};
use std::path::Path;
use tracing::info;

/// Read the raw sales table. An absent file is the one fatal error of the
/// pipeline; a malformed row fails the read rather than being silently
/// dropped.
pub fn read_raw_csv(path: impl AsRef<Path>) -> Result<Vec<RawRecord>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(EngineError::MissingInput(path.display().to_string()));
    }

    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        records.push(row?);
    }
    info!(path = %path.display(), rows = records.len(), "read raw sales table");
    Ok(records)
}

const FORECAST_HEADERS: [&str; 5] = [
    "Date",
    "Brand",
    "Predicted_Sales",
    "Predicted_Sales_Lower",
    "Predicted_Sales_Upper",
];
const METRICS_HEADERS: [&str; 3] = ["Brand", "RMSE", "MAPE_Percent"];

/// Write the forecast table with its contract headers.
pub fn write_forecasts(path: impl AsRef<Path>, records: &[ForecastRecord]) -> Result<()> {
    write_table(path.as_ref(), records, &FORECAST_HEADERS)
}

/// Write the per-brand metrics table with its contract headers.
pub fn write_metrics(path: impl AsRef<Path>, records: &[MetricsRecord]) -> Result<()> {
    write_table(path.as_ref(), records, &METRICS_HEADERS)
}

/// A run where every brand was skipped still emits a headed, empty table,
/// so the headers are written explicitly rather than inferred from rows.
fn write_table<T: serde::Serialize>(path: &Path, records: &[T], headers: &[&str]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(headers)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    info!(path = %path.display(), rows = records.len(), "wrote table");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    #[test]
    fn missing_file_is_fatal() {
        let err = read_raw_csv("/definitely/not/here.csv").unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, EngineError::MissingInput(_)));
    }

    #[test]
    fn reads_rows_with_gaps() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sales.csv");
        std::fs::write(
            &path,
            "Date,Category,Brand,Region,Total_Sales,Quantity_Sold,Online_Popularity,\
             Competitor_Price,Category_Trend_Index,Customer_Growth_Rate,\
             Customer_Retention_Rate,Stock_Level,Supply_Delay_Days,Inflation_Rate,\
             Weather_Score,Promotion,Discount_Percentage,Is_Holiday\n\
             2024-01-01,Snacks,Acme,North,120.5,,55,48,0.8,0.03,0.9,300,2,0.05,0.7,1,10,0\n",
        )
        .unwrap();

        let records = read_raw_csv(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].brand, "Acme");
        assert_eq!(records[0].total_sales, Some(120.5));
        assert_eq!(records[0].quantity_sold, None);
    }

    #[test]
    fn round_trips_forecast_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("forecast.csv");
        let records = vec![ForecastRecord {
            date: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
            brand: "Acme".into(),
            predicted_sales: 123.4,
            lower: None,
            upper: None,
        }];

        write_forecasts(&path, &records).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with(
            "Date,Brand,Predicted_Sales,Predicted_Sales_Lower,Predicted_Sales_Upper"
        ));
        assert!(written.contains("2024-04-01,Acme,123.4,,"));
    }

    #[test]
    fn writes_metrics_headers_for_empty_runs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metrics.csv");
        write_metrics(&path, &[]).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written.trim(), "Brand,RMSE,MAPE_Percent");
    }
}
