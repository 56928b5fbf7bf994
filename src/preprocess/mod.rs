//! Preprocessing / feature builder.
//!
//! Turns the raw per-transaction table into the aggregated feature table
//! both forecasters consume: exactly one row per (category, brand, date),
//! with stable categorical codes, per-brand lag/rolling features, and
//! globally normalized covariates.
//!
//! Repair policies (imputation, boundary fills) are silent by design and
//! logged at debug level only; they are not errors.

use crate::core::{ProcessedRow, ProcessedTable, RawRecord, NUM_COVARIATES, NUM_RATE_COVARIATES};
use crate::error::{EngineError, Result};
use crate::transform::{lag_filled, standardize_with_epsilon, trailing_mean};
use crate::utils::stats::median;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Epsilon added to the standard deviation when normalizing covariates.
pub const NORMALIZATION_EPSILON: f64 = 1e-6;

/// Rolling-mean window for the `Sales_MA_3` feature.
const ROLLING_WINDOW: usize = 3;

/// Build the aggregated feature table from raw observations.
///
/// The whole pipeline is a pure function of its input: running it twice on
/// the same records yields an identical table.
pub fn preprocess(records: &[RawRecord]) -> Result<ProcessedTable> {
    if records.is_empty() {
        return Err(EngineError::EmptyData);
    }

    let mut records: Vec<RawRecord> = records.to_vec();
    impute_missing(&mut records);

    // Stable categorical codes: lexicographic rank of the distinct values.
    let category_codes = encode(records.iter().map(|r| r.category.as_str()));
    let brand_codes = encode(records.iter().map(|r| r.brand.as_str()));
    let region_codes = encode(records.iter().map(|r| r.region.as_str()));

    // Lag/rolling features are per brand over the brand's date-ordered rows.
    records.sort_by(|a, b| (&a.brand, a.date).cmp(&(&b.brand, b.date)));

    let mut rows: Vec<ProcessedRow> = Vec::with_capacity(records.len());
    let mut start = 0;
    while start < records.len() {
        let brand = records[start].brand.clone();
        let end = records[start..]
            .iter()
            .position(|r| r.brand != brand)
            .map(|off| start + off)
            .unwrap_or(records.len());

        let sales: Vec<f64> = records[start..end]
            .iter()
            .map(|r| r.total_sales.unwrap_or(f64::NAN))
            .collect();
        let lag = lag_filled(&sales);
        let ma = trailing_mean(&sales, ROLLING_WINDOW);

        for (offset, record) in records[start..end].iter().enumerate() {
            let total_sales = sales[offset];
            let mut covariates = [f64::NAN; NUM_COVARIATES];
            for (i, slot) in covariates.iter_mut().enumerate() {
                *slot = record.covariate(i).unwrap_or(f64::NAN);
            }
            let sales_ma_3 = if ma[offset].is_finite() {
                ma[offset]
            } else {
                total_sales
            };
            rows.push(ProcessedRow {
                date: record.date,
                category: record.category.clone(),
                brand: record.brand.clone(),
                total_sales,
                quantity_sold: record.quantity_sold.unwrap_or(f64::NAN),
                online_popularity: record.online_popularity.unwrap_or(f64::NAN),
                covariates,
                sales_lag_1: lag[offset],
                sales_ma_3,
                category_code: category_codes[&record.category],
                brand_code: brand_codes[&record.brand],
                region_code: region_codes[&record.region],
            });
        }
        start = end;
    }

    normalize_columns(&mut rows);
    Ok(aggregate(rows))
}

/// Global median imputation of the numeric fields, holiday flag default 0.
/// Promotion and discount are deliberately left alone; a gap there
/// surfaces later as a remaining-missing-values skip.
fn impute_missing(records: &mut [RawRecord]) {
    let sales_median = median(&collect(records, |r| r.total_sales));
    let quantity_median = median(&collect(records, |r| r.quantity_sold));
    let popularity_median = median(&collect(records, |r| r.online_popularity));

    let mut imputed = 0usize;
    for record in records.iter_mut() {
        imputed += fill(&mut record.total_sales, sales_median) as usize;
        imputed += fill(&mut record.quantity_sold, quantity_median) as usize;
        imputed += fill(&mut record.online_popularity, popularity_median) as usize;
        if record.is_holiday.is_none() {
            record.is_holiday = Some(0.0);
        }
    }

    for index in 0..NUM_RATE_COVARIATES {
        let column: Vec<f64> = records
            .iter()
            .filter_map(|r| r.covariate(index))
            .filter(|v| v.is_finite())
            .collect();
        let m = median(&column);
        if !m.is_finite() {
            continue;
        }
        for record in records.iter_mut() {
            if record.covariate(index).is_none() {
                record.set_covariate(index, m);
                imputed += 1;
            }
        }
    }

    if imputed > 0 {
        debug!(imputed, "filled missing numeric fields with global medians");
    }
}

fn collect(records: &[RawRecord], get: impl Fn(&RawRecord) -> Option<f64>) -> Vec<f64> {
    records.iter().filter_map(&get).filter(|v| v.is_finite()).collect()
}

fn fill(slot: &mut Option<f64>, value: f64) -> bool {
    if slot.is_none() && value.is_finite() {
        *slot = Some(value);
        true
    } else {
        false
    }
}

fn encode<'a>(values: impl Iterator<Item = &'a str>) -> BTreeMap<String, u32> {
    let distinct: BTreeSet<&str> = values.collect();
    distinct
        .into_iter()
        .enumerate()
        .map(|(code, value)| (value.to_string(), code as u32))
        .collect()
}

/// Globally z-score every covariate except the sales target and the
/// promotion/discount/holiday flags. Computed across all brands at once;
/// this global scope is a known precision trade-off carried over from the
/// source pipeline.
fn normalize_columns(rows: &mut [ProcessedRow]) {
    normalize_field(rows, |r| r.quantity_sold, |r, v| r.quantity_sold = v);
    normalize_field(rows, |r| r.online_popularity, |r, v| r.online_popularity = v);
    normalize_field(rows, |r| r.sales_lag_1, |r, v| r.sales_lag_1 = v);
    normalize_field(rows, |r| r.sales_ma_3, |r, v| r.sales_ma_3 = v);
    for index in 0..NUM_RATE_COVARIATES {
        normalize_field(
            rows,
            move |r| r.covariates[index],
            move |r, v| r.covariates[index] = v,
        );
    }
    debug!(
        columns = NUM_RATE_COVARIATES + 4,
        epsilon = NORMALIZATION_EPSILON,
        "normalized covariate columns globally"
    );
}

fn normalize_field(
    rows: &mut [ProcessedRow],
    get: impl Fn(&ProcessedRow) -> f64,
    set: impl Fn(&mut ProcessedRow, f64),
) {
    let mut column: Vec<f64> = rows.iter().map(|r| get(r)).collect();
    standardize_with_epsilon(&mut column, NORMALIZATION_EPSILON);
    for (row, value) in rows.iter_mut().zip(column) {
        set(row, value);
    }
}

/// Aggregate to one row per (category, brand, date): additive quantities
/// are summed, rate-like columns averaged (skipping NaN, like the source
/// pipeline), categorical codes keep the first value encountered.
fn aggregate(mut rows: Vec<ProcessedRow>) -> ProcessedTable {
    rows.sort_by(|a, b| (&a.category, &a.brand, a.date).cmp(&(&b.category, &b.brand, b.date)));

    let mut out: Vec<ProcessedRow> = Vec::new();
    let mut group: Vec<ProcessedRow> = Vec::new();

    for row in rows {
        let same_group = group
            .first()
            .map(|g| g.category == row.category && g.brand == row.brand && g.date == row.date)
            .unwrap_or(false);
        if !same_group && !group.is_empty() {
            out.push(merge_group(std::mem::take(&mut group)));
        }
        group.push(row);
    }
    if !group.is_empty() {
        out.push(merge_group(group));
    }

    ProcessedTable::new(out)
}

fn merge_group(group: Vec<ProcessedRow>) -> ProcessedRow {
    let mut merged = group[0].clone();
    merged.total_sales = group.iter().map(|r| r.total_sales).sum();
    merged.quantity_sold = group.iter().map(|r| r.quantity_sold).sum();
    merged.online_popularity = mean_skip_nan(group.iter().map(|r| r.online_popularity));
    merged.sales_lag_1 = mean_skip_nan(group.iter().map(|r| r.sales_lag_1));
    merged.sales_ma_3 = mean_skip_nan(group.iter().map(|r| r.sales_ma_3));
    for index in 0..NUM_COVARIATES {
        merged.covariates[index] = mean_skip_nan(group.iter().map(|r| r.covariates[index]));
    }
    merged
}

fn mean_skip_nan(values: impl Iterator<Item = f64>) -> f64 {
    let finite: Vec<f64> = values.filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        f64::NAN
    } else {
        finite.iter().sum::<f64>() / finite.len() as f64
    }
}
