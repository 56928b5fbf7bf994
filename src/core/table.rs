//! The processed feature table and per-brand series views.

use crate::core::observation::NUM_COVARIATES;
use crate::error::{EngineError, Result};
use chrono::NaiveDate;
use std::collections::BTreeSet;

/// One row of the preprocessed table: a (category, brand, date) daily
/// summary with engineered features. Produced by [`crate::preprocess`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedRow {
    pub date: NaiveDate,
    pub category: String,
    pub brand: String,
    pub total_sales: f64,
    pub quantity_sold: f64,
    pub online_popularity: f64,
    /// Covariates in [`crate::core::COVARIATE_NAMES`] order.
    pub covariates: [f64; NUM_COVARIATES],
    /// Lag-1 total sales within the brand's series (boundary-filled).
    pub sales_lag_1: f64,
    /// 3-period trailing rolling mean of total sales (min window 1).
    pub sales_ma_3: f64,
    pub category_code: u32,
    pub brand_code: u32,
    pub region_code: u32,
}

/// The aggregated feature table: one row per (category, brand, date),
/// ordered by that key. This is the shared input contract for both
/// forecasters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessedTable {
    rows: Vec<ProcessedRow>,
}

impl ProcessedTable {
    /// Wrap rows, enforcing the table ordering invariant.
    pub fn new(mut rows: Vec<ProcessedRow>) -> Self {
        rows.sort_by(|a, b| {
            (&a.category, &a.brand, a.date).cmp(&(&b.category, &b.brand, b.date))
        });
        Self { rows }
    }

    pub fn rows(&self) -> &[ProcessedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct brand names, sorted.
    pub fn brands(&self) -> Vec<String> {
        let set: BTreeSet<&str> = self.rows.iter().map(|r| r.brand.as_str()).collect();
        set.into_iter().map(String::from).collect()
    }

    /// All rows belonging to one brand, ordered by date. Rows for the same
    /// date may repeat when a brand spans several categories; forecasters
    /// re-aggregate per date through [`BrandSeries::daily`].
    pub fn brand_series(&self, brand: &str) -> BrandSeries {
        let mut rows: Vec<ProcessedRow> = self
            .rows
            .iter()
            .filter(|r| r.brand == brand)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.date);
        BrandSeries {
            brand: brand.to_string(),
            rows,
        }
    }
}

/// The ordered-by-date rows of a single brand.
#[derive(Debug, Clone)]
pub struct BrandSeries {
    brand: String,
    rows: Vec<ProcessedRow>,
}

impl BrandSeries {
    pub fn brand(&self) -> &str {
        &self.brand
    }

    pub fn rows(&self) -> &[ProcessedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Defensive re-aggregation to exactly one row per date: sales are
    /// summed, popularity and covariates averaged. Upstream grouping should
    /// already guarantee uniqueness per (category, brand, date), but a
    /// brand present in several categories still yields duplicate dates.
    pub fn daily(&self) -> Result<DailySeries> {
        if self.rows.is_empty() {
            return Err(EngineError::EmptyData);
        }

        let mut dates: Vec<NaiveDate> = Vec::new();
        let mut target: Vec<f64> = Vec::new();
        let mut popularity: Vec<f64> = Vec::new();
        let mut covariates: Vec<[f64; NUM_COVARIATES]> = Vec::new();
        let mut counts: Vec<usize> = Vec::new();

        for row in &self.rows {
            match dates.last() {
                Some(&last) if last == row.date => {
                    let i = dates.len() - 1;
                    target[i] += row.total_sales;
                    popularity[i] += row.online_popularity;
                    for (acc, v) in covariates[i].iter_mut().zip(row.covariates.iter()) {
                        *acc += v;
                    }
                    counts[i] += 1;
                }
                Some(&last) if last > row.date => {
                    return Err(EngineError::DateOrder(format!(
                        "brand {} rows not sorted at {}",
                        self.brand, row.date
                    )));
                }
                _ => {
                    dates.push(row.date);
                    target.push(row.total_sales);
                    popularity.push(row.online_popularity);
                    covariates.push(row.covariates);
                    counts.push(1);
                }
            }
        }

        for (i, &count) in counts.iter().enumerate() {
            let n = count as f64;
            popularity[i] /= n;
            for v in covariates[i].iter_mut() {
                *v /= n;
            }
        }

        Ok(DailySeries {
            brand: self.brand.clone(),
            dates,
            target,
            popularity,
            covariates,
        })
    }
}

/// A brand's series after per-date aggregation: strictly increasing dates,
/// one target/popularity/covariate tuple per date.
#[derive(Debug, Clone)]
pub struct DailySeries {
    pub brand: String,
    pub dates: Vec<NaiveDate>,
    pub target: Vec<f64>,
    pub popularity: Vec<f64>,
    pub covariates: Vec<[f64; NUM_COVARIATES]>,
}

impl DailySeries {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Last observed date. Forecast rows start the day after.
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// One covariate as a column vector.
    pub fn covariate_column(&self, index: usize) -> Vec<f64> {
        self.covariates.iter().map(|c| c[index]).collect()
    }

    /// Keep only rows whose target is finite, returning the number of rows
    /// dropped.
    pub fn retain_finite_target(&mut self) -> usize {
        let before = self.len();
        let keep: Vec<bool> = self.target.iter().map(|v| v.is_finite()).collect();
        let mut idx = 0;
        self.dates.retain(|_| {
            let k = keep[idx];
            idx += 1;
            k
        });
        idx = 0;
        self.target.retain(|_| {
            let k = keep[idx];
            idx += 1;
            k
        });
        idx = 0;
        self.popularity.retain(|_| {
            let k = keep[idx];
            idx += 1;
            k
        });
        idx = 0;
        self.covariates.retain(|_| {
            let k = keep[idx];
            idx += 1;
            k
        });
        before - self.len()
    }

    /// Chronological split at `floor(len * train_fraction)`.
    pub fn split_index(&self, train_fraction: f64) -> usize {
        (self.len() as f64 * train_fraction).floor() as usize
    }
}
