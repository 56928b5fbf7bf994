//! Raw observation rows as ingested from the sales table.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Number of numeric covariate columns carried alongside sales.
pub const NUM_COVARIATES: usize = 11;

/// The first `NUM_RATE_COVARIATES` covariates are rate-like: they are
/// median-imputed, globally normalized, and mean-aggregated. The remaining
/// columns (promotion, discount, holiday flag) are flags: mean-aggregated
/// but never normalized.
pub const NUM_RATE_COVARIATES: usize = 8;

/// Covariate column names, in fixed schema order.
pub const COVARIATE_NAMES: [&str; NUM_COVARIATES] = [
    "Competitor_Price",
    "Category_Trend_Index",
    "Customer_Growth_Rate",
    "Customer_Retention_Rate",
    "Stock_Level",
    "Supply_Delay_Days",
    "Inflation_Rate",
    "Weather_Score",
    "Promotion",
    "Discount_Percentage",
    "Is_Holiday",
];

/// Index of a covariate column by name.
pub fn covariate_index(name: &str) -> Option<usize> {
    COVARIATE_NAMES.iter().position(|&n| n == name)
}

/// One raw observation row: a single (date, category, brand, region)
/// transaction summary. Immutable once ingested; preprocessing works on
/// copies. Numeric fields may be absent in the source and are imputed by
/// the feature builder.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RawRecord {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Category")]
    pub category: String,
    #[serde(rename = "Brand")]
    pub brand: String,
    #[serde(rename = "Region")]
    pub region: String,
    #[serde(rename = "Total_Sales")]
    pub total_sales: Option<f64>,
    #[serde(rename = "Quantity_Sold")]
    pub quantity_sold: Option<f64>,
    #[serde(rename = "Online_Popularity")]
    pub online_popularity: Option<f64>,
    #[serde(rename = "Competitor_Price")]
    pub competitor_price: Option<f64>,
    #[serde(rename = "Category_Trend_Index")]
    pub category_trend_index: Option<f64>,
    #[serde(rename = "Customer_Growth_Rate")]
    pub customer_growth_rate: Option<f64>,
    #[serde(rename = "Customer_Retention_Rate")]
    pub customer_retention_rate: Option<f64>,
    #[serde(rename = "Stock_Level")]
    pub stock_level: Option<f64>,
    #[serde(rename = "Supply_Delay_Days")]
    pub supply_delay_days: Option<f64>,
    #[serde(rename = "Inflation_Rate")]
    pub inflation_rate: Option<f64>,
    #[serde(rename = "Weather_Score")]
    pub weather_score: Option<f64>,
    #[serde(rename = "Promotion")]
    pub promotion: Option<f64>,
    #[serde(rename = "Discount_Percentage")]
    pub discount_percentage: Option<f64>,
    #[serde(rename = "Is_Holiday")]
    pub is_holiday: Option<f64>,
}

impl RawRecord {
    /// Covariate value by schema index.
    pub fn covariate(&self, index: usize) -> Option<f64> {
        match index {
            0 => self.competitor_price,
            1 => self.category_trend_index,
            2 => self.customer_growth_rate,
            3 => self.customer_retention_rate,
            4 => self.stock_level,
            5 => self.supply_delay_days,
            6 => self.inflation_rate,
            7 => self.weather_score,
            8 => self.promotion,
            9 => self.discount_percentage,
            10 => self.is_holiday,
            _ => None,
        }
    }

    /// Set a covariate value by schema index. Out-of-range indices are
    /// ignored.
    pub fn set_covariate(&mut self, index: usize, value: f64) {
        let slot = match index {
            0 => &mut self.competitor_price,
            1 => &mut self.category_trend_index,
            2 => &mut self.customer_growth_rate,
            3 => &mut self.customer_retention_rate,
            4 => &mut self.stock_level,
            5 => &mut self.supply_delay_days,
            6 => &mut self.inflation_rate,
            7 => &mut self.weather_score,
            8 => &mut self.promotion,
            9 => &mut self.discount_percentage,
            10 => &mut self.is_holiday,
            _ => return,
        };
        *slot = Some(value);
    }
}
