// src/services/calculations.rs
use chrono::NaiveDate;
use log::{debug, warn};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::{Transaction, YearMonth};
use super::windows::months_elapsed;

/// Endpoint years with fewer sales than this are flagged low-confidence.
pub const MIN_CONFIDENT_SAMPLES: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearBucket {
    pub year: i32,
    pub average_psf: f64,
    pub count: usize,
    pub low_confidence: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CagrResult {
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub start_avg: f64,
    pub end_avg: f64,
    pub start_n: usize,
    pub end_n: usize,
    /// `None` when growth cannot be determined. Never read as 0%.
    pub cagr_percent: Option<f64>,
    pub low_confidence: bool,
    pub annual_series: Vec<YearBucket>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeAdjustment {
    pub adjusted_psf: f64,
    pub months_elapsed: u32,
    /// `None` means the rate is unknown and no adjustment was attempted.
    pub rate_used: Option<f64>,
}

/// Geometric growth rate as a fraction; `None` for non-positive inputs or spans.
pub fn calculate_cagr(start_value: f64, end_value: f64, years: f64) -> Option<f64> {
    if start_value <= 0.0 || end_value <= 0.0 || years <= 0.0 {
        None
    } else {
        Some((end_value / start_value).powf(1.0 / years) - 1.0)
    }
}

pub fn calculate_average(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Unweighted mean PSF rounded to a whole currency unit, 0 for an empty slice.
pub fn average_psf(transactions: &[Transaction]) -> f64 {
    let values: Vec<f64> = transactions.iter().map(|t| t.psf).collect();
    calculate_average(&values).round()
}

pub fn annual_series(transactions: &[Transaction]) -> Vec<YearBucket> {
    let mut by_year: BTreeMap<i32, Vec<f64>> = BTreeMap::new();
    for tx in transactions.iter().filter(|t| t.has_valid_psf()) {
        by_year.entry(tx.year).or_default().push(tx.psf);
    }

    by_year
        .into_iter()
        .map(|(year, values)| YearBucket {
            year,
            average_psf: calculate_average(&values),
            count: values.len(),
            low_confidence: values.len() < MIN_CONFIDENT_SAMPLES,
        })
        .collect()
}

/// Year-over-year PSF buckets and the compound growth between two of them.
///
/// Endpoints default to the earliest and latest years present.
pub fn compute_bucket_cagr(
    transactions: &[Transaction],
    start_year: Option<i32>,
    end_year: Option<i32>,
) -> CagrResult {
    let series = annual_series(transactions);
    let start = start_year.or_else(|| series.first().map(|b| b.year));
    let end = end_year.or_else(|| series.last().map(|b| b.year));

    let bucket = |year: Option<i32>| {
        year.and_then(|y| series.iter().find(|b| b.year == y))
            .map(|b| (b.average_psf, b.count))
            .unwrap_or((0.0, 0))
    };
    let (start_avg, start_n) = bucket(start);
    let (end_avg, end_n) = bucket(end);

    let cagr_percent = match (start, end) {
        _ if series.len() < 2 => {
            warn!("Insufficient years of data ({}) for CAGR calculation", series.len());
            None
        }
        _ if start_n == 0 || end_n == 0 => {
            warn!("No sales in CAGR endpoint year {:?} or {:?}", start, end);
            None
        }
        (Some(s), Some(e)) => calculate_cagr(start_avg, end_avg, (e - s) as f64).map(|r| r * 100.0),
        _ => None,
    };

    let low_confidence = start_n < MIN_CONFIDENT_SAMPLES || end_n < MIN_CONFIDENT_SAMPLES;
    debug!(
        "CAGR {:?}->{:?}: {:.0} ({}) -> {:.0} ({}) = {:?}%, low confidence: {}",
        start, end, start_avg, start_n, end_avg, end_n, cagr_percent, low_confidence
    );

    CagrResult {
        start_year: start,
        end_year: end,
        start_avg,
        end_avg,
        start_n,
        end_n,
        cagr_percent,
        low_confidence,
        annual_series: series,
    }
}

/// Projects a historical PSF to `now` using an annual growth rate in percent.
pub fn time_adjust(psf: f64, date: YearMonth, cagr_percent: Option<f64>, now: NaiveDate) -> TimeAdjustment {
    let months = months_elapsed(date, now);
    let Some(rate) = cagr_percent else {
        return TimeAdjustment {
            adjusted_psf: psf,
            months_elapsed: months,
            rate_used: None,
        };
    };
    if months < 1 {
        return TimeAdjustment {
            adjusted_psf: psf,
            months_elapsed: months,
            rate_used: Some(rate),
        };
    }

    let factor = (1.0 + rate / 100.0).powf(months as f64 / 12.0);
    TimeAdjustment {
        adjusted_psf: (psf * factor).round(),
        months_elapsed: months,
        rate_used: Some(rate),
    }
}
