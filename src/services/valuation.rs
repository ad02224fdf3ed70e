// src/services/valuation.rs
//! Comparable market analysis.
//!
//! Every comparable gets a similarity weight (recency x size x floor) and an
//! adjusted PSF (time-projected to today, then normalized to the target floor
//! through the floor premium curve). The estimate is the weighted mean of the
//! adjusted PSFs, the range is one weighted standard deviation either side,
//! and the confidence score summarizes how much close evidence there is.

use chrono::NaiveDate;
use log::{debug, warn};
use serde::Serialize;

use crate::models::Transaction;
use super::calculations::time_adjust;
use super::floor_premium::FloorPremiumTable;
use super::windows::{in_window, months_elapsed};

/// Fewer usable comparables than this and no valuation is produced.
pub const MIN_COMPARABLES: usize = 3;
pub const TOP_COMPARABLES: usize = 5;

/// Divisor in the recency decay `exp(-0.5 * months / 18)`.
pub const RECENCY_SCALE_MONTHS: f64 = 18.0;
pub const SIZE_SIGMA_SQFT: f64 = 150.0;
pub const FLOOR_SIGMA: f64 = 8.0;
/// Floor weight when either side's floor is unknown.
pub const NEUTRAL_FLOOR_WEIGHT: f64 = 0.5;

/// A comparable counts as a size match under this delta.
pub const SIZE_MATCH_SQFT: f64 = 50.0;
/// A comparable counts as a floor match within this many floors.
pub const FLOOR_MATCH_FLOORS: f64 = 4.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredTransaction {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub weight: f64,
    pub adjusted_psf: f64,
    pub months_ago: u32,
    pub size_delta: f64,
    pub recency_weight: f64,
    pub size_weight: f64,
    pub floor_weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuationModel {
    pub estimated_psf: f64,
    pub low_psf: f64,
    pub high_psf: f64,
    pub std_dev_psf: f64,
    /// Highest weight first.
    pub top_comparables: Vec<ScoredTransaction>,
    pub total_count: usize,
    pub recent_6mo_count: usize,
    pub recent_12mo_count: usize,
    pub size_match_count: usize,
    /// `None` when no target floor was given.
    pub floor_match_count: Option<usize>,
    pub confidence: u8,
    pub cagr_used: Option<f64>,
}

/// Everything a valuation depends on.
#[derive(Debug, Clone, Copy)]
pub struct ValuationInput<'a> {
    pub transactions: &'a [Transaction],
    pub target_size: f64,
    pub target_floor: Option<f64>,
    pub cagr_percent: Option<f64>,
    pub floor_premiums: Option<&'a FloorPremiumTable>,
    pub now: NaiveDate,
}

pub fn recency_weight(months_ago: u32) -> f64 {
    (-0.5 * months_ago as f64 / RECENCY_SCALE_MONTHS).exp()
}

pub fn size_weight(size_delta: f64) -> f64 {
    (-0.5 * (size_delta / SIZE_SIGMA_SQFT).powi(2)).exp()
}

pub fn floor_weight(target_floor: Option<f64>, tx_floor: Option<f64>) -> f64 {
    match (target_floor, tx_floor) {
        (Some(target), Some(floor)) => (-0.5 * ((floor - target) / FLOOR_SIGMA).powi(2)).exp(),
        _ => NEUTRAL_FLOOR_WEIGHT,
    }
}

/// Multiplier taking a sale on `tx_floor` to the target floor, from the premium curve.
fn floor_adjustment(input: &ValuationInput, tx_floor: Option<f64>) -> Option<f64> {
    let table = input.floor_premiums?;
    if table.bands.len() < 2 {
        return None;
    }
    let target_premium = table.premium_for(input.target_floor?)?;
    let tx_premium = table.premium_for(tx_floor?)?;
    Some(1.0 + (target_premium - tx_premium) / 100.0)
}

pub fn score_transaction(tx: &Transaction, input: &ValuationInput) -> ScoredTransaction {
    let months_ago = months_elapsed(tx.date, input.now);
    let size_delta = (tx.area - input.target_size).abs();

    let recency = recency_weight(months_ago);
    let size = size_weight(size_delta);
    let floor = floor_weight(input.target_floor, tx.floor_mid);

    let mut adjusted_psf = tx.psf;
    if months_ago > 0 && input.cagr_percent.is_some() {
        adjusted_psf = time_adjust(tx.psf, tx.date, input.cagr_percent, input.now).adjusted_psf;
    }
    if let Some(factor) = floor_adjustment(input, tx.floor_mid) {
        adjusted_psf *= factor;
    }

    ScoredTransaction {
        transaction: tx.clone(),
        weight: recency * size * floor,
        adjusted_psf,
        months_ago,
        size_delta,
        recency_weight: recency,
        size_weight: size,
        floor_weight: floor,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfidenceInputs {
    pub recent_12mo: usize,
    pub size_matches: usize,
    pub floor_matches: Option<usize>,
    pub total: usize,
}

fn capped_ratio(count: usize, cap: usize) -> f64 {
    count.min(cap) as f64 / cap as f64
}

/// 0-100 score rewarding recent volume, close size matches and close floor matches.
///
/// Without a floor target the floor share is redistributed to the other parts.
pub fn confidence_score(inputs: &ConfidenceInputs) -> u8 {
    let recency = capped_ratio(inputs.recent_12mo, 10);
    let size = capped_ratio(inputs.size_matches, 5);
    let volume = capped_ratio(inputs.total, 20);

    let raw = match inputs.floor_matches {
        Some(floor_matches) => {
            let floor = capped_ratio(floor_matches, 5);
            0.30 * recency + 0.25 * size + 0.20 * floor + 0.25 * volume
        }
        None => 0.40 * recency + 0.30 * size + 0.30 * volume,
    };
    (raw * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Weighted comparable valuation, or `None` when the evidence cannot support one.
pub fn value_unit(input: &ValuationInput) -> Option<ValuationModel> {
    let comparables: Vec<&Transaction> = input
        .transactions
        .iter()
        .filter(|t| t.has_valid_psf())
        .collect();
    if comparables.len() < MIN_COMPARABLES {
        warn!(
            "Only {} usable comparables, need {} for a valuation",
            comparables.len(),
            MIN_COMPARABLES
        );
        return None;
    }

    let mut scored: Vec<ScoredTransaction> = comparables
        .iter()
        .map(|tx| score_transaction(tx, input))
        .collect();

    let total_weight: f64 = scored.iter().map(|s| s.weight).sum();
    if total_weight <= 0.0 || !total_weight.is_finite() {
        warn!("All comparable weights vanished for target size {}", input.target_size);
        return None;
    }

    let mean = scored.iter().map(|s| s.weight * s.adjusted_psf).sum::<f64>() / total_weight;
    let estimated_psf = mean.round();
    let variance = scored
        .iter()
        .map(|s| s.weight * (s.adjusted_psf - mean).powi(2))
        .sum::<f64>()
        / total_weight;
    let std_dev_psf = variance.sqrt().round();

    let recent_6mo_count = comparables.iter().filter(|t| in_window(t, input.now, 6)).count();
    let recent_12mo_count = comparables.iter().filter(|t| in_window(t, input.now, 12)).count();
    let size_match_count = scored.iter().filter(|s| s.size_delta < SIZE_MATCH_SQFT).count();
    let floor_match_count = input.target_floor.map(|target| {
        comparables
            .iter()
            .filter(|t| t.floor_mid.map_or(false, |f| (f - target).abs() <= FLOOR_MATCH_FLOORS))
            .count()
    });

    let confidence = confidence_score(&ConfidenceInputs {
        recent_12mo: recent_12mo_count,
        size_matches: size_match_count,
        floor_matches: floor_match_count,
        total: comparables.len(),
    });

    scored.sort_by(|a, b| b.weight.total_cmp(&a.weight));
    scored.truncate(TOP_COMPARABLES);

    debug!(
        "Valuation for {} sqft floor {:?}: {} psf +/- {} from {} comparables, confidence {}",
        input.target_size,
        input.target_floor,
        estimated_psf,
        std_dev_psf,
        comparables.len(),
        confidence
    );

    Some(ValuationModel {
        estimated_psf,
        low_psf: estimated_psf - std_dev_psf,
        high_psf: estimated_psf + std_dev_psf,
        std_dev_psf,
        top_comparables: scored,
        total_count: comparables.len(),
        recent_6mo_count,
        recent_12mo_count,
        size_match_count,
        floor_match_count,
        confidence,
        cagr_used: input.cagr_percent,
    })
}
