// src/services/floor_premium.rs
use log::debug;
use serde::Serialize;

use crate::models::{FloorBand, Transaction};
use super::calculations::{average_psf, MIN_CONFIDENT_SAMPLES};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FloorBandStat {
    pub band: FloorBand,
    pub psf: f64,
    pub count: usize,
    /// Fewer than three sales. Still part of the premium curve.
    pub is_thin: bool,
    /// Relative to the first band present, one decimal.
    pub premium_percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FloorPremiumTable {
    pub bands: Vec<FloorBandStat>,
    /// Lowest band with data. Shifts upward when the low floors have no sales.
    pub baseline: Option<FloorBand>,
}

impl FloorPremiumTable {
    pub fn band_for(&self, floor_mid: f64) -> Option<&FloorBandStat> {
        let band = FloorBand::classify(floor_mid)?;
        self.bands.iter().find(|b| b.band == band)
    }

    pub fn premium_for(&self, floor_mid: f64) -> Option<f64> {
        self.band_for(floor_mid).map(|b| b.premium_percent)
    }
}

fn round_one_decimal(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Average PSF per floor band and each band's premium over the lowest band.
///
/// Sales without a floor are ignored; empty bands are left out.
pub fn compute_floor_premiums(transactions: &[Transaction]) -> FloorPremiumTable {
    let mut grouped: Vec<(FloorBand, Vec<Transaction>)> = Vec::new();
    for band in FloorBand::ALL {
        let members: Vec<Transaction> = transactions
            .iter()
            .filter(|t| t.has_valid_psf() && t.floor_mid.and_then(FloorBand::classify) == Some(band))
            .cloned()
            .collect();
        if !members.is_empty() {
            grouped.push((band, members));
        }
    }

    let Some((baseline, base_members)) = grouped.first() else {
        return FloorPremiumTable::default();
    };
    let baseline = *baseline;
    let base_psf = average_psf(base_members);

    let bands: Vec<FloorBandStat> = grouped
        .iter()
        .map(|(band, members)| {
            let psf = average_psf(members);
            let premium = if base_psf > 0.0 {
                round_one_decimal((psf / base_psf - 1.0) * 100.0)
            } else {
                0.0
            };
            FloorBandStat {
                band: *band,
                psf,
                count: members.len(),
                is_thin: members.len() < MIN_CONFIDENT_SAMPLES,
                premium_percent: premium,
            }
        })
        .collect();

    debug!(
        "Floor premiums over {} bands, baseline {}",
        bands.len(),
        baseline
    );

    FloorPremiumTable {
        bands,
        baseline: Some(baseline),
    }
}
