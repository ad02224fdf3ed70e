// src/services/tiers.rs
use log::debug;
use serde::Serialize;

use crate::models::{FloorBand, Transaction};
use super::calculations::average_psf;
use super::windows::{TimeWindow, TimeWindows};

/// Matching strategies, ordered from least to most specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    ProjectAvg,
    SizeMatch,
    FloorMatch,
    ExactMatch,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::ProjectAvg, Tier::SizeMatch, Tier::FloorMatch, Tier::ExactMatch];

    /// Search order for the best estimate: specificity first.
    pub const BY_SPECIFICITY: [Tier; 4] = [Tier::ExactMatch, Tier::FloorMatch, Tier::SizeMatch, Tier::ProjectAvg];
}

#[derive(Debug, Clone)]
pub struct TierConfig {
    /// Allowed size difference for a size match, as a fraction of the target size.
    pub size_tolerance: f64,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self { size_tolerance: 0.10 }
    }
}

/// The unit being priced.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TierTarget {
    pub size: Option<f64>,
    pub floor: Option<f64>,
}

impl TierTarget {
    fn floor_band(&self) -> Option<FloorBand> {
        self.floor.and_then(FloorBand::classify)
    }

    /// Size tiers need a size, floor tiers need a floor.
    pub fn supports(&self, tier: Tier) -> bool {
        match tier {
            Tier::ProjectAvg => true,
            Tier::SizeMatch => self.size.is_some(),
            Tier::FloorMatch => self.floor_band().is_some(),
            Tier::ExactMatch => self.size.is_some() && self.floor_band().is_some(),
        }
    }
}

/// `psf == 0.0` with `count == 0` means no data, not a zero price.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TierResult {
    pub psf: f64,
    pub count: usize,
    /// Newest first.
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TierRow {
    pub tier: Tier,
    pub m3: TierResult,
    pub m6: TierResult,
    pub m12: TierResult,
}

impl TierRow {
    pub fn get(&self, window: TimeWindow) -> &TierResult {
        match window {
            TimeWindow::Months3 => &self.m3,
            TimeWindow::Months6 => &self.m6,
            TimeWindow::Months12 => &self.m12,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestEstimate {
    pub tier: Tier,
    pub window: TimeWindow,
    pub psf: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TierEstimates {
    pub tiers: Vec<TierRow>,
    pub best: Option<BestEstimate>,
}

fn size_matches(tx: &Transaction, size: f64, config: &TierConfig) -> bool {
    (tx.area - size).abs() <= size * config.size_tolerance
}

fn floor_matches(tx: &Transaction, band: FloorBand) -> bool {
    tx.floor_mid.and_then(FloorBand::classify) == Some(band)
}

/// Whether `tx` belongs to the candidate set of `tier` for this target.
pub fn matches_tier(tier: Tier, tx: &Transaction, target: &TierTarget, config: &TierConfig) -> bool {
    if !target.supports(tier) {
        return false;
    }
    let size_ok = || target.size.map_or(false, |s| size_matches(tx, s, config));
    let floor_ok = || target.floor_band().map_or(false, |b| floor_matches(tx, b));
    match tier {
        Tier::ProjectAvg => true,
        Tier::SizeMatch => size_ok(),
        Tier::FloorMatch => floor_ok(),
        Tier::ExactMatch => size_ok() && floor_ok(),
    }
}

pub fn tier_result(
    tier: Tier,
    transactions: &[Transaction],
    target: &TierTarget,
    config: &TierConfig,
) -> TierResult {
    let mut matched: Vec<Transaction> = transactions
        .iter()
        .filter(|tx| tx.has_valid_psf() && matches_tier(tier, tx, target, config))
        .cloned()
        .collect();
    if matched.is_empty() {
        return TierResult::default();
    }
    matched.sort_by(|a, b| b.date.cmp(&a.date));
    TierResult {
        psf: average_psf(&matched),
        count: matched.len(),
        transactions: matched,
    }
}

/// First non-empty (tier, window) in specificity-then-recency order.
pub fn select_best(rows: &[TierRow]) -> Option<BestEstimate> {
    for tier in Tier::BY_SPECIFICITY {
        let Some(row) = rows.iter().find(|r| r.tier == tier) else {
            continue;
        };
        for window in TimeWindow::ALL {
            let result = row.get(window);
            if result.count > 0 {
                return Some(BestEstimate {
                    tier,
                    window,
                    psf: result.psf,
                    count: result.count,
                });
            }
        }
    }
    None
}

pub fn estimate_tiers(windows: &TimeWindows, target: &TierTarget, config: &TierConfig) -> TierEstimates {
    let tiers: Vec<TierRow> = Tier::ALL
        .iter()
        .copied()
        .filter(|tier| target.supports(*tier))
        .map(|tier| TierRow {
            tier,
            m3: tier_result(tier, &windows.m3, target, config),
            m6: tier_result(tier, &windows.m6, target, config),
            m12: tier_result(tier, &windows.m12, target, config),
        })
        .collect();

    let best = select_best(&tiers);
    match &best {
        Some(b) => debug!("Best estimate {:?}/{:?}: {} psf over {} sales", b.tier, b.window, b.psf, b.count),
        None => debug!("No tier has data in any window"),
    }

    TierEstimates { tiers, best }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::YearMonth;
    use crate::services::windows::partition;
    use chrono::NaiveDate;

    fn now() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 20).unwrap()
    }

    fn tx(date: &str, area: f64, psf: f64) -> Transaction {
        Transaction::new(date.parse::<YearMonth>().unwrap(), area * psf, area)
    }

    #[test]
    fn only_applicable_tiers_are_produced() {
        let windows = partition(&[tx("2024-05", 900.0, 1800.0)], now());
        let cfg = TierConfig::default();

        let no_target = estimate_tiers(&windows, &TierTarget::default(), &cfg);
        assert_eq!(no_target.tiers.iter().map(|r| r.tier).collect::<Vec<_>>(), vec![Tier::ProjectAvg]);

        let sized = estimate_tiers(&windows, &TierTarget { size: Some(900.0), floor: None }, &cfg);
        assert_eq!(sized.tiers.len(), 2);

        let full = estimate_tiers(&windows, &TierTarget { size: Some(900.0), floor: Some(12.0) }, &cfg);
        assert_eq!(full.tiers.len(), 4);
    }

    #[test]
    fn zero_area_sales_do_not_drag_averages() {
        let txs = vec![
            tx("2024-05", 900.0, 1800.0),
            tx("2024-05", 900.0, 2000.0),
            Transaction::new(YearMonth::new(2024, 5).unwrap(), 1_500_000.0, 0.0),
        ];
        let windows = partition(&txs, now());
        let res = tier_result(Tier::ProjectAvg, &windows.m3, &TierTarget::default(), &TierConfig::default());
        assert_eq!(res.count, 2);
        assert_eq!(res.psf, 1900.0);
    }

    #[test]
    fn empty_tier_uses_zero_sentinel() {
        let windows = partition(&[tx("2024-05", 1500.0, 1800.0)], now());
        let target = TierTarget { size: Some(700.0), floor: None };
        let res = tier_result(Tier::SizeMatch, &windows.m12, &target, &TierConfig::default());
        assert_eq!(res.count, 0);
        assert_eq!(res.psf, 0.0);
        assert!(res.transactions.is_empty());
    }

    #[test]
    fn average_is_rounded_and_newest_first() {
        let data = vec![
            tx("2024-01", 900.0, 1800.0),
            tx("2024-05", 910.0, 1801.0),
            tx("2024-03", 890.0, 1800.0),
        ];
        let res = tier_result(Tier::ProjectAvg, &data, &TierTarget::default(), &TierConfig::default());
        assert_eq!(res.count, 3);
        assert_eq!(res.psf, 1800.0);
        let dates: Vec<String> = res.transactions.iter().map(|t| t.date.to_string()).collect();
        assert_eq!(dates, vec!["2024-05", "2024-03", "2024-01"]);
    }

    #[test]
    fn specificity_beats_recency() {
        // exact match only exists in the 12-month window, project data is recent
        let data = vec![
            tx("2024-06", 1400.0, 1500.0).with_floor_mid(3.0),
            tx("2023-09", 900.0, 2000.0).with_floor_mid(13.0),
        ];
        let windows = partition(&data, now());
        let target = TierTarget { size: Some(900.0), floor: Some(13.0) };
        let est = estimate_tiers(&windows, &target, &TierConfig::default());
        let best = est.best.unwrap();
        assert_eq!(best.tier, Tier::ExactMatch);
        assert_eq!(best.window, TimeWindow::Months12);
        assert_eq!(best.psf, 2000.0);
    }

    #[test]
    fn recency_breaks_ties_within_a_tier() {
        let data = vec![tx("2024-06", 900.0, 1900.0), tx("2023-09", 900.0, 1700.0)];
        let windows = partition(&data, now());
        let est = estimate_tiers(&windows, &TierTarget::default(), &TierConfig::default());
        let best = est.best.unwrap();
        assert_eq!(best.window, TimeWindow::Months3);
        assert_eq!(best.psf, 1900.0);
    }

    #[test]
    fn no_data_gives_no_best_estimate() {
        let windows = partition(&[tx("2019-01", 900.0, 1200.0)], now());
        let est = estimate_tiers(&windows, &TierTarget::default(), &TierConfig::default());
        assert!(est.best.is_none());
        assert_eq!(est.tiers[0].m12.count, 0);
    }
}
