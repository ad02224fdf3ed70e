// src/services/engine.rs
use chrono::NaiveDate;
use chrono_tz::Tz;
use log::debug;
use std::borrow::Cow;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use crate::config::today_in;
use crate::models::{FilterSpec, Transaction, YearMonth};
use super::calculations::{compute_bucket_cagr, time_adjust, CagrResult, TimeAdjustment};
use super::filters::{filter_transactions, FilteredSet};
use super::floor_premium::{compute_floor_premiums, FloorPremiumTable};
use super::tiers::{estimate_tiers, TierConfig, TierEstimates, TierTarget};
use super::valuation::{value_unit, ValuationInput, ValuationModel};
use super::windows::{partition, TimeWindows};

/// Memoized valuations kept per engine before the cache is flushed.
pub const MEMO_CAPACITY: usize = 1024;

/// Query surface over one project's transactions.
///
/// Every query is a pure function of the stored transactions, `now` and its
/// arguments. Aggregates over the unfiltered set are computed once up front
/// and reused whenever a query arrives without active filters.
pub struct ValuationEngine {
    project: String,
    transactions: Vec<Transaction>,
    data_version: u64,
    now: NaiveDate,
    tier_config: TierConfig,
    baseline_cagr: CagrResult,
    baseline_floors: FloorPremiumTable,
    memo: Mutex<HashMap<u64, Option<ValuationModel>>>,
}

impl ValuationEngine {
    pub fn new(project: impl Into<String>, transactions: Vec<Transaction>, data_version: u64, now: NaiveDate) -> Self {
        let baseline_cagr = compute_bucket_cagr(&transactions, None, None);
        let baseline_floors = compute_floor_premiums(&transactions);
        let project = project.into();
        debug!(
            "Engine for '{}' v{}: {} transactions, now {}",
            project,
            data_version,
            transactions.len(),
            now
        );
        Self {
            project,
            transactions,
            data_version,
            now,
            tier_config: TierConfig::default(),
            baseline_cagr,
            baseline_floors,
            memo: Mutex::new(HashMap::new()),
        }
    }

    /// Engine anchored to today's date in `tz`.
    pub fn at_wall_clock(project: impl Into<String>, transactions: Vec<Transaction>, data_version: u64, tz: Tz) -> Self {
        Self::new(project, transactions, data_version, today_in(tz))
    }

    pub fn with_tier_config(mut self, tier_config: TierConfig) -> Self {
        self.tier_config = tier_config;
        self
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn now(&self) -> NaiveDate {
        self.now
    }

    pub fn data_version(&self) -> u64 {
        self.data_version
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    pub fn filtered_transactions(&self, spec: &FilterSpec) -> FilteredSet {
        filter_transactions(&self.transactions, spec)
    }

    pub fn time_windows(&self, spec: &FilterSpec) -> TimeWindows {
        partition(&self.filtered_transactions(spec).transactions, self.now)
    }

    pub fn tier_estimates(&self, spec: &FilterSpec, target_size: Option<f64>, target_floor: Option<f64>) -> TierEstimates {
        let windows = self.time_windows(spec);
        let target = TierTarget {
            size: target_size,
            floor: target_floor,
        };
        estimate_tiers(&windows, &target, &self.tier_config)
    }

    fn cagr_for(&self, filtered: &FilteredSet, start: Option<i32>, end: Option<i32>) -> Cow<'_, CagrResult> {
        if !filtered.has_filters && start.is_none() && end.is_none() {
            Cow::Borrowed(&self.baseline_cagr)
        } else {
            Cow::Owned(compute_bucket_cagr(&filtered.transactions, start, end))
        }
    }

    fn floors_for(&self, filtered: &FilteredSet) -> Cow<'_, FloorPremiumTable> {
        if filtered.has_filters {
            Cow::Owned(compute_floor_premiums(&filtered.transactions))
        } else {
            Cow::Borrowed(&self.baseline_floors)
        }
    }

    pub fn bucket_cagr(&self, spec: &FilterSpec, start_year: Option<i32>, end_year: Option<i32>) -> CagrResult {
        let filtered = self.filtered_transactions(spec);
        self.cagr_for(&filtered, start_year, end_year).into_owned()
    }

    /// Projects `psf` from `date` to `now` with the growth rate of the filtered set.
    pub fn time_adjust(&self, spec: &FilterSpec, psf: f64, date: YearMonth) -> TimeAdjustment {
        let filtered = self.filtered_transactions(spec);
        let cagr = self.cagr_for(&filtered, None, None);
        time_adjust(psf, date, cagr.cagr_percent, self.now)
    }

    pub fn floor_premiums(&self, spec: &FilterSpec) -> FloorPremiumTable {
        let filtered = self.filtered_transactions(spec);
        self.floors_for(&filtered).into_owned()
    }

    fn memo_key(&self, spec: &FilterSpec, target_size: f64, target_floor: Option<f64>) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.data_version.hash(&mut hasher);
        spec.hash(&mut hasher);
        target_size.to_bits().hash(&mut hasher);
        target_floor.map(f64::to_bits).hash(&mut hasher);
        hasher.finish()
    }

    pub fn valuation_model(&self, spec: &FilterSpec, target_size: f64, target_floor: Option<f64>) -> Option<ValuationModel> {
        let key = self.memo_key(spec, target_size, target_floor);
        if let Some(hit) = self.memo.lock().unwrap_or_else(|e| e.into_inner()).get(&key) {
            debug!("Valuation memo hit for '{}'", self.project);
            return hit.clone();
        }

        let filtered = self.filtered_transactions(spec);
        let cagr = self.cagr_for(&filtered, None, None);
        let floors = self.floors_for(&filtered);
        let model = value_unit(&ValuationInput {
            transactions: &filtered.transactions,
            target_size,
            target_floor,
            cagr_percent: cagr.cagr_percent,
            floor_premiums: Some(&*floors),
            now: self.now,
        });

        let mut memo = self.memo.lock().unwrap_or_else(|e| e.into_inner());
        if memo.len() >= MEMO_CAPACITY {
            debug!("Valuation memo for '{}' full, clearing {} entries", self.project, memo.len());
            memo.clear();
        }
        memo.insert(key, model.clone());
        model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FloorBand;

    fn now() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, 16).unwrap()
    }

    fn sale(date: &str, area: f64, psf: f64, floor: f64) -> Transaction {
        Transaction::new(date.parse::<YearMonth>().unwrap(), area * psf, area)
            .with_floor_mid(floor)
            .with_bedrooms(if area < 800.0 { "2" } else { "3" })
    }

    fn project() -> Vec<Transaction> {
        vec![
            sale("2021-03", 700.0, 1500.0, 3.0),
            sale("2021-05", 900.0, 1500.0, 8.0),
            sale("2021-11", 950.0, 1500.0, 13.0),
            sale("2024-02", 700.0, 1800.0, 3.0),
            sale("2024-07", 900.0, 1800.0, 13.0),
            sale("2024-09", 920.0, 1800.0, 18.0),
        ]
    }

    #[test]
    fn unfiltered_queries_reuse_baseline() {
        let engine = ValuationEngine::new("The Crest", project(), 1, now());
        let cagr = engine.bucket_cagr(&FilterSpec::default(), None, None);
        assert_eq!(cagr, engine.baseline_cagr);
        assert!(!cagr.low_confidence);
        assert!((cagr.cagr_percent.unwrap() - 6.2659).abs() < 0.01);
        assert_eq!(engine.floor_premiums(&FilterSpec::default()), engine.baseline_floors);
    }

    #[test]
    fn filtered_floor_premiums_are_recomputed() {
        let engine = ValuationEngine::new("The Crest", project(), 1, now());
        let spec = FilterSpec { beds: Some("3".into()), ..Default::default() };
        let table = engine.floor_premiums(&spec);
        assert_eq!(table.baseline, Some(FloorBand::Floors6To10));
        assert_ne!(table, engine.baseline_floors);
    }

    #[test]
    fn filtered_cagr_flags_thin_endpoints() {
        let engine = ValuationEngine::new("The Crest", project(), 1, now());
        let spec = FilterSpec { beds: Some("2".into()), ..Default::default() };
        let cagr = engine.bucket_cagr(&spec, None, None);
        assert_eq!((cagr.start_n, cagr.end_n), (1, 1));
        assert!(cagr.low_confidence);
        assert!(cagr.cagr_percent.is_some());
    }

    #[test]
    fn valuation_is_memoized_per_key() {
        let engine = ValuationEngine::new("The Crest", project(), 7, now());
        let spec = FilterSpec::default();
        let first = engine.valuation_model(&spec, 900.0, Some(13.0)).unwrap();
        let second = engine.valuation_model(&spec, 900.0, Some(13.0)).unwrap();
        assert_eq!(first, second);
        assert_eq!(engine.memo.lock().unwrap().len(), 1);

        let other = engine.valuation_model(&spec, 700.0, None).unwrap();
        assert_eq!(other.floor_match_count, None);
        assert_eq!(engine.memo.lock().unwrap().len(), 2);
    }

    #[test]
    fn thin_filter_gives_no_valuation() {
        let engine = ValuationEngine::new("The Crest", project(), 1, now());
        let spec = FilterSpec { beds: Some("2".into()), ..Default::default() };
        assert!(engine.valuation_model(&spec, 700.0, None).is_none());
    }

    #[test]
    fn tier_estimates_run_on_filtered_windows() {
        let engine = ValuationEngine::new("The Crest", project(), 1, now());
        let est = engine.tier_estimates(&FilterSpec::default(), Some(900.0), Some(13.0));
        let best = est.best.unwrap();
        assert_eq!(best.psf, 1800.0);
        assert_eq!(best.count, 1);
    }

    #[test]
    fn size_tolerance_is_configurable() {
        let narrow = ValuationEngine::new("The Crest", project(), 1, now());
        let wide = ValuationEngine::new("The Crest", project(), 1, now())
            .with_tier_config(TierConfig { size_tolerance: 0.5 });
        let spec = FilterSpec::default();
        assert_eq!(narrow.tier_estimates(&spec, Some(900.0), None).tiers[1].m12.count, 2);
        assert_eq!(wide.tier_estimates(&spec, Some(900.0), None).tiers[1].m12.count, 3);
    }

    #[test]
    fn memo_is_bounded() {
        let engine = ValuationEngine::new("The Crest", project(), 1, now());
        let spec = FilterSpec::default();
        for i in 0..(MEMO_CAPACITY + 100) {
            engine.valuation_model(&spec, 900.0 + i as f64 / 100.0, None);
            assert!(engine.memo.lock().unwrap().len() <= MEMO_CAPACITY);
        }
        assert!(engine.valuation_model(&spec, 900.0, None).is_some());
    }

    #[test]
    fn wall_clock_engine_uses_market_zone() {
        let tz = chrono_tz::Asia::Singapore;
        let engine = ValuationEngine::at_wall_clock("Empty", Vec::new(), 1, tz);
        assert_eq!(engine.now(), today_in(tz));
        assert!(engine.valuation_model(&FilterSpec::default(), 900.0, None).is_none());
        assert!(engine.floor_premiums(&FilterSpec::default()).bands.is_empty());
    }

    #[test]
    fn time_adjust_uses_project_growth() {
        let engine = ValuationEngine::new("The Crest", project(), 1, now());
        let adj = engine.time_adjust(&FilterSpec::default(), 1500.0, "2023-10".parse().unwrap());
        assert_eq!(adj.months_elapsed, 12);
        assert!(adj.rate_used.is_some());
        assert!(adj.adjusted_psf > 1500.0);
    }
}
