// src/services/filters.rs
use log::debug;
use serde::Serialize;

use crate::models::{FilterSpec, FloorBand, Transaction};

/// Working dataset produced by the master filter.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilteredSet {
    pub transactions: Vec<Transaction>,
    /// False when every filter is `'all'`, so unfiltered aggregates can be reused.
    pub has_filters: bool,
}

fn matches_beds(tx: &Transaction, beds: &str) -> bool {
    tx.bedrooms
        .as_deref()
        .map(|b| b.split('/').any(|part| part.trim() == beds.trim()))
        .unwrap_or(false)
}

fn matches_category(value: Option<&str>, wanted: &str) -> bool {
    value
        .map(|v| v.trim().eq_ignore_ascii_case(wanted.trim()))
        .unwrap_or(false)
}

fn matches_floor_band(tx: &Transaction, band: FloorBand) -> bool {
    tx.floor_mid.and_then(FloorBand::classify) == Some(band)
}

/// True when a transaction passes every active predicate of the spec.
pub fn matches(tx: &Transaction, spec: &FilterSpec) -> bool {
    if let Some(beds) = &spec.beds {
        if !matches_beds(tx, beds) {
            return false;
        }
    }
    if let Some(from) = spec.year_from {
        if tx.year < from {
            return false;
        }
    }
    if let Some(to) = spec.year_to {
        if tx.year > to {
            return false;
        }
    }
    if let Some(sale_type) = &spec.sale_type {
        if !matches_category(tx.sale_type.as_deref(), sale_type) {
            return false;
        }
    }
    if let Some(tenure) = &spec.tenure {
        if !matches_category(tx.tenure.as_deref(), tenure) {
            return false;
        }
    }
    if let Some(band) = spec.floor_band {
        if !matches_floor_band(tx, band) {
            return false;
        }
    }
    true
}

pub fn filter_transactions(transactions: &[Transaction], spec: &FilterSpec) -> FilteredSet {
    let has_filters = spec.has_filters();
    if !has_filters {
        return FilteredSet {
            transactions: transactions.to_vec(),
            has_filters,
        };
    }

    let filtered: Vec<Transaction> = transactions
        .iter()
        .filter(|tx| matches(tx, spec))
        .cloned()
        .collect();

    debug!(
        "Filter {:?} kept {} of {} transactions",
        spec,
        filtered.len(),
        transactions.len()
    );

    FilteredSet {
        transactions: filtered,
        has_filters,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::YearMonth;

    fn tx(date: &str, area: f64) -> Transaction {
        Transaction::new(date.parse::<YearMonth>().unwrap(), area * 1500.0, area)
    }

    fn sample() -> Vec<Transaction> {
        vec![
            tx("2021-03", 700.0).with_bedrooms("2").with_floor_mid(3.0).with_sale_type("New Sale").with_tenure("99 yrs"),
            tx("2022-06", 950.0).with_bedrooms("2/3").with_floor_mid(13.0).with_sale_type("Resale").with_tenure("Freehold"),
            tx("2023-01", 1200.0).with_bedrooms("3").with_floor_mid(23.0).with_sale_type("Resale").with_tenure("99 yrs"),
            tx("2024-08", 500.0).with_bedrooms("1"),
        ]
    }

    #[test]
    fn no_filters_passes_everything_through() {
        let data = sample();
        let set = filter_transactions(&data, &FilterSpec::default());
        assert!(!set.has_filters);
        assert_eq!(set.transactions, data);
    }

    #[test]
    fn bedroom_filter_matches_slash_lists() {
        let spec = FilterSpec { beds: Some("3".into()), ..Default::default() };
        let set = filter_transactions(&sample(), &spec);
        assert!(set.has_filters);
        assert_eq!(set.transactions.len(), 2);
        assert!(set.transactions.iter().all(|t| t.bedrooms.as_deref().unwrap().contains('3')));
    }

    #[test]
    fn year_range_is_inclusive() {
        let spec = FilterSpec { year_from: Some(2022), year_to: Some(2023), ..Default::default() };
        let years: Vec<i32> = filter_transactions(&sample(), &spec)
            .transactions
            .iter()
            .map(|t| t.year)
            .collect();
        assert_eq!(years, vec![2022, 2023]);
    }

    #[test]
    fn predicates_are_conjunctive() {
        let spec = FilterSpec {
            sale_type: Some("resale".into()),
            tenure: Some("99 yrs".into()),
            ..Default::default()
        };
        let set = filter_transactions(&sample(), &spec);
        assert_eq!(set.transactions.len(), 1);
        assert_eq!(set.transactions[0].year, 2023);
    }

    #[test]
    fn floor_band_excludes_missing_floor_only_when_active() {
        let spec = FilterSpec { floor_band: Some(FloorBand::Floors11To15), ..Default::default() };
        let set = filter_transactions(&sample(), &spec);
        assert_eq!(set.transactions.len(), 1);
        assert_eq!(set.transactions[0].floor_mid, Some(13.0));

        let all = filter_transactions(&sample(), &FilterSpec::default());
        assert!(all.transactions.iter().any(|t| t.floor_mid.is_none()));
    }
}
