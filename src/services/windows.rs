// src/services/windows.rs
use chrono::{Datelike, NaiveDate};
use log::debug;
use serde::Serialize;

use crate::models::{Transaction, YearMonth};

/// Rolling lookback windows, each including the current partial month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TimeWindow {
    #[serde(rename = "3m")]
    Months3,
    #[serde(rename = "6m")]
    Months6,
    #[serde(rename = "12m")]
    Months12,
}

impl TimeWindow {
    /// Most recent first; this is the fallback order for best-estimate selection.
    pub const ALL: [TimeWindow; 3] = [TimeWindow::Months3, TimeWindow::Months6, TimeWindow::Months12];

    pub fn months(self) -> u32 {
        match self {
            TimeWindow::Months3 => 3,
            TimeWindow::Months6 => 6,
            TimeWindow::Months12 => 12,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TimeWindows {
    pub m3: Vec<Transaction>,
    pub m6: Vec<Transaction>,
    pub m12: Vec<Transaction>,
}

impl TimeWindows {
    pub fn get(&self, window: TimeWindow) -> &[Transaction] {
        match window {
            TimeWindow::Months3 => &self.m3,
            TimeWindow::Months6 => &self.m6,
            TimeWindow::Months12 => &self.m12,
        }
    }
}

/// First month of a `months`-long window ending in the month of `now`.
pub fn cutoff(now: NaiveDate, months: u32) -> YearMonth {
    YearMonth::from_date(now).minus_months(months.saturating_sub(1))
}

pub fn in_window(tx: &Transaction, now: NaiveDate, months: u32) -> bool {
    tx.date >= cutoff(now, months)
}

pub fn partition(transactions: &[Transaction], now: NaiveDate) -> TimeWindows {
    let pick = |months: u32| -> Vec<Transaction> {
        transactions
            .iter()
            .filter(|tx| in_window(tx, now, months))
            .cloned()
            .collect()
    };

    let windows = TimeWindows {
        m3: pick(TimeWindow::Months3.months()),
        m6: pick(TimeWindow::Months6.months()),
        m12: pick(TimeWindow::Months12.months()),
    };
    debug!(
        "Windows at {}: 3m={} 6m={} 12m={}",
        now,
        windows.m3.len(),
        windows.m6.len(),
        windows.m12.len()
    );
    windows
}

/// Whole months from the 15th of `date`'s month to `now`, never negative.
///
/// A month counts once `now` reaches the same day of the following month, so
/// a sale in the current month is always zero months old.
pub fn months_elapsed(date: YearMonth, now: NaiveDate) -> u32 {
    let anchor = date.anchor();
    let mut months = date.months_until(YearMonth::from_date(now));
    if now.day() < anchor.day() {
        months -= 1;
    }
    months.max(0) as u32
}
