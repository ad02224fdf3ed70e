// src/services/loader.rs
use anyhow::{anyhow, Context, Result};
use csv::Reader;
use log::{info, warn};
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::models::{FloorBand, Transaction, YearMonth};

/// Transactions grouped by project name.
pub type ProjectTransactions = BTreeMap<String, Vec<Transaction>>;

#[derive(Debug, Deserialize)]
struct CsvRow {
    project: String,
    date: String,
    price: f64,
    area: f64,
    #[serde(default)]
    psf: Option<f64>,
    #[serde(default)]
    floor_range: Option<String>,
    #[serde(default)]
    sale_type: Option<String>,
    #[serde(default)]
    tenure: Option<String>,
    #[serde(default)]
    bedrooms: Option<String>,
}

/// Patterns for the free-form columns of the export.
pub struct LabelParser {
    date: Regex,
    range: Regex,
    open_range: Regex,
    single: Regex,
}

impl LabelParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            date: Regex::new(r"^\s*(\d{4})-(\d{2})(?:-\d{2})?\s*$")?,
            range: Regex::new(r"(?i)^\s*(\d+)\s*(?:-|to)\s*(\d+)\s*$")?,
            open_range: Regex::new(r"^\s*(\d+)\s*\+\s*$")?,
            single: Regex::new(r"^\s*(\d+)\s*$")?,
        })
    }

    /// `"2024-03"` or `"2024-03-17"` to a year-month.
    pub fn year_month(&self, raw: &str) -> Option<YearMonth> {
        let caps = self.date.captures(raw)?;
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        YearMonth::new(year, month)
    }

    /// Midpoint of a floor range label: `"11-15"`, `"11 to 15"`, `"31+"` or `"7"`.
    pub fn floor_mid(&self, label: &str) -> Option<f64> {
        if let Some(caps) = self.range.captures(label) {
            let lo: f64 = caps[1].parse().ok()?;
            let hi: f64 = caps[2].parse().ok()?;
            return Some((lo + hi) / 2.0);
        }
        if let Some(caps) = self.open_range.captures(label) {
            return caps[1].parse().ok();
        }
        self.single.captures(label).and_then(|caps| caps[1].parse().ok())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn to_transaction(row: CsvRow, parser: &LabelParser) -> Result<Option<(String, Transaction)>> {
    let date = parser
        .year_month(&row.date)
        .ok_or_else(|| anyhow!("malformed date '{}'", row.date))?;

    if row.area <= 0.0 {
        warn!("Dropping {} sale on {} with non-positive area", row.project, row.date);
        return Ok(None);
    }
    let psf = row.psf.filter(|p| *p > 0.0).unwrap_or(row.price / row.area);
    if !(psf.is_finite() && psf > 0.0) {
        warn!("Dropping {} sale on {} without a usable PSF", row.project, row.date);
        return Ok(None);
    }

    let floor_range = non_empty(row.floor_range);
    let floor_mid = floor_range.as_deref().and_then(|l| parser.floor_mid(l));
    if floor_range.is_some() && floor_mid.is_none() {
        warn!("Unrecognized floor range {:?} for {} on {}", floor_range, row.project, row.date);
    }

    let tx = Transaction {
        date,
        year: date.year,
        price: row.price,
        area: row.area,
        psf,
        floor_mid,
        floor_range: floor_mid
            .and_then(FloorBand::classify)
            .map(|b| b.label().to_string())
            .or(floor_range),
        sale_type: non_empty(row.sale_type),
        tenure: non_empty(row.tenure),
        bedrooms: non_empty(row.bedrooms),
    };
    Ok(Some((row.project.trim().to_string(), tx)))
}

pub fn load_transactions<R: Read>(reader: R) -> Result<ProjectTransactions> {
    let parser = LabelParser::new()?;
    let mut rdr = Reader::from_reader(reader);
    let mut projects = ProjectTransactions::new();
    let mut dropped = 0usize;

    for (idx, result) in rdr.deserialize::<CsvRow>().enumerate() {
        // header is line 1
        let line = idx + 2;
        let row = result.with_context(|| format!("Failed to parse transaction on line {}", line))?;
        match to_transaction(row, &parser).with_context(|| format!("Invalid transaction on line {}", line))? {
            Some((project, tx)) => projects.entry(project).or_default().push(tx),
            None => dropped += 1,
        }
    }

    let total: usize = projects.values().map(Vec::len).sum();
    info!(
        "Loaded {} transactions across {} projects ({} dropped)",
        total,
        projects.len(),
        dropped
    );
    Ok(projects)
}

pub fn load_transactions_file(path: &Path) -> Result<ProjectTransactions> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    load_transactions(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
project,date,price,area,psf,floor_range,sale_type,tenure,bedrooms
The Crest,2024-03,1800000,1000,,11 to 15,Resale,99 yrs,3
The Crest,2023-11-02,1500000,750,2000,01-05,New Sale,99 yrs,2
Marina View,2022-07,2100000,1050,,31+,Resale,Freehold,3/4
Marina View,2022-08,900000,0,,,Resale,Freehold,1
";

    #[test]
    fn loads_and_groups_by_project() {
        let projects = load_transactions(CSV.as_bytes()).unwrap();
        assert_eq!(projects.len(), 2);
        let crest = &projects["The Crest"];
        assert_eq!(crest.len(), 2);
        assert_eq!(crest[0].psf, 1800.0);
        assert_eq!(crest[0].floor_mid, Some(13.0));
        assert_eq!(crest[0].floor_range.as_deref(), Some("11-15"));
        assert_eq!(crest[1].date.to_string(), "2023-11");
        assert_eq!(crest[1].psf, 2000.0);
        assert_eq!(crest[1].floor_mid, Some(3.0));
    }

    #[test]
    fn drops_rows_without_area() {
        let projects = load_transactions(CSV.as_bytes()).unwrap();
        let marina = &projects["Marina View"];
        assert_eq!(marina.len(), 1);
        assert_eq!(marina[0].floor_mid, Some(31.0));
        assert_eq!(marina[0].bedrooms.as_deref(), Some("3/4"));
    }

    #[test]
    fn malformed_date_is_an_error() {
        let bad = "project,date,price,area,psf,floor_range,sale_type,tenure,bedrooms\nX,March 2024,1,1,,,,,\n";
        let err = load_transactions(bad.as_bytes()).unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"));
    }

    #[test]
    fn floor_labels() {
        let p = LabelParser::new().unwrap();
        assert_eq!(p.floor_mid("06-10"), Some(8.0));
        assert_eq!(p.floor_mid("21 TO 25"), Some(23.0));
        assert_eq!(p.floor_mid("B1"), None);
        assert_eq!(p.floor_mid("7"), Some(7.0));
    }
}
