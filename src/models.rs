// src/models.rs
use chrono::{Datelike, NaiveDate};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Calendar month of a sale, written `"YYYY-MM"`.
///
/// Field order makes the derived ordering match the lexical ordering of the
/// string form, so `date >= cutoff` comparisons behave like the string ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) {
            Some(YearMonth { year, month })
        } else {
            None
        }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        YearMonth {
            year: date.year(),
            month: date.month(),
        }
    }

    fn index(self) -> i64 {
        self.year as i64 * 12 + (self.month as i64 - 1)
    }

    fn from_index(idx: i64) -> Self {
        YearMonth {
            year: idx.div_euclid(12) as i32,
            month: idx.rem_euclid(12) as u32 + 1,
        }
    }

    /// The month `n` calendar months before this one.
    pub fn minus_months(self, n: u32) -> Self {
        Self::from_index(self.index() - n as i64)
    }

    /// Signed number of calendar months from `self` to `later`.
    pub fn months_until(self, later: YearMonth) -> i64 {
        later.index() - self.index()
    }

    /// Mid-month anchor used when measuring elapsed time.
    pub fn anchor(self) -> NaiveDate {
        // month is validated on construction, day 15 exists in every month
        NaiveDate::from_ymd_opt(self.year, self.month, 15).unwrap_or(NaiveDate::MIN)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseYearMonthError(String);

impl fmt::Display for ParseYearMonthError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "invalid year-month '{}', expected YYYY-MM", self.0)
    }
}

impl std::error::Error for ParseYearMonthError {}

impl FromStr for YearMonth {
    type Err = ParseYearMonthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseYearMonthError(s.to_string());
        let (y, m) = s.trim().split_once('-').ok_or_else(err)?;
        if y.len() != 4 || m.len() != 2 {
            return Err(err());
        }
        let year = y.parse::<i32>().map_err(|_| err())?;
        let month = m.parse::<u32>().map_err(|_| err())?;
        YearMonth::new(year, month).ok_or_else(err)
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for YearMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// One historical sale record. Never mutated by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub date: YearMonth,
    pub year: i32,
    pub price: f64,
    /// Square feet.
    pub area: f64,
    pub psf: f64,
    #[serde(default)]
    pub floor_mid: Option<f64>,
    #[serde(default)]
    pub floor_range: Option<String>,
    #[serde(default)]
    pub sale_type: Option<String>,
    #[serde(default)]
    pub tenure: Option<String>,
    /// Slash-delimited bedroom counts, e.g. `"2/3"`.
    #[serde(default)]
    pub bedrooms: Option<String>,
}

impl Transaction {
    pub fn new(date: YearMonth, price: f64, area: f64) -> Self {
        let psf = if area > 0.0 { price / area } else { 0.0 };
        Transaction {
            date,
            year: date.year,
            price,
            area,
            psf,
            floor_mid: None,
            floor_range: None,
            sale_type: None,
            tenure: None,
            bedrooms: None,
        }
    }

    pub fn with_floor_mid(mut self, floor_mid: f64) -> Self {
        self.floor_mid = Some(floor_mid);
        self.floor_range = FloorBand::classify(floor_mid).map(|b| b.label().to_string());
        self
    }

    pub fn with_bedrooms(mut self, bedrooms: &str) -> Self {
        self.bedrooms = Some(bedrooms.to_string());
        self
    }

    pub fn with_sale_type(mut self, sale_type: &str) -> Self {
        self.sale_type = Some(sale_type.to_string());
        self
    }

    pub fn with_tenure(mut self, tenure: &str) -> Self {
        self.tenure = Some(tenure.to_string());
        self
    }

    /// Usable by the scorer: PSF is a positive, finite number.
    pub fn has_valid_psf(&self) -> bool {
        self.psf.is_finite() && self.psf > 0.0
    }
}

/// Fixed floor bands shared by filtering, tiering and floor premiums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FloorBand {
    Floors1To5,
    Floors6To10,
    Floors11To15,
    Floors16To20,
    Floors21To30,
    Floors31Plus,
}

impl FloorBand {
    /// All bands, lowest floors first.
    pub const ALL: [FloorBand; 6] = [
        FloorBand::Floors1To5,
        FloorBand::Floors6To10,
        FloorBand::Floors11To15,
        FloorBand::Floors16To20,
        FloorBand::Floors21To30,
        FloorBand::Floors31Plus,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FloorBand::Floors1To5 => "1-5",
            FloorBand::Floors6To10 => "6-10",
            FloorBand::Floors11To15 => "11-15",
            FloorBand::Floors16To20 => "16-20",
            FloorBand::Floors21To30 => "21-30",
            FloorBand::Floors31Plus => "31+",
        }
    }

    /// Band holding a floor midpoint. Anything below the first floor lands in `1-5`.
    pub fn classify(floor_mid: f64) -> Option<FloorBand> {
        if !floor_mid.is_finite() {
            return None;
        }
        let band = if floor_mid <= 5.0 {
            FloorBand::Floors1To5
        } else if floor_mid <= 10.0 {
            FloorBand::Floors6To10
        } else if floor_mid <= 15.0 {
            FloorBand::Floors11To15
        } else if floor_mid <= 20.0 {
            FloorBand::Floors16To20
        } else if floor_mid <= 30.0 {
            FloorBand::Floors21To30
        } else {
            FloorBand::Floors31Plus
        };
        Some(band)
    }
}

impl fmt::Display for FloorBand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for FloorBand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        FloorBand::ALL
            .iter()
            .copied()
            .find(|b| b.label() == s)
            .ok_or_else(|| format!("unknown floor band '{}'", s))
    }
}

impl Serialize for FloorBand {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for FloorBand {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Master filter. `None` in any field means `'all'`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSpec {
    #[serde(default, deserialize_with = "all_as_none")]
    pub beds: Option<String>,
    #[serde(default, deserialize_with = "all_as_none")]
    pub year_from: Option<i32>,
    #[serde(default, deserialize_with = "all_as_none")]
    pub year_to: Option<i32>,
    #[serde(default, deserialize_with = "all_as_none")]
    pub sale_type: Option<String>,
    #[serde(default, deserialize_with = "all_as_none")]
    pub tenure: Option<String>,
    #[serde(default, deserialize_with = "all_as_none")]
    pub floor_band: Option<FloorBand>,
}

impl FilterSpec {
    pub fn has_filters(&self) -> bool {
        self.beds.is_some()
            || self.year_from.is_some()
            || self.year_to.is_some()
            || self.sale_type.is_some()
            || self.tenure.is_some()
            || self.floor_band.is_some()
    }
}

/// Reads an optional value given as a string, mapping `"all"` and `""` to `None`.
///
/// Values always arrive as strings (query parameters, flattened structs), so the
/// typed value is produced with `FromStr`.
pub fn all_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(s) if s.trim().is_empty() || s.trim().eq_ignore_ascii_case("all") => Ok(None),
        Some(s) => s.trim().parse::<T>().map(Some).map_err(de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_month_parses_and_orders_like_strings() {
        let a: YearMonth = "2023-09".parse().unwrap();
        let b: YearMonth = "2023-10".parse().unwrap();
        assert!(a < b);
        assert_eq!(a.to_string() < b.to_string(), a < b);
        assert_eq!(b.to_string(), "2023-10");
    }

    #[test]
    fn year_month_rejects_malformed() {
        assert!("2023-13".parse::<YearMonth>().is_err());
        assert!("2023/01".parse::<YearMonth>().is_err());
        assert!("23-01".parse::<YearMonth>().is_err());
        assert!("2023-1".parse::<YearMonth>().is_err());
    }

    #[test]
    fn month_arithmetic_crosses_years() {
        let ym = YearMonth::new(2024, 2).unwrap();
        assert_eq!(ym.minus_months(2), YearMonth::new(2023, 12).unwrap());
        assert_eq!(ym.minus_months(14), YearMonth::new(2022, 12).unwrap());
        assert_eq!(YearMonth::new(2022, 12).unwrap().months_until(ym), 14);
        assert_eq!(ym.months_until(YearMonth::new(2022, 12).unwrap()), -14);
    }

    #[test]
    fn floor_band_boundaries() {
        assert_eq!(FloorBand::classify(0.0), Some(FloorBand::Floors1To5));
        assert_eq!(FloorBand::classify(5.0), Some(FloorBand::Floors1To5));
        assert_eq!(FloorBand::classify(8.0), Some(FloorBand::Floors6To10));
        assert_eq!(FloorBand::classify(13.0), Some(FloorBand::Floors11To15));
        assert_eq!(FloorBand::classify(30.0), Some(FloorBand::Floors21To30));
        assert_eq!(FloorBand::classify(45.0), Some(FloorBand::Floors31Plus));
        assert_eq!(FloorBand::classify(f64::NAN), None);
        assert_eq!("11-15".parse::<FloorBand>(), Ok(FloorBand::Floors11To15));
    }

    #[test]
    fn filter_spec_treats_all_as_unset() {
        let spec: FilterSpec = serde_json::from_str(
            r#"{"beds":"all","yearFrom":"2020","saleType":"Resale","floorBand":"all"}"#,
        )
        .unwrap();
        assert_eq!(spec.beds, None);
        assert_eq!(spec.year_from, Some(2020));
        assert_eq!(spec.sale_type.as_deref(), Some("Resale"));
        assert_eq!(spec.floor_band, None);
        assert!(spec.has_filters());
        assert!(!FilterSpec::default().has_filters());
    }
}
