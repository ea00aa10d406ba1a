//! Shared domain types.
//!
//! These types are kept small and serializable so they can be:
//!
//! - parsed straight from CLI arguments (`City`, `Timeframe`, `ExportFormat`)
//! - passed between fetch, normalize and aggregate steps
//! - written back out as CSV/JSON

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Local, NaiveDate};
use clap::ValueEnum;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::SourceError;

/// Municipalities published by SIC.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
)]
pub enum City {
    #[serde(rename = "sc")]
    #[value(name = "sc")]
    SantaCruz,
    #[serde(rename = "cam")]
    #[value(name = "cam")]
    Camiri,
    #[serde(rename = "cbba")]
    #[value(name = "cbba")]
    Cochabamba,
    #[serde(rename = "trd")]
    #[value(name = "trd")]
    Trinidad,
}

impl City {
    pub const ALL: [City; 4] = [City::SantaCruz, City::Camiri, City::Cochabamba, City::Trinidad];

    /// Path segment used in SIC export URLs.
    pub fn url_part(self) -> &'static str {
        match self {
            City::SantaCruz => "sc",
            City::Camiri => "cam",
            City::Cochabamba => "cbba",
            City::Trinidad => "trd",
        }
    }

    /// Upper-case name used for catalog resource and file names.
    pub fn name(self) -> &'static str {
        match self {
            City::SantaCruz => "SANTA_CRUZ",
            City::Camiri => "CAMIRI",
            City::Cochabamba => "COCHABAMBA",
            City::Trinidad => "TRINIDAD",
        }
    }
}

impl fmt::Display for City {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url_part())
    }
}

/// A calendar year SIC has (or may have) a yearly export for.
///
/// Valid range is `[2008, current_year)`: the current year is only served
/// through the daily export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Year(i32);

impl Year {
    pub const MIN: i32 = 2008;

    pub fn new(value: i32) -> Result<Self, SourceError> {
        Self::checked(value, current_year())
    }

    /// Validate against an explicit current year.
    pub fn checked(value: i32, current_year: i32) -> Result<Self, SourceError> {
        if value < Self::MIN || value >= current_year {
            return Err(SourceError::Validation(format!(
                "year {value} is outside [{}, {current_year})",
                Self::MIN
            )));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> i32 {
        self.0
    }

    /// Every valid year in ascending order. Each call starts a fresh iterator.
    pub fn all_valid() -> impl Iterator<Item = Year> {
        (Self::MIN..current_year()).map(Year)
    }
}

impl fmt::Display for Year {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn current_year() -> i32 {
    Local::now().year()
}

/// Which period to export: the current day or a full year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Timeframe {
    Today,
    Year(Year),
}

impl Timeframe {
    /// Path segment used in SIC export URLs.
    pub fn url_part(self) -> String {
        match self {
            Timeframe::Today => "hoy".to_string(),
            Timeframe::Year(year) => format!("{year}_ano"),
        }
    }

    /// Suffix used in default output file names.
    pub fn file_suffix(self) -> String {
        match self {
            Timeframe::Today => "hoy".to_string(),
            Timeframe::Year(year) => year.to_string(),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_suffix())
    }
}

impl FromStr for Timeframe {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("hoy") || s.eq_ignore_ascii_case("today") {
            return Ok(Timeframe::Today);
        }
        let value = s
            .parse::<i32>()
            .map_err(|_| SourceError::Validation(format!("expected 'hoy' or a year, got '{s}'")))?;
        Ok(Timeframe::Year(Year::new(value)?))
    }
}

/// Export format requested from SIC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Xml,
}

impl ExportFormat {
    /// Value of the `type` form field.
    pub fn form_value(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xml => "xml",
        }
    }

    pub fn extension(self) -> &'static str {
        self.form_value()
    }
}

/// Canonical unit a price quantity is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "kg")]
    Kg,
    #[serde(rename = "lb")]
    Lb,
    #[serde(rename = "amarro")]
    Amarro,
    #[serde(rename = "canasta")]
    Canasta,
    #[serde(rename = "unit")]
    Unit,
    #[serde(rename = "bolsa-grande")]
    BolsaGrande,
}

impl Unit {
    pub fn as_str(self) -> &'static str {
        match self {
            Unit::Kg => "kg",
            Unit::Lb => "lb",
            Unit::Amarro => "amarro",
            Unit::Canasta => "canasta",
            Unit::Unit => "unit",
            Unit::BolsaGrande => "bolsa-grande",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed price field: `value` Bs. per `multiplier` × `unit`.
///
/// `"120 Bs.-/Arroba (@)"` becomes `{ value: 120, multiplier: 25, unit: Lb }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuantity {
    pub value: Decimal,
    pub multiplier: u32,
    pub unit: Unit,
}

/// Identity of a price observation.
///
/// Ordering is lexicographic over (date, product, variety).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CompositeKey {
    pub fecha: NaiveDate,
    pub producto: String,
    pub variedad: String,
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.fecha, self.producto, self.variedad)
    }
}

/// One cleaned market price observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub key: CompositeKey,
    pub procedencia: Option<String>,
    pub observaciones: Option<String>,
    /// Wholesale price.
    pub mayorista: Option<PriceQuantity>,
    /// Retail price.
    pub minorista: Option<PriceQuantity>,
}

/// What deduplication dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupReport {
    /// Rows removed because a later row carried the same key.
    pub dropped: usize,
    /// Distinct keys that had more than one row.
    pub keys: Vec<CompositeKey>,
}

impl DedupReport {
    pub fn has_duplicates(&self) -> bool {
        self.dropped > 0
    }
}

/// Normalizer output: records in input order plus the dedup report.
#[derive(Debug, Clone, Default)]
pub struct NormalizedTable {
    pub records: Vec<NormalizedRecord>,
    pub dedup: DedupReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: Decimal,
    pub lng: Decimal,
}

/// A cruzero bus line with its route geometry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusLine {
    pub line_id: u32,
    pub name: String,
    pub speed: Decimal,
    pub distance: Decimal,
    pub total_time: Decimal,
    pub points: Vec<LatLng>,
}
