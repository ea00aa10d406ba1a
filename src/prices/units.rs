//! Price string parsing.
//!
//! SIC prices look like `"120 Bs.-/Arroba (@)"`: an integer amount in
//! bolivianos per some upstream unit label. The label is mapped through a fixed
//! table to a `(multiplier, canonical unit)` pair.
//!
//! The table is closed on purpose: a label we don't know is an error, so a new
//! upstream unit shows up as a failed run instead of silently wrong numbers.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;

use crate::domain::{PriceQuantity, Unit};
use crate::error::SourceError;

static PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]+)\s*Bs\.-/(.+)$").expect("Invalid price regex"));

/// Pounds per arroba.
pub const ARROBA_LB: u32 = 25;

/// Unit labels SIC is known to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitLabel {
    Kilo,
    Arroba,
    Amarro,
    Canasta,
    Caja150Unidades,
    Ciento,
    Bolsa2Arrobas,
    BolsaGrande,
    Cuarto25Unidades,
    Docena,
    Quintal,
    Caja18Kg,
    Bolsa10Arrobas,
    Caja23Kg,
    Unidad,
    Libra,
    Bolsa8Arrobas,
    Bolsa4Arrobas,
    TresLibras,
}

impl UnitLabel {
    pub const ALL: [UnitLabel; 19] = [
        UnitLabel::Kilo,
        UnitLabel::Arroba,
        UnitLabel::Amarro,
        UnitLabel::Canasta,
        UnitLabel::Caja150Unidades,
        UnitLabel::Ciento,
        UnitLabel::Bolsa2Arrobas,
        UnitLabel::BolsaGrande,
        UnitLabel::Cuarto25Unidades,
        UnitLabel::Docena,
        UnitLabel::Quintal,
        UnitLabel::Caja18Kg,
        UnitLabel::Bolsa10Arrobas,
        UnitLabel::Caja23Kg,
        UnitLabel::Unidad,
        UnitLabel::Libra,
        UnitLabel::Bolsa8Arrobas,
        UnitLabel::Bolsa4Arrobas,
        UnitLabel::TresLibras,
    ];

    /// The label exactly as SIC prints it.
    pub const fn label(self) -> &'static str {
        match self {
            UnitLabel::Kilo => "Kilo",
            UnitLabel::Arroba => "Arroba (@)",
            UnitLabel::Amarro => "Amarro",
            UnitLabel::Canasta => "Canasta",
            UnitLabel::Caja150Unidades => "Caja (150 unidades)",
            UnitLabel::Ciento => "Ciento (100 unidades)",
            UnitLabel::Bolsa2Arrobas => "Bolsa (2@)",
            UnitLabel::BolsaGrande => "Bolsa grande",
            UnitLabel::Cuarto25Unidades => "Cuarto (25 unidades)",
            UnitLabel::Docena => "Docena",
            UnitLabel::Quintal => "Quintal",
            UnitLabel::Caja18Kg => "Caja (18 Kg.)",
            UnitLabel::Bolsa10Arrobas => "Bolsa (10@)",
            UnitLabel::Caja23Kg => "Caja (23 Kg.)",
            UnitLabel::Unidad => "Unidad",
            UnitLabel::Libra => "Libra",
            UnitLabel::Bolsa8Arrobas => "Bolsa (8@)",
            UnitLabel::Bolsa4Arrobas => "Bolsa (4@)",
            UnitLabel::TresLibras => "Tres libras",
        }
    }

    pub const fn quantity(self) -> (u32, Unit) {
        match self {
            UnitLabel::Kilo => (1, Unit::Kg),
            UnitLabel::Arroba => (ARROBA_LB, Unit::Lb),
            UnitLabel::Amarro => (1, Unit::Amarro),
            UnitLabel::Canasta => (1, Unit::Canasta),
            UnitLabel::Caja150Unidades => (150, Unit::Unit),
            UnitLabel::Ciento => (100, Unit::Unit),
            UnitLabel::Bolsa2Arrobas => (2 * ARROBA_LB, Unit::Lb),
            UnitLabel::BolsaGrande => (1, Unit::BolsaGrande),
            UnitLabel::Cuarto25Unidades => (25, Unit::Unit),
            UnitLabel::Docena => (12, Unit::Unit),
            UnitLabel::Quintal => (112, Unit::Lb),
            UnitLabel::Caja18Kg => (18, Unit::Kg),
            UnitLabel::Bolsa10Arrobas => (10 * ARROBA_LB, Unit::Lb),
            UnitLabel::Caja23Kg => (23, Unit::Kg),
            UnitLabel::Unidad => (1, Unit::Unit),
            UnitLabel::Libra => (1, Unit::Lb),
            UnitLabel::Bolsa8Arrobas => (8 * ARROBA_LB, Unit::Lb),
            UnitLabel::Bolsa4Arrobas => (4 * ARROBA_LB, Unit::Lb),
            UnitLabel::TresLibras => (3, Unit::Lb),
        }
    }

    /// Whitespace-trimmed, ASCII case-insensitive lookup.
    pub fn from_label(label: &str) -> Option<UnitLabel> {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|known| known.label().eq_ignore_ascii_case(label))
    }
}

/// Map a unit label to `(multiplier, unit)`.
pub fn parse_unit(label: &str) -> Result<(u32, Unit), SourceError> {
    UnitLabel::from_label(label)
        .map(UnitLabel::quantity)
        .ok_or_else(|| SourceError::UnknownUnit {
            label: label.trim().to_string(),
        })
}

/// Parse a raw price field.
///
/// Absent, blank, or not shaped like `"<int> Bs.-/<label>"` ⇒ `Ok(None)`.
/// Well-shaped with a label outside the table ⇒ `UnknownUnit`.
pub fn parse_price(raw: Option<&str>) -> Result<Option<PriceQuantity>, SourceError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let Some(caps) = PRICE_RE.captures(raw) else {
        return Ok(None);
    };

    let digits = &caps[1];
    let value = Decimal::from_str(digits).map_err(|e| SourceError::InvalidPrice {
        value: digits.to_string(),
        reason: e.to_string(),
    })?;
    let (multiplier, unit) = parse_unit(&caps[2])?;

    Ok(Some(PriceQuantity {
        value,
        multiplier,
        unit,
    }))
}
