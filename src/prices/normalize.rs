//! Market price table normalization.
//!
//! Steps, in order:
//!
//! 1. map source header variants to canonical columns
//! 2. parse `fecha` (`DD/MM/YYYY`); one bad date fails the table
//! 3. drop all but the last row for each (fecha, producto, variedad) key
//! 4. check key uniqueness
//! 5. parse both price columns into `PriceQuantity`
//!
//! Output rows keep input order (not sorted).

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use csv::StringRecord;
use tracing::warn;

use crate::domain::{CompositeKey, DedupReport, NormalizedRecord, NormalizedTable};
use crate::error::SourceError;
use crate::io::ingest::RawTable;
use crate::prices::units::parse_price;

const DATE_FORMAT: &str = "%d/%m/%Y";

/// Canonical column set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Fecha,
    Producto,
    Variedad,
    Procedencia,
    PrecioMayorista,
    PrecioMinorista,
    Observaciones,
}

impl Column {
    pub fn canonical_name(self) -> &'static str {
        match self {
            Column::Fecha => "fecha",
            Column::Producto => "producto",
            Column::Variedad => "variedad",
            Column::Procedencia => "procedencia",
            Column::PrecioMayorista => "precio_mayorista",
            Column::PrecioMinorista => "precio_minorista",
            Column::Observaciones => "observaciones",
        }
    }

    /// Resolve a raw header to its canonical column, if known.
    ///
    /// SIC isn't consistent across periods/cities: `Nom_Procedencia` and
    /// `Procedencia`, `Precio Mayorista` and `precio_mayorista`, etc.
    pub fn from_header(name: &str) -> Option<Column> {
        let key = header_key(name);
        let column = match key.as_str() {
            "fecha" => Column::Fecha,
            "producto" | "nom_producto" => Column::Producto,
            "variedad" | "nom_variedad" => Column::Variedad,
            "procedencia" | "nom_procedencia" => Column::Procedencia,
            "precio_mayorista" | "precio_mayor" | "mayorista" => Column::PrecioMayorista,
            "precio_minorista" | "precio_menor" | "minorista" => Column::PrecioMinorista,
            "observaciones" | "observacion" | "obs" => Column::Observaciones,
            _ => return None,
        };
        Some(column)
    }
}

fn header_key(name: &str) -> String {
    // UTF-8 exports sometimes carry a BOM on the first header.
    name.trim()
        .trim_start_matches('\u{feff}')
        .trim()
        .to_lowercase()
        .replace([' ', '-'], "_")
}

/// Column positions after renaming.
#[derive(Debug, Clone)]
pub struct ColumnMap {
    positions: HashMap<Column, usize>,
}

impl ColumnMap {
    pub fn resolve(headers: &StringRecord) -> Result<Self, SourceError> {
        let mut positions = HashMap::new();
        for (idx, name) in headers.iter().enumerate() {
            if let Some(column) = Column::from_header(name) {
                // First occurrence wins when two variants appear together.
                positions.entry(column).or_insert(idx);
            }
        }

        let missing: Vec<&str> = [Column::Fecha, Column::Producto, Column::Variedad]
            .into_iter()
            .filter(|c| !positions.contains_key(c))
            .map(Column::canonical_name)
            .collect();
        if !missing.is_empty() {
            return Err(SourceError::Schema(format!(
                "missing required column(s): {}",
                missing.join(", ")
            )));
        }

        Ok(Self { positions })
    }

    pub fn position(&self, column: Column) -> Option<usize> {
        self.positions.get(&column).copied()
    }

    /// Trimmed, non-empty cell for `column`.
    fn get<'a>(&self, record: &'a StringRecord, column: Column) -> Option<&'a str> {
        let idx = self.position(column)?;
        record.get(idx).map(str::trim).filter(|s| !s.is_empty())
    }
}

struct Keyed<'a> {
    line: usize,
    key: CompositeKey,
    record: &'a StringRecord,
}

pub fn normalize_table(raw: &RawTable) -> Result<NormalizedTable, SourceError> {
    let columns = ColumnMap::resolve(&raw.headers)?;

    // 2) Dates + keys.
    let mut keyed = Vec::with_capacity(raw.len());
    for (idx, record) in raw.records.iter().enumerate() {
        let line = raw.line_of(idx);
        let fecha_raw = columns.get(record, Column::Fecha).unwrap_or("");
        let fecha = NaiveDate::parse_from_str(fecha_raw, DATE_FORMAT).map_err(|_| {
            SourceError::InvalidDate {
                line,
                value: fecha_raw.to_string(),
            }
        })?;

        keyed.push(Keyed {
            line,
            key: CompositeKey {
                fecha,
                producto: columns.get(record, Column::Producto).unwrap_or_default().to_string(),
                variedad: columns.get(record, Column::Variedad).unwrap_or_default().to_string(),
            },
            record,
        });
    }

    // 3) Keep the last occurrence of each key.
    let (kept, dedup) = dedup_keep_last(keyed);
    if dedup.has_duplicates() {
        warn!(
            dropped = dedup.dropped,
            keys = dedup.keys.len(),
            "duplicate (fecha, producto, variedad) keys; keeping last occurrence"
        );
    }

    // 4) Should be unreachable after dedup.
    {
        let mut seen = HashSet::with_capacity(kept.len());
        for row in &kept {
            if !seen.insert(&row.key) {
                return Err(SourceError::InvariantViolation(format!(
                    "key {} still duplicated after dedup",
                    row.key
                )));
            }
        }
    }

    // 5) Prices.
    let mut records = Vec::with_capacity(kept.len());
    for row in kept {
        let mayorista = parse_price(columns.get(row.record, Column::PrecioMayorista))
            .inspect_err(|e| warn!(line = row.line, error = %e, "wholesale price rejected"))?;
        let minorista = parse_price(columns.get(row.record, Column::PrecioMinorista))
            .inspect_err(|e| warn!(line = row.line, error = %e, "retail price rejected"))?;

        records.push(NormalizedRecord {
            procedencia: columns.get(row.record, Column::Procedencia).map(str::to_string),
            observaciones: columns.get(row.record, Column::Observaciones).map(str::to_string),
            key: row.key,
            mayorista,
            minorista,
        });
    }

    Ok(NormalizedTable { records, dedup })
}

fn dedup_keep_last(rows: Vec<Keyed<'_>>) -> (Vec<Keyed<'_>>, DedupReport) {
    let mut last_index: HashMap<CompositeKey, usize> = HashMap::with_capacity(rows.len());
    let mut counts: HashMap<CompositeKey, usize> = HashMap::new();
    let mut duplicated = Vec::new();

    for (idx, row) in rows.iter().enumerate() {
        last_index.insert(row.key.clone(), idx);
        let count = counts.entry(row.key.clone()).or_insert(0);
        *count += 1;
        if *count == 2 {
            duplicated.push(row.key.clone());
        }
    }

    let total = rows.len();
    let kept: Vec<Keyed<'_>> = rows
        .into_iter()
        .enumerate()
        .filter(|(idx, row)| last_index.get(&row.key) == Some(idx))
        .map(|(_, row)| row)
        .collect();

    let report = DedupReport {
        dropped: total - kept.len(),
        keys: duplicated,
    };
    (kept, report)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::domain::Unit;
    use crate::io::ingest::read_raw_table;

    const HEADER_2008: &str =
        "producto,variedad,Nom_Procedencia,Precio Mayorista,Precio Minorista,observaciones,fecha";

    fn table(body: &str) -> RawTable {
        read_raw_table(body).unwrap()
    }

    #[test]
    fn header_variants_resolve_to_canonical_columns() {
        assert_eq!(Column::from_header("Nom_Procedencia"), Some(Column::Procedencia));
        assert_eq!(Column::from_header("Procedencia"), Some(Column::Procedencia));
        assert_eq!(Column::from_header("Precio Mayorista"), Some(Column::PrecioMayorista));
        assert_eq!(Column::from_header("precio_minorista"), Some(Column::PrecioMinorista));
        assert_eq!(Column::from_header("\u{feff}Fecha"), Some(Column::Fecha));
        assert_eq!(Column::from_header("id"), None);
    }

    #[test]
    fn normalizes_rows() {
        let raw = table(&format!(
            "{HEADER_2008}\n\
             Papa,Holandesa,Cochabamba,120 Bs.-/Arroba (@),6 Bs.-/Kilo,Estable,02/01/2008\n\
             Huevo,Rosado,Santa Cruz,,2 Bs.-/Unidad,,02/01/2008\n"
        ));
        let out = normalize_table(&raw).unwrap();
        assert!(!out.dedup.has_duplicates());
        assert_eq!(out.records.len(), 2);

        let papa = &out.records[0];
        assert_eq!(papa.key.fecha, NaiveDate::from_ymd_opt(2008, 1, 2).unwrap());
        assert_eq!(papa.key.producto, "Papa");
        assert_eq!(papa.procedencia.as_deref(), Some("Cochabamba"));
        assert_eq!(papa.observaciones.as_deref(), Some("Estable"));
        let may = papa.mayorista.as_ref().unwrap();
        assert_eq!((may.value, may.multiplier, may.unit), (Decimal::from(120), 25, Unit::Lb));
        let min = papa.minorista.as_ref().unwrap();
        assert_eq!((min.multiplier, min.unit), (1, Unit::Kg));

        let huevo = &out.records[1];
        assert!(huevo.mayorista.is_none());
        assert!(huevo.observaciones.is_none());
        assert_eq!(huevo.minorista.as_ref().map(|q| q.unit), Some(Unit::Unit));
    }

    #[test]
    fn alternate_headers_are_accepted() {
        let raw = table(
            "Fecha,Producto,Variedad,Procedencia,precio_mayorista,precio_minorista,Observaciones\n\
             15/03/2012,Arroz,Grano de oro,Yapacani,250 Bs.-/Quintal,,\n",
        );
        let out = normalize_table(&raw).unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].procedencia.as_deref(), Some("Yapacani"));
        assert_eq!(out.records[0].mayorista.as_ref().map(|q| q.multiplier), Some(112));
    }

    #[test]
    fn duplicate_keys_keep_last_row_and_report() {
        let raw = table(&format!(
            "{HEADER_2008}\n\
             Papa,Holandesa,Cochabamba,100 Bs.-/Arroba (@),,primero,02/01/2008\n\
             Tomate,Perita,Santa Cruz,,5 Bs.-/Kilo,,02/01/2008\n\
             Papa,Holandesa,La Paz,110 Bs.-/Arroba (@),,segundo,02/01/2008\n"
        ));
        let out = normalize_table(&raw).unwrap();

        assert!(out.dedup.has_duplicates());
        assert_eq!(out.dedup.dropped, 1);
        assert_eq!(out.dedup.keys.len(), 1);
        assert_eq!(out.records.len(), 2);

        // Input order of the kept rows.
        assert_eq!(out.records[0].key.producto, "Tomate");
        let papa = &out.records[1];
        assert_eq!(papa.procedencia.as_deref(), Some("La Paz"));
        assert_eq!(papa.observaciones.as_deref(), Some("segundo"));
        assert_eq!(papa.mayorista.as_ref().map(|q| q.value), Some(Decimal::from(110)));
    }

    #[test]
    fn bad_date_fails_whole_table() {
        let raw = table(&format!(
            "{HEADER_2008}\n\
             Papa,Holandesa,Cochabamba,,,,02/01/2008\n\
             Papa,Blanca,Cochabamba,,,,2008-01-03\n"
        ));
        assert!(matches!(
            normalize_table(&raw),
            Err(SourceError::InvalidDate { line: 3, value }) if value == "2008-01-03"
        ));
    }

    #[test]
    fn unknown_unit_is_not_swallowed() {
        let raw = table(&format!(
            "{HEADER_2008}\n\
             Papa,Holandesa,Cochabamba,90 Bs.-/Saco,,,02/01/2008\n"
        ));
        assert!(matches!(
            normalize_table(&raw),
            Err(SourceError::UnknownUnit { .. })
        ));
    }

    #[test]
    fn missing_required_column_is_schema_error() {
        let raw = table("producto,variedad\nPapa,Holandesa\n");
        match normalize_table(&raw) {
            Err(SourceError::Schema(msg)) => assert!(msg.contains("fecha")),
            other => panic!("expected schema error, got {other:?}"),
        }
    }
}
