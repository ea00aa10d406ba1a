//! Flat-file exports.
//!
//! - raw SIC export bodies, written as received
//! - normalized price tables as CSV (also the catalog upload payload)

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::{City, ExportFormat, NormalizedRecord, PriceQuantity, Timeframe};
use crate::error::{AppError, SourceError};

/// `precios_<city>_<suffix>.<ext>`
pub fn default_output_path(city: City, timeframe: Timeframe, format: ExportFormat) -> PathBuf {
    PathBuf::from(format!(
        "precios_{}_{}.{}",
        city.url_part(),
        timeframe.file_suffix(),
        format.extension()
    ))
}

/// Write a raw export body as-is.
pub fn write_raw(path: &Path, body: &str) -> Result<(), AppError> {
    fs::write(path, body)
        .map_err(|e| AppError::new(4, format!("Failed to write '{}': {e}", path.display())))
}

#[derive(Serialize)]
struct ExportRow<'a> {
    fecha: NaiveDate,
    producto: &'a str,
    variedad: &'a str,
    procedencia: Option<&'a str>,
    observaciones: Option<&'a str>,
    precio_mayorista: Option<Decimal>,
    multiplicador_mayorista: Option<u32>,
    unidad_mayorista: Option<&'static str>,
    precio_minorista: Option<Decimal>,
    multiplicador_minorista: Option<u32>,
    unidad_minorista: Option<&'static str>,
}

impl<'a> From<&'a NormalizedRecord> for ExportRow<'a> {
    fn from(r: &'a NormalizedRecord) -> Self {
        let split = |q: &Option<PriceQuantity>| match q {
            Some(q) => (Some(q.value), Some(q.multiplier), Some(q.unit.as_str())),
            None => (None, None, None),
        };
        let (precio_mayorista, multiplicador_mayorista, unidad_mayorista) = split(&r.mayorista);
        let (precio_minorista, multiplicador_minorista, unidad_minorista) = split(&r.minorista);

        Self {
            fecha: r.key.fecha,
            producto: &r.key.producto,
            variedad: &r.key.variedad,
            procedencia: r.procedencia.as_deref(),
            observaciones: r.observaciones.as_deref(),
            precio_mayorista,
            multiplicador_mayorista,
            unidad_mayorista,
            precio_minorista,
            multiplicador_minorista,
            unidad_minorista,
        }
    }
}

/// Write normalized records as CSV (header included, even with no rows).
pub fn write_normalized_csv<W: Write>(
    writer: W,
    records: &[NormalizedRecord],
) -> Result<(), SourceError> {
    let mut out = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    out.write_record([
        "fecha",
        "producto",
        "variedad",
        "procedencia",
        "observaciones",
        "precio_mayorista",
        "multiplicador_mayorista",
        "unidad_mayorista",
        "precio_minorista",
        "multiplicador_minorista",
        "unidad_minorista",
    ])?;
    for record in records {
        out.serialize(ExportRow::from(record))?;
    }
    out.flush()?;
    Ok(())
}

/// Normalized CSV as bytes, ready to upload.
pub fn normalized_csv_bytes(records: &[NormalizedRecord]) -> Result<Vec<u8>, SourceError> {
    let mut buf = Vec::new();
    write_normalized_csv(&mut buf, records)?;
    Ok(buf)
}

pub fn write_normalized_file(path: &Path, records: &[NormalizedRecord]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(4, format!("Failed to create '{}': {e}", path.display())))?;
    write_normalized_csv(file, records)
        .map_err(|e| AppError::new(4, format!("Failed to write '{}': {e}", path.display())))
}
