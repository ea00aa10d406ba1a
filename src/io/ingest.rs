//! Raw CSV ingest.
//!
//! Turns a SIC CSV export body into a header row plus string records. No
//! renaming or type conversion happens here; that is `prices::normalize`.

use csv::StringRecord;

use crate::error::SourceError;

/// A SIC export as returned by the source, headers untouched.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub headers: StringRecord,
    pub records: Vec<StringRecord>,
}

impl RawTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 1-based source line of the record at `idx` (header is line 1).
    pub fn line_of(&self, idx: usize) -> usize {
        self.records
            .get(idx)
            .and_then(|r| r.position())
            .map(|p| p.line() as usize)
            .unwrap_or(idx + 2)
    }
}

/// Parse a CSV export body.
///
/// Rows may be ragged (SIC drops trailing empty cells) and every cell is
/// trimmed. Blank lines are skipped by the CSV reader.
pub fn read_raw_table(text: &str) -> Result<RawTable, SourceError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(SourceError::Schema("export has no header row".to_string()));
    }

    let records = reader.records().collect::<Result<Vec<_>, _>>()?;

    Ok(RawTable { headers, records })
}
