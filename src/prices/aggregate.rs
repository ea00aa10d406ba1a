//! Multi-period aggregation over the (city × year) matrix.
//!
//! SIC coverage is sparse: not every city has every year. Pairs that come
//! back `DataUnavailable` are skipped; any other failure aborts the batch.

use rayon::prelude::*;
use tracing::{info, warn};

use crate::data::PriceSource;
use crate::domain::{City, NormalizedRecord, NormalizedTable, Timeframe, Year};
use crate::error::SourceError;

/// Rows fetched for one (city, year) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coverage {
    pub city: City,
    pub year: Year,
    pub rows: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Aggregate {
    /// All rows, sorted by composite key. Ties keep (city, year) order.
    pub records: Vec<NormalizedRecord>,
    pub covered: Vec<Coverage>,
    pub skipped: Vec<(City, Year)>,
    /// Duplicate rows dropped by the per-table normalizer.
    pub duplicates_dropped: usize,
}

impl Aggregate {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Cartesian product in city-major order.
pub fn matrix(cities: &[City], years: &[Year]) -> Vec<(City, Year)> {
    cities
        .iter()
        .flat_map(|&city| years.iter().map(move |&year| (city, year)))
        .collect()
}

/// Fetch and normalize every (city, year) pair.
///
/// Pairs are fetched in parallel; results are consumed in matrix order so
/// logging, coverage and tie order stay deterministic.
pub fn aggregate<S>(source: &S, cities: &[City], years: &[Year]) -> Result<Aggregate, SourceError>
where
    S: PriceSource + ?Sized,
{
    let pairs = matrix(cities, years);

    let results: Vec<Result<NormalizedTable, SourceError>> = pairs
        .par_iter()
        .map(|&(city, year)| source.fetch_table(city, Timeframe::Year(year)))
        .collect();

    let mut out = Aggregate::default();
    for ((city, year), result) in pairs.into_iter().zip(results) {
        match result {
            Ok(table) => {
                info!(city = %city, year = %year, rows = table.records.len(), "data fetched");
                out.covered.push(Coverage {
                    city,
                    year,
                    rows: table.records.len(),
                });
                out.duplicates_dropped += table.dedup.dropped;
                out.records.extend(table.records);
            }
            Err(e) if e.is_data_unavailable() => {
                warn!(city = %city, year = %year, error = %e, "fetch fail");
                out.skipped.push((city, year));
            }
            Err(e) => return Err(e),
        }
    }

    out.records.sort_by(|a, b| a.key.cmp(&b.key));

    info!(
        rows = out.records.len(),
        covered = out.covered.len(),
        skipped = out.skipped.len(),
        "aggregation done"
    );
    Ok(out)
}
