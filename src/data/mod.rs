//! Remote data sources.
//!
//! - SIC market price exports (`sic`)
//! - cruzero bus-line routes (`cruzero`)
//! - retry/backoff used by the fetchers (`retry`)

use crate::domain::{City, NormalizedTable, Timeframe};
use crate::error::SourceError;

pub mod cruzero;
pub mod retry;
pub mod sic;

pub use cruzero::CruzeroClient;
pub use sic::SicClient;

/// Anything that can produce a normalized price table for a city and period.
///
/// `Sync` so the aggregator can query pairs in parallel.
pub trait PriceSource: Sync {
    fn fetch_table(&self, city: City, timeframe: Timeframe) -> Result<NormalizedTable, SourceError>;
}
