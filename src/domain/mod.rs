//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - query selectors (`City`, `Year`, `Timeframe`, `ExportFormat`)
//! - normalized market price records (`CompositeKey`, `NormalizedRecord`, `PriceQuantity`)
//! - bus-line geometry (`BusLine`, `LatLng`)

pub mod types;

pub use types::*;
