//! Input/output helpers.
//!
//! - SIC CSV ingest (`ingest`)
//! - raw + normalized table exports (`export`)
//! - bus-line GeoJSON (`geojson`)

pub mod export;
pub mod geojson;
pub mod ingest;

pub use export::*;
pub use geojson::*;
pub use ingest::*;
