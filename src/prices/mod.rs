//! Market price processing: unit parsing, table normalization, and
//! aggregation across cities and years.

pub mod aggregate;
pub mod normalize;
pub mod units;

pub use aggregate::{Aggregate, Coverage, aggregate};
pub use normalize::normalize_table;
pub use units::{parse_price, parse_unit};
