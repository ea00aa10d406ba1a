//! Error types.
//!
//! Library modules return [`SourceError`] (scraping + normalization) or
//! [`CatalogError`] (publishing). Both collapse into [`AppError`] at the binary
//! boundary, which carries the process exit code:
//!
//! - `2` invalid input / configuration / schema
//! - `3` no data, or data the normalizer refuses (unknown unit, bad date)
//! - `4` network, decoding, catalog or filesystem failures
//! - `5` internal invariant violated

use thiserror::Error;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Failures while fetching or normalizing source data.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source has nothing for this query. Batch callers skip it.
    #[error("no data available for {query}: {reason}")]
    DataUnavailable { query: String, reason: String },

    /// A price carries a unit label missing from the unit table.
    #[error("unknown unit label '{label}'")]
    UnknownUnit { label: String },

    /// A well-shaped price whose amount does not fit a decimal.
    #[error("price amount '{value}' out of range: {reason}")]
    InvalidPrice { value: String, reason: String },

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("response is not valid UTF-8: {0}")]
    Decode(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("unexpected table layout: {0}")]
    Schema(String),

    #[error("invalid date '{value}' on line {line} (expected DD/MM/YYYY)")]
    InvalidDate { line: usize, value: String },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SourceError {
    pub fn exit_code(&self) -> u8 {
        match self {
            SourceError::Validation(_) | SourceError::Schema(_) => 2,
            SourceError::DataUnavailable { .. }
            | SourceError::UnknownUnit { .. }
            | SourceError::InvalidPrice { .. }
            | SourceError::InvalidDate { .. } => 3,
            SourceError::Http(_)
            | SourceError::Decode(_)
            | SourceError::Csv(_)
            | SourceError::Json(_)
            | SourceError::Io(_) => 4,
            SourceError::InvariantViolation(_) => 5,
        }
    }

    pub fn is_data_unavailable(&self) -> bool {
        matches!(self, SourceError::DataUnavailable { .. })
    }

    /// Transport-level failures worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Http(_))
    }
}

impl From<SourceError> for AppError {
    fn from(err: SourceError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

/// Failures while talking to the CKAN catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog object not found: {0}")]
    NotFound(String),

    #[error("catalog API error: {0}")]
    Api(String),

    #[error("{count} resources named '{name}' found, expected at most one")]
    Ambiguous { name: String, count: usize },

    #[error("catalog request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        AppError::new(4, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_kind() {
        let unavailable = SourceError::DataUnavailable {
            query: "sc/2010_ano".to_string(),
            reason: "HTTP 404".to_string(),
        };
        assert_eq!(unavailable.exit_code(), 3);
        assert!(unavailable.is_data_unavailable());
        assert!(!unavailable.is_transient());

        assert_eq!(SourceError::Validation("year".to_string()).exit_code(), 2);
        assert_eq!(SourceError::InvariantViolation("dup".to_string()).exit_code(), 5);

        let app: AppError = SourceError::UnknownUnit { label: "Sack".to_string() }.into();
        assert_eq!(app.exit_code(), 3);
        assert_eq!(app.to_string(), "unknown unit label 'Sack'");

        let overflow = SourceError::InvalidPrice {
            value: "9".repeat(30),
            reason: "overflow".to_string(),
        };
        assert_eq!(overflow.exit_code(), 3);
    }

    #[test]
    fn catalog_errors_map_to_external_failure() {
        let app: AppError = CatalogError::Ambiguous {
            name: "precios SANTA_CRUZ".to_string(),
            count: 2,
        }
        .into();
        assert_eq!(app.exit_code(), 4);
    }
}
