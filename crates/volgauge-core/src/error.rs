use chrono::NaiveDate;
use thiserror::Error;

use crate::config::ConfigError;
use crate::store::StoreError;

/// Validation errors raised while constructing domain values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol must start with an ASCII letter, digit or '^': '{ch}'")]
    SymbolInvalidStart { ch: char },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error("bar dates must be strictly ascending: {next} follows {previous}")]
    UnorderedBars {
        previous: NaiveDate,
        next: NaiveDate,
    },
    #[error("close on {date} must be finite and positive")]
    InvalidClose { date: NaiveDate },

    #[error("model order '{field}' must be at least {min}, got {value}")]
    InvalidModelOrder {
        field: &'static str,
        min: u32,
        value: u32,
    },
    #[error("invalid distribution '{value}', expected one of normal, t, skewt, ged")]
    InvalidDistribution { value: String },

    #[error("invalid intraday interval '{value}', expected one of 1m, 2m, 5m, 15m, 30m, 60m")]
    InvalidInterval { value: String },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
}

/// Errors that abort a whole reconciliation run before or during the scan.
///
/// Per-forecast problems never surface here; they are counted in the run
/// report instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
