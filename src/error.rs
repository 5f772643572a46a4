//! Error types for the dividend screener
//!
//! Only the store and market-data boundaries produce errors. Valuation,
//! signal assignment and filtering always yield a value.

use thiserror::Error;

/// Longest cause text carried inside an error
pub const MAX_CAUSE_LEN: usize = 50;

/// Main error type for the dividend screener
#[derive(Error, Debug)]
pub enum ScreenerError {
    #[error("Instrument store unavailable during {operation}: {cause}")]
    StoreUnavailable { operation: String, cause: String },

    #[error("Failed to persist {operation} for {ticker}: {cause}")]
    PersistenceFailed {
        operation: String,
        ticker: String,
        cause: String,
    },

    #[error("Ticker already exists: {0}")]
    DuplicateTicker(String),

    #[error("Ticker not found: {0}")]
    TickerNotFound(String),

    #[error("Invalid ticker: {0:?}")]
    InvalidTicker(String),

    #[error("Market data lookup failed for {ticker}: {cause}")]
    MarketData { ticker: String, cause: String },

    #[error("Unknown preset: {0}")]
    UnknownPreset(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

impl ScreenerError {
    /// Store could not be reached
    pub fn store_unavailable(operation: &str, cause: impl std::fmt::Display) -> Self {
        Self::StoreUnavailable {
            operation: operation.to_string(),
            cause: summarize(cause),
        }
    }

    /// Store write failed
    pub fn persistence(
        operation: &str,
        ticker: impl Into<String>,
        cause: impl std::fmt::Display,
    ) -> Self {
        Self::PersistenceFailed {
            operation: operation.to_string(),
            ticker: ticker.into(),
            cause: summarize(cause),
        }
    }

    /// Market-data lookup failed for one ticker
    pub fn market_data(ticker: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::MarketData {
            ticker: ticker.into(),
            cause: summarize(cause),
        }
    }

    /// True for store read/write failures
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable { .. } | Self::PersistenceFailed { .. }
        )
    }
}

/// Bounded, single-line summary of an underlying cause
pub fn summarize(cause: impl std::fmt::Display) -> String {
    let text = cause.to_string();
    let line = text.lines().next().unwrap_or("").trim();
    if line.chars().count() <= MAX_CAUSE_LEN {
        line.to_string()
    } else {
        line.chars().take(MAX_CAUSE_LEN).collect()
    }
}

/// Result type alias for dividend screener operations
pub type Result<T> = std::result::Result<T, ScreenerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize_truncates() {
        let long = "x".repeat(200);
        assert_eq!(summarize(&long).len(), MAX_CAUSE_LEN);
        assert_eq!(summarize("short"), "short");
    }

    #[test]
    fn test_summarize_first_line_only() {
        assert_eq!(summarize("connection refused\nstack trace here"), "connection refused");
    }

    #[test]
    fn test_persistence_message() {
        let err = ScreenerError::persistence("edit", "BBCA", "disk full");
        let msg = err.to_string();
        assert!(msg.contains("edit"));
        assert!(msg.contains("BBCA"));
        assert!(msg.contains("disk full"));
        assert!(err.is_store_failure());
    }

    #[test]
    fn test_invariant_errors_are_not_store_failures() {
        assert!(!ScreenerError::DuplicateTicker("BBRI".into()).is_store_failure());
        assert!(!ScreenerError::TickerNotFound("BBRI".into()).is_store_failure());
    }
}
