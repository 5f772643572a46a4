//! Core types and constants
//!
//! Two numeric scales flow through the screener and must never be mixed:
//! [`Percent`] holds percentage points (17.3 means 17.3%) and is used for ROE,
//! DPR and filter thresholds, while [`Fraction`] holds decimal fractions
//! (0.25 means 25%) and is used for discount and dividend yield.

use crate::error::{Result, ScreenerError};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Timestamp of the last manual edit
pub type Timestamp = NaiveDateTime;

/// Price type (currency units per share)
pub type Price = f64;

/// Format used when timestamps are written to text stores
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Percentage-scaled value (17.3 == 17.3%)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Percent(pub f64);

/// Decimal-fraction value (0.173 == 17.3%)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fraction(pub f64);

impl Percent {
    pub fn value(self) -> f64 {
        self.0
    }

    pub fn as_fraction(self) -> Fraction {
        Fraction(self.0 / 100.0)
    }

    pub fn is_nan(self) -> bool {
        self.0.is_nan()
    }
}

impl Fraction {
    pub fn value(self) -> f64 {
        self.0
    }

    pub fn as_percent(self) -> Percent {
        Percent(self.0 * 100.0)
    }

    pub fn is_nan(self) -> bool {
        self.0.is_nan()
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}%", self.0)
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}%", self.0 * 100.0)
    }
}

/// Unique instrument key: trimmed, upper-case, no whitespace
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ticker(String);

impl Ticker {
    pub fn parse(raw: &str) -> Result<Self> {
        let symbol = raw.trim().to_uppercase();
        if symbol.is_empty() || symbol.chars().any(char::is_whitespace) {
            return Err(ScreenerError::InvalidTicker(raw.to_string()));
        }
        Ok(Self(symbol))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Ticker {
    type Err = ScreenerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Ticker {
    type Error = ScreenerError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Ticker> for String {
    fn from(ticker: Ticker) -> Self {
        ticker.0
    }
}

/// Expected dividend payment month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Month {
    January,
    February,
    March,
    April,
    May,
    June,
    July,
    August,
    September,
    October,
    November,
    December,
}

impl Month {
    pub const ALL: [Month; 12] = [
        Month::January,
        Month::February,
        Month::March,
        Month::April,
        Month::May,
        Month::June,
        Month::July,
        Month::August,
        Month::September,
        Month::October,
        Month::November,
        Month::December,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Month::January => "January",
            Month::February => "February",
            Month::March => "March",
            Month::April => "April",
            Month::May => "May",
            Month::June => "June",
            Month::July => "July",
            Month::August => "August",
            Month::September => "September",
            Month::October => "October",
            Month::November => "November",
            Month::December => "December",
        }
    }

    pub fn abbreviation(self) -> &'static str {
        &self.name()[..3]
    }

    /// Parse an optional month; blank text means "not set"
    pub fn parse_optional(raw: &str) -> Result<Option<Self>> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        trimmed.parse().map(Some)
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Month {
    type Err = ScreenerError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        Month::ALL
            .into_iter()
            .find(|m| m.name().to_lowercase() == wanted || m.abbreviation().to_lowercase() == wanted)
            .ok_or_else(|| ScreenerError::ParseError(format!("unknown month: {}", s)))
    }
}

/// Lenient numeric coercion for manually entered fields.
///
/// Accepts thousands separators and a trailing `%`. Blank, `nan` and
/// unparseable text becomes `None` rather than an error.
pub fn coerce_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .trim_end_matches('%')
        .chars()
        .filter(|c| *c != ',' && *c != '_')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Keep only finite values
pub fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_ticker_normalization() {
        let ticker = Ticker::parse("  bbca ").unwrap();
        assert_eq!(ticker.as_str(), "BBCA");
    }

    #[test]
    fn test_ticker_rejects_blank_and_spaces() {
        assert!(matches!(Ticker::parse("   "), Err(ScreenerError::InvalidTicker(_))));
        assert!(Ticker::parse("BB CA").is_err());
    }

    #[test]
    fn test_scale_conversions_are_explicit() {
        assert_relative_eq!(Fraction(0.25).as_percent().value(), 25.0);
        assert_relative_eq!(Percent(8.0).as_fraction().value(), 0.08);
    }

    #[test]
    fn test_display() {
        assert_eq!(Percent(17.3).to_string(), "17.3%");
        assert_eq!(Fraction(0.0825).to_string(), "8.25%");
    }

    #[test]
    fn test_month_parsing() {
        assert_eq!("march".parse::<Month>().unwrap(), Month::March);
        assert_eq!("Sep".parse::<Month>().unwrap(), Month::September);
        assert_eq!(Month::parse_optional("").unwrap(), None);
        assert!("Smarch".parse::<Month>().is_err());
    }

    #[test]
    fn test_coerce_number() {
        assert_eq!(coerce_number("1,250.5"), Some(1250.5));
        assert_eq!(coerce_number("17.3%"), Some(17.3));
        assert_eq!(coerce_number(""), None);
        assert_eq!(coerce_number("n/a"), None);
        assert_eq!(coerce_number("nan"), None);
        assert_eq!(coerce_number("inf"), None);
    }
}
