//! Instrument records
//!
//! An [`Instrument`] carries only the manually maintained fundamentals.
//! Everything derived from market data lives in
//! [`ScreenedInstrument`](crate::pipeline::ScreenedInstrument) and is rebuilt
//! on every processing pass.

use crate::types::{finite, Month, Percent, Price, Ticker, Timestamp};
use chrono::{Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Editable fundamentals for one instrument
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManualFields {
    /// Book value per share
    pub bvps: Option<Price>,
    /// Earnings per share
    pub eps: Option<Price>,
    /// Return on equity, percentage points
    pub roe: Option<Percent>,
    /// Trailing-twelve-month dividend per share
    pub div_ttm: Option<Price>,
    /// Dividend payout ratio, percentage points
    pub dpr: Option<Percent>,
    /// Analyst fair value override; zero or absent means not set
    pub manual_fair_value: Option<Price>,
    /// Expected interim dividend month
    pub interim: Option<Month>,
    /// Expected final dividend month
    pub final_month: Option<Month>,
}

impl ManualFields {
    /// Drop non-finite numbers so they read as "no data"
    pub fn sanitized(self) -> Self {
        Self {
            bvps: finite(self.bvps),
            eps: finite(self.eps),
            roe: finite(self.roe.map(Percent::value)).map(Percent),
            div_ttm: finite(self.div_ttm),
            dpr: finite(self.dpr.map(Percent::value)).map(Percent),
            manual_fair_value: finite(self.manual_fair_value),
            ..self
        }
    }
}

/// Instrument with its manually maintained fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub ticker: Ticker,
    #[serde(flatten)]
    pub fields: ManualFields,
    pub last_updated: Option<Timestamp>,
}

/// Current UTC time at second precision
pub fn now_timestamp() -> Timestamp {
    let now = Utc::now().naive_utc();
    now.with_nanosecond(0).unwrap_or(now)
}

impl Instrument {
    /// Create an instrument stamped with the current time
    pub fn new(ticker: Ticker, fields: ManualFields) -> Self {
        Self::new_at(ticker, fields, Some(now_timestamp()))
    }

    pub fn new_at(ticker: Ticker, fields: ManualFields, last_updated: Option<Timestamp>) -> Self {
        Self {
            ticker,
            fields: fields.sanitized(),
            last_updated,
        }
    }

    /// Copy with replaced fields and a fresh edit timestamp
    pub fn edited(&self, fields: ManualFields) -> Self {
        Self::new(self.ticker.clone(), fields)
    }

    /// Override fair value, only when strictly positive
    pub fn manual_fair_value(&self) -> Option<Price> {
        self.fields.manual_fair_value.filter(|v| *v > 0.0)
    }

    pub fn pays_in(&self, month: Month) -> bool {
        self.fields.interim == Some(month) || self.fields.final_month == Some(month)
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instrument({})", self.ticker)
    }
}
