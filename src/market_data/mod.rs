//! Market data providers
//!
//! A provider returns the current price and sector for one ticker. Lookups
//! are independent: [`MarketDataProvider::lookup_all`] turns each failure into
//! a degraded [`LookupResult`] (price unknown, sector "Unknown") and moves on.
//!
//! - [`StaticQuotes`]: in-memory quotes, for tests and offline runs
//! - [`CachedProvider`]: staleness-throttled wrapper around any provider
//! - `YahooFinanceQuotes`: Yahoo Finance quoteSummary client (feature `async`)

pub mod cache;
#[cfg(feature = "async")]
pub mod yahoo;

pub use cache::CachedProvider;
#[cfg(feature = "async")]
pub use yahoo::YahooFinanceQuotes;

use crate::error::{summarize, Result, ScreenerError};
use crate::types::{Price, Ticker};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

/// Sector reported when the provider has none
pub const UNKNOWN_SECTOR: &str = "Unknown";

/// Price and sector for one ticker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub price: Option<Price>,
    pub sector: String,
}

impl Quote {
    /// Non-positive or non-finite prices become `None`, blank sectors "Unknown"
    pub fn new(price: Option<Price>, sector: impl Into<String>) -> Self {
        let sector = sector.into();
        Self {
            price: price.filter(|p| p.is_finite() && *p > 0.0),
            sector: if sector.trim().is_empty() {
                UNKNOWN_SECTOR.to_string()
            } else {
                sector.trim().to_string()
            },
        }
    }

    pub fn unknown() -> Self {
        Self::new(None, UNKNOWN_SECTOR)
    }
}

/// Outcome of one ticker lookup within a batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LookupResult {
    pub ticker: Ticker,
    pub quote: Quote,
    pub error: Option<String>,
}

impl LookupResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Source of current prices and sectors
pub trait MarketDataProvider {
    /// Look up one ticker
    fn lookup(&self, ticker: &Ticker) -> Result<Quote>;

    /// Provider name for logs
    fn name(&self) -> &str;

    /// Look up every ticker; a failure degrades that ticker only
    fn lookup_all(&self, tickers: &[Ticker]) -> Vec<LookupResult> {
        self.lookup_all_with_progress(tickers, &mut |_, _| {})
    }

    /// As [`lookup_all`](Self::lookup_all), reporting `(done, total)` after each ticker
    fn lookup_all_with_progress(
        &self,
        tickers: &[Ticker],
        progress: &mut dyn FnMut(usize, usize),
    ) -> Vec<LookupResult> {
        let total = tickers.len();
        let mut results = Vec::with_capacity(total);

        for (i, ticker) in tickers.iter().enumerate() {
            let result = match self.lookup(ticker) {
                Ok(quote) => LookupResult {
                    ticker: ticker.clone(),
                    quote: Quote::new(quote.price, quote.sector),
                    error: None,
                },
                Err(e) => {
                    log::warn!("{}: failed to fetch {}: {}", self.name(), ticker, e);
                    LookupResult {
                        ticker: ticker.clone(),
                        quote: Quote::unknown(),
                        error: Some(error_cause(&e)),
                    }
                }
            };
            results.push(result);
            progress(i + 1, total);
        }

        let failed = results.iter().filter(|r| !r.is_ok()).count();
        if failed > 0 {
            log::info!("{}: {} of {} lookups failed", self.name(), failed, total);
        }
        results
    }
}

/// Short cause text for a lookup failure
fn error_cause(err: &ScreenerError) -> String {
    match err {
        ScreenerError::MarketData { cause, .. } => cause.clone(),
        other => summarize(other),
    }
}

/// Fixed in-memory quotes
#[derive(Debug, Clone, Default)]
pub struct StaticQuotes {
    quotes: HashMap<Ticker, std::result::Result<Quote, String>>,
}

impl StaticQuotes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ticker: Ticker, quote: Quote) {
        self.quotes.insert(ticker, Ok(quote));
    }

    /// Make lookups of `ticker` fail with `cause`
    pub fn insert_failure(&mut self, ticker: Ticker, cause: impl Into<String>) {
        self.quotes.insert(ticker, Err(cause.into()));
    }

    /// Builder form of [`insert`](Self::insert); invalid tickers are skipped
    pub fn with_quote(mut self, ticker: &str, quote: Quote) -> Self {
        match Ticker::parse(ticker) {
            Ok(t) => self.insert(t, quote),
            Err(e) => log::warn!("Skipping static quote: {}", e),
        }
        self
    }

    /// Builder form of [`insert_failure`](Self::insert_failure)
    pub fn with_failure(mut self, ticker: &str, cause: &str) -> Self {
        match Ticker::parse(ticker) {
            Ok(t) => self.insert_failure(t, cause),
            Err(e) => log::warn!("Skipping static failure: {}", e),
        }
        self
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

impl MarketDataProvider for StaticQuotes {
    fn lookup(&self, ticker: &Ticker) -> Result<Quote> {
        match self.quotes.get(ticker) {
            Some(Ok(quote)) => Ok(quote.clone()),
            Some(Err(cause)) => Err(ScreenerError::market_data(ticker.as_str(), cause)),
            None => Err(ScreenerError::market_data(ticker.as_str(), "no quote available")),
        }
    }

    fn name(&self) -> &str {
        "static"
    }
}
