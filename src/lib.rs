//! # Dividend Screener
//!
//! A screener for dividend-paying equities. Each watched instrument carries a
//! handful of manually maintained fundamentals (book value and earnings per
//! share, ROE, trailing dividend, payout ratio, payment months); the screener
//! joins them with live quotes, derives a Graham fair value, discount and
//! dividend yield, and assigns an investment signal.
//!
//! ## Example
//!
//! ```rust,no_run
//! use dividend_screener::prelude::*;
//!
//! let store = CsvStore::new("instruments.csv");
//! let watchlist = Watchlist::open(store)?;
//!
//! let quotes = StaticQuotes::new().with_quote("PTBA", Quote::new(Some(2650.0), "Energy"));
//! let screener = Screener::default();
//! let (rows, _lookups) = screener.run(watchlist.instruments(), &quotes);
//!
//! let filters = apply_preset("Value Play")?;
//! for row in apply_filters(&rows, &filters) {
//!     println!("{} {}", row.ticker(), row.signal);
//! }
//! # Ok::<(), ScreenerError>(())
//! ```

pub mod config;
pub mod error;
pub mod instrument;
pub mod market_data;
pub mod pipeline;
pub mod store;
pub mod summary;
pub mod types;

pub mod prelude {
    //! Commonly used types and traits
    pub use crate::config::{ScreenerConfig, Thresholds};
    pub use crate::error::{Result, ScreenerError};
    pub use crate::instrument::{Instrument, ManualFields};
    pub use crate::market_data::{
        CachedProvider, LookupResult, MarketDataProvider, Quote, StaticQuotes,
    };
    pub use crate::pipeline::{
        apply_filters, apply_preset, clear_filters, FilterState, Preset, ScreenedInstrument,
        Screener, Signal, SignalClassifier,
    };
    #[cfg(feature = "sqlite")]
    pub use crate::store::SqliteStore;
    pub use crate::store::{CsvStore, InstrumentStore, MemoryStore, Watchlist};
    pub use crate::summary::{PayoutRisk, ScreenSummary};
    pub use crate::types::*;
}
