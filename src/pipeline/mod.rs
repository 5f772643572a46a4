//! Screening pipeline: valuation, signal classification and filtering

pub mod classifiers;
pub mod engine;
pub mod filters;
pub mod valuation;

pub use classifiers::{Signal, SignalClassifier, SignalInputs};
pub use engine::{quote_map, QuoteMap, ScreenedInstrument, Screener};
pub use filters::{apply_filters, apply_preset, clear_filters, FilterState, Preset, NO_DPR_LIMIT};
pub use valuation::{DividendYield, Discount, FairValueModel, GrahamNumber, Valuation};
