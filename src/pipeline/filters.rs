//! Screening filters and presets
//!
//! A [`FilterState`] is a plain value owned by the caller. Filtering never
//! mutates it, and presets produce a whole new state instead of patching an
//! existing one.

use crate::error::{Result, ScreenerError};
use crate::pipeline::classifiers::Signal;
use crate::pipeline::engine::ScreenedInstrument;
use crate::types::Percent;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// `dpr_max` at or above this value means "no limit"
pub const NO_DPR_LIMIT: Percent = Percent(1000.0);

/// Conjunctive filter; every threshold is in percentage points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterState {
    /// Allowed signals, empty allows all
    pub signals: BTreeSet<Signal>,
    /// Allowed sectors, empty allows all
    pub sectors: BTreeSet<String>,
    /// Active when > 0
    pub discount_min: Percent,
    /// Active when > 0
    pub yield_min: Percent,
    /// Active when > 0
    pub roe_min: Percent,
    /// Active when below [`NO_DPR_LIMIT`]
    pub dpr_max: Percent,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            signals: BTreeSet::new(),
            sectors: BTreeSet::new(),
            discount_min: Percent(0.0),
            yield_min: Percent(0.0),
            roe_min: Percent(0.0),
            dpr_max: NO_DPR_LIMIT,
        }
    }
}

impl FilterState {
    /// All-permissive state
    pub fn cleared() -> Self {
        Self::default()
    }

    pub fn with_signals(mut self, signals: impl IntoIterator<Item = Signal>) -> Self {
        self.signals = signals.into_iter().collect();
        self
    }

    pub fn with_sectors<S: Into<String>>(mut self, sectors: impl IntoIterator<Item = S>) -> Self {
        self.sectors = sectors.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_discount_min(mut self, pct: f64) -> Self {
        self.discount_min = Percent(pct);
        self
    }

    pub fn with_yield_min(mut self, pct: f64) -> Self {
        self.yield_min = Percent(pct);
        self
    }

    pub fn with_roe_min(mut self, pct: f64) -> Self {
        self.roe_min = Percent(pct);
        self
    }

    pub fn with_dpr_max(mut self, pct: f64) -> Self {
        self.dpr_max = Percent(pct);
        self
    }

    /// True when no clause constrains anything
    pub fn is_permissive(&self) -> bool {
        self.signals.is_empty()
            && self.sectors.is_empty()
            && !(self.discount_min.value() > 0.0)
            && !(self.yield_min.value() > 0.0)
            && !(self.roe_min.value() > 0.0)
            && !(self.dpr_max.value() < NO_DPR_LIMIT.value())
    }

    /// Test a single row against every active clause.
    ///
    /// A row whose compared value is undefined fails that clause.
    pub fn matches(&self, row: &ScreenedInstrument) -> bool {
        if !self.signals.is_empty() && !self.signals.contains(&row.signal) {
            return false;
        }
        if !self.sectors.is_empty() && !self.sectors.contains(&row.sector) {
            return false;
        }

        if self.discount_min.value() > 0.0 {
            let ok = row
                .discount
                .map(|d| d.as_percent().value() >= self.discount_min.value())
                .unwrap_or(false);
            if !ok {
                return false;
            }
        }

        if self.yield_min.value() > 0.0 {
            let ok = row
                .div_yield
                .map(|y| y.as_percent().value() >= self.yield_min.value())
                .unwrap_or(false);
            if !ok {
                return false;
            }
        }

        if self.roe_min.value() > 0.0 {
            let ok = row
                .instrument
                .fields
                .roe
                .map(|r| r.value() >= self.roe_min.value())
                .unwrap_or(false);
            if !ok {
                return false;
            }
        }

        if self.dpr_max.value() < NO_DPR_LIMIT.value() {
            let ok = row
                .instrument
                .fields
                .dpr
                .map(|d| d.value() <= self.dpr_max.value())
                .unwrap_or(false);
            if !ok {
                return false;
            }
        }

        true
    }
}

/// Stable filter: matching rows in input order, input untouched
pub fn apply_filters(rows: &[ScreenedInstrument], state: &FilterState) -> Vec<ScreenedInstrument> {
    rows.iter().filter(|row| state.matches(row)).cloned().collect()
}

/// Built-in named filter bundles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Preset {
    HighYield,
    ValuePlay,
    GrowthDividend,
    SafeIncome,
}

impl Preset {
    pub const ALL: [Preset; 4] = [
        Preset::HighYield,
        Preset::ValuePlay,
        Preset::GrowthDividend,
        Preset::SafeIncome,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Preset::HighYield => "High Yield",
            Preset::ValuePlay => "Value Play",
            Preset::GrowthDividend => "Growth Dividend",
            Preset::SafeIncome => "Safe Income",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Preset::HighYield => "Focus on high dividend yields",
            Preset::ValuePlay => "Undervalued stocks with good ROE",
            Preset::GrowthDividend => "Strong ROE with sustainable dividends",
            Preset::SafeIncome => "Conservative dividend plays",
        }
    }

    /// The complete filter state this preset stands for
    pub fn filter_state(self) -> FilterState {
        use Signal::*;
        let base = FilterState::default();
        match self {
            Preset::HighYield => base
                .with_yield_min(8.0)
                .with_signals([StrongBuy, Buy, Accumulate]),
            Preset::ValuePlay => base
                .with_yield_min(5.0)
                .with_discount_min(20.0)
                .with_roe_min(10.0)
                .with_signals([StrongBuy, Buy]),
            Preset::GrowthDividend => base
                .with_yield_min(5.0)
                .with_roe_min(15.0)
                .with_signals([StrongBuy, Buy]),
            Preset::SafeIncome => base
                .with_yield_min(5.0)
                .with_roe_min(10.0)
                .with_signals([StrongBuy, Buy, Accumulate]),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = ScreenerError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = normalize_name(s);
        Preset::ALL
            .into_iter()
            .find(|p| normalize_name(p.name()) == wanted)
            .ok_or_else(|| ScreenerError::UnknownPreset(s.to_string()))
    }
}

fn normalize_name(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Replacement filter state for a preset name
pub fn apply_preset(name: &str) -> Result<FilterState> {
    let preset: Preset = name.parse()?;
    log::debug!("Applying preset {}", preset);
    Ok(preset.filter_state())
}

/// All-permissive filter state
pub fn clear_filters() -> FilterState {
    FilterState::cleared()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::{Instrument, ManualFields};
    use crate::types::{Fraction, Ticker};

    fn row(ticker: &str, signal: Signal, sector: &str, discount: f64, yld: f64, roe: f64, dpr: f64) -> ScreenedInstrument {
        let instrument = Instrument::new_at(
            Ticker::parse(ticker).unwrap(),
            ManualFields {
                roe: Some(Percent(roe)),
                dpr: Some(Percent(dpr)),
                ..ManualFields::default()
            },
            None,
        );
        ScreenedInstrument {
            instrument,
            current_price: Some(1000.0),
            sector: sector.to_string(),
            graham_fair_value: None,
            fair_value: None,
            uses_manual_fv: false,
            discount: Some(Fraction(discount)),
            div_yield: Some(Fraction(yld)),
            signal,
        }
    }

    fn universe() -> Vec<ScreenedInstrument> {
        vec![
            row("AAA", Signal::StrongBuy, "Financial Services", 0.25, 0.09, 18.0, 60.0),
            row("BBB", Signal::Buy, "Energy", 0.16, 0.085, 11.0, 85.0),
            row("CCC", Signal::Accumulate, "Energy", 0.06, 0.10, 9.0, 120.0),
            row("DDD", Signal::WaitForDip, "Utilities", -0.10, 0.09, 14.0, 50.0),
            row("EEE", Signal::Wait, "Financial Services", 0.30, 0.04, 20.0, 40.0),
        ]
    }

    fn tickers(rows: &[ScreenedInstrument]) -> Vec<&str> {
        rows.iter().map(|r| r.instrument.ticker.as_str()).collect()
    }

    #[test]
    fn test_default_passes_everything() {
        let rows = universe();
        assert!(FilterState::default().is_permissive());
        assert_eq!(apply_filters(&rows, &FilterState::default()).len(), rows.len());
    }

    #[test]
    fn test_signal_and_sector_filters() {
        let rows = universe();
        let state = FilterState::default()
            .with_signals([Signal::StrongBuy, Signal::Accumulate])
            .with_sectors(["Energy"]);
        assert_eq!(tickers(&apply_filters(&rows, &state)), vec!["CCC"]);
    }

    #[test]
    fn test_numeric_thresholds_use_percent_points() {
        let rows = universe();
        let state = FilterState::default().with_discount_min(15.0);
        assert_eq!(tickers(&apply_filters(&rows, &state)), vec!["AAA", "BBB", "EEE"]);

        let state = FilterState::default().with_yield_min(9.0);
        assert_eq!(tickers(&apply_filters(&rows, &state)), vec!["AAA", "CCC", "DDD"]);

        let state = FilterState::default().with_roe_min(14.0);
        assert_eq!(tickers(&apply_filters(&rows, &state)), vec!["AAA", "DDD", "EEE"]);

        let state = FilterState::default().with_dpr_max(85.0);
        assert_eq!(tickers(&apply_filters(&rows, &state)), vec!["AAA", "BBB", "DDD", "EEE"]);
    }

    #[test]
    fn test_undefined_values_fail_active_clauses() {
        let mut rows = universe();
        rows[0].discount = None;
        rows[0].instrument.fields.dpr = None;
        let state = FilterState::default().with_discount_min(1.0);
        assert!(!tickers(&apply_filters(&rows, &state)).contains(&"AAA"));
        let state = FilterState::default().with_dpr_max(100.0);
        assert!(!tickers(&apply_filters(&rows, &state)).contains(&"AAA"));
        // inactive clauses do not care
        assert_eq!(apply_filters(&rows, &FilterState::default()).len(), 5);
    }

    #[test]
    fn test_filter_is_idempotent_and_stable() {
        let rows = universe();
        let state = FilterState::default().with_yield_min(8.0);
        let once = apply_filters(&rows, &state);
        let twice = apply_filters(&once, &state);
        assert_eq!(once, twice);
        assert_eq!(tickers(&once), vec!["AAA", "BBB", "CCC", "DDD"]);
    }

    #[test]
    fn test_value_play_matches_manual_state() {
        let rows = universe();
        let preset = apply_preset("Value Play").unwrap();
        let manual = FilterState::default()
            .with_yield_min(5.0)
            .with_discount_min(20.0)
            .with_roe_min(10.0)
            .with_signals([Signal::StrongBuy, Signal::Buy]);
        assert_eq!(preset, manual);
        assert_eq!(apply_filters(&rows, &preset), apply_filters(&rows, &manual));
        assert_eq!(tickers(&apply_filters(&rows, &preset)), vec!["AAA"]);
    }

    #[test]
    fn test_preset_replaces_entire_state() {
        let current = FilterState::default()
            .with_sectors(["Energy"])
            .with_dpr_max(50.0)
            .with_discount_min(40.0);
        let next = Preset::GrowthDividend.filter_state();
        assert_ne!(current, next);
        assert!(next.sectors.is_empty());
        assert_eq!(next.dpr_max, NO_DPR_LIMIT);
        assert_eq!(next.discount_min, Percent(0.0));
        assert_eq!(next.roe_min, Percent(15.0));
    }

    #[test]
    fn test_preset_table() {
        let high = Preset::HighYield.filter_state();
        assert_eq!(high.yield_min, Percent(8.0));
        assert_eq!(high.signals.len(), 3);

        let safe = Preset::SafeIncome.filter_state();
        assert_eq!(safe.yield_min, Percent(5.0));
        assert_eq!(safe.roe_min, Percent(10.0));
        assert!(safe.signals.contains(&Signal::Accumulate));
    }

    #[test]
    fn test_preset_name_parsing() {
        assert_eq!("value play".parse::<Preset>().unwrap(), Preset::ValuePlay);
        assert_eq!("growth-dividend".parse::<Preset>().unwrap(), Preset::GrowthDividend);
        assert!(matches!(apply_preset("Moonshot"), Err(ScreenerError::UnknownPreset(_))));
    }

    #[test]
    fn test_clear_filters() {
        assert_eq!(clear_filters(), FilterState::default());
        assert!(clear_filters().is_permissive());
    }
}
