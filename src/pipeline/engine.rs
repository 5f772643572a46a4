//! Processing pass: quotes + fundamentals -> valuation -> signal
//!
//! A pass is a pure function of its inputs. Running it twice on the same
//! instruments and quotes produces identical rows, so callers can re-run it
//! on every refresh.

use crate::config::Thresholds;
use crate::instrument::Instrument;
use crate::market_data::{LookupResult, MarketDataProvider, Quote, UNKNOWN_SECTOR};
use crate::pipeline::classifiers::{Signal, SignalClassifier, SignalInputs};
use crate::pipeline::valuation::{Discount, DividendYield, FairValueModel, Valuation};
use crate::types::{Fraction, Price, Ticker};
use hashbrown::HashMap;
use serde::Serialize;

/// Quotes keyed by ticker
pub type QuoteMap = HashMap<Ticker, Quote>;

/// Index lookup results by ticker
pub fn quote_map(results: &[LookupResult]) -> QuoteMap {
    results
        .iter()
        .map(|r| (r.ticker.clone(), r.quote.clone()))
        .collect()
}

/// One processed row: manual fields plus everything derived this pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreenedInstrument {
    pub instrument: Instrument,
    pub current_price: Option<Price>,
    pub sector: String,
    pub graham_fair_value: Option<Price>,
    pub fair_value: Option<Price>,
    pub uses_manual_fv: bool,
    pub discount: Option<Fraction>,
    pub div_yield: Option<Fraction>,
    pub signal: Signal,
}

impl ScreenedInstrument {
    pub fn ticker(&self) -> &Ticker {
        &self.instrument.ticker
    }

    pub fn signal_inputs(&self) -> SignalInputs {
        SignalInputs {
            discount: self.discount,
            div_yield: self.div_yield,
            roe: self.instrument.fields.roe,
        }
    }
}

/// Valuation and signal engine
#[derive(Debug, Clone, Default)]
pub struct Screener {
    valuation: FairValueModel,
    classifier: SignalClassifier,
}

impl Screener {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            valuation: FairValueModel::new(thresholds.graham_multiplier),
            classifier: SignalClassifier::new(thresholds),
        }
    }

    pub fn classifier(&self) -> &SignalClassifier {
        &self.classifier
    }

    pub fn valuation(&self) -> &FairValueModel {
        &self.valuation
    }

    /// Process a single instrument against its quote
    pub fn process_one(&self, instrument: &Instrument, quote: Option<&Quote>) -> ScreenedInstrument {
        let Valuation {
            graham_fair_value,
            fair_value,
            uses_manual_fv,
        } = self.valuation.valuate(instrument);

        let current_price = quote.and_then(|q| q.price).filter(|p| p.is_finite() && *p > 0.0);
        let sector = quote
            .map(|q| q.sector.clone())
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_SECTOR.to_string());

        let discount = Discount::calculate(fair_value, current_price);
        let div_yield = DividendYield::calculate(instrument.fields.div_ttm, current_price);
        let signal = self.classifier.classify(SignalInputs {
            discount,
            div_yield,
            roe: instrument.fields.roe,
        });

        ScreenedInstrument {
            instrument: instrument.clone(),
            current_price,
            sector,
            graham_fair_value,
            fair_value,
            uses_manual_fv,
            discount,
            div_yield,
            signal,
        }
    }

    /// Process the whole collection; output order follows input order
    pub fn process(&self, instruments: &[Instrument], quotes: &QuoteMap) -> Vec<ScreenedInstrument> {
        let rows: Vec<ScreenedInstrument> = instruments
            .iter()
            .map(|i| self.process_one(i, quotes.get(&i.ticker)))
            .collect();

        let priced = rows.iter().filter(|r| r.current_price.is_some()).count();
        log::debug!(
            "Processed {} instruments ({} priced, {} unpriced)",
            rows.len(),
            priced,
            rows.len() - priced
        );
        rows
    }

    /// Fetch quotes for every instrument, then process
    pub fn run<P: MarketDataProvider + ?Sized>(
        &self,
        instruments: &[Instrument],
        provider: &P,
    ) -> (Vec<ScreenedInstrument>, Vec<LookupResult>) {
        let tickers: Vec<Ticker> = instruments.iter().map(|i| i.ticker.clone()).collect();
        let results = provider.lookup_all(&tickers);
        let rows = self.process(instruments, &quote_map(&results));
        (rows, results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::ManualFields;
    use crate::market_data::StaticQuotes;
    use crate::types::Percent;
    use approx::assert_relative_eq;

    fn instrument(ticker: &str, bvps: f64, eps: f64, roe: f64, div: f64) -> Instrument {
        Instrument::new_at(
            Ticker::parse(ticker).unwrap(),
            ManualFields {
                bvps: Some(bvps),
                eps: Some(eps),
                roe: Some(Percent(roe)),
                div_ttm: Some(div),
                dpr: Some(Percent(60.0)),
                ..ManualFields::default()
            },
            None,
        )
    }

    fn quotes(entries: &[(&str, f64, &str)]) -> QuoteMap {
        entries
            .iter()
            .map(|(t, p, s)| (Ticker::parse(t).unwrap(), Quote::new(Some(*p), *s)))
            .collect()
    }

    #[test]
    fn test_full_row() {
        // Graham = sqrt(22.5 * 1000 * 100) = 1500
        let inst = instrument("BBRI", 1000.0, 100.0, 16.0, 100.0);
        let rows = Screener::default().process(&[inst], &quotes(&[("BBRI", 1150.0, "Financial Services")]));
        let row = &rows[0];

        assert_relative_eq!(row.fair_value.unwrap(), 1500.0, epsilon = 1e-9);
        assert!(!row.uses_manual_fv);
        assert_relative_eq!(row.discount.unwrap().value(), 350.0 / 1500.0, epsilon = 1e-12);
        assert_relative_eq!(row.div_yield.unwrap().value(), 100.0 / 1150.0, epsilon = 1e-12);
        assert_eq!(row.sector, "Financial Services");
        assert_eq!(row.signal, Signal::StrongBuy);
    }

    #[test]
    fn test_missing_quote_degrades_to_wait() {
        let inst = instrument("TLKM", 1000.0, 100.0, 16.0, 100.0);
        let rows = Screener::default().process(&[inst], &QuoteMap::new());
        let row = &rows[0];
        assert_eq!(row.current_price, None);
        assert_eq!(row.sector, UNKNOWN_SECTOR);
        assert_eq!(row.discount, None);
        assert_eq!(row.div_yield, None);
        assert_eq!(row.signal, Signal::Wait);
        assert!(row.fair_value.is_some());
    }

    #[test]
    fn test_unpriceable_instrument_waits() {
        let inst = instrument("GOTO", 500.0, -20.0, 16.0, 0.0);
        let rows = Screener::default().process(&[inst], &quotes(&[("GOTO", 80.0, "Technology")]));
        assert_eq!(rows[0].fair_value, None);
        assert_eq!(rows[0].discount, None);
        assert_eq!(rows[0].signal, Signal::Wait);
    }

    #[test]
    fn test_manual_override_used() {
        let mut inst = instrument("UNVR", 1000.0, 100.0, 16.0, 100.0);
        inst.fields.manual_fair_value = Some(1000.0);
        let rows = Screener::default().process(&[inst], &quotes(&[("UNVR", 1100.0, "Consumer")]));
        assert!(rows[0].uses_manual_fv);
        assert_eq!(rows[0].fair_value, Some(1000.0));
        assert_eq!(rows[0].signal, Signal::WaitForDip);
    }

    #[test]
    fn test_process_is_idempotent_and_ordered() {
        let instruments = vec![
            instrument("CCC", 1000.0, 100.0, 16.0, 100.0),
            instrument("AAA", 800.0, 60.0, 9.0, 70.0),
            instrument("BBB", 300.0, 10.0, 5.0, 30.0),
        ];
        let q = quotes(&[("AAA", 700.0, "Energy"), ("CCC", 1200.0, "Financial Services")]);
        let screener = Screener::default();
        let first = screener.process(&instruments, &q);
        let second = screener.process(&instruments, &q);
        assert_eq!(first, second);
        let order: Vec<&str> = first.iter().map(|r| r.ticker().as_str()).collect();
        assert_eq!(order, vec!["CCC", "AAA", "BBB"]);
    }

    #[test]
    fn test_run_with_partial_failures() {
        let instruments = vec![
            instrument("BBCA", 1000.0, 100.0, 16.0, 100.0),
            instrument("FAIL", 1000.0, 100.0, 16.0, 100.0),
        ];
        let provider = StaticQuotes::new()
            .with_quote("BBCA", Quote::new(Some(1150.0), "Financial Services"))
            .with_failure("FAIL", "timeout");

        let (rows, results) = Screener::default().run(&instruments, &provider);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].signal, Signal::StrongBuy);
        assert_eq!(rows[1].current_price, None);
        assert!(results[1].error.is_some());
    }

    #[test]
    fn test_signal_inputs_round_trip() {
        let inst = instrument("ADRO", 2000.0, 500.0, 20.0, 400.0);
        let screener = Screener::default();
        let rows = screener.process(&[inst], &quotes(&[("ADRO", 2500.0, "Energy")]));
        assert_eq!(screener.classifier().classify(rows[0].signal_inputs()), rows[0].signal);
    }
}
