//! Valuation factors
//!
//! Fair value prefers an analyst override and otherwise falls back to the
//! Graham number. A missing or non-positive input yields `None` ("cannot
//! price"), which is distinct from a value of zero.

use crate::instrument::Instrument;
use crate::types::{Fraction, Price};

/// Graham number: sqrt(multiplier * BVPS * EPS)
#[derive(Debug, Clone)]
pub struct GrahamNumber;

impl GrahamNumber {
    pub const MULTIPLIER: f64 = 22.5;

    /// Defined only when both BVPS and EPS are strictly positive
    pub fn calculate(multiplier: f64, bvps: Option<f64>, eps: Option<f64>) -> Option<Price> {
        match (bvps, eps) {
            (Some(b), Some(e)) if b > 0.0 && e > 0.0 => {
                let value = (multiplier * b * e).sqrt();
                value.is_finite().then_some(value)
            }
            _ => None,
        }
    }
}

/// Discount of price relative to fair value
#[derive(Debug, Clone)]
pub struct Discount;

impl Discount {
    /// (fair_value - price) / fair_value, positive when undervalued
    pub fn calculate(fair_value: Option<Price>, price: Option<Price>) -> Option<Fraction> {
        match (fair_value, price) {
            (Some(fv), Some(p)) if fv > 0.0 && p > 0.0 => Some(Fraction((fv - p) / fv)),
            _ => None,
        }
    }
}

/// Trailing dividend yield as a decimal fraction
#[derive(Debug, Clone)]
pub struct DividendYield;

impl DividendYield {
    pub fn calculate(div_ttm: Option<Price>, price: Option<Price>) -> Option<Fraction> {
        match (div_ttm, price) {
            (Some(d), Some(p)) if p > 0.0 && d.is_finite() => Some(Fraction(d / p)),
            _ => None,
        }
    }
}

/// Valuation output for one instrument
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Valuation {
    pub graham_fair_value: Option<Price>,
    pub fair_value: Option<Price>,
    pub uses_manual_fv: bool,
}

/// Fair value engine
#[derive(Debug, Clone)]
pub struct FairValueModel {
    multiplier: f64,
}

impl Default for FairValueModel {
    fn default() -> Self {
        Self::new(GrahamNumber::MULTIPLIER)
    }
}

impl FairValueModel {
    pub fn new(multiplier: f64) -> Self {
        Self { multiplier }
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Override if present and positive, else the Graham number
    pub fn fair_value(
        &self,
        bvps: Option<f64>,
        eps: Option<f64>,
        manual_override: Option<f64>,
    ) -> Option<Price> {
        match manual_override {
            Some(v) if v > 0.0 && v.is_finite() => Some(v),
            _ => GrahamNumber::calculate(self.multiplier, bvps, eps),
        }
    }

    pub fn valuate(&self, instrument: &Instrument) -> Valuation {
        let fields = &instrument.fields;
        let graham = GrahamNumber::calculate(self.multiplier, fields.bvps, fields.eps);
        let manual = instrument.manual_fair_value();
        Valuation {
            graham_fair_value: graham,
            fair_value: self.fair_value(fields.bvps, fields.eps, manual),
            uses_manual_fv: manual.is_some(),
        }
    }

    /// Whole-collection form, one output per input in order
    pub fn valuate_batch(&self, instruments: &[Instrument]) -> Vec<Valuation> {
        instruments.iter().map(|i| self.valuate(i)).collect()
    }
}
