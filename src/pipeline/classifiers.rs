//! Signal classifier
//!
//! Maps (discount, dividend yield, ROE) to one of five ordered
//! recommendation labels. The rule is written once, for a single row, in
//! [`SignalClassifier::classify`]; the batch form maps it over a collection.

use crate::config::Thresholds;
use crate::error::{Result, ScreenerError};
use crate::types::{Fraction, Percent};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Recommendation label, ordered from most to least attractive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Signal {
    #[serde(rename = "STRONG BUY")]
    StrongBuy,
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "ACCUMULATE")]
    Accumulate,
    #[serde(rename = "WAIT")]
    Wait,
    #[serde(rename = "WAIT FOR DIP")]
    WaitForDip,
}

impl Signal {
    pub const ALL: [Signal; 5] = [
        Signal::StrongBuy,
        Signal::Buy,
        Signal::Accumulate,
        Signal::Wait,
        Signal::WaitForDip,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Signal::StrongBuy => "STRONG BUY",
            Signal::Buy => "BUY",
            Signal::Accumulate => "ACCUMULATE",
            Signal::Wait => "WAIT",
            Signal::WaitForDip => "WAIT FOR DIP",
        }
    }

    /// STRONG BUY or BUY
    pub fn is_buy(self) -> bool {
        matches!(self, Signal::StrongBuy | Signal::Buy)
    }

    /// Any of the three positive labels
    pub fn is_actionable(self) -> bool {
        matches!(self, Signal::StrongBuy | Signal::Buy | Signal::Accumulate)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Signal {
    type Err = ScreenerError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().replace(['_', '-'], " ").to_uppercase();
        Signal::ALL
            .into_iter()
            .find(|sig| sig.label() == wanted)
            .ok_or_else(|| ScreenerError::ParseError(format!("unknown signal: {}", s)))
    }
}

/// Classifier inputs for one row
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SignalInputs {
    pub discount: Option<Fraction>,
    pub div_yield: Option<Fraction>,
    pub roe: Option<Percent>,
}

/// Deterministic, total signal assignment
#[derive(Debug, Clone, Default)]
pub struct SignalClassifier {
    thresholds: Thresholds,
}

impl SignalClassifier {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Assign a signal. Steps are evaluated in order and the first match wins.
    pub fn classify(&self, inputs: SignalInputs) -> Signal {
        let t = &self.thresholds;

        let (discount, div_yield, roe) = match (inputs.discount, inputs.div_yield, inputs.roe) {
            (Some(d), Some(y), Some(r)) if !d.is_nan() && !y.is_nan() && !r.is_nan() => {
                (d.value(), y.value(), r.value())
            }
            _ => return Signal::Wait,
        };

        // Yield floor is checked before overvaluation: low-yield and
        // overvalued is WAIT, not WAIT FOR DIP.
        if div_yield < t.min_yield {
            return Signal::Wait;
        }

        if discount < 0.0 {
            return Signal::WaitForDip;
        }

        if roe < t.min_roe_basic {
            if div_yield >= t.exceptional_yield && discount >= t.high_discount {
                return Signal::Accumulate;
            }
            return Signal::Wait;
        }

        if discount >= t.high_discount && roe >= t.excellent_roe {
            Signal::StrongBuy
        } else if discount >= t.good_discount && roe >= t.good_roe {
            Signal::Buy
        } else if discount >= t.fair_discount {
            Signal::Accumulate
        } else {
            Signal::Wait
        }
    }

    /// Whole-collection form, one label per input in order
    pub fn classify_batch(&self, rows: &[SignalInputs]) -> Vec<Signal> {
        rows.iter().map(|row| self.classify(*row)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn inputs(discount: f64, div_yield: f64, roe: f64) -> SignalInputs {
        SignalInputs {
            discount: Some(Fraction(discount)),
            div_yield: Some(Fraction(div_yield)),
            roe: Some(Percent(roe)),
        }
    }

    fn classify(discount: f64, div_yield: f64, roe: f64) -> Signal {
        SignalClassifier::default().classify(inputs(discount, div_yield, roe))
    }

    #[test]
    fn test_undefined_inputs_wait() {
        let c = SignalClassifier::default();
        assert_eq!(c.classify(SignalInputs::default()), Signal::Wait);
        let mut row = inputs(0.3, 0.12, 20.0);
        row.roe = None;
        assert_eq!(c.classify(row), Signal::Wait);
        assert_eq!(classify(f64::NAN, 0.12, 20.0), Signal::Wait);
    }

    #[test]
    fn test_overvalued_with_yield_waits_for_dip() {
        assert_eq!(classify(-0.05, 0.09, 12.0), Signal::WaitForDip);
    }

    #[test]
    fn test_yield_floor_checked_before_overvaluation() {
        // Pins current ordering: low yield + overvalued is WAIT
        assert_eq!(classify(-0.05, 0.03, 12.0), Signal::Wait);
    }

    #[test]
    fn test_strong_buy() {
        assert_eq!(classify(0.22, 0.09, 16.0), Signal::StrongBuy);
    }

    #[test]
    fn test_buy() {
        assert_eq!(classify(0.16, 0.09, 11.0), Signal::Buy);
    }

    #[test]
    fn test_accumulate_on_fair_discount() {
        assert_eq!(classify(0.06, 0.09, 9.0), Signal::Accumulate);
        assert_eq!(classify(0.03, 0.09, 20.0), Signal::Wait);
    }

    #[test]
    fn test_low_roe_exception_boundary_met() {
        assert_eq!(classify(0.20, 0.10, 6.0), Signal::Accumulate);
        assert_eq!(classify(0.25, 0.12, 6.0), Signal::Accumulate);
    }

    #[test]
    fn test_low_roe_exception_boundary_missed() {
        assert_eq!(classify(0.03, 0.12, 6.0), Signal::Wait);
        assert_eq!(classify(0.19, 0.12, 6.0), Signal::Wait);
        assert_eq!(classify(0.25, 0.099, 6.0), Signal::Wait);
    }

    #[test]
    fn test_threshold_edges_are_inclusive() {
        assert_eq!(classify(0.20, 0.08, 15.0), Signal::StrongBuy);
        assert_eq!(classify(0.15, 0.08, 10.0), Signal::Buy);
        assert_eq!(classify(0.05, 0.08, 8.0), Signal::Accumulate);
        assert_eq!(classify(0.0, 0.08, 8.0), Signal::Wait);
    }

    #[test]
    fn test_signal_labels_round_trip() {
        for signal in Signal::ALL {
            assert_eq!(signal.label().parse::<Signal>().unwrap(), signal);
        }
        assert_eq!("strong_buy".parse::<Signal>().unwrap(), Signal::StrongBuy);
        assert_eq!("wait-for-dip".parse::<Signal>().unwrap(), Signal::WaitForDip);
        assert!("HOLD".parse::<Signal>().is_err());
    }

    #[test]
    fn test_signal_ordering() {
        assert!(Signal::StrongBuy < Signal::Buy);
        assert!(Signal::Accumulate < Signal::WaitForDip);
    }

    fn maybe_nan(range: std::ops::Range<f64>) -> impl Strategy<Value = Option<f64>> {
        prop_oneof![
            3 => range.prop_map(Some),
            1 => Just(None),
            1 => Just(Some(f64::NAN)),
        ]
    }

    fn any_row() -> impl Strategy<Value = SignalInputs> {
        (maybe_nan(-0.5..0.6), maybe_nan(0.0..0.2), maybe_nan(-5.0..40.0)).prop_map(|(d, y, r)| {
            SignalInputs {
                discount: d.map(Fraction),
                div_yield: y.map(Fraction),
                roe: r.map(Percent),
            }
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn prop_batch_matches_scalar(rows in proptest::collection::vec(any_row(), 100..200)) {
            let c = SignalClassifier::default();
            let batch = c.classify_batch(&rows);
            prop_assert_eq!(batch.len(), rows.len());
            for (row, label) in rows.iter().zip(batch) {
                prop_assert_eq!(c.classify(*row), label);
            }
        }

        #[test]
        fn prop_classification_is_total_and_deterministic(row in any_row()) {
            let c = SignalClassifier::default();
            let first = c.classify(row);
            prop_assert!(Signal::ALL.contains(&first));
            prop_assert_eq!(first, c.classify(row));
        }

        #[test]
        fn prop_nothing_below_yield_floor_is_actionable(
            d in -0.5f64..0.6, y in 0.0f64..0.0799, r in 0.0f64..40.0
        ) {
            prop_assert_eq!(classify(d, y, r), Signal::Wait);
        }
    }
}
