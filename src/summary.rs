//! Aggregates over processed rows: headline metrics, sector and signal
//! breakdowns, the dividend calendar, leaderboards and payout risk.

use crate::config::Thresholds;
use crate::pipeline::{ScreenedInstrument, Signal};
use crate::types::{Month, Percent};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Mean of the defined values, `None` when there are none
fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Descending order with undefined values last
fn desc(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Headline metrics for a set of rows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreenSummary {
    pub total: usize,
    pub strong_buy: usize,
    pub buy: usize,
    pub accumulate: usize,
    /// STRONG BUY + BUY
    pub buy_signals: usize,
    /// Yield at or above `min_yield`
    pub high_yield: usize,
    /// Discount at or above `good_discount`
    pub undervalued: usize,
    /// ROE at or above `excellent_roe`
    pub quality: usize,
    pub avg_yield: Option<Percent>,
    pub avg_discount: Option<Percent>,
    pub avg_roe: Option<Percent>,
}

impl ScreenSummary {
    pub fn from_rows(rows: &[ScreenedInstrument], thresholds: &Thresholds) -> Self {
        let count = |signal: Signal| rows.iter().filter(|r| r.signal == signal).count();
        Self {
            total: rows.len(),
            strong_buy: count(Signal::StrongBuy),
            buy: count(Signal::Buy),
            accumulate: count(Signal::Accumulate),
            buy_signals: rows.iter().filter(|r| r.signal.is_buy()).count(),
            high_yield: rows
                .iter()
                .filter(|r| r.div_yield.map_or(false, |y| y.value() >= thresholds.min_yield))
                .count(),
            undervalued: rows
                .iter()
                .filter(|r| r.discount.map_or(false, |d| d.value() >= thresholds.good_discount))
                .count(),
            quality: rows
                .iter()
                .filter(|r| r.instrument.fields.roe.map_or(false, |roe| roe.value() >= thresholds.excellent_roe))
                .count(),
            avg_yield: mean(rows.iter().filter_map(|r| r.div_yield).map(|y| y.as_percent().value()))
                .map(Percent),
            avg_discount: mean(rows.iter().filter_map(|r| r.discount).map(|d| d.as_percent().value()))
                .map(Percent),
            avg_roe: mean(rows.iter().filter_map(|r| r.instrument.fields.roe).map(Percent::value))
                .map(Percent),
        }
    }
}

/// Number of rows per signal, in enumeration order
pub fn signal_counts(rows: &[ScreenedInstrument]) -> Vec<(Signal, usize)> {
    Signal::ALL
        .iter()
        .map(|s| (*s, rows.iter().filter(|r| r.signal == *s).count()))
        .collect()
}

/// Per-sector aggregate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorStats {
    pub sector: String,
    pub count: usize,
    pub avg_yield: Option<Percent>,
    pub avg_roe: Option<Percent>,
}

/// Sector aggregates sorted by average yield, highest first
pub fn sector_breakdown(rows: &[ScreenedInstrument]) -> Vec<SectorStats> {
    let mut groups: BTreeMap<&str, Vec<&ScreenedInstrument>> = BTreeMap::new();
    for row in rows {
        groups.entry(row.sector.as_str()).or_default().push(row);
    }

    let mut stats: Vec<SectorStats> = groups
        .into_iter()
        .map(|(sector, members)| SectorStats {
            sector: sector.to_string(),
            count: members.len(),
            avg_yield: mean(members.iter().filter_map(|r| r.div_yield).map(|y| y.as_percent().value()))
                .map(Percent),
            avg_roe: mean(members.iter().filter_map(|r| r.instrument.fields.roe).map(Percent::value))
                .map(Percent),
        })
        .collect();

    stats.sort_by(|a, b| desc(a.avg_yield.map(Percent::value), b.avg_yield.map(Percent::value)));
    stats
}

/// Expected dividend payments in one month
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthSummary {
    pub month: Month,
    pub interim: Vec<String>,
    pub final_payers: Vec<String>,
    /// Interim plus final payments
    pub count: usize,
    pub avg_yield: Option<Percent>,
}

/// Twelve-month dividend calendar from interim/final months
pub fn dividend_calendar(rows: &[ScreenedInstrument]) -> Vec<MonthSummary> {
    Month::ALL
        .iter()
        .map(|&month| {
            let interim: Vec<&ScreenedInstrument> = rows
                .iter()
                .filter(|r| r.instrument.fields.interim == Some(month))
                .collect();
            let final_payers: Vec<&ScreenedInstrument> = rows
                .iter()
                .filter(|r| r.instrument.fields.final_month == Some(month))
                .collect();
            let avg_yield = mean(
                interim
                    .iter()
                    .chain(final_payers.iter())
                    .filter_map(|r| r.div_yield)
                    .map(|y| y.as_percent().value()),
            )
            .map(Percent);

            MonthSummary {
                month,
                count: interim.len() + final_payers.len(),
                interim: interim.iter().map(|r| r.ticker().to_string()).collect(),
                final_payers: final_payers.iter().map(|r| r.ticker().to_string()).collect(),
                avg_yield,
            }
        })
        .collect()
}

/// Months with the most payments, at most `n`, skipping empty months
pub fn busiest_months(calendar: &[MonthSummary], n: usize) -> Vec<&MonthSummary> {
    let mut months: Vec<&MonthSummary> = calendar.iter().filter(|m| m.count > 0).collect();
    months.sort_by(|a, b| b.count.cmp(&a.count));
    months.truncate(n);
    months
}

/// Highest-yielding rows
pub fn top_by_yield(rows: &[ScreenedInstrument], n: usize) -> Vec<&ScreenedInstrument> {
    let mut ranked: Vec<&ScreenedInstrument> = rows.iter().filter(|r| r.div_yield.is_some()).collect();
    ranked.sort_by(|a, b| desc(a.div_yield.map(|y| y.value()), b.div_yield.map(|y| y.value())));
    ranked.truncate(n);
    ranked
}

/// Deepest-discount rows
pub fn top_by_discount(rows: &[ScreenedInstrument], n: usize) -> Vec<&ScreenedInstrument> {
    let mut ranked: Vec<&ScreenedInstrument> = rows.iter().filter(|r| r.discount.is_some()).collect();
    ranked.sort_by(|a, b| desc(a.discount.map(|d| d.value()), b.discount.map(|d| d.value())));
    ranked.truncate(n);
    ranked
}

const BEST_VALUE_MIN_YIELD: f64 = 0.06;
const BEST_VALUE_MIN_DISCOUNT: f64 = 0.10;
const BEST_VALUE_MIN_ROE: f64 = 10.0;
const BEST_VALUE_PICKS: usize = 8;

/// Yield >= 6%, discount >= 10% and ROE >= 10, top 8 by yield
pub fn best_value(rows: &[ScreenedInstrument]) -> Vec<&ScreenedInstrument> {
    let mut picks: Vec<&ScreenedInstrument> = rows
        .iter()
        .filter(|r| {
            r.div_yield.map_or(false, |y| y.value() >= BEST_VALUE_MIN_YIELD)
                && r.discount.map_or(false, |d| d.value() >= BEST_VALUE_MIN_DISCOUNT)
                && r.instrument.fields.roe.map_or(false, |roe| roe.value() >= BEST_VALUE_MIN_ROE)
        })
        .collect();
    picks.sort_by(|a, b| desc(a.div_yield.map(|y| y.value()), b.div_yield.map(|y| y.value())));
    picks.truncate(BEST_VALUE_PICKS);
    picks
}

/// Dividend sustainability from the payout ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PayoutRisk {
    Safe,
    Moderate,
    Elevated,
    Unsustainable,
    Unknown,
}

impl PayoutRisk {
    pub fn classify(dpr: Option<Percent>, thresholds: &Thresholds) -> Self {
        match dpr.map(Percent::value).filter(|v| v.is_finite()) {
            None => PayoutRisk::Unknown,
            Some(v) if v < thresholds.safe_dpr => PayoutRisk::Safe,
            Some(v) if v < thresholds.moderate_dpr => PayoutRisk::Moderate,
            Some(v) if v <= thresholds.elevated_dpr => PayoutRisk::Elevated,
            Some(_) => PayoutRisk::Unsustainable,
        }
    }
}

impl fmt::Display for PayoutRisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PayoutRisk::Safe => "SAFE",
            PayoutRisk::Moderate => "MODERATE",
            PayoutRisk::Elevated => "ELEVATED",
            PayoutRisk::Unsustainable => "UNSUSTAINABLE",
            PayoutRisk::Unknown => "N/A",
        };
        f.write_str(label)
    }
}
