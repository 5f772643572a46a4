use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dividend_screener::{
    config::Thresholds,
    instrument::{Instrument, ManualFields},
    market_data::{MarketDataProvider, Quote, StaticQuotes},
    pipeline::{apply_filters, apply_preset, quote_map, Screener, SignalInputs},
    summary::{dividend_calendar, ScreenSummary},
    types::{Fraction, Month, Percent, Ticker},
};

const SECTORS: [&str; 4] = ["Energy", "Financial Services", "Basic Materials", "Utilities"];

fn universe(n: usize) -> (Vec<Instrument>, StaticQuotes) {
    let mut quotes = StaticQuotes::new();
    let instruments = (0..n)
        .map(|i| {
            let ticker = Ticker::parse(&format!("T{:04}", i)).unwrap();
            let f = i as f64;
            quotes.insert(
                ticker.clone(),
                Quote::new(Some(800.0 + (f * 37.0) % 4000.0), SECTORS[i % SECTORS.len()]),
            );
            Instrument::new_at(
                ticker,
                ManualFields {
                    bvps: Some(500.0 + (f * 13.0) % 3000.0),
                    eps: Some(40.0 + (f * 7.0) % 400.0),
                    roe: Some(Percent(4.0 + (f * 3.0) % 30.0)),
                    div_ttm: Some(20.0 + (f * 11.0) % 300.0),
                    dpr: Some(Percent(30.0 + (f * 5.0) % 90.0)),
                    manual_fair_value: None,
                    interim: Some(Month::ALL[i % 12]),
                    final_month: Some(Month::ALL[(i + 6) % 12]),
                },
                None,
            )
        })
        .collect();
    (instruments, quotes)
}

fn benchmark_process(c: &mut Criterion) {
    let (instruments, quotes) = universe(1000);
    let tickers: Vec<Ticker> = instruments.iter().map(|i| i.ticker.clone()).collect();
    let map = quote_map(&quotes.lookup_all(&tickers));
    let screener = Screener::default();

    c.bench_function("process_1000", |b| {
        b.iter(|| screener.process(black_box(&instruments), black_box(&map)));
    });
}

fn benchmark_classify_batch(c: &mut Criterion) {
    let screener = Screener::default();
    let rows: Vec<SignalInputs> = (0..10_000)
        .map(|i| {
            let f = i as f64;
            SignalInputs {
                discount: Some(Fraction(((f * 0.013) % 0.6) - 0.2)),
                div_yield: Some(Fraction((f * 0.0007) % 0.2)),
                roe: Some(Percent((f * 0.37) % 35.0)),
            }
        })
        .collect();

    c.bench_function("classify_batch_10000", |b| {
        b.iter(|| screener.classifier().classify_batch(black_box(&rows)));
    });
}

fn benchmark_filters_and_summary(c: &mut Criterion) {
    let (instruments, quotes) = universe(1000);
    let screener = Screener::default();
    let (rows, _) = screener.run(&instruments, &quotes);
    let state = apply_preset("Safe Income").unwrap();
    let thresholds = Thresholds::default();

    c.bench_function("apply_filters_1000", |b| {
        b.iter(|| apply_filters(black_box(&rows), black_box(&state)));
    });

    c.bench_function("summary_1000", |b| {
        b.iter(|| {
            let summary = ScreenSummary::from_rows(black_box(&rows), &thresholds);
            let calendar = dividend_calendar(black_box(&rows));
            (summary, calendar)
        });
    });
}

criterion_group!(
    benches,
    benchmark_process,
    benchmark_classify_batch,
    benchmark_filters_and_summary
);
criterion_main!(benches);
