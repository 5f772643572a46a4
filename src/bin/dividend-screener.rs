//! dividend-screener CLI - screen a dividend watchlist from the terminal
//!
//! ## Example Usage
//!
//! ```bash
//! # Screen with a preset
//! dividend-screener screen --preset "Value Play"
//!
//! # Add an instrument
//! dividend-screener add PTBA --bvps 1890 --eps 440 --roe 23.9 --div-ttm 397 --dpr 75 --final june
//!
//! # Dividend calendar without touching the network
//! dividend-screener calendar --offline
//! ```

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use dividend_screener::config::{app_dir, ScreenerConfig};
use dividend_screener::error::ScreenerError;
use dividend_screener::instrument::{Instrument, ManualFields};
use dividend_screener::market_data::MarketDataProvider;
use dividend_screener::pipeline::{
    apply_filters, apply_preset, clear_filters, quote_map, FilterState, Preset, QuoteMap,
    ScreenedInstrument, Screener, Signal,
};
use dividend_screener::store::{CsvStore, InstrumentStore, Watchlist};
use dividend_screener::summary::{
    best_value, busiest_months, dividend_calendar, sector_breakdown, signal_counts,
    top_by_discount, top_by_yield, PayoutRisk, ScreenSummary,
};
use dividend_screener::types::{Fraction, Month, Percent, Price, Ticker};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

/// dividend-screener: Graham valuation and buy signals for dividend stocks
#[derive(Parser)]
#[command(name = "dividend-screener")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "Robert Fall")]
#[command(about = "Dividend equity screener", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Instrument data file (.csv, or .db/.sqlite)
    #[arg(short = 'f', long, global = true)]
    data_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch quotes, compute signals and list the rows that pass the filters
    Screen {
        /// Start from a named preset
        #[arg(short = 'p', long)]
        preset: Option<String>,

        /// Allowed signals (repeatable)
        #[arg(short = 's', long)]
        signal: Vec<String>,

        /// Allowed sectors (repeatable)
        #[arg(long)]
        sector: Vec<String>,

        /// Minimum discount to fair value, percent
        #[arg(long)]
        discount_min: Option<f64>,

        /// Minimum dividend yield, percent
        #[arg(long)]
        yield_min: Option<f64>,

        /// Minimum ROE, percent
        #[arg(long)]
        roe_min: Option<f64>,

        /// Maximum payout ratio, percent
        #[arg(long)]
        dpr_max: Option<f64>,

        /// Skip quote lookups
        #[arg(long)]
        offline: bool,

        /// Write the filtered rows as JSON
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },

    /// Show one instrument in detail
    Show {
        #[arg(value_name = "TICKER")]
        ticker: String,

        /// Skip quote lookups
        #[arg(long)]
        offline: bool,
    },

    /// Add an instrument to the watchlist
    Add {
        #[arg(value_name = "TICKER")]
        ticker: String,

        #[command(flatten)]
        fields: FieldArgs,
    },

    /// Change manual fields of an instrument; omitted fields are kept
    Edit {
        #[arg(value_name = "TICKER")]
        ticker: String,

        #[command(flatten)]
        fields: FieldArgs,
    },

    /// Remove an instrument from the watchlist
    Delete {
        #[arg(value_name = "TICKER")]
        ticker: String,
    },

    /// List the built-in filter presets
    Presets,

    /// Headline metrics, signal and sector breakdowns
    Summary {
        /// Skip quote lookups
        #[arg(long)]
        offline: bool,
    },

    /// Expected dividend payments per month
    Calendar {
        /// Skip quote lookups
        #[arg(long)]
        offline: bool,
    },

    /// Show configuration and build information
    Info,
}

/// Manually maintained fields
#[derive(Args, Debug, Default)]
struct FieldArgs {
    /// Book value per share
    #[arg(long)]
    bvps: Option<f64>,

    /// Earnings per share
    #[arg(long)]
    eps: Option<f64>,

    /// Return on equity, percent
    #[arg(long)]
    roe: Option<f64>,

    /// Trailing twelve-month dividend per share
    #[arg(long)]
    div_ttm: Option<f64>,

    /// Dividend payout ratio, percent
    #[arg(long)]
    dpr: Option<f64>,

    /// Manual fair value; 0 reverts to the Graham number
    #[arg(long)]
    fair_value: Option<f64>,

    /// Interim dividend month
    #[arg(long)]
    interim: Option<String>,

    /// Final dividend month
    #[arg(long = "final")]
    final_month: Option<String>,
}

impl FieldArgs {
    /// Overlay the given arguments on `base`
    fn apply(self, base: ManualFields) -> Result<ManualFields> {
        let month = |raw: Option<String>, current: Option<Month>| -> Result<Option<Month>> {
            match raw {
                Some(s) => Ok(Month::parse_optional(&s)?),
                None => Ok(current),
            }
        };

        Ok(ManualFields {
            bvps: self.bvps.or(base.bvps),
            eps: self.eps.or(base.eps),
            roe: self.roe.map(Percent).or(base.roe),
            div_ttm: self.div_ttm.or(base.div_ttm),
            dpr: self.dpr.map(Percent).or(base.dpr),
            manual_fair_value: self.fair_value.or(base.manual_fair_value),
            interim: month(self.interim, base.interim)?,
            final_month: month(self.final_month, base.final_month)?,
        }
        .sanitized())
    }
}

/// Filter arguments of the `screen` command
struct FilterArgs {
    preset: Option<String>,
    signal: Vec<String>,
    sector: Vec<String>,
    discount_min: Option<f64>,
    yield_min: Option<f64>,
    roe_min: Option<f64>,
    dpr_max: Option<f64>,
}

impl FilterArgs {
    fn into_state(self) -> Result<FilterState> {
        let mut state = match &self.preset {
            Some(name) => apply_preset(name)?,
            None => clear_filters(),
        };
        if !self.signal.is_empty() {
            let signals = self
                .signal
                .iter()
                .map(|s| s.parse::<Signal>())
                .collect::<std::result::Result<Vec<_>, _>>()?;
            state = state.with_signals(signals);
        }
        if !self.sector.is_empty() {
            state = state.with_sectors(self.sector);
        }
        if let Some(pct) = self.discount_min {
            state = state.with_discount_min(pct);
        }
        if let Some(pct) = self.yield_min {
            state = state.with_yield_min(pct);
        }
        if let Some(pct) = self.roe_min {
            state = state.with_roe_min(pct);
        }
        if let Some(pct) = self.dpr_max {
            state = state.with_dpr_max(pct);
        }
        Ok(state)
    }
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = ScreenerConfig::load(cli.config.as_deref());
    let data_file = cli
        .data_file
        .clone()
        .unwrap_or_else(|| config.data_file_in(&app_dir()));

    if cli.verbose {
        println!(
            "{} v{}",
            "dividend-screener".cyan().bold(),
            env!("CARGO_PKG_VERSION")
        );
        println!("Data file: {}", data_file.display().to_string().dimmed());
    }

    if let Err(e) = run(cli.command, &config, &data_file) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

fn run(command: Commands, config: &ScreenerConfig, data_file: &Path) -> Result<()> {
    match command {
        Commands::Screen {
            preset,
            signal,
            sector,
            discount_min,
            yield_min,
            roe_min,
            dpr_max,
            offline,
            output,
        } => {
            let filters = FilterArgs {
                preset,
                signal,
                sector,
                discount_min,
                yield_min,
                roe_min,
                dpr_max,
            }
            .into_state()?;
            screen(config, data_file, &filters, offline, output.as_deref())
        }
        Commands::Show { ticker, offline } => show(config, data_file, &ticker, offline),
        Commands::Add { ticker, fields } => {
            let mut watchlist = open_watchlist(data_file)?;
            let parsed = Ticker::parse(&ticker)?;
            let fields = fields.apply(ManualFields::default())?;
            persist_or_retry(&mut watchlist, |w| w.add(&ticker, fields).map(|_| ()))?;
            println!("{} Added {}", "✓".green().bold(), parsed.to_string().bright_green());
            Ok(())
        }
        Commands::Edit { ticker, fields } => {
            let mut watchlist = open_watchlist(data_file)?;
            let parsed = Ticker::parse(&ticker)?;
            let current = watchlist
                .get(&parsed)
                .map(|i| i.fields.clone())
                .ok_or_else(|| ScreenerError::TickerNotFound(parsed.to_string()))?;
            let fields = fields.apply(current)?;
            persist_or_retry(&mut watchlist, |w| w.edit(&ticker, fields).map(|_| ()))?;
            println!("{} Updated {}", "✓".green().bold(), parsed.to_string().bright_green());
            Ok(())
        }
        Commands::Delete { ticker } => {
            let mut watchlist = open_watchlist(data_file)?;
            let parsed = Ticker::parse(&ticker)?;
            persist_or_retry(&mut watchlist, |w| w.delete(&ticker))?;
            println!("{} Deleted {}", "✓".green().bold(), parsed);
            Ok(())
        }
        Commands::Presets => {
            show_presets();
            Ok(())
        }
        Commands::Summary { offline } => summary(config, data_file, offline),
        Commands::Calendar { offline } => calendar(config, data_file, offline),
        Commands::Info => show_info(config, data_file),
    }
}

fn is_sqlite_path(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("db") | Some("sqlite") | Some("sqlite3")
    )
}

fn open_store(path: &Path) -> Result<Box<dyn InstrumentStore>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    if is_sqlite_path(path) {
        #[cfg(feature = "sqlite")]
        {
            return Ok(Box::new(dividend_screener::store::SqliteStore::new(path)?));
        }
        #[cfg(not(feature = "sqlite"))]
        bail!("{} needs the `sqlite` feature", path.display());
    }
    Ok(Box::new(CsvStore::new(path)))
}

fn open_watchlist(path: &Path) -> Result<Watchlist<Box<dyn InstrumentStore>>> {
    Ok(Watchlist::open(open_store(path)?)?)
}

/// Run a mutation; a failed write is retried once before giving up
fn persist_or_retry(
    watchlist: &mut Watchlist<Box<dyn InstrumentStore>>,
    op: impl FnOnce(&mut Watchlist<Box<dyn InstrumentStore>>) -> dividend_screener::error::Result<()>,
) -> Result<()> {
    match op(watchlist) {
        Err(e @ ScreenerError::PersistenceFailed { .. }) if watchlist.is_dirty() => {
            log::warn!("{}, retrying", e);
            watchlist.retry_persist()?;
            Ok(())
        }
        other => Ok(other?),
    }
}

#[cfg(feature = "async")]
fn quote_provider(config: &ScreenerConfig) -> Result<Box<dyn MarketDataProvider>> {
    use dividend_screener::market_data::{CachedProvider, YahooFinanceQuotes};

    let yahoo = YahooFinanceQuotes::new(&config.exchange_suffix, config.lookup_timeout())?;
    Ok(Box::new(CachedProvider::new(yahoo, config.price_cache_ttl())))
}

#[cfg(not(feature = "async"))]
fn quote_provider(_config: &ScreenerConfig) -> Result<Box<dyn MarketDataProvider>> {
    log::warn!("Built without the `async` feature, no live quotes available");
    Ok(Box::new(dividend_screener::market_data::StaticQuotes::new()))
}

/// Quote every instrument (unless offline) and process the collection
fn screen_rows(
    screener: &Screener,
    instruments: &[Instrument],
    config: &ScreenerConfig,
    offline: bool,
) -> Result<Vec<ScreenedInstrument>> {
    if offline || instruments.is_empty() {
        return Ok(screener.process(instruments, &QuoteMap::new()));
    }

    let provider = quote_provider(config)?;
    let tickers: Vec<Ticker> = instruments.iter().map(|i| i.ticker.clone()).collect();

    let pb = ProgressBar::new(tickers.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    pb.set_message("fetching quotes");
    let results = provider.lookup_all_with_progress(&tickers, &mut |done, _| pb.set_position(done as u64));
    pb.finish_and_clear();

    let failed: Vec<_> = results.iter().filter(|r| !r.is_ok()).collect();
    if !failed.is_empty() {
        eprintln!(
            "{} {} of {} quotes unavailable",
            "Warning:".yellow(),
            failed.len(),
            results.len()
        );
        for r in failed {
            eprintln!("  {} {}", r.ticker, r.error.as_deref().unwrap_or("").dimmed());
        }
    }

    Ok(screener.process(instruments, &quote_map(&results)))
}

fn load_rows(config: &ScreenerConfig, data_file: &Path, offline: bool) -> Result<Vec<ScreenedInstrument>> {
    let watchlist = open_watchlist(data_file)?;
    let screener = Screener::new(config.thresholds.clone());
    screen_rows(&screener, watchlist.instruments(), config, offline)
}

fn fmt_price(value: Option<Price>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.0}", v))
}

fn fmt_fraction(value: Option<Fraction>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.as_percent().to_string())
}

fn fmt_percent(value: Option<Percent>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn colored_signal(signal: Signal, width: usize) -> colored::ColoredString {
    let label = format!("{:<width$}", signal.label(), width = width);
    match signal {
        Signal::StrongBuy => label.green().bold(),
        Signal::Buy => label.green(),
        Signal::Accumulate => label.cyan(),
        Signal::Wait => label.yellow(),
        Signal::WaitForDip => label.red(),
    }
}

fn print_table(rows: &[&ScreenedInstrument]) {
    println!(
        "{:<8} {:>10} {:>10} {:>8} {:>8} {:>7} {:<14} {}",
        "Ticker".bold(),
        "Price".bold(),
        "Fair".bold(),
        "Disc".bold(),
        "Yield".bold(),
        "ROE".bold(),
        "Signal".bold(),
        "Sector".bold()
    );
    for row in rows {
        let fair = if row.uses_manual_fv {
            format!("{}*", fmt_price(row.fair_value))
        } else {
            fmt_price(row.fair_value)
        };
        println!(
            "{:<8} {:>10} {:>10} {:>8} {:>8} {:>7} {} {}",
            row.ticker().as_str(),
            fmt_price(row.current_price),
            fair,
            fmt_fraction(row.discount),
            fmt_fraction(row.div_yield),
            fmt_percent(row.instrument.fields.roe),
            colored_signal(row.signal, 14),
            row.sector.dimmed()
        );
    }
}

fn screen(
    config: &ScreenerConfig,
    data_file: &Path,
    filters: &FilterState,
    offline: bool,
    output: Option<&Path>,
) -> Result<()> {
    let rows = load_rows(config, data_file, offline)?;
    let kept = apply_filters(&rows, filters);

    println!("{}", "Screening Results".cyan().bold());
    println!("{}", "=================".cyan());
    println!();
    if kept.is_empty() {
        println!("  {}", "No instruments match the current filters".yellow());
    } else {
        print_table(&kept.iter().collect::<Vec<_>>());
    }
    println!();
    println!(
        "  {} of {} instruments shown{}",
        kept.len(),
        rows.len(),
        if filters.is_permissive() { "" } else { " (filtered)" }
    );

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&kept)?;
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        println!("{} Results saved to: {}", "✓".green().bold(), path.display());
    }
    Ok(())
}

fn show(config: &ScreenerConfig, data_file: &Path, ticker: &str, offline: bool) -> Result<()> {
    let watchlist = open_watchlist(data_file)?;
    let ticker = Ticker::parse(ticker)?;
    let instrument = watchlist
        .get(&ticker)
        .ok_or_else(|| ScreenerError::TickerNotFound(ticker.to_string()))?;

    let screener = Screener::new(config.thresholds.clone());
    let rows = screen_rows(&screener, std::slice::from_ref(instrument), config, offline)?;
    let Some(row) = rows.first() else {
        bail!("no result for {}", ticker);
    };
    let f = &row.instrument.fields;
    let month = |m: Option<Month>| m.map_or_else(|| "-".to_string(), |m| m.name().to_string());

    println!("{}", format!("{} ({})", row.ticker(), row.sector).cyan().bold());
    println!("{}", "========================================".cyan());
    println!("  {} {}", "Signal:".bold(), colored_signal(row.signal, 0));
    println!("  {} {}", "Price:".bold(), fmt_price(row.current_price));
    println!("  {} {}", "Graham number:".bold(), fmt_price(row.graham_fair_value));
    println!(
        "  {} {}{}",
        "Fair value:".bold(),
        fmt_price(row.fair_value),
        if row.uses_manual_fv { " (manual)".dimmed().to_string() } else { String::new() }
    );
    println!("  {} {}", "Discount:".bold(), fmt_fraction(row.discount));
    println!("  {} {}", "Dividend yield:".bold(), fmt_fraction(row.div_yield));
    println!();
    println!("{}", "Fundamentals:".bold());
    println!("  {} {}", "BVPS:".dimmed(), fmt_price(f.bvps));
    println!("  {} {}", "EPS:".dimmed(), fmt_price(f.eps));
    println!("  {} {}", "ROE:".dimmed(), fmt_percent(f.roe));
    println!("  {} {}", "Dividend (TTM):".dimmed(), fmt_price(f.div_ttm));
    println!(
        "  {} {} [{}]",
        "Payout ratio:".dimmed(),
        fmt_percent(f.dpr),
        PayoutRisk::classify(f.dpr, &config.thresholds)
    );
    println!("  {} {}", "Interim:".dimmed(), month(f.interim));
    println!("  {} {}", "Final:".dimmed(), month(f.final_month));
    if let Some(ts) = row.instrument.last_updated {
        println!("  {} {}", "Last updated:".dimmed(), ts);
    }
    Ok(())
}

fn show_presets() {
    println!("{}", "Filter Presets".cyan().bold());
    println!("{}", "==============".cyan());
    println!();
    for preset in Preset::ALL {
        let state = preset.filter_state();
        let signals: Vec<&str> = state.signals.iter().map(|s| s.label()).collect();
        println!("  {} {}", preset.name().bright_green(), preset.description().dimmed());
        println!(
            "     yield >= {}, discount >= {}, ROE >= {}, signals: {}",
            state.yield_min,
            state.discount_min,
            state.roe_min,
            signals.join(", ")
        );
    }
    println!();
}

fn summary(config: &ScreenerConfig, data_file: &Path, offline: bool) -> Result<()> {
    let rows = load_rows(config, data_file, offline)?;
    let t = &config.thresholds;
    let s = ScreenSummary::from_rows(&rows, t);

    println!("{}", "Portfolio Summary".green().bold());
    println!("{}", "=================".green());
    println!("  {} {}", "Instruments:".bold(), s.total);
    println!("  {} {}", "Buy signals:".bold(), s.buy_signals);
    println!(
        "  {} {}",
        format!("High yield (>= {:.0}%):", t.min_yield * 100.0).bold(),
        s.high_yield
    );
    println!(
        "  {} {}",
        format!("Undervalued (>= {:.0}%):", t.good_discount * 100.0).bold(),
        s.undervalued
    );
    println!(
        "  {} {}",
        format!("Quality (ROE >= {:.0}%):", t.excellent_roe).bold(),
        s.quality
    );
    println!("  {} {}", "Average yield:".bold(), fmt_percent(s.avg_yield));
    println!("  {} {}", "Average discount:".bold(), fmt_percent(s.avg_discount));
    println!("  {} {}", "Average ROE:".bold(), fmt_percent(s.avg_roe));
    println!();

    println!("{}", "Signals:".bold());
    for (signal, count) in signal_counts(&rows) {
        println!("  {} {}", colored_signal(signal, 14), count);
    }
    println!();

    println!("{}", "Sectors:".bold());
    for sector in sector_breakdown(&rows) {
        println!(
            "  {:<24} {:>3}  yield {:>7}  ROE {:>7}",
            sector.sector,
            sector.count,
            fmt_percent(sector.avg_yield),
            fmt_percent(sector.avg_roe)
        );
    }
    println!();

    println!("{}", "Top yield:".bold());
    print_table(&top_by_yield(&rows, 5));
    println!();
    println!("{}", "Top discount:".bold());
    print_table(&top_by_discount(&rows, 5));
    println!();
    println!("{}", "Best value:".bold());
    let picks = best_value(&rows);
    if picks.is_empty() {
        println!("  {}", "None".dimmed());
    } else {
        print_table(&picks);
    }
    println!();
    Ok(())
}

fn calendar(config: &ScreenerConfig, data_file: &Path, offline: bool) -> Result<()> {
    let rows = load_rows(config, data_file, offline)?;
    let months = dividend_calendar(&rows);

    println!("{}", "Dividend Calendar".cyan().bold());
    println!("{}", "=================".cyan());
    for m in &months {
        let line = format!(
            "  {:<4} {:>2}  interim: {:<24} final: {}",
            m.month.abbreviation(),
            m.count,
            m.interim.join(" "),
            m.final_payers.join(" ")
        );
        if m.count == 0 {
            println!("{}", line.dimmed());
        } else {
            println!("{}  {}", line, fmt_percent(m.avg_yield).dimmed());
        }
    }
    println!();

    let busiest: Vec<String> = busiest_months(&months, 3)
        .iter()
        .map(|m| format!("{} ({})", m.month.name(), m.count))
        .collect();
    if !busiest.is_empty() {
        println!("  {} {}", "Busiest:".bold(), busiest.join(", "));
    }
    Ok(())
}

fn show_info(config: &ScreenerConfig, data_file: &Path) -> Result<()> {
    println!("{}", "dividend-screener".cyan().bold());
    println!("{}", "=================".cyan());
    println!("  {} {}", "Version:".bold(), env!("CARGO_PKG_VERSION"));
    println!("  {} {}", "Data file:".bold(), data_file.display());
    println!(
        "  {} {}",
        "Store:".bold(),
        if is_sqlite_path(data_file) { "sqlite" } else { "csv" }
    );
    println!("  {} {}", "Exchange suffix:".bold(), config.exchange_suffix);
    println!("  {} {}s", "Quote cache TTL:".bold(), config.price_cache_ttl_secs);
    println!();

    let t = &config.thresholds;
    println!("{}", "Thresholds:".bold());
    println!("  {} {}", "Minimum yield:".dimmed(), Fraction(t.min_yield));
    println!("  {} {}", "Exceptional yield:".dimmed(), Fraction(t.exceptional_yield));
    println!(
        "  {} {} / {} / {}",
        "Discount (high/good/fair):".dimmed(),
        Fraction(t.high_discount),
        Fraction(t.good_discount),
        Fraction(t.fair_discount)
    );
    println!(
        "  {} {} / {} / {}",
        "ROE (min/good/excellent):".dimmed(),
        Percent(t.min_roe_basic),
        Percent(t.good_roe),
        Percent(t.excellent_roe)
    );
    println!("  {} {}", "Graham multiplier:".dimmed(), t.graham_multiplier);
    println!();

    println!("{}", "Features:".bold());
    println!("  {} {}", "sqlite:".dimmed(), feature_status(cfg!(feature = "sqlite")));
    println!("  {} {}", "async:".dimmed(), feature_status(cfg!(feature = "async")));
    Ok(())
}

fn feature_status(enabled: bool) -> colored::ColoredString {
    if enabled {
        "enabled".green()
    } else {
        "disabled".red()
    }
}
