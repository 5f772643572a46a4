//! Instrument persistence
//!
//! Stores only ever see the manually maintained fields. [`Watchlist`] owns the
//! in-memory collection and applies add/edit/delete as whole-collection
//! replacements: the new collection is swapped in first and persisted second,
//! so a failed write never loses the edit and can be retried.

pub mod csv_store;
#[cfg(feature = "sqlite")]
pub mod sqlite_store;

pub use csv_store::CsvStore;
#[cfg(feature = "sqlite")]
pub use sqlite_store::SqliteStore;

use crate::error::{summarize, Result, ScreenerError};
use crate::instrument::{Instrument, ManualFields};
use crate::types::Ticker;
use hashbrown::HashMap;

/// Backing medium for instruments
pub trait InstrumentStore {
    /// Every stored instrument; an empty medium yields an empty collection
    fn load_all(&self) -> Result<Vec<Instrument>>;

    /// Replace the stored collection with `instruments`
    fn save_all(&mut self, instruments: &[Instrument]) -> Result<()>;

    /// Remove one ticker; removing an absent ticker is not an error
    fn delete(&mut self, ticker: &Ticker) -> Result<()>;

    /// Store name for logs
    fn name(&self) -> &str;
}

/// Keep the last occurrence of each ticker, preserving first-seen order
pub(crate) fn dedupe_last(instruments: Vec<Instrument>) -> Vec<Instrument> {
    let mut position: HashMap<Ticker, usize> = HashMap::new();
    let mut out: Vec<Instrument> = Vec::with_capacity(instruments.len());
    for inst in instruments {
        match position.get(&inst.ticker) {
            Some(&idx) => {
                log::warn!("Duplicate ticker {} in store, keeping last entry", inst.ticker);
                out[idx] = inst;
            }
            None => {
                position.insert(inst.ticker.clone(), out.len());
                out.push(inst);
            }
        }
    }
    out
}

/// Underlying cause text of a store error
fn store_cause(err: &ScreenerError) -> String {
    match err {
        ScreenerError::PersistenceFailed { cause, .. } | ScreenerError::StoreUnavailable { cause, .. } => {
            cause.clone()
        }
        other => summarize(other),
    }
}

/// Copy every instrument from one store into another
pub fn copy_store<A, B>(from: &A, to: &mut B) -> Result<usize>
where
    A: InstrumentStore + ?Sized,
    B: InstrumentStore + ?Sized,
{
    let instruments = dedupe_last(from.load_all()?);
    to.save_all(&instruments)?;
    log::info!(
        "Copied {} instruments from {} to {}",
        instruments.len(),
        from.name(),
        to.name()
    );
    Ok(instruments.len())
}

/// In-memory store with failure injection
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    rows: Vec<Instrument>,
    fail_reads: bool,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<Instrument>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    pub fn set_fail_reads(&mut self, fail: bool) {
        self.fail_reads = fail;
    }

    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    pub fn rows(&self) -> &[Instrument] {
        &self.rows
    }
}

impl InstrumentStore for MemoryStore {
    fn load_all(&self) -> Result<Vec<Instrument>> {
        if self.fail_reads {
            return Err(ScreenerError::store_unavailable("load", "memory store offline"));
        }
        Ok(self.rows.clone())
    }

    fn save_all(&mut self, instruments: &[Instrument]) -> Result<()> {
        if self.fail_writes {
            return Err(ScreenerError::persistence("save", "<collection>", "memory store read-only"));
        }
        self.rows = instruments.to_vec();
        Ok(())
    }

    fn delete(&mut self, ticker: &Ticker) -> Result<()> {
        if self.fail_writes {
            return Err(ScreenerError::persistence("delete", ticker.as_str(), "memory store read-only"));
        }
        self.rows.retain(|i| &i.ticker != ticker);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

impl<S: InstrumentStore + ?Sized> InstrumentStore for Box<S> {
    fn load_all(&self) -> Result<Vec<Instrument>> {
        (**self).load_all()
    }

    fn save_all(&mut self, instruments: &[Instrument]) -> Result<()> {
        (**self).save_all(instruments)
    }

    fn delete(&mut self, ticker: &Ticker) -> Result<()> {
        (**self).delete(ticker)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// The working instrument collection and its store
#[derive(Debug)]
pub struct Watchlist<S> {
    store: S,
    instruments: Vec<Instrument>,
    dirty: bool,
}

impl<S: InstrumentStore> Watchlist<S> {
    /// Load the collection from `store`
    pub fn open(store: S) -> Result<Self> {
        let instruments = dedupe_last(store.load_all()?);
        log::info!("Loaded {} instruments from {}", instruments.len(), store.name());
        Ok(Self {
            store,
            instruments,
            dirty: false,
        })
    }

    pub fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    pub fn get(&self, ticker: &Ticker) -> Option<&Instrument> {
        self.instruments.iter().find(|i| &i.ticker == ticker)
    }

    pub fn tickers(&self) -> Vec<Ticker> {
        self.instruments.iter().map(|i| i.ticker.clone()).collect()
    }

    /// True when the in-memory collection has edits the store has not accepted
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Add a new instrument; rejects a ticker that already exists
    pub fn add(&mut self, ticker: &str, fields: ManualFields) -> Result<&Instrument> {
        let ticker = Ticker::parse(ticker)?;
        if self.get(&ticker).is_some() {
            return Err(ScreenerError::DuplicateTicker(ticker.to_string()));
        }

        let mut next = self.instruments.clone();
        next.push(Instrument::new(ticker.clone(), fields));
        self.commit(next, "add", &ticker)?;
        Ok(&self.instruments[self.instruments.len() - 1])
    }

    /// Replace the manual fields of an existing instrument
    pub fn edit(&mut self, ticker: &str, fields: ManualFields) -> Result<&Instrument> {
        let ticker = Ticker::parse(ticker)?;
        let idx = self.position(&ticker)?;

        let mut next = self.instruments.clone();
        next[idx] = next[idx].edited(fields);
        self.commit(next, "edit", &ticker)?;
        Ok(&self.instruments[idx])
    }

    /// Remove an instrument
    pub fn delete(&mut self, ticker: &str) -> Result<()> {
        let ticker = Ticker::parse(ticker)?;
        let idx = self.position(&ticker)?;

        let mut next = self.instruments.clone();
        next.remove(idx);

        // Unsaved edits ride along with the whole-collection write
        if self.dirty {
            return self.commit(next, "delete", &ticker);
        }
        self.instruments = next;

        match self.store.delete(&ticker) {
            Ok(()) => {
                self.dirty = false;
                log::info!("Deleted {} from {}", ticker, self.store.name());
                Ok(())
            }
            Err(e) => {
                self.dirty = true;
                log::error!("Failed to delete {} from {}: {}", ticker, self.store.name(), e);
                Err(ScreenerError::persistence("delete", ticker.as_str(), store_cause(&e)))
            }
        }
    }

    /// Write the whole in-memory collection again
    pub fn retry_persist(&mut self) -> Result<()> {
        self.store
            .save_all(&self.instruments)
            .map_err(|e| ScreenerError::persistence("retry", "<collection>", store_cause(&e)))?;
        self.dirty = false;
        Ok(())
    }

    /// Replace the in-memory collection with the store's contents.
    ///
    /// Unsaved edits are discarded.
    pub fn reload(&mut self) -> Result<()> {
        self.instruments = dedupe_last(self.store.load_all()?);
        self.dirty = false;
        Ok(())
    }

    fn position(&self, ticker: &Ticker) -> Result<usize> {
        self.instruments
            .iter()
            .position(|i| &i.ticker == ticker)
            .ok_or_else(|| ScreenerError::TickerNotFound(ticker.to_string()))
    }

    fn commit(&mut self, next: Vec<Instrument>, operation: &str, ticker: &Ticker) -> Result<()> {
        self.instruments = next;
        match self.store.save_all(&self.instruments) {
            Ok(()) => {
                self.dirty = false;
                log::info!("Persisted {} of {} to {}", operation, ticker, self.store.name());
                Ok(())
            }
            Err(e) => {
                self.dirty = true;
                log::error!("Failed to persist {} of {}: {}", operation, ticker, e);
                Err(ScreenerError::persistence(operation, ticker.as_str(), store_cause(&e)))
            }
        }
    }
}
