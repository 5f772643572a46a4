//! Staleness-throttled quote cache.
//!
//! A ticker is re-fetched only when its last successful fetch is older than
//! the TTL. Failed lookups are never cached, so the next pass retries them.

use super::{MarketDataProvider, Quote};
use crate::error::Result;
use crate::types::Ticker;
use hashbrown::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CacheEntry {
    quote: Quote,
    fetched_at: Instant,
}

/// Caching wrapper around a provider
#[derive(Debug)]
pub struct CachedProvider<P> {
    inner: P,
    ttl: Duration,
    entries: Mutex<HashMap<Ticker, CacheEntry>>,
}

impl<P: MarketDataProvider> CachedProvider<P> {
    pub fn new(inner: P, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Lookup as of `now`
    pub fn lookup_at(&self, ticker: &Ticker, now: Instant) -> Result<Quote> {
        if let Some(entry) = self.fresh_entry(ticker, now) {
            log::debug!("Quote cache hit for {}", ticker);
            return Ok(entry.quote);
        }

        let quote = self.inner.lookup(ticker)?;
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            ticker.clone(),
            CacheEntry {
                quote: quote.clone(),
                fetched_at: now,
            },
        );
        Ok(quote)
    }

    fn fresh_entry(&self, ticker: &Ticker, now: Instant) -> Option<CacheEntry> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(ticker)
            .filter(|entry| now.saturating_duration_since(entry.fetched_at) <= self.ttl)
            .cloned()
    }

    /// Drop every cached quote
    pub fn invalidate(&self) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Drop one cached quote
    pub fn invalidate_ticker(&self, ticker: &Ticker) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(ticker);
    }

    /// Cached entries, stale ones included
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<P: MarketDataProvider> MarketDataProvider for CachedProvider<P> {
    fn lookup(&self, ticker: &Ticker) -> Result<Quote> {
        self.lookup_at(ticker, Instant::now())
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
