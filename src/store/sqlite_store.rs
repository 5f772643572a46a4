//! Instrument store with SQLite backend

use super::InstrumentStore;
use crate::error::{Result, ScreenerError};
use crate::instrument::{Instrument, ManualFields};
use crate::types::{Month, Percent, Ticker, TIMESTAMP_FORMAT};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashSet;
use std::path::Path;

const SELECT_COLUMNS: &str = "SELECT ticker, bvps, eps, roe, div_ttm, dpr, manual_fair_value, interim, final_month, last_updated FROM instruments";

/// Instrument table in a SQLite database
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Create or open database at path
    pub fn new(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)
            .map_err(|e| ScreenerError::store_unavailable("open", e))?;

        let store = Self { conn };
        store.create_tables()?;
        Ok(store)
    }

    /// Create in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| ScreenerError::store_unavailable("open", e))?;

        let store = Self { conn };
        store.create_tables()?;
        Ok(store)
    }

    fn create_tables(&self) -> Result<()> {
        self.conn
            .execute(
                "CREATE TABLE IF NOT EXISTS instruments (
                    ticker TEXT PRIMARY KEY,
                    bvps REAL,
                    eps REAL,
                    roe REAL,
                    div_ttm REAL,
                    dpr REAL,
                    manual_fair_value REAL,
                    interim TEXT,
                    final_month TEXT,
                    last_updated TEXT
                )",
                [],
            )
            .map_err(|e| ScreenerError::store_unavailable("create table", e))?;
        Ok(())
    }

    fn row_to_instrument(row: &Row<'_>) -> rusqlite::Result<(String, Option<Instrument>)> {
        let raw_ticker: String = row.get(0)?;
        let month = |idx: usize| -> rusqlite::Result<Option<Month>> {
            Ok(row
                .get::<_, Option<String>>(idx)?
                .and_then(|s| Month::parse_optional(&s).ok().flatten()))
        };

        let fields = ManualFields {
            bvps: row.get(1)?,
            eps: row.get(2)?,
            roe: row.get::<_, Option<f64>>(3)?.map(Percent),
            div_ttm: row.get(4)?,
            dpr: row.get::<_, Option<f64>>(5)?.map(Percent),
            manual_fair_value: row.get(6)?,
            interim: month(7)?,
            final_month: month(8)?,
        };
        let last_updated = row
            .get::<_, Option<String>>(9)?
            .and_then(|s| NaiveDateTime::parse_from_str(&s, TIMESTAMP_FORMAT).ok());

        let instrument = Ticker::parse(&raw_ticker)
            .ok()
            .map(|ticker| Instrument::new_at(ticker, fields, last_updated));
        Ok((raw_ticker, instrument))
    }

    /// Fetch a single instrument
    pub fn get(&self, ticker: &Ticker) -> Result<Option<Instrument>> {
        let query = format!("{} WHERE ticker = ?1", SELECT_COLUMNS);
        let found = self
            .conn
            .query_row(&query, params![ticker.as_str()], Self::row_to_instrument)
            .optional()
            .map_err(|e| ScreenerError::store_unavailable("get", e))?;
        Ok(found.and_then(|(_, inst)| inst))
    }

    /// Number of stored instruments
    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM instruments", [], |row| row.get(0))
            .map_err(|e| ScreenerError::store_unavailable("count", e))?;
        Ok(count as usize)
    }

    /// Cheap connectivity probe
    pub fn health_check(&self) -> bool {
        self.count().is_ok()
    }
}

impl InstrumentStore for SqliteStore {
    fn load_all(&self) -> Result<Vec<Instrument>> {
        let query = format!("{} ORDER BY rowid", SELECT_COLUMNS);
        let mut stmt = self
            .conn
            .prepare(&query)
            .map_err(|e| ScreenerError::store_unavailable("load", e))?;

        let rows = stmt
            .query_map([], Self::row_to_instrument)
            .map_err(|e| ScreenerError::store_unavailable("load", e))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| ScreenerError::store_unavailable("load", e))?;

        Ok(rows
            .into_iter()
            .filter_map(|(raw, inst)| {
                if inst.is_none() {
                    log::warn!("Skipping stored row with invalid ticker {:?}", raw);
                }
                inst
            })
            .collect())
    }

    fn save_all(&mut self, instruments: &[Instrument]) -> Result<()> {
        let persist = |e: rusqlite::Error| ScreenerError::persistence("save", "<collection>", e);
        let tx = self.conn.transaction().map_err(persist)?;
        {
            let mut upsert = tx
                .prepare(
                    "INSERT INTO instruments (ticker, bvps, eps, roe, div_ttm, dpr, manual_fair_value, interim, final_month, last_updated)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                     ON CONFLICT(ticker) DO UPDATE SET
                        bvps = excluded.bvps, eps = excluded.eps, roe = excluded.roe,
                        div_ttm = excluded.div_ttm, dpr = excluded.dpr,
                        manual_fair_value = excluded.manual_fair_value,
                        interim = excluded.interim, final_month = excluded.final_month,
                        last_updated = excluded.last_updated",
                )
                .map_err(persist)?;

            for inst in instruments {
                let f = &inst.fields;
                upsert
                    .execute(params![
                        inst.ticker.as_str(),
                        f.bvps,
                        f.eps,
                        f.roe.map(Percent::value),
                        f.div_ttm,
                        f.dpr.map(Percent::value),
                        f.manual_fair_value,
                        f.interim.map(|m| m.name()),
                        f.final_month.map(|m| m.name()),
                        inst.last_updated.map(|t| t.format(TIMESTAMP_FORMAT).to_string()),
                    ])
                    .map_err(persist)?;
            }

            let keep: HashSet<&str> = instruments.iter().map(|i| i.ticker.as_str()).collect();
            let existing: Vec<String> = {
                let mut stmt = tx.prepare("SELECT ticker FROM instruments").map_err(persist)?;
                let tickers = stmt
                    .query_map([], |row| row.get::<_, String>(0))
                    .map_err(persist)?
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(persist)?;
                tickers
            };
            for stale in existing.iter().filter(|t| !keep.contains(t.as_str())) {
                tx.execute("DELETE FROM instruments WHERE ticker = ?1", params![stale])
                    .map_err(persist)?;
            }
        }
        tx.commit().map_err(persist)?;
        Ok(())
    }

    fn delete(&mut self, ticker: &Ticker) -> Result<()> {
        self.conn
            .execute("DELETE FROM instruments WHERE ticker = ?1", params![ticker.as_str()])
            .map_err(|e| ScreenerError::persistence("delete", ticker.as_str(), e))?;
        Ok(())
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}
