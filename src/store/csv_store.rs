//! CSV file store
//!
//! One row per instrument with the columns
//! `Ticker,BVPS,EPS,ROE,DivTTM,DPR,ManualFairValue,Interim,Final,LastUpdated`.
//! Numeric cells are coerced leniently on load. Derived columns written by
//! older tools are ignored.

use super::{dedupe_last, InstrumentStore};
use crate::error::{Result, ScreenerError};
use crate::instrument::{Instrument, ManualFields};
use crate::types::{coerce_number, Month, Percent, Ticker, Timestamp, TIMESTAMP_FORMAT};
use chrono::NaiveDateTime;
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Column order of the persisted file
pub const MANUAL_COLUMNS: [&str; 10] = [
    "Ticker",
    "BVPS",
    "EPS",
    "ROE",
    "DivTTM",
    "DPR",
    "ManualFairValue",
    "Interim",
    "Final",
    "LastUpdated",
];

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "Ticker", default)]
    ticker: String,
    #[serde(rename = "BVPS", default)]
    bvps: String,
    #[serde(rename = "EPS", default)]
    eps: String,
    #[serde(rename = "ROE", default)]
    roe: String,
    #[serde(rename = "DivTTM", default)]
    div_ttm: String,
    #[serde(rename = "DPR", default)]
    dpr: String,
    #[serde(rename = "ManualFairValue", default)]
    manual_fair_value: String,
    #[serde(rename = "Interim", default)]
    interim: String,
    #[serde(rename = "Final", default)]
    final_month: String,
    #[serde(rename = "LastUpdated", default)]
    last_updated: String,
}

#[derive(Debug, Serialize)]
struct CsvRecord {
    #[serde(rename = "Ticker")]
    ticker: String,
    #[serde(rename = "BVPS")]
    bvps: String,
    #[serde(rename = "EPS")]
    eps: String,
    #[serde(rename = "ROE")]
    roe: String,
    #[serde(rename = "DivTTM")]
    div_ttm: String,
    #[serde(rename = "DPR")]
    dpr: String,
    #[serde(rename = "ManualFairValue")]
    manual_fair_value: String,
    #[serde(rename = "Interim")]
    interim: String,
    #[serde(rename = "Final")]
    final_month: String,
    #[serde(rename = "LastUpdated")]
    last_updated: String,
}

fn number_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn month_cell(value: Option<Month>) -> String {
    value.map(|m| m.name().to_string()).unwrap_or_default()
}

/// Accepts the store's own format plus ISO-8601 and fractional seconds
fn parse_timestamp(raw: &str) -> Option<Timestamp> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

impl CsvRow {
    fn into_instrument(self) -> Result<Instrument> {
        let ticker = Ticker::parse(&self.ticker)?;
        let month = |raw: &str| match Month::parse_optional(raw) {
            Ok(m) => m,
            Err(_) => {
                log::warn!("Ignoring unknown month {:?} for {}", raw, ticker);
                None
            }
        };
        let fields = ManualFields {
            bvps: coerce_number(&self.bvps),
            eps: coerce_number(&self.eps),
            roe: coerce_number(&self.roe).map(Percent),
            div_ttm: coerce_number(&self.div_ttm),
            dpr: coerce_number(&self.dpr).map(Percent),
            manual_fair_value: coerce_number(&self.manual_fair_value),
            interim: month(&self.interim),
            final_month: month(&self.final_month),
        };
        Ok(Instrument::new_at(ticker, fields, parse_timestamp(&self.last_updated)))
    }
}

impl From<&Instrument> for CsvRecord {
    fn from(inst: &Instrument) -> Self {
        let f = &inst.fields;
        Self {
            ticker: inst.ticker.to_string(),
            bvps: number_cell(f.bvps),
            eps: number_cell(f.eps),
            roe: number_cell(f.roe.map(Percent::value)),
            div_ttm: number_cell(f.div_ttm),
            dpr: number_cell(f.dpr.map(Percent::value)),
            manual_fair_value: number_cell(f.manual_fair_value),
            interim: month_cell(f.interim),
            final_month: month_cell(f.final_month),
            last_updated: inst
                .last_updated
                .map(|t| t.format(TIMESTAMP_FORMAT).to_string())
                .unwrap_or_default(),
        }
    }
}

/// Instruments kept in a CSV file
#[derive(Debug, Clone)]
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "instruments.csv".to_string());
        self.path.with_file_name(format!(".{}.tmp", name))
    }

    fn read_from(reader: impl std::io::Read) -> Result<Vec<Instrument>> {
        let mut reader = ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut instruments = Vec::new();
        for (line, row) in reader.deserialize::<CsvRow>().enumerate() {
            let parsed = row
                .map_err(ScreenerError::from)
                .and_then(CsvRow::into_instrument);
            match parsed {
                Ok(inst) => instruments.push(inst),
                Err(e) => log::warn!("Skipping CSV row {}: {}", line + 2, e),
            }
        }
        Ok(dedupe_last(instruments))
    }

    fn write_to(writer: impl std::io::Write, instruments: &[Instrument]) -> Result<()> {
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(writer);
        writer.write_record(MANUAL_COLUMNS)?;
        for inst in instruments {
            writer.serialize(CsvRecord::from(inst))?;
        }
        writer.flush()?;
        Ok(())
    }

    fn write_atomic(&self, instruments: &[Instrument]) -> std::result::Result<(), String> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }

        let tmp = self.temp_path();
        let written = fs::File::create(&tmp)
            .map_err(ScreenerError::from)
            .and_then(|file| Self::write_to(file, instruments))
            .and_then(|()| fs::rename(&tmp, &self.path).map_err(ScreenerError::from));

        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(e.to_string());
        }
        Ok(())
    }
}

impl InstrumentStore for CsvStore {
    fn load_all(&self) -> Result<Vec<Instrument>> {
        if !self.path.exists() {
            log::debug!("{} does not exist yet, starting empty", self.path.display());
            return Ok(Vec::new());
        }
        let file = fs::File::open(&self.path)
            .map_err(|e| ScreenerError::store_unavailable("load", e))?;
        Self::read_from(file)
    }

    fn save_all(&mut self, instruments: &[Instrument]) -> Result<()> {
        self.write_atomic(instruments)
            .map_err(|cause| ScreenerError::persistence("save", "<collection>", cause))?;
        log::info!("Wrote {} instruments to {}", instruments.len(), self.path.display());
        Ok(())
    }

    fn delete(&mut self, ticker: &Ticker) -> Result<()> {
        let mut instruments = self.load_all()?;
        let before = instruments.len();
        instruments.retain(|i| &i.ticker != ticker);
        if instruments.len() == before {
            return Ok(());
        }
        self.write_atomic(&instruments)
            .map_err(|cause| ScreenerError::persistence("delete", ticker.as_str(), cause))
    }

    fn name(&self) -> &str {
        "csv"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn sample() -> Vec<Instrument> {
        let ts = NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        vec![
            Instrument::new_at(
                Ticker::parse("BBCA").unwrap(),
                ManualFields {
                    bvps: Some(1935.12),
                    eps: Some(445.7),
                    roe: Some(Percent(21.3)),
                    div_ttm: Some(270.0),
                    dpr: Some(Percent(60.5)),
                    manual_fair_value: Some(11000.0),
                    interim: Some(Month::November),
                    final_month: Some(Month::April),
                },
                Some(ts),
            ),
            Instrument::new_at(Ticker::parse("TLKM").unwrap(), ManualFields::default(), None),
        ]
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = CsvStore::new(dir.path().join("nope.csv"));
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_round_trip() {
        let dir = tempdir().unwrap();
        let mut store = CsvStore::new(dir.path().join("nested").join("stocks.csv"));
        let rows = sample();
        store.save_all(&rows).unwrap();
        assert_eq!(store.load_all().unwrap(), rows);
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn test_header_only_file_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stocks.csv");
        fs::write(&path, MANUAL_COLUMNS.join(",") + "\n").unwrap();
        assert!(CsvStore::new(&path).load_all().unwrap().is_empty());
    }

    #[test]
    fn test_legacy_file_with_derived_columns() {
        let csv = "Ticker,BVPS,EPS,ROE,DivTTM,DPR,Interim,Final,LastUpdated,CurrentPrice,Signal\n\
                   bbri,\"2,100\",380,19.5%,300,n/a,May,,2024-05-01 10:00:00.123456,4500,BUY\n\
                   ,1,1,1,1,1,,,,,\n";
        let rows = CsvStore::read_from(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        let r = &rows[0];
        assert_eq!(r.ticker.as_str(), "BBRI");
        assert_eq!(r.fields.bvps, Some(2100.0));
        assert_eq!(r.fields.roe, Some(Percent(19.5)));
        assert_eq!(r.fields.dpr, None);
        assert_eq!(r.fields.manual_fair_value, None);
        assert_eq!(r.fields.interim, Some(Month::May));
        assert_eq!(r.fields.final_month, None);
        assert!(r.last_updated.is_some());
    }

    #[test]
    fn test_delete() {
        let dir = tempdir().unwrap();
        let mut store = CsvStore::new(dir.path().join("stocks.csv"));
        store.save_all(&sample()).unwrap();
        store.delete(&Ticker::parse("BBCA").unwrap()).unwrap();
        let rows = store.load_all().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].ticker.as_str(), "TLKM");
        // absent ticker is a no-op
        store.delete(&Ticker::parse("BBCA").unwrap()).unwrap();
    }

    #[test]
    fn test_unwritable_location_reports_persistence_failure() {
        let dir = tempdir().unwrap();
        // a directory where the file should be
        let path = dir.path().join("taken");
        fs::create_dir_all(path.join("child")).unwrap();
        let mut store = CsvStore::new(&path);
        let err = store.save_all(&sample()).unwrap_err();
        assert!(matches!(err, ScreenerError::PersistenceFailed { .. }));
    }
}
