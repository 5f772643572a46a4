//! Screener configuration and signal thresholds

use crate::error::{Result, ScreenerError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Decision thresholds for valuation, signals and payout risk.
///
/// Yield and discount thresholds are decimal fractions; ROE and DPR
/// thresholds are percentage points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub min_yield: f64,
    pub exceptional_yield: f64,
    pub high_discount: f64,
    pub good_discount: f64,
    pub fair_discount: f64,
    pub min_roe_basic: f64,
    pub good_roe: f64,
    pub excellent_roe: f64,
    pub graham_multiplier: f64,
    pub safe_dpr: f64,
    pub moderate_dpr: f64,
    pub elevated_dpr: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_yield: 0.08,
            exceptional_yield: 0.10,
            high_discount: 0.20,
            good_discount: 0.15,
            fair_discount: 0.05,
            min_roe_basic: 8.0,
            good_roe: 10.0,
            excellent_roe: 15.0,
            graham_multiplier: 22.5,
            safe_dpr: 70.0,
            moderate_dpr: 80.0,
            elevated_dpr: 100.0,
        }
    }
}

impl Thresholds {
    pub fn validate(&self) -> Result<()> {
        let named = [
            ("min_yield", self.min_yield),
            ("exceptional_yield", self.exceptional_yield),
            ("high_discount", self.high_discount),
            ("good_discount", self.good_discount),
            ("fair_discount", self.fair_discount),
            ("min_roe_basic", self.min_roe_basic),
            ("good_roe", self.good_roe),
            ("excellent_roe", self.excellent_roe),
            ("graham_multiplier", self.graham_multiplier),
            ("safe_dpr", self.safe_dpr),
            ("moderate_dpr", self.moderate_dpr),
            ("elevated_dpr", self.elevated_dpr),
        ];
        for (name, value) in named {
            if !value.is_finite() || value < 0.0 {
                return Err(ScreenerError::ConfigError(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }

        if !(self.fair_discount <= self.good_discount && self.good_discount <= self.high_discount) {
            return Err(ScreenerError::ConfigError(
                "discount thresholds must satisfy fair <= good <= high".to_string(),
            ));
        }
        if !(self.safe_dpr <= self.moderate_dpr && self.moderate_dpr <= self.elevated_dpr) {
            return Err(ScreenerError::ConfigError(
                "DPR bands must satisfy safe <= moderate <= elevated".to_string(),
            ));
        }

        Ok(())
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenerConfig {
    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,
    #[serde(default = "default_exchange_suffix")]
    pub exchange_suffix: String,
    #[serde(default = "default_price_cache_ttl")]
    pub price_cache_ttl_secs: u64,
    #[serde(default = "default_lookup_timeout")]
    pub lookup_timeout_secs: u64,
    #[serde(default)]
    pub thresholds: Thresholds,
}

/// Directory holding the config file and default data file
pub fn app_dir() -> PathBuf {
    #[cfg(feature = "cli")]
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    #[cfg(not(feature = "cli"))]
    let home = PathBuf::from(".");
    home.join(".dividend-screener")
}

fn default_data_file() -> PathBuf {
    app_dir().join("instruments.csv")
}

fn default_exchange_suffix() -> String {
    ".JK".to_string()
}

fn default_price_cache_ttl() -> u64 {
    600
}

fn default_lookup_timeout() -> u64 {
    10
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            data_file: default_data_file(),
            exchange_suffix: default_exchange_suffix(),
            price_cache_ttl_secs: default_price_cache_ttl(),
            lookup_timeout_secs: default_lookup_timeout(),
            thresholds: Thresholds::default(),
        }
    }
}

impl ScreenerConfig {
    pub fn price_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.price_cache_ttl_secs)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.lookup_timeout_secs == 0 {
            return Err(ScreenerError::ConfigError(
                "lookup_timeout_secs must be greater than zero".to_string(),
            ));
        }
        self.thresholds.validate()
    }

    /// Parse a TOML document
    #[cfg(feature = "cli")]
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(contents).map_err(|e| ScreenerError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit path, else the default location, else defaults.
    ///
    /// An unreadable or malformed file is logged and replaced by defaults.
    #[cfg(feature = "cli")]
    pub fn load(path: Option<&Path>) -> Self {
        let candidate = match path {
            Some(p) => p.to_path_buf(),
            None => app_dir().join("config.toml"),
        };
        if !candidate.exists() {
            if path.is_some() {
                log::warn!("Config file {} not found, using defaults", candidate.display());
            }
            return Self::default();
        }

        match std::fs::read_to_string(&candidate) {
            Ok(contents) => match Self::from_toml_str(&contents) {
                Ok(config) => config,
                Err(e) => {
                    log::warn!("Failed to parse config {}: {}", candidate.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Failed to read config {}: {}", candidate.display(), e);
                Self::default()
            }
        }
    }

    /// Path of the data file, relative paths resolved against `base`
    pub fn data_file_in(&self, base: &Path) -> PathBuf {
        if self.data_file.is_absolute() {
            self.data_file.clone()
        } else {
            base.join(&self.data_file)
        }
    }
}
