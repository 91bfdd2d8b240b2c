//! Screener configuration file.

use super::SettingsSnapshot;
use crate::errors::ConfigError;
use crate::fetch::FetchConfig;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::{Path, PathBuf};

/// Filter thresholds applied by the screening stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Minimum relative-strength rating (0-100).
    #[serde(default = "default_min_rs")]
    pub min_rs: f64,
    /// Minimum market capitalisation in USD.
    #[serde(default = "default_min_market_cap")]
    pub min_market_cap: f64,
    /// Minimum share price in USD.
    #[serde(default = "default_min_price")]
    pub min_price: f64,
    /// Maximum share price in USD.
    #[serde(default = "default_max_price")]
    pub max_price: f64,
    /// Minimum 50-day average volume.
    #[serde(default = "default_min_volume")]
    pub min_volume: f64,
    /// Minimum year-over-year quarterly revenue growth, in percent.
    #[serde(default = "default_min_growth_percent")]
    pub min_growth_percent: f64,
    /// Relative strength at which the revenue screen is bypassed.
    #[serde(default = "default_protected_rs")]
    pub protected_rs: f64,
}

fn default_min_rs() -> f64 {
    80.0
}

fn default_min_market_cap() -> f64 {
    10_000_000.0
}

fn default_min_price() -> f64 {
    0.20
}

fn default_max_price() -> f64 {
    4.00
}

fn default_min_volume() -> f64 {
    10_000.0
}

fn default_min_growth_percent() -> f64 {
    20.0
}

fn default_protected_rs() -> f64 {
    90.0
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_rs: default_min_rs(),
            min_market_cap: default_min_market_cap(),
            min_price: default_min_price(),
            max_price: default_max_price(),
            min_volume: default_min_volume(),
            min_growth_percent: default_min_growth_percent(),
            protected_rs: default_protected_rs(),
        }
    }
}

/// Toggles for the moving-average trend checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct TrendSettings {
    /// Price at or above the 50-day SMA.
    pub price_above_sma50: bool,
    /// Price at or above the 200-day SMA.
    pub price_above_sma200: bool,
    /// 10-day SMA at or above the 20-day SMA.
    pub sma10_above_sma20: bool,
    /// 20-day SMA at or above the 50-day SMA.
    pub sma20_above_sma50: bool,
    /// Price within 50% of the 52-week high.
    pub price_within_50pct_of_high: bool,
}

impl Default for TrendSettings {
    fn default() -> Self {
        Self {
            price_above_sma50: false,
            price_above_sma200: false,
            sma10_above_sma20: false,
            sma20_above_sma50: false,
            price_within_50pct_of_high: true,
        }
    }
}

/// The full screener configuration.
///
/// Every field is optional in the JSON file. Only the parameters that shape
/// pipeline output go into [`ScreenConfig::snapshot`]; where state is kept
/// and how loudly it logs do not invalidate the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenConfig {
    /// Filter thresholds.
    #[serde(default)]
    pub thresholds: Thresholds,
    /// Trend check toggles.
    #[serde(default)]
    pub trend_settings: TrendSettings,
    /// Fetch engine settings.
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Directory holding artifacts and the ledger.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    /// Default tracing filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("json")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            trend_settings: TrendSettings::default(),
            fetch: FetchConfig::default(),
            state_dir: default_state_dir(),
            log_level: default_log_level(),
        }
    }
}

impl ScreenConfig {
    /// Loads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, is not valid
    /// JSON for this schema, or fails [`ScreenConfig::validate`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the screener cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.fetch.validate()?;
        if self.thresholds.min_price > self.thresholds.max_price {
            return Err(ConfigError::invalid(
                "min_price",
                format!(
                    "{} exceeds max_price {}",
                    self.thresholds.min_price, self.thresholds.max_price
                ),
            ));
        }
        Ok(())
    }

    /// Returns the ledger file path inside the state directory.
    #[must_use]
    pub fn ledger_path(&self) -> PathBuf {
        self.state_dir.join("ledger.json")
    }

    /// Builds the snapshot whose fingerprint keys the cache.
    #[must_use]
    pub fn snapshot(&self) -> SettingsSnapshot {
        let t = &self.thresholds;
        let trend = &self.trend_settings;
        let snapshot = SettingsSnapshot::new()
            .with("min_rs", t.min_rs)
            .with("min_market_cap", t.min_market_cap)
            .with("min_price", t.min_price)
            .with("max_price", t.max_price)
            .with("min_volume", t.min_volume)
            .with("min_growth_percent", t.min_growth_percent)
            .with("protected_rs", t.protected_rs)
            .with(
                "trend_settings",
                json!({
                    "price_above_sma50": trend.price_above_sma50,
                    "price_above_sma200": trend.price_above_sma200,
                    "sma10_above_sma20": trend.sma10_above_sma20,
                    "sma20_above_sma50": trend.sma20_above_sma50,
                    "price_within_50pct_of_high": trend.price_within_50pct_of_high,
                }),
            );
        self.fetch.add_to_snapshot(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::fingerprint;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults_match_screener_settings() {
        let config = ScreenConfig::default();
        assert_eq!(config.thresholds.min_rs, 80.0);
        assert_eq!(config.thresholds.min_market_cap, 10_000_000.0);
        assert_eq!(config.thresholds.min_price, 0.20);
        assert_eq!(config.thresholds.max_price, 4.00);
        assert_eq!(config.thresholds.min_volume, 10_000.0);
        assert_eq!(config.thresholds.min_growth_percent, 20.0);
        assert_eq!(config.thresholds.protected_rs, 90.0);
        assert!(config.trend_settings.price_within_50pct_of_high);
        assert!(!config.trend_settings.price_above_sma200);
        assert_eq!(config.state_dir, PathBuf::from("json"));
        assert_eq!(config.ledger_path(), PathBuf::from("json/ledger.json"));
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"thresholds": {{"min_rs": 85}}, "fetch": {{"threads": 2}}, "state_dir": "/tmp/screen"}}"#
        )
        .unwrap();

        let config = ScreenConfig::load(file.path()).unwrap();
        assert_eq!(config.thresholds.min_rs, 85.0);
        assert_eq!(config.thresholds.max_price, 4.00);
        assert_eq!(config.fetch.threads, 2);
        assert_eq!(config.fetch.batch_size, 10);
        assert_eq!(config.state_dir, PathBuf::from("/tmp/screen"));
    }

    #[test]
    fn test_load_errors() {
        let missing = ScreenConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(missing, ConfigError::Read { .. }));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let parse = ScreenConfig::load(file.path()).unwrap_err();
        assert!(matches!(parse, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_validate_price_range() {
        let mut config = ScreenConfig::default();
        config.thresholds.min_price = 5.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("min_price"));
    }

    #[test]
    fn test_snapshot_excludes_state_dir_and_log_level() {
        let base = ScreenConfig::default();
        let mut moved = base.clone();
        moved.state_dir = PathBuf::from("elsewhere");
        moved.log_level = "debug".to_string();
        assert_eq!(fingerprint(&base.snapshot()), fingerprint(&moved.snapshot()));
        assert!(base.snapshot().get("state_dir").is_none());
    }

    #[test]
    fn test_snapshot_tracks_output_parameters() {
        let base = ScreenConfig::default();

        let mut threshold = base.clone();
        threshold.thresholds.min_rs = 81.0;
        assert_ne!(fingerprint(&base.snapshot()), fingerprint(&threshold.snapshot()));

        let mut trend = base.clone();
        trend.trend_settings.price_above_sma200 = true;
        assert_ne!(fingerprint(&base.snapshot()), fingerprint(&trend.snapshot()));

        let mut threads = base.clone();
        threads.fetch.threads += 1;
        assert_ne!(fingerprint(&base.snapshot()), fingerprint(&threads.snapshot()));
    }
}
