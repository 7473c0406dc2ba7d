//! Run configuration, read once per run from TOML.
//!
//! Every section and key is optional; missing values default to a daily
//! BTC-USD job (1y of 1d bars, MA 50, RSI 14 < 60, ATR 14, 10 000 initial
//! cash, 0.1% fees).
//!
//! ```toml
//! [market]
//! symbol = "BTC-USD"
//! source = "yahoo"        # yahoo | csv | synthetic
//!
//! [indicators]
//! ma_window = 50
//!
//! [signal]
//! rsi_threshold = 60.0
//!
//! [backtest]
//! protective_exits = "intrabar"
//! ```

use aramplus_core::backtest::{BacktestConfig, ProtectiveExits};
use aramplus_core::data::synthetic::{range_days, MAX_RANGE_DAYS};
use aramplus_core::data::{FetchRequest, MissingBarPolicy};
use aramplus_core::indicators::IndicatorParams;
use aramplus_core::signal::SignalParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Which provider supplies the price history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    #[default]
    Yahoo,
    Csv,
    Synthetic,
}

impl std::str::FromStr for SourceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "yahoo" => Ok(SourceKind::Yahoo),
            "csv" => Ok(SourceKind::Csv),
            "synthetic" => Ok(SourceKind::Synthetic),
            other => Err(ConfigError::Invalid(format!(
                "unknown source '{other}' (expected yahoo, csv or synthetic)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub symbol: String,
    pub range: String,
    pub interval: String,
    pub source: SourceKind,
    pub csv_path: Option<PathBuf>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub missing_bars: MissingBarPolicy,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            symbol: "BTC-USD".into(),
            range: "1y".into(),
            interval: "1d".into(),
            source: SourceKind::Yahoo,
            csv_path: None,
            timeout_secs: 30,
            max_retries: 3,
            missing_bars: MissingBarPolicy::Drop,
        }
    }
}

impl MarketConfig {
    pub fn fetch_request(&self) -> FetchRequest {
        FetchRequest::new(&self.symbol)
            .with_range(&self.range)
            .with_interval(&self.interval)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSection {
    pub enabled: bool,
    pub initial_cash: f64,
    pub fee_rate: f64,
    pub protective_exits: ProtectiveExits,
}

impl Default for BacktestSection {
    fn default() -> Self {
        let core = BacktestConfig::default();
        Self {
            enabled: true,
            initial_cash: core.initial_cash,
            fee_rate: core.fee_rate,
            protective_exits: core.protective_exits,
        }
    }
}

impl BacktestSection {
    pub fn to_core(&self) -> BacktestConfig {
        BacktestConfig {
            initial_cash: self.initial_cash,
            fee_rate: self.fee_rate,
            protective_exits: self.protective_exits,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub export_equity_csv: bool,
    pub export_trades_csv: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            export_equity_csv: false,
            export_trades_csv: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrokerMode {
    #[default]
    Disabled,
    DryRun,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub mode: BrokerMode,
    /// Quote-currency balance used to size the order.
    pub balance: f64,
    /// Quantity is floored to a multiple of this (0 disables rounding).
    pub quantity_step: f64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            mode: BrokerMode::Disabled,
            balance: 1_000.0,
            quantity_step: 0.0001,
        }
    }
}

/// Complete configuration of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub market: MarketConfig,
    pub indicators: IndicatorParams,
    pub signal: SignalParams,
    pub backtest: BacktestSection,
    pub output: OutputConfig,
    pub broker: BrokerConfig,
}

impl RunConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Deterministic BLAKE3 hash of the configuration.
    ///
    /// Two runs with identical configs share the same id.
    pub fn config_hash(&self) -> Result<String, ConfigError> {
        let json =
            serde_json::to_string(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.market.symbol.trim().is_empty() {
            return invalid("market.symbol must not be empty".into());
        }
        if self.market.source == SourceKind::Csv && self.market.csv_path.is_none() {
            return invalid("market.csv_path is required when source = \"csv\"".into());
        }
        if self.market.timeout_secs == 0 {
            return invalid("market.timeout_secs must be at least 1".into());
        }
        if self.market.source == SourceKind::Synthetic && range_days(&self.market.range).is_none() {
            return invalid(format!(
                "market.range '{}' is not a synthetic range (1d to {MAX_RANGE_DAYS}d)",
                self.market.range
            ));
        }

        let w = &self.indicators;
        for (name, value) in [
            ("ma_window", w.ma_window),
            ("rsi_window", w.rsi_window),
            ("atr_window", w.atr_window),
        ] {
            if value == 0 {
                return invalid(format!("indicators.{name} must be at least 1"));
            }
        }

        let s = &self.signal;
        if !(s.rsi_threshold > 0.0 && s.rsi_threshold <= 100.0) {
            return invalid(format!(
                "signal.rsi_threshold must be in (0, 100], got {}",
                s.rsi_threshold
            ));
        }
        if !(s.sl_mult > 0.0) || !(s.tp_mult > 0.0) {
            return invalid(format!(
                "signal.sl_mult and signal.tp_mult must be positive, got {} and {}",
                s.sl_mult, s.tp_mult
            ));
        }

        self.backtest
            .to_core()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if !(self.broker.balance >= 0.0) || !(self.broker.quantity_step >= 0.0) {
            return invalid("broker.balance and broker.quantity_step must be >= 0".into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_defaults() {
        let config = RunConfig::from_toml("").unwrap();
        assert_eq!(config, RunConfig::default());
        assert_eq!(config.market.symbol, "BTC-USD");
        assert_eq!(config.indicators.ma_window, 50);
        assert_eq!(config.signal.rsi_threshold, 60.0);
        assert_eq!(config.backtest.initial_cash, 10_000.0);
        assert_eq!(config.backtest.fee_rate, 0.001);
        assert!(config.backtest.enabled);
        assert_eq!(config.broker.mode, BrokerMode::Disabled);
        config.validate().unwrap();
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = RunConfig::from_toml(
            r#"
            [market]
            symbol = "ETH-USD"
            source = "synthetic"
            missing_bars = "forward_fill"

            [indicators]
            ma_window = 20

            [backtest]
            protective_exits = "intrabar"

            [broker]
            mode = "dry_run"
            "#,
        )
        .unwrap();

        assert_eq!(config.market.symbol, "ETH-USD");
        assert_eq!(config.market.range, "1y");
        assert_eq!(config.market.source, SourceKind::Synthetic);
        assert_eq!(config.market.missing_bars, MissingBarPolicy::ForwardFill);
        assert_eq!(config.indicators.ma_window, 20);
        assert_eq!(config.indicators.rsi_window, 14);
        assert_eq!(config.backtest.protective_exits, ProtectiveExits::Intrabar);
        assert_eq!(config.broker.mode, BrokerMode::DryRun);
    }

    #[test]
    fn toml_round_trip() {
        let mut config = RunConfig::default();
        config.market.csv_path = Some(PathBuf::from("data/btc.csv"));
        let text = config.to_toml().unwrap();
        assert_eq!(RunConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn unknown_source_is_parse_error() {
        let err = RunConfig::from_toml("[market]\nsource = \"bloomberg\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let cases: Vec<fn(&mut RunConfig)> = vec![
            |c| c.indicators.rsi_window = 0,
            |c| c.signal.sl_mult = 0.0,
            |c| c.signal.rsi_threshold = 150.0,
            |c| c.backtest.initial_cash = -1.0,
            |c| c.backtest.fee_rate = 1.5,
            |c| c.market.source = SourceKind::Csv,
            |c| c.market.symbol = " ".into(),
            |c| c.broker.balance = -5.0,
            |c| {
                c.market.source = SourceKind::Synthetic;
                c.market.range = "99999999999y".into();
            },
        ];
        for mutate in cases {
            let mut config = RunConfig::default();
            mutate(&mut config);
            assert!(
                matches!(config.validate(), Err(ConfigError::Invalid(_))),
                "accepted {config:?}"
            );
        }
    }

    #[test]
    fn config_hash_is_deterministic() {
        let a = RunConfig::default();
        let mut b = RunConfig::default();
        assert_eq!(a.config_hash().unwrap(), b.config_hash().unwrap());
        b.signal.rsi_threshold = 55.0;
        assert_ne!(a.config_hash().unwrap(), b.config_hash().unwrap());
    }

    #[test]
    fn source_from_str() {
        assert_eq!("CSV".parse::<SourceKind>().unwrap(), SourceKind::Csv);
        assert!("nope".parse::<SourceKind>().is_err());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = RunConfig::from_file(Path::new("/no/such/aramplus.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
