//! AramPlus Runner: configuration, data loading, run orchestration, outputs.
//!
//! This crate builds on `aramplus-core` to provide:
//! - TOML run configuration with defaults for the daily BTC-USD job
//! - Single-fetch data loading with dataset hashing
//! - The signal run: decision, backtest, metrics, flat-file outputs, broker intent
//! - Performance metrics and CSV/JSON export

pub mod config;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod output;
pub mod runner;

pub use config::{
    BacktestSection, BrokerConfig, BrokerMode, ConfigError, MarketConfig, OutputConfig, RunConfig,
    SourceKind,
};
pub use data_loader::{build_provider, load_series, LoadedSeries};
pub use metrics::PerformanceMetrics;
pub use output::{write_outputs, OutputError, SignalFiles};
pub use runner::{run_report, run_signal, BrokerOutcome, RunError, RunResult, RunSummary};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn performance_metrics_is_send_sync() {
        assert_send::<PerformanceMetrics>();
        assert_sync::<PerformanceMetrics>();
    }

    #[test]
    fn run_result_is_send_sync() {
        assert_send::<RunResult>();
        assert_sync::<RunResult>();
    }

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<RunConfig>();
        assert_sync::<RunConfig>();
        assert_send::<LoadedSeries>();
        assert_sync::<LoadedSeries>();
    }
}
