//! Price history loading for the runner.
//!
//! One provider call per run, then canonicalization into a validated
//! [`PriceSeries`]. Every consumer of the run (indicators, signal, backtest,
//! output) reads this single series, so OHLC always comes from one source.
//!
//! Synthetic data is a developer-only mode. Results produced on synthetic
//! data are tagged in the run result and summary.

use crate::config::{MarketConfig, SourceKind};
use aramplus_core::data::{
    canonicalize, CanonicalReport, CsvProvider, DataError, DataProvider, DataSource,
    SyntheticProvider, YahooProvider, YahooSettings,
};
use aramplus_core::domain::PriceSeries;
use log::{info, warn};
use std::time::Duration;

/// Result of loading the series, including data source provenance.
#[derive(Debug, Clone)]
pub struct LoadedSeries {
    pub series: PriceSeries,
    pub source: DataSource,
    pub report: CanonicalReport,
    /// Dataset hash for fingerprinting (BLAKE3 over all bar data).
    pub dataset_hash: String,
}

impl LoadedSeries {
    pub fn is_synthetic(&self) -> bool {
        self.source == DataSource::Synthetic
    }
}

/// Build the provider named by `[market] source`.
pub fn build_provider(market: &MarketConfig) -> Result<Box<dyn DataProvider>, DataError> {
    match market.source {
        SourceKind::Yahoo => {
            let settings = YahooSettings {
                timeout: Duration::from_secs(market.timeout_secs),
                max_retries: market.max_retries,
                ..YahooSettings::default()
            };
            Ok(Box::new(YahooProvider::new(settings)?))
        }
        SourceKind::Csv => {
            let path = market.csv_path.as_ref().ok_or_else(|| {
                DataError::Other("market.csv_path is required for the csv source".into())
            })?;
            Ok(Box::new(CsvProvider::new(path)))
        }
        SourceKind::Synthetic => Ok(Box::new(SyntheticProvider::new())),
    }
}

/// Fetch once and canonicalize.
pub fn load_series(
    market: &MarketConfig,
    provider: &dyn DataProvider,
) -> Result<LoadedSeries, DataError> {
    let request = market.fetch_request();
    let fetched = provider.fetch(&request)?;
    let source = fetched.source;

    let (series, report) = canonicalize(&request.symbol, fetched.bars, market.missing_bars)?;
    let dataset_hash = compute_dataset_hash(&series);

    if source == DataSource::Synthetic {
        warn!("{} is synthetic: results are tagged and not market data", request.symbol);
    }
    info!(
        "loaded {} bars for {} from {} ({} .. {})",
        series.len(),
        series.symbol(),
        provider.name(),
        series.first().map(|b| b.timestamp.to_rfc3339()).unwrap_or_default(),
        series.last().map(|b| b.timestamp.to_rfc3339()).unwrap_or_default(),
    );

    Ok(LoadedSeries {
        series,
        source,
        report,
        dataset_hash,
    })
}

/// Compute a deterministic BLAKE3 hash over all bar data.
///
/// The hash covers the symbol, timestamps and all OHLC values in order.
pub fn compute_dataset_hash(series: &PriceSeries) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(series.symbol().as_bytes());
    for bar in series.bars() {
        hasher.update(&bar.timestamp.timestamp().to_le_bytes());
        hasher.update(&bar.open.to_le_bytes());
        hasher.update(&bar.high.to_le_bytes());
        hasher.update(&bar.low.to_le_bytes());
        hasher.update(&bar.close.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}
