//! Run orchestration: wires data loading, indicators, signal, backtest and outputs.
//!
//! Two entry points:
//! - `run_signal()`: the daily job. Computes the latest decision, backtests
//!   the full history, writes the output files, then dispatches the optional
//!   order intent. Used by `aramplus run`.
//! - `run_report()`: same computation with no files written and no broker
//!   contact. Used by `aramplus backtest`.
//!
//! Nothing is written when loading or signal computation fails. Broker
//! failures never fail the run; they are logged and recorded in the result.

use std::path::PathBuf;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use aramplus_core::backtest::{run_backtest, BacktestError, BacktestReport};
use aramplus_core::broker::{ExecutionReport, OrderExecutor, TradeIntent};
use aramplus_core::data::{CanonicalReport, DataError, DataProvider, DataSource};
use aramplus_core::domain::PriceBar;
use aramplus_core::indicators::{IndicatorEngine, IndicatorParams};
use aramplus_core::signal::{SignalDecision, SignalError, SignalParams, SignalRule};

use crate::config::{BrokerMode, ConfigError, RunConfig};
use crate::data_loader::load_series;
use crate::metrics::PerformanceMetrics;
use crate::output::{write_outputs, OutputError};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] DataError),
    #[error("signal undetermined: {0}")]
    Signal(#[from] SignalError),
    #[error("backtest error: {0}")]
    Backtest(#[from] BacktestError),
    #[error("output error: {0}")]
    Output(#[from] OutputError),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// What happened to the order intent of this run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BrokerOutcome {
    /// Broker integration disabled in config, or not requested.
    Disabled,
    /// Decision produced no intent (HOLD or zero quantity).
    NoIntent,
    Submitted { report: ExecutionReport },
    Failed { intent: TradeIntent, error: String },
}

/// Complete result of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub symbol: String,
    pub source: DataSource,
    pub is_synthetic: bool,
    pub dataset_hash: String,
    pub config_hash: String,
    pub bar_count: usize,
    pub start_date: String,
    pub end_date: String,
    pub indicators: IndicatorParams,
    pub signal_params: SignalParams,
    pub data_report: CanonicalReport,
    pub decision: SignalDecision,
    pub backtest: Option<BacktestReport>,
    pub metrics: Option<PerformanceMetrics>,
    pub broker: BrokerOutcome,
    #[serde(default)]
    pub outputs: Vec<PathBuf>,
}

/// Default schema version for serde deserialization of older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// The part of a run persisted as `summary.json`.
///
/// Everything in [`RunResult`] except the equity curve and trade tape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub schema_version: u32,
    pub symbol: String,
    pub source: DataSource,
    pub is_synthetic: bool,
    pub dataset_hash: String,
    pub config_hash: String,
    pub bar_count: usize,
    pub start_date: String,
    pub end_date: String,
    pub indicators: IndicatorParams,
    pub signal_params: SignalParams,
    pub data_report: CanonicalReport,
    pub decision: SignalDecision,
    pub metrics: Option<PerformanceMetrics>,
}

impl RunResult {
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            schema_version: self.schema_version,
            symbol: self.symbol.clone(),
            source: self.source,
            is_synthetic: self.is_synthetic,
            dataset_hash: self.dataset_hash.clone(),
            config_hash: self.config_hash.clone(),
            bar_count: self.bar_count,
            start_date: self.start_date.clone(),
            end_date: self.end_date.clone(),
            indicators: self.indicators,
            signal_params: self.signal_params,
            data_report: self.data_report.clone(),
            decision: self.decision,
            metrics: self.metrics.clone(),
        }
    }
}

/// Run the daily job: compute, persist, then dispatch.
///
/// `executor` is consulted only when `[broker] mode` is not disabled.
pub fn run_signal(
    config: &RunConfig,
    provider: &dyn DataProvider,
    executor: Option<&dyn OrderExecutor>,
) -> Result<RunResult, RunError> {
    let mut result = run_report(config, provider)?;

    let summary = result.summary();
    result.outputs = write_outputs(&config.output.dir, &result.decision, &summary)?;

    result.broker = match (config.broker.mode, executor) {
        (BrokerMode::Disabled, _) | (_, None) => BrokerOutcome::Disabled,
        (BrokerMode::DryRun, Some(executor)) => dispatch(config, &result.decision, executor),
    };
    Ok(result)
}

/// Compute decision, backtest and metrics without side effects.
pub fn run_report(config: &RunConfig, provider: &dyn DataProvider) -> Result<RunResult, RunError> {
    config.validate()?;
    let config_hash = config.config_hash()?;

    let loaded = load_series(&config.market, provider)?;
    let series = &loaded.series;

    let frame = IndicatorEngine::new(config.indicators).compute(series);
    let rule = SignalRule::new(config.signal, config.indicators);
    let decision = rule.latest(series, &frame)?;
    info!(
        "{} {} close {:.2}: {} (MA {:?}, RSI {:?}, ATR {:?})",
        series.symbol(),
        decision.timestamp.date_naive(),
        decision.close,
        decision.signal,
        decision.row.ma,
        decision.row.rsi,
        decision.row.atr,
    );

    let (backtest, metrics) = if config.backtest.enabled {
        let report = run_backtest(series, &frame, &rule, &config.backtest.to_core())?;
        let metrics =
            PerformanceMetrics::compute(&report.equity_curve, &report.trades, report.initial_cash);
        info!(
            "backtest: {} trades, return {:.2}%, max drawdown {:.2}%",
            metrics.trade_count,
            metrics.total_return * 100.0,
            metrics.max_drawdown * 100.0
        );
        (Some(report), Some(metrics))
    } else {
        (None, None)
    };

    let date = |bar: Option<&PriceBar>| {
        bar.map(|b| b.timestamp.date_naive().to_string())
            .unwrap_or_default()
    };

    Ok(RunResult {
        schema_version: SCHEMA_VERSION,
        symbol: series.symbol().to_string(),
        source: loaded.source,
        is_synthetic: loaded.is_synthetic(),
        dataset_hash: loaded.dataset_hash.clone(),
        config_hash,
        bar_count: series.len(),
        start_date: date(series.first()),
        end_date: date(series.last()),
        indicators: config.indicators,
        signal_params: config.signal,
        data_report: loaded.report.clone(),
        decision,
        backtest,
        metrics,
        broker: BrokerOutcome::Disabled,
        outputs: Vec::new(),
    })
}

fn dispatch(
    config: &RunConfig,
    decision: &SignalDecision,
    executor: &dyn OrderExecutor,
) -> BrokerOutcome {
    let Some(intent) = TradeIntent::for_decision(
        &config.market.symbol,
        decision,
        config.broker.balance,
        config.broker.quantity_step,
    ) else {
        info!("no order intent for {}", decision.signal);
        return BrokerOutcome::NoIntent;
    };

    match executor.submit(&intent) {
        Ok(report) => {
            info!(
                "{} accepted order {} ({:?})",
                executor.name(),
                report.order_id,
                report.status
            );
            BrokerOutcome::Submitted { report }
        }
        Err(e) => {
            warn!("{} failed to place order: {e}", executor.name());
            BrokerOutcome::Failed {
                intent,
                error: e.to_string(),
            }
        }
    }
}
