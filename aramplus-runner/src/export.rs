//! Export: JSON and CSV artifacts for a run.
//!
//! - **JSON**: full round-trip serialization of [`RunResult`] with schema versioning
//! - **CSV**: trade tape and equity curve for external analysis tools
//!
//! Persisted JSON carries a `schema_version` field. Newer versions are
//! rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use aramplus_core::backtest::{EquityPoint, ExitReason, TradeRecord};

use crate::config::OutputConfig;
use crate::runner::{RunResult, SCHEMA_VERSION};

pub const EQUITY_CSV: &str = "equity.csv";
pub const TRADES_CSV: &str = "trades.csv";

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `RunResult` to pretty JSON.
pub fn export_json(result: &RunResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize RunResult to JSON")
}

/// Deserialize a `RunResult` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<RunResult> {
    let result: RunResult =
        serde_json::from_str(json).context("failed to deserialize RunResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

fn exit_reason_label(reason: ExitReason) -> &'static str {
    match reason {
        ExitReason::SignalExit => "signal",
        ExitReason::StopLoss => "stop_loss",
        ExitReason::TakeProfit => "take_profit",
        ExitReason::EndOfData => "open",
    }
}

/// Export a trade list as CSV.
///
/// Columns: entry_bar, entry_date, entry_price, exit_bar, exit_date,
/// exit_price, quantity, fees, pnl, bars_held, exit_reason
pub fn export_trades_csv(trades: &[TradeRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "entry_bar",
        "entry_date",
        "entry_price",
        "exit_bar",
        "exit_date",
        "exit_price",
        "quantity",
        "fees",
        "pnl",
        "bars_held",
        "exit_reason",
    ])?;

    for t in trades {
        wtr.write_record([
            &t.entry_index.to_string(),
            &t.entry_time.date_naive().to_string(),
            &format!("{:.2}", t.entry_price),
            &t.exit_index.to_string(),
            &t.exit_time.date_naive().to_string(),
            &format!("{:.2}", t.exit_price),
            &format!("{:.8}", t.quantity),
            &format!("{:.2}", t.fees),
            &format!("{:.2}", t.pnl),
            &t.bars_held().to_string(),
            exit_reason_label(t.exit_reason),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export an equity curve as CSV with bar_index, date and equity columns.
pub fn export_equity_csv(equity_curve: &[EquityPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["bar_index", "date", "equity"])?;
    for (i, point) in equity_curve.iter().enumerate() {
        wtr.write_record([
            &i.to_string(),
            &point.timestamp.date_naive().to_string(),
            &format!("{:.2}", point.equity),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact files ─────────────────────────────────────────────────

/// Write the CSV exports enabled in `[output]`.
///
/// Returns the paths written. Runs without a backtest write nothing.
pub fn save_exports(result: &RunResult, output: &OutputConfig) -> Result<Vec<PathBuf>> {
    let Some(report) = &result.backtest else {
        return Ok(Vec::new());
    };
    let mut written = Vec::new();

    if output.export_equity_csv {
        let path = output.dir.join(EQUITY_CSV);
        write_file(&path, &export_equity_csv(&report.equity_curve)?)?;
        written.push(path);
    }
    if output.export_trades_csv {
        let path = output.dir.join(TRADES_CSV);
        write_file(&path, &export_trades_csv(&report.trades)?)?;
        written.push(path);
    }
    Ok(written)
}

/// Save the full `RunResult` as JSON at `path`.
pub fn save_result(result: &RunResult, path: &Path) -> Result<()> {
    write_file(path, &export_json(result)?)
}

/// Load a `RunResult` saved by [`save_result`].
pub fn load_result(path: &Path) -> Result<RunResult> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}
