//! Performance metrics: pure functions that compute backtest statistics.
//!
//! Every metric is a pure function: equity values and/or trade list in, scalar out.
//! Trade statistics only count closed trades; a position still open at the
//! last bar shows up in the equity-based metrics instead.

use aramplus_core::backtest::{EquityPoint, TradeRecord};
use serde::{Deserialize, Serialize};

/// Bars per year for annualization. Daily bars on a market that trades every
/// calendar day.
pub const PERIODS_PER_YEAR: f64 = 365.0;

/// Aggregate performance metrics for one backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub cagr: f64,
    pub sharpe: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub trade_count: usize,
    pub open_trades: usize,
    pub fees_paid: f64,
    pub final_equity: f64,
}

impl PerformanceMetrics {
    /// Compute all metrics from an equity curve and trade list.
    pub fn compute(curve: &[EquityPoint], trades: &[TradeRecord], initial_cash: f64) -> Self {
        let equity: Vec<f64> = curve.iter().map(|p| p.equity).collect();
        let closed: Vec<&TradeRecord> = trades.iter().filter(|t| !t.is_open()).collect();

        Self {
            total_return: total_return(&equity, initial_cash),
            cagr: cagr(&equity, initial_cash),
            sharpe: sharpe_ratio(&equity),
            max_drawdown: max_drawdown(&equity),
            win_rate: win_rate(&closed),
            profit_factor: profit_factor(&closed),
            trade_count: closed.len(),
            open_trades: trades.len() - closed.len(),
            fees_paid: trades.iter().map(|t| t.fees).sum(),
            final_equity: equity.last().copied().unwrap_or(initial_cash),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(equity: &[f64], initial_cash: f64) -> f64 {
    match equity.last() {
        Some(&final_eq) if initial_cash > 0.0 => (final_eq - initial_cash) / initial_cash,
        _ => 0.0,
    }
}

/// Compound annual growth rate over the length of the curve.
///
/// Returns 0.0 for fewer than 2 bars or non-positive equity.
pub fn cagr(equity: &[f64], initial_cash: f64) -> f64 {
    let Some(&final_eq) = equity.last() else {
        return 0.0;
    };
    if equity.len() < 2 || initial_cash <= 0.0 || final_eq <= 0.0 {
        return 0.0;
    }
    let years = equity.len() as f64 / PERIODS_PER_YEAR;
    (final_eq / initial_cash).powf(1.0 / years) - 1.0
}

/// Annualized Sharpe ratio of per-bar returns, zero risk-free rate.
///
/// Returns 0.0 if variance is zero or fewer than 2 returns.
pub fn sharpe_ratio(equity: &[f64]) -> f64 {
    let returns = bar_returns(equity);
    if returns.len() < 2 {
        return 0.0;
    }
    let std = std_dev(&returns);
    if std < 1e-15 {
        return 0.0;
    }
    mean_f64(&returns) / std * PERIODS_PER_YEAR.sqrt()
}

/// Maximum drawdown as a negative fraction (e.g., -0.15 = 15% drawdown).
///
/// Returns 0.0 if equity is constant or monotonically increasing.
pub fn max_drawdown(equity: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut max_dd = 0.0_f64;

    for &eq in equity {
        peak = peak.max(eq);
        if peak > 0.0 {
            max_dd = max_dd.min((eq - peak) / peak);
        }
    }
    max_dd
}

/// Win rate: fraction of closed trades with positive P&L.
pub fn win_rate(trades: &[&TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64
}

/// Profit factor: gross profits / gross losses.
///
/// Capped at 100.0 for edge cases (all winners, zero losses).
pub fn profit_factor(trades: &[&TradeRecord]) -> f64 {
    let gross_profit: f64 = trades.iter().map(|t| t.pnl.max(0.0)).sum();
    let gross_loss: f64 = trades.iter().map(|t| (-t.pnl).max(0.0)).sum();

    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { 100.0 } else { 0.0 };
    }
    (gross_profit / gross_loss).min(100.0)
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Per-bar simple returns of an equity series.
pub fn bar_returns(equity: &[f64]) -> Vec<f64> {
    equity
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}
