//! Causal backtest: replay the signal rule bar by bar on a long-only,
//! all-in single position.
//!
//! State machine per bar t, states `Flat` and `Long`:
//! 1. Long with armed levels (intrabar mode only): stop then take-profit.
//! 2. Long and the previous eligible signal was HOLD: exit at `close[t]`,
//!    unless bar t is itself BUY, in which case the position is kept.
//! 3. Flat and bar t is BUY: enter at `close[t]` with all cash.
//! 4. Record equity = cash + quantity * close[t].
//!
//! # Invariants
//! - Equity at bar t reads only bars <= t.
//! - One equity point per bar; warmup bars carry the initial cash.

pub mod accounting;
pub mod exits;

pub use accounting::EquityTracker;
pub use exits::{check_long, ProtectiveExits, ProtectiveHit};

use crate::domain::PriceSeries;
use crate::indicators::IndicatorFrame;
use crate::signal::{RiskLevels, Signal, SignalError, SignalRule};
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Backtest settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub initial_cash: f64,
    pub fee_rate: f64,
    pub protective_exits: ProtectiveExits,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_cash: 10_000.0,
            fee_rate: 0.001,
            protective_exits: ProtectiveExits::Disabled,
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), BacktestError> {
        if !(self.initial_cash.is_finite() && self.initial_cash > 0.0) {
            return Err(BacktestError::InvalidConfig(format!(
                "initial_cash must be positive, got {}",
                self.initial_cash
            )));
        }
        if !(0.0..1.0).contains(&self.fee_rate) {
            return Err(BacktestError::InvalidConfig(format!(
                "fee_rate must be in [0, 1), got {}",
                self.fee_rate
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum BacktestError {
    #[error("insufficient data: need at least {required} bars, have {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("invalid backtest config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Signal(#[from] SignalError),
}

/// Position state of the backtest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PositionState {
    Flat,
    Long {
        entry_index: usize,
        entry_price: f64,
        quantity: f64,
        entry_fee: f64,
        risk: Option<RiskLevels>,
    },
}

/// Equity at one bar's close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
}

/// Why a trade closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    SignalExit,
    StopLoss,
    TakeProfit,
    /// Still open at the last bar; marked to the last close, not closed.
    EndOfData,
}

/// One round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub entry_index: usize,
    pub exit_index: usize,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    pub fees: f64,
    pub pnl: f64,
    pub exit_reason: ExitReason,
}

impl TradeRecord {
    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn is_open(&self) -> bool {
        self.exit_reason == ExitReason::EndOfData
    }

    pub fn bars_held(&self) -> usize {
        self.exit_index - self.entry_index
    }
}

/// Everything one backtest produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<TradeRecord>,
    pub initial_cash: f64,
    pub final_equity: f64,
    pub fees_paid: f64,
    pub warmup_bars: usize,
}

impl BacktestReport {
    pub fn total_return(&self) -> f64 {
        self.final_equity / self.initial_cash - 1.0
    }

    pub fn closed_trades(&self) -> impl Iterator<Item = &TradeRecord> {
        self.trades.iter().filter(|t| !t.is_open())
    }
}

/// Run the backtest over the full series.
pub fn run_backtest(
    series: &PriceSeries,
    frame: &IndicatorFrame,
    rule: &SignalRule,
    config: &BacktestConfig,
) -> Result<BacktestReport, BacktestError> {
    config.validate()?;
    if series.len() < rule.warmup() {
        return Err(BacktestError::InsufficientData {
            required: rule.warmup(),
            available: series.len(),
        });
    }

    let decisions = rule.evaluate_all(series, frame)?;
    let bars = series.bars();
    let fee_rate = config.fee_rate;

    let mut tracker = EquityTracker::new(config.initial_cash);
    let mut state = PositionState::Flat;
    let mut prev_signal: Option<Signal> = None;
    let mut trades = Vec::new();
    let mut curve = Vec::with_capacity(bars.len());

    for (t, (bar, decision)) in bars.iter().zip(&decisions).enumerate() {
        let signal = decision.map(|d| d.signal);

        if let PositionState::Long {
            entry_index,
            entry_price,
            quantity,
            entry_fee,
            risk,
        } = state
        {
            let protective = match (config.protective_exits, risk) {
                (ProtectiveExits::Intrabar, Some(levels)) if t > entry_index => {
                    check_long(&levels, bar)
                }
                _ => None,
            };

            let exit = match protective {
                Some(ProtectiveHit::StopLoss { price }) => Some((price, ExitReason::StopLoss)),
                Some(ProtectiveHit::TakeProfit { price }) => Some((price, ExitReason::TakeProfit)),
                None if prev_signal == Some(Signal::Hold) && signal != Some(Signal::Buy) => {
                    Some((bar.close, ExitReason::SignalExit))
                }
                None => None,
            };

            if let Some((exit_price, reason)) = exit {
                let exit_fee = fee_rate * exit_price * quantity;
                tracker.apply_sell(exit_price, quantity, exit_fee);
                debug!("bar {t}: exit {quantity:.6} @ {exit_price:.2} ({reason:?})");
                trades.push(TradeRecord {
                    entry_index,
                    exit_index: t,
                    entry_time: bars[entry_index].timestamp,
                    exit_time: bar.timestamp,
                    entry_price,
                    exit_price,
                    quantity,
                    fees: entry_fee + exit_fee,
                    pnl: (exit_price - entry_price) * quantity - entry_fee - exit_fee,
                    exit_reason: reason,
                });
                state = PositionState::Flat;
            }
        }

        if let (PositionState::Flat, Some(d)) = (state, decision) {
            if d.signal == Signal::Buy {
                let quantity = tracker.cash() / (bar.close * (1.0 + fee_rate));
                let entry_fee = fee_rate * bar.close * quantity;
                tracker.apply_buy(bar.close, quantity, entry_fee);
                debug!("bar {t}: enter {quantity:.6} @ {:.2}", bar.close);
                state = PositionState::Long {
                    entry_index: t,
                    entry_price: bar.close,
                    quantity,
                    entry_fee,
                    risk: d.risk,
                };
            }
        }

        let held = match state {
            PositionState::Long { quantity, .. } => quantity,
            PositionState::Flat => 0.0,
        };
        let equity = tracker.compute_equity(held, bar.close);
        curve.push(EquityPoint {
            timestamp: bar.timestamp,
            equity,
        });

        if signal.is_some() {
            prev_signal = signal;
        }
    }

    if let (
        PositionState::Long {
            entry_index,
            entry_price,
            quantity,
            entry_fee,
            ..
        },
        Some(last),
    ) = (state, bars.last())
    {
        trades.push(TradeRecord {
            entry_index,
            exit_index: bars.len() - 1,
            entry_time: bars[entry_index].timestamp,
            exit_time: last.timestamp,
            entry_price,
            exit_price: last.close,
            quantity,
            fees: entry_fee,
            pnl: (last.close - entry_price) * quantity - entry_fee,
            exit_reason: ExitReason::EndOfData,
        });
    }

    let warmup_bars = decisions.iter().take_while(|d| d.is_none()).count();
    let final_equity = curve.last().map_or(config.initial_cash, |p| p.equity);

    Ok(BacktestReport {
        equity_curve: curve,
        trades,
        initial_cash: config.initial_cash,
        final_equity,
        fees_paid: tracker.fees_paid(),
        warmup_bars,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{make_bars, IndicatorEngine, IndicatorParams, IndicatorRow};
    use crate::signal::SignalParams;

    fn setup(closes: &[f64], windows: IndicatorParams) -> (PriceSeries, IndicatorFrame, SignalRule) {
        let series = PriceSeries::new("TEST", make_bars(closes)).unwrap();
        let frame = IndicatorEngine::new(windows).compute(&series);
        let rule = SignalRule::new(SignalParams::default(), windows);
        (series, frame, rule)
    }

    fn small_windows() -> IndicatorParams {
        IndicatorParams {
            ma_window: 3,
            rsi_window: 3,
            atr_window: 3,
        }
    }

    #[test]
    fn flat_market_never_trades() {
        let (series, frame, rule) = setup(&[100.0; 20], small_windows());
        let report = run_backtest(&series, &frame, &rule, &BacktestConfig::default()).unwrap();

        assert_eq!(report.equity_curve.len(), 20);
        assert!(report.trades.is_empty());
        assert_eq!(report.final_equity, 10_000.0);
        assert_eq!(report.fees_paid, 0.0);
        // RSI(3) needs three changes, so bar 3 is the first decision
        assert_eq!(report.warmup_bars, 3);
    }

    #[test]
    fn warmup_bars_carry_initial_cash() {
        let (series, frame, rule) = setup(&[100.0, 101.0, 99.0, 102.0, 98.0], small_windows());
        let report = run_backtest(&series, &frame, &rule, &BacktestConfig::default()).unwrap();
        assert_eq!(report.equity_curve[0].equity, 10_000.0);
        assert_eq!(report.equity_curve[1].equity, 10_000.0);
    }

    #[test]
    fn entry_then_exit_one_bar_after_hold() {
        // 100, 100, 100: flat, RSI 50. Bar 3 closes 99 (HOLD, below MA).
        // Bar 4 closes 101: MA 100, RSI = 2/3 gain vs 1/3 loss -> 66.7 -> HOLD.
        // Use a looser threshold so bar 4 is BUY.
        let windows = small_windows();
        let series = PriceSeries::new(
            "TEST",
            make_bars(&[100.0, 100.0, 100.0, 99.0, 101.0, 100.5, 98.0, 97.0]),
        )
        .unwrap();
        let frame = IndicatorEngine::new(windows).compute(&series);
        let rule = SignalRule::new(
            SignalParams {
                rsi_threshold: 70.0,
                ..SignalParams::default()
            },
            windows,
        );
        let report = run_backtest(&series, &frame, &rule, &BacktestConfig::default()).unwrap();

        let signals: Vec<Option<Signal>> = rule
            .evaluate_all(&series, &frame)
            .unwrap()
            .iter()
            .map(|d| d.map(|d| d.signal))
            .collect();
        let entry = signals
            .iter()
            .position(|s| *s == Some(Signal::Buy))
            .expect("a BUY bar");
        let first_hold_after = signals[entry..]
            .iter()
            .position(|s| *s == Some(Signal::Hold))
            .map(|i| i + entry)
            .expect("a HOLD after the entry");

        let trade = &report.trades[0];
        assert_eq!(trade.entry_index, entry);
        assert_eq!(trade.exit_index, first_hold_after + 1);
        assert_eq!(trade.exit_reason, ExitReason::SignalExit);
    }

    /// Rows that make the rule say BUY (RSI 40) or HOLD (RSI 80) on any
    /// close above 50.
    fn scripted(closes: &[f64], buys: &[bool]) -> (PriceSeries, IndicatorFrame, SignalRule) {
        let series = PriceSeries::new("TEST", make_bars(closes)).unwrap();
        let rows: Vec<IndicatorRow> = buys
            .iter()
            .map(|&buy| IndicatorRow {
                ma: Some(50.0),
                rsi: Some(if buy { 40.0 } else { 80.0 }),
                atr: Some(1.0),
            })
            .collect();
        let rule = SignalRule::new(SignalParams::default(), small_windows());
        (series, IndicatorFrame::from(rows), rule)
    }

    #[test]
    fn buy_after_hold_keeps_the_position() {
        let (series, frame, rule) = scripted(
            &[100.0, 102.0, 104.0, 103.0, 105.0, 108.0],
            &[true, false, true, true, false, false],
        );
        let report = run_backtest(&series, &frame, &rule, &BacktestConfig::default()).unwrap();

        // Bar 2 follows a HOLD but is itself BUY, so the exit waits for bar 5
        assert_eq!(report.trades.len(), 1);
        let trade = &report.trades[0];
        assert_eq!(trade.entry_index, 0);
        assert_eq!(trade.exit_index, 5);
        assert_eq!(trade.exit_price, 108.0);
        assert_eq!(trade.exit_reason, ExitReason::SignalExit);
    }

    #[test]
    fn hold_then_hold_exits_at_second_close() {
        let (series, frame, rule) = scripted(
            &[100.0, 102.0, 104.0, 103.0],
            &[true, false, false, false],
        );
        let report = run_backtest(&series, &frame, &rule, &BacktestConfig::default()).unwrap();

        let trade = &report.trades[0];
        assert_eq!(trade.exit_index, 2);
        assert_eq!(trade.exit_price, 104.0);
    }

    #[test]
    fn closed_trade_pays_entry_and_exit_fees() {
        let (series, frame, rule) = scripted(
            &[100.0, 102.0, 104.0, 103.0, 105.0, 108.0],
            &[true, false, false, false, false, false],
        );
        let config = BacktestConfig::default();
        let report = run_backtest(&series, &frame, &rule, &config).unwrap();

        let trade = &report.trades[0];
        assert_eq!(trade.exit_reason, ExitReason::SignalExit);
        let entry_fee = config.fee_rate * trade.entry_price * trade.quantity;
        let exit_fee = config.fee_rate * trade.exit_price * trade.quantity;
        assert!(exit_fee > 0.0);
        assert!((trade.fees - (entry_fee + exit_fee)).abs() < 1e-9);
        assert!((report.fees_paid - trade.fees).abs() < 1e-9);

        let gross = (trade.exit_price - trade.entry_price) * trade.quantity;
        assert!((trade.pnl - (gross - entry_fee - exit_fee)).abs() < 1e-9);
        assert!((report.final_equity - (config.initial_cash + trade.pnl)).abs() < 1e-6);
    }

    #[test]
    fn all_in_entry_uses_fee_adjusted_quantity() {
        let (series, frame, rule) = setup(
            &[100.0, 100.0, 100.0, 99.0, 101.0, 102.0, 103.0, 104.0],
            small_windows(),
        );
        let rule = SignalRule::new(
            SignalParams {
                rsi_threshold: 101.0,
                ..*rule.params()
            },
            small_windows(),
        );
        let report = run_backtest(&series, &frame, &rule, &BacktestConfig::default()).unwrap();

        let trade = &report.trades[0];
        let expected_qty = 10_000.0 / (trade.entry_price * 1.001);
        assert!((trade.quantity - expected_qty).abs() < 1e-9);
        // Buying everything leaves no cash: equity at entry is qty * close
        let at_entry = report.equity_curve[trade.entry_index].equity;
        assert!((at_entry - expected_qty * trade.entry_price).abs() < 1e-6);
    }

    #[test]
    fn open_position_is_reported_at_end() {
        let closes: Vec<f64> = (0..12).map(|i| 100.0 + i as f64).collect();
        let (series, frame, _) = setup(&closes, small_windows());
        let rule = SignalRule::new(
            SignalParams {
                rsi_threshold: 101.0,
                ..SignalParams::default()
            },
            small_windows(),
        );
        let report = run_backtest(&series, &frame, &rule, &BacktestConfig::default()).unwrap();

        assert_eq!(report.trades.len(), 1);
        let trade = &report.trades[0];
        assert!(trade.is_open());
        assert_eq!(trade.exit_index, 11);
        assert!((report.final_equity - (10_000.0 + trade.pnl)).abs() < 1e-6);
    }

    #[test]
    fn intrabar_stop_closes_position() {
        let windows = small_windows();
        let mut bars = make_bars(&[100.0, 101.0, 102.0, 103.0, 104.0, 105.0]);
        // Crash bar: opens at 104, trades down to 80
        bars[5] = crate::domain::PriceBar::new(bars[5].timestamp, 104.0, 104.5, 80.0, 82.0);
        let series = PriceSeries::new("TEST", bars).unwrap();
        let frame = IndicatorEngine::new(windows).compute(&series);
        let rule = SignalRule::new(
            SignalParams {
                rsi_threshold: 101.0,
                ..SignalParams::default()
            },
            windows,
        );
        let config = BacktestConfig {
            protective_exits: ProtectiveExits::Intrabar,
            ..BacktestConfig::default()
        };
        let report = run_backtest(&series, &frame, &rule, &config).unwrap();

        let stop = report
            .trades
            .iter()
            .find(|t| t.exit_reason == ExitReason::StopLoss)
            .expect("stop-loss exit");
        assert_eq!(stop.exit_index, 5);
        assert!(stop.exit_price < stop.entry_price);
    }

    #[test]
    fn rejects_short_series() {
        let (series, frame, _) = setup(&[100.0; 10], small_windows());
        let rule = SignalRule::new(SignalParams::default(), IndicatorParams::default());
        let err = run_backtest(&series, &frame, &rule, &BacktestConfig::default()).unwrap_err();
        assert_eq!(
            err,
            BacktestError::InsufficientData {
                required: 50,
                available: 10
            }
        );
    }

    #[test]
    fn rejects_invalid_config() {
        let (series, frame, rule) = setup(&[100.0; 10], small_windows());
        for config in [
            BacktestConfig {
                initial_cash: 0.0,
                ..BacktestConfig::default()
            },
            BacktestConfig {
                fee_rate: 1.0,
                ..BacktestConfig::default()
            },
            BacktestConfig {
                fee_rate: -0.1,
                ..BacktestConfig::default()
            },
        ] {
            assert!(matches!(
                run_backtest(&series, &frame, &rule, &config),
                Err(BacktestError::InvalidConfig(_))
            ));
        }
    }
}
