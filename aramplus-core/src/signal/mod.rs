//! Signal rule: BUY/HOLD from one bar and its indicator row.
//!
//! BUY iff `close > ma && rsi < rsi_threshold`, otherwise HOLD. When the
//! signal is BUY and ATR is defined the decision carries stop-loss and
//! take-profit levels: `close - sl_mult * atr` and `close + tp_mult * atr`.
//!
//! # Invariants
//! - Evaluation reads only the bar and the row it is given; it never touches
//!   portfolio state.
//! - A bar whose MA or RSI is undefined has no decision. Insufficient history
//!   is reported as an error, never as a default HOLD.

use crate::domain::{PriceBar, PriceSeries};
use crate::indicators::{IndicatorFrame, IndicatorParams, IndicatorRow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Trading signal for one bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Hold,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Buy => "BUY",
            Signal::Hold => "HOLD",
        }
    }

    pub fn is_buy(&self) -> bool {
        matches!(self, Signal::Buy)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Protective exit levels for a BUY decision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskLevels {
    pub stop_loss: f64,
    pub take_profit: f64,
}

impl RiskLevels {
    pub fn from_atr(close: f64, atr: f64, sl_mult: f64, tp_mult: f64) -> Self {
        Self {
            stop_loss: close - sl_mult * atr,
            take_profit: close + tp_mult * atr,
        }
    }

    /// Reward-to-risk ratio measured from `entry`. `None` when the stop is
    /// not below the entry.
    pub fn reward_to_risk(&self, entry: f64) -> Option<f64> {
        let risk = entry - self.stop_loss;
        (risk > 0.0).then(|| (self.take_profit - entry) / risk)
    }
}

/// Thresholds and multipliers of the rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalParams {
    pub rsi_threshold: f64,
    pub sl_mult: f64,
    pub tp_mult: f64,
}

impl Default for SignalParams {
    fn default() -> Self {
        Self {
            rsi_threshold: 60.0,
            sl_mult: 1.5,
            tp_mult: 3.0,
        }
    }
}

/// Outcome of evaluating the rule on one bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalDecision {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub signal: Signal,
    pub risk: Option<RiskLevels>,
    pub row: IndicatorRow,
}

#[derive(Debug, Error, PartialEq)]
pub enum SignalError {
    #[error("insufficient data: need at least {required} bars, have {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("indicator frame has {rows} rows but the series has {bars} bars")]
    FrameMismatch { bars: usize, rows: usize },
}

/// The BUY/HOLD rule bound to its parameters and indicator windows.
#[derive(Debug, Clone)]
pub struct SignalRule {
    params: SignalParams,
    windows: IndicatorParams,
}

impl SignalRule {
    pub fn new(params: SignalParams, windows: IndicatorParams) -> Self {
        Self { params, windows }
    }

    pub fn params(&self) -> &SignalParams {
        &self.params
    }

    /// Bars of history needed before the latest decision is determined.
    pub fn warmup(&self) -> usize {
        self.windows.max_window()
    }

    /// Evaluate one bar. `None` when MA or RSI is undefined.
    pub fn evaluate(&self, bar: &PriceBar, row: &IndicatorRow) -> Option<SignalDecision> {
        let ma = row.ma?;
        let rsi = row.rsi?;

        let signal = if bar.close > ma && rsi < self.params.rsi_threshold {
            Signal::Buy
        } else {
            Signal::Hold
        };

        let risk = match (signal, row.atr) {
            (Signal::Buy, Some(atr)) => Some(RiskLevels::from_atr(
                bar.close,
                atr,
                self.params.sl_mult,
                self.params.tp_mult,
            )),
            _ => None,
        };

        Some(SignalDecision {
            timestamp: bar.timestamp,
            close: bar.close,
            signal,
            risk,
            row: *row,
        })
    }

    /// Evaluate every bar, aligned with the series by index.
    pub fn evaluate_all(
        &self,
        series: &PriceSeries,
        frame: &IndicatorFrame,
    ) -> Result<Vec<Option<SignalDecision>>, SignalError> {
        check_alignment(series, frame)?;
        Ok(series
            .bars()
            .iter()
            .zip(frame.rows())
            .map(|(bar, row)| self.evaluate(bar, row))
            .collect())
    }

    /// Decision for the most recent bar.
    pub fn latest(
        &self,
        series: &PriceSeries,
        frame: &IndicatorFrame,
    ) -> Result<SignalDecision, SignalError> {
        check_alignment(series, frame)?;
        let insufficient = SignalError::InsufficientData {
            required: self.warmup(),
            available: series.len(),
        };
        if series.len() < self.warmup() {
            return Err(insufficient);
        }

        match (series.last(), frame.last()) {
            (Some(bar), Some(row)) => self.evaluate(bar, row).ok_or(insufficient),
            _ => Err(insufficient),
        }
    }
}

fn check_alignment(series: &PriceSeries, frame: &IndicatorFrame) -> Result<(), SignalError> {
    if series.len() != frame.len() {
        return Err(SignalError::FrameMismatch {
            bars: series.len(),
            rows: frame.len(),
        });
    }
    Ok(())
}
