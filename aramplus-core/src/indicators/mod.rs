//! Indicator engine: rolling statistics over a price series.
//!
//! Indicators are pure functions: bar history in, one optional value per bar
//! out. They are computed once per run over the whole series and then read by
//! bar index. A value is `None` while its rolling window is still filling
//! (the first `lookback()` bars); there is no NaN in the output.
//!
//! # Look-ahead contamination guard
//! No indicator value at bar t may depend on price data from bar t+1 or later.
//! Every indicator must pass the truncated-vs-full series test
//! (`tests/lookahead_test.rs`).

pub mod atr;
pub mod rsi;
pub mod sma;

pub use atr::Atr;
pub use rsi::Rsi;
pub use sma::Sma;

use crate::domain::{PriceBar, PriceSeries};
use serde::{Deserialize, Serialize};

/// Trait for indicators.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "sma_50", "atr_14").
    fn name(&self) -> &str;

    /// Rolling window length in bars.
    fn window(&self) -> usize;

    /// Number of leading bars without a value.
    fn lookback(&self) -> usize {
        self.window().saturating_sub(1)
    }

    /// Compute the indicator for the entire bar series.
    ///
    /// Returns a `Vec` of the same length as `bars`; the first `lookback()`
    /// entries are `None`.
    fn compute(&self, bars: &[PriceBar]) -> Vec<Option<f64>>;
}

/// Simple rolling mean over a trailing window, inclusive of the current value.
pub(crate) fn rolling_mean(values: &[f64], window: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if i + 1 < window {
                return None;
            }
            let slice = &values[i + 1 - window..=i];
            Some(slice.iter().sum::<f64>() / window as f64)
        })
        .collect()
}

/// Window lengths of the three indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorParams {
    pub ma_window: usize,
    pub rsi_window: usize,
    pub atr_window: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            ma_window: 50,
            rsi_window: 14,
            atr_window: 14,
        }
    }
}

impl IndicatorParams {
    /// Bars needed before every indicator has a value.
    ///
    /// RSI averages `rsi_window` close-to-close changes, which take one more bar.
    pub fn max_window(&self) -> usize {
        self.ma_window
            .max(self.rsi_window + 1)
            .max(self.atr_window)
    }
}

/// Indicator values for one bar.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct IndicatorRow {
    pub ma: Option<f64>,
    pub rsi: Option<f64>,
    pub atr: Option<f64>,
}

impl IndicatorRow {
    /// MA and RSI are both defined, so the signal rule can be evaluated.
    pub fn is_eligible(&self) -> bool {
        self.ma.is_some() && self.rsi.is_some()
    }

    /// Every indicator has a value.
    pub fn is_complete(&self) -> bool {
        self.is_eligible() && self.atr.is_some()
    }
}

/// One [`IndicatorRow`] per bar, aligned with the series by index.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct IndicatorFrame {
    rows: Vec<IndicatorRow>,
}

impl IndicatorFrame {
    pub fn rows(&self) -> &[IndicatorRow] {
        &self.rows
    }

    pub fn get(&self, bar_index: usize) -> Option<&IndicatorRow> {
        self.rows.get(bar_index)
    }

    pub fn last(&self) -> Option<&IndicatorRow> {
        self.rows.last()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the first row with every indicator defined.
    pub fn first_complete(&self) -> Option<usize> {
        self.rows.iter().position(IndicatorRow::is_complete)
    }
}

impl From<Vec<IndicatorRow>> for IndicatorFrame {
    fn from(rows: Vec<IndicatorRow>) -> Self {
        Self { rows }
    }
}

/// Computes MA, RSI and ATR together.
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    params: IndicatorParams,
    sma: Sma,
    rsi: Rsi,
    atr: Atr,
}

impl IndicatorEngine {
    /// # Panics
    /// Panics if any window is zero. `RunConfig::validate` rejects those first.
    pub fn new(params: IndicatorParams) -> Self {
        Self {
            params,
            sma: Sma::new(params.ma_window),
            rsi: Rsi::new(params.rsi_window),
            atr: Atr::new(params.atr_window),
        }
    }

    pub fn params(&self) -> &IndicatorParams {
        &self.params
    }

    pub fn compute(&self, series: &PriceSeries) -> IndicatorFrame {
        self.compute_bars(series.bars())
    }

    pub fn compute_bars(&self, bars: &[PriceBar]) -> IndicatorFrame {
        let ma = self.sma.compute(bars);
        let rsi = self.rsi.compute(bars);
        let atr = self.atr.compute(bars);

        let rows = ma
            .into_iter()
            .zip(rsi)
            .zip(atr)
            .map(|((ma, rsi), atr)| IndicatorRow { ma, rsi, atr })
            .collect();

        IndicatorFrame { rows }
    }
}

/// Create bars from close prices for testing.
///
/// open = prev_close (or close for the first bar),
/// high = max(open,close) + 1.0, low = min(open,close) - 1.0.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<PriceBar> {
    use chrono::TimeZone;
    let base = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            PriceBar::new(
                base + chrono::Duration::days(i as i64),
                open,
                open.max(close) + 1.0,
                open.min(close) - 1.0,
                close,
            )
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
