//! Relative Strength Index (RSI).
//!
//! Gains and losses are close-to-close changes clipped at zero. Their simple
//! rolling means over `period` bars give RS = avg_gain / avg_loss and
//! RSI = 100 - 100 / (1 + RS).
//!
//! The first bar has no prior close and therefore no change. A full window of
//! `period` changes needs `period + 1` closes, so the first value appears at
//! index `period`.
//!
//! Flat windows: avg_loss == 0 with avg_gain > 0 gives 100; both zero gives 50.

use super::{rolling_mean, Indicator};
use crate::domain::PriceBar;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        Self {
            period,
            name: format!("rsi_{period}"),
        }
    }
}

/// RSI from average gain and loss, with the flat-window conventions.
pub fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            50.0
        } else {
            100.0
        }
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn window(&self) -> usize {
        self.period
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[PriceBar]) -> Vec<Option<f64>> {
        if bars.is_empty() {
            return Vec::new();
        }

        // changes[k] is close[k + 1] - close[k]
        let (gains, losses): (Vec<f64>, Vec<f64>) = bars
            .windows(2)
            .map(|pair| {
                let change = pair[1].close - pair[0].close;
                (change.max(0.0), (-change).max(0.0))
            })
            .unzip();

        let averaged = rolling_mean(&gains, self.period)
            .into_iter()
            .zip(rolling_mean(&losses, self.period))
            .map(|(gain, loss)| match (gain, loss) {
                (Some(g), Some(l)) => Some(rsi_from_averages(g, l)),
                _ => None,
            });

        std::iter::once(None).chain(averaged).collect()
    }
}
