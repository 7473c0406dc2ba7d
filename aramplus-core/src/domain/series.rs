//! PriceSeries: the validated, chronologically ordered input of one run.

use super::bar::PriceBar;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Violations of the PriceSeries invariants.
#[derive(Debug, Error, PartialEq)]
pub enum SeriesError {
    #[error("bar {index} at {timestamp} is not after the previous bar")]
    NotIncreasing {
        index: usize,
        timestamp: DateTime<Utc>,
    },

    #[error("bar {index} at {timestamp} has missing or inconsistent OHLC values")]
    InsaneBar {
        index: usize,
        timestamp: DateTime<Utc>,
    },
}

/// Ordered bars for a single symbol.
///
/// # Invariants
/// - timestamps are strictly increasing (no duplicates, gaps allowed)
/// - every bar passes [`PriceBar::is_sane`]
///
/// Raw provider output goes through `data::canonicalize` first, which sorts,
/// drops duplicates and handles missing rows before calling [`PriceSeries::new`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    symbol: String,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, bars: Vec<PriceBar>) -> Result<Self, SeriesError> {
        for (index, bar) in bars.iter().enumerate() {
            if !bar.is_sane() {
                return Err(SeriesError::InsaneBar {
                    index,
                    timestamp: bar.timestamp,
                });
            }
            if index > 0 && bar.timestamp <= bars[index - 1].timestamp {
                return Err(SeriesError::NotIncreasing {
                    index,
                    timestamp: bar.timestamp,
                });
            }
        }

        Ok(Self {
            symbol: symbol.into(),
            bars,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> Option<&PriceBar> {
        self.bars.first()
    }

    pub fn last(&self) -> Option<&PriceBar> {
        self.bars.last()
    }

    pub fn closes(&self) -> impl ExactSizeIterator<Item = f64> + '_ {
        self.bars.iter().map(|b| b.close)
    }

    /// The first `len` bars as a new series. Prefixes keep every invariant.
    pub fn truncated(&self, len: usize) -> Self {
        Self {
            symbol: self.symbol.clone(),
            bars: self.bars[..len.min(self.bars.len())].to_vec(),
        }
    }
}
