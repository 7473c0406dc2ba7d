//! Canonicalization: raw provider rows to a validated [`PriceSeries`].
//!
//! Sort by timestamp, drop duplicate timestamps (first occurrence wins),
//! apply the missing-bar policy, then drop rows that still fail the OHLC
//! sanity check. Everything dropped or filled is counted in the report.

use super::provider::{DataError, RawBar};
use crate::domain::{PriceBar, PriceSeries};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// What to do with rows that have missing OHLC fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingBarPolicy {
    /// Remove the row.
    #[default]
    Drop,
    /// Replace every field with the previous bar's close. A leading missing
    /// row has no previous bar and is dropped.
    ForwardFill,
}

/// Counts of what canonicalization changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalReport {
    pub input_rows: usize,
    pub output_rows: usize,
    pub reordered: bool,
    pub duplicates_dropped: usize,
    pub missing_dropped: usize,
    pub forward_filled: usize,
    pub insane_dropped: usize,
}

impl CanonicalReport {
    /// True when the output is exactly the input.
    pub fn is_clean(&self) -> bool {
        !self.reordered
            && self.duplicates_dropped == 0
            && self.missing_dropped == 0
            && self.forward_filled == 0
            && self.insane_dropped == 0
    }
}

/// Canonicalize raw bars into a [`PriceSeries`].
///
/// Returns `DataError::EmptySeries` when no row survives.
pub fn canonicalize(
    symbol: &str,
    mut raw: Vec<RawBar>,
    policy: MissingBarPolicy,
) -> Result<(PriceSeries, CanonicalReport), DataError> {
    let mut report = CanonicalReport {
        input_rows: raw.len(),
        ..Default::default()
    };

    report.reordered = raw.windows(2).any(|w| w[1].timestamp < w[0].timestamp);
    // Stable sort keeps duplicates in arrival order
    raw.sort_by_key(|b| b.timestamp);

    let before = raw.len();
    raw.dedup_by_key(|b| b.timestamp);
    report.duplicates_dropped = before - raw.len();

    let mut bars: Vec<PriceBar> = Vec::with_capacity(raw.len());
    for row in raw {
        let bar = if row.has_missing() {
            match (policy, bars.last()) {
                (MissingBarPolicy::ForwardFill, Some(prev)) => {
                    report.forward_filled += 1;
                    let c = prev.close;
                    PriceBar::new(row.timestamp, c, c, c, c)
                }
                _ => {
                    debug!("dropping bar at {} with missing fields", row.timestamp);
                    report.missing_dropped += 1;
                    continue;
                }
            }
        } else {
            PriceBar::new(row.timestamp, row.open, row.high, row.low, row.close)
        };

        if !bar.is_sane() {
            debug!("dropping insane bar at {}", bar.timestamp);
            report.insane_dropped += 1;
            continue;
        }
        bars.push(bar);
    }

    report.output_rows = bars.len();
    if bars.is_empty() {
        return Err(DataError::EmptySeries {
            symbol: symbol.to_string(),
        });
    }

    if !report.is_clean() {
        warn!(
            "{symbol}: canonicalized {} -> {} bars (duplicates {}, missing {}, filled {}, insane {})",
            report.input_rows,
            report.output_rows,
            report.duplicates_dropped,
            report.missing_dropped,
            report.forward_filled,
            report.insane_dropped
        );
    }

    let series = PriceSeries::new(symbol, bars)?;
    Ok((series, report))
}
