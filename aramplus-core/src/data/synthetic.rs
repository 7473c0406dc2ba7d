//! Synthetic data provider for offline development and tests.
//!
//! Generates a deterministic random walk of daily bars seeded from the symbol
//! name, so the same symbol and anchor date always produce the same series.
//! Bars are produced for every calendar day, like a crypto market.

use super::provider::{DataError, DataProvider, DataSource, FetchRequest, FetchResult, RawBar};
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Longest range the synthetic provider will generate.
pub const MAX_RANGE_DAYS: i64 = 100 * 365;

/// Number of calendar days covered by a Yahoo-style range string.
///
/// Accepts `Nd`, `Nwk`, `Nmo` and `Ny` up to [`MAX_RANGE_DAYS`]. Returns
/// `None` for anything else.
pub fn range_days(range: &str) -> Option<i64> {
    let range = range.trim();
    let split = range.find(|c: char| !c.is_ascii_digit())?;
    let (count, unit) = range.split_at(split);
    let count: i64 = count.parse().ok()?;
    let per_unit = match unit {
        "d" => 1,
        "wk" => 7,
        "mo" => 30,
        "y" => 365,
        _ => return None,
    };
    count
        .checked_mul(per_unit)
        .filter(|days| (1..=MAX_RANGE_DAYS).contains(days))
}

/// Deterministic random-walk provider.
#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    end: DateTime<Utc>,
    start_price: f64,
}

impl SyntheticProvider {
    /// Series ending at today's midnight UTC.
    pub fn new() -> Self {
        let today = Utc::now()
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .unwrap_or_else(Utc::now);
        Self::anchored(today)
    }

    /// Series ending at a fixed timestamp, for reproducible runs.
    pub fn anchored(end: DateTime<Utc>) -> Self {
        Self {
            end,
            start_price: 100.0,
        }
    }

    pub fn with_start_price(mut self, price: f64) -> Self {
        self.start_price = price;
        self
    }

    /// Generate `days` bars ending at the anchor.
    pub fn generate(&self, symbol: &str, days: i64) -> Vec<RawBar> {
        // Deterministic seed from symbol name
        let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
        let mut rng = StdRng::from_seed(seed);

        let mut bars = Vec::with_capacity(days.max(0) as usize);
        let mut price = self.start_price;
        let start = self.end - Duration::days(days - 1);

        for offset in 0..days {
            let daily_return: f64 = rng.gen_range(-0.03..0.03);
            let open = price;
            let close = price * (1.0 + daily_return);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));

            bars.push(RawBar {
                timestamp: start + Duration::days(offset),
                open,
                high,
                low,
                close,
            });

            price = close;
        }

        bars
    }
}

impl Default for SyntheticProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DataProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch(&self, request: &FetchRequest) -> Result<FetchResult, DataError> {
        if request.interval != "1d" {
            return Err(DataError::Other(format!(
                "synthetic provider only generates daily bars, got interval '{}'",
                request.interval
            )));
        }
        let days = range_days(&request.range).ok_or_else(|| {
            DataError::Other(format!(
                "unsupported range '{}' (synthetic data covers 1d to {MAX_RANGE_DAYS}d)",
                request.range
            ))
        })?;

        Ok(FetchResult {
            symbol: request.symbol.clone(),
            bars: self.generate(&request.symbol, days),
            source: DataSource::Synthetic,
        })
    }
}
