//! CSV import provider.
//!
//! Reads `timestamp,open,high,low,close` files. Column names are matched
//! case-sensitively but the common spellings are accepted (`date`, `Date`,
//! `Open`, ...), and extra columns such as `Adj Close` or `Volume` are ignored,
//! so a Yahoo Finance CSV download can be used as-is.
//!
//! Timestamps may be RFC 3339 (`2024-01-02T00:00:00Z`) or plain dates
//! (`2024-01-02`, taken as midnight UTC). Empty price cells become NaN and are
//! handled by `canonicalize`.

use super::provider::{DataError, DataProvider, DataSource, FetchRequest, FetchResult, RawBar};
use chrono::{DateTime, NaiveDate, Utc};
use log::info;
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "date", alias = "Date", alias = "Timestamp", alias = "Datetime")]
    timestamp: String,
    #[serde(alias = "Open")]
    open: Option<f64>,
    #[serde(alias = "High")]
    high: Option<f64>,
    #[serde(alias = "Low")]
    low: Option<f64>,
    #[serde(alias = "Close")]
    close: Option<f64>,
}

/// Parse an RFC 3339 timestamp or a `YYYY-MM-DD` date.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Parse CSV content into raw bars. `origin` names the input in errors.
pub fn read_raw_bars<R: Read>(reader: R, origin: &str) -> Result<Vec<RawBar>, DataError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut bars = Vec::new();
    for (line, result) in csv_reader.deserialize::<CsvRow>().enumerate() {
        let row = result.map_err(|e| DataError::CsvImport {
            path: origin.to_string(),
            reason: e.to_string(),
        })?;

        let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| DataError::CsvImport {
            path: origin.to_string(),
            reason: format!("row {}: invalid timestamp '{}'", line + 1, row.timestamp),
        })?;

        bars.push(RawBar {
            timestamp,
            open: row.open.unwrap_or(f64::NAN),
            high: row.high.unwrap_or(f64::NAN),
            low: row.low.unwrap_or(f64::NAN),
            close: row.close.unwrap_or(f64::NAN),
        });
    }

    Ok(bars)
}

/// Provider backed by a local CSV file.
///
/// The request's range and interval are ignored: the file is the history.
#[derive(Debug, Clone)]
pub struct CsvProvider {
    path: PathBuf,
}

impl CsvProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DataProvider for CsvProvider {
    fn name(&self) -> &str {
        "csv_import"
    }

    fn fetch(&self, request: &FetchRequest) -> Result<FetchResult, DataError> {
        let origin = self.path.display().to_string();
        let file = std::fs::File::open(&self.path).map_err(|e| DataError::CsvImport {
            path: origin.clone(),
            reason: e.to_string(),
        })?;

        let bars = read_raw_bars(std::io::BufReader::new(file), &origin)?;
        info!("read {} rows for {} from {origin}", bars.len(), request.symbol);

        if bars.is_empty() {
            return Err(DataError::EmptySeries {
                symbol: request.symbol.clone(),
            });
        }

        Ok(FetchResult {
            symbol: request.symbol.clone(),
            bars,
            source: DataSource::CsvImport,
        })
    }
}
