//! Yahoo Finance data provider.
//!
//! Fetches OHLC bars from Yahoo's v8 chart API using its `range`/`interval`
//! parameters, the same window a `period="1y", interval="1d"` download uses.
//!
//! Yahoo has no official API and changes its responses without notice, so
//! every shape surprise maps to [`DataError::ResponseFormatChanged`]. The CSV
//! provider is the fallback when Yahoo is unavailable.

use super::provider::{DataError, DataProvider, DataSource, FetchRequest, FetchResult, RawBar};
use chrono::DateTime;
use log::{debug, info, warn};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

const CHART_ENDPOINT: &str = "https://query2.finance.yahoo.com/v8/finance/chart";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) aramplus/0.1";
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

// ─── Wire format ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartSeries>>,
    #[serde(default)]
    error: Option<ChartFault>,
}

#[derive(Debug, Deserialize)]
struct ChartFault {
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartSeries {
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<QuoteColumns>,
}

/// Column-major OHLC. Yahoo pads non-trading slots with `null`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QuoteColumns {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
}

impl QuoteColumns {
    /// Row `i` as `[open, high, low, close]`; absent cells are `None`.
    fn row(&self, i: usize) -> [Option<f64>; 4] {
        let cell = |col: &[Option<f64>]| col.get(i).copied().flatten();
        [
            cell(&self.open),
            cell(&self.high),
            cell(&self.low),
            cell(&self.close),
        ]
    }
}

impl Chart {
    fn into_series(self, symbol: &str) -> Result<ChartSeries, DataError> {
        match (self.result, self.error) {
            (Some(results), _) => results
                .into_iter()
                .next()
                .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into())),
            (None, Some(fault)) if fault.code == "Not Found" => Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            }),
            (None, Some(fault)) => Err(DataError::ResponseFormatChanged(format!(
                "{}: {}",
                fault.code, fault.description
            ))),
            (None, None) => Err(DataError::ResponseFormatChanged(
                "neither result nor error in chart response".into(),
            )),
        }
    }
}

/// Convert a chart response into raw bars.
///
/// Slots where all four prices are null are placeholders and skipped.
/// Partially filled rows are kept with NaN in the gaps; canonicalization
/// decides what happens to them.
fn parse_chart(symbol: &str, envelope: ChartEnvelope) -> Result<Vec<RawBar>, DataError> {
    let series = envelope.chart.into_series(symbol)?;
    let timestamps = series
        .timestamp
        .ok_or_else(|| DataError::ResponseFormatChanged("no timestamps".into()))?;
    let quote = series
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, &secs) in timestamps.iter().enumerate() {
        let [open, high, low, close] = quote.row(i);
        if [open, high, low, close].iter().all(Option::is_none) {
            continue;
        }
        let timestamp = DateTime::from_timestamp(secs, 0).ok_or_else(|| {
            DataError::ResponseFormatChanged(format!("timestamp out of range: {secs}"))
        })?;
        let nan = f64::NAN;
        bars.push(RawBar {
            timestamp,
            open: open.unwrap_or(nan),
            high: high.unwrap_or(nan),
            low: low.unwrap_or(nan),
            close: close.unwrap_or(nan),
        });
    }

    if bars.is_empty() {
        return Err(DataError::EmptySeries {
            symbol: symbol.to_string(),
        });
    }
    Ok(bars)
}

// ─── HTTP ───────────────────────────────────────────────────────────

/// What to do with an HTTP status.
#[derive(Debug)]
enum StatusAction {
    Read,
    Retry(DataError),
    Fail(DataError),
}

fn classify_status(symbol: &str, status: StatusCode, retry_after: Option<u64>) -> StatusAction {
    match status {
        s if s.is_success() => StatusAction::Read,
        StatusCode::TOO_MANY_REQUESTS => StatusAction::Retry(DataError::RateLimited {
            retry_after_secs: retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS),
        }),
        StatusCode::UNAUTHORIZED => StatusAction::Fail(DataError::AuthenticationRequired(
            "Yahoo Finance requires authentication".into(),
        )),
        StatusCode::FORBIDDEN => StatusAction::Fail(DataError::Other(format!(
            "HTTP 403 for {symbol}: requests are being blocked"
        ))),
        StatusCode::NOT_FOUND => StatusAction::Fail(DataError::SymbolNotFound {
            symbol: symbol.to_string(),
        }),
        s if s.is_server_error() => {
            StatusAction::Retry(DataError::Other(format!("HTTP {s} for {symbol}")))
        }
        s => StatusAction::Fail(DataError::Other(format!("HTTP {s} for {symbol}"))),
    }
}

enum Attempt {
    Bars(Vec<RawBar>),
    Retry(DataError),
}

/// Delay before retry `attempt` (1-based): `base * 2^(attempt-1)`.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1u32 << attempt.saturating_sub(1).min(16))
}

/// Connection settings for [`YahooProvider`].
#[derive(Debug, Clone)]
pub struct YahooSettings {
    pub timeout: Duration,
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for YahooSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Yahoo Finance chart API client.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    settings: YahooSettings,
}

impl YahooProvider {
    pub fn new(settings: YahooSettings) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(settings.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, settings })
    }

    fn chart_url(request: &FetchRequest) -> String {
        format!(
            "{CHART_ENDPOINT}/{}?range={}&interval={}",
            request.symbol, request.range, request.interval
        )
    }

    /// One HTTP round trip. `Err` is fatal; transient failures come back
    /// as [`Attempt::Retry`].
    fn attempt(&self, url: &str, symbol: &str) -> Result<Attempt, DataError> {
        let resp = match self.client.get(url).send() {
            Ok(resp) => resp,
            Err(e) if e.is_connect() || e.is_timeout() => {
                return Ok(Attempt::Retry(DataError::NetworkUnreachable(e.to_string())));
            }
            Err(e) => return Err(DataError::NetworkUnreachable(e.to_string())),
        };

        let retry_after = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        match classify_status(symbol, resp.status(), retry_after) {
            StatusAction::Read => {
                let envelope: ChartEnvelope = resp.json().map_err(|e| {
                    DataError::ResponseFormatChanged(format!(
                        "failed to decode chart for {symbol}: {e}"
                    ))
                })?;
                parse_chart(symbol, envelope).map(Attempt::Bars)
            }
            StatusAction::Retry(err) => Ok(Attempt::Retry(err)),
            StatusAction::Fail(err) => Err(err),
        }
    }

    fn fetch_with_retry(&self, request: &FetchRequest) -> Result<Vec<RawBar>, DataError> {
        let symbol = request.symbol.as_str();
        let url = Self::chart_url(request);
        let mut last_error = None;

        for attempt in 0..=self.settings.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(self.settings.base_delay, attempt);
                debug!("retrying {symbol} in {delay:?} (attempt {attempt})");
                std::thread::sleep(delay);
            }
            match self.attempt(&url, symbol)? {
                Attempt::Bars(bars) => return Ok(bars),
                Attempt::Retry(err) => {
                    warn!("fetching {symbol}: {err}");
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            DataError::NetworkUnreachable(format!("{symbol}: no attempt was made"))
        }))
    }
}

impl DataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(&self, request: &FetchRequest) -> Result<FetchResult, DataError> {
        info!(
            "fetching {} from Yahoo Finance (range={}, interval={})",
            request.symbol, request.range, request.interval
        );
        let bars = self.fetch_with_retry(request)?;
        debug!("received {} raw bars for {}", bars.len(), request.symbol);
        Ok(FetchResult {
            symbol: request.symbol.clone(),
            bars,
            source: DataSource::YahooFinance,
        })
    }
}
