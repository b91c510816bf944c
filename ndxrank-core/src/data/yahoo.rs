//! Yahoo Finance data provider.
//!
//! Fetches two years of daily bars from Yahoo's v8 chart API and derives the
//! scoring metrics from them. One `fetch_quote` call is one HTTP request;
//! retries are owned by the fetcher.
//!
//! Yahoo Finance has no official API and is subject to unannounced format
//! changes, so every shape mismatch maps to `ResponseFormatChanged`.

use super::circuit_breaker::CircuitBreaker;
use super::metrics::metrics_from_bars;
use super::provider::{DailyBar, FetchError, QuoteProvider};
use crate::domain::QuoteMetrics;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://query2.finance.yahoo.com";

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    close: Vec<Option<f64>>,
    volume: Vec<Option<u64>>,
}

pub struct YahooProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    base_url: String,
    timeout: Duration,
}

impl YahooProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| FetchError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout,
        })
    }

    /// Point the provider at a different host (mirror or local stub).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn chart_url(&self, symbol: &str) -> String {
        format!(
            "{}/v8/finance/chart/{symbol}?range=2y&interval=1d&includePrePost=false",
            self.base_url
        )
    }

    fn get_chart(&self, symbol: &str) -> Result<ChartResponse, FetchError> {
        let resp = self.client.get(self.chart_url(symbol)).send().map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    timeout_ms: self.timeout.as_millis() as u64,
                }
            } else {
                FetchError::NetworkUnreachable(e.to_string())
            }
        })?;

        if let Err(error) = classify(resp.status(), resp.headers(), symbol) {
            self.note_refusal(&error);
            return Err(error);
        }

        let body = resp
            .text()
            .map_err(|e| FetchError::NetworkUnreachable(format!("failed to read body: {e}")))?;
        serde_json::from_str(&body).map_err(|e| {
            FetchError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
        })
    }

    /// Breaker bookkeeping for a refused request: 403 trips it at once,
    /// 429 and 5xx count towards the failure threshold.
    fn note_refusal(&self, error: &FetchError) {
        match error {
            FetchError::CircuitBreakerTripped => self.circuit_breaker.trip(),
            FetchError::RateLimited { .. } => self.circuit_breaker.record_failure(),
            FetchError::Upstream { status } if *status >= 500 => self.circuit_breaker.record_failure(),
            _ => {}
        }
    }
}

/// Map an HTTP status to the outcome of this attempt; 2xx passes through.
fn classify(status: StatusCode, headers: &HeaderMap, symbol: &str) -> Result<(), FetchError> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::FORBIDDEN => Err(FetchError::CircuitBreakerTripped),
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after_secs = headers
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(60);
            Err(FetchError::RateLimited { retry_after_secs })
        }
        StatusCode::NOT_FOUND => Err(FetchError::SymbolNotFound {
            symbol: symbol.to_string(),
        }),
        StatusCode::UNAUTHORIZED => Err(FetchError::Other(
            "Yahoo Finance requires authentication".into(),
        )),
        other => Err(FetchError::Upstream {
            status: other.as_u16(),
        }),
    }
}

/// Turn a chart response into daily bars, dropping sessions without a close.
fn parse_chart(symbol: &str, resp: ChartResponse) -> Result<Vec<DailyBar>, FetchError> {
    let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
        Some(err) if err.code == "Not Found" => FetchError::SymbolNotFound {
            symbol: symbol.to_string(),
        },
        Some(err) => FetchError::ResponseFormatChanged(format!("{}: {}", err.code, err.description)),
        None => FetchError::ResponseFormatChanged("empty result with no error".into()),
    })?;

    let data = result
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::ResponseFormatChanged("result array is empty".into()))?;

    let timestamps = data
        .timestamp
        .ok_or_else(|| FetchError::ResponseFormatChanged("no timestamps".into()))?;

    let quote = data
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::ResponseFormatChanged("no quote data".into()))?;

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let Some(close) = quote.close.get(i).copied().flatten() else {
            continue;
        };
        let timestamp = chrono::DateTime::from_timestamp(ts, 0)
            .ok_or_else(|| FetchError::ResponseFormatChanged(format!("invalid timestamp: {ts}")))?;
        bars.push(DailyBar {
            timestamp,
            close,
            volume: quote.volume.get(i).copied().flatten().unwrap_or(0),
        });
    }

    if bars.is_empty() {
        return Err(FetchError::SymbolNotFound {
            symbol: symbol.to_string(),
        });
    }
    Ok(bars)
}

impl QuoteProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch_quote(&self, symbol: &str) -> Result<QuoteMetrics, FetchError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(FetchError::CircuitBreakerTripped);
        }
        let chart = self.get_chart(symbol)?;
        let bars = parse_chart(symbol, chart)?;
        let metrics = metrics_from_bars(symbol, &bars)?;
        self.circuit_breaker.record_success();
        Ok(metrics)
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}
