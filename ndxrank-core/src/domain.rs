//! Domain types shared by the fetcher, the ranking engine and the artifact layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which artifact pair a run targets.
///
/// Threaded explicitly through the catalog, the ranking engine and the
/// output layout; there is no process-wide mode switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Production,
    Test,
}

impl RunMode {
    pub fn from_test_flag(test: bool) -> Self {
        if test {
            Self::Test
        } else {
            Self::Production
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(format!("unknown run mode '{other}' (expected production or test)")),
        }
    }
}

/// One catalog constituent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Ticker {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            name: None,
        }
    }

    pub fn named(symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            name: Some(name.into()),
        }
    }
}

/// Trailing percent returns over calendar-month windows (in trading sessions).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeriodReturns {
    #[serde(rename = "1m")]
    pub one_month: f64,
    #[serde(rename = "3m")]
    pub three_month: f64,
    #[serde(rename = "6m")]
    pub six_month: f64,
    #[serde(rename = "12m")]
    pub twelve_month: f64,
}

/// Market metrics for one ticker, as used by the scoring function.
///
/// All percentages are expressed in percent (2.5 means +2.5%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteMetrics {
    pub price: f64,
    pub volume: u64,
    pub avg_volume: f64,
    pub relative_volume: f64,
    pub change_pct: f64,
    pub returns: PeriodReturns,
    /// Timestamp of the latest market bar the metrics were derived from.
    pub as_of: DateTime<Utc>,
}

/// Outcome of retrieving one ticker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    Ok,
    Failed,
    /// Retrieved, but the latest bar is older than the configured age bound.
    Stale,
}

/// A single retrieved market-data observation. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub ticker: Ticker,
    pub status: FetchStatus,
    pub metrics: Option<QuoteMetrics>,
    pub retrieved_at: DateTime<Utc>,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Quote {
    pub fn ok(ticker: Ticker, metrics: QuoteMetrics, retrieved_at: DateTime<Utc>, attempts: u32) -> Self {
        Self {
            ticker,
            status: FetchStatus::Ok,
            metrics: Some(metrics),
            retrieved_at,
            attempts,
            error: None,
        }
    }

    pub fn stale(ticker: Ticker, metrics: QuoteMetrics, retrieved_at: DateTime<Utc>, attempts: u32) -> Self {
        Self {
            status: FetchStatus::Stale,
            ..Self::ok(ticker, metrics, retrieved_at, attempts)
        }
    }

    pub fn failed(
        ticker: Ticker,
        error: impl Into<String>,
        retrieved_at: DateTime<Utc>,
        attempts: u32,
    ) -> Self {
        Self {
            ticker,
            status: FetchStatus::Failed,
            metrics: None,
            retrieved_at,
            attempts,
            error: Some(error.into()),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.ticker.symbol
    }

    pub fn is_ok(&self) -> bool {
        self.status == FetchStatus::Ok
    }
}
