//! Market-data provider trait and structured error types.
//!
//! The QuoteProvider trait abstracts over data sources (Yahoo Finance, synthetic
//! random walks) so the fetcher can be driven by a mock in tests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::QuoteMetrics;

/// Raw daily bar as delivered by a provider, before metric derivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub volume: u64,
}

/// Structured error types for a single retrieval attempt.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("provider returned HTTP {status}")]
    Upstream { status: u16 },

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("insufficient history for {symbol}: {sessions} sessions, need {required}")]
    InsufficientHistory {
        symbol: String,
        sessions: usize,
        required: usize,
    },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("fetch error: {0}")]
    Other(String),
}

impl FetchError {
    /// Whether another attempt for the same ticker may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NetworkUnreachable(_) | Self::Timeout { .. } | Self::RateLimited { .. } => true,
            Self::Upstream { status } => *status >= 500,
            Self::SymbolNotFound { .. }
            | Self::ResponseFormatChanged(_)
            | Self::InsufficientHistory { .. }
            | Self::CircuitBreakerTripped
            | Self::Other(_) => false,
        }
    }
}

/// Trait for market-data providers.
///
/// One call is one retrieval attempt; retry, pacing and concurrency live in
/// the fetcher, not in the provider.
pub trait QuoteProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Retrieve metrics for one symbol.
    fn fetch_quote(&self, symbol: &str) -> Result<QuoteMetrics, FetchError>;

    /// Check if the provider is currently available (not rate-limited, not blocked).
    fn is_available(&self) -> bool {
        true
    }
}

/// Progress callback for multi-ticker fetches.
///
/// Called from worker threads, hence `Sync`.
pub trait FetchProgress: Send + Sync {
    /// Called before the first attempt for a ticker.
    fn on_start(&self, symbol: &str, index: usize, total: usize);

    /// Called before a retry, after a retryable failure.
    fn on_retry(&self, symbol: &str, attempt: u32, error: &FetchError);

    /// Called when a ticker is settled (ok, stale or failed).
    fn on_complete(&self, symbol: &str, index: usize, total: usize, result: &Result<(), FetchError>);

    /// Called when the entire batch is done.
    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Progress reporter that emits `tracing` events.
pub struct TracingProgress;

impl FetchProgress for TracingProgress {
    fn on_start(&self, symbol: &str, index: usize, total: usize) {
        tracing::debug!(symbol, "[{}/{}] fetching", index + 1, total);
    }

    fn on_retry(&self, symbol: &str, attempt: u32, error: &FetchError) {
        tracing::warn!(symbol, attempt, %error, "retrying after retryable failure");
    }

    fn on_complete(
        &self,
        symbol: &str,
        _index: usize,
        _total: usize,
        result: &Result<(), FetchError>,
    ) {
        match result {
            Ok(()) => tracing::debug!(symbol, "ok"),
            Err(e) => tracing::warn!(symbol, error = %e, "ticker failed"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        tracing::info!(succeeded, failed, total, "fetch complete");
    }
}

/// Progress reporter that discards every event.
pub struct SilentProgress;

impl FetchProgress for SilentProgress {
    fn on_start(&self, _symbol: &str, _index: usize, _total: usize) {}
    fn on_retry(&self, _symbol: &str, _attempt: u32, _error: &FetchError) {}
    fn on_complete(&self, _: &str, _: usize, _: usize, _: &Result<(), FetchError>) {}
    fn on_batch_complete(&self, _succeeded: usize, _failed: usize, _total: usize) {}
}
