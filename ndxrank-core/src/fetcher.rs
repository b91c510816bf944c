//! Quote fetcher: per-ticker retrieval with failure isolation.
//!
//! Tickers are fetched on a private rayon pool bounded by
//! `FetchPolicy::concurrency`. A shared [`Pacer`] spaces request starts
//! across all workers. Each ticker runs its own retry state machine
//! ([`AttemptState`]); an error for one ticker only ever produces a `failed`
//! quote for that ticker.

use crate::data::provider::{FetchError, FetchProgress, QuoteProvider};
use crate::domain::{FetchStatus, Quote, QuoteMetrics, Ticker};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Delay between attempts of the same ticker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    Fixed { delay: Duration },
    /// `base * factor^retry`, capped at `max`.
    Exponential {
        base: Duration,
        factor: f64,
        max: Duration,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(500),
            factor: 2.0,
            max: Duration::from_secs(4),
        }
    }
}

impl Backoff {
    /// Delay before retry number `retry` (0-based).
    pub fn delay(self, retry: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential { base, factor, max } => {
                let seconds = base.as_secs_f64() * factor.powi(retry as i32);
                if seconds.is_finite() {
                    Duration::from_secs_f64(seconds.clamp(0.0, max.as_secs_f64()))
                } else {
                    max
                }
            }
        }
    }
}

/// Retry, pacing, concurrency and freshness knobs for one fetch batch.
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    /// Total attempts per ticker, first attempt included.
    pub max_attempts: u32,
    pub backoff: Backoff,
    /// Minimum spacing between request starts across all workers.
    pub min_spacing: Duration,
    pub concurrency: usize,
    /// Quotes whose latest bar is older than this are `stale`.
    pub max_quote_age: chrono::Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::default(),
            min_spacing: Duration::from_millis(250),
            concurrency: 8,
            max_quote_age: chrono::Duration::days(7),
        }
    }
}

/// Fixed-interval request pacer shared by all workers. Not adaptive.
#[derive(Debug)]
pub struct Pacer {
    spacing: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl Pacer {
    pub fn new(spacing: Duration) -> Self {
        Self {
            spacing,
            next_slot: Mutex::new(None),
        }
    }

    /// Block until this caller's request slot. Slots are handed out in
    /// call order, `spacing` apart.
    pub fn wait(&self) {
        if self.spacing.is_zero() {
            return;
        }
        let now = Instant::now();
        let slot = {
            let mut next = self.next_slot.lock().unwrap_or_else(PoisonError::into_inner);
            let slot = next.map_or(now, |n| n.max(now));
            *next = Some(slot + self.spacing);
            slot
        };
        if slot > now {
            std::thread::sleep(slot - now);
        }
    }
}

/// Per-ticker retry state machine.
///
/// `Pending -> Attempt(n) -> Success | Retry(n, delay) | Failed`, where a
/// `Retry` leads back to `Attempt(n + 1)`.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptState {
    Pending,
    Attempt(u32),
    Retry {
        attempt: u32,
        delay: Duration,
        error: FetchError,
    },
    Success {
        attempts: u32,
        metrics: QuoteMetrics,
    },
    Failed {
        attempts: u32,
        error: FetchError,
    },
}

impl AttemptState {
    /// Transition after attempt `attempt` produced `result`.
    pub fn after_attempt(
        attempt: u32,
        result: Result<QuoteMetrics, FetchError>,
        policy: &FetchPolicy,
    ) -> Self {
        match result {
            Ok(metrics) => Self::Success {
                attempts: attempt,
                metrics,
            },
            Err(error) if error.is_retryable() && attempt < policy.max_attempts => Self::Retry {
                attempt,
                delay: policy.backoff.delay(attempt.saturating_sub(1)),
                error,
            },
            Err(error) => Self::Failed {
                attempts: attempt,
                error,
            },
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success { .. } | Self::Failed { .. })
    }
}

/// Counts for one fetch batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FetchSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub stale: usize,
    /// Provider calls made, retries included.
    pub requests: u64,
}

/// One quote per requested ticker, keyed by symbol.
#[derive(Debug, Clone)]
pub struct FetchReport {
    pub quotes: BTreeMap<String, Quote>,
    pub summary: FetchSummary,
}

pub struct QuoteFetcher<'a> {
    provider: &'a dyn QuoteProvider,
    progress: &'a dyn FetchProgress,
    policy: FetchPolicy,
    pacer: Pacer,
}

impl<'a> QuoteFetcher<'a> {
    pub fn new(
        provider: &'a dyn QuoteProvider,
        policy: FetchPolicy,
        progress: &'a dyn FetchProgress,
    ) -> Self {
        let pacer = Pacer::new(policy.min_spacing);
        Self {
            provider,
            progress,
            policy,
            pacer,
        }
    }

    /// Fetch every ticker, judging staleness against `now`.
    pub fn fetch_at(&self, tickers: &[Ticker], now: DateTime<Utc>) -> FetchReport {
        let total = tickers.len();
        tracing::info!(
            provider = self.provider.name(),
            tickers = total,
            concurrency = self.policy.concurrency,
            "fetching quotes"
        );

        let fetch_one = |(index, ticker): (usize, &Ticker)| self.fetch_ticker(ticker, index, total, now);

        let quotes: Vec<Quote> = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.policy.concurrency.max(1))
            .thread_name(|i| format!("ndxrank-fetch-{i}"))
            .build()
        {
            Ok(pool) => pool.install(|| tickers.par_iter().enumerate().map(fetch_one).collect()),
            Err(e) => {
                tracing::warn!(error = %e, "failed to build fetch pool, fetching sequentially");
                tickers.iter().enumerate().map(fetch_one).collect()
            }
        };

        let mut summary = FetchSummary {
            attempted: total,
            ..FetchSummary::default()
        };
        let mut by_symbol = BTreeMap::new();
        for quote in quotes {
            summary.requests += u64::from(quote.attempts);
            match quote.status {
                FetchStatus::Ok => summary.succeeded += 1,
                FetchStatus::Stale => summary.stale += 1,
                FetchStatus::Failed => summary.failed += 1,
            }
            by_symbol.insert(quote.ticker.symbol.clone(), quote);
        }

        self.progress
            .on_batch_complete(summary.succeeded, summary.failed + summary.stale, total);

        FetchReport {
            quotes: by_symbol,
            summary,
        }
    }

    fn fetch_ticker(&self, ticker: &Ticker, index: usize, total: usize, now: DateTime<Utc>) -> Quote {
        let symbol = ticker.symbol.as_str();
        self.progress.on_start(symbol, index, total);

        let quote = match self.drive(symbol) {
            AttemptState::Success { attempts, metrics } => {
                if now - metrics.as_of > self.policy.max_quote_age {
                    tracing::warn!(symbol, as_of = %metrics.as_of, "latest bar is stale");
                    Quote::stale(ticker.clone(), metrics, now, attempts)
                } else {
                    Quote::ok(ticker.clone(), metrics, now, attempts)
                }
            }
            AttemptState::Failed { attempts, error } => {
                self.progress.on_complete(symbol, index, total, &Err(error.clone()));
                return Quote::failed(ticker.clone(), error.to_string(), now, attempts);
            }
            other => {
                // drive() only returns terminal states
                let error = FetchError::Other(format!("fetch ended in non-terminal state {other:?}"));
                self.progress.on_complete(symbol, index, total, &Err(error.clone()));
                return Quote::failed(ticker.clone(), error.to_string(), now, 0);
            }
        };

        self.progress.on_complete(symbol, index, total, &Ok(()));
        quote
    }

    /// Run the state machine for one symbol to a terminal state.
    fn drive(&self, symbol: &str) -> AttemptState {
        let mut state = AttemptState::Pending;
        while !state.is_terminal() {
            state = match state {
                AttemptState::Pending => AttemptState::Attempt(1),
                AttemptState::Attempt(n) => {
                    if !self.provider.is_available() {
                        AttemptState::Failed {
                            attempts: n - 1,
                            error: FetchError::CircuitBreakerTripped,
                        }
                    } else {
                        self.pacer.wait();
                        tracing::debug!(symbol, attempt = n, "requesting quote");
                        AttemptState::after_attempt(n, self.provider.fetch_quote(symbol), &self.policy)
                    }
                }
                AttemptState::Retry {
                    attempt,
                    delay,
                    error,
                } => {
                    self.progress.on_retry(symbol, attempt + 1, &error);
                    std::thread::sleep(delay);
                    AttemptState::Attempt(attempt + 1)
                }
                terminal => terminal,
            };
        }
        state
    }
}
