//! Circuit breaker for provider throttling and IP bans.
//!
//! HTTP 403 trips the breaker immediately; repeated 429/5xx trip it after a
//! threshold of consecutive failures. While open, the fetcher stops issuing
//! requests and marks the remaining tickers as failed.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// State of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakerState {
    /// Normal operation, requests are allowed.
    Closed,
    /// Tripped: all requests are refused until cooldown expires.
    Open { tripped_at: Instant },
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
}

/// Shared between worker threads through `Arc`.
#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    cooldown: Duration,
    failure_threshold: u32,
}

impl CircuitBreaker {
    pub fn new(cooldown: Duration, failure_threshold: u32) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
            }),
            cooldown,
            failure_threshold: failure_threshold.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Check if requests are currently allowed.
    pub fn is_allowed(&self) -> bool {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::Open { tripped_at } if tripped_at.elapsed() >= self.cooldown => {
                inner.state = BreakerState::Closed;
                inner.consecutive_failures = 0;
                tracing::info!("circuit breaker cooldown expired, closing");
                true
            }
            BreakerState::Open { .. } => false,
        }
    }

    pub fn record_success(&self) {
        self.lock().consecutive_failures = 0;
    }

    /// Record a throttling-type failure; trips once the threshold is reached.
    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.consecutive_failures += 1;
        if inner.consecutive_failures >= self.failure_threshold
            && inner.state == BreakerState::Closed
        {
            tracing::warn!(
                failures = inner.consecutive_failures,
                "circuit breaker tripped after consecutive failures"
            );
            inner.state = BreakerState::Open {
                tripped_at: Instant::now(),
            };
        }
    }

    /// Immediately trip the breaker (403 Forbidden / IP ban).
    pub fn trip(&self) {
        tracing::warn!("circuit breaker tripped by provider refusal");
        self.lock().state = BreakerState::Open {
            tripped_at: Instant::now(),
        };
    }
}
