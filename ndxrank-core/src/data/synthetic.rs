//! Synthetic provider for offline runs and tests.
//!
//! Each symbol gets its own random walk seeded from `(seed, symbol)` through
//! BLAKE3, so output is identical regardless of fetch order or thread count.

use super::metrics::metrics_from_bars;
use super::provider::{DailyBar, FetchError, QuoteProvider};
use crate::domain::QuoteMetrics;
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

/// About two years of trading sessions.
pub const SYNTHETIC_SESSIONS: usize = 504;

#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    seed: u64,
    anchor: DateTime<Utc>,
    missing: HashSet<String>,
}

impl SyntheticProvider {
    /// Walks end on the most recent weekday at or before today.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            anchor: Utc::now(),
            missing: HashSet::new(),
        }
    }

    /// Pin the last session date, for reproducible output.
    pub fn with_anchor(mut self, anchor: DateTime<Utc>) -> Self {
        self.anchor = anchor;
        self
    }

    /// Symbols that answer `SymbolNotFound`, as delisted tickers would.
    pub fn with_missing<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.missing.extend(symbols.into_iter().map(Into::into));
        self
    }

    /// Derive a per-symbol sub-seed, independent of call order.
    pub fn sub_seed(&self, symbol: &str) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.seed.to_le_bytes());
        hasher.update(symbol.as_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    /// Daily bars for `symbol`, oldest first.
    pub fn bars(&self, symbol: &str) -> Vec<DailyBar> {
        let mut rng = StdRng::seed_from_u64(self.sub_seed(symbol));

        let drift: f64 = rng.gen_range(-0.0005..0.0015);
        let vol: f64 = rng.gen_range(0.008..0.03);
        let base_volume: f64 = rng.gen_range(1.0e6..5.0e7);
        let mut close: f64 = rng.gen_range(20.0..500.0);

        let dates = session_dates(self.anchor, SYNTHETIC_SESSIONS);
        let mut bars = Vec::with_capacity(dates.len());
        for timestamp in dates {
            close = (close * (1.0 + drift + vol * rng.gen_range(-1.0..1.0))).max(0.01);
            let volume = (base_volume * rng.gen_range(0.5..1.5)) as u64;
            bars.push(DailyBar {
                timestamp,
                close,
                volume,
            });
        }
        bars
    }
}

/// `count` weekday session closes (21:00 UTC) ending at or before `anchor`.
fn session_dates(anchor: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
    let mut day = anchor.date_naive();
    let mut dates = Vec::with_capacity(count);
    while dates.len() < count {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            if let Some(close) = day.and_hms_opt(21, 0, 0) {
                dates.push(Utc.from_utc_datetime(&close));
            }
        }
        day -= Duration::days(1);
    }
    dates.reverse();
    dates
}

impl QuoteProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch_quote(&self, symbol: &str) -> Result<QuoteMetrics, FetchError> {
        if self.missing.contains(symbol) {
            return Err(FetchError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        metrics_from_bars(symbol, &self.bars(symbol))
    }
}
