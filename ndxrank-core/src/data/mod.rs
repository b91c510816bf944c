//! Market-data providers and metric derivation

pub mod circuit_breaker;
pub mod metrics;
pub mod provider;
pub mod synthetic;
pub mod yahoo;

pub use circuit_breaker::CircuitBreaker;
pub use metrics::{metrics_from_bars, round_dp, MIN_SESSIONS};
pub use provider::{
    DailyBar, FetchError, FetchProgress, QuoteProvider, SilentProgress,
    TracingProgress,
};
pub use synthetic::SyntheticProvider;
pub use yahoo::YahooProvider;
