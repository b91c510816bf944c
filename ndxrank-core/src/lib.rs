//! ndxrank core: ticker catalog, market-data providers, quote fetcher, ranking engine.
//!
//! - Ticker catalog with the built-in NASDAQ-100 list and a test-mode subset
//! - `QuoteProvider` trait with Yahoo Finance and synthetic implementations
//! - Quote fetcher with per-ticker retry, pacing and bounded parallelism
//! - Ranking engine producing dense, deterministic ranks
//!
//! Nothing here touches the filesystem; artifacts live in `ndxrank-runner`.

pub mod catalog;
pub mod data;
pub mod domain;
pub mod fetcher;
pub mod ranking;

pub use catalog::{Catalog, CatalogError, INDEX_NAME, TEST_SUBSET_SIZE};
pub use domain::{FetchStatus, PeriodReturns, Quote, QuoteMetrics, RunMode, Ticker};
pub use fetcher::{Backoff, FetchPolicy, FetchReport, FetchSummary, QuoteFetcher};
pub use ranking::{rank, ultra_leaders, RankedEntry, ScoreWeights, Snapshot, UltraWeights};
