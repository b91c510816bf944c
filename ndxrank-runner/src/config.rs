//! Run configuration loaded from an optional TOML file.
//!
//! Every field has a default, so an empty file (or no file) yields the
//! production settings. Durations are given in milliseconds or days.
//!
//! ```toml
//! [fetch]
//! concurrency = 4
//! backoff = "fixed"
//!
//! [scoring]
//! twelve_month = 0.5
//!
//! [scoring.ultra]
//! three_month = 0.7
//! one_month = 0.3
//!
//! [history]
//! retention = 30
//!
//! [output]
//! dir = "public/data"
//!
//! [catalog]
//! symbols = ["AAPL", "MSFT", "NVDA"]
//! ```

use ndxrank_core::{Backoff, Catalog, CatalogError, FetchPolicy, ScoreWeights, UltraWeights};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::artifacts::HistoryPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("invalid catalog: {0}")]
    Catalog(#[from] CatalogError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub max_attempts: u32,
    pub backoff: BackoffKind,
    /// Fixed delay, or the first delay of the exponential schedule.
    pub backoff_base_ms: u64,
    pub backoff_factor: f64,
    pub backoff_max_ms: u64,
    pub min_spacing_ms: u64,
    pub concurrency: usize,
    pub timeout_ms: u64,
    pub max_quote_age_days: i64,
    pub breaker_threshold: u32,
    pub breaker_cooldown_secs: u64,
    /// Seed for `--synthetic` runs.
    pub synthetic_seed: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffKind::Exponential,
            backoff_base_ms: 500,
            backoff_factor: 2.0,
            backoff_max_ms: 4_000,
            min_spacing_ms: 250,
            concurrency: 8,
            timeout_ms: 20_000,
            max_quote_age_days: 7,
            breaker_threshold: 5,
            breaker_cooldown_secs: 30 * 60,
            synthetic_seed: 42,
        }
    }
}

/// `[scoring]`: the composite weights at the top level, the short-term
/// weights under `[scoring.ultra]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    #[serde(flatten)]
    pub composite: ScoreWeights,
    pub ultra: UltraWeights,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub retention: usize,
    pub leaders: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        let policy = HistoryPolicy::default();
        Self {
            retention: policy.retention,
            leaders: policy.leaders,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Replaces the built-in NASDAQ-100 list when non-empty.
    pub symbols: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankConfig {
    pub fetch: FetchConfig,
    pub scoring: ScoringConfig,
    pub history: HistoryConfig,
    pub output: OutputConfig,
    pub catalog: CatalogConfig,
}

impl RankConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let f = &self.fetch;
        if f.max_attempts == 0 {
            return Err(ConfigError::Invalid("fetch.max_attempts must be at least 1".into()));
        }
        if f.concurrency == 0 {
            return Err(ConfigError::Invalid("fetch.concurrency must be at least 1".into()));
        }
        if f.timeout_ms == 0 {
            return Err(ConfigError::Invalid("fetch.timeout_ms must be positive".into()));
        }
        if f.max_quote_age_days < 0 {
            return Err(ConfigError::Invalid("fetch.max_quote_age_days must not be negative".into()));
        }
        if !f.backoff_factor.is_finite() || f.backoff_factor < 1.0 {
            return Err(ConfigError::Invalid("fetch.backoff_factor must be a finite number >= 1".into()));
        }
        if !self.scoring.composite.is_finite() || !self.scoring.ultra.is_finite() {
            return Err(ConfigError::Invalid("scoring weights must be finite".into()));
        }
        if self.history.retention == 0 {
            return Err(ConfigError::Invalid("history.retention must be at least 1".into()));
        }
        Ok(())
    }

    pub fn fetch_policy(&self) -> FetchPolicy {
        let f = &self.fetch;
        let base = Duration::from_millis(f.backoff_base_ms);
        let backoff = match f.backoff {
            BackoffKind::Fixed => Backoff::Fixed { delay: base },
            BackoffKind::Exponential => Backoff::Exponential {
                base,
                factor: f.backoff_factor,
                max: Duration::from_millis(f.backoff_max_ms),
            },
        };
        FetchPolicy {
            max_attempts: f.max_attempts,
            backoff,
            min_spacing: Duration::from_millis(f.min_spacing_ms),
            concurrency: f.concurrency,
            max_quote_age: chrono::Duration::days(f.max_quote_age_days),
        }
    }

    pub fn history_policy(&self) -> HistoryPolicy {
        HistoryPolicy {
            retention: self.history.retention,
            leaders: self.history.leaders,
        }
    }

    /// The configured symbol list, or the built-in NASDAQ-100.
    pub fn catalog(&self) -> Result<Catalog, ConfigError> {
        if self.catalog.symbols.is_empty() {
            Ok(Catalog::nasdaq100())
        } else {
            Ok(Catalog::from_symbols(&self.catalog.symbols)?)
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch.timeout_ms)
    }

    pub fn breaker_cooldown(&self) -> Duration {
        Duration::from_secs(self.fetch.breaker_cooldown_secs)
    }
}
