//! End-to-end run: catalog, fetch, rank, build, detect change, publish.

use chrono::{DateTime, Utc};
use ndxrank_core::data::{FetchProgress, QuoteProvider};
use ndxrank_core::{rank, FetchSummary, QuoteFetcher, RunMode};
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::artifacts::{build, SnapshotDocument};
use crate::change::has_changed;
use crate::config::{ConfigError, RankConfig};
use crate::history::{read_history, read_snapshot};
use crate::publish::{publish, ArtifactPaths, OutputLayout, PublishError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("publish error: {0}")]
    Publish(#[from] PublishError),
}

/// Per-invocation switches.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub mode: RunMode,
    /// Publish even when the ranking is unchanged.
    pub force: bool,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// New artifacts were written.
    Published,
    /// The ranking matches the last published one; nothing written.
    Unchanged,
    /// No ticker could be ranked; nothing written.
    Exhausted,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Published => "published",
            Self::Unchanged => "unchanged",
            Self::Exhausted => "exhausted",
        }
    }

    /// Process exit code for this outcome. Partial success is success.
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Published | Self::Unchanged => 0,
            Self::Exhausted => 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub snapshot: SnapshotDocument,
    pub fetch: FetchSummary,
    /// Set only when artifacts were written.
    pub paths: Option<ArtifactPaths>,
    /// Wall-clock time of the whole run.
    pub elapsed: Duration,
}

impl RunOutcome {
    pub fn changed(&self) -> bool {
        self.status == RunStatus::Published
    }
}

pub fn run_pipeline(
    config: &RankConfig,
    provider: &dyn QuoteProvider,
    progress: &dyn FetchProgress,
    options: RunOptions,
) -> Result<RunOutcome, PipelineError> {
    let started = Instant::now();
    config.validate()?;
    let mode = options.mode;
    let catalog = config.catalog()?;
    if mode == RunMode::Test && !catalog.test_subset_is_partial() {
        tracing::warn!(
            symbols = catalog.len(),
            "catalog is no larger than the test subset, test mode fetches every symbol"
        );
    }
    let tickers = catalog.list(mode);
    tracing::info!(%mode, tickers = tickers.len(), provider = provider.name(), "starting run");

    let fetcher = QuoteFetcher::new(provider, config.fetch_policy(), progress);
    let report = fetcher.fetch_at(&tickers, options.generated_at);

    let snapshot = rank(
        report.quotes.values(),
        &config.scoring.composite,
        options.generated_at,
        mode,
    );
    let candidate = SnapshotDocument::new(&snapshot, &config.scoring.ultra);

    if snapshot.is_empty() {
        tracing::warn!(
            total = snapshot.total,
            "no ticker could be ranked, not publishing"
        );
        return Ok(RunOutcome {
            status: RunStatus::Exhausted,
            snapshot: candidate,
            fetch: report.summary,
            paths: None,
            elapsed: started.elapsed(),
        });
    }

    let layout = OutputLayout::new(&config.output.dir, mode);
    let previous = read_snapshot(&layout.snapshot_path());
    if !has_changed(&candidate, previous.as_ref()) && !options.force {
        tracing::info!("ranking unchanged since last publish, nothing written");
        return Ok(RunOutcome {
            status: RunStatus::Unchanged,
            snapshot: candidate,
            fetch: report.summary,
            paths: None,
            elapsed: started.elapsed(),
        });
    }

    let history = read_history(&layout.history_path());
    let (doc, history) = build(candidate, history, &config.history_policy());
    let paths = publish(&layout, &doc, &history)?;
    tracing::info!(
        succeeded = doc.succeeded,
        failed = doc.failed,
        history_records = history.len(),
        "run published"
    );

    Ok(RunOutcome {
        status: RunStatus::Published,
        snapshot: doc,
        fetch: report.summary,
        paths: Some(paths),
        elapsed: started.elapsed(),
    })
}
