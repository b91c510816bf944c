//! ndxrank runner: turns fetched quotes into published artifacts.
//!
//! This crate builds on `ndxrank-core` to provide:
//! - TOML run configuration
//! - Snapshot and history documents with retention
//! - Change detection against the last published snapshot
//! - Atomic publishing and corrupt-history quarantine
//! - The end-to-end pipeline used by the CLI

pub mod artifacts;
pub mod change;
pub mod config;
pub mod history;
pub mod pipeline;
pub mod publish;

pub use artifacts::{
    build, HistoryDocument, HistoryPolicy, HistoryRecord, Leader, SnapshotDocument, SCHEMA_VERSION,
    ULTRA_LEADERS,
};
pub use change::{has_changed, ranking_hash};
pub use config::{ConfigError, RankConfig, ScoringConfig};
pub use history::{quarantine_path, read_history, read_snapshot};
pub use pipeline::{run_pipeline, PipelineError, RunOptions, RunOutcome, RunStatus};
pub use publish::{publish, ArtifactPaths, OutputLayout, PublishError};
