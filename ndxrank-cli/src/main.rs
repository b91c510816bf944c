//! ndxrank CLI: rank the NASDAQ-100 and publish JSON artifacts.
//!
//! Commands:
//! - `run`: fetch, rank and publish (unless the ranking is unchanged)
//! - `catalog`: print the tickers a run would fetch
//! - `diff`: compare two snapshot files
//!
//! Exit codes: 0 published or unchanged, 1 error, 2 no ticker could be
//! ranked, 3 `diff` found no change.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{ArgAction, Parser, Subcommand};
use ndxrank_core::data::{CircuitBreaker, QuoteProvider, SyntheticProvider, TracingProgress, YahooProvider};
use ndxrank_core::RunMode;
use ndxrank_runner::{has_changed, run_pipeline, RankConfig, RunOptions, RunOutcome, SnapshotDocument};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Exit code of `diff` when the snapshots rank identically.
const EXIT_UNCHANGED: u8 = 3;

/// Leaders listed in the orchestrator outputs.
const OUTPUT_LEADERS: usize = 10;

#[derive(Parser)]
#[command(name = "ndxrank", about = "NASDAQ-100 momentum ranking publisher", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch quotes, rank them and publish the snapshot and history.
    Run {
        /// Test mode: fetch a small subset and write the *_test artifacts.
        #[arg(
            long,
            env = "NDXRANK_TEST_MODE",
            action = ArgAction::SetTrue,
            value_parser = clap::builder::BoolishValueParser::new()
        )]
        test: bool,

        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output directory (overrides `[output] dir`).
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Use deterministic synthetic data instead of Yahoo Finance.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Publish even if the ranking is unchanged.
        #[arg(long, default_value_t = false)]
        force: bool,

        /// Append key=value run outputs to this file (for the scheduler).
        #[arg(long, env = "NDXRANK_OUTPUTS_FILE")]
        outputs_file: Option<PathBuf>,
    },
    /// Print the tickers a run would fetch.
    Catalog {
        #[arg(
            long,
            env = "NDXRANK_TEST_MODE",
            action = ArgAction::SetTrue,
            value_parser = clap::builder::BoolishValueParser::new()
        )]
        test: bool,

        /// Path to a TOML config file (for a `[catalog]` override).
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Compare two snapshot files. Exits 0 if changed, 3 if unchanged.
    Diff {
        /// Newly built snapshot.
        new: PathBuf,
        /// Previously published snapshot. Omitted means "changed".
        previous: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            test,
            config,
            output_dir,
            synthetic,
            force,
            outputs_file,
        } => run_cmd(
            RunMode::from_test_flag(test),
            config.as_deref(),
            output_dir,
            synthetic,
            force,
            outputs_file.as_deref(),
        ),
        Commands::Catalog { test, config } => {
            catalog_cmd(RunMode::from_test_flag(test), config.as_deref()).map(|()| 0)
        }
        Commands::Diff { new, previous } => diff_cmd(&new, previous.as_deref()),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<RankConfig> {
    match path {
        Some(path) => RankConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(RankConfig::default()),
    }
}

fn run_cmd(
    mode: RunMode,
    config_path: Option<&Path>,
    output_dir: Option<PathBuf>,
    synthetic: bool,
    force: bool,
    outputs_file: Option<&Path>,
) -> Result<u8> {
    let mut config = load_config(config_path)?;
    if let Some(dir) = output_dir {
        config.output.dir = dir;
    }

    let provider: Box<dyn QuoteProvider> = if synthetic {
        Box::new(SyntheticProvider::new(config.fetch.synthetic_seed))
    } else {
        let breaker = Arc::new(CircuitBreaker::new(
            config.breaker_cooldown(),
            config.fetch.breaker_threshold,
        ));
        Box::new(YahooProvider::new(breaker, config.request_timeout())?)
    };

    let options = RunOptions {
        mode,
        force,
        generated_at: Utc::now(),
    };
    let outcome = run_pipeline(&config, provider.as_ref(), &TracingProgress, options)?;

    print_summary(&outcome);
    if let Some(path) = outputs_file {
        write_outputs(path, &outcome)
            .with_context(|| format!("writing outputs file {}", path.display()))?;
    }
    Ok(outcome.status.exit_code())
}

fn print_summary(outcome: &RunOutcome) {
    let doc = &outcome.snapshot;
    println!(
        "{} [{}] {}: {}/{} ranked, {} failed ({:.1}s)",
        doc.index,
        doc.mode,
        outcome.status.as_str(),
        doc.succeeded,
        doc.total,
        doc.failed,
        outcome.elapsed.as_secs_f64()
    );
    for entry in doc.rankings.iter().take(OUTPUT_LEADERS) {
        println!("  {:>3}. {:<6} {:>10.4}", entry.rank, entry.symbol, entry.score);
    }
    if !doc.ultra_leaders.is_empty() {
        println!("Short-term: {}", doc.ultra_symbols().join(", "));
    }
    if let Some(paths) = &outcome.paths {
        println!("Snapshot: {}", paths.snapshot.display());
        println!("History:  {}", paths.history.display());
    }
}

/// Lines appended to the scheduler's outputs file.
fn output_lines(outcome: &RunOutcome) -> Vec<String> {
    let doc = &outcome.snapshot;
    vec![
        format!("changed={}", outcome.changed()),
        format!("status={}", outcome.status.as_str()),
        format!("total={}", doc.total),
        format!("succeeded={}", doc.succeeded),
        format!("failed={}", doc.failed),
        format!("leaders={}", doc.leader_symbols(OUTPUT_LEADERS).join(",")),
        format!("ultra_leaders={}", doc.ultra_symbols().join(",")),
        format!("elapsed_secs={:.1}", outcome.elapsed.as_secs_f64()),
    ]
}

fn write_outputs(path: &Path, outcome: &RunOutcome) -> Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    for line in output_lines(outcome) {
        writeln!(file, "{line}")?;
    }
    Ok(())
}

fn catalog_cmd(mode: RunMode, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    for ticker in config.catalog()?.list(mode) {
        match ticker.name {
            Some(name) => println!("{}\t{name}", ticker.symbol),
            None => println!("{}", ticker.symbol),
        }
    }
    Ok(())
}

fn read_snapshot_file(path: &Path) -> Result<SnapshotDocument> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

fn diff_cmd(new: &Path, previous: Option<&Path>) -> Result<u8> {
    let new = read_snapshot_file(new)?;
    let previous = previous.map(read_snapshot_file).transpose()?;
    if has_changed(&new, previous.as_ref()) {
        println!("changed");
        Ok(0)
    } else {
        println!("unchanged");
        Ok(EXIT_UNCHANGED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ndxrank_core::{FetchSummary, RankedEntry};
    use ndxrank_runner::{Leader, RunStatus};
    use std::time::Duration;

    fn outcome(status: RunStatus, symbols: &[&str]) -> RunOutcome {
        let rankings = symbols
            .iter()
            .enumerate()
            .map(|(i, s)| {
                serde_json::from_value(serde_json::json!({
                    "rank": i + 1,
                    "symbol": s,
                    "score": 1.0,
                    "metrics": {
                        "price": 1.0, "volume": 1, "avg_volume": 1.0,
                        "relative_volume": 1.0, "change_pct": 0.0,
                        "returns": {"1m": 0.0, "3m": 0.0, "6m": 0.0, "12m": 0.0},
                        "as_of": "2025-01-02T21:00:00Z"
                    }
                }))
                .unwrap()
            })
            .collect::<Vec<RankedEntry>>();
        RunOutcome {
            status,
            snapshot: SnapshotDocument {
                schema_version: 1,
                index: "NASDAQ-100".into(),
                generated_at: Utc.with_ymd_and_hms(2025, 1, 3, 6, 0, 0).unwrap(),
                mode: RunMode::Production,
                total: 3,
                succeeded: rankings.len(),
                failed: 3 - rankings.len(),
                ultra_leaders: symbols
                    .iter()
                    .rev()
                    .zip(1..)
                    .map(|(s, rank)| Leader {
                        rank,
                        symbol: s.to_string(),
                        score: 1.0,
                    })
                    .collect(),
                rankings,
            },
            fetch: FetchSummary::default(),
            paths: None,
            elapsed: Duration::from_millis(12_340),
        }
    }

    #[test]
    fn cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "ndxrank",
            "run",
            "--test",
            "--synthetic",
            "--output-dir",
            "out",
        ])
        .unwrap();
        match cli.command {
            Commands::Run {
                test,
                synthetic,
                force,
                output_dir,
                ..
            } => {
                assert!(test);
                assert!(synthetic);
                assert!(!force);
                assert_eq!(output_dir, Some(PathBuf::from("out")));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn outputs_for_published_run() {
        let lines = output_lines(&outcome(RunStatus::Published, &["NVDA", "AAPL"]));
        assert_eq!(
            lines,
            vec![
                "changed=true",
                "status=published",
                "total=3",
                "succeeded=2",
                "failed=1",
                "leaders=NVDA,AAPL",
                "ultra_leaders=AAPL,NVDA",
                "elapsed_secs=12.3",
            ]
        );
    }

    #[test]
    fn outputs_for_exhausted_run() {
        let lines = output_lines(&outcome(RunStatus::Exhausted, &[]));
        assert_eq!(lines[0], "changed=false");
        assert_eq!(lines[5], "leaders=");
        assert_eq!(lines[6], "ultra_leaders=");
    }

    #[test]
    fn outputs_file_is_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outputs");
        std::fs::write(&path, "existing=1\n").unwrap();

        write_outputs(&path, &outcome(RunStatus::Unchanged, &["MSFT"])).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("existing=1\n"));
        assert!(content.contains("status=unchanged\n"));
    }

    #[test]
    fn diff_exit_codes() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.json");
        let b = dir.path().join("b.json");
        let doc_a = outcome(RunStatus::Published, &["AAA", "BBB"]).snapshot;
        let doc_b = outcome(RunStatus::Published, &["BBB", "AAA"]).snapshot;
        std::fs::write(&a, serde_json::to_string(&doc_a).unwrap()).unwrap();
        std::fs::write(&b, serde_json::to_string(&doc_b).unwrap()).unwrap();

        assert_eq!(diff_cmd(&a, Some(&a)).unwrap(), EXIT_UNCHANGED);
        assert_eq!(diff_cmd(&a, Some(&b)).unwrap(), 0);
        assert_eq!(diff_cmd(&a, None).unwrap(), 0);
        assert!(diff_cmd(&dir.path().join("missing.json"), None).is_err());
    }
}
