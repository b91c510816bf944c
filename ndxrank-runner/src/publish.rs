//! Output layout and atomic artifact writes.
//!
//! Layout: `{output_dir}/{prefix}_rankings.json` and
//! `{output_dir}/{prefix}_history.json`, prefix `nasdaq100` or
//! `nasdaq100_test`. Writes go to `{file}.tmp` and are renamed into place,
//! so readers never observe a half-written artifact. A publish stages both
//! files before renaming either, and renames the snapshot last: it is what
//! the next run compares against, so it must not land without its history.

use ndxrank_core::RunMode;
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::artifacts::{HistoryDocument, SnapshotDocument};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to serialize {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where a run's artifacts live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    dir: PathBuf,
    prefix: &'static str,
}

impl OutputLayout {
    pub fn new(dir: impl Into<PathBuf>, mode: RunMode) -> Self {
        let prefix = match mode {
            RunMode::Production => "nasdaq100",
            RunMode::Test => "nasdaq100_test",
        };
        Self {
            dir: dir.into(),
            prefix,
        }
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(format!("{}_rankings.json", self.prefix))
    }

    pub fn history_path(&self) -> PathBuf {
        self.dir.join(format!("{}_history.json", self.prefix))
    }
}

/// Paths written by a successful publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub snapshot: PathBuf,
    pub history: PathBuf,
}

/// `path` with `suffix` appended to the file name (`a.json` -> `a.json.tmp`).
pub(crate) fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// A serialized artifact written to `{path}.tmp`, not yet visible at `path`.
#[derive(Debug)]
struct Staged {
    tmp: PathBuf,
    path: PathBuf,
}

impl Staged {
    fn write<T: Serialize>(path: &Path, value: &T) -> Result<Self, PublishError> {
        let mut json =
            serde_json::to_string_pretty(value).map_err(|source| PublishError::Serialize {
                path: path.to_path_buf(),
                source,
            })?;
        json.push('\n');

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| PublishError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let tmp = sibling(path, ".tmp");
        if let Err(source) = fs::write(&tmp, json) {
            let _ = fs::remove_file(&tmp);
            return Err(PublishError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
        Ok(Self {
            tmp,
            path: path.to_path_buf(),
        })
    }

    /// Rename into place; the temp file is removed if that fails.
    fn commit(self) -> Result<(), PublishError> {
        fs::rename(&self.tmp, &self.path).map_err(|source| {
            let _ = fs::remove_file(&self.tmp);
            PublishError::Io {
                path: self.path.clone(),
                source,
            }
        })
    }

    fn discard(self) {
        let _ = fs::remove_file(&self.tmp);
    }
}

/// Write the history, then the snapshot. On error neither temp file is left
/// behind and the snapshot is untouched.
pub fn publish(
    layout: &OutputLayout,
    snapshot: &SnapshotDocument,
    history: &HistoryDocument,
) -> Result<ArtifactPaths, PublishError> {
    let paths = ArtifactPaths {
        snapshot: layout.snapshot_path(),
        history: layout.history_path(),
    };

    let staged_history = Staged::write(&paths.history, history)?;
    let staged_snapshot = match Staged::write(&paths.snapshot, snapshot) {
        Ok(staged) => staged,
        Err(e) => {
            staged_history.discard();
            return Err(e);
        }
    };
    if let Err(e) = staged_history.commit() {
        staged_snapshot.discard();
        return Err(e);
    }
    staged_snapshot.commit()?;

    tracing::info!(
        snapshot = %paths.snapshot.display(),
        history = %paths.history.display(),
        "artifacts published"
    );
    Ok(paths)
}
