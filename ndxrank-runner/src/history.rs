//! Reading previously published artifacts.
//!
//! Neither read is ever fatal. A missing file means "first run"; a
//! malformed history file is quarantined to `{file}.corrupt` so the next
//! publish starts a fresh history without destroying the evidence.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::artifacts::{HistoryDocument, SnapshotDocument};
use crate::publish::sibling;

/// Where a corrupt history file is moved.
pub fn quarantine_path(path: &Path) -> PathBuf {
    sibling(path, ".corrupt")
}

/// Load the history at `path`, or an empty history.
pub fn read_history(path: &Path) -> HistoryDocument {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "no previous history, starting fresh");
            return HistoryDocument::default();
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "history unreadable, starting fresh");
            return HistoryDocument::default();
        }
    };

    match serde_json::from_str::<HistoryDocument>(&content) {
        Ok(history) => {
            tracing::debug!(path = %path.display(), records = history.len(), "history loaded");
            history
        }
        Err(e) => {
            let quarantine = quarantine_path(path);
            tracing::warn!(
                path = %path.display(),
                quarantine = %quarantine.display(),
                error = %e,
                "quarantining corrupt history file"
            );
            if let Err(rename_err) = fs::rename(path, &quarantine) {
                tracing::warn!(error = %rename_err, "failed to quarantine history file");
            }
            HistoryDocument::default()
        }
    }
}

/// Load the last published snapshot, if there is a usable one.
pub fn read_snapshot(path: &Path) -> Option<SnapshotDocument> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "previous snapshot unreadable");
            return None;
        }
    };
    match serde_json::from_str(&content) {
        Ok(doc) => Some(doc),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "previous snapshot malformed, ignoring");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_history_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let history = read_history(&dir.path().join("none.json"));
        assert!(history.is_empty());
    }

    #[test]
    fn corrupt_history_is_quarantined() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nasdaq100_history.json");
        fs::write(&path, "{ not json").unwrap();

        let history = read_history(&path);

        assert!(history.is_empty());
        assert!(!path.exists());
        let quarantined = quarantine_path(&path);
        assert_eq!(fs::read_to_string(quarantined).unwrap(), "{ not json");
    }

    #[test]
    fn valid_history_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h.json");
        fs::write(&path, r#"{"schema_version":1,"entries":[]}"#).unwrap();
        let history = read_history(&path);
        assert_eq!(history.schema_version, 1);
        assert!(path.exists());
    }

    #[test]
    fn malformed_snapshot_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");
        assert!(read_snapshot(&path).is_none());
        fs::write(&path, "[]").unwrap();
        assert!(read_snapshot(&path).is_none());
        // malformed snapshots are left in place
        assert!(path.exists());
    }
}
