//! Property tests for history retention and deduplication.

use chrono::{DateTime, Duration, TimeZone, Utc};
use ndxrank_core::RunMode;
use ndxrank_runner::{HistoryDocument, HistoryRecord};
use proptest::prelude::*;
use std::collections::HashSet;

fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap() + Duration::minutes(i64::from(minute))
}

fn record(minute: u32, total: usize) -> HistoryRecord {
    HistoryRecord {
        generated_at: at(minute),
        mode: RunMode::Production,
        total,
        succeeded: total,
        failed: 0,
        leaders: Vec::new(),
        ultra_leaders: Vec::new(),
        ranking_hash: String::new(),
    }
}

proptest! {
    /// Strictly increasing timestamps: the history keeps exactly the newest
    /// `retention` records, in order.
    #[test]
    fn retention_keeps_newest(n in 0u32..40, retention in 1usize..15) {
        let mut history = HistoryDocument::default();
        for minute in 0..n {
            history.append(record(minute, 1), retention);
            prop_assert!(history.len() <= retention);
        }
        prop_assert_eq!(history.len(), (n as usize).min(retention));
        if n > 0 {
            prop_assert_eq!(history.entries.last().unwrap().generated_at, at(n - 1));
        }
        for pair in history.entries.windows(2) {
            prop_assert!(pair[0].generated_at < pair[1].generated_at);
        }
    }

    /// Arbitrary (possibly repeated) timestamps never produce duplicates,
    /// and the last write for a timestamp wins.
    #[test]
    fn timestamps_stay_unique(minutes in prop::collection::vec(0u32..8, 0..30)) {
        let mut history = HistoryDocument::default();
        for (i, minute) in minutes.iter().enumerate() {
            history.append(record(*minute, i), 100);
        }
        let unique: HashSet<_> = history.entries.iter().map(|r| r.generated_at).collect();
        prop_assert_eq!(unique.len(), history.len());

        for r in &history.entries {
            let last_write = minutes
                .iter()
                .rposition(|m| at(*m) == r.generated_at)
                .unwrap();
            prop_assert_eq!(r.total, last_write);
        }
    }

    /// Rewriting any existing timestamp under a tighter retention keeps the
    /// rewritten record.
    #[test]
    fn rewritten_record_is_never_evicted(
        n in 1u32..20,
        pick in any::<prop::sample::Index>(),
        retention in 1usize..10,
    ) {
        let mut history = HistoryDocument::default();
        for minute in 0..n {
            history.append(record(minute, 0), 100);
        }
        let minute = pick.index(n as usize) as u32;
        history.append(record(minute, 7), retention);

        prop_assert!(history.len() <= retention);
        prop_assert!(history.entries.iter().any(|r| r.generated_at == at(minute) && r.total == 7));
        for pair in history.entries.windows(2) {
            prop_assert!(pair[0].generated_at < pair[1].generated_at);
        }
    }
}
