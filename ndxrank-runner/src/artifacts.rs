//! Published JSON artifacts: the current snapshot and the rolling history.
//!
//! Both documents carry a `schema_version` so older files still deserialize
//! after a format bump.

use chrono::{DateTime, Utc};
use ndxrank_core::{ultra_leaders, RankedEntry, RunMode, Snapshot, UltraWeights, INDEX_NAME};
use serde::{Deserialize, Serialize};

use crate::change::ranking_hash;

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Entries in the short-term leader list.
pub const ULTRA_LEADERS: usize = 5;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Retention and condensation rules for the history document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryPolicy {
    /// Maximum records kept; the oldest are evicted first.
    pub retention: usize,
    /// Top entries copied into each record.
    pub leaders: usize,
}

impl Default for HistoryPolicy {
    fn default() -> Self {
        Self {
            retention: 90,
            leaders: 10,
        }
    }
}

/// The full ranked snapshot as written to `<prefix>_rankings.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDocument {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub index: String,
    pub generated_at: DateTime<Utc>,
    pub mode: RunMode,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub rankings: Vec<RankedEntry>,
    /// Best entries by short-term score, with that score and their place in
    /// that order.
    #[serde(default)]
    pub ultra_leaders: Vec<Leader>,
}

impl SnapshotDocument {
    pub fn new(snapshot: &Snapshot, ultra: &UltraWeights) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            index: INDEX_NAME.to_string(),
            generated_at: snapshot.generated_at,
            mode: snapshot.mode,
            total: snapshot.total,
            succeeded: snapshot.succeeded,
            failed: snapshot.failed,
            rankings: snapshot.rankings.clone(),
            ultra_leaders: ultra_leaders(&snapshot.rankings, ultra, ULTRA_LEADERS)
                .into_iter()
                .zip(1..)
                .map(|((entry, score), rank)| Leader {
                    rank,
                    symbol: entry.symbol.clone(),
                    score,
                })
                .collect(),
        }
    }

    pub fn leader_symbols(&self, n: usize) -> Vec<&str> {
        self.rankings.iter().take(n).map(|e| e.symbol.as_str()).collect()
    }

    pub fn ultra_symbols(&self) -> Vec<&str> {
        self.ultra_leaders.iter().map(|l| l.symbol.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leader {
    pub rank: u32,
    pub symbol: String,
    pub score: f64,
}

/// Condensed projection of one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub generated_at: DateTime<Utc>,
    pub mode: RunMode,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub leaders: Vec<Leader>,
    #[serde(default)]
    pub ultra_leaders: Vec<Leader>,
    /// BLAKE3 over the full (symbol, rank, score) sequence.
    pub ranking_hash: String,
}

impl HistoryRecord {
    pub fn from_snapshot(doc: &SnapshotDocument, leaders: usize) -> Self {
        Self {
            generated_at: doc.generated_at,
            mode: doc.mode,
            total: doc.total,
            succeeded: doc.succeeded,
            failed: doc.failed,
            leaders: doc
                .rankings
                .iter()
                .take(leaders)
                .map(|e| Leader {
                    rank: e.rank,
                    symbol: e.symbol.clone(),
                    score: e.score,
                })
                .collect(),
            ultra_leaders: doc.ultra_leaders.clone(),
            ranking_hash: ranking_hash(&doc.rankings),
        }
    }
}

/// `<prefix>_history.json`: records ordered oldest to newest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryDocument {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub entries: Vec<HistoryRecord>,
}

impl Default for HistoryDocument {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            entries: Vec::new(),
        }
    }
}

impl HistoryDocument {
    /// Append `record`, replacing any record with the same timestamp, then
    /// evict the oldest records beyond `retention`. The appended record is
    /// never evicted.
    pub fn append(&mut self, record: HistoryRecord, retention: usize) {
        let kept = match self
            .entries
            .iter()
            .position(|r| r.generated_at == record.generated_at)
        {
            Some(i) => {
                self.entries[i] = record;
                i
            }
            None => {
                self.entries.push(record);
                self.entries.len() - 1
            }
        };

        let mut excess = self.entries.len().saturating_sub(retention.max(1));
        let mut index = 0;
        self.entries.retain(|_| {
            let evict = excess > 0 && index != kept;
            if evict {
                excess -= 1;
            }
            index += 1;
            !evict
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fold the snapshot document into `previous` history.
pub fn build(
    doc: SnapshotDocument,
    mut previous: HistoryDocument,
    policy: &HistoryPolicy,
) -> (SnapshotDocument, HistoryDocument) {
    previous.schema_version = SCHEMA_VERSION;
    previous.append(HistoryRecord::from_snapshot(&doc, policy.leaders), policy.retention);
    (doc, previous)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use ndxrank_core::{PeriodReturns, QuoteMetrics};

    fn ts(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 3, 14, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn entry(rank: u32, symbol: &str, score: f64) -> RankedEntry {
        RankedEntry {
            rank,
            symbol: symbol.to_string(),
            name: None,
            score,
            metrics: QuoteMetrics {
                price: 1.0,
                volume: 1,
                avg_volume: 1.0,
                relative_volume: 1.0,
                change_pct: 0.0,
                returns: PeriodReturns {
                    one_month: 0.0,
                    three_month: 0.0,
                    six_month: 0.0,
                    twelve_month: 0.0,
                },
                as_of: ts(0),
            },
        }
    }

    fn doc(at: DateTime<Utc>) -> SnapshotDocument {
        SnapshotDocument::new(&snapshot(at), &UltraWeights::default())
    }

    fn snapshot(at: DateTime<Utc>) -> Snapshot {
        Snapshot {
            generated_at: at,
            mode: RunMode::Production,
            total: 3,
            succeeded: 2,
            failed: 1,
            rankings: vec![entry(1, "AAA", 9.5), entry(2, "BBB", 3.25)],
        }
    }

    #[test]
    fn snapshot_document_carries_metadata() {
        let (doc, _) = build(doc(ts(0)), HistoryDocument::default(), &HistoryPolicy::default());
        assert_eq!(doc.schema_version, SCHEMA_VERSION);
        assert_eq!(doc.index, "NASDAQ-100");
        assert_eq!(doc.total, 3);
        assert_eq!(doc.failed, 1);
        assert_eq!(doc.rankings.len(), 2);
    }

    #[test]
    fn history_record_is_condensed() {
        let policy = HistoryPolicy {
            retention: 5,
            leaders: 1,
        };
        let (_, history) = build(doc(ts(0)), HistoryDocument::default(), &policy);
        let record = history.entries.last().unwrap();
        assert_eq!(record.leaders.len(), 1);
        assert_eq!(record.leaders[0].symbol, "AAA");
        assert_eq!(record.ranking_hash.len(), 64);
    }

    #[test]
    fn retention_evicts_oldest() {
        let policy = HistoryPolicy {
            retention: 3,
            leaders: 10,
        };
        let mut history = HistoryDocument::default();
        for minute in 0..3 {
            history = build(doc(ts(minute)), history, &policy).1;
        }
        assert_eq!(history.len(), 3);

        history = build(doc(ts(3)), history, &policy).1;
        assert_eq!(history.len(), 3);
        assert_eq!(history.entries[0].generated_at, ts(1));
        assert_eq!(history.entries.last().unwrap().generated_at, ts(3));
    }

    #[test]
    fn same_timestamp_replaces_in_place() {
        let policy = HistoryPolicy::default();
        let (_, history) = build(doc(ts(0)), HistoryDocument::default(), &policy);
        let (_, history) = build(doc(ts(1)), history, &policy);

        let mut rerun = snapshot(ts(0));
        rerun.rankings.reverse();
        let rerun = SnapshotDocument::new(&rerun, &UltraWeights::default());
        let (_, history) = build(rerun, history, &policy);

        assert_eq!(history.len(), 2);
        assert_eq!(history.entries[0].generated_at, ts(0));
        assert_eq!(history.entries[0].leaders[0].symbol, "BBB");
    }

    #[test]
    fn zero_retention_still_keeps_the_new_record() {
        let mut history = HistoryDocument::default();
        history.append(HistoryRecord::from_snapshot(&doc(ts(0)), 10), 0);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn replaced_record_survives_eviction_in_the_same_append() {
        let mut history = HistoryDocument::default();
        for minute in 0..5 {
            let mut record = HistoryRecord::from_snapshot(&doc(ts(minute)), 10);
            record.total = 1;
            history.append(record, 100);
        }

        let mut rerun = HistoryRecord::from_snapshot(&doc(ts(0)), 10);
        rerun.total = 999;
        history.append(rerun, 3);

        assert_eq!(history.len(), 3);
        let totals: Vec<usize> = history.entries.iter().map(|r| r.total).collect();
        assert_eq!(totals, vec![999, 1, 1]);
        let times: Vec<_> = history.entries.iter().map(|r| r.generated_at).collect();
        assert_eq!(times, vec![ts(0), ts(3), ts(4)]);
    }

    #[test]
    fn ultra_leaders_are_carried_into_history() {
        let mut snap = snapshot(ts(0));
        snap.rankings[0].metrics.returns.one_month = 1.0;
        snap.rankings[1].metrics.returns.three_month = 10.0;
        let doc = SnapshotDocument::new(&snap, &UltraWeights::default());

        assert_eq!(doc.ultra_symbols(), vec!["BBB", "AAA"]);
        assert_eq!(doc.ultra_leaders[0].rank, 1);
        assert_eq!(doc.ultra_leaders[0].score, 6.0);
        assert_eq!(doc.ultra_leaders[1].score, 0.4);

        let (_, history) = build(doc.clone(), HistoryDocument::default(), &HistoryPolicy::default());
        assert_eq!(history.entries[0].ultra_leaders, doc.ultra_leaders);
    }

    #[test]
    fn documents_without_ultra_leaders_deserialize() {
        let mut value = serde_json::to_value(doc(ts(0))).unwrap();
        value.as_object_mut().unwrap().remove("ultra_leaders");
        let reread: SnapshotDocument = serde_json::from_value(value).unwrap();
        assert!(reread.ultra_leaders.is_empty());
    }

    #[test]
    fn history_without_schema_version_deserializes() {
        let history: HistoryDocument = serde_json::from_str(r#"{"entries":[]}"#).unwrap();
        assert_eq!(history.schema_version, SCHEMA_VERSION);
    }
}
