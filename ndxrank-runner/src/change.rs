//! Change detection between a new snapshot and the last published one.
//!
//! Only the ranked sequence matters: symbol, rank and score per position.
//! Timestamps, counts and the underlying metrics are ignored, so a rerun
//! over unchanged market data is recognised as unchanged.

use ndxrank_core::RankedEntry;

use crate::artifacts::SnapshotDocument;

/// `true` unless `previous` exists and ranks the same symbols in the same
/// order with the same scores.
pub fn has_changed(new: &SnapshotDocument, previous: Option<&SnapshotDocument>) -> bool {
    let Some(previous) = previous else {
        return true;
    };
    !same_ranking(&new.rankings, &previous.rankings)
}

fn same_ranking(a: &[RankedEntry], b: &[RankedEntry]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(x, y)| x.symbol == y.symbol && x.rank == y.rank && x.score == y.score)
}

/// Hex BLAKE3 digest of the (symbol, rank, score) sequence.
pub fn ranking_hash(rankings: &[RankedEntry]) -> String {
    let mut hasher = blake3::Hasher::new();
    for entry in rankings {
        hasher.update(entry.symbol.as_bytes());
        hasher.update(&[0u8]);
        hasher.update(&entry.rank.to_le_bytes());
        hasher.update(&entry.score.to_bits().to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}
