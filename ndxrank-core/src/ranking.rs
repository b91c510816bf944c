//! Ranking engine: composite momentum score, deterministic order, dense ranks.
//!
//! Pure function of the quotes it is given. Only `ok` quotes are ranked;
//! failed and stale quotes count towards `failed` and never receive a rank.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::data::metrics::round_dp;
use crate::domain::{Quote, QuoteMetrics, RunMode};

/// Decimal places kept in scores.
pub const SCORE_DECIMALS: i32 = 4;

/// Weights of the composite score.
///
/// Returns and `change_pct` are in percent; the volume term is the
/// relative-volume excess `(relative_volume - 1) * 100`, also in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub twelve_month: f64,
    pub six_month: f64,
    pub three_month: f64,
    pub one_month: f64,
    pub daily_change: f64,
    pub relative_volume: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            twelve_month: 0.35,
            six_month: 0.25,
            three_month: 0.20,
            one_month: 0.10,
            daily_change: 0.05,
            relative_volume: 0.05,
        }
    }
}

impl ScoreWeights {
    pub fn score(&self, m: &QuoteMetrics) -> f64 {
        let raw = self.twelve_month * m.returns.twelve_month
            + self.six_month * m.returns.six_month
            + self.three_month * m.returns.three_month
            + self.one_month * m.returns.one_month
            + self.daily_change * m.change_pct
            + self.relative_volume * (m.relative_volume - 1.0) * 100.0;
        rounded(raw)
    }

    pub fn is_finite(&self) -> bool {
        [
            self.twelve_month,
            self.six_month,
            self.three_month,
            self.one_month,
            self.daily_change,
            self.relative_volume,
        ]
        .iter()
        .all(|w| w.is_finite())
    }
}

/// Weights of the short-term ("ultra") score behind the secondary leader
/// list: recent momentum only, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UltraWeights {
    pub three_month: f64,
    pub one_month: f64,
}

impl Default for UltraWeights {
    fn default() -> Self {
        Self {
            three_month: 0.6,
            one_month: 0.4,
        }
    }
}

impl UltraWeights {
    pub fn score(&self, m: &QuoteMetrics) -> f64 {
        rounded(self.three_month * m.returns.three_month + self.one_month * m.returns.one_month)
    }

    pub fn is_finite(&self) -> bool {
        self.three_month.is_finite() && self.one_month.is_finite()
    }
}

fn rounded(raw: f64) -> f64 {
    let score = round_dp(raw, SCORE_DECIMALS);
    // -0.0 would sort below 0.0 under total_cmp
    if score == 0.0 {
        0.0
    } else {
        score
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub rank: u32,
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub score: f64,
    pub metrics: QuoteMetrics,
}

/// The complete ranked output of one run. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub generated_at: DateTime<Utc>,
    pub mode: RunMode,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub rankings: Vec<RankedEntry>,
}

impl Snapshot {
    /// No ticker could be ranked.
    pub fn is_empty(&self) -> bool {
        self.rankings.is_empty()
    }
}

/// Descending score, then ascending symbol.
fn score_order(a: (f64, &str), b: (f64, &str)) -> Ordering {
    b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1))
}

fn entry_order(a: &RankedEntry, b: &RankedEntry) -> Ordering {
    score_order((a.score, a.symbol.as_str()), (b.score, b.symbol.as_str()))
}

/// The `n` best ranked entries by short-term score, with that score, best
/// first. Ties break on symbol like the main ranking.
pub fn ultra_leaders<'a>(
    entries: &'a [RankedEntry],
    weights: &UltraWeights,
    n: usize,
) -> Vec<(&'a RankedEntry, f64)> {
    let mut scored: Vec<_> = entries
        .iter()
        .map(|e| (e, weights.score(&e.metrics)))
        .filter(|(_, score)| score.is_finite())
        .collect();
    scored.sort_by(|(a, sa), (b, sb)| score_order((*sa, a.symbol.as_str()), (*sb, b.symbol.as_str())));
    scored.truncate(n);
    scored
}

/// Rank `quotes` into a snapshot stamped with `generated_at` (truncated to
/// whole seconds) and `mode`.
///
/// The result depends only on the set of quotes, not on their order.
pub fn rank<'a, I>(quotes: I, weights: &ScoreWeights, generated_at: DateTime<Utc>, mode: RunMode) -> Snapshot
where
    I: IntoIterator<Item = &'a Quote>,
{
    let mut total = 0;
    let mut entries = Vec::new();

    for quote in quotes {
        total += 1;
        if !quote.is_ok() {
            continue;
        }
        let Some(metrics) = &quote.metrics else {
            tracing::warn!(symbol = quote.symbol(), "ok quote without metrics, skipping");
            continue;
        };
        let score = weights.score(metrics);
        if !score.is_finite() {
            tracing::warn!(symbol = quote.symbol(), "non-finite score, skipping");
            continue;
        }
        entries.push(RankedEntry {
            rank: 0,
            symbol: quote.ticker.symbol.clone(),
            name: quote.ticker.name.clone(),
            score,
            metrics: metrics.clone(),
        });
    }

    entries.sort_by(entry_order);
    for (i, entry) in entries.iter_mut().enumerate() {
        entry.rank = i as u32 + 1;
    }

    let succeeded = entries.len();
    Snapshot {
        generated_at: generated_at.trunc_subsecs(0),
        mode,
        total,
        succeeded,
        failed: total - succeeded,
        rankings: entries,
    }
}
