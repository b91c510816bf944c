//! Derivation of scoring metrics from daily bars.
//!
//! Pure function of the bar series, so providers only have to deliver bars and
//! the fetcher, the synthetic provider and tests all share one definition.

use super::provider::{DailyBar, FetchError};
use crate::domain::{PeriodReturns, QuoteMetrics};

pub const SESSIONS_1M: usize = 21;
pub const SESSIONS_3M: usize = 63;
pub const SESSIONS_6M: usize = 126;
pub const SESSIONS_12M: usize = 252;

/// Sessions averaged for the volume baseline (excluding the latest session).
pub const VOLUME_BASELINE_SESSIONS: usize = 20;

/// A 12-month return needs the latest bar plus 252 prior sessions.
pub const MIN_SESSIONS: usize = SESSIONS_12M + 1;

/// Round to `dp` decimal places.
pub fn round_dp(value: f64, dp: i32) -> f64 {
    let factor = 10f64.powi(dp);
    (value * factor).round() / factor
}

/// Compute metrics from daily bars (any order; unusable closes are skipped).
pub fn metrics_from_bars(symbol: &str, bars: &[DailyBar]) -> Result<QuoteMetrics, FetchError> {
    let mut usable: Vec<&DailyBar> = bars
        .iter()
        .filter(|b| b.close.is_finite() && b.close > 0.0)
        .collect();
    usable.sort_by_key(|b| b.timestamp);

    let n = usable.len();
    if n < MIN_SESSIONS {
        return Err(FetchError::InsufficientHistory {
            symbol: symbol.to_string(),
            sessions: n,
            required: MIN_SESSIONS,
        });
    }

    let last = usable[n - 1];
    let pct_since = |sessions: usize| (last.close / usable[n - 1 - sessions].close - 1.0) * 100.0;

    let baseline = &usable[n - 1 - VOLUME_BASELINE_SESSIONS..n - 1];
    let avg_volume = baseline.iter().map(|b| b.volume as f64).sum::<f64>() / baseline.len() as f64;
    let relative_volume = if avg_volume > 0.0 {
        last.volume as f64 / avg_volume
    } else {
        1.0
    };

    Ok(QuoteMetrics {
        price: round_dp(last.close, 4),
        volume: last.volume,
        avg_volume: round_dp(avg_volume, 2),
        relative_volume: round_dp(relative_volume, 4),
        change_pct: round_dp(pct_since(1), 4),
        returns: PeriodReturns {
            one_month: round_dp(pct_since(SESSIONS_1M), 4),
            three_month: round_dp(pct_since(SESSIONS_3M), 4),
            six_month: round_dp(pct_since(SESSIONS_6M), 4),
            twelve_month: round_dp(pct_since(SESSIONS_12M), 4),
        },
        as_of: last.timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn bars_from_closes(closes: &[f64], volume: u64) -> Vec<DailyBar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 21, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| DailyBar {
                timestamp: start + Duration::days(i as i64),
                close,
                volume,
            })
            .collect()
    }

    #[test]
    fn too_few_sessions_is_insufficient_history() {
        let bars = bars_from_closes(&vec![100.0; MIN_SESSIONS - 1], 1_000);
        let err = metrics_from_bars("AAA", &bars).unwrap_err();
        assert!(matches!(
            err,
            FetchError::InsufficientHistory { sessions, .. } if sessions == MIN_SESSIONS - 1
        ));
    }

    #[test]
    fn returns_measure_trailing_windows() {
        // Linear ramp 100, 101, ..., so every window is easy to check by hand.
        let closes: Vec<f64> = (0..300).map(|i| 100.0 + i as f64).collect();
        let bars = bars_from_closes(&closes, 1_000);
        let m = metrics_from_bars("AAA", &bars).unwrap();

        let last = 399.0;
        assert_eq!(m.price, last);
        assert_eq!(m.change_pct, round_dp((last / 398.0 - 1.0) * 100.0, 4));
        assert_eq!(m.returns.one_month, round_dp((last / 378.0 - 1.0) * 100.0, 4));
        assert_eq!(m.returns.twelve_month, round_dp((last / 147.0 - 1.0) * 100.0, 4));
        assert_eq!(m.relative_volume, 1.0);
    }

    #[test]
    fn unusable_closes_are_skipped_and_order_is_restored() {
        let closes: Vec<f64> = (0..MIN_SESSIONS).map(|i| 50.0 + i as f64).collect();
        let mut bars = bars_from_closes(&closes, 500);
        bars.push(DailyBar {
            timestamp: bars[0].timestamp - Duration::days(1),
            close: f64::NAN,
            volume: 0,
        });
        bars.reverse();

        let m = metrics_from_bars("AAA", &bars).unwrap();
        assert_eq!(m.price, 50.0 + (MIN_SESSIONS - 1) as f64);
        // bars[0] is the NaN bar after the reverse
        assert_eq!(m.as_of, bars[1].timestamp);
    }

    #[test]
    fn relative_volume_against_baseline() {
        let closes = vec![10.0; MIN_SESSIONS];
        let mut bars = bars_from_closes(&closes, 1_000);
        if let Some(last) = bars.last_mut() {
            last.volume = 3_000;
        }
        let m = metrics_from_bars("AAA", &bars).unwrap();
        assert_eq!(m.avg_volume, 1_000.0);
        assert_eq!(m.relative_volume, 3.0);
        assert_eq!(m.change_pct, 0.0);
    }

    #[test]
    fn round_dp_rounds_half_away_from_zero() {
        assert_eq!(round_dp(1.23456, 4), 1.2346);
        assert_eq!(round_dp(-1.23456, 2), -1.23);
    }
}
