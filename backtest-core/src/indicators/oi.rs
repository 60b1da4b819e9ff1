//! Open interest indicators: the level at each bar, its bar-over-bar change,
//! and its change over an arbitrary lookback. Same nearest-preceding-
//! timestamp alignment as `indicators::funding`.

use crate::domain::{Candle, OpenInterest};

fn align_to_candles(candles: &[Candle], snapshots: &[OpenInterest]) -> Vec<f64> {
    let mut result = vec![f64::NAN; candles.len()];
    if snapshots.is_empty() {
        return result;
    }
    let mut idx = 0;
    for (i, candle) in candles.iter().enumerate() {
        while idx + 1 < snapshots.len() && snapshots[idx + 1].timestamp <= candle.timestamp {
            idx += 1;
        }
        if snapshots[idx].timestamp <= candle.timestamp {
            result[i] = snapshots[idx].open_interest;
        }
    }
    result
}

/// The open interest level in effect at each bar.
pub fn oi(candles: &[Candle], snapshots: &[OpenInterest]) -> Vec<f64> {
    align_to_candles(candles, snapshots)
}

/// Bar-over-bar change in open interest.
pub fn oi_change(candles: &[Candle], snapshots: &[OpenInterest]) -> Vec<f64> {
    oi_delta(candles, snapshots, 1)
}

/// Change in open interest over `period` bars.
pub fn oi_delta(candles: &[Candle], snapshots: &[OpenInterest], period: usize) -> Vec<f64> {
    let levels = align_to_candles(candles, snapshots);
    let n = levels.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 {
        return result;
    }
    for i in period..n {
        if levels[i].is_nan() || levels[i - period].is_nan() {
            continue;
        }
        result[i] = levels[i] - levels[i - period];
    }
    result
}
