//! Average True Range — Wilder-smoothed true range.
//!
//! `TR[t] = max(high-low, |high-prev_close|, |low-prev_close|)`; `TR[0]` has
//! no previous close and is excluded from the Wilder seed window, so the
//! first valid ATR lands at index `period` (lookback = `period`).
//! Grounded on the teacher's `indicators::atr::Atr`.

use crate::domain::Candle;

pub fn true_range(candles: &[Candle]) -> Vec<f64> {
    let n = candles.len();
    let mut tr = vec![f64::NAN; n];
    if n == 0 {
        return tr;
    }
    for i in 1..n {
        let (h, l, pc) = (candles[i].high, candles[i].low, candles[i - 1].close);
        tr[i] = if h.is_nan() || l.is_nan() || pc.is_nan() {
            f64::NAN
        } else {
            (h - l).max((h - pc).abs()).max((l - pc).abs())
        };
    }
    tr
}

/// Wilder smoothing: `alpha = 1/period`, seeded by the mean of the first
/// `period` valid values encountered.
pub fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }

    let seed_start = (0..n).find(|&i| {
        i + period <= n && values[i..i + period].iter().all(|v| !v.is_nan())
    });
    let Some(seed_start) = seed_start else {
        return result;
    };
    let seed_end = seed_start + period;
    let seed = values[seed_start..seed_end].iter().sum::<f64>() / period as f64;
    result[seed_end - 1] = seed;

    let alpha = 1.0 / period as f64;
    let mut prev = seed;
    for i in seed_end..n {
        if values[i].is_nan() {
            break;
        }
        let smoothed = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = smoothed;
        prev = smoothed;
    }
    result
}

pub fn atr(candles: &[Candle], period: usize) -> Vec<f64> {
    let mut tr = true_range(candles);
    if !tr.is_empty() {
        tr[0] = f64::NAN;
    }
    wilder_smooth(&tr, period)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candles(data: &[(f64, f64, f64, f64)]) -> Vec<Candle> {
        data.iter()
            .enumerate()
            .map(|(i, &(o, h, l, c))| Candle {
                timestamp: i as i64,
                open: o,
                high: h,
                low: l,
                close: c,
                volume: 1.0,
            })
            .collect()
    }

    #[test]
    fn true_range_basic() {
        let c = candles(&[
            (100.0, 105.0, 95.0, 102.0),
            (102.0, 108.0, 100.0, 106.0),
            (106.0, 107.0, 98.0, 99.0),
        ]);
        let tr = true_range(&c);
        assert!((tr[1] - 8.0).abs() < 1e-10);
        assert!((tr[2] - 9.0).abs() < 1e-10);
    }

    #[test]
    fn atr_period_3() {
        let c = candles(&[
            (100.0, 105.0, 95.0, 102.0),
            (102.0, 108.0, 100.0, 106.0),
            (106.0, 107.0, 98.0, 99.0),
            (99.0, 103.0, 97.0, 101.0),
            (101.0, 106.0, 100.0, 105.0),
        ]);
        let result = atr(&c, 3);
        assert!((result[3] - 23.0 / 3.0).abs() < 1e-9);
        assert!((result[4] - 64.0 / 9.0).abs() < 1e-9);
    }
}
