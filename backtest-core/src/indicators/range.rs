//! Rolling range helpers: highest high, lowest low, range position, average
//! volume. Grounded on the teacher's `indicators::sma::Sma` rolling-window
//! pattern, generalized from mean to min/max/position reducers.

use crate::domain::Candle;

pub fn high_of(candles: &[Candle], period: usize) -> Vec<f64> {
    rolling_reduce(candles, period, |c| c.high, f64::MIN, f64::max)
}

pub fn low_of(candles: &[Candle], period: usize) -> Vec<f64> {
    rolling_reduce(candles, period, |c| c.low, f64::MAX, f64::min)
}

/// Position of the current close within the `[lowest_low, highest_high]`
/// range over the last `period` bars, in `[0.0, 1.0]`. NaN when the range
/// is zero-width.
pub fn range_position(candles: &[Candle], period: usize) -> Vec<f64> {
    let highs = high_of(candles, period);
    let lows = low_of(candles, period);
    let n = candles.len();
    let mut result = vec![f64::NAN; n];
    for i in 0..n {
        if highs[i].is_nan() || lows[i].is_nan() || candles[i].close.is_nan() {
            continue;
        }
        let range = highs[i] - lows[i];
        if range == 0.0 {
            continue;
        }
        result[i] = (candles[i].close - lows[i]) / range;
    }
    result
}

pub fn avg_volume(candles: &[Candle], period: usize) -> Vec<f64> {
    let n = candles.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }
    for i in (period - 1)..n {
        let window = &candles[(i + 1 - period)..=i];
        if window.iter().any(|c| c.volume.is_nan()) {
            continue;
        }
        result[i] = window.iter().map(|c| c.volume).sum::<f64>() / period as f64;
    }
    result
}

fn rolling_reduce(
    candles: &[Candle],
    period: usize,
    field: impl Fn(&Candle) -> f64,
    init: f64,
    reduce: impl Fn(f64, f64) -> f64,
) -> Vec<f64> {
    let n = candles.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }
    for i in (period - 1)..n {
        let window = &candles[(i + 1 - period)..=i];
        if window.iter().any(|c| field(c).is_nan()) {
            continue;
        }
        result[i] = window.iter().map(&field).fold(init, &reduce);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candles(data: &[(f64, f64, f64, f64, f64)]) -> Vec<Candle> {
        data.iter()
            .enumerate()
            .map(|(i, &(o, h, l, c, v))| Candle {
                timestamp: i as i64,
                open: o,
                high: h,
                low: l,
                close: c,
                volume: v,
            })
            .collect()
    }

    #[test]
    fn high_of_tracks_window_max() {
        let c = candles(&[
            (1.0, 10.0, 9.0, 9.5, 100.0),
            (1.0, 15.0, 8.0, 9.0, 100.0),
            (1.0, 11.0, 7.0, 8.5, 100.0),
        ]);
        let result = high_of(&c, 2);
        assert!((result[1] - 15.0).abs() < 1e-10);
        assert!((result[2] - 15.0).abs() < 1e-10);
    }

    #[test]
    fn range_position_bounds() {
        let c = candles(&[
            (1.0, 10.0, 5.0, 7.0, 100.0),
            (1.0, 12.0, 6.0, 12.0, 100.0),
            (1.0, 11.0, 4.0, 4.0, 100.0),
        ]);
        let result = range_position(&c, 3);
        assert!((result[2] - 0.0).abs() < 1e-10);
    }

    #[test]
    fn avg_volume_basic() {
        let c = candles(&[
            (1.0, 2.0, 1.0, 1.5, 100.0),
            (1.0, 2.0, 1.0, 1.5, 200.0),
            (1.0, 2.0, 1.0, 1.5, 300.0),
        ]);
        let result = avg_volume(&c, 3);
        assert!((result[2] - 200.0).abs() < 1e-10);
    }
}
