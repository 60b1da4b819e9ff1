//! Simple Moving Average — rolling mean over a lookback window.
//!
//! Lookback: `period - 1` (first valid value at index `period - 1`).
//! Grounded on the teacher's `indicators::sma::Sma`, adapted from a trait
//! object to a plain function per the design note to avoid dynamic dispatch
//! in the hot loop — the `IndicatorEngine` caches the returned series keyed
//! by `(name, params)` instead.

pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }

    for i in (period - 1)..n {
        let window = &values[(i + 1 - period)..=i];
        if window.iter().any(|v| v.is_nan()) {
            continue;
        }
        result[i] = window.iter().sum::<f64>() / period as f64;
    }
    result
}

/// Population standard deviation over the same rolling window as `sma`.
pub fn rolling_stddev(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }

    for i in (period - 1)..n {
        let window = &values[(i + 1 - period)..=i];
        if window.iter().any(|v| v.is_nan()) {
            continue;
        }
        let mean = window.iter().sum::<f64>() / period as f64;
        let variance = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / period as f64;
        result[i] = variance.sqrt();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_basic() {
        let closes = [10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0];
        let result = sma(&closes, 5);
        for v in &result[0..4] {
            assert!(v.is_nan());
        }
        assert!((result[4] - 12.0).abs() < 1e-10);
        assert!((result[6] - 14.0).abs() < 1e-10);
    }

    #[test]
    fn sma_nan_window_propagates() {
        let closes = [10.0, f64::NAN, 12.0, 13.0];
        let result = sma(&closes, 3);
        assert!(result[2].is_nan());
        assert!(result[3].is_nan());
    }

    #[test]
    fn stddev_constant_series_is_zero() {
        let closes = [5.0, 5.0, 5.0, 5.0];
        let result = rolling_stddev(&closes, 3);
        assert!((result[2] - 0.0).abs() < 1e-10);
    }
}
