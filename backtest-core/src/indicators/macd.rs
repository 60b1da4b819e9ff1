//! MACD — moving average convergence/divergence.
//!
//! `line = EMA(fast) - EMA(slow)`, `signal = EMA(line, signal_period)`,
//! `histogram = line - signal`. Grounded on the teacher's
//! `indicators::momentum` MACD computation, adapted to plain functions.

use crate::indicators::ema::ema;

pub struct Macd {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

pub fn macd(values: &[f64], fast: usize, slow: usize, signal_period: usize) -> Macd {
    let ema_fast = ema(values, fast);
    let ema_slow = ema(values, slow);
    let n = values.len();
    let mut line = vec![f64::NAN; n];
    for i in 0..n {
        if !ema_fast[i].is_nan() && !ema_slow[i].is_nan() {
            line[i] = ema_fast[i] - ema_slow[i];
        }
    }

    let signal = ema(&line, signal_period);
    let mut histogram = vec![f64::NAN; n];
    for i in 0..n {
        if !line[i].is_nan() && !signal[i].is_nan() {
            histogram[i] = line[i] - signal[i];
        }
    }

    Macd {
        line,
        signal,
        histogram,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macd_warms_up_before_slow_period() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let result = macd(&closes, 12, 26, 9);
        assert!(result.line[24].is_nan());
        assert!(!result.line[25].is_nan());
    }

    #[test]
    fn macd_uptrend_has_positive_line() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64 * 2.0).collect();
        let result = macd(&closes, 12, 26, 9);
        assert!(result.line[59] > 0.0);
    }

    #[test]
    fn macd_histogram_is_line_minus_signal() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.3).sin() * 10.0).collect();
        let result = macd(&closes, 12, 26, 9);
        let i = 59;
        assert!((result.histogram[i] - (result.line[i] - result.signal[i])).abs() < 1e-9);
    }
}
