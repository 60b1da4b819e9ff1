//! Exponential Moving Average.
//!
//! Recursive: `EMA[t] = alpha * value[t] + (1 - alpha) * EMA[t-1]`.
//! Seed: `EMA[period-1] = SMA` of the first `period` values. `alpha = 2/(n+1)`.
//! Grounded on the teacher's `indicators::ema::Ema`.

pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }

    let alpha = 2.0 / (period as f64 + 1.0);

    let seed_window = &values[..period];
    if seed_window.iter().any(|v| v.is_nan()) {
        return result;
    }
    let seed = seed_window.iter().sum::<f64>() / period as f64;
    result[period - 1] = seed;

    let mut prev = seed;
    for (i, window) in values.iter().enumerate().skip(period) {
        if window.is_nan() {
            break;
        }
        let value = alpha * window + (1.0 - alpha) * prev;
        result[i] = value;
        prev = value;
    }
    result
}
