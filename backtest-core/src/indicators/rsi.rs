//! Relative Strength Index — Wilder-smoothed average gain/loss ratio.
//!
//! `RSI = 100 - 100 / (1 + avg_gain / avg_loss)`. Lookback: `period`.
//! Edge cases: `avg_loss == 0` and `avg_gain > 0` -> 100; `avg_gain == 0`
//! and `avg_loss > 0` -> 0; both zero -> 50 (no movement).
//! Grounded on the teacher's `indicators::rsi::Rsi`.

pub fn rsi(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period + 1 {
        return result;
    }

    let mut changes = vec![f64::NAN; n];
    for i in 1..n {
        changes[i] = if values[i].is_nan() || values[i - 1].is_nan() {
            f64::NAN
        } else {
            values[i] - values[i - 1]
        };
    }

    if changes[1..=period].iter().any(|c| c.is_nan()) {
        return result;
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for &ch in &changes[1..=period] {
        if ch > 0.0 {
            avg_gain += ch;
        } else {
            avg_loss -= ch;
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;
    result[period] = rsi_from_avgs(avg_gain, avg_loss);

    let alpha = 1.0 / period as f64;
    for i in (period + 1)..n {
        if changes[i].is_nan() {
            break;
        }
        let gain = changes[i].max(0.0);
        let loss = (-changes[i]).max(0.0);
        avg_gain = alpha * gain + (1.0 - alpha) * avg_gain;
        avg_loss = alpha * loss + (1.0 - alpha) * avg_loss;
        result[i] = rsi_from_avgs(avg_gain, avg_loss);
    }

    result
}

fn rsi_from_avgs(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_gain == 0.0 && avg_loss == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else if avg_gain == 0.0 {
        0.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}
