//! Stochastic Oscillator — %K raw range position, %D smoothed signal.
//!
//! `%K = 100 * (close - lowest_low(n)) / (highest_high(n) - lowest_low(n))`,
//! `%D = SMA(%K, d_period)`. A zero range (flat high == low window) yields
//! NaN rather than a division by zero. Grounded on the teacher's
//! `indicators::momentum` stochastic computation.

use crate::domain::Candle;
use crate::indicators::sma::sma;

pub struct Stochastic {
    pub k: Vec<f64>,
    pub d: Vec<f64>,
}

pub fn stochastic(candles: &[Candle], k_period: usize, d_period: usize) -> Stochastic {
    let n = candles.len();
    let mut k = vec![f64::NAN; n];
    if k_period > 0 && n >= k_period {
        for i in (k_period - 1)..n {
            let window = &candles[(i + 1 - k_period)..=i];
            if window.iter().any(|c| c.high.is_nan() || c.low.is_nan() || c.close.is_nan()) {
                continue;
            }
            let highest = window.iter().map(|c| c.high).fold(f64::MIN, f64::max);
            let lowest = window.iter().map(|c| c.low).fold(f64::MAX, f64::min);
            let range = highest - lowest;
            if range == 0.0 {
                continue;
            }
            k[i] = 100.0 * (candles[i].close - lowest) / range;
        }
    }
    let d = sma(&k, d_period);
    Stochastic { k, d }
}
