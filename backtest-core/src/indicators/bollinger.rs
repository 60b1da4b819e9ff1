//! Bollinger Bands — moving average +/- standard deviation multiplier.
//!
//! `middle = SMA(n)`, `upper = middle + k*stddev`, `lower = middle - k*stddev`,
//! using population standard deviation over the same window as the SMA.
//! Grounded on the teacher's `indicators::bollinger::Bollinger`, collapsed
//! from three separate band instances into one series-returning function per
//! the design note on avoiding dynamic dispatch in the hot loop.

use crate::indicators::sma::{rolling_stddev, sma};

pub struct BollingerBands {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

pub fn bollinger_bands(values: &[f64], period: usize, k: f64) -> BollingerBands {
    let middle = sma(values, period);
    let stddev = rolling_stddev(values, period);
    let n = values.len();
    let mut upper = vec![f64::NAN; n];
    let mut lower = vec![f64::NAN; n];
    for i in 0..n {
        if middle[i].is_nan() || stddev[i].is_nan() {
            continue;
        }
        upper[i] = middle[i] + k * stddev[i];
        lower[i] = middle[i] - k * stddev[i];
    }
    BollingerBands {
        upper,
        middle,
        lower,
    }
}
