//! Funding rate indicators: the rate prevailing at each bar, and its 8-hour
//! rolling aggregate. Grounded on the same nearest-preceding-timestamp
//! alignment used for trade data in `indicators::orderflow`, since funding
//! rates are published far sparser than candles.

use crate::domain::{Candle, FundingRate};

fn align_to_candles(candles: &[Candle], rates: &[FundingRate]) -> Vec<f64> {
    let mut result = vec![f64::NAN; candles.len()];
    if rates.is_empty() {
        return result;
    }
    let mut rate_idx = 0;
    for (i, candle) in candles.iter().enumerate() {
        while rate_idx + 1 < rates.len() && rates[rate_idx + 1].timestamp <= candle.timestamp {
            rate_idx += 1;
        }
        if rates[rate_idx].timestamp <= candle.timestamp {
            result[i] = rates[rate_idx].rate;
        }
    }
    result
}

/// The funding rate in effect at each bar.
pub fn funding(candles: &[Candle], rates: &[FundingRate]) -> Vec<f64> {
    align_to_candles(candles, rates)
}

/// Sum of funding paid over the trailing 8 hours at each bar, using the
/// rate in effect at each candle timestamp within the window.
pub fn funding_8h(candles: &[Candle], rates: &[FundingRate]) -> Vec<f64> {
    const WINDOW_MS: i64 = 8 * 60 * 60 * 1000;
    let aligned = align_to_candles(candles, rates);
    let n = candles.len();
    let mut result = vec![f64::NAN; n];
    let mut start = 0usize;
    for i in 0..n {
        while candles[i].timestamp - candles[start].timestamp > WINDOW_MS {
            start += 1;
        }
        let window = &aligned[start..=i];
        if window.iter().any(|v| v.is_nan()) {
            continue;
        }
        result[i] = window.iter().sum();
    }
    result
}
