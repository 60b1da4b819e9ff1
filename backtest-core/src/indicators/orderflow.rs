//! Orderflow indicators built from an aggregated-trade feed: volume-weighted
//! average price, volume-profile point of control / value area, buy/sell
//! delta, whale-trade volume, and their session-reset (per UTC day)
//! counterparts.
//!
//! No teacher precedent covers trade-tape indicators; these follow the same
//! rolling-window-over-a-cached-series shape as `indicators::sma`, with
//! trades pre-bucketed to bar indices once per call rather than re-scanned
//! per query.

use crate::domain::{AggTrade, Candle};

const VALUE_AREA_FRACTION: f64 = 0.70;
const PROFILE_BINS: usize = 24;

/// Assigns each trade to the last candle whose timestamp is `<=` the
/// trade's timestamp (candles must be sorted ascending by timestamp).
fn bucket_trades(candles: &[Candle], trades: &[AggTrade]) -> Vec<Vec<AggTrade>> {
    let mut buckets = vec![Vec::new(); candles.len()];
    if candles.is_empty() {
        return buckets;
    }
    for &trade in trades {
        match candles.partition_point(|c| c.timestamp <= trade.timestamp) {
            0 => continue,
            idx => buckets[idx - 1].push(trade),
        }
    }
    buckets
}

struct Profile {
    vwap: f64,
    poc: f64,
    vah: f64,
    val: f64,
    buy_volume: f64,
    sell_volume: f64,
}

fn build_profile(trades: &[&AggTrade]) -> Option<Profile> {
    if trades.is_empty() {
        return None;
    }
    let min_price = trades.iter().map(|t| t.price).fold(f64::MAX, f64::min);
    let max_price = trades.iter().map(|t| t.price).fold(f64::MIN, f64::max);

    let mut notional = 0.0;
    let mut quantity = 0.0;
    let mut buy_volume = 0.0;
    let mut sell_volume = 0.0;
    for t in trades {
        notional += t.price * t.quantity;
        quantity += t.quantity;
        if t.is_buyer_maker {
            sell_volume += t.quantity;
        } else {
            buy_volume += t.quantity;
        }
    }
    if quantity == 0.0 {
        return None;
    }
    let vwap = notional / quantity;

    if max_price == min_price {
        return Some(Profile {
            vwap,
            poc: min_price,
            vah: min_price,
            val: min_price,
            buy_volume,
            sell_volume,
        });
    }

    let bin_width = (max_price - min_price) / PROFILE_BINS as f64;
    let mut bins = vec![0.0; PROFILE_BINS];
    for t in trades {
        let idx = (((t.price - min_price) / bin_width) as usize).min(PROFILE_BINS - 1);
        bins[idx] += t.quantity;
    }

    let poc_idx = bins
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let poc = min_price + bin_width * (poc_idx as f64 + 0.5);

    let total_volume: f64 = bins.iter().sum();
    let target = total_volume * VALUE_AREA_FRACTION;
    let mut included = vec![false; PROFILE_BINS];
    included[poc_idx] = true;
    let mut covered = bins[poc_idx];
    let (mut lo, mut hi) = (poc_idx, poc_idx);
    while covered < target && (lo > 0 || hi < PROFILE_BINS - 1) {
        let lower_vol = if lo > 0 { bins[lo - 1] } else { -1.0 };
        let upper_vol = if hi < PROFILE_BINS - 1 { bins[hi + 1] } else { -1.0 };
        if upper_vol >= lower_vol {
            hi += 1;
            included[hi] = true;
            covered += bins[hi];
        } else {
            lo -= 1;
            included[lo] = true;
            covered += bins[lo];
        }
    }
    let val = min_price + bin_width * lo as f64;
    let vah = min_price + bin_width * (hi as f64 + 1.0);

    Some(Profile {
        vwap,
        poc,
        vah,
        val,
        buy_volume,
        sell_volume,
    })
}

fn rolling_profile(
    buckets: &[Vec<AggTrade>],
    period: usize,
) -> Vec<Option<Profile>> {
    let n = buckets.len();
    let mut result = Vec::with_capacity(n);
    for i in 0..n {
        if period == 0 || i + 1 < period {
            result.push(None);
            continue;
        }
        let refs: Vec<&AggTrade> = buckets[(i + 1 - period)..=i].iter().flatten().collect();
        result.push(build_profile(&refs));
    }
    result
}

pub fn vwap(candles: &[Candle], trades: &[AggTrade], period: usize) -> Vec<f64> {
    let buckets = bucket_trades(candles, trades);
    rolling_profile(&buckets, period)
        .into_iter()
        .map(|p| p.map_or(f64::NAN, |p| p.vwap))
        .collect()
}

pub fn poc(candles: &[Candle], trades: &[AggTrade], period: usize) -> Vec<f64> {
    let buckets = bucket_trades(candles, trades);
    rolling_profile(&buckets, period)
        .into_iter()
        .map(|p| p.map_or(f64::NAN, |p| p.poc))
        .collect()
}

pub fn vah(candles: &[Candle], trades: &[AggTrade], period: usize) -> Vec<f64> {
    let buckets = bucket_trades(candles, trades);
    rolling_profile(&buckets, period)
        .into_iter()
        .map(|p| p.map_or(f64::NAN, |p| p.vah))
        .collect()
}

pub fn val(candles: &[Candle], trades: &[AggTrade], period: usize) -> Vec<f64> {
    let buckets = bucket_trades(candles, trades);
    rolling_profile(&buckets, period)
        .into_iter()
        .map(|p| p.map_or(f64::NAN, |p| p.val))
        .collect()
}

/// Per-bar net taker volume: buy quantity minus sell quantity.
pub fn delta(candles: &[Candle], trades: &[AggTrade]) -> Vec<f64> {
    let buckets = bucket_trades(candles, trades);
    buckets
        .iter()
        .map(|bucket| {
            if bucket.is_empty() {
                return 0.0;
            }
            bucket.iter().fold(0.0, |acc, t| {
                acc + if t.is_buyer_maker { -t.quantity } else { t.quantity }
            })
        })
        .collect()
}

pub fn cum_delta(candles: &[Candle], trades: &[AggTrade]) -> Vec<f64> {
    let d = delta(candles, trades);
    let mut result = Vec::with_capacity(d.len());
    let mut running = 0.0;
    for v in d {
        running += v;
        result.push(running);
    }
    result
}

pub fn whale_buy_volume(
    candles: &[Candle],
    trades: &[AggTrade],
    notional_threshold: f64,
    period: usize,
) -> Vec<f64> {
    whale_volume(candles, trades, notional_threshold, period, false)
}

pub fn whale_sell_volume(
    candles: &[Candle],
    trades: &[AggTrade],
    notional_threshold: f64,
    period: usize,
) -> Vec<f64> {
    whale_volume(candles, trades, notional_threshold, period, true)
}

fn whale_volume(
    candles: &[Candle],
    trades: &[AggTrade],
    notional_threshold: f64,
    period: usize,
    sells: bool,
) -> Vec<f64> {
    let buckets = bucket_trades(candles, trades);
    let n = buckets.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 {
        return result;
    }
    for i in 0..n {
        if i + 1 < period {
            continue;
        }
        let mut total = 0.0;
        for bucket in &buckets[(i + 1 - period)..=i] {
            for t in bucket {
                if t.is_buyer_maker == sells && t.price * t.quantity >= notional_threshold {
                    total += t.quantity;
                }
            }
        }
        result[i] = total;
    }
    result
}

pub fn large_trade_count(
    candles: &[Candle],
    trades: &[AggTrade],
    notional_threshold: f64,
    period: usize,
) -> Vec<f64> {
    let buckets = bucket_trades(candles, trades);
    let n = buckets.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 {
        return result;
    }
    for i in 0..n {
        if i + 1 < period {
            continue;
        }
        let count = buckets[(i + 1 - period)..=i]
            .iter()
            .flatten()
            .filter(|t| t.price * t.quantity >= notional_threshold)
            .count();
        result[i] = count as f64;
    }
    result
}

fn session_key(timestamp_ms: i64) -> i64 {
    timestamp_ms.div_euclid(86_400_000)
}

/// Session-to-date variants reset their accumulation at each UTC day
/// boundary rather than sliding over a fixed bar count.
pub fn session_vwap(candles: &[Candle], trades: &[AggTrade]) -> Vec<f64> {
    session_series(candles, trades, |p| p.vwap)
}

pub fn session_poc(candles: &[Candle], trades: &[AggTrade]) -> Vec<f64> {
    session_series(candles, trades, |p| p.poc)
}

pub fn session_vah(candles: &[Candle], trades: &[AggTrade]) -> Vec<f64> {
    session_series(candles, trades, |p| p.vah)
}

pub fn session_val(candles: &[Candle], trades: &[AggTrade]) -> Vec<f64> {
    session_series(candles, trades, |p| p.val)
}

fn session_series(
    candles: &[Candle],
    trades: &[AggTrade],
    extract: impl Fn(&Profile) -> f64,
) -> Vec<f64> {
    let buckets = bucket_trades(candles, trades);
    let n = candles.len();
    let mut result = vec![f64::NAN; n];
    let mut session_start = 0;
    for i in 0..n {
        if i > 0 && session_key(candles[i].timestamp) != session_key(candles[i - 1].timestamp) {
            session_start = i;
        }
        let refs: Vec<&AggTrade> = buckets[session_start..=i].iter().flatten().collect();
        if let Some(profile) = build_profile(&refs) {
            result[i] = extract(&profile);
        }
    }
    result
}

/// Previous-completed-session POC/VAH/VAL, held constant through the
/// following session until the next day boundary.
pub fn prev_day_poc(candles: &[Candle], trades: &[AggTrade]) -> Vec<f64> {
    prev_day_series(candles, trades, |p| p.poc)
}

pub fn prev_day_vah(candles: &[Candle], trades: &[AggTrade]) -> Vec<f64> {
    prev_day_series(candles, trades, |p| p.vah)
}

pub fn prev_day_val(candles: &[Candle], trades: &[AggTrade]) -> Vec<f64> {
    prev_day_series(candles, trades, |p| p.val)
}

fn prev_day_series(
    candles: &[Candle],
    trades: &[AggTrade],
    extract: impl Fn(&Profile) -> f64,
) -> Vec<f64> {
    let buckets = bucket_trades(candles, trades);
    let n = candles.len();
    let mut result = vec![f64::NAN; n];
    let mut prev_session_value = f64::NAN;
    let mut session_start = 0;
    for i in 0..n {
        if i > 0 && session_key(candles[i].timestamp) != session_key(candles[i - 1].timestamp) {
            let refs: Vec<&AggTrade> = buckets[session_start..i].iter().flatten().collect();
            prev_session_value = build_profile(&refs).map_or(f64::NAN, |p| extract(&p));
            session_start = i;
        }
        result[i] = prev_session_value;
    }
    result
}

pub fn session_delta(candles: &[Candle], trades: &[AggTrade]) -> Vec<f64> {
    let d = delta(candles, trades);
    let n = candles.len();
    let mut result = vec![0.0; n];
    let mut running = 0.0;
    for i in 0..n {
        if i > 0 && session_key(candles[i].timestamp) != session_key(candles[i - 1].timestamp) {
            running = 0.0;
        }
        running += d[i];
        result[i] = running;
    }
    result
}
