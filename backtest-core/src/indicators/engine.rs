//! `IndicatorEngine` — the per-run indicator cache and query surface.
//!
//! Holds the candle series plus optional auxiliary feeds, and memoizes every
//! computed series keyed by `(indicator, params)` so that repeated
//! `getX(params, bar_index)` calls across many strategies/zones in the same
//! run never recompute a series. Every getter is a plain function call, not
//! a virtual dispatch, per the design note on keeping the hot loop free of
//! dynamic dispatch. Grounded on the teacher's `components::indicator::IndicatorValues`
//! cache container, generalized from a flat name-keyed map to one keyed by
//! name-plus-parameters.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::domain::{AggTrade, Candle, FundingRate, OpenInterest};
use crate::indicators::{adx, atr, bollinger, calendar, ema, funding, macd, oi, orderflow, range, rsi, sma, stochastic};

pub struct IndicatorEngine {
    candles: Vec<Candle>,
    closes: Vec<f64>,
    agg_trades: Vec<AggTrade>,
    funding_rates: Vec<FundingRate>,
    open_interest: Vec<OpenInterest>,
    cache: RefCell<HashMap<String, Vec<f64>>>,
}

impl IndicatorEngine {
    pub fn new(candles: Vec<Candle>) -> Self {
        let closes = candles.iter().map(|c| c.close).collect();
        Self {
            candles,
            closes,
            agg_trades: Vec::new(),
            funding_rates: Vec::new(),
            open_interest: Vec::new(),
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn set_candles(&mut self, candles: Vec<Candle>) {
        self.closes = candles.iter().map(|c| c.close).collect();
        self.candles = candles;
        self.cache.borrow_mut().clear();
    }

    pub fn set_agg_trades(&mut self, trades: Vec<AggTrade>) {
        self.agg_trades = trades;
        self.cache.borrow_mut().clear();
    }

    pub fn set_funding_rates(&mut self, rates: Vec<FundingRate>) {
        self.funding_rates = rates;
        self.cache.borrow_mut().clear();
    }

    pub fn set_open_interest(&mut self, snapshots: Vec<OpenInterest>) {
        self.open_interest = snapshots;
        self.cache.borrow_mut().clear();
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    fn cached_series(&self, key: String, compute: impl FnOnce() -> Vec<f64>) -> Vec<f64> {
        if let Some(existing) = self.cache.borrow().get(&key) {
            return existing.clone();
        }
        let series = compute();
        self.cache.borrow_mut().insert(key, series.clone());
        series
    }

    fn at(series: &[f64], bar_index: usize) -> f64 {
        series.get(bar_index).copied().unwrap_or(f64::NAN)
    }

    pub fn sma(&self, period: usize, bar_index: usize) -> f64 {
        let key = format!("sma:{period}");
        Self::at(&self.cached_series(key, || sma::sma(&self.closes, period)), bar_index)
    }

    pub fn ema(&self, period: usize, bar_index: usize) -> f64 {
        let key = format!("ema:{period}");
        Self::at(&self.cached_series(key, || ema::ema(&self.closes, period)), bar_index)
    }

    pub fn rsi(&self, period: usize, bar_index: usize) -> f64 {
        let key = format!("rsi:{period}");
        Self::at(&self.cached_series(key, || rsi::rsi(&self.closes, period)), bar_index)
    }

    pub fn atr(&self, period: usize, bar_index: usize) -> f64 {
        let key = format!("atr:{period}");
        Self::at(&self.cached_series(key, || atr::atr(&self.candles, period)), bar_index)
    }

    pub fn adx(&self, period: usize, bar_index: usize) -> f64 {
        let key = format!("adx:{period}");
        Self::at(&self.cached_series(key, || adx::adx(&self.candles, period)), bar_index)
    }

    pub fn plus_di(&self, period: usize, bar_index: usize) -> f64 {
        let key = format!("plus_di:{period}");
        Self::at(&self.cached_series(key, || adx::plus_di(&self.candles, period)), bar_index)
    }

    pub fn minus_di(&self, period: usize, bar_index: usize) -> f64 {
        let key = format!("minus_di:{period}");
        Self::at(&self.cached_series(key, || adx::minus_di(&self.candles, period)), bar_index)
    }

    pub fn bbands_upper(&self, period: usize, k: f64, bar_index: usize) -> f64 {
        self.bbands(period, k).0.get(bar_index).copied().unwrap_or(f64::NAN)
    }

    pub fn bbands_middle(&self, period: usize, k: f64, bar_index: usize) -> f64 {
        self.bbands(period, k).1.get(bar_index).copied().unwrap_or(f64::NAN)
    }

    pub fn bbands_lower(&self, period: usize, k: f64, bar_index: usize) -> f64 {
        self.bbands(period, k).2.get(bar_index).copied().unwrap_or(f64::NAN)
    }

    fn bbands(&self, period: usize, k: f64) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        let upper_key = format!("bb_upper:{period}:{k}");
        let mid_key = format!("bb_mid:{period}:{k}");
        let lower_key = format!("bb_lower:{period}:{k}");
        if let (Some(u), Some(m), Some(l)) = (
            self.cache.borrow().get(&upper_key).cloned(),
            self.cache.borrow().get(&mid_key).cloned(),
            self.cache.borrow().get(&lower_key).cloned(),
        ) {
            return (u, m, l);
        }
        let bands = bollinger::bollinger_bands(&self.closes, period, k);
        self.cache.borrow_mut().insert(upper_key, bands.upper.clone());
        self.cache.borrow_mut().insert(mid_key, bands.middle.clone());
        self.cache.borrow_mut().insert(lower_key, bands.lower.clone());
        (bands.upper, bands.middle, bands.lower)
    }

    pub fn macd_line(&self, fast: usize, slow: usize, signal: usize, bar_index: usize) -> f64 {
        self.macd(fast, slow, signal).0.get(bar_index).copied().unwrap_or(f64::NAN)
    }

    pub fn macd_signal(&self, fast: usize, slow: usize, signal: usize, bar_index: usize) -> f64 {
        self.macd(fast, slow, signal).1.get(bar_index).copied().unwrap_or(f64::NAN)
    }

    pub fn macd_histogram(&self, fast: usize, slow: usize, signal: usize, bar_index: usize) -> f64 {
        self.macd(fast, slow, signal).2.get(bar_index).copied().unwrap_or(f64::NAN)
    }

    fn macd(&self, fast: usize, slow: usize, signal: usize) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        let line_key = format!("macd_line:{fast}:{slow}:{signal}");
        let sig_key = format!("macd_signal:{fast}:{slow}:{signal}");
        let hist_key = format!("macd_hist:{fast}:{slow}:{signal}");
        if let (Some(l), Some(s), Some(h)) = (
            self.cache.borrow().get(&line_key).cloned(),
            self.cache.borrow().get(&sig_key).cloned(),
            self.cache.borrow().get(&hist_key).cloned(),
        ) {
            return (l, s, h);
        }
        let m = macd::macd(&self.closes, fast, slow, signal);
        self.cache.borrow_mut().insert(line_key, m.line.clone());
        self.cache.borrow_mut().insert(sig_key, m.signal.clone());
        self.cache.borrow_mut().insert(hist_key, m.histogram.clone());
        (m.line, m.signal, m.histogram)
    }

    pub fn stochastic_k(&self, k_period: usize, d_period: usize, bar_index: usize) -> f64 {
        self.stochastic(k_period, d_period).0.get(bar_index).copied().unwrap_or(f64::NAN)
    }

    pub fn stochastic_d(&self, k_period: usize, d_period: usize, bar_index: usize) -> f64 {
        self.stochastic(k_period, d_period).1.get(bar_index).copied().unwrap_or(f64::NAN)
    }

    fn stochastic(&self, k_period: usize, d_period: usize) -> (Vec<f64>, Vec<f64>) {
        let k_key = format!("stoch_k:{k_period}:{d_period}");
        let d_key = format!("stoch_d:{k_period}:{d_period}");
        if let (Some(k), Some(d)) = (
            self.cache.borrow().get(&k_key).cloned(),
            self.cache.borrow().get(&d_key).cloned(),
        ) {
            return (k, d);
        }
        let s = stochastic::stochastic(&self.candles, k_period, d_period);
        self.cache.borrow_mut().insert(k_key, s.k.clone());
        self.cache.borrow_mut().insert(d_key, s.d.clone());
        (s.k, s.d)
    }

    pub fn high_of(&self, period: usize, bar_index: usize) -> f64 {
        let key = format!("high_of:{period}");
        Self::at(&self.cached_series(key, || range::high_of(&self.candles, period)), bar_index)
    }

    pub fn low_of(&self, period: usize, bar_index: usize) -> f64 {
        let key = format!("low_of:{period}");
        Self::at(&self.cached_series(key, || range::low_of(&self.candles, period)), bar_index)
    }

    pub fn range_position(&self, period: usize, bar_index: usize) -> f64 {
        let key = format!("range_position:{period}");
        Self::at(&self.cached_series(key, || range::range_position(&self.candles, period)), bar_index)
    }

    pub fn avg_volume(&self, period: usize, bar_index: usize) -> f64 {
        let key = format!("avg_volume:{period}");
        Self::at(&self.cached_series(key, || range::avg_volume(&self.candles, period)), bar_index)
    }

    pub fn day_of_week(&self, bar_index: usize) -> f64 {
        self.candles.get(bar_index).map_or(f64::NAN, |c| calendar::day_of_week(c.timestamp))
    }

    pub fn hour(&self, bar_index: usize) -> f64 {
        self.candles.get(bar_index).map_or(f64::NAN, |c| calendar::hour(c.timestamp))
    }

    pub fn day(&self, bar_index: usize) -> f64 {
        self.candles.get(bar_index).map_or(f64::NAN, |c| calendar::day(c.timestamp))
    }

    pub fn month(&self, bar_index: usize) -> f64 {
        self.candles.get(bar_index).map_or(f64::NAN, |c| calendar::month(c.timestamp))
    }

    pub fn moon_phase(&self, bar_index: usize) -> f64 {
        self.candles.get(bar_index).map_or(f64::NAN, |c| calendar::moon_phase(c.timestamp))
    }

    pub fn is_us_holiday(&self, bar_index: usize) -> bool {
        self.candles.get(bar_index).is_some_and(|c| calendar::is_us_holiday(c.timestamp))
    }

    pub fn is_fomc_meeting(&self, bar_index: usize) -> bool {
        self.candles.get(bar_index).is_some_and(|c| calendar::is_fomc_meeting(c.timestamp))
    }

    pub fn vwap(&self, period: usize, bar_index: usize) -> f64 {
        let key = format!("vwap:{period}");
        Self::at(&self.cached_series(key, || orderflow::vwap(&self.candles, &self.agg_trades, period)), bar_index)
    }

    pub fn poc(&self, period: usize, bar_index: usize) -> f64 {
        let key = format!("poc:{period}");
        Self::at(&self.cached_series(key, || orderflow::poc(&self.candles, &self.agg_trades, period)), bar_index)
    }

    pub fn vah(&self, period: usize, bar_index: usize) -> f64 {
        let key = format!("vah:{period}");
        Self::at(&self.cached_series(key, || orderflow::vah(&self.candles, &self.agg_trades, period)), bar_index)
    }

    pub fn val(&self, period: usize, bar_index: usize) -> f64 {
        let key = format!("val:{period}");
        Self::at(&self.cached_series(key, || orderflow::val(&self.candles, &self.agg_trades, period)), bar_index)
    }

    pub fn delta(&self, bar_index: usize) -> f64 {
        let key = "delta".to_string();
        Self::at(&self.cached_series(key, || orderflow::delta(&self.candles, &self.agg_trades)), bar_index)
    }

    pub fn cum_delta(&self, bar_index: usize) -> f64 {
        let key = "cum_delta".to_string();
        Self::at(&self.cached_series(key, || orderflow::cum_delta(&self.candles, &self.agg_trades)), bar_index)
    }

    pub fn whale_buy_volume(&self, notional_threshold: f64, period: usize, bar_index: usize) -> f64 {
        let key = format!("whale_buy:{notional_threshold}:{period}");
        Self::at(
            &self.cached_series(key, || orderflow::whale_buy_volume(&self.candles, &self.agg_trades, notional_threshold, period)),
            bar_index,
        )
    }

    pub fn whale_sell_volume(&self, notional_threshold: f64, period: usize, bar_index: usize) -> f64 {
        let key = format!("whale_sell:{notional_threshold}:{period}");
        Self::at(
            &self.cached_series(key, || orderflow::whale_sell_volume(&self.candles, &self.agg_trades, notional_threshold, period)),
            bar_index,
        )
    }

    pub fn large_trade_count(&self, notional_threshold: f64, period: usize, bar_index: usize) -> f64 {
        let key = format!("large_trade_count:{notional_threshold}:{period}");
        Self::at(
            &self.cached_series(key, || orderflow::large_trade_count(&self.candles, &self.agg_trades, notional_threshold, period)),
            bar_index,
        )
    }

    pub fn session_vwap(&self, bar_index: usize) -> f64 {
        let key = "session_vwap".to_string();
        Self::at(&self.cached_series(key, || orderflow::session_vwap(&self.candles, &self.agg_trades)), bar_index)
    }

    pub fn session_poc(&self, bar_index: usize) -> f64 {
        let key = "session_poc".to_string();
        Self::at(&self.cached_series(key, || orderflow::session_poc(&self.candles, &self.agg_trades)), bar_index)
    }

    pub fn session_vah(&self, bar_index: usize) -> f64 {
        let key = "session_vah".to_string();
        Self::at(&self.cached_series(key, || orderflow::session_vah(&self.candles, &self.agg_trades)), bar_index)
    }

    pub fn session_val(&self, bar_index: usize) -> f64 {
        let key = "session_val".to_string();
        Self::at(&self.cached_series(key, || orderflow::session_val(&self.candles, &self.agg_trades)), bar_index)
    }

    pub fn session_delta(&self, bar_index: usize) -> f64 {
        let key = "session_delta".to_string();
        Self::at(&self.cached_series(key, || orderflow::session_delta(&self.candles, &self.agg_trades)), bar_index)
    }

    pub fn prev_day_poc(&self, bar_index: usize) -> f64 {
        let key = "prev_day_poc".to_string();
        Self::at(&self.cached_series(key, || orderflow::prev_day_poc(&self.candles, &self.agg_trades)), bar_index)
    }

    pub fn prev_day_vah(&self, bar_index: usize) -> f64 {
        let key = "prev_day_vah".to_string();
        Self::at(&self.cached_series(key, || orderflow::prev_day_vah(&self.candles, &self.agg_trades)), bar_index)
    }

    pub fn prev_day_val(&self, bar_index: usize) -> f64 {
        let key = "prev_day_val".to_string();
        Self::at(&self.cached_series(key, || orderflow::prev_day_val(&self.candles, &self.agg_trades)), bar_index)
    }

    pub fn funding(&self, bar_index: usize) -> f64 {
        let key = "funding".to_string();
        Self::at(&self.cached_series(key, || funding::funding(&self.candles, &self.funding_rates)), bar_index)
    }

    pub fn funding_8h(&self, bar_index: usize) -> f64 {
        let key = "funding_8h".to_string();
        Self::at(&self.cached_series(key, || funding::funding_8h(&self.candles, &self.funding_rates)), bar_index)
    }

    pub fn oi(&self, bar_index: usize) -> f64 {
        let key = "oi".to_string();
        Self::at(&self.cached_series(key, || oi::oi(&self.candles, &self.open_interest)), bar_index)
    }

    pub fn oi_change(&self, bar_index: usize) -> f64 {
        let key = "oi_change".to_string();
        Self::at(&self.cached_series(key, || oi::oi_change(&self.candles, &self.open_interest)), bar_index)
    }

    pub fn oi_delta(&self, period: usize, bar_index: usize) -> f64 {
        let key = format!("oi_delta:{period}");
        Self::at(&self.cached_series(key, || oi::oi_delta(&self.candles, &self.open_interest, period)), bar_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candles() -> Vec<Candle> {
        (0..10)
            .map(|i| Candle {
                timestamp: i as i64 * 60_000,
                open: 100.0 + i as f64,
                high: 101.0 + i as f64,
                low: 99.0 + i as f64,
                close: 100.0 + i as f64,
                volume: 10.0,
            })
            .collect()
    }

    #[test]
    fn same_query_returns_cached_identical_value() {
        let engine = IndicatorEngine::new(candles());
        let a = engine.sma(3, 5);
        let b = engine.sma(3, 5);
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn out_of_range_bar_index_is_nan() {
        let engine = IndicatorEngine::new(candles());
        assert!(engine.sma(3, 500).is_nan());
    }

    #[test]
    fn bbands_properties_stay_internally_consistent() {
        let engine = IndicatorEngine::new(candles());
        let upper = engine.bbands_upper(5, 2.0, 9);
        let lower = engine.bbands_lower(5, 2.0, 9);
        assert!(upper >= lower);
    }
}
