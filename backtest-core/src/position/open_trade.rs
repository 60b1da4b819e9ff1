//! `OpenTradeState` (§3, §4.4): the mutable bookkeeping for one still-open
//! trade — extrema, MFE/MAE, trailing-stop price, holding costs, and
//! partial-exit accounting. Lives only inside the driver; `partialClose`
//! (here, `record_partial_exit` plus the driver building a `Trade`
//! record) never mutates a closed `Trade` in place (§9 "no cyclic
//! references").

use std::collections::HashMap;

use crate::domain::strategy::{ExitReentry, ExitZone, MarketType};
use crate::domain::{Candle, ExitReason, FundingRate, Side};

/// Remaining quantity below this epsilon is treated as fully closed (§3).
pub const QTY_EPSILON: f64 = 1e-4;

/// Bars to scan before entry / after exit for the better-entry/better-exit
/// counterfactual analysis (§4.4).
pub const CONTEXT_BARS: usize = 20;

#[derive(Debug, Clone)]
pub struct OpenTradeState {
    pub strategy_id: String,
    pub side: Side,
    pub entry_bar: usize,
    pub entry_time: i64,
    pub entry_price: f64,
    pub commission: f64,
    pub group_id: String,

    pub highest_since_entry: f64,
    pub lowest_since_entry: f64,
    pub trailing_stop_price: f64,

    pub original_qty: f64,
    pub remaining_qty: f64,

    pub zone_exit_count: HashMap<String, u32>,
    pub last_zone_name: Option<String>,
    pub last_exit_bar: usize,

    pub mfe_percent: f64,
    pub mae_percent: f64,
    pub mfe_bar: usize,
    pub mae_bar: usize,

    pub accumulated_holding_costs: f64,
    pub last_funding_time: i64,
    pub last_interest_time: i64,

    /// Populated once, at open, by the better-entry counterfactual scan.
    pub better_entry: Option<crate::domain::BetterPrice>,

    /// Scratch fields the exit-zone selector (C5) writes during its pass
    /// over this trade and the driver consumes when closing it.
    pub exit_reason: Option<ExitReason>,
    pub exit_price: Option<f64>,
    pub exit_zone_name: Option<String>,
}

impl OpenTradeState {
    pub fn new(
        strategy_id: String,
        side: Side,
        entry_bar: usize,
        entry_time: i64,
        entry_price: f64,
        quantity: f64,
        commission: f64,
        group_id: String,
    ) -> Self {
        Self {
            strategy_id,
            side,
            entry_bar,
            entry_time,
            entry_price,
            commission,
            group_id,
            highest_since_entry: entry_price,
            lowest_since_entry: entry_price,
            trailing_stop_price: 0.0,
            original_qty: quantity,
            remaining_qty: quantity,
            zone_exit_count: HashMap::new(),
            last_zone_name: None,
            last_exit_bar: entry_bar,
            mfe_percent: 0.0,
            mae_percent: 0.0,
            mfe_bar: entry_bar,
            mae_bar: entry_bar,
            accumulated_holding_costs: 0.0,
            last_funding_time: entry_time,
            last_interest_time: entry_time,
            better_entry: None,
            exit_reason: None,
            exit_price: None,
            exit_zone_name: None,
        }
    }

    pub fn is_fully_closed(&self) -> bool {
        self.remaining_qty < QTY_EPSILON
    }

    /// Unrealized P&L% at `price`, relative to `entry_price` (or, for a
    /// DCA group, the caller substitutes the quantity-weighted average
    /// entry price — see `position::manager::average_entry_price`).
    pub fn pnl_percent_at(entry_price: f64, price: f64, side: Side) -> f64 {
        (price - entry_price) / entry_price * 100.0 * side.sign()
    }

    /// Extrema + MFE/MAE update, run at the start of every bar for every
    /// open trade (§4.4).
    pub fn update_extrema_and_excursion(&mut self, candle: &Candle, bar_index: usize) {
        self.highest_since_entry = self.highest_since_entry.max(candle.high);
        self.lowest_since_entry = self.lowest_since_entry.min(candle.low);

        let (favorable_price, adverse_price) = match self.side {
            Side::Long => (candle.high, candle.low),
            Side::Short => (candle.low, candle.high),
        };
        let favorable = Self::pnl_percent_at(self.entry_price, favorable_price, self.side);
        let adverse = Self::pnl_percent_at(self.entry_price, adverse_price, self.side);

        if favorable > self.mfe_percent {
            self.mfe_percent = favorable;
            self.mfe_bar = bar_index;
        }
        if adverse < self.mae_percent {
            self.mae_percent = adverse;
            self.mae_bar = bar_index;
        }
    }

    /// Holding-cost accrual for FUTURES (funding settlements) and MARGIN
    /// (continuous interest) positions (§4.4).
    pub fn accrue_holding_costs(
        &mut self,
        market_type: MarketType,
        candle: &Candle,
        prev_bar_time: i64,
        funding_rates: &[FundingRate],
        margin_interest_hourly: f64,
    ) {
        match market_type {
            MarketType::Futures => {
                for settlement in funding_rates {
                    if settlement.timestamp > prev_bar_time
                        && settlement.timestamp <= candle.timestamp
                        && settlement.timestamp > self.last_funding_time
                    {
                        let sign = self.side.sign();
                        self.accumulated_holding_costs += sign * self.remaining_qty * candle.close * settlement.rate;
                        self.last_funding_time = settlement.timestamp;
                    }
                }
            }
            MarketType::Margin => {
                let notional = self.remaining_qty * candle.close;
                let hours = (candle.timestamp - self.last_interest_time) as f64 / 3_600_000.0;
                self.accumulated_holding_costs += notional * (margin_interest_hourly / 100.0) * hours;
                self.last_interest_time = candle.timestamp;
            }
            MarketType::Spot => {}
        }
    }

    /// §4.4 `calculateExitQuantity`.
    pub fn calculate_exit_quantity(&mut self, zone: &ExitZone) -> f64 {
        if self.last_zone_name.as_deref() != Some(zone.name.as_str()) && zone.exit_reentry == ExitReentry::Reset {
            self.zone_exit_count.clear();
        }
        self.last_zone_name = Some(zone.name.clone());

        let count = self.zone_exit_count.get(&zone.name).copied().unwrap_or(0);
        if count >= zone.max_exits {
            return 0.0;
        }

        let basis = match zone.exit_basis {
            crate::domain::strategy::ExitBasis::Original => self.original_qty,
            crate::domain::strategy::ExitBasis::Remaining => self.remaining_qty,
        };
        let target = basis * zone.exit_percent_or_full() / 100.0;
        target.clamp(0.0, self.remaining_qty)
    }

    /// §4.4 `recordPartialExit`.
    pub fn record_partial_exit(&mut self, zone_name: &str, qty: f64, bar: usize) {
        *self.zone_exit_count.entry(zone_name.to_string()).or_insert(0) += 1;
        self.remaining_qty -= qty;
        self.last_exit_bar = bar;
    }

    /// Holding costs allocated proportionally to the quantity exited,
    /// versus what remained before the exit (§9 "holding costs ...
    /// allocated proportionally on each partial exit").
    pub fn allocate_holding_costs(&self, exit_qty: f64, qty_before_exit: f64) -> f64 {
        if qty_before_exit <= 0.0 {
            return 0.0;
        }
        self.accumulated_holding_costs * (exit_qty / qty_before_exit)
    }
}

/// Scans a context window of `CONTEXT_BARS` bars around `entry_bar` / the
/// exit bar for the best counterfactual price (§4.4 better-entry /
/// better-exit analysis). Returns `None` when the window is empty (e.g.
/// an exit at `end_of_data`) or the counterfactual is not an improvement.
pub fn better_entry_analysis(candles: &[Candle], entry_bar: usize, entry_price: f64, side: Side) -> Option<crate::domain::BetterPrice> {
    let start = entry_bar.saturating_sub(CONTEXT_BARS);
    if start >= entry_bar || entry_bar == 0 {
        return None;
    }
    let window = &candles[start..entry_bar];
    let (bar_offset, best_price) = match side {
        Side::Long => window
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.low.total_cmp(&b.1.low))
            .map(|(i, c)| (i, c.low))?,
        Side::Short => window
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.high.total_cmp(&b.1.high))
            .map(|(i, c)| (i, c.high))?,
    };
    let improvement = match side {
        Side::Long => (entry_price - best_price) / entry_price * 100.0,
        Side::Short => (best_price - entry_price) / entry_price * 100.0,
    };
    if improvement > 0.0 {
        Some(crate::domain::BetterPrice { bar: start + bar_offset, price: best_price, improvement })
    } else {
        None
    }
}

pub fn better_exit_analysis(candles: &[Candle], exit_bar: usize, exit_price: f64, side: Side) -> Option<crate::domain::BetterPrice> {
    let end = (exit_bar + 1 + CONTEXT_BARS).min(candles.len());
    let start = exit_bar + 1;
    if start >= end {
        return None;
    }
    let window = &candles[start..end];
    let (bar_offset, best_price) = match side {
        Side::Long => window
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.high.total_cmp(&b.1.high))
            .map(|(i, c)| (i, c.high))?,
        Side::Short => window
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.low.total_cmp(&b.1.low))
            .map(|(i, c)| (i, c.low))?,
    };
    let improvement = match side {
        Side::Long => (best_price - exit_price) / exit_price * 100.0,
        Side::Short => (exit_price - best_price) / exit_price * 100.0,
    };
    if improvement > 0.0 {
        Some(crate::domain::BetterPrice { bar: start + bar_offset, price: best_price, improvement })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(h: f64, l: f64, c: f64) -> Candle {
        Candle { timestamp: 0, open: c, high: h, low: l, close: c, volume: 1.0 }
    }

    #[test]
    fn mfe_mae_track_best_and_worst_excursion_long() {
        let mut state = OpenTradeState::new("s".into(), Side::Long, 0, 0, 100.0, 10.0, 0.0, "pos-0".into());
        state.update_extrema_and_excursion(&candle(110.0, 95.0, 105.0), 1);
        assert!((state.mfe_percent - 10.0).abs() < 1e-9);
        assert!((state.mae_percent - (-5.0)).abs() < 1e-9);
        assert_eq!(state.mfe_bar, 1);
        assert_eq!(state.mae_bar, 1);
    }

    #[test]
    fn mfe_mae_never_retreat() {
        let mut state = OpenTradeState::new("s".into(), Side::Long, 0, 0, 100.0, 10.0, 0.0, "pos-0".into());
        state.update_extrema_and_excursion(&candle(120.0, 90.0, 100.0), 1);
        state.update_extrema_and_excursion(&candle(105.0, 100.0, 102.0), 2);
        assert!((state.mfe_percent - 20.0).abs() < 1e-9);
        assert!((state.mae_percent - (-10.0)).abs() < 1e-9);
        assert_eq!(state.mfe_bar, 1);
        assert_eq!(state.mae_bar, 1);
    }

    #[test]
    fn calculate_exit_quantity_resets_count_on_zone_reentry() {
        use crate::domain::strategy::{ExitBasis, StopLossType, TakeProfitType};
        let mut state = OpenTradeState::new("s".into(), Side::Long, 0, 0, 100.0, 10.0, 0.0, "pos-0".into());
        let zone = ExitZone {
            name: "z".into(),
            pnl_range: (0.0, 10.0),
            stop_loss_type: StopLossType::None,
            stop_loss_value: None,
            take_profit_type: TakeProfitType::None,
            take_profit_value: None,
            exit_condition_ast: None,
            exit_immediately: false,
            min_bars_before_exit: 0,
            min_bars_between_exits: 0,
            exit_percent: Some(50.0),
            exit_basis: ExitBasis::Remaining,
            exit_reentry: ExitReentry::Reset,
            max_exits: 2,
            required_phase_ids: vec![],
            excluded_phase_ids: vec![],
            required_exit_pattern_ids: vec![],
            excluded_exit_pattern_ids: vec![],
        };
        let qty = state.calculate_exit_quantity(&zone);
        assert!((qty - 5.0).abs() < 1e-9);
        state.record_partial_exit("z", qty, 1);
        assert!((state.remaining_qty - 5.0).abs() < 1e-9);
    }

    #[test]
    fn max_exits_reached_returns_zero() {
        use crate::domain::strategy::{ExitBasis, StopLossType, TakeProfitType};
        let mut state = OpenTradeState::new("s".into(), Side::Long, 0, 0, 100.0, 10.0, 0.0, "pos-0".into());
        let zone = ExitZone {
            name: "z".into(),
            pnl_range: (0.0, 10.0),
            stop_loss_type: StopLossType::None,
            stop_loss_value: None,
            take_profit_type: TakeProfitType::None,
            take_profit_value: None,
            exit_condition_ast: None,
            exit_immediately: false,
            min_bars_before_exit: 0,
            min_bars_between_exits: 0,
            exit_percent: Some(100.0),
            exit_basis: ExitBasis::Remaining,
            exit_reentry: ExitReentry::Persist,
            max_exits: 1,
            required_phase_ids: vec![],
            excluded_phase_ids: vec![],
            required_exit_pattern_ids: vec![],
            excluded_exit_pattern_ids: vec![],
        };
        let qty = state.calculate_exit_quantity(&zone);
        state.record_partial_exit("z", qty, 1);
        let qty2 = state.calculate_exit_quantity(&zone);
        assert_eq!(qty2, 0.0);
    }

    #[test]
    fn empty_forward_window_yields_no_better_exit() {
        let candles = vec![candle(100.0, 99.0, 100.0); 3];
        assert!(better_exit_analysis(&candles, 2, 100.0, Side::Long).is_none());
    }
}
