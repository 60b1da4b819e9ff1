//! Exit-zone selector & trigger (C5, §4.5): maps current unrealized-P&L%
//! to an active zone and derives the exit reason/price, in the priority
//! order the spec's "Tie-breaks" pin down: emergency/market exits beat
//! normal exits; within a trade's normal path, trailing stop beats fixed
//! stop beats take-profit beats signal; among zones matching the same
//! P&L%, the first declared wins.

use crate::domain::strategy::{ExitZone, StopLossType, TakeProfitType};
use crate::domain::{BacktestContext, Candle, ExitReason, Side};
use crate::dsl::evaluator::Evaluator;
use crate::position::open_trade::OpenTradeState;

#[derive(Debug, Clone, PartialEq)]
pub struct ZoneOutcome {
    pub reason: ExitReason,
    pub price: f64,
    pub zone_name: String,
    /// Emergency exits bypass every normal-path timing gate (§4.5 tie-breaks).
    pub emergency: bool,
}

/// First zone whose range covers `pnl_percent`, has `exitImmediately =
/// true`, and whose phase filters pass (§4.5 step 2).
pub fn emergency_scan<'z>(zones: &'z [ExitZone], pnl_percent: f64, ctx: &BacktestContext, bar_index: usize) -> Option<&'z ExitZone> {
    zones.iter().find(|z| {
        z.matches(pnl_percent)
            && z.exit_immediately
            && ctx.all_phases_active(&z.required_phase_ids, &z.excluded_phase_ids, bar_index)
    })
}

/// First zone whose range covers `pnl_percent` and whose phase filters
/// pass; falls back to the first declared zone if none match (§4.5 step
/// 3, and §9's "fallback to first zone" Open Question resolution: the
/// source's fallback behavior is retained verbatim, not redesigned away).
/// Returns `(zone, is_fallback)`.
pub fn select_zone<'z>(zones: &'z [ExitZone], pnl_percent: f64, ctx: &BacktestContext, bar_index: usize) -> Option<(&'z ExitZone, bool)> {
    if let Some(z) = zones
        .iter()
        .find(|z| z.matches(pnl_percent) && ctx.all_phases_active(&z.required_phase_ids, &z.excluded_phase_ids, bar_index))
    {
        return Some((z, false));
    }
    zones.first().map(|z| (z, true))
}

fn stop_distance(entry_price: f64, value: f64, atr14: f64, is_atr: bool) -> f64 {
    if is_atr {
        atr14 * value
    } else {
        entry_price * value / 100.0
    }
}

/// Evaluates one trade's normal exit path against the zone `select_zone`
/// chose for it. Returns `None` when the zone's timing gates block this
/// bar or nothing triggers.
#[allow(clippy::too_many_arguments)]
pub fn zone_trigger(
    trade: &mut OpenTradeState,
    zone: &ExitZone,
    is_fallback: bool,
    candle: &Candle,
    bar_index: usize,
    entry_price_for_pnl: f64,
    atr14: f64,
    evaluator: &Evaluator,
    ctx: &BacktestContext,
) -> Option<ZoneOutcome> {
    if bar_index.saturating_sub(trade.entry_bar) < zone.min_bars_before_exit as usize {
        return None;
    }
    if bar_index.saturating_sub(trade.last_exit_bar) < zone.min_bars_between_exits as usize {
        return None;
    }

    // A fallback selection disables the `exitImmediately`/`market_exit`
    // semantics of the zone it lands on (§4.5 step 3).
    if zone.exit_immediately && !is_fallback {
        return market_exit(zone, candle, bar_index, evaluator, ctx);
    }

    if let Some(outcome) = clear_or_trailing_stop(trade, zone, candle, atr14) {
        return Some(outcome);
    }
    if let Some(outcome) = fixed_stop(trade, zone, candle, entry_price_for_pnl, atr14) {
        return Some(outcome);
    }
    if let Some(outcome) = take_profit(zone, candle, entry_price_for_pnl, atr14, trade.side) {
        return Some(outcome);
    }
    signal_exit(zone, candle, bar_index, evaluator, ctx)
}

/// Only the DSL exit condition is evaluated; SL/TP are skipped entirely
/// (§4.5 "For a market_exit zone").
fn market_exit(zone: &ExitZone, candle: &Candle, bar_index: usize, evaluator: &Evaluator, ctx: &BacktestContext) -> Option<ZoneOutcome> {
    let ast = zone.exit_condition_ast.as_ref()?;
    if !ctx.patterns_match(&zone.required_exit_pattern_ids, &zone.excluded_exit_pattern_ids, bar_index) {
        return None;
    }
    if evaluator.evaluate(ast, bar_index).unwrap_or(false) {
        Some(ZoneOutcome { reason: ExitReason::MarketExit, price: candle.close, zone_name: zone.name.clone(), emergency: false })
    } else {
        None
    }
}

/// Step (a) `CLEAR` resets trailing state and falls through to (b); step
/// (b) trailing stop (§4.5).
fn clear_or_trailing_stop(trade: &mut OpenTradeState, zone: &ExitZone, candle: &Candle, atr14: f64) -> Option<ZoneOutcome> {
    if zone.stop_loss_type == StopLossType::Clear {
        trade.trailing_stop_price = 0.0;
        match trade.side {
            Side::Long => trade.highest_since_entry = candle.close,
            Side::Short => trade.lowest_since_entry = candle.close,
        }
        return None;
    }

    let is_trailing = matches!(zone.stop_loss_type, StopLossType::TrailingPercent | StopLossType::TrailingAtr);
    let value = zone.stop_loss_value.unwrap_or(0.0);
    if !is_trailing || value <= 0.0 {
        return None;
    }
    let is_atr = zone.stop_loss_type == StopLossType::TrailingAtr;

    match trade.side {
        Side::Long => {
            let distance = stop_distance(trade.highest_since_entry, value, atr14, is_atr);
            let candidate = trade.highest_since_entry - distance;
            trade.trailing_stop_price = if trade.trailing_stop_price == 0.0 {
                candidate
            } else {
                trade.trailing_stop_price.max(candidate)
            };
            if candle.low <= trade.trailing_stop_price {
                return Some(ZoneOutcome {
                    reason: ExitReason::TrailingStop,
                    price: trade.trailing_stop_price,
                    zone_name: zone.name.clone(),
                    emergency: false,
                });
            }
        }
        Side::Short => {
            let distance = stop_distance(trade.lowest_since_entry, value, atr14, is_atr);
            let candidate = trade.lowest_since_entry + distance;
            trade.trailing_stop_price = if trade.trailing_stop_price == 0.0 {
                candidate
            } else {
                trade.trailing_stop_price.min(candidate)
            };
            if candle.high >= trade.trailing_stop_price {
                return Some(ZoneOutcome {
                    reason: ExitReason::TrailingStop,
                    price: trade.trailing_stop_price,
                    zone_name: zone.name.clone(),
                    emergency: false,
                });
            }
        }
    }
    None
}

fn fixed_stop(trade: &OpenTradeState, zone: &ExitZone, candle: &Candle, entry_price: f64, atr14: f64) -> Option<ZoneOutcome> {
    if matches!(zone.stop_loss_type, StopLossType::None | StopLossType::Clear | StopLossType::TrailingPercent | StopLossType::TrailingAtr) {
        return None;
    }
    let value = zone.stop_loss_value?;
    let is_atr = zone.stop_loss_type == StopLossType::FixedAtr;
    let distance = stop_distance(entry_price, value, atr14, is_atr);
    match trade.side {
        Side::Long => {
            let stop_price = entry_price - distance;
            if candle.low <= stop_price {
                Some(ZoneOutcome { reason: ExitReason::StopLoss, price: stop_price, zone_name: zone.name.clone(), emergency: false })
            } else {
                None
            }
        }
        Side::Short => {
            let stop_price = entry_price + distance;
            if candle.high >= stop_price {
                Some(ZoneOutcome { reason: ExitReason::StopLoss, price: stop_price, zone_name: zone.name.clone(), emergency: false })
            } else {
                None
            }
        }
    }
}

fn take_profit(zone: &ExitZone, candle: &Candle, entry_price: f64, atr14: f64, side: Side) -> Option<ZoneOutcome> {
    if zone.take_profit_type == TakeProfitType::None {
        return None;
    }
    let value = zone.take_profit_value?;
    let is_atr = matches!(zone.take_profit_type, TakeProfitType::FixedAtr | TakeProfitType::TrailingAtr);
    let distance = stop_distance(entry_price, value, atr14, is_atr);
    match side {
        Side::Long => {
            let tp_price = entry_price + distance;
            if candle.high >= tp_price {
                Some(ZoneOutcome { reason: ExitReason::TakeProfit, price: tp_price, zone_name: zone.name.clone(), emergency: false })
            } else {
                None
            }
        }
        Side::Short => {
            let tp_price = entry_price - distance;
            if candle.low <= tp_price {
                Some(ZoneOutcome { reason: ExitReason::TakeProfit, price: tp_price, zone_name: zone.name.clone(), emergency: false })
            } else {
                None
            }
        }
    }
}

fn signal_exit(zone: &ExitZone, candle: &Candle, bar_index: usize, evaluator: &Evaluator, ctx: &BacktestContext) -> Option<ZoneOutcome> {
    let ast = zone.exit_condition_ast.as_ref()?;
    if !ctx.patterns_match(&zone.required_exit_pattern_ids, &zone.excluded_exit_pattern_ids, bar_index) {
        return None;
    }
    if evaluator.evaluate(ast, bar_index).unwrap_or(false) {
        Some(ZoneOutcome { reason: ExitReason::Signal, price: candle.close, zone_name: zone.name.clone(), emergency: false })
    } else {
        None
    }
}

/// Top-level per-trade exit evaluation composing the emergency scan and
/// the normal path (§4.5 steps 1-3).
#[allow(clippy::too_many_arguments)]
pub fn evaluate_exit(
    trade: &mut OpenTradeState,
    zones: &[ExitZone],
    candle: &Candle,
    bar_index: usize,
    entry_price_for_pnl: f64,
    atr14: f64,
    evaluator: &Evaluator,
    ctx: &BacktestContext,
    dca_complete: bool,
) -> Option<ZoneOutcome> {
    let pnl_percent = OpenTradeState::pnl_percent_at(entry_price_for_pnl, candle.close, trade.side);

    if let Some(zone) = emergency_scan(zones, pnl_percent, ctx, bar_index) {
        return Some(ZoneOutcome {
            reason: ExitReason::ZoneExit,
            price: candle.close,
            zone_name: zone.name.clone(),
            emergency: true,
        });
    }

    if !dca_complete {
        return None;
    }

    let (zone, is_fallback) = select_zone(zones, pnl_percent, ctx, bar_index)?;
    let zone = zone.clone();
    zone_trigger(trade, &zone, is_fallback, candle, bar_index, entry_price_for_pnl, atr14, evaluator, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::strategy::{ExitBasis, ExitReentry};

    fn zone(name: &str, lo: f64, hi: f64, sl_type: StopLossType, sl_value: Option<f64>, tp_type: TakeProfitType, tp_value: Option<f64>) -> ExitZone {
        ExitZone {
            name: name.to_string(),
            pnl_range: (lo, hi),
            stop_loss_type: sl_type,
            stop_loss_value: sl_value,
            take_profit_type: tp_type,
            take_profit_value: tp_value,
            exit_condition_ast: None,
            exit_immediately: false,
            min_bars_before_exit: 0,
            min_bars_between_exits: 0,
            exit_percent: None,
            exit_basis: ExitBasis::Original,
            exit_reentry: ExitReentry::Persist,
            max_exits: 1,
            required_phase_ids: vec![],
            excluded_phase_ids: vec![],
            required_exit_pattern_ids: vec![],
            excluded_exit_pattern_ids: vec![],
        }
    }

    fn candle(h: f64, l: f64, c: f64) -> Candle {
        Candle { timestamp: 0, open: c, high: h, low: l, close: c, volume: 1.0 }
    }

    #[test]
    fn fixed_stop_loss_triggers_on_low_breach() {
        let trade = OpenTradeState::new("s".into(), Side::Long, 0, 0, 100.0, 1.0, 0.0, "pos-0".into());
        let z = zone("z", -100.0, 100.0, StopLossType::FixedPercent, Some(5.0), TakeProfitType::None, None);
        let outcome = fixed_stop(&trade, &z, &candle(100.0, 95.0, 96.0), trade.entry_price, 0.0);
        assert_eq!(outcome, Some(ZoneOutcome { reason: ExitReason::StopLoss, price: 95.0, zone_name: "z".into(), emergency: false }));
    }

    #[test]
    fn emergency_zone_bypasses_min_bars_before_exit() {
        let zones = vec![
            zone("emergency", -100.0, -5.0, StopLossType::None, None, TakeProfitType::None, None),
            zone("normal", -5.0, 100.0, StopLossType::None, None, TakeProfitType::None, None),
        ];
        let mut zones = zones;
        zones[0].exit_immediately = true;
        let ctx = BacktestContext::default();
        let found = emergency_scan(&zones, -6.0, &ctx, 0);
        assert_eq!(found.unwrap().name, "emergency");
    }

    #[test]
    fn select_zone_falls_back_to_first_when_none_match() {
        let zones = vec![zone("only", 5.0, 10.0, StopLossType::None, None, TakeProfitType::None, None)];
        let ctx = BacktestContext::default();
        let (z, is_fallback) = select_zone(&zones, 0.0, &ctx, 0).unwrap();
        assert_eq!(z.name, "only");
        assert!(is_fallback);
    }

    #[test]
    fn trailing_stop_never_loosens_long() {
        let mut trade = OpenTradeState::new("s".into(), Side::Long, 0, 0, 100.0, 1.0, 0.0, "pos-0".into());
        trade.highest_since_entry = 110.0;
        let z = zone("z", -100.0, 100.0, StopLossType::TrailingPercent, Some(2.0), TakeProfitType::None, None);
        let outcome = clear_or_trailing_stop(&mut trade, &z, &candle(110.0, 109.0, 110.0), 0.0);
        assert!(outcome.is_none());
        assert!((trade.trailing_stop_price - 107.8).abs() < 1e-9);

        // A later bar where highest doesn't advance but low breaches 107.8.
        let outcome = clear_or_trailing_stop(&mut trade, &z, &candle(109.0, 107.5, 108.0), 0.0);
        assert_eq!(outcome, Some(ZoneOutcome { reason: ExitReason::TrailingStop, price: 107.8, zone_name: "z".into(), emergency: false }));
    }
}
