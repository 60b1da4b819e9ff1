//! The per-bar simulation driver (C7): composes the indicator engine
//! (C1), the DSL evaluator (C2), the pending-order state machine (C3),
//! open-trade analytics (C4), the exit-zone selector (C5), and the
//! position/DCA manager (C6) into one `run()` entry point.
//!
//! Per-bar operation order is fixed: update extrema/holding costs, then
//! the exit pass (emergency zones cascade a whole DCA group; the normal
//! path runs only once a DCA position is complete), then DCA-abort
//! check, then pending-order advance, then a fresh entry decision.

use std::time::Instant;

use tracing::{debug, trace, warn};

use crate::domain::strategy::{EntryOrderType, ExitBasis, Strategy};
use crate::domain::{
    BacktestConfig, BacktestContext, BacktestResult, Candle, ConfigHash, ExitReason, ProgressCallback, Progress, RunId, Side, Trade,
};
use crate::dsl::warmup::warmup_bars_for_all;
use crate::dsl::Evaluator;
use crate::error::{bar_error, SimError, MAX_ERRORS};
use crate::indicators::IndicatorEngine;
use crate::metrics::PerformanceMetrics;
use crate::orders::{BarOutcome, PendingOrder};
use crate::position::manager::{entry_signal_active, should_abort_dca_group, EntryDecision};
use crate::position::{average_entry_price, better_entry_analysis, better_exit_analysis, evaluate_exit, size_position, OpenTradeState, PositionManager, ZoneOutcome};

const PROGRESS_EVERY_BARS: usize = 500;
const ATR_PERIOD: usize = 14;

/// One outstanding pending entry order plus the placement decision that
/// created it (which DCA group it fills into, if any).
struct PendingEntry {
    order: PendingOrder,
    is_dca: bool,
    group_id: String,
}

/// Runs one backtest to completion. Fatal configuration errors (an empty
/// zone list today; a foreign AST parser's failures upstream of this
/// crate) never panic or propagate as `Err` — they are caught here and
/// returned as a `BacktestResult` with no trades and the error recorded,
/// per the error taxonomy's fatal/non-fatal split.
pub fn run(strategy: &Strategy, config: &BacktestConfig, ctx: &BacktestContext, mut on_progress: Option<&mut ProgressCallback>) -> BacktestResult {
    let started_at = Instant::now();
    let n = ctx.candles.len();
    debug!(strategy_id = %strategy.id, strategy_name = %strategy.name, candles = n, "run starting");

    if let Err(err) = validate(strategy) {
        warn!(strategy_id = %strategy.id, error = %err, "fatal configuration error, aborting before the per-bar loop");
        return fatal_result(strategy, config, ctx, err, started_at);
    }

    let mut engine = IndicatorEngine::new(ctx.candles.clone());
    engine.set_agg_trades(ctx.agg_trades.clone());
    engine.set_funding_rates(ctx.funding_rates.clone());
    engine.set_open_interest(ctx.open_interest.clone());
    let evaluator = Evaluator::new(&engine);

    let mut asts = vec![&strategy.entry_ast];
    asts.extend(strategy.exit_zones.iter().filter_map(|z| z.exit_condition_ast.as_ref()));
    let warmup = warmup_bars_for_all(asts);
    debug!(warmup, "warmup period resolved");

    let mut equity = config.initial_capital;
    let mut equity_curve: Vec<f64> = Vec::with_capacity(n);
    let mut trades: Vec<Trade> = Vec::new();
    let mut errors: Vec<String> = Vec::new();

    let mut groups: Vec<Vec<OpenTradeState>> = Vec::new();
    let mut pending_entry: Option<PendingEntry> = None;
    let mut position_manager = PositionManager::new();
    let mut last_trade_exit_bar: Option<usize> = None;
    let mut bars_evaluated = 0usize;

    for bar_index in 0..n {
        let candle = ctx.candles[bar_index];
        equity_curve.push(equity);

        if candle.is_void() {
            push_error(&mut errors, bar_error(bar_index, "void candle, skipped"));
            continue;
        }
        if bar_index < warmup {
            continue;
        }
        bars_evaluated += 1;

        let prev_bar_time = if bar_index > 0 { ctx.candles[bar_index - 1].timestamp } else { candle.timestamp };
        let atr14 = engine.atr(ATR_PERIOD, bar_index);

        for group in groups.iter_mut() {
            for leg in group.iter_mut() {
                leg.update_extrema_and_excursion(&candle, bar_index);
                leg.accrue_holding_costs(config.market_type, &candle, prev_bar_time, &ctx.funding_rates, config.margin_interest_hourly);
            }
        }

        run_exit_pass(strategy, config, &evaluator, ctx, &candle, bar_index, atr14, &mut groups, &mut equity, &mut trades, &mut last_trade_exit_bar);

        if strategy.dca_enabled {
            let signal_active = entry_signal_active(strategy, &evaluator, ctx, bar_index);
            if should_abort_dca_group(strategy, signal_active) && !groups.is_empty() {
                debug!(bar_index, groups = groups.len(), "DCA group abort: entry signal lost");
                abort_all_groups(&candle, bar_index, &ctx.candles, &mut groups, &mut equity, &mut trades, config.commission);
                last_trade_exit_bar = Some(bar_index);
            }
        }

        if let Some(entry) = pending_entry.as_mut() {
            match entry.order.process_bar(&candle, bar_index) {
                BarOutcome::Filled { price } => {
                    let is_dca = entry.is_dca;
                    let group_id = entry.group_id.clone();
                    open_entry(strategy, config, ctx, &mut groups, &mut equity, price, candle.timestamp, bar_index, &group_id, is_dca, atr14, &mut trades);
                    pending_entry = None;
                }
                BarOutcome::Expired => {
                    // Not an error (§7): the order simply never filled. Emit the
                    // one `expired` trade record §3/§8 require, with no position
                    // ever opened.
                    let signal_bar = entry.order.signal_bar;
                    let signal_price = entry.order.signal_price;
                    let group_id = entry.group_id.clone();
                    let signal_time = ctx.candles.get(signal_bar).map(|c| c.timestamp).unwrap_or(candle.timestamp);
                    trace!(bar_index, signal_bar, group_id = %group_id, "pending entry expired unfilled");
                    trades.push(Trade {
                        strategy_id: strategy.id.clone(),
                        side: strategy.direction,
                        entry_bar: signal_bar,
                        entry_time: signal_time,
                        entry_price: signal_price,
                        quantity: 0.0,
                        commission: 0.0,
                        group_id,
                        exit_bar: Some(bar_index),
                        exit_time: Some(candle.timestamp),
                        exit_price: None,
                        exit_reason: Some(ExitReason::Expired),
                        exit_zone: None,
                        pnl: None,
                        pnl_percent: None,
                        mfe_percent: None,
                        mae_percent: None,
                        mfe_bar: None,
                        mae_bar: None,
                        entry_phases: None,
                        entry_indicators: None,
                        exit_phases: None,
                        exit_indicators: None,
                        holding_costs: None,
                        better_entry: None,
                        better_exit: None,
                    });
                    pending_entry = None;
                }
                BarOutcome::StillPending => {}
            }
        }

        if pending_entry.is_none() {
            let open_position_count = groups.len() as u32;
            let current_group = if strategy.dca_enabled {
                groups.iter().find(|g| (g.len() as u32) < strategy.dca_max_entries).map(|g| {
                    let last_entry_bar = g.iter().map(|t| t.entry_bar).max().unwrap_or(bar_index);
                    (g[0].group_id.clone(), g.len() as u32, last_entry_bar)
                })
            } else {
                None
            };

            let decision = position_manager.decide_entry(
                strategy,
                &evaluator,
                ctx,
                bar_index,
                open_position_count,
                current_group.as_ref().map(|(gid, n, last)| (gid.as_str(), *n, *last)),
                last_trade_exit_bar,
            );

            match decision {
                EntryDecision::None => {}
                EntryDecision::NewPosition { group_id } => {
                    debug!(bar_index, group_id = %group_id, "opening new position");
                    schedule_entry(strategy, &candle, bar_index, atr14, group_id, false, &mut pending_entry, config, ctx, &mut groups, &mut equity, &mut trades);
                }
                EntryDecision::DcaAdd { group_id } => {
                    debug!(bar_index, group_id = %group_id, "adding DCA entry");
                    schedule_entry(strategy, &candle, bar_index, atr14, group_id, true, &mut pending_entry, config, ctx, &mut groups, &mut equity, &mut trades);
                }
            }
        }

        if bar_index % PROGRESS_EVERY_BARS == 0 {
            if let Some(cb) = on_progress.as_deref_mut() {
                cb(Progress::new(bar_index, n), "simulating");
            }
        }
    }

    let last_candle = ctx.candles.last().copied();
    if let Some(candle) = last_candle {
        force_close_all(&candle, n.saturating_sub(1), &ctx.candles, &mut groups, &mut equity, &mut trades, config.commission);
    }
    equity_curve.push(equity);

    if let Some(cb) = on_progress.as_deref_mut() {
        cb(Progress::new(n, n), "complete");
    }

    debug!(bars_evaluated, trades = trades.len(), errors = errors.len(), duration_ms = started_at.elapsed().as_millis() as i64, "run complete");

    let metrics = PerformanceMetrics::compute(&equity_curve, &trades, config.initial_capital);

    let config_hash = ConfigHash::from_bytes(&serde_json::to_vec(&(config, &strategy.id, &strategy.exit_zones.len())).unwrap_or_default());
    let run_id = RunId::from_bytes(&serde_json::to_vec(&(&config_hash, trades.len(), bars_evaluated)).unwrap_or_default());

    let start_epoch_ms = ctx.candles.first().map(|c| c.timestamp).unwrap_or(0);
    let end_epoch_ms = ctx.candles.last().map(|c| c.timestamp).unwrap_or(0);

    BacktestResult {
        run_id,
        config_hash,
        strategy_id: strategy.id.clone(),
        strategy_name: strategy.name.clone(),
        config: config.clone(),
        trades,
        metrics,
        start_epoch_ms,
        end_epoch_ms,
        bars_evaluated,
        duration_ms: started_at.elapsed().as_millis() as i64,
        errors,
        warnings: Vec::new(),
    }
}

fn validate(strategy: &Strategy) -> Result<(), SimError> {
    if strategy.exit_zones.is_empty() {
        return Err(SimError::ZoneParse {
            zone: "<none>".to_string(),
            message: "a strategy must declare at least one exit zone".to_string(),
        });
    }
    Ok(())
}

fn fatal_result(strategy: &Strategy, config: &BacktestConfig, ctx: &BacktestContext, err: SimError, started_at: Instant) -> BacktestResult {
    let config_hash = ConfigHash::from_bytes(&serde_json::to_vec(&(config, &strategy.id)).unwrap_or_default());
    let run_id = RunId::from_bytes(err.to_string().as_bytes());
    BacktestResult {
        run_id,
        config_hash,
        strategy_id: strategy.id.clone(),
        strategy_name: strategy.name.clone(),
        config: config.clone(),
        trades: Vec::new(),
        metrics: PerformanceMetrics::compute(&[], &[], config.initial_capital),
        start_epoch_ms: ctx.candles.first().map(|c| c.timestamp).unwrap_or(0),
        end_epoch_ms: ctx.candles.last().map(|c| c.timestamp).unwrap_or(0),
        bars_evaluated: 0,
        duration_ms: started_at.elapsed().as_millis() as i64,
        errors: vec![err.to_string()],
        warnings: Vec::new(),
    }
}

fn push_error(errors: &mut Vec<String>, message: String) {
    warn!(%message, "recoverable per-bar error");
    if errors.len() < MAX_ERRORS {
        errors.push(message);
    }
}

#[allow(clippy::too_many_arguments)]
fn run_exit_pass(
    strategy: &Strategy,
    config: &BacktestConfig,
    evaluator: &Evaluator,
    ctx: &BacktestContext,
    candle: &Candle,
    bar_index: usize,
    atr14: f64,
    groups: &mut Vec<Vec<OpenTradeState>>,
    equity: &mut f64,
    trades: &mut Vec<Trade>,
    last_trade_exit_bar: &mut Option<usize>,
) {
    let mut i = 0;
    while i < groups.len() {
        let dca_complete = !strategy.dca_enabled || groups[i].len() as u32 >= strategy.dca_max_entries;
        let entry_price_for_pnl = {
            let refs: Vec<&OpenTradeState> = groups[i].iter().collect();
            average_entry_price(&refs)
        };

        let mut triggered: Option<ZoneOutcome> = None;
        for leg in groups[i].iter_mut() {
            if let Some(outcome) = evaluate_exit(leg, &strategy.exit_zones, candle, bar_index, entry_price_for_pnl, atr14, evaluator, ctx, dca_complete) {
                triggered = Some(outcome);
                break;
            }
        }

        if let Some(outcome) = triggered {
            trace!(zone = %outcome.zone_name, reason = ?outcome.reason, emergency = outcome.emergency, bar_index, "zone trigger");
            let zone = strategy.exit_zones.iter().find(|z| z.name == outcome.zone_name);
            let full_close = outcome.emergency || zone.map(|z| z.exit_percent_or_full() >= 100.0 - 1e-9).unwrap_or(true);
            let mut closed_any = false;

            if full_close {
                let zone_name = if outcome.emergency { Some(outcome.zone_name.as_str()) } else { zone.map(|z| z.name.as_str()) };
                let mut j = 0;
                while j < groups[i].len() {
                    let qty_before = groups[i][j].remaining_qty;
                    if qty_before <= 0.0 {
                        j += 1;
                        continue;
                    }
                    let trade = close_quantity(&mut groups[i][j], qty_before, bar_index, candle, outcome.price, outcome.reason, zone_name, &ctx.candles, config.commission);
                    *equity += trade.pnl.unwrap_or(0.0);
                    trades.push(trade);
                    closed_any = true;
                    if groups[i][j].is_fully_closed() {
                        groups[i].remove(j);
                    } else {
                        j += 1;
                    }
                }
            } else if let Some(z) = zone {
                // §9: distribute one group-level target proportionally by
                // each leg's remaining quantity, rather than recomputing the
                // target independently per leg. `calculate_exit_quantity`
                // still runs per leg first, purely for its `ExitReentry`/
                // `max_exits` bookkeeping and eligibility gating.
                let eligible: Vec<usize> = (0..groups[i].len())
                    .filter(|&idx| groups[i][idx].calculate_exit_quantity(z) > 0.0)
                    .collect();

                let basis_total: f64 = groups[i]
                    .iter()
                    .map(|leg| match z.exit_basis {
                        ExitBasis::Original => leg.original_qty,
                        ExitBasis::Remaining => leg.remaining_qty,
                    })
                    .sum();
                let remaining_eligible: f64 = eligible.iter().map(|&idx| groups[i][idx].remaining_qty).sum();
                let group_target = (basis_total * z.exit_percent_or_full() / 100.0).min(remaining_eligible);

                if group_target > 0.0 && remaining_eligible > 0.0 {
                    let mut removed = Vec::new();
                    for &idx in &eligible {
                        let leg_share = (group_target * (groups[i][idx].remaining_qty / remaining_eligible)).min(groups[i][idx].remaining_qty);
                        if leg_share <= 0.0 {
                            continue;
                        }
                        let trade = close_quantity(&mut groups[i][idx], leg_share, bar_index, candle, outcome.price, outcome.reason, Some(z.name.as_str()), &ctx.candles, config.commission);
                        *equity += trade.pnl.unwrap_or(0.0);
                        trades.push(trade);
                        closed_any = true;
                        if groups[i][idx].is_fully_closed() {
                            removed.push(idx);
                        }
                    }
                    for idx in removed.into_iter().rev() {
                        groups[i].remove(idx);
                    }
                }
            }
            if closed_any {
                *last_trade_exit_bar = Some(bar_index);
            }
        }

        if groups[i].is_empty() {
            groups.remove(i);
        } else {
            i += 1;
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn close_quantity(
    leg: &mut OpenTradeState,
    exit_qty: f64,
    bar_index: usize,
    candle: &Candle,
    price: f64,
    reason: ExitReason,
    zone_name: Option<&str>,
    candles: &[Candle],
    commission_rate: f64,
) -> Trade {
    let qty_before = leg.remaining_qty;
    let holding_cost = leg.allocate_holding_costs(exit_qty, qty_before);
    if let Some(name) = zone_name {
        leg.record_partial_exit(name, exit_qty, bar_index);
    } else {
        leg.remaining_qty -= exit_qty;
        leg.last_exit_bar = bar_index;
    }
    // §9: commission is charged symmetrically on entry and on each exit
    // event, on the exited notional. The entry-side commission accrued at
    // open is realized proportionally as each slice of the position closes.
    let entry_commission_alloc = if leg.original_qty > 0.0 { leg.commission * (exit_qty / leg.original_qty) } else { 0.0 };
    let exit_commission = price * exit_qty * commission_rate / 100.0;
    let total_commission = entry_commission_alloc + exit_commission;

    let pnl = (price - leg.entry_price) * leg.side.sign() * exit_qty - holding_cost - total_commission;
    let pnl_percent = OpenTradeState::pnl_percent_at(leg.entry_price, price, leg.side);
    let better_exit = better_exit_analysis(candles, bar_index, price, leg.side);

    Trade {
        strategy_id: leg.strategy_id.clone(),
        side: leg.side,
        entry_bar: leg.entry_bar,
        entry_time: leg.entry_time,
        entry_price: leg.entry_price,
        quantity: exit_qty,
        commission: total_commission,
        group_id: leg.group_id.clone(),
        exit_bar: Some(bar_index),
        exit_time: Some(candle.timestamp),
        exit_price: Some(price),
        exit_reason: Some(reason),
        exit_zone: zone_name.map(|s| s.to_string()),
        pnl: Some(pnl),
        pnl_percent: Some(pnl_percent),
        mfe_percent: Some(leg.mfe_percent),
        mae_percent: Some(leg.mae_percent),
        mfe_bar: Some(leg.mfe_bar),
        mae_bar: Some(leg.mae_bar),
        entry_phases: None,
        entry_indicators: None,
        exit_phases: None,
        exit_indicators: None,
        holding_costs: Some(holding_cost),
        better_entry: leg.better_entry,
        better_exit,
    }
}

fn abort_all_groups(candle: &Candle, bar_index: usize, candles: &[Candle], groups: &mut Vec<Vec<OpenTradeState>>, equity: &mut f64, trades: &mut Vec<Trade>, commission_rate: f64) {
    for group in groups.iter_mut() {
        for leg in group.iter_mut() {
            if leg.remaining_qty <= 0.0 {
                continue;
            }
            let qty = leg.remaining_qty;
            let trade = close_quantity(leg, qty, bar_index, candle, candle.close, ExitReason::SignalLost, None, candles, commission_rate);
            *equity += trade.pnl.unwrap_or(0.0);
            trades.push(trade);
        }
    }
    groups.retain(|g| g.iter().any(|t| t.remaining_qty > 0.0));
}

fn force_close_all(candle: &Candle, bar_index: usize, candles: &[Candle], groups: &mut Vec<Vec<OpenTradeState>>, equity: &mut f64, trades: &mut Vec<Trade>, commission_rate: f64) {
    for group in groups.iter_mut() {
        for leg in group.iter_mut() {
            if leg.remaining_qty <= 0.0 {
                continue;
            }
            let qty = leg.remaining_qty;
            let trade = close_quantity(leg, qty, bar_index, candle, candle.close, ExitReason::EndOfData, None, candles, commission_rate);
            *equity += trade.pnl.unwrap_or(0.0);
            trades.push(trade);
        }
    }
    groups.clear();
}

#[allow(clippy::too_many_arguments)]
fn schedule_entry(
    strategy: &Strategy,
    candle: &Candle,
    bar_index: usize,
    atr14: f64,
    group_id: String,
    is_dca: bool,
    pending_entry: &mut Option<PendingEntry>,
    config: &BacktestConfig,
    ctx: &BacktestContext,
    groups: &mut Vec<Vec<OpenTradeState>>,
    equity: &mut f64,
    trades: &mut Vec<Trade>,
) {
    let settings = &strategy.entry_settings;
    if settings.order_type == EntryOrderType::Market {
        open_entry(strategy, config, ctx, groups, equity, candle.close, candle.timestamp, bar_index, &group_id, is_dca, atr14, trades);
        return;
    }

    let is_long = strategy.direction == Side::Long;
    let order = PendingOrder::new(
        bar_index,
        candle.close,
        settings.order_type,
        settings.offset_unit,
        settings.offset_value.unwrap_or(0.0),
        settings.trailing_reverse_percent.unwrap_or(0.0),
        settings.expiration_bars,
        is_long,
        atr14,
    );
    *pending_entry = Some(PendingEntry { order, is_dca, group_id });
}

#[allow(clippy::too_many_arguments)]
fn open_entry(
    strategy: &Strategy,
    config: &BacktestConfig,
    ctx: &BacktestContext,
    groups: &mut Vec<Vec<OpenTradeState>>,
    equity: &mut f64,
    price: f64,
    time: i64,
    bar_index: usize,
    group_id: &str,
    is_dca: bool,
    atr14: f64,
    trades: &mut Vec<Trade>,
) {
    let all_legs: Vec<OpenTradeState> = groups.iter().flatten().cloned().collect();
    let available = crate::position::available_capital(*equity, &all_legs);

    let stop_distance = strategy
        .exit_zones
        .iter()
        .find(|z| z.matches(0.0))
        .and_then(|z| z.stop_loss_value)
        .map(|v| price * v / 100.0);

    let value = size_position(config.position_sizing_type, config.position_sizing_value, *equity, price, stop_distance, atr14);
    let qty = crate::position::sizing::quantity_for_value(value, price, strategy.dca_enabled, strategy.dca_max_entries, available);

    if qty <= 0.0 {
        trades.push(Trade {
            strategy_id: strategy.id.clone(),
            side: strategy.direction,
            entry_bar: bar_index,
            entry_time: time,
            entry_price: price,
            quantity: 0.0,
            commission: 0.0,
            group_id: group_id.to_string(),
            exit_bar: Some(bar_index),
            exit_time: Some(time),
            exit_price: Some(price),
            exit_reason: Some(ExitReason::Rejected),
            exit_zone: None,
            pnl: Some(0.0),
            pnl_percent: Some(0.0),
            mfe_percent: None,
            mae_percent: None,
            mfe_bar: None,
            mae_bar: None,
            entry_phases: None,
            entry_indicators: None,
            exit_phases: None,
            exit_indicators: None,
            holding_costs: None,
            better_entry: None,
            better_exit: None,
        });
        return;
    }

    // Entry-side commission is not debited from equity here: it is carried
    // on the leg and realized (subtracted from pnl) as each slice of the
    // position closes, the same way holding costs are realized at exit.
    let commission = price * qty * config.commission / 100.0;

    let mut leg = OpenTradeState::new(strategy.id.clone(), strategy.direction, bar_index, time, price, qty, commission, group_id.to_string());
    leg.better_entry = better_entry_analysis(&ctx.candles, bar_index, price, strategy.direction);

    if is_dca {
        if let Some(group) = groups.iter_mut().find(|g| g.iter().any(|t| t.group_id == group_id)) {
            group.push(leg);
            return;
        }
    }
    groups.push(vec![leg]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::strategy::{EntrySettings, ExitBasis, ExitReentry, ExitZone, HoopPatternSettings, MarketType, PositionSizingType, StopLossType, TakeProfitType};
    use crate::dsl::ast::{AstNode, CompareOp, PriceField};

    fn flat_candles(n: usize, price: f64) -> Vec<Candle> {
        (0..n)
            .map(|i| Candle { timestamp: i as i64 * 60_000, open: price, high: price, low: price, close: price, volume: 1.0 })
            .collect()
    }

    fn trivial_long_always_on() -> Strategy {
        Strategy {
            id: "s".into(),
            name: "trivial".into(),
            direction: Side::Long,
            entry_ast: AstNode::BooleanLiteral { value: true },
            exit_zones: vec![ExitZone {
                name: "z0".into(),
                pnl_range: (-1000.0, 1000.0),
                stop_loss_type: StopLossType::None,
                stop_loss_value: None,
                take_profit_type: TakeProfitType::None,
                take_profit_value: None,
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
            }],
            entry_settings: EntrySettings::default(),
            dca_enabled: false,
            dca_max_entries: 1,
            dca_bars_between: 0,
            dca_mode: crate::domain::strategy::DcaMode::Pause,
            max_open_trades: 1,
            min_candles_between_trades: 0,
            required_phase_ids: vec![],
            excluded_phase_ids: vec![],
            hoop_pattern_settings: HoopPatternSettings::default(),
        }
    }

    fn config() -> BacktestConfig {
        BacktestConfig {
            symbol: "TEST".into(),
            resolution: "1h".into(),
            start_date: "2024-01-01".into(),
            end_date: "2024-01-02".into(),
            initial_capital: 10_000.0,
            commission: 0.0,
            position_sizing_type: PositionSizingType::FixedPercent,
            position_sizing_value: 50.0,
            market_type: MarketType::Spot,
            margin_interest_hourly: 0.0,
        }
    }

    #[test]
    fn trivial_long_opens_and_force_closes_at_end_of_data() {
        let strategy = trivial_long_always_on();
        let cfg = config();
        let ctx = BacktestContext { candles: flat_candles(80, 100.0), ..Default::default() };
        let result = run(&strategy, &cfg, &ctx, None);
        assert!(!result.trades.is_empty());
        let last = result.trades.last().unwrap();
        assert_eq!(last.exit_reason, Some(ExitReason::EndOfData));
    }

    #[test]
    fn fixed_stop_loss_closes_the_trade() {
        let mut strategy = trivial_long_always_on();
        strategy.exit_zones[0].stop_loss_type = StopLossType::FixedPercent;
        strategy.exit_zones[0].stop_loss_value = Some(2.0);
        let cfg = config();

        let mut candles = flat_candles(60, 100.0);
        // A deep drop right after warmup should trip the 2% stop.
        for c in candles.iter_mut().skip(55) {
            c.low = 90.0;
            c.close = 95.0;
        }
        let ctx = BacktestContext { candles, ..Default::default() };
        let result = run(&strategy, &cfg, &ctx, None);
        assert!(result.trades.iter().any(|t| t.exit_reason == Some(ExitReason::StopLoss)));
    }

    #[test]
    fn empty_exit_zones_is_a_fatal_config_error_not_a_panic() {
        let mut strategy = trivial_long_always_on();
        strategy.exit_zones.clear();
        let cfg = config();
        let ctx = BacktestContext { candles: flat_candles(5, 100.0), ..Default::default() };
        let result = run(&strategy, &cfg, &ctx, None);
        assert!(result.trades.is_empty());
        assert!(!result.errors.is_empty());
    }

    #[test]
    fn entry_signal_never_true_produces_no_trades() {
        let mut strategy = trivial_long_always_on();
        strategy.entry_ast = AstNode::cmp(AstNode::price(PriceField::Close), CompareOp::Gt, AstNode::num(1_000_000.0));
        let cfg = config();
        let ctx = BacktestContext { candles: flat_candles(60, 100.0), ..Default::default() };
        let result = run(&strategy, &cfg, &ctx, None);
        assert!(result.trades.is_empty());
    }
}
