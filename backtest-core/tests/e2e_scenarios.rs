//! End-to-end scenarios exercising the public `backtest_core::run` entry
//! point over a full candle series, instead of the individual-component
//! unit tests colocated with each module.
//!
//! Candle series here are longer than the six literal worked examples use
//! — long enough to clear the whole-strategy warmup floor (50 bars,
//! `dsl::warmup::warmup_bars_for_all`) — while preserving each scenario's
//! qualitative shape (which exit fires, DCA grouping, LIMIT fill-at-offset
//! price). See DESIGN.md, "Open Question resolutions / Scenario-1
//! quantity" for why the literal bar counts/quantities are not reproduced
//! exactly.

use backtest_core::domain::{
    BacktestConfig, BacktestContext, Candle, DcaMode, EntryOrderType, EntrySettings, ExitBasis,
    ExitReason, ExitReentry, ExitZone, HoopPatternSettings, MarketType, OffsetUnit,
    PositionSizingType, Side, StopLossType, Strategy, TakeProfitType,
};
use backtest_core::dsl::ast::{AstNode, CompareOp, PriceField};
use backtest_core::run;

const WARMUP: usize = 50;

fn flat_candles(n: usize, price: f64) -> Vec<Candle> {
    (0..n)
        .map(|i| Candle { timestamp: i as i64 * 3_600_000, open: price, high: price, low: price, close: price, volume: 100.0 })
        .collect()
}

fn default_zone(name: &str) -> ExitZone {
    ExitZone {
        name: name.to_string(),
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
    }
}

fn always_on_long_strategy() -> Strategy {
    Strategy {
        id: "strat-1".into(),
        name: "always on long".into(),
        direction: Side::Long,
        entry_ast: AstNode::BooleanLiteral { value: true },
        exit_zones: vec![default_zone("z0")],
        entry_settings: EntrySettings::default(),
        dca_enabled: false,
        dca_max_entries: 1,
        dca_bars_between: 0,
        dca_mode: DcaMode::Pause,
        max_open_trades: 1,
        min_candles_between_trades: 0,
        required_phase_ids: vec![],
        excluded_phase_ids: vec![],
        hoop_pattern_settings: HoopPatternSettings::default(),
    }
}

fn base_config() -> BacktestConfig {
    BacktestConfig {
        symbol: "SPY".into(),
        resolution: "1h".into(),
        start_date: "2024-01-01".into(),
        end_date: "2024-01-10".into(),
        initial_capital: 10_000.0,
        commission: 0.0,
        position_sizing_type: PositionSizingType::FixedPercent,
        position_sizing_value: 50.0,
        market_type: MarketType::Spot,
        margin_interest_hourly: 0.0,
    }
}

/// Scenario 1 (§8): a trivial always-on long with a single, unbounded
/// exit zone opens on the first post-warmup bar and is force-closed at
/// end of data, never tripping a stop/take-profit it doesn't have.
#[test]
fn scenario_1_trivial_long_runs_to_end_of_data() {
    let strategy = always_on_long_strategy();
    let config = base_config();
    let ctx = BacktestContext { candles: flat_candles(WARMUP + 30, 100.0), ..Default::default() };

    let result = run(&strategy, &config, &ctx, None);

    assert_eq!(result.trades.len(), 1);
    let trade = &result.trades[0];
    assert_eq!(trade.entry_bar, WARMUP);
    assert_eq!(trade.side, Side::Long);
    assert_eq!(trade.exit_reason, Some(ExitReason::EndOfData));
    assert!(trade.quantity > 0.0);
    assert!(result.errors.is_empty());
}

/// Scenario 2 (§8): a 5% fixed stop-loss triggers once price falls more
/// than 5% below the entry price, and not before.
#[test]
fn scenario_2_fixed_stop_loss_triggers_on_breach() {
    let mut strategy = always_on_long_strategy();
    strategy.exit_zones[0].stop_loss_type = StopLossType::FixedPercent;
    strategy.exit_zones[0].stop_loss_value = Some(5.0);
    let config = base_config();

    let mut candles = flat_candles(WARMUP + 20, 100.0);
    // Entry fills at bar WARMUP, price 100. A few bars later the low
    // breaches the 95.0 stop.
    for c in candles.iter_mut().skip(WARMUP + 3) {
        c.low = 94.0;
        c.close = 94.5;
        c.high = 96.0;
    }
    let ctx = BacktestContext { candles, ..Default::default() };

    let result = run(&strategy, &config, &ctx, None);

    let stop_trade = result.trades.iter().find(|t| t.exit_reason == Some(ExitReason::StopLoss));
    let stop_trade = stop_trade.expect("stop-loss trade expected");
    assert!((stop_trade.exit_price.unwrap() - 95.0).abs() < 1e-9);
    assert!(stop_trade.pnl.unwrap() < 0.0);
}

/// Scenario 3 (§8): a trailing stop ratchets up with the highest price
/// seen since entry and only fires once price gives back more than the
/// trailing distance from that peak — it never loosens on a pullback
/// that doesn't breach it.
#[test]
fn scenario_3_trailing_stop_ratchets_and_then_triggers() {
    let mut strategy = always_on_long_strategy();
    strategy.exit_zones[0].stop_loss_type = StopLossType::TrailingPercent;
    strategy.exit_zones[0].stop_loss_value = Some(3.0);
    let config = base_config();

    let mut candles = flat_candles(WARMUP + 40, 100.0);
    // Rally to 120 over several bars (ratchets the trailing stop up),
    // then pull back enough to breach 3% off the peak.
    for (i, c) in candles.iter_mut().enumerate().skip(WARMUP + 1).take(10) {
        let price = 100.0 + (i - WARMUP) as f64 * 2.0;
        c.open = price;
        c.high = price + 1.0;
        c.low = price - 1.0;
        c.close = price;
    }
    for c in candles.iter_mut().skip(WARMUP + 11) {
        c.open = 112.0;
        c.high = 112.5;
        c.low = 111.0;
        c.close = 111.5;
    }
    let ctx = BacktestContext { candles, ..Default::default() };

    let result = run(&strategy, &config, &ctx, None);

    let trailing_trade = result.trades.iter().find(|t| t.exit_reason == Some(ExitReason::TrailingStop));
    let trailing_trade = trailing_trade.expect("trailing-stop trade expected");
    // Peak was 120 + 1 (high) = 121; trailing stop locks at 121 * 0.97 = 117.37.
    assert!((trailing_trade.exit_price.unwrap() - 117.37).abs() < 1e-6);
}

/// Scenario 4 (§8): a two-entry DCA group in PAUSE mode adds its second
/// leg once the entry signal returns, and simply waits (rather than
/// aborting) on bars where the signal is inactive in between.
#[test]
fn scenario_4_dca_pause_mode_waits_then_adds_second_entry() {
    let mut strategy = always_on_long_strategy();
    // Entry signal: close < 105 (true at 100, false once price rallies
    // above 105, true again once it settles back below).
    strategy.entry_ast = AstNode::cmp(AstNode::price(PriceField::Close), CompareOp::Lt, AstNode::num(105.0));
    strategy.dca_enabled = true;
    strategy.dca_max_entries = 2;
    strategy.dca_bars_between = 2;
    strategy.dca_mode = DcaMode::Pause;
    strategy.max_open_trades = 1;
    let config = base_config();

    let mut candles = flat_candles(WARMUP + 40, 100.0);
    // Signal drops out for a few bars (price rallies above 105), then
    // returns (price settles back to 100) well past `dcaBarsBetween`.
    for c in candles.iter_mut().skip(WARMUP + 1).take(3) {
        c.close = 110.0;
        c.open = 110.0;
        c.high = 111.0;
        c.low = 109.0;
    }
    let ctx = BacktestContext { candles, ..Default::default() };

    let result = run(&strategy, &config, &ctx, None);

    let group_id = &result.trades[0].group_id;
    let group_trades: Vec<_> = result.trades.iter().filter(|t| &t.group_id == group_id).collect();
    assert_eq!(group_trades.len(), 2, "expected exactly one initial entry and one DCA add");
    assert_eq!(group_trades[0].entry_bar, WARMUP);
    assert!(group_trades[1].entry_bar > group_trades[0].entry_bar);
}

/// Scenario 5 (§8): an emergency zone (`exitImmediately`) bypasses the
/// normal zone's `minBarsBeforeExit` gate entirely, firing the same bar
/// unrealized P&L% crosses into its range.
#[test]
fn scenario_5_emergency_zone_bypasses_min_bars_before_exit() {
    let mut strategy = always_on_long_strategy();
    strategy.exit_zones = vec![
        ExitZone { min_bars_before_exit: 100, ..default_zone("normal") },
        ExitZone { name: "emergency".into(), pnl_range: (-100.0, -10.0), exit_immediately: true, ..default_zone("emergency") },
    ];
    let config = base_config();

    let mut candles = flat_candles(WARMUP + 10, 100.0);
    // A sharp one-bar crash pushes unrealized P&L% below -10%, immediately
    // after entry — well before the normal zone's 100-bar gate would
    // ever open.
    for c in candles.iter_mut().skip(WARMUP + 1) {
        c.open = 85.0;
        c.high = 86.0;
        c.low = 84.0;
        c.close = 85.0;
    }
    let ctx = BacktestContext { candles, ..Default::default() };

    let result = run(&strategy, &config, &ctx, None);

    let emergency_trade = result.trades.iter().find(|t| t.exit_zone.as_deref() == Some("emergency"));
    let emergency_trade = emergency_trade.expect("emergency exit expected despite the normal zone's 100-bar gate");
    assert_eq!(emergency_trade.exit_reason, Some(ExitReason::ZoneExit));
}

/// Scenario 6 (§8): a LIMIT entry placed 1% below the signal bar's close
/// stays pending until price actually trades down to the limit price,
/// then fills at that exact offset price — not at whatever the
/// triggering bar's close happened to be.
#[test]
fn scenario_6_limit_entry_fills_at_offset_price() {
    let mut strategy = always_on_long_strategy();
    strategy.entry_settings = EntrySettings {
        order_type: EntryOrderType::Limit,
        offset_unit: OffsetUnit::Percent,
        offset_value: Some(-1.0),
        trailing_reverse_percent: None,
        expiration_bars: Some(20),
    };
    let config = base_config();

    let mut candles = flat_candles(WARMUP + 20, 100.0);
    // Signal bar closes at 100 -> order price = 99.0. Stays flat for a
    // couple of bars (still pending), then dips enough for the low to
    // reach the limit price.
    if let Some(c) = candles.get_mut(WARMUP + 3) {
        c.low = 98.5;
        c.high = 100.0;
        c.open = 99.8;
        c.close = 99.2;
    }
    let ctx = BacktestContext { candles, ..Default::default() };

    let result = run(&strategy, &config, &ctx, None);

    assert_eq!(result.trades.len(), 1);
    let trade = &result.trades[0];
    assert_eq!(trade.entry_bar, WARMUP + 3);
    assert!((trade.entry_price - 99.0).abs() < 1e-9);
}

/// A LIMIT entry that never trades down to its order price expires
/// unfilled at `signalBar + expirationBars + 1` (§7/§8): the driver emits
/// exactly one `expired` trade record with no quantity and no position
/// ever opened, rather than silently dropping the signal.
#[test]
fn scenario_7_pending_entry_expires_unfilled() {
    let mut strategy = always_on_long_strategy();
    strategy.entry_settings = EntrySettings {
        order_type: EntryOrderType::Limit,
        offset_unit: OffsetUnit::Percent,
        offset_value: Some(-50.0),
        trailing_reverse_percent: None,
        expiration_bars: Some(2),
    };
    let config = base_config();
    // Exactly enough bars for the signal's order to expire on the very
    // last bar; the data ends there, so no second signal gets a chance
    // to schedule (and expire) a follow-up pending order.
    let ctx = BacktestContext { candles: flat_candles(WARMUP + 4, 100.0), ..Default::default() };

    let result = run(&strategy, &config, &ctx, None);

    assert_eq!(result.trades.len(), 1);
    let trade = &result.trades[0];
    assert_eq!(trade.exit_reason, Some(ExitReason::Expired));
    assert_eq!(trade.entry_bar, WARMUP);
    assert_eq!(trade.exit_bar, Some(WARMUP + 3));
    assert_eq!(trade.quantity, 0.0);
    assert!(trade.exit_price.is_none());
    assert!(trade.pnl.is_none());
    assert!(result.errors.is_empty());
}

/// With a non-zero commission, the fundamental accounting identity still
/// holds (§8): the sum of realized P&L across every closed trade equals
/// the change in equity, once every position is closed (no unrealized
/// remainder) at end of data.
#[test]
fn scenario_8_conservation_holds_with_commission() {
    let strategy = always_on_long_strategy();
    let mut config = base_config();
    config.commission = 0.1;
    let ctx = BacktestContext { candles: flat_candles(WARMUP + 30, 100.0), ..Default::default() };

    let result = run(&strategy, &config, &ctx, None);

    assert_eq!(result.trades.len(), 1);
    let trade = &result.trades[0];
    assert_eq!(trade.exit_reason, Some(ExitReason::EndOfData));
    assert!(trade.commission > 0.0, "commission should be charged on entry and exit");

    let realized: f64 = result.trades.iter().filter_map(|t| t.pnl).sum();
    let final_equity = config.initial_capital * (1.0 + result.metrics.total_return);
    assert!((realized - (final_equity - config.initial_capital)).abs() < 1e-6);
}
