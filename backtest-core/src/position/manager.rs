//! Position / DCA manager (C6): decides, bar by bar, whether a strategy
//! opens a fresh position, adds a DCA entry to an open one, or must
//! abandon an open DCA group because its entry signal dropped out before
//! every leg filled.

use crate::domain::ids::GroupIdGen;
use crate::domain::strategy::{DcaMode, Strategy};
use crate::domain::BacktestContext;
use crate::dsl::evaluator::Evaluator;
use crate::position::open_trade::OpenTradeState;

#[derive(Debug, Clone, PartialEq)]
pub enum EntryDecision {
    None,
    NewPosition { group_id: String },
    DcaAdd { group_id: String },
}

/// What a DCA group does on a bar where the entry signal is not active
/// (§4.2 DCA modes). `CONTINUE` keeps adding legs on schedule regardless
/// of the signal; `PAUSE` just waits for the signal to return; `ABORT`
/// force-closes the whole group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DcaAction {
    AddEntry,
    Wait,
    Abort,
}

pub fn dca_signal_action(mode: DcaMode, signal_active: bool) -> DcaAction {
    if signal_active {
        return DcaAction::AddEntry;
    }
    match mode {
        DcaMode::Continue => DcaAction::AddEntry,
        DcaMode::Pause => DcaAction::Wait,
        DcaMode::Abort => DcaAction::Abort,
    }
}

/// `true` when the strategy's entry signal — the DSL condition, required
/// phases, and the hoop entry pattern filter — all agree this bar is a
/// valid entry bar.
pub fn entry_signal_active(strategy: &Strategy, evaluator: &Evaluator, ctx: &BacktestContext, bar_index: usize) -> bool {
    let dsl_signal = evaluator.evaluate(&strategy.entry_ast, bar_index).unwrap_or(false);
    let phases_ok = ctx.all_phases_active(&strategy.required_phase_ids, &strategy.excluded_phase_ids, bar_index);
    let hoop_ok = ctx.patterns_match(
        &strategy.hoop_pattern_settings.required_entry_pattern_ids,
        &strategy.hoop_pattern_settings.excluded_entry_pattern_ids,
        bar_index,
    );
    dsl_signal && phases_ok && hoop_ok
}

pub fn can_start_new_position(strategy: &Strategy, open_position_count: u32) -> bool {
    open_position_count < strategy.max_open_trades
}

pub fn required_trade_spacing_ok(strategy: &Strategy, bar_index: usize, last_trade_exit_bar: Option<usize>) -> bool {
    match last_trade_exit_bar {
        None => true,
        Some(exit_bar) => bar_index.saturating_sub(exit_bar) >= strategy.min_candles_between_trades as usize,
    }
}

pub fn can_add_dca_entry(strategy: &Strategy, entries_in_position: u32, bar_index: usize, last_entry_bar: usize) -> bool {
    strategy.dca_enabled
        && entries_in_position < strategy.dca_max_entries
        && bar_index.saturating_sub(last_entry_bar) >= strategy.dca_bars_between as usize
}

/// Whether an open DCA group must be force-closed (`SignalLost`) this bar
/// because its mode is `ABORT` and the entry signal is no longer active.
pub fn should_abort_dca_group(strategy: &Strategy, signal_active: bool) -> bool {
    strategy.dca_enabled && dca_signal_action(strategy.dca_mode, signal_active) == DcaAction::Abort
}

/// Quantity-weighted average entry price across every still-open leg of
/// a DCA group, used as the basis for the group's unrealized P&L%.
pub fn average_entry_price(group: &[&OpenTradeState]) -> f64 {
    let total_qty: f64 = group.iter().map(|t| t.remaining_qty).sum();
    if total_qty <= 0.0 {
        return 0.0;
    }
    group.iter().map(|t| t.entry_price * t.remaining_qty).sum::<f64>() / total_qty
}

#[derive(Debug, Default)]
pub struct PositionManager {
    id_gen: GroupIdGen,
}

impl PositionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// `current_group` is `Some((group_id, entries_in_position,
    /// last_entry_bar))` when this strategy already has an open position;
    /// `last_trade_exit_bar` is the close bar of its most recent fully
    /// closed trade, if any.
    pub fn decide_entry(
        &mut self,
        strategy: &Strategy,
        evaluator: &Evaluator,
        ctx: &BacktestContext,
        bar_index: usize,
        open_position_count: u32,
        current_group: Option<(&str, u32, usize)>,
        last_trade_exit_bar: Option<usize>,
    ) -> EntryDecision {
        let signal_active = entry_signal_active(strategy, evaluator, ctx, bar_index);

        if let Some((group_id, entries_in_position, last_entry_bar)) = current_group {
            return match dca_signal_action(strategy.dca_mode, signal_active) {
                DcaAction::AddEntry if can_add_dca_entry(strategy, entries_in_position, bar_index, last_entry_bar) => {
                    EntryDecision::DcaAdd { group_id: group_id.to_string() }
                }
                _ => EntryDecision::None,
            };
        }

        if !signal_active {
            return EntryDecision::None;
        }
        if !can_start_new_position(strategy, open_position_count) {
            return EntryDecision::None;
        }
        if !required_trade_spacing_ok(strategy, bar_index, last_trade_exit_bar) {
            return EntryDecision::None;
        }
        EntryDecision::NewPosition { group_id: self.id_gen.next_group_id(strategy.dca_enabled) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Side;

    fn open_trade(entry_price: f64, qty: f64) -> OpenTradeState {
        OpenTradeState::new("s".into(), Side::Long, 0, 0, entry_price, qty, 0.0, "dca-0".into())
    }

    #[test]
    fn pause_mode_waits_when_signal_drops() {
        assert_eq!(dca_signal_action(DcaMode::Pause, false), DcaAction::Wait);
        assert_eq!(dca_signal_action(DcaMode::Pause, true), DcaAction::AddEntry);
    }

    #[test]
    fn continue_mode_adds_regardless_of_signal() {
        assert_eq!(dca_signal_action(DcaMode::Continue, false), DcaAction::AddEntry);
    }

    #[test]
    fn abort_mode_aborts_when_signal_drops() {
        assert_eq!(dca_signal_action(DcaMode::Abort, false), DcaAction::Abort);
    }

    #[test]
    fn dca_entry_blocked_before_spacing_elapses() {
        let mut strategy = test_strategy();
        strategy.dca_enabled = true;
        strategy.dca_max_entries = 3;
        strategy.dca_bars_between = 5;
        assert!(!can_add_dca_entry(&strategy, 1, 3, 0));
        assert!(can_add_dca_entry(&strategy, 1, 5, 0));
    }

    #[test]
    fn dca_entry_blocked_once_max_entries_reached() {
        let mut strategy = test_strategy();
        strategy.dca_enabled = true;
        strategy.dca_max_entries = 2;
        strategy.dca_bars_between = 0;
        assert!(!can_add_dca_entry(&strategy, 2, 10, 0));
    }

    #[test]
    fn average_entry_price_is_quantity_weighted() {
        let a = open_trade(100.0, 1.0);
        let b = open_trade(110.0, 3.0);
        let avg = average_entry_price(&[&a, &b]);
        assert!((avg - 107.5).abs() < 1e-9);
    }

    fn test_strategy() -> Strategy {
        use crate::domain::strategy::{EntrySettings, HoopPatternSettings};
        use crate::dsl::ast::AstNode;
        Strategy {
            id: "s".into(),
            name: "s".into(),
            direction: Side::Long,
            entry_ast: AstNode::BooleanLiteral { value: true },
            exit_zones: vec![],
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
}
