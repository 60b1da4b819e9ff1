//! Strategy configuration types: the immutable input describing one
//! backtest run's entry/exit rules, sizing, and DCA behavior.
//!
//! Every "stringly-typed" knob in the source system (`"fixed_percent"`,
//! `"atr"`, `"long"`, `"zone_exit"`, ...) is modeled here as a tagged
//! variant instead, per the design note on avoiding stringly-typed
//! configuration — these are boundary types, so `serde` derives the
//! string-tagged wire format without any runtime string matching inside
//! the evaluator or driver.

use serde::{Deserialize, Serialize};

use crate::dsl::ast::AstNode;

/// Market venue behavior affecting holding-cost accrual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketType {
    Spot,
    Futures,
    Margin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryOrderType {
    Market,
    Limit,
    Stop,
    Trailing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OffsetUnit {
    Percent,
    Atr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DcaMode {
    Pause,
    Continue,
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitBasis {
    Original,
    Remaining,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReentry {
    Persist,
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopLossType {
    None,
    FixedPercent,
    FixedAtr,
    TrailingPercent,
    TrailingAtr,
    /// SL-only: resets trailing state back to a fresh baseline.
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TakeProfitType {
    None,
    FixedPercent,
    FixedAtr,
    TrailingPercent,
    TrailingAtr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionSizingType {
    FixedPercent,
    FixedDollar,
    FixedAmount,
    RiskPercent,
    Kelly,
    Volatility,
    AllIn,
}

/// Entry order construction settings: order type, offset-from-signal
/// computation, and optional pending-order expiration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntrySettings {
    pub order_type: EntryOrderType,
    pub offset_unit: OffsetUnit,
    /// Percent or ATR multiple; sign follows user intent (negative below
    /// signal price, positive above).
    pub offset_value: Option<f64>,
    pub trailing_reverse_percent: Option<f64>,
    pub expiration_bars: Option<u32>,
}

impl Default for EntrySettings {
    fn default() -> Self {
        Self {
            order_type: EntryOrderType::Market,
            offset_unit: OffsetUnit::Percent,
            offset_value: None,
            trailing_reverse_percent: None,
            expiration_bars: None,
        }
    }
}

/// A P&L%-indexed bundle of stop-loss / take-profit / exit-condition
/// behavior. `exitZones` are matched in declared order; see
/// `ExitZone::matches`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitZone {
    pub name: String,
    /// Inclusive `[lo, hi]` unrealized-P&L% range this zone covers.
    pub pnl_range: (f64, f64),
    pub stop_loss_type: StopLossType,
    pub stop_loss_value: Option<f64>,
    pub take_profit_type: TakeProfitType,
    pub take_profit_value: Option<f64>,
    pub exit_condition_ast: Option<AstNode>,
    pub exit_immediately: bool,
    pub min_bars_before_exit: u32,
    pub min_bars_between_exits: u32,
    /// `None` is treated as 100 (full exit).
    pub exit_percent: Option<f64>,
    pub exit_basis: ExitBasis,
    pub exit_reentry: ExitReentry,
    pub max_exits: u32,
    pub required_phase_ids: Vec<String>,
    pub excluded_phase_ids: Vec<String>,
    pub required_exit_pattern_ids: Vec<String>,
    pub excluded_exit_pattern_ids: Vec<String>,
}

impl ExitZone {
    /// Inclusive range membership: `lo <= pnl <= hi`.
    pub fn matches(&self, pnl_percent: f64) -> bool {
        let (lo, hi) = self.pnl_range;
        pnl_percent >= lo && pnl_percent <= hi
    }

    /// `exitPercent` defaults to 100 (a full exit) when unset.
    pub fn exit_percent_or_full(&self) -> f64 {
        self.exit_percent.unwrap_or(100.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoopPatternSettings {
    pub required_entry_pattern_ids: Vec<String>,
    pub excluded_entry_pattern_ids: Vec<String>,
}

impl Default for HoopPatternSettings {
    fn default() -> Self {
        Self {
            required_entry_pattern_ids: Vec::new(),
            excluded_entry_pattern_ids: Vec::new(),
        }
    }
}

/// Immutable strategy input for a single run. The entry AST and every
/// zone's non-empty exit AST are parsed upstream by a foreign collaborator
/// (§1 non-goals) and consumed here as data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Strategy {
    pub id: String,
    pub name: String,
    pub direction: crate::domain::Side,
    pub entry_ast: AstNode,
    /// At least one zone, with an invariant (enforced by the caller, not
    /// re-validated here) that one zone covers P&L% = 0.
    pub exit_zones: Vec<ExitZone>,
    pub entry_settings: EntrySettings,
    pub dca_enabled: bool,
    pub dca_max_entries: u32,
    pub dca_bars_between: u32,
    pub dca_mode: DcaMode,
    pub max_open_trades: u32,
    pub min_candles_between_trades: u32,
    pub required_phase_ids: Vec<String>,
    pub excluded_phase_ids: Vec<String>,
    pub hoop_pattern_settings: HoopPatternSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(name: &str, lo: f64, hi: f64) -> ExitZone {
        ExitZone {
            name: name.to_string(),
            pnl_range: (lo, hi),
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
            required_phase_ids: Vec::new(),
            excluded_phase_ids: Vec::new(),
            required_exit_pattern_ids: Vec::new(),
            excluded_exit_pattern_ids: Vec::new(),
        }
    }

    #[test]
    fn zone_matches_is_inclusive_both_ends() {
        let z = zone("z", -5.0, 5.0);
        assert!(z.matches(-5.0));
        assert!(z.matches(5.0));
        assert!(z.matches(0.0));
        assert!(!z.matches(5.0001));
        assert!(!z.matches(-5.0001));
    }

    #[test]
    fn exit_percent_defaults_to_full() {
        let z = zone("z", 0.0, 0.0);
        assert_eq!(z.exit_percent_or_full(), 100.0);
    }
}
