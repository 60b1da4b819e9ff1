//! `Trade` — a single terminal trade-log record, and the reasons a trade
//! can close.
//!
//! `Trade` is never mutated in place: `partialClose` (§3 lifecycle
//! invariants) always emits a new immutable record. The mutable
//! bookkeeping lives in `position::OpenTradeState`, which references a
//! `Trade` value but is not itself part of the trade log.

use serde::{Deserialize, Serialize};

use crate::domain::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    TrailingStop,
    Signal,
    ZoneExit,
    MarketExit,
    SignalLost,
    EndOfData,
    Rejected,
    Expired,
}

/// A counterfactual better price found by scanning a context window
/// around entry or exit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BetterPrice {
    pub bar: usize,
    pub price: f64,
    /// Improvement percent versus the actual fill, always non-negative.
    pub improvement: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub strategy_id: String,
    pub side: Side,
    pub entry_bar: usize,
    pub entry_time: i64,
    pub entry_price: f64,
    pub quantity: f64,
    pub commission: f64,
    pub group_id: String,
    pub exit_bar: Option<usize>,
    pub exit_time: Option<i64>,
    pub exit_price: Option<f64>,
    pub exit_reason: Option<ExitReason>,
    pub exit_zone: Option<String>,
    pub pnl: Option<f64>,
    pub pnl_percent: Option<f64>,
    pub mfe_percent: Option<f64>,
    pub mae_percent: Option<f64>,
    pub mfe_bar: Option<usize>,
    pub mae_bar: Option<usize>,
    pub entry_phases: Option<Vec<String>>,
    pub entry_indicators: Option<std::collections::BTreeMap<String, f64>>,
    pub exit_phases: Option<Vec<String>>,
    pub exit_indicators: Option<std::collections::BTreeMap<String, f64>>,
    pub holding_costs: Option<f64>,
    pub better_entry: Option<BetterPrice>,
    pub better_exit: Option<BetterPrice>,
}

impl Trade {
    pub fn is_closed(&self) -> bool {
        self.exit_bar.is_some()
    }
}
