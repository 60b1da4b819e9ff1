//! Open-trade analytics (C4), exit-zone selection (C5), and the
//! position/DCA manager (C6).

pub mod exit_zone;
pub mod manager;
pub mod open_trade;
pub mod sizing;

pub use exit_zone::{evaluate_exit, select_zone, zone_trigger, ZoneOutcome};
pub use manager::{average_entry_price, EntryDecision, PositionManager};
pub use open_trade::{better_entry_analysis, better_exit_analysis, OpenTradeState};
pub use sizing::{available_capital, size_position};
