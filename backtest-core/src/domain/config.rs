//! Run configuration, run context, progress reporting, and the result
//! envelope returned by `driver::run`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::strategy::{MarketType, PositionSizingType, Strategy};
use crate::domain::{AggTrade, Candle, ConfigHash, FundingRate, OpenInterest, RunId};
use crate::metrics::PerformanceMetrics;

/// Maps a candle `resolution` string to its duration in milliseconds.
/// Unknown resolutions fall back to 1 hour, mirroring the source's
/// cross-timeframe mapping table (§6).
pub fn resolution_ms(resolution: &str) -> i64 {
    match resolution {
        "1m" => 60_000,
        "5m" => 300_000,
        "15m" => 900_000,
        "30m" => 1_800_000,
        "1h" => 3_600_000,
        "4h" => 14_400_000,
        "1d" => 86_400_000,
        "1w" => 604_800_000,
        _ => 3_600_000,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub symbol: String,
    pub resolution: String,
    pub start_date: String,
    pub end_date: String,
    pub initial_capital: f64,
    pub commission: f64,
    pub position_sizing_type: PositionSizingType,
    pub position_sizing_value: f64,
    pub market_type: MarketType,
    pub margin_interest_hourly: f64,
}

/// Per-bar boolean state arrays for phases and hoop patterns, supplied by
/// a foreign collaborator (§1 non-goals). Each array must have exactly
/// `candles.len()` entries; an out-of-range index is treated as `false`
/// (§7, phase/pattern state array length mismatch).
#[derive(Debug, Clone, Default)]
pub struct BacktestContext {
    pub candles: Vec<Candle>,
    pub phase_states: HashMap<String, Vec<bool>>,
    pub hoop_pattern_states: HashMap<String, Vec<bool>>,
    pub agg_trades: Vec<AggTrade>,
    pub funding_rates: Vec<FundingRate>,
    pub open_interest: Vec<OpenInterest>,
    pub premium_index: Vec<f64>,
}

impl BacktestContext {
    /// Out-of-range index is `false`, never a panic (§7).
    pub fn phase_active(&self, phase_id: &str, bar_index: usize) -> bool {
        self.phase_states
            .get(phase_id)
            .and_then(|states| states.get(bar_index))
            .copied()
            .unwrap_or(false)
    }

    pub fn pattern_matched(&self, pattern_id: &str, bar_index: usize) -> bool {
        self.hoop_pattern_states
            .get(pattern_id)
            .and_then(|states| states.get(bar_index))
            .copied()
            .unwrap_or(false)
    }

    /// All `required` phases active and none of `excluded` active.
    pub fn all_phases_active(&self, required: &[String], excluded: &[String], bar_index: usize) -> bool {
        required.iter().all(|id| self.phase_active(id, bar_index))
            && excluded.iter().all(|id| !self.phase_active(id, bar_index))
    }

    /// All `required` patterns matched and none of `excluded` matched.
    pub fn patterns_match(&self, required: &[String], excluded: &[String], bar_index: usize) -> bool {
        required.iter().all(|id| self.pattern_matched(id, bar_index))
            && excluded.iter().all(|id| !self.pattern_matched(id, bar_index))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
    pub percentage: f64,
}

impl Progress {
    pub fn new(current: usize, total: usize) -> Self {
        let percentage = if total == 0 {
            100.0
        } else {
            (current as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
        };
        Self {
            current,
            total,
            percentage,
        }
    }
}

/// A phase-boundary or every-500-bars progress callback. Invoked
/// synchronously — the driver never relies on it to drive progress, and
/// no async scheduler is introduced (§5).
pub type ProgressCallback<'a> = dyn FnMut(Progress, &str) + 'a;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub run_id: RunId,
    pub config_hash: ConfigHash,
    pub strategy_id: String,
    pub strategy_name: String,
    pub config: BacktestConfig,
    pub trades: Vec<crate::domain::Trade>,
    pub metrics: PerformanceMetrics,
    pub start_epoch_ms: i64,
    pub end_epoch_ms: i64,
    pub bars_evaluated: usize,
    pub duration_ms: i64,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_table_matches_spec() {
        assert_eq!(resolution_ms("1m"), 60_000);
        assert_eq!(resolution_ms("1h"), 3_600_000);
        assert_eq!(resolution_ms("1w"), 604_800_000);
    }

    #[test]
    fn unknown_resolution_falls_back_to_one_hour() {
        assert_eq!(resolution_ms("7m"), 3_600_000);
    }

    #[test]
    fn progress_percentage_clamped() {
        let p = Progress::new(500, 500);
        assert_eq!(p.percentage, 100.0);
        let p0 = Progress::new(0, 0);
        assert_eq!(p0.percentage, 100.0);
    }

    #[test]
    fn out_of_range_phase_index_is_false() {
        let ctx = BacktestContext::default();
        assert!(!ctx.phase_active("missing", 3));
    }
}
