//! backtest-core — the strategy backtest simulation kernel.
//!
//! This crate contains the per-bar simulation engine and its tightly
//! coupled subsystems:
//! - `domain` — candles, strategy/exit-zone configuration, trade records,
//!   run configuration/result envelope, deterministic ids
//! - `dsl` — the strategy condition AST and its per-bar fold evaluator,
//!   plus warmup-period extraction
//! - `indicators` — the O(1)-lookup indicator engine backing the evaluator
//! - `orders` — the pending LIMIT/STOP/TRAILING entry-order state machine
//! - `position` — open-trade analytics, the exit-zone selector, and the
//!   position/DCA manager
//! - `driver` — the single-threaded per-bar simulation loop composing all
//!   of the above into `run()`
//! - `metrics` — aggregate performance metrics computed from the trade log
//!   and equity curve
//! - `error` — the fatal/non-fatal error taxonomy
//!
//! No I/O, no async, no GUI: everything here is a pure function of its
//! inputs, so a caller can `rayon::par_iter()` over independent
//! `(Strategy, BacktestConfig, BacktestContext)` tuples for parameter
//! sweeps without this crate spawning any threads itself (§5).

pub mod domain;
pub mod driver;
pub mod dsl;
pub mod error;
pub mod indicators;
pub mod metrics;
pub mod orders;
pub mod position;

pub use driver::run;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: every public domain/result type is `Send +
    /// Sync`, so a caller can hand owned `(Strategy, BacktestConfig,
    /// BacktestContext)` tuples to a `rayon` thread pool for independent
    /// parameter-sweep runs (§5) without this crate doing anything special
    /// to earn that — it falls out of holding no interior mutability or
    /// non-thread-safe handles in any public type.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::Candle>();
        require_sync::<domain::Candle>();
        require_send::<domain::Side>();
        require_sync::<domain::Side>();
        require_send::<domain::Strategy>();
        require_sync::<domain::Strategy>();
        require_send::<domain::ExitZone>();
        require_sync::<domain::ExitZone>();
        require_send::<domain::Trade>();
        require_sync::<domain::Trade>();
        require_send::<domain::BacktestConfig>();
        require_sync::<domain::BacktestConfig>();
        require_send::<domain::BacktestContext>();
        require_sync::<domain::BacktestContext>();
        require_send::<domain::BacktestResult>();
        require_sync::<domain::BacktestResult>();
        require_send::<domain::ConfigHash>();
        require_sync::<domain::ConfigHash>();
        require_send::<domain::RunId>();
        require_sync::<domain::RunId>();

        require_send::<dsl::AstNode>();
        require_sync::<dsl::AstNode>();

        require_send::<metrics::PerformanceMetrics>();
        require_sync::<metrics::PerformanceMetrics>();

        require_send::<error::SimError>();
        require_sync::<error::SimError>();
    }

    /// `run()` is infallible by contract (§6/§7): fatal configuration
    /// errors are caught internally and surfaced through
    /// `BacktestResult::errors`, never as a `Result::Err`. This test pins
    /// the signature so that contract cannot quietly change.
    #[test]
    fn run_signature_is_infallible() {
        fn _check(
            strategy: &domain::Strategy,
            config: &domain::BacktestConfig,
            ctx: &domain::BacktestContext,
        ) -> domain::BacktestResult {
            run(strategy, config, ctx, None)
        }
    }
}
