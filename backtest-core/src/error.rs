//! Error taxonomy (spec §7).
//!
//! Configuration errors (entry/zone parse failures) are fatal: `run()`
//! catches them and returns the error-result shape described in §6/§7
//! rather than propagating a `Result::Err`. Everything else — per-bar
//! evaluation errors, pending-order expiration, capital rejection,
//! out-of-range phase/pattern indices — is non-fatal and is recorded in
//! `BacktestResult::errors` or surfaces as an ordinary `Trade`.

use thiserror::Error;

/// Fatal configuration errors: caught by the driver before the per-bar loop
/// ever starts.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    #[error("failed to parse entry condition: {0}")]
    EntryParse(String),

    #[error("failed to parse exit condition for zone '{zone}': {message}")]
    ZoneParse { zone: String, message: String },
}

/// A single per-bar evaluation error, formatted exactly as spec §7 requires:
/// `"Error at bar {i}: {msg}"`.
pub fn bar_error(bar_index: usize, msg: impl std::fmt::Display) -> String {
    format!("Error at bar {bar_index}: {msg}")
}

/// The error list on `BacktestResult` is truncated to this many entries (§7).
pub const MAX_ERRORS: usize = 100;
