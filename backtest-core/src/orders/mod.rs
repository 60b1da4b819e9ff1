//! Pending-order state machine (§4.3): LIMIT/STOP/TRAILING entry fills
//! and expiration. At most one pending order exists at any time; a new
//! entry signal while one is outstanding replaces it (§3 lifecycle
//! invariants).

pub mod pending;

pub use pending::{BarOutcome, PendingOrder};
