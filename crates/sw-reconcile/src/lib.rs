//! sw-reconcile
//!
//! The reconciliation core of one channel.
//!
//! Architectural decisions:
//! - Two collections: `active` (in the latest snapshot) and `expiring`
//!   (dropped out of the snapshot less than the dwell threshold ago)
//! - Every active position compares greater than every expiring position
//! - Moving an entry between the collections swaps positions with at most
//!   one extremal entry of the other collection; never a re-sort
//! - Only titles are diffed; identity and start time are fixed at creation
//!
//! Deterministic, pure logic. No IO. Callers turn the returned [`Render`]s
//! into store calls.

mod engine;
mod ledger;
mod types;

pub use engine::{coverage_holds, plan};
pub use ledger::Ledger;
pub use types::*;

/// Dwell threshold for ended streams before they become historical.
pub const DEFAULT_DWELL_SECS: i64 = 15 * 60;

pub fn default_dwell() -> chrono::Duration {
    chrono::Duration::seconds(DEFAULT_DWELL_SECS)
}
