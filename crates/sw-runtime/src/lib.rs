//! sw-runtime
//!
//! Drives one channel per agent: an async task that owns a ledger, applies
//! snapshots to it through an [`sw_store::ItemStore`], and rebuilds the
//! ledger from the channel whenever the two may have diverged.
//!
//! - Snapshots are queued one deep; callers wait on a busy agent
//! - Store calls from one agent are spaced by a fixed interval
//! - A failed pass never leaves a half-trusted ledger behind: the agent
//!   reloads from the channel and retries the latest snapshot

mod agent;
mod clock;
mod pacer;
mod pass;
pub mod recovery;

pub use agent::{
    spawn_agent, AgentContext, AgentError, AgentGone, AgentHandle, AgentPhase, AgentSpec,
    AgentStatus, SyncSettings,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use pacer::Pacer;
pub use pass::{PassError, PassStats, Syncer};
pub use recovery::{rebuild, Orphan, Recovered, RecoveryError};
