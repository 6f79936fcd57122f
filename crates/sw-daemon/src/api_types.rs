//! Response types for the sw-daemon status surface.
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded
//! by Axum and decoded by tests. No logic lives here.

use serde::{Deserialize, Serialize};
use sw_runtime::AgentStatus;

use crate::state::PollStatus;

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
}

// ---------------------------------------------------------------------------
// /v1/status
// ---------------------------------------------------------------------------

/// Point-in-time view of the daemon, returned by GET /v1/status and carried
/// inside SSE `status` events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub daemon_uptime_secs: u64,
    pub poll: PollStatus,
    /// One entry per agent, in configuration order.
    pub agents: Vec<AgentStatus>,
}
