//! Shared runtime state for sw-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. Agent state is read
//! from the agents' own status channels; only poll bookkeeping lives here.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sw_runtime::{AgentHandle, AgentPhase};
use tokio::sync::{broadcast, RwLock};

use crate::api_types::StatusSnapshot;

// ---------------------------------------------------------------------------
// BusMsg — SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    /// Liveness tick; `running` counts agents currently accepting passes.
    Heartbeat { ts_millis: i64, running: usize },
    Status(StatusSnapshot),
    LogLine { level: String, msg: String },
}

impl BusMsg {
    /// SSE `event:` field for this message.
    pub fn event_name(&self) -> &'static str {
        match self {
            BusMsg::Heartbeat { .. } => "heartbeat",
            BusMsg::Status(_) => "status",
            BusMsg::LogLine { .. } => "log",
        }
    }
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health responses.
#[derive(Clone, Debug)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// PollStatus
// ---------------------------------------------------------------------------

/// Bookkeeping of the feed poll loop.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollStatus {
    pub polls: u64,
    pub failures: u64,
    pub last_poll_at: Option<DateTime<Utc>>,
    /// Streams in the last successful snapshot.
    pub last_tracked: usize,
    pub last_error: Option<String>,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Cloneable (Arc) handle shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    pub poll: Arc<RwLock<PollStatus>>,
    /// In configuration order.
    pub agents: Vec<AgentHandle>,
}

impl AppState {
    pub fn new(agents: Vec<AgentHandle>) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);
        Self {
            bus,
            build: BuildInfo {
                service: "sw-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            poll: Arc::new(RwLock::new(PollStatus::default())),
            agents,
        }
    }

    pub async fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            daemon_uptime_secs: uptime_secs(),
            poll: self.poll.read().await.clone(),
            agents: self.agents.iter().map(AgentHandle::status).collect(),
        }
    }

    /// Agents whose last published phase is `Running`.
    pub fn running_agents(&self) -> usize {
        self.agents
            .iter()
            .filter(|a| a.status().phase == AgentPhase::Running)
            .count()
    }

    pub fn heartbeat(&self) -> BusMsg {
        BusMsg::Heartbeat {
            ts_millis: Utc::now().timestamp_millis(),
            running: self.running_agents(),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

/// Publish a heartbeat every `every` until the process exits. Ticks missed
/// while the runtime was busy are dropped rather than bunched up.
pub fn spawn_heartbeat(state: Arc<AppState>, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            // No subscribers is the normal idle case.
            let _ = state.bus.send(state.heartbeat());
        }
    });
}
