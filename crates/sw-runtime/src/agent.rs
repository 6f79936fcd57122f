//! The per-channel worker task and its handle.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sw_reconcile::Ledger;
use sw_schemas::{IconSet, Snapshot};
use sw_store::ItemStore;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::recovery::{rebuild, RecoveryError};
use crate::{Clock, Syncer};

/// Static description of one agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSpec {
    pub id: usize,
    pub channel: String,
    /// The caller hands this agent only tagged and registered streams.
    pub filtered: bool,
}

/// Knobs shared by every agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    pub call_interval: Duration,
    pub dwell: chrono::Duration,
    pub history_limit: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            call_interval: Duration::from_secs(1),
            dwell: sw_reconcile::default_dwell(),
            history_limit: 100,
        }
    }
}

/// Collaborators shared by every agent.
#[derive(Clone)]
pub struct AgentContext {
    pub store: Arc<dyn ItemStore>,
    pub icons: Arc<IconSet>,
    pub clock: Arc<dyn Clock>,
    pub settings: SyncSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentPhase {
    Starting,
    Running,
    Reloading,
    Stopped,
    Failed,
}

/// Point-in-time view of an agent, published after every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStatus {
    pub id: usize,
    pub channel: String,
    pub filtered: bool,
    pub phase: AgentPhase,
    pub active: usize,
    pub expiring: usize,
    pub passes: u64,
    pub reloads: u64,
    pub last_pass_at: Option<DateTime<Utc>>,
}

impl AgentStatus {
    fn new(spec: &AgentSpec) -> Self {
        Self {
            id: spec.id,
            channel: spec.channel.clone(),
            filtered: spec.filtered,
            phase: AgentPhase::Starting,
            active: 0,
            expiring: 0,
            passes: 0,
            reloads: 0,
            last_pass_at: None,
        }
    }
}

/// Ways an agent task ends abnormally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    /// The channel holds an item recovery cannot decode.
    Recovery { channel: String, source: RecoveryError },
}

impl fmt::Display for AgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentError::Recovery { channel, source } => {
                write!(f, "recovery of channel {channel} failed: {source}")
            }
        }
    }
}

impl std::error::Error for AgentError {}

/// The agent task has stopped and no longer accepts snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentGone {
    pub id: usize,
}

impl fmt::Display for AgentGone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent {} is no longer running", self.id)
    }
}

impl std::error::Error for AgentGone {}

/// Sending side of an agent.
#[derive(Clone)]
pub struct AgentHandle {
    spec: AgentSpec,
    tx: mpsc::Sender<Snapshot>,
    status: watch::Receiver<AgentStatus>,
}

impl AgentHandle {
    pub fn id(&self) -> usize {
        self.spec.id
    }

    pub fn channel(&self) -> &str {
        &self.spec.channel
    }

    pub fn filtered(&self) -> bool {
        self.spec.filtered
    }

    /// Queue a full snapshot. The queue holds one snapshot, so this waits
    /// while the agent is still working through an earlier one.
    pub async fn submit(&self, snapshot: Snapshot) -> Result<(), AgentGone> {
        self.tx
            .send(snapshot)
            .await
            .map_err(|_| AgentGone { id: self.spec.id })
    }

    pub fn status(&self) -> AgentStatus {
        self.status.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<AgentStatus> {
        self.status.clone()
    }
}

/// Start the worker for `spec`. The task runs until every handle is dropped
/// (returns `Ok`) or recovery meets a malformed item (returns `Err`).
pub fn spawn_agent(
    spec: AgentSpec,
    ctx: AgentContext,
) -> (AgentHandle, JoinHandle<Result<(), AgentError>>) {
    let (tx, rx) = mpsc::channel(1);
    let (status_tx, status_rx) = watch::channel(AgentStatus::new(&spec));

    let worker = Worker {
        syncer: Syncer::new(
            spec.id,
            spec.channel.clone(),
            Arc::clone(&ctx.store),
            Arc::clone(&ctx.icons),
            Arc::clone(&ctx.clock),
            ctx.settings.call_interval,
            ctx.settings.dwell,
        ),
        history_limit: ctx.settings.history_limit,
        rx,
        status: status_tx,
    };
    let task = tokio::spawn(worker.run());

    (
        AgentHandle {
            spec,
            tx,
            status: status_rx,
        },
        task,
    )
}

struct Worker {
    syncer: Syncer,
    history_limit: usize,
    rx: mpsc::Receiver<Snapshot>,
    status: watch::Sender<AgentStatus>,
}

impl Worker {
    fn agent(&self) -> usize {
        self.syncer.agent
    }

    fn publish(&self, f: impl FnOnce(&mut AgentStatus)) {
        self.status.send_modify(f);
    }

    async fn run(mut self) -> Result<(), AgentError> {
        let mut ledger = Ledger::new();
        let mut needs_reload = true;
        let mut retained: Option<Snapshot> = None;

        loop {
            if needs_reload {
                self.publish(|s| s.phase = AgentPhase::Reloading);
                ledger = match self.reload().await {
                    Ok(l) => l,
                    Err(err) => {
                        error!(agent = self.agent(), channel = %self.syncer.channel, error = %err, "recovery failed; agent stopping");
                        self.publish(|s| s.phase = AgentPhase::Failed);
                        return Err(err);
                    }
                };
                needs_reload = false;
                let (active, expiring) = (ledger.active().len(), ledger.expiring().len());
                self.publish(|s| {
                    s.phase = AgentPhase::Running;
                    s.reloads += 1;
                    s.active = active;
                    s.expiring = expiring;
                });
            }

            // A snapshot that arrived while the failed one was in flight is
            // newer, so it replaces the retained one.
            let snapshot = match retained.take() {
                Some(old) => self.rx.try_recv().unwrap_or(old),
                None => match self.rx.recv().await {
                    Some(s) => s,
                    None => {
                        info!(agent = self.agent(), channel = %self.syncer.channel, "all handles dropped; agent stopping");
                        self.publish(|s| s.phase = AgentPhase::Stopped);
                        return Ok(());
                    }
                },
            };

            match self.syncer.run_pass(&mut ledger, &snapshot).await {
                Ok(_) => {
                    let now = self.syncer.clock.now();
                    let (active, expiring) = (ledger.active().len(), ledger.expiring().len());
                    self.publish(|s| {
                        s.passes += 1;
                        s.active = active;
                        s.expiring = expiring;
                        s.last_pass_at = Some(now);
                    });
                }
                Err(err) => {
                    warn!(agent = self.agent(), channel = %self.syncer.channel, error = %err, "pass aborted; reloading from channel");
                    // Every abort leaves the ledger out of step with the channel.
                    needs_reload = true;
                    retained = Some(snapshot);
                }
            }
        }
    }

    /// List the channel until the store answers, then rebuild. Orphans are
    /// expired on the way out.
    async fn reload(&mut self) -> Result<Ledger, AgentError> {
        let channel = self.syncer.channel.clone();
        let items = loop {
            match self
                .syncer
                .pacer
                .call(self.syncer.store.list_recent(&channel, self.history_limit))
                .await
            {
                Ok(items) => break items,
                Err(err) => {
                    warn!(agent = self.agent(), channel = %channel, error = %err, "listing channel failed; retrying");
                }
            }
        };

        let recovered = rebuild(&items, &self.syncer.icons).map_err(|source| {
            AgentError::Recovery {
                channel: channel.clone(),
                source,
            }
        })?;

        if !recovered.ledger.ordering_holds() {
            warn!(agent = self.agent(), channel = %channel, "recovered items are out of order");
        }
        info!(
            agent = self.agent(),
            channel = %channel,
            scanned = recovered.scanned,
            active = recovered.ledger.active().len(),
            expiring = recovered.ledger.expiring().len(),
            orphans = recovered.orphans.len(),
            "loaded"
        );

        for orphan in &recovered.orphans {
            warn!(agent = self.agent(), channel = %channel, user = %orphan.key, position = %orphan.position, "duplicate item");
            self.syncer
                .retire_orphan(orphan.position, &orphan.stream)
                .await;
        }

        Ok(recovered.ledger)
    }
}
