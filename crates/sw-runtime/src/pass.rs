//! One reconciliation pass: plan against the ledger, apply each command to
//! the ledger and the channel, then sweep.

use std::fmt;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use sw_reconcile::{plan, Command, Ledger, LedgerError, Render};
use sw_schemas::{render_card, render_notification, CardState, IconSet, OutgoingItem, Position, Snapshot, Stream};
use sw_store::{ItemStore, StoreError};
use tracing::{debug, info, warn};

use crate::{Clock, Pacer};

/// Why a pass stopped early. After any of these the in-memory ledger no
/// longer matches the channel, so the agent rebuilds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassError {
    /// The item behind a tracked position is gone.
    Vanished {
        key: String,
        position: Position,
        source: StoreError,
    },
    /// A create failed; it may or may not have produced an item.
    CreateFailed { key: String, source: StoreError },
    /// The ledger refused a transition it was asked to make.
    Ledger(LedgerError),
}

impl fmt::Display for PassError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassError::Vanished {
                key,
                position,
                source,
            } => write!(f, "item {position} for {key} vanished: {source}"),
            PassError::CreateFailed { key, source } => {
                write!(f, "create for {key} failed: {source}")
            }
            PassError::Ledger(e) => write!(f, "ledger out of sync: {e}"),
        }
    }
}

impl std::error::Error for PassError {}

impl From<LedgerError> for PassError {
    fn from(e: LedgerError) -> Self {
        PassError::Ledger(e)
    }
}

/// Counts of what one pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    pub created: usize,
    pub edited: usize,
    pub retired: usize,
    pub reactivated: usize,
    pub expired: usize,
    /// Store calls made, retries included.
    pub calls: usize,
}

impl PassStats {
    pub fn is_noop(&self) -> bool {
        self.calls == 0
    }
}

/// Applies passes for one channel. Owns the pacing state so spacing holds
/// across passes, not only within one.
pub struct Syncer {
    pub(crate) agent: usize,
    pub(crate) channel: String,
    pub(crate) store: Arc<dyn ItemStore>,
    pub(crate) icons: Arc<IconSet>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) pacer: Pacer,
    pub(crate) dwell: chrono::Duration,
}

impl Syncer {
    pub fn new(
        agent: usize,
        channel: String,
        store: Arc<dyn ItemStore>,
        icons: Arc<IconSet>,
        clock: Arc<dyn Clock>,
        call_interval: StdDuration,
        dwell: chrono::Duration,
    ) -> Self {
        Self {
            agent,
            channel,
            store,
            icons,
            clock,
            pacer: Pacer::new(call_interval),
            dwell,
        }
    }

    /// Bring `ledger` and the channel in line with `snapshot`, then expire
    /// what has dwelt long enough.
    pub async fn run_pass(
        &mut self,
        ledger: &mut Ledger,
        snapshot: &Snapshot,
    ) -> Result<PassStats, PassError> {
        let mut stats = PassStats::default();

        for cmd in plan(ledger, snapshot) {
            match cmd {
                Command::Retire { key } => {
                    let tr = ledger.retire(&key, self.clock.now())?;
                    info!(agent = self.agent, channel = %self.channel, user = %key, swapped_with = ?tr.swapped_with, "- retire");
                    for r in &tr.renders {
                        self.edit(r, &mut stats).await?;
                    }
                    stats.retired += 1;
                }
                Command::Edit { key, title } => {
                    let r = ledger.edit_title(&key, &title)?;
                    info!(agent = self.agent, channel = %self.channel, user = %key, position = %r.position, title = %title, "~ edit");
                    self.edit(&r, &mut stats).await?;
                }
                Command::Activate { key, stream } => {
                    if ledger.state_of(&key) == Some(CardState::Expiring) {
                        let tr = ledger.reactivate(&key, &stream)?;
                        info!(agent = self.agent, channel = %self.channel, user = %key, swapped_with = ?tr.swapped_with, "* reactivate");
                        for r in &tr.renders {
                            self.edit(r, &mut stats).await?;
                        }
                        stats.reactivated += 1;
                    } else {
                        let position = self.create(&key, &stream, &mut stats).await?;
                        ledger.insert_active(&key, stream, position)?;
                        info!(agent = self.agent, channel = %self.channel, user = %key, position = %position, "+ create");
                        stats.created += 1;
                    }
                }
            }
        }

        for r in ledger.sweep(self.clock.now(), self.dwell) {
            info!(agent = self.agent, channel = %self.channel, user = %r.key, position = %r.position, "/ expire");
            self.edit(&r, &mut stats).await?;
            stats.expired += 1;
        }

        debug!(
            agent = self.agent,
            channel = %self.channel,
            active = ledger.active().len(),
            expiring = ledger.expiring().len(),
            calls = stats.calls,
            "pass complete"
        );
        Ok(stats)
    }

    async fn create(
        &mut self,
        key: &str,
        stream: &Stream,
        stats: &mut PassStats,
    ) -> Result<Position, PassError> {
        let card = render_card(stream, CardState::Live, &self.icons);
        let item = OutgoingItem::announce(render_notification(stream), card);
        stats.calls += 1;
        self.pacer
            .call(self.store.create(&self.channel, &item))
            .await
            .map_err(|source| PassError::CreateFailed {
                key: key.to_string(),
                source,
            })
    }

    /// Rewrite one item. Anything but not-found is retried at the pacing
    /// interval until it goes through.
    async fn edit(&mut self, r: &Render, stats: &mut PassStats) -> Result<(), PassError> {
        let item = OutgoingItem::card(render_card(&r.stream, r.state, &self.icons));
        loop {
            stats.calls += 1;
            match self
                .pacer
                .call(self.store.edit(&self.channel, r.position, &item))
                .await
            {
                Ok(()) => {
                    stats.edited += 1;
                    return Ok(());
                }
                Err(source) if source.is_not_found() => {
                    return Err(PassError::Vanished {
                        key: r.key.clone(),
                        position: r.position,
                        source,
                    });
                }
                Err(err) => {
                    warn!(agent = self.agent, channel = %self.channel, user = %r.key, position = %r.position, error = %err, "edit failed; retrying");
                }
            }
        }
    }

    /// Best-effort rewrite of a stray item to its terminal state.
    pub(crate) async fn retire_orphan(&mut self, position: Position, stream: &Stream) {
        let item = OutgoingItem::card(render_card(stream, CardState::Expired, &self.icons));
        match self
            .pacer
            .call(self.store.edit(&self.channel, position, &item))
            .await
        {
            Ok(()) => info!(agent = self.agent, channel = %self.channel, user = %stream.user, position = %position, "/ expire duplicate"),
            Err(err) => warn!(agent = self.agent, channel = %self.channel, position = %position, error = %err, "could not expire duplicate"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ManualClock;
    use chrono::{TimeZone, Utc};
    use sw_schemas::Tier;
    use sw_store::{MemoryStore, StoreOp};

    fn stream(user: &str) -> Stream {
        Stream {
            user: user.to_string(),
            login: user.to_lowercase(),
            title: "t".to_string(),
            started_at: Utc.with_ymd_and_hms(2024, 6, 1, 20, 0, 0).unwrap(),
            elapsed: chrono::Duration::zero(),
            thumbnail: None,
            tier: Tier::Open,
        }
    }

    fn syncer(store: Arc<MemoryStore>) -> Syncer {
        Syncer::new(
            0,
            "c".to_string(),
            store,
            Arc::new(IconSet::new(["a".into(), "b".into(), "c".into()])),
            Arc::new(ManualClock::new(
                Utc.with_ymd_and_hms(2024, 6, 1, 20, 5, 0).unwrap(),
            )),
            StdDuration::ZERO,
            sw_reconcile::default_dwell(),
        )
    }

    #[tokio::test]
    async fn stats_count_what_the_pass_did() {
        let store = Arc::new(MemoryStore::new());
        let mut s = syncer(store.clone());
        let mut ledger = Ledger::new();

        let snap: Snapshot = [("ana".to_string(), stream("Ana")), ("bo".to_string(), stream("Bo"))]
            .into_iter()
            .collect();
        let stats = s.run_pass(&mut ledger, &snap).await.unwrap();
        assert_eq!((stats.created, stats.calls), (2, 2));

        let stats = s.run_pass(&mut ledger, &snap).await.unwrap();
        assert!(stats.is_noop());

        let only_ana: Snapshot = [("ana".to_string(), stream("Ana"))].into_iter().collect();
        let stats = s.run_pass(&mut ledger, &only_ana).await.unwrap();
        assert_eq!(stats.retired, 1);
        assert_eq!(stats.edited, 2, "swap partner plus the retired item");
        assert_eq!(store.count(StoreOp::Edit), 2);
        assert!(ledger.ordering_holds());
    }

    #[tokio::test]
    async fn stale_ledger_is_reported_not_papered_over() {
        let store = Arc::new(MemoryStore::new());
        let mut s = syncer(store.clone());
        let mut ledger = Ledger::new();
        ledger
            .insert_active("ana", stream("Ana"), Position::new(40))
            .unwrap();

        let err = s.run_pass(&mut ledger, &Snapshot::new()).await.unwrap_err();
        assert!(matches!(err, PassError::Vanished { ref key, .. } if key == "ana"));
    }
}
