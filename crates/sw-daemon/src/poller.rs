//! Feed poll loop: fetch, classify, hand each agent its snapshot.

use std::sync::Arc;
use std::time::Duration;

use sw_feed::{subset_filtered, Classifier, FeedError, StreamSource};
use sw_runtime::AgentHandle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::state::{AppState, BusMsg};

/// What one successful poll produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollReport {
    pub fetched: usize,
    pub tracked: usize,
    pub filtered: usize,
    /// Agents that accepted their snapshot.
    pub delivered: usize,
}

pub struct Poller {
    source: Arc<dyn StreamSource>,
    classifier: Classifier,
    agents: Vec<AgentHandle>,
}

impl Poller {
    pub fn new(
        source: Arc<dyn StreamSource>,
        classifier: Classifier,
        agents: Vec<AgentHandle>,
    ) -> Self {
        Self {
            source,
            classifier,
            agents,
        }
    }

    /// One poll. Agents are served in configuration order and each submit
    /// is awaited, so a busy agent delays the ones after it.
    pub async fn tick(&self) -> Result<PollReport, FeedError> {
        let raw = self.source.fetch().await?;
        let snapshot = self.classifier.classify(&raw);
        let subset = subset_filtered(&snapshot);

        let mut delivered = 0;
        for agent in &self.agents {
            let snap = if agent.filtered() {
                subset.clone()
            } else {
                snapshot.clone()
            };
            match agent.submit(snap).await {
                Ok(()) => delivered += 1,
                Err(gone) => warn!(channel = agent.channel(), error = %gone, "snapshot not delivered"),
            }
        }

        debug!(
            source = self.source.name(),
            fetched = raw.len(),
            tracked = snapshot.len(),
            filtered = subset.len(),
            delivered,
            "poll complete"
        );
        Ok(PollReport {
            fetched: raw.len(),
            tracked: snapshot.len(),
            filtered: subset.len(),
            delivered,
        })
    }
}

/// Poll every `interval`, starting immediately. Failed fetches are recorded
/// and retried on the next tick.
pub fn spawn_poll_loop(poller: Poller, state: Arc<AppState>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let outcome = poller.tick().await;
            let now = chrono::Utc::now();
            let mut poll = state.poll.write().await;
            poll.polls += 1;
            poll.last_poll_at = Some(now);
            match outcome {
                Ok(report) => {
                    poll.last_tracked = report.tracked;
                    poll.last_error = None;
                }
                Err(err) => {
                    warn!(error = %err, "stream fetch failed; retrying next poll");
                    poll.failures += 1;
                    poll.last_error = Some(err.to_string());
                    let _ = state.bus.send(BusMsg::LogLine {
                        level: "WARN".to_string(),
                        msg: format!("stream fetch failed: {err}"),
                    });
                }
            }
        }
    })
}
