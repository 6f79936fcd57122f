use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use sw_daemon::poller::Poller;
use sw_directory::{Directory, DirectoryData};
use sw_feed::{Classifier, FeedError, Filter, RawStream, StreamSource};
use sw_runtime::{
    spawn_agent, AgentContext, AgentHandle, AgentSpec, AgentStatus, ManualClock, SyncSettings,
};
use sw_schemas::{decode_card, IconSet};
use sw_store::{MemoryStore, StoreOp};

/// Serves queued responses in order, then empty snapshots.
struct ScriptedSource {
    script: Mutex<Vec<Result<Vec<RawStream>, FeedError>>>,
}

impl ScriptedSource {
    fn new(mut script: Vec<Result<Vec<RawStream>, FeedError>>) -> Self {
        script.reverse();
        Self {
            script: Mutex::new(script),
        }
    }
}

#[async_trait::async_trait]
impl StreamSource for ScriptedSource {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn fetch(&self) -> Result<Vec<RawStream>, FeedError> {
        self.script.lock().unwrap().pop().unwrap_or(Ok(Vec::new()))
    }
}

fn icons() -> IconSet {
    IconSet::new(["open.png".into(), "tagged.png".into(), "registered.png".into()])
}

fn raw(user: &str, title: &str) -> RawStream {
    RawStream {
        user_name: user.to_string(),
        user_login: user.to_lowercase(),
        title: title.to_string(),
        started_at: Utc.with_ymd_and_hms(2024, 6, 1, 19, 30, 0).unwrap(),
        thumbnail_url: None,
        viewer_count: 3,
        tags: Vec::new(),
        game_id: "6086".to_string(),
    }
}

fn rig(source: ScriptedSource) -> (Poller, Arc<MemoryStore>, Vec<AgentHandle>) {
    let store = Arc::new(MemoryStore::new());
    let ctx = AgentContext {
        store: store.clone(),
        icons: Arc::new(icons()),
        clock: Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 20, 0, 0).unwrap(),
        )),
        settings: SyncSettings {
            call_interval: Duration::ZERO,
            ..SyncSettings::default()
        },
    };
    let agents: Vec<AgentHandle> = [("all", false), ("picked", true)]
        .into_iter()
        .enumerate()
        .map(|(id, (channel, filtered))| {
            spawn_agent(
                AgentSpec {
                    id,
                    channel: channel.to_string(),
                    filtered,
                },
                ctx.clone(),
            )
            .0
        })
        .collect();

    let directory = DirectoryData::new(
        [("ana".to_string(), "4242".to_string())].into_iter().collect(),
        ["spam".to_string()].into_iter().collect(),
    );
    let classifier = Classifier::new(
        Filter::new(vec![], vec!["any%".into()]),
        Arc::new(Directory::new(directory)),
    );
    (
        Poller::new(Arc::new(source), classifier, agents.clone()),
        store,
        agents,
    )
}

async fn wait_passes(handle: &AgentHandle, n: u64) -> AgentStatus {
    let mut rx = handle.watch_status();
    let status = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| s.passes >= n))
        .await
        .expect("agent did not finish the pass in time")
        .expect("agent stopped");
    status.clone()
}

fn users(store: &MemoryStore, channel: &str) -> Vec<String> {
    store
        .items(channel)
        .iter()
        .map(|i| decode_card(i.sole_card().unwrap(), &icons()).unwrap().user)
        .collect()
}

#[tokio::test]
async fn filtered_agent_sees_only_tagged_and_registered_streams() {
    let (poller, store, agents) = rig(ScriptedSource::new(vec![Ok(vec![
        raw("Ana", "casual"),
        raw("Bo", "Any% practice"),
        raw("Cy", "chill"),
        raw("Spam", "any% bot"),
    ])]));

    let report = poller.tick().await.unwrap();
    assert_eq!(report.fetched, 4);
    assert_eq!(report.tracked, 3);
    assert_eq!(report.filtered, 2);
    assert_eq!(report.delivered, 2);

    wait_passes(&agents[0], 1).await;
    wait_passes(&agents[1], 1).await;
    assert_eq!(users(&store, "all"), vec!["Ana", "Bo", "Cy"]);
    assert_eq!(users(&store, "picked"), vec!["Ana", "Bo"]);
}

#[tokio::test]
async fn failed_fetch_leaves_agents_untouched() {
    let (poller, store, agents) = rig(ScriptedSource::new(vec![Err(FeedError::Transport(
        "connection refused".into(),
    ))]));

    let err = poller.tick().await.unwrap_err();
    assert!(matches!(err, FeedError::Transport(_)));
    assert_eq!(agents[0].status().passes, 0);
    assert_eq!(store.count(StoreOp::Create), 0);

    poller.tick().await.unwrap();
    wait_passes(&agents[0], 1).await;
}
