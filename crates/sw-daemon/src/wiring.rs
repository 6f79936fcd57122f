//! Turns a validated [`AppConfig`] into running components.

use std::sync::Arc;

use anyhow::{Context, Result};
use sw_config::{AppConfig, ResolvedSecrets, StoreKind};
use sw_directory::{Directory, DirectoryData};
use sw_feed::{Classifier, Filter, TwitchSource};
use sw_runtime::{
    spawn_agent, AgentContext, AgentError, AgentHandle, AgentSpec, Clock, SyncSettings,
};
use sw_schemas::IconSet;
use sw_store::{DiscordStore, ItemStore, MemoryStore};
use tokio::task::{JoinError, JoinSet};
use tracing::{info, warn};

/// How an agent task ended: its id, channel and outcome.
pub type AgentExit = (usize, String, Result<Result<(), AgentError>, JoinError>);

pub fn build_store(cfg: &AppConfig, secrets: &ResolvedSecrets) -> Result<Arc<dyn ItemStore>> {
    match cfg.store {
        StoreKind::Discord => {
            let token = secrets
                .discord_token
                .clone()
                .with_context(|| format!("discord token ({}) not resolved", cfg.discord.token_env))?;
            Ok(Arc::new(DiscordStore::new_with_base_url(
                token,
                cfg.discord.api_base.clone(),
            )))
        }
        StoreKind::Memory => {
            warn!("memory store selected; nothing will be published");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

pub fn build_source(cfg: &AppConfig, secrets: &ResolvedSecrets) -> Result<TwitchSource> {
    let client_id = secrets
        .twitch_client_id
        .clone()
        .with_context(|| format!("twitch client id ({}) not resolved", cfg.twitch.client_id_env))?;
    let client_secret = secrets.twitch_client_secret.clone().with_context(|| {
        format!(
            "twitch client secret ({}) not resolved",
            cfg.twitch.client_secret_env
        )
    })?;
    Ok(TwitchSource::new_with_base_urls(
        client_id,
        client_secret,
        cfg.twitch.game_ids.clone(),
        cfg.twitch.api_base.clone(),
        cfg.twitch.auth_base.clone(),
    ))
}

/// Load the directory once and keep it fresh in the background. Without a
/// directory channel every stream is unregistered and nobody is blocked.
pub async fn build_directory(cfg: &AppConfig, store: &Arc<dyn ItemStore>) -> Result<Arc<Directory>> {
    let Some(dir_cfg) = &cfg.directory else {
        info!("no directory channel configured");
        return Ok(Arc::new(Directory::new(DirectoryData::default())));
    };

    let data = sw_directory::load(store.as_ref(), &dir_cfg.channel, dir_cfg.history_limit)
        .await
        .with_context(|| format!("initial directory load from channel {} failed", dir_cfg.channel))?;
    let directory = Arc::new(Directory::new(data));
    sw_directory::spawn_refresh(
        Arc::clone(&directory),
        Arc::clone(store),
        dir_cfg.channel.clone(),
        dir_cfg.history_limit,
        dir_cfg.refresh_interval(),
    );
    Ok(directory)
}

pub fn build_classifier(cfg: &AppConfig, directory: Arc<Directory>) -> Classifier {
    let filter = Filter::new(
        cfg.twitch.filter.tags.clone(),
        cfg.twitch.filter.keywords.clone(),
    );
    Classifier::new(filter, directory)
}

pub fn agent_context(
    cfg: &AppConfig,
    store: Arc<dyn ItemStore>,
    clock: Arc<dyn Clock>,
) -> Result<AgentContext> {
    let dwell = chrono::Duration::from_std(cfg.sync.dwell()).context("dwell_secs out of range")?;
    Ok(AgentContext {
        store,
        icons: Arc::new(IconSet::new(cfg.icons.clone())),
        clock,
        settings: SyncSettings {
            call_interval: cfg.sync.call_interval(),
            dwell,
            history_limit: cfg.sync.history_limit,
        },
    })
}

/// One agent per configured channel, ids in configuration order.
pub fn spawn_agents(cfg: &AppConfig, ctx: &AgentContext) -> (Vec<AgentHandle>, JoinSet<AgentExit>) {
    let mut handles = Vec::with_capacity(cfg.agents.len());
    let mut tasks = JoinSet::new();
    for (id, agent) in cfg.agents.iter().enumerate() {
        let spec = AgentSpec {
            id,
            channel: agent.channel.clone(),
            filtered: agent.filtered,
        };
        let (handle, task) = spawn_agent(spec, ctx.clone());
        let channel = agent.channel.clone();
        tasks.spawn(async move { (id, channel, task.await) });
        info!(agent = id, channel = %agent.channel, filtered = agent.filtered, "agent started");
        handles.push(handle);
    }
    (handles, tasks)
}
