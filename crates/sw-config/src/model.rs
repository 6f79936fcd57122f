//! Typed view of the merged configuration tree.

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreKind,
    #[serde(default)]
    pub discord: DiscordConfig,
    pub twitch: TwitchConfig,
    #[serde(default)]
    pub directory: Option<DirectoryConfig>,
    pub agents: Vec<AgentConfig>,
    #[serde(default)]
    pub sync: SyncConfig,
    /// Author icon URLs for the open, tagged and registered tiers.
    pub icons: [String; 3],
    #[serde(default)]
    pub status: Option<StatusConfig>,
}

/// Backing store for persisted items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    #[default]
    Discord,
    /// In-process; nothing leaves the machine. Useful for dry runs.
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DiscordConfig {
    /// Name of the env var holding the bot token.
    pub token_env: String,
    pub api_base: String,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token_env: "SW_DISCORD_TOKEN".to_string(),
            api_base: "https://discord.com/api/v10".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TwitchConfig {
    #[serde(default = "default_client_id_env")]
    pub client_id_env: String,
    #[serde(default = "default_client_secret_env")]
    pub client_secret_env: String,
    #[serde(default = "default_helix_base")]
    pub api_base: String,
    #[serde(default = "default_auth_base")]
    pub auth_base: String,
    /// Category ids whose live streams are polled.
    pub game_ids: Vec<String>,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub filter: FilterConfig,
}

impl TwitchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

fn default_client_id_env() -> String {
    "SW_TWITCH_CLIENT_ID".to_string()
}

fn default_client_secret_env() -> String {
    "SW_TWITCH_CLIENT_SECRET".to_string()
}

fn default_helix_base() -> String {
    "https://api.twitch.tv/helix".to_string()
}

fn default_auth_base() -> String {
    "https://id.twitch.tv/oauth2".to_string()
}

fn default_poll_interval_secs() -> u64 {
    60
}

/// What marks an unregistered stream as tagged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FilterConfig {
    /// Stream tags, compared case-insensitively.
    pub tags: Vec<String>,
    /// Title substrings, compared case-insensitively.
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirectoryConfig {
    /// Channel whose posts list registered and blocked users.
    pub channel: String,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,
}

impl DirectoryConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }
}

fn default_refresh_secs() -> u64 {
    300
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    pub channel: String,
    /// Publish only tagged and registered streams.
    #[serde(default)]
    pub filtered: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SyncConfig {
    /// Minimum spacing between store calls of one agent.
    pub call_interval_ms: u64,
    /// How long an ended stream stays expiring.
    pub dwell_secs: u64,
    /// Items read back when rebuilding state from a channel.
    pub history_limit: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            call_interval_ms: 1000,
            dwell_secs: 900,
            history_limit: default_history_limit(),
        }
    }
}

impl SyncConfig {
    pub fn call_interval(&self) -> Duration {
        Duration::from_millis(self.call_interval_ms)
    }

    pub fn dwell(&self) -> Duration {
        Duration::from_secs(self.dwell_secs)
    }
}

fn default_history_limit() -> usize {
    100
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatusConfig {
    pub addr: SocketAddr,
}

impl AppConfig {
    /// Cross-field checks serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.agents.is_empty() {
            bail!("CONFIG_INVALID: at least one agent is required");
        }
        let mut seen = BTreeSet::new();
        for a in &self.agents {
            if a.channel.trim().is_empty() {
                bail!("CONFIG_INVALID: agent channel must not be empty");
            }
            if !seen.insert(a.channel.as_str()) {
                bail!(
                    "CONFIG_INVALID: channel '{}' is assigned to more than one agent",
                    a.channel
                );
            }
        }
        if let Some(dir) = &self.directory {
            if seen.contains(dir.channel.as_str()) {
                bail!(
                    "CONFIG_INVALID: directory channel '{}' is also an agent channel",
                    dir.channel
                );
            }
            if dir.history_limit == 0 || dir.refresh_secs == 0 {
                bail!("CONFIG_INVALID: directory history_limit and refresh_secs must be positive");
            }
        }
        if self.twitch.game_ids.is_empty() {
            bail!("CONFIG_INVALID: twitch.game_ids must name at least one category");
        }
        if self.twitch.poll_interval_secs == 0 {
            bail!("CONFIG_INVALID: twitch.poll_interval_secs must be positive");
        }
        if self.sync.history_limit == 0 {
            bail!("CONFIG_INVALID: sync.history_limit must be positive");
        }
        if self.icons.iter().any(|i| i.trim().is_empty()) {
            bail!("CONFIG_INVALID: all three icon urls are required");
        }
        Ok(())
    }
}
