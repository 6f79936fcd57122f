//! Runtime secret resolution.
//!
//! # Contract
//! - Config YAML stores only env var NAMES (e.g. `"SW_DISCORD_TOKEN"`).
//! - Callers invoke [`resolve_secrets`] once at startup and pass the result
//!   into constructors.
//! - `Debug` redacts values; errors name the variable, never its value.

use anyhow::{bail, Result};

use crate::{AppConfig, StoreKind};

/// Which credentials the caller cannot run without.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SecretNeeds {
    /// The Discord token, when the configured store is Discord.
    pub store: bool,
    /// The Twitch client id and secret.
    pub feed: bool,
}

impl SecretNeeds {
    pub const ALL: SecretNeeds = SecretNeeds {
        store: true,
        feed: true,
    };
}

#[derive(Clone)]
pub struct ResolvedSecrets {
    pub discord_token: Option<String>,
    pub twitch_client_id: Option<String>,
    pub twitch_client_secret: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field(
                "discord_token",
                &self.discord_token.as_ref().map(|_| "<REDACTED>"),
            )
            .field(
                "twitch_client_id",
                &self.twitch_client_id.as_ref().map(|_| "<REDACTED>"),
            )
            .field(
                "twitch_client_secret",
                &self.twitch_client_secret.as_ref().map(|_| "<REDACTED>"),
            )
            .finish()
    }
}

/// Unset or blank variables resolve to `None`.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

/// Read every credential named in `cfg` from the environment.
///
/// # Errors
/// Names the first variable `needs` requires that is unset or empty.
pub fn resolve_secrets(cfg: &AppConfig, needs: SecretNeeds) -> Result<ResolvedSecrets> {
    let discord_token = resolve_env(&cfg.discord.token_env);
    let twitch_client_id = resolve_env(&cfg.twitch.client_id_env);
    let twitch_client_secret = resolve_env(&cfg.twitch.client_secret_env);

    if needs.store && cfg.store == StoreKind::Discord && discord_token.is_none() {
        bail!(
            "SECRETS_MISSING: required env var '{}' (discord bot token) is not set or empty",
            cfg.discord.token_env
        );
    }
    if needs.feed {
        if twitch_client_id.is_none() {
            bail!(
                "SECRETS_MISSING: required env var '{}' (twitch client id) is not set or empty",
                cfg.twitch.client_id_env
            );
        }
        if twitch_client_secret.is_none() {
            bail!(
                "SECRETS_MISSING: required env var '{}' (twitch client secret) is not set or empty",
                cfg.twitch.client_secret_env
            );
        }
    }

    Ok(ResolvedSecrets {
        discord_token,
        twitch_client_id,
        twitch_client_secret,
    })
}
