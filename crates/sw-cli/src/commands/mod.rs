//! Command handler modules for sw-cli.
//!
//! Shared config helpers live here; store and feed construction is the
//! daemon's own wiring so both binaries talk to the same endpoints.
//! Command-specific logic lives in the submodules.

pub mod channel;
pub mod feed;

use std::sync::Arc;

use anyhow::{Context, Result};
use sw_config::{load_layered_yaml, resolve_secrets, AppConfig, LoadedConfig, ResolvedSecrets, SecretNeeds};
use sw_directory::{Directory, DirectoryData};
use sw_store::ItemStore;

pub fn load(paths: &[String]) -> Result<LoadedConfig> {
    let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    load_layered_yaml(&path_refs).context("load config failed")
}

pub fn load_typed(paths: &[String]) -> Result<AppConfig> {
    load(paths)?.typed()
}

pub fn secrets(cfg: &AppConfig, needs: SecretNeeds) -> Result<ResolvedSecrets> {
    resolve_secrets(cfg, needs)
}

/// A one-shot directory read; commands do not keep it fresh.
pub async fn directory(cfg: &AppConfig, store: &dyn ItemStore) -> Result<Arc<Directory>> {
    let data = match &cfg.directory {
        Some(dir) => sw_directory::load(store, &dir.channel, dir.history_limit)
            .await
            .with_context(|| format!("directory load from channel {} failed", dir.channel))?,
        None => DirectoryData::default(),
    };
    Ok(Arc::new(Directory::new(data)))
}
