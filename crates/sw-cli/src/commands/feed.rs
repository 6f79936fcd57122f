//! Read-only feed commands.

use anyhow::{Context, Result};
use sw_config::SecretNeeds;
use sw_daemon::wiring;
use sw_feed::{GameQuery, StreamSource};

use super::{directory, load_typed, secrets};

/// Print the classified snapshot as JSON lines, in key order.
pub async fn fetch(config_paths: &[String]) -> Result<()> {
    let cfg = load_typed(config_paths)?;
    let secrets = secrets(
        &cfg,
        SecretNeeds {
            store: cfg.directory.is_some(),
            feed: true,
        },
    )?;

    let store = wiring::build_store(&cfg, &secrets)?;
    let classifier = wiring::build_classifier(&cfg, directory(&cfg, store.as_ref()).await?);
    let source = wiring::build_source(&cfg, &secrets)?;

    let raw = source.fetch().await.context("stream fetch failed")?;
    let snapshot = classifier.classify(&raw);
    for (key, stream) in &snapshot {
        println!("{}", serde_json::json!({ "key": key, "stream": stream }));
    }
    println!("fetched={} tracked={}", raw.len(), snapshot.len());
    Ok(())
}

pub async fn game(config_paths: &[String], query: &GameQuery) -> Result<()> {
    let cfg = load_typed(config_paths)?;
    let secrets = secrets(
        &cfg,
        SecretNeeds {
            store: false,
            feed: true,
        },
    )?;
    let source = wiring::build_source(&cfg, &secrets)?;

    let games = source.games(query).await.context("game lookup failed")?;
    if games.is_empty() {
        anyhow::bail!("no category matches {:?}", query);
    }
    for g in games {
        println!("id={} name={}", g.id, g.name);
    }
    Ok(())
}
