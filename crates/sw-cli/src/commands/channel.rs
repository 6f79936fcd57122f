//! Commands that read or write one channel directly.

use anyhow::{Context, Result};
use chrono::Utc;
use sw_config::SecretNeeds;
use sw_daemon::wiring;
use sw_feed::StreamSource;
use sw_runtime::rebuild;
use sw_schemas::{render_card, render_notification, CardState, IconSet, OutgoingItem, Stream, Tier};

use super::{directory, load_typed, secrets};

/// Decode what `channel` shows and print the rebuilt collections.
pub async fn inspect(config_paths: &[String], channel: &str) -> Result<()> {
    let cfg = load_typed(config_paths)?;
    let secrets = secrets(
        &cfg,
        SecretNeeds {
            store: true,
            feed: false,
        },
    )?;
    let store = wiring::build_store(&cfg, &secrets)?;
    let icons = IconSet::new(cfg.icons.clone());

    let items = store
        .list_recent(channel, cfg.sync.history_limit)
        .await
        .with_context(|| format!("list channel {channel} failed"))?;
    let recovered = rebuild(&items, &icons).with_context(|| format!("channel {channel} holds an unreadable item"))?;

    let ledger = &recovered.ledger;
    for (key, e) in ledger.active() {
        println!(
            "active key={} position={} title={:?} started_at={}",
            key,
            e.position,
            e.stream.title,
            e.stream.started_at.to_rfc3339()
        );
    }
    for (key, e) in ledger.expiring() {
        println!(
            "expiring key={} position={} ended_at={}",
            key,
            e.position,
            e.stream.ended_at().to_rfc3339()
        );
    }
    for o in &recovered.orphans {
        println!("duplicate key={} position={}", o.key, o.position);
    }
    println!(
        "scanned={} active={} expiring={} ordering_holds={}",
        recovered.scanned,
        ledger.active().len(),
        ledger.expiring().len(),
        ledger.ordering_holds()
    );
    Ok(())
}

/// Post a live card for the most-watched stream (or a placeholder).
pub async fn post(config_paths: &[String], channel: &str, stub: bool) -> Result<()> {
    let cfg = load_typed(config_paths)?;
    let secrets = secrets(
        &cfg,
        SecretNeeds {
            store: true,
            feed: !stub,
        },
    )?;
    let store = wiring::build_store(&cfg, &secrets)?;
    let icons = IconSet::new(cfg.icons.clone());

    let stream = if stub {
        stub_stream()
    } else {
        let source = wiring::build_source(&cfg, &secrets)?;
        let classifier = wiring::build_classifier(&cfg, directory(&cfg, store.as_ref()).await?);
        let raw = source.fetch().await.context("stream fetch failed")?;
        let top = raw
            .iter()
            .filter(|r| !classifier.classify(std::slice::from_ref(*r)).is_empty())
            .max_by_key(|r| r.viewer_count)
            .context("no live stream to post")?;
        classifier
            .classify(std::slice::from_ref(top))
            .into_values()
            .next()
            .context("no live stream to post")?
    };

    let item = OutgoingItem::announce(
        render_notification(&stream),
        render_card(&stream, CardState::Live, &icons),
    );
    let position = store
        .create(channel, &item)
        .await
        .with_context(|| format!("post to channel {channel} failed"))?;
    println!("posted=true channel={} position={} user={}", channel, position, stream.user);
    Ok(())
}

fn stub_stream() -> Stream {
    Stream {
        user: "StubStreamer".to_string(),
        login: "stubstreamer".to_string(),
        title: "placeholder stream".to_string(),
        started_at: Utc::now(),
        elapsed: chrono::Duration::zero(),
        thumbnail: None,
        tier: Tier::Open,
    }
}
