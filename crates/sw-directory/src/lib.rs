//! sw-directory
//!
//! Registered and blocked users, read from posts in a directory channel.
//!
//! Post formats (first line is a header and may carry a comment):
//!
//! ```text
//! dir <comment>
//! <discord_user_id> <twitch_user>
//! ...
//!
//! block <comment>
//! <twitch_user>
//! ...
//! ```
//!
//! Readers take an `Arc` to a fully built [`DirectoryData`]; a reload swaps in
//! a new one without ever exposing a half-parsed state.

mod parse;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use sw_store::{ItemStore, StoreError};
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub use parse::parse_posts;

/// One parsed generation of the directory. Keys are lower-cased Twitch users.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryData {
    registered: BTreeMap<String, String>,
    blocked: BTreeSet<String>,
}

impl DirectoryData {
    pub fn new(registered: BTreeMap<String, String>, blocked: BTreeSet<String>) -> Self {
        Self {
            registered,
            blocked,
        }
    }

    pub fn is_registered(&self, user: &str) -> bool {
        self.registered.contains_key(&sw_schemas::user_key(user))
    }

    pub fn is_blocked(&self, user: &str) -> bool {
        self.blocked.contains(&sw_schemas::user_key(user))
    }

    pub fn registered_count(&self) -> usize {
        self.registered.len()
    }

    pub fn blocked_count(&self) -> usize {
        self.blocked.len()
    }
}

/// Shared, atomically replaceable directory.
#[derive(Debug, Default)]
pub struct Directory {
    current: RwLock<Arc<DirectoryData>>,
}

impl Directory {
    pub fn new(data: DirectoryData) -> Self {
        Self {
            current: RwLock::new(Arc::new(data)),
        }
    }

    /// The directory as of now. Later reloads do not affect the returned value.
    pub fn snapshot(&self) -> Arc<DirectoryData> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&*guard),
            Err(poisoned) => Arc::clone(&*poisoned.into_inner()),
        }
    }

    pub fn replace(&self, data: DirectoryData) {
        let data = Arc::new(data);
        match self.current.write() {
            Ok(mut guard) => *guard = data,
            Err(poisoned) => *poisoned.into_inner() = data,
        }
    }
}

/// Read the newest `limit` posts of `channel` and parse them.
pub async fn load(
    store: &dyn ItemStore,
    channel: &str,
    limit: usize,
) -> Result<DirectoryData, StoreError> {
    let posts = store.list_recent(channel, limit).await?;
    let data = parse_posts(&posts);
    info!(
        channel,
        registered = data.registered_count(),
        blocked = data.blocked_count(),
        "directory loaded"
    );
    Ok(data)
}

/// Reload `directory` from `channel` every `interval`. The first reload
/// happens one interval after the call. A failed reload keeps the previous
/// generation.
pub fn spawn_refresh(
    directory: Arc<Directory>,
    store: Arc<dyn ItemStore>,
    channel: String,
    limit: usize,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match load(store.as_ref(), &channel, limit).await {
                Ok(data) => directory.replace(data),
                Err(err) => warn!(channel = %channel, error = %err, "directory refresh failed; keeping previous"),
            }
        }
    })
}
