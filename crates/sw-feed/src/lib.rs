//! sw-feed
//!
//! Snapshot production: fetch live streams from an upstream source and turn
//! them into a classified [`Snapshot`](sw_schemas::Snapshot).
//!
//! This crate does not touch persisted items. Callers hand the snapshots it
//! builds to the sync agents.

mod classify;
pub mod twitch;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use classify::{subset_filtered, Classifier, Filter};
pub use twitch::{Game, GameQuery, TwitchSource};

// ---------------------------------------------------------------------------
// Raw stream
// ---------------------------------------------------------------------------

/// A live stream as reported by the upstream source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawStream {
    /// Display name (e.g. `"Sunshiner"`).
    pub user_name: String,
    /// URL-safe login; may be empty when the upstream omits it.
    pub user_login: String,
    pub title: String,
    pub started_at: DateTime<Utc>,
    /// Thumbnail with size already substituted.
    pub thumbnail_url: Option<String>,
    pub viewer_count: u64,
    pub tags: Vec<String>,
    pub game_id: String,
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors a [`StreamSource`] may return. All are worth retrying on the next
/// poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    /// Credentials were refused or a token could not be obtained.
    Auth(String),
    /// Network or transport failure.
    Transport(String),
    /// The upstream API answered with a non-success status.
    Api { status: u16, message: String },
    /// A response payload could not be decoded.
    Decode(String),
}

impl fmt::Display for FeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedError::Auth(msg) => write!(f, "auth error: {msg}"),
            FeedError::Transport(msg) => write!(f, "transport error: {msg}"),
            FeedError::Api { status, message } => {
                write!(f, "feed api error status={status}: {message}")
            }
            FeedError::Decode(msg) => write!(f, "decode error: {msg}"),
        }
    }
}

impl std::error::Error for FeedError {}

// ---------------------------------------------------------------------------
// Source trait
// ---------------------------------------------------------------------------

/// Upstream live-stream source.
#[async_trait::async_trait]
pub trait StreamSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Every stream currently live in the configured categories. Order is
    /// whatever the upstream returns.
    async fn fetch(&self) -> Result<Vec<RawStream>, FeedError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<RawStream>);

    #[async_trait::async_trait]
    impl StreamSource for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn fetch(&self) -> Result<Vec<RawStream>, FeedError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn source_is_object_safe() {
        let s: Box<dyn StreamSource> = Box::new(Fixed(vec![]));
        assert!(s.fetch().await.unwrap().is_empty());
        assert_eq!(s.name(), "fixed");
    }

    #[test]
    fn feed_error_display() {
        let e = FeedError::Api {
            status: 503,
            message: "unavailable".into(),
        };
        assert_eq!(e.to_string(), "feed api error status=503: unavailable");
    }
}
