use std::sync::Arc;

use chrono::Duration;
use sw_directory::{Directory, DirectoryData};
use sw_schemas::{user_key, Snapshot, Stream, Tier};

use crate::RawStream;

/// What marks an unregistered stream as tagged. Matching ignores case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    tags: Vec<String>,
    keywords: Vec<String>,
}

impl Filter {
    pub fn new(tags: Vec<String>, keywords: Vec<String>) -> Self {
        Self {
            tags: tags.iter().map(|t| t.to_lowercase()).collect(),
            keywords: keywords
                .iter()
                .map(|k| k.to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn matches(&self, raw: &RawStream) -> bool {
        let tag_hit = raw
            .tags
            .iter()
            .any(|t| self.tags.contains(&t.to_lowercase()));
        if tag_hit {
            return true;
        }
        let title = raw.title.to_lowercase();
        self.keywords.iter().any(|k| title.contains(k.as_str()))
    }
}

/// Turns raw streams into a tiered [`Snapshot`].
pub struct Classifier {
    filter: Filter,
    directory: Arc<Directory>,
}

impl Classifier {
    pub fn new(filter: Filter, directory: Arc<Directory>) -> Self {
        Self { filter, directory }
    }

    /// One snapshot against the directory as it is right now. Blocked users
    /// are dropped. If a user appears twice the later entry wins.
    pub fn classify(&self, raw: &[RawStream]) -> Snapshot {
        let dir = self.directory.snapshot();
        raw.iter()
            .filter(|r| !dir.is_blocked(&r.user_name) && !dir.is_blocked(&r.user_login))
            .map(|r| (user_key(&r.user_name), self.to_stream(r, &dir)))
            .collect()
    }

    fn tier_of(&self, raw: &RawStream, dir: &DirectoryData) -> Tier {
        if dir.is_registered(&raw.user_name) || dir.is_registered(&raw.user_login) {
            Tier::Registered
        } else if self.filter.matches(raw) {
            Tier::Tagged
        } else {
            Tier::Open
        }
    }

    fn to_stream(&self, raw: &RawStream, dir: &DirectoryData) -> Stream {
        let login = if raw.user_login.is_empty() {
            user_key(&raw.user_name)
        } else {
            raw.user_login.clone()
        };
        Stream {
            user: raw.user_name.clone(),
            login,
            title: raw.title.clone(),
            started_at: raw.started_at,
            elapsed: Duration::zero(),
            thumbnail: raw.thumbnail_url.clone(),
            tier: self.tier_of(raw, dir),
        }
    }
}

/// The part of `snapshot` a filtered agent publishes.
pub fn subset_filtered(snapshot: &Snapshot) -> Snapshot {
    snapshot
        .iter()
        .filter(|(_, s)| s.tier.passes_filter())
        .map(|(k, s)| (k.clone(), s.clone()))
        .collect()
}
