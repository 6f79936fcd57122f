//! sw-schemas
//!
//! Value types shared by every streamwall crate: the tracked [`Stream`], its
//! classification [`Tier`], the opaque persisted-item [`Position`], and the
//! card encoding a stream is persisted as.
//!
//! Pure data and formatting. No IO.

mod card;
mod elapsed;

pub use card::*;
pub use elapsed::{format_elapsed, parse_elapsed, serde_secs, ElapsedParseError};

use std::collections::BTreeMap;
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Everything currently live, keyed by [`user_key`].
///
/// A `BTreeMap` so that iteration (and therefore the order in which commands
/// are planned and applied) is deterministic.
pub type Snapshot = BTreeMap<String, Stream>;

/// Case-normalized identity of a streamer.
pub fn user_key(user: &str) -> String {
    user.to_lowercase()
}

// ---------------------------------------------------------------------------
// Tier
// ---------------------------------------------------------------------------

/// Classification tier, decided once when a stream is first observed.
///
/// The discriminant doubles as the index into the configured icon set.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Matched nothing.
    #[default]
    Open = 0,
    /// Matched a configured tag or title keyword.
    Tagged = 1,
    /// Streamer is registered in the directory.
    Registered = 2,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Open, Tier::Tagged, Tier::Registered];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(i: usize) -> Option<Tier> {
        Tier::ALL.get(i).copied()
    }

    /// Filtered channels only carry streams that matched something.
    pub fn passes_filter(self) -> bool {
        self >= Tier::Tagged
    }
}

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// Opaque handle of a persisted item.
///
/// The store guarantees that a newer item always compares greater than an
/// older one. That total order is the only property the reconciliation core
/// relies on; nothing else about the representation is assumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Position(u64);

impl Position {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Position {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(Position)
    }
}

// ---------------------------------------------------------------------------
// Stream
// ---------------------------------------------------------------------------

/// A tracked live stream.
///
/// `user`, `login`, `tier` are fixed when the stream is first observed.
/// `title` follows the latest snapshot. `elapsed` stays zero while the stream
/// is live and is recorded once when it drops out of the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stream {
    /// Display name.
    pub user: String,
    /// Login used in channel URLs (ASCII even when `user` is not).
    pub login: String,
    pub title: String,
    pub started_at: DateTime<Utc>,
    #[serde(with = "serde_secs", default = "Duration::zero")]
    pub elapsed: Duration,
    /// Preview image; only rendered while live.
    pub thumbnail: Option<String>,
    pub tier: Tier,
}

impl Stream {
    pub fn key(&self) -> String {
        user_key(&self.user)
    }

    pub fn url(&self) -> String {
        format!("https://twitch.tv/{}", self.login)
    }

    /// When the stream went down (equal to `started_at` while live).
    pub fn ended_at(&self) -> DateTime<Utc> {
        self.started_at
            .checked_add_signed(self.elapsed)
            .unwrap_or(self.started_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Stream {
        Stream {
            user: "Pyro".to_string(),
            login: "pyro".to_string(),
            title: "any%".to_string(),
            started_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            elapsed: Duration::minutes(95),
            thumbnail: None,
            tier: Tier::Tagged,
        }
    }

    #[test]
    fn key_is_case_normalized() {
        assert_eq!(sample().key(), "pyro");
        assert_eq!(user_key("MiXeD"), "mixed");
    }

    #[test]
    fn ended_at_adds_elapsed() {
        let s = sample();
        assert_eq!(
            s.ended_at(),
            Utc.with_ymd_and_hms(2024, 3, 1, 13, 35, 0).unwrap()
        );
    }

    #[test]
    fn position_order_and_parse() {
        let a: Position = "1000".parse().unwrap();
        let b = Position::new(1001);
        assert!(a < b);
        assert_eq!(b.to_string(), "1001");
        assert!("abc".parse::<Position>().is_err());
    }

    #[test]
    fn tier_index_round_trip_and_filter() {
        for t in Tier::ALL {
            assert_eq!(Tier::from_index(t.index()), Some(t));
        }
        assert_eq!(Tier::from_index(3), None);
        assert!(!Tier::Open.passes_filter());
        assert!(Tier::Tagged.passes_filter());
        assert!(Tier::Registered.passes_filter());
    }

    #[test]
    fn stream_json_carries_elapsed_as_seconds() {
        let v = serde_json::to_value(sample()).unwrap();
        assert_eq!(v["elapsed"], 95 * 60);
        assert_eq!(v["tier"], "tagged");
        let back: Stream = serde_json::from_value(v).unwrap();
        assert_eq!(back, sample());
    }
}
