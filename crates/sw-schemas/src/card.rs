//! Card encoding of a [`Stream`].
//!
//! A persisted item is a message holding optional text and one card. The
//! card's colour is the visual-state marker recovery classifies by; every
//! other field is enough to rebuild the [`Stream`] it was rendered from.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::{format_elapsed, parse_elapsed, Position, Stream, Tier};

pub const LIVE_COLOUR: u32 = 0x00ff00;
pub const EXPIRING_COLOUR: u32 = 0xff8000;
pub const EXPIRED_COLOUR: u32 = 0xff0000;

// ---------------------------------------------------------------------------
// Visual state
// ---------------------------------------------------------------------------

/// Lifecycle state of a persisted item, as shown to readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardState {
    /// Stream is in the latest snapshot.
    Live,
    /// Stream ended less than the dwell threshold ago.
    Expiring,
    /// Terminal; no longer tracked.
    Expired,
}

impl CardState {
    pub fn colour(self) -> u32 {
        match self {
            CardState::Live => LIVE_COLOUR,
            CardState::Expiring => EXPIRING_COLOUR,
            CardState::Expired => EXPIRED_COLOUR,
        }
    }

    pub fn from_colour(colour: u32) -> Option<CardState> {
        match colour {
            LIVE_COLOUR => Some(CardState::Live),
            EXPIRING_COLOUR => Some(CardState::Expiring),
            EXPIRED_COLOUR => Some(CardState::Expired),
            _ => None,
        }
    }

    pub fn is_live(self) -> bool {
        matches!(self, CardState::Live)
    }
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub author_name: String,
    pub author_url: String,
    pub icon_url: String,
    /// `"[<title>](<url>)"`.
    pub description: String,
    pub colour: u32,
    pub thumbnail: Option<String>,
    /// Elapsed text on ended cards.
    pub footer: Option<String>,
    /// RFC 3339 start time.
    pub timestamp: String,
}

/// Body of a create or edit call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingItem {
    /// Plain text shown above the card. `None` clears any existing text.
    pub text: Option<String>,
    pub card: Option<Card>,
}

impl OutgoingItem {
    /// Card only; clears any text left on the item.
    pub fn card(card: Card) -> Self {
        Self {
            text: None,
            card: Some(card),
        }
    }

    /// Card plus a notification line, used when an item is first created.
    pub fn announce(text: String, card: Card) -> Self {
        Self {
            text: Some(text),
            card: Some(card),
        }
    }

    pub fn text(text: String) -> Self {
        Self {
            text: Some(text),
            card: None,
        }
    }
}

/// A persisted item as listed back from a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredItem {
    pub position: Position,
    pub text: String,
    pub cards: Vec<Card>,
}

impl StoredItem {
    /// The single card of a well-formed item, if it has exactly one.
    pub fn sole_card(&self) -> Option<&Card> {
        match self.cards.as_slice() {
            [card] => Some(card),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Icons
// ---------------------------------------------------------------------------

/// Author icon per [`Tier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconSet([String; 3]);

impl IconSet {
    pub fn new(urls: [String; 3]) -> Self {
        Self(urls)
    }

    pub fn url(&self, tier: Tier) -> &str {
        &self.0[tier.index()]
    }

    /// Highest tier whose icon is `url`; unknown icons decode as [`Tier::Open`].
    pub fn tier_of(&self, url: &str) -> Tier {
        Tier::ALL
            .iter()
            .rev()
            .copied()
            .find(|t| self.url(*t) == url)
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

pub fn render_card(stream: &Stream, state: CardState, icons: &IconSet) -> Card {
    let url = stream.url();
    let verb = if state.is_live() { "is live" } else { "was live" };
    let footer = match state {
        CardState::Live => None,
        _ => Some(format_elapsed(stream.elapsed)).filter(|t| !t.is_empty()),
    };
    Card {
        author_name: format!("{} {}", stream.user, verb),
        author_url: url.clone(),
        icon_url: icons.url(stream.tier).to_string(),
        description: format!("[{}]({})", stream.title, url),
        colour: state.colour(),
        thumbnail: if state.is_live() {
            stream.thumbnail.clone()
        } else {
            None
        },
        footer,
        timestamp: stream
            .started_at
            .to_rfc3339_opts(SecondsFormat::Secs, true),
    }
}

/// Push-notification text carried by a freshly created item.
pub fn render_notification(stream: &Stream) -> String {
    format!("{}: {}", stream.user, stream.title)
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    AuthorName(String),
    AuthorUrl(String),
    Description(String),
    Timestamp { value: String, reason: String },
    Elapsed { value: String, reason: String },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::AuthorName(v) => write!(f, "malformed author name: {v:?}"),
            DecodeError::AuthorUrl(v) => write!(f, "malformed author url: {v:?}"),
            DecodeError::Description(v) => write!(f, "malformed description: {v:?}"),
            DecodeError::Timestamp { value, reason } => {
                write!(f, "malformed timestamp {value:?}: {reason}")
            }
            DecodeError::Elapsed { value, reason } => {
                write!(f, "malformed elapsed footer {value:?}: {reason}")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// Rebuild the [`Stream`] a card was rendered from.
///
/// Tolerates legacy cards without a footer (elapsed decodes as zero) or
/// thumbnail. Timestamp and non-empty footer text must parse.
pub fn decode_card(card: &Card, icons: &IconSet) -> Result<Stream, DecodeError> {
    let user = card
        .author_name
        .split_once(' ')
        .map(|(u, _)| u)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| DecodeError::AuthorName(card.author_name.clone()))?;

    let login = card
        .author_url
        .trim_end_matches('/')
        .rsplit_once('/')
        .map(|(_, l)| l)
        .filter(|l| !l.is_empty())
        .ok_or_else(|| DecodeError::AuthorUrl(card.author_url.clone()))?;

    let title = card
        .description
        .strip_prefix('[')
        .and_then(|rest| rest.rfind("](").map(|i| &rest[..i]))
        .ok_or_else(|| DecodeError::Description(card.description.clone()))?;

    let started_at = DateTime::parse_from_rfc3339(&card.timestamp)
        .map_err(|e| DecodeError::Timestamp {
            value: card.timestamp.clone(),
            reason: e.to_string(),
        })?
        .with_timezone(&Utc);

    let elapsed = match card.footer.as_deref() {
        Some(text) => parse_elapsed(text).map_err(|e| DecodeError::Elapsed {
            value: text.to_string(),
            reason: e.reason.to_string(),
        })?,
        None => chrono::Duration::zero(),
    };

    Ok(Stream {
        user: user.to_string(),
        login: login.to_string(),
        title: title.to_string(),
        started_at,
        elapsed,
        thumbnail: card.thumbnail.clone().filter(|t| !t.is_empty()),
        tier: icons.tier_of(&card.icon_url),
    })
}
