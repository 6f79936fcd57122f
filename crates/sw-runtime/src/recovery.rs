//! Rebuild a [`Ledger`] from what a channel actually shows.

use std::collections::BTreeMap;
use std::fmt;

use sw_reconcile::{Entry, Ledger};
use sw_schemas::{decode_card, user_key, CardState, DecodeError, IconSet, Position, Stream, StoredItem};

/// A persisted item that lost its key to a newer item for the same user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Orphan {
    pub key: String,
    pub position: Position,
    pub stream: Stream,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recovered {
    pub ledger: Ledger,
    /// Older duplicates, newest first.
    pub orphans: Vec<Orphan>,
    /// Items looked at, classified or not.
    pub scanned: usize,
}

/// A classified item whose card could not be decoded. The channel holds
/// state this process cannot interpret, so carrying on would be guesswork.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryError {
    pub position: Position,
    pub source: DecodeError,
}

impl fmt::Display for RecoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item {} is malformed: {}", self.position, self.source)
    }
}

impl std::error::Error for RecoveryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Classify `items` (newest first) into active and expiring entries.
///
/// Items without exactly one card, with an unknown colour, or already
/// expired are skipped. The newest item per user wins.
pub fn rebuild(items: &[StoredItem], icons: &IconSet) -> Result<Recovered, RecoveryError> {
    let mut active = BTreeMap::new();
    let mut expiring = BTreeMap::new();
    let mut orphans = Vec::new();

    let mut newest_first: Vec<&StoredItem> = items.iter().collect();
    newest_first.sort_by(|a, b| b.position.cmp(&a.position));

    for item in newest_first {
        let Some(card) = item.sole_card() else {
            continue;
        };
        let state = match CardState::from_colour(card.colour) {
            Some(state @ (CardState::Live | CardState::Expiring)) => state,
            Some(CardState::Expired) | None => continue,
        };
        let stream = decode_card(card, icons).map_err(|source| RecoveryError {
            position: item.position,
            source,
        })?;
        let key = user_key(&stream.user);

        if active.contains_key(&key) || expiring.contains_key(&key) {
            orphans.push(Orphan {
                key,
                position: item.position,
                stream,
            });
            continue;
        }
        let entry = Entry::new(stream, item.position);
        if state.is_live() {
            active.insert(key, entry);
        } else {
            expiring.insert(key, entry);
        }
    }

    Ok(Recovered {
        ledger: Ledger::from_parts(active, expiring),
        orphans,
        scanned: items.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use sw_schemas::{render_card, Card, Tier};

    fn icons() -> IconSet {
        IconSet::new(["i0".into(), "i1".into(), "i2".into()])
    }

    fn stream(user: &str) -> Stream {
        Stream {
            user: user.to_string(),
            login: user.to_lowercase(),
            title: format!("{user} runs"),
            started_at: Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0).unwrap(),
            elapsed: Duration::zero(),
            thumbnail: None,
            tier: Tier::Tagged,
        }
    }

    fn item(position: u64, cards: Vec<Card>) -> StoredItem {
        StoredItem {
            position: Position::new(position),
            text: String::new(),
            cards,
        }
    }

    fn carded(position: u64, user: &str, state: CardState) -> StoredItem {
        let mut s = stream(user);
        if !state.is_live() {
            s.elapsed = Duration::minutes(30);
        }
        item(position, vec![render_card(&s, state, &icons())])
    }

    #[test]
    fn classifies_by_colour_and_skips_the_rest() {
        let mut odd = render_card(&stream("Gus"), CardState::Live, &icons());
        odd.colour = 0x123456;
        let items = vec![
            carded(10, "Ana", CardState::Live),
            carded(9, "Bo", CardState::Expiring),
            carded(8, "Cy", CardState::Expired),
            item(7, vec![]),
            item(6, vec![odd]),
        ];
        let r = rebuild(&items, &icons()).unwrap();
        assert_eq!(r.ledger.active().keys().collect::<Vec<_>>(), vec!["ana"]);
        assert_eq!(r.ledger.expiring().keys().collect::<Vec<_>>(), vec!["bo"]);
        assert_eq!(r.ledger.expiring()["bo"].stream.elapsed, Duration::minutes(30));
        assert_eq!(r.ledger.active()["ana"].stream.tier, Tier::Tagged);
        assert!(r.orphans.is_empty());
        assert_eq!(r.scanned, 5);
    }

    #[test]
    fn newest_item_wins_and_older_ones_are_orphans() {
        let items = vec![
            carded(5, "Ana", CardState::Expiring),
            carded(12, "Ana", CardState::Live),
        ];
        let r = rebuild(&items, &icons()).unwrap();
        assert_eq!(r.ledger.active()["ana"].position, Position::new(12));
        assert!(r.ledger.expiring().is_empty());
        assert_eq!(r.orphans.len(), 1);
        assert_eq!(r.orphans[0].position, Position::new(5));
    }

    #[test]
    fn malformed_classified_item_is_fatal() {
        let mut bad = render_card(&stream("Ana"), CardState::Live, &icons());
        bad.timestamp = "not a time".into();
        let err = rebuild(&[item(3, vec![bad])], &icons()).unwrap_err();
        assert_eq!(err.position, Position::new(3));
        assert!(matches!(err.source, DecodeError::Timestamp { .. }));
    }

    #[test]
    fn malformed_unclassified_item_is_ignored() {
        let mut bad = render_card(&stream("Ana"), CardState::Expired, &icons());
        bad.timestamp = "not a time".into();
        assert!(rebuild(&[item(3, vec![bad])], &icons()).is_ok());
    }
}
