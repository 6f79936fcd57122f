use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use sw_schemas::{CardState, Position, Stream};

use crate::{Entry, LedgerError, Render, Transition};

/// In-memory view of one channel's tracked items.
///
/// Invariant (ordering): when both collections are non-empty, the oldest
/// active position is greater than the newest expiring position. Every
/// transition below preserves it given it held before.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Ledger {
    active: BTreeMap<String, Entry>,
    expiring: BTreeMap<String, Entry>,
}

fn extremal(map: &BTreeMap<String, Entry>, newest: bool) -> Option<(String, Position)> {
    let positions = map.iter().map(|(k, e)| (k, e.position));
    let found = if newest {
        positions.max_by_key(|(_, p)| *p)
    } else {
        positions.min_by_key(|(_, p)| *p)
    };
    found.map(|(k, p)| (k.clone(), p))
}

fn render(key: &str, entry: &Entry, state: CardState) -> Render {
    Render {
        key: key.to_string(),
        position: entry.position,
        stream: entry.stream.clone(),
        state,
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from recovered collections. A key present in both is kept as
    /// active only.
    pub fn from_parts(
        active: BTreeMap<String, Entry>,
        mut expiring: BTreeMap<String, Entry>,
    ) -> Self {
        expiring.retain(|k, _| !active.contains_key(k));
        Self { active, expiring }
    }

    pub fn active(&self) -> &BTreeMap<String, Entry> {
        &self.active
    }

    pub fn expiring(&self) -> &BTreeMap<String, Entry> {
        &self.expiring
    }

    pub fn len(&self) -> usize {
        self.active.len() + self.expiring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty() && self.expiring.is_empty()
    }

    pub fn state_of(&self, key: &str) -> Option<CardState> {
        if self.active.contains_key(key) {
            Some(CardState::Live)
        } else if self.expiring.contains_key(key) {
            Some(CardState::Expiring)
        } else {
            None
        }
    }

    pub fn oldest_active(&self) -> Option<(String, Position)> {
        extremal(&self.active, false)
    }

    pub fn newest_expiring(&self) -> Option<(String, Position)> {
        extremal(&self.expiring, true)
    }

    /// `true` when every active position is above every expiring one.
    pub fn ordering_holds(&self) -> bool {
        match (self.oldest_active(), self.newest_expiring()) {
            (Some((_, lo)), Some((_, hi))) => lo > hi,
            _ => true,
        }
    }

    /// Track a freshly created item. Its position is the newest in the
    /// channel, so ordering holds without a swap.
    pub fn insert_active(
        &mut self,
        key: &str,
        stream: Stream,
        position: Position,
    ) -> Result<(), LedgerError> {
        if self.state_of(key).is_some() {
            return Err(LedgerError::AlreadyTracked(key.to_string()));
        }
        self.active
            .insert(key.to_string(), Entry::new(stream, position));
        Ok(())
    }

    /// Refresh the title of an active entry in place.
    pub fn edit_title(&mut self, key: &str, title: &str) -> Result<Render, LedgerError> {
        let entry = self
            .active
            .get_mut(key)
            .ok_or_else(|| LedgerError::NotActive(key.to_string()))?;
        entry.stream.title = title.to_string();
        Ok(render(key, entry, CardState::Live))
    }

    /// Move `key` from active to expiring.
    ///
    /// If another active entry holds an older position, the two exchange
    /// positions: the leaving entry takes the oldest active position and the
    /// remaining one keeps a position above every expiring entry.
    pub fn retire(&mut self, key: &str, now: DateTime<Utc>) -> Result<Transition, LedgerError> {
        let mut entry = self
            .active
            .remove(key)
            .ok_or_else(|| LedgerError::NotActive(key.to_string()))?;

        let mut renders = Vec::with_capacity(2);
        let mut swapped_with = None;
        if let Some((other_key, other_pos)) = extremal(&self.active, false) {
            if other_pos < entry.position {
                if let Some(other) = self.active.get_mut(&other_key) {
                    other.position = entry.position;
                    renders.push(render(&other_key, other, CardState::Live));
                }
                entry.position = other_pos;
                swapped_with = Some(other_key);
            }
        }

        entry.stream.elapsed = (now - entry.stream.started_at).max(Duration::zero());
        renders.push(render(key, &entry, CardState::Expiring));
        self.expiring.insert(key.to_string(), entry);

        Ok(Transition {
            swapped_with,
            renders,
        })
    }

    /// Move `key` from expiring back to active.
    ///
    /// Requires `key` to be expiring, so the expiring collection is non-empty
    /// whenever a swap partner is looked up. The partner is the newest
    /// expiring entry; after the exchange it still sits below every active
    /// position. The returning entry takes the new occurrence's title, start
    /// time and thumbnail and drops its recorded elapsed time.
    pub fn reactivate(&mut self, key: &str, incoming: &Stream) -> Result<Transition, LedgerError> {
        if self.active.contains_key(key) {
            return Err(LedgerError::AlreadyTracked(key.to_string()));
        }
        let mut entry = self
            .expiring
            .remove(key)
            .ok_or_else(|| LedgerError::NotExpiring(key.to_string()))?;

        let mut renders = Vec::with_capacity(2);
        let mut swapped_with = None;
        if let Some((other_key, other_pos)) = extremal(&self.expiring, true) {
            if other_pos > entry.position {
                if let Some(other) = self.expiring.get_mut(&other_key) {
                    other.position = entry.position;
                    renders.push(render(&other_key, other, CardState::Expiring));
                }
                entry.position = other_pos;
                swapped_with = Some(other_key);
            }
        }

        entry.stream.title = incoming.title.clone();
        entry.stream.started_at = incoming.started_at;
        entry.stream.thumbnail = incoming.thumbnail.clone();
        entry.stream.elapsed = Duration::zero();
        renders.push(render(key, &entry, CardState::Live));
        self.active.insert(key.to_string(), entry);

        Ok(Transition {
            swapped_with,
            renders,
        })
    }

    /// Drop every expiring entry that ended more than `dwell` before `now`,
    /// returning the terminal rewrites in key order.
    pub fn sweep(&mut self, now: DateTime<Utc>, dwell: Duration) -> Vec<Render> {
        let due: Vec<String> = self
            .expiring
            .iter()
            .filter(|(_, e)| now - e.stream.ended_at() > dwell)
            .map(|(k, _)| k.clone())
            .collect();

        due.into_iter()
            .filter_map(|k| {
                self.expiring
                    .remove(&k)
                    .map(|e| render(&k, &e, CardState::Expired))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sw_schemas::Tier;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 4, 18, 0, 0).unwrap()
    }

    fn stream(user: &str, title: &str) -> Stream {
        Stream {
            user: user.to_string(),
            login: user.to_lowercase(),
            title: title.to_string(),
            started_at: t0(),
            elapsed: Duration::zero(),
            thumbnail: Some(format!("https://thumbs.example/{user}.jpg")),
            tier: Tier::Open,
        }
    }

    fn ledger(active: &[(&str, u64)], expiring: &[(&str, u64)]) -> Ledger {
        let mut l = Ledger::new();
        for (k, p) in active {
            l.insert_active(k, stream(k, "t"), Position::new(*p)).unwrap();
        }
        for (k, p) in expiring {
            l.expiring
                .insert(k.to_string(), Entry::new(stream(k, "t"), Position::new(*p)));
        }
        l
    }

    fn pos(l: &Ledger, key: &str) -> u64 {
        l.active()
            .get(key)
            .or_else(|| l.expiring().get(key))
            .map(|e| e.position.get())
            .unwrap()
    }

    #[test]
    fn retire_oldest_needs_no_swap() {
        let mut l = ledger(&[("a", 10), ("b", 20)], &[]);
        let tr = l.retire("a", t0() + Duration::minutes(30)).unwrap();
        assert_eq!(tr.swapped_with, None);
        assert_eq!(tr.renders.len(), 1);
        assert_eq!(tr.renders[0].state, CardState::Expiring);
        assert_eq!(tr.renders[0].stream.elapsed, Duration::minutes(30));
        assert_eq!(l.state_of("a"), Some(CardState::Expiring));
        assert!(l.ordering_holds());
    }

    #[test]
    fn retire_newer_swaps_with_oldest_active() {
        let mut l = ledger(&[("a", 10), ("b", 20), ("c", 30)], &[("z", 5)]);
        let tr = l.retire("c", t0()).unwrap();
        assert_eq!(tr.swapped_with.as_deref(), Some("a"));
        // partner rewritten first, as live, at the retiring entry's old position
        assert_eq!(tr.renders[0].key, "a");
        assert_eq!(tr.renders[0].state, CardState::Live);
        assert_eq!(tr.renders[0].position, Position::new(30));
        assert_eq!(tr.renders[1].key, "c");
        assert_eq!(tr.renders[1].position, Position::new(10));
        assert_eq!(pos(&l, "a"), 30);
        assert_eq!(pos(&l, "c"), 10);
        assert!(l.ordering_holds());
    }

    #[test]
    fn reactivate_swaps_with_newest_expiring() {
        let mut l = ledger(&[("a", 50)], &[("x", 10), ("y", 20), ("z", 30)]);
        let mut back = stream("x", "second attempt");
        back.started_at = t0() + Duration::hours(1);
        let tr = l.reactivate("x", &back).unwrap();
        assert_eq!(tr.swapped_with.as_deref(), Some("z"));
        assert_eq!(tr.renders[0].key, "z");
        assert_eq!(tr.renders[0].state, CardState::Expiring);
        assert_eq!(tr.renders[0].position, Position::new(10));
        let x = &l.active()["x"];
        assert_eq!(x.position, Position::new(30));
        assert_eq!(x.stream.title, "second attempt");
        assert_eq!(x.stream.started_at, back.started_at);
        assert_eq!(x.stream.elapsed, Duration::zero());
        assert!(l.ordering_holds());
    }

    #[test]
    fn reactivate_requires_expiring_entry() {
        let mut l = ledger(&[("a", 50)], &[]);
        assert_eq!(
            l.reactivate("b", &stream("b", "t")),
            Err(LedgerError::NotExpiring("b".to_string()))
        );
        assert_eq!(
            l.reactivate("a", &stream("a", "t")),
            Err(LedgerError::AlreadyTracked("a".to_string()))
        );
    }

    #[test]
    fn insert_refuses_tracked_keys() {
        let mut l = ledger(&[("a", 1)], &[("b", 0)]);
        assert!(l.insert_active("a", stream("a", "t"), Position::new(9)).is_err());
        assert!(l.insert_active("b", stream("b", "t"), Position::new(9)).is_err());
    }

    #[test]
    fn edit_title_keeps_position() {
        let mut l = ledger(&[("a", 7)], &[]);
        let r = l.edit_title("a", "new").unwrap();
        assert_eq!(r.position, Position::new(7));
        assert_eq!(r.stream.title, "new");
        assert_eq!(l.active()["a"].stream.title, "new");
        assert!(l.edit_title("nope", "x").is_err());
    }

    #[test]
    fn sweep_removes_only_entries_past_dwell() {
        let mut l = ledger(&[("a", 50)], &[]);
        l.insert_active("b", stream("b", "t"), Position::new(60)).unwrap();
        l.retire("a", t0() + Duration::minutes(10)).unwrap();
        l.retire("b", t0() + Duration::minutes(20)).unwrap();

        let dwell = Duration::minutes(15);
        assert!(l.sweep(t0() + Duration::minutes(25), dwell).is_empty());

        let gone = l.sweep(t0() + Duration::minutes(26), dwell);
        assert_eq!(gone.len(), 1);
        assert_eq!(gone[0].key, "a");
        assert_eq!(gone[0].state, CardState::Expired);
        assert_eq!(l.state_of("a"), None);
        assert_eq!(l.state_of("b"), Some(CardState::Expiring));
    }

    #[test]
    fn from_parts_prefers_active_on_overlap() {
        let mut active = BTreeMap::new();
        active.insert("a".to_string(), Entry::new(stream("a", "t"), Position::new(9)));
        let mut expiring = BTreeMap::new();
        expiring.insert("a".to_string(), Entry::new(stream("a", "t"), Position::new(3)));
        let l = Ledger::from_parts(active, expiring);
        assert_eq!(l.len(), 1);
        assert_eq!(l.state_of("a"), Some(CardState::Live));
    }
}
