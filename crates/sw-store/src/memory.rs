//! In-process [`ItemStore`] used for dry runs and tests.
//!
//! Every call is recorded in order, and faults can be queued per operation
//! so tests can drive the agent through its error paths.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use sw_schemas::{OutgoingItem, Position, StoredItem};

use crate::{ItemStore, StoreError};

/// Which store operation a queued fault applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Create,
    Edit,
    List,
}

/// One recorded store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Create {
        channel: String,
        item: OutgoingItem,
    },
    Edit {
        channel: String,
        position: Position,
        item: OutgoingItem,
    },
    List {
        channel: String,
        limit: usize,
    },
}

impl StoreCall {
    pub fn op(&self) -> StoreOp {
        match self {
            StoreCall::Create { .. } => StoreOp::Create,
            StoreCall::Edit { .. } => StoreOp::Edit,
            StoreCall::List { .. } => StoreOp::List,
        }
    }
}

enum Fault {
    /// Fail without touching the channel.
    Reject(StoreError),
    /// Persist the item, then report failure.
    AfterPersist(StoreError),
}

#[derive(Default)]
struct Inner {
    next_position: u64,
    channels: HashMap<String, BTreeMap<Position, StoredItem>>,
    calls: Vec<StoreCall>,
    faults: HashMap<StoreOp, VecDeque<Fault>>,
}

impl Inner {
    fn take_fault(&mut self, op: StoreOp) -> Option<Fault> {
        self.faults.get_mut(&op).and_then(VecDeque::pop_front)
    }

    fn allocate(&mut self) -> Position {
        self.next_position += 1;
        Position::new(self.next_position)
    }
}

fn stored(position: Position, item: &OutgoingItem) -> StoredItem {
    StoredItem {
        position,
        text: item.text.clone().unwrap_or_default(),
        cards: item.card.iter().cloned().collect(),
    }
}

/// Channels held in memory. Positions are a single counter shared across
/// channels, so they increase with creation time everywhere.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panicking test thread must not wedge every later call.
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Queue `err` for the next call of `op`. Faults queue up in order.
    pub fn fail_next(&self, op: StoreOp, err: StoreError) {
        self.lock()
            .faults
            .entry(op)
            .or_default()
            .push_back(Fault::Reject(err));
    }

    /// The next create persists its item and still returns `err`, like a
    /// request whose response was lost.
    pub fn fail_next_create_after_persist(&self, err: StoreError) {
        self.lock()
            .faults
            .entry(StoreOp::Create)
            .or_default()
            .push_back(Fault::AfterPersist(err));
    }

    /// Place an item directly, bypassing the call log.
    pub fn insert_raw(&self, channel: &str, item: StoredItem) {
        let mut inner = self.lock();
        inner.next_position = inner.next_position.max(item.position.get());
        inner
            .channels
            .entry(channel.to_string())
            .or_default()
            .insert(item.position, item);
    }

    /// Delete an item out from under whoever holds its position.
    pub fn remove(&self, channel: &str, position: Position) -> Option<StoredItem> {
        self.lock()
            .channels
            .get_mut(channel)
            .and_then(|items| items.remove(&position))
    }

    /// Items of `channel`, oldest first.
    pub fn items(&self, channel: &str) -> Vec<StoredItem> {
        self.lock()
            .channels
            .get(channel)
            .map(|items| items.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn item(&self, channel: &str, position: Position) -> Option<StoredItem> {
        self.lock()
            .channels
            .get(channel)
            .and_then(|items| items.get(&position).cloned())
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    /// Number of recorded calls of `op`.
    pub fn count(&self, op: StoreOp) -> usize {
        self.lock().calls.iter().filter(|c| c.op() == op).count()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }
}

#[async_trait::async_trait]
impl ItemStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn create(&self, channel: &str, item: &OutgoingItem) -> Result<Position, StoreError> {
        let mut inner = self.lock();
        inner.calls.push(StoreCall::Create {
            channel: channel.to_string(),
            item: item.clone(),
        });

        let after_persist = match inner.take_fault(StoreOp::Create) {
            Some(Fault::Reject(err)) => return Err(err),
            Some(Fault::AfterPersist(err)) => Some(err),
            None => None,
        };

        let position = inner.allocate();
        inner
            .channels
            .entry(channel.to_string())
            .or_default()
            .insert(position, stored(position, item));

        match after_persist {
            Some(err) => Err(err),
            None => Ok(position),
        }
    }

    async fn edit(
        &self,
        channel: &str,
        position: Position,
        item: &OutgoingItem,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.calls.push(StoreCall::Edit {
            channel: channel.to_string(),
            position,
            item: item.clone(),
        });

        let after_persist = match inner.take_fault(StoreOp::Edit) {
            Some(Fault::Reject(err)) => return Err(err),
            Some(Fault::AfterPersist(err)) => Some(err),
            None => None,
        };

        let slot = inner
            .channels
            .get_mut(channel)
            .and_then(|items| items.get_mut(&position))
            .ok_or_else(|| StoreError::NotFound {
                what: format!("item {position} in channel {channel}"),
            })?;
        *slot = stored(position, item);

        match after_persist {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn list_recent(
        &self,
        channel: &str,
        limit: usize,
    ) -> Result<Vec<StoredItem>, StoreError> {
        let mut inner = self.lock();
        inner.calls.push(StoreCall::List {
            channel: channel.to_string(),
            limit,
        });

        if let Some(Fault::Reject(err) | Fault::AfterPersist(err)) = inner.take_fault(StoreOp::List)
        {
            return Err(err);
        }

        Ok(inner
            .channels
            .get(channel)
            .map(|items| items.values().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> OutgoingItem {
        OutgoingItem::text(s.to_string())
    }

    #[tokio::test]
    async fn positions_increase_and_list_is_newest_first() {
        let store = MemoryStore::new();
        let a = store.create("c", &text("a")).await.unwrap();
        let b = store.create("c", &text("b")).await.unwrap();
        let other = store.create("d", &text("x")).await.unwrap();
        assert!(a < b && b < other);

        let listed = store.list_recent("c", 10).await.unwrap();
        assert_eq!(
            listed.iter().map(|i| i.text.as_str()).collect::<Vec<_>>(),
            vec!["b", "a"]
        );
        assert_eq!(store.list_recent("c", 1).await.unwrap().len(), 1);
        assert!(store.list_recent("empty", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn edit_of_missing_item_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .edit("c", Position::new(7), &text("x"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let p = store.create("c", &text("a")).await.unwrap();
        store.remove("c", p);
        assert!(store.edit("c", p, &text("b")).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn queued_faults_fire_once_in_order() {
        let store = MemoryStore::new();
        store.fail_next(StoreOp::Create, StoreError::Transport("one".into()));
        store.fail_next(StoreOp::Create, StoreError::Transport("two".into()));

        assert_eq!(
            store.create("c", &text("a")).await,
            Err(StoreError::Transport("one".into()))
        );
        assert_eq!(
            store.create("c", &text("a")).await,
            Err(StoreError::Transport("two".into()))
        );
        assert!(store.create("c", &text("a")).await.is_ok());
        assert_eq!(store.items("c").len(), 1);
        assert_eq!(store.count(StoreOp::Create), 3);
    }

    #[tokio::test]
    async fn ambiguous_create_persists_the_item() {
        let store = MemoryStore::new();
        store.fail_next_create_after_persist(StoreError::Transport("reset".into()));
        assert!(store.create("c", &text("a")).await.is_err());
        assert_eq!(store.items("c").len(), 1);
    }

    #[tokio::test]
    async fn edit_replaces_text_and_card() {
        let store = MemoryStore::new();
        let p = store.create("c", &text("a")).await.unwrap();
        store
            .edit(
                "c",
                p,
                &OutgoingItem {
                    text: None,
                    card: None,
                },
            )
            .await
            .unwrap();
        let item = store.item("c", p).unwrap();
        assert_eq!(item.text, "");
        assert!(item.cards.is_empty());
    }

    #[test]
    fn insert_raw_advances_the_counter() {
        let store = MemoryStore::new();
        store.insert_raw(
            "c",
            StoredItem {
                position: Position::new(50),
                text: String::new(),
                cards: vec![],
            },
        );
        assert_eq!(store.lock().allocate(), Position::new(51));
        assert!(store.calls().is_empty());
    }
}
