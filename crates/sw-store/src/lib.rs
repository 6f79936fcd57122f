//! sw-store
//!
//! Persistence boundary for channel items.
//!
//! This crate owns the [`ItemStore`] contract and its implementations:
//! [`DiscordStore`] over the Discord REST API and [`MemoryStore`] for dry
//! runs and tests. It knows nothing about ledgers or reconciliation; callers
//! decide what to write and how to react to each error class.

pub mod discord;
pub mod memory;

use std::fmt;

use sw_schemas::{OutgoingItem, Position, StoredItem};

pub use discord::DiscordStore;
pub use memory::{MemoryStore, StoreCall, StoreOp};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors an [`ItemStore`] may return.
///
/// `NotFound` is the one class callers treat specially: the handle they hold
/// no longer exists. Everything else may be transient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The channel or item does not exist.
    NotFound { what: String },
    /// Network or transport failure; the server-side effect is unknown.
    Transport(String),
    /// The remote API answered with a non-success status.
    Api { status: u16, message: String },
    /// A response payload could not be decoded.
    Decode(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound { what } => write!(f, "not found: {what}"),
            StoreError::Transport(msg) => write!(f, "transport error: {msg}"),
            StoreError::Api { status, message } => {
                write!(f, "store api error status={status}: {message}")
            }
            StoreError::Decode(msg) => write!(f, "decode error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// A channel of persisted items.
///
/// Positions issued by `create` must increase with creation time; the
/// reconciliation core depends on nothing else about them.
#[async_trait::async_trait]
pub trait ItemStore: Send + Sync {
    /// Human-readable name identifying this store (e.g. `"discord"`).
    fn name(&self) -> &'static str;

    /// Post a new item and return its position.
    async fn create(&self, channel: &str, item: &OutgoingItem) -> Result<Position, StoreError>;

    /// Replace the text and card of an existing item.
    async fn edit(
        &self,
        channel: &str,
        position: Position,
        item: &OutgoingItem,
    ) -> Result<(), StoreError>;

    /// Up to `limit` of the newest items, newest first.
    async fn list_recent(&self, channel: &str, limit: usize)
        -> Result<Vec<StoredItem>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_display() {
        let err = StoreError::Api {
            status: 429,
            message: "slow down".to_string(),
        };
        assert_eq!(err.to_string(), "store api error status=429: slow down");
        assert_eq!(
            StoreError::Transport("connection refused".to_string()).to_string(),
            "transport error: connection refused"
        );
    }

    #[test]
    fn only_not_found_is_not_found() {
        assert!(StoreError::NotFound {
            what: "message 1".to_string()
        }
        .is_not_found());
        assert!(!StoreError::Decode("x".to_string()).is_not_found());
    }

    #[test]
    fn store_is_object_safe_via_box() {
        let _s: Box<dyn ItemStore> = Box::new(MemoryStore::new());
    }
}
