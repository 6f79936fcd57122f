use std::fmt;

use serde::{Deserialize, Serialize};
use sw_schemas::{CardState, Position, Stream};

/// A tracked stream paired with the persisted item that represents it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub stream: Stream,
    pub position: Position,
}

impl Entry {
    pub fn new(stream: Stream, position: Position) -> Self {
        Self { stream, position }
    }
}

/// One step computed by [`plan`](crate::plan).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Key is in the snapshot but not active: create, or bring back from expiring.
    Activate { key: String, stream: Stream },
    /// Key is active and its title changed.
    Edit { key: String, title: String },
    /// Key is active but missing from the snapshot.
    Retire { key: String },
}

impl Command {
    pub fn key(&self) -> &str {
        match self {
            Command::Activate { key, .. } | Command::Edit { key, .. } | Command::Retire { key } => {
                key
            }
        }
    }
}

/// A persisted item that must be rewritten to show `stream` in `state`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Render {
    pub key: String,
    pub position: Position,
    pub stream: Stream,
    pub state: CardState,
}

/// Outcome of moving one entry between collections.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    /// Key whose position was exchanged with the moving entry, if a swap
    /// was needed.
    pub swapped_with: Option<String>,
    /// Rewrites to perform, in order. The swap partner (if any) comes first.
    pub renders: Vec<Render>,
}

/// Precondition violations on [`Ledger`](crate::Ledger) transitions.
///
/// These never occur when commands come from [`plan`](crate::plan) against
/// the same ledger; seeing one means the caller's view is out of sync and
/// the ledger must be reloaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LedgerError {
    NotActive(String),
    NotExpiring(String),
    AlreadyTracked(String),
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::NotActive(k) => write!(f, "{k} is not in the active collection"),
            LedgerError::NotExpiring(k) => write!(f, "{k} is not in the expiring collection"),
            LedgerError::AlreadyTracked(k) => write!(f, "{k} is already tracked"),
        }
    }
}

impl std::error::Error for LedgerError {}
