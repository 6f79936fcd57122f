use sw_schemas::Snapshot;

use crate::{Command, Ledger};

/// Diff the active collection against a full snapshot.
///
/// - Active key missing from the snapshot => `Retire`
/// - Snapshot key already active with a different title => `Edit`
/// - Snapshot key not active => `Activate` (whether it is expiring is
///   decided when the command is applied)
///
/// Retirements come first, then edits and activations in key order. Keys
/// are independent of each other, so any interleaving would do; a fixed
/// order keeps passes reproducible.
pub fn plan(ledger: &Ledger, snapshot: &Snapshot) -> Vec<Command> {
    let mut commands = Vec::new();

    for key in ledger.active().keys() {
        if !snapshot.contains_key(key) {
            commands.push(Command::Retire { key: key.clone() });
        }
    }

    for (key, incoming) in snapshot {
        match ledger.active().get(key) {
            Some(entry) if entry.stream.title != incoming.title => {
                commands.push(Command::Edit {
                    key: key.clone(),
                    title: incoming.title.clone(),
                });
            }
            Some(_) => {}
            None => commands.push(Command::Activate {
                key: key.clone(),
                stream: incoming.clone(),
            }),
        }
    }

    commands
}

/// `true` when the active collection covers exactly the snapshot's keys.
pub fn coverage_holds(ledger: &Ledger, snapshot: &Snapshot) -> bool {
    ledger.active().keys().eq(snapshot.keys())
}
