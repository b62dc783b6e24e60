//! Delta replication: which shapes changed since the last tick.

use std::collections::BTreeSet;

use polyarena_protocol::{ServerMessage, ShapeId};

use crate::EntityStore;

/// Dirty-set of shapes, flushed once per simulation tick.
#[derive(Debug, Default)]
pub struct Replication {
    changed: BTreeSet<ShapeId>,
    removed: BTreeSet<ShapeId>,
}

impl Replication {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_changed(&mut self, id: ShapeId) {
        self.removed.remove(&id);
        self.changed.insert(id);
    }

    pub fn mark_removed(&mut self, id: ShapeId) {
        self.changed.remove(&id);
        self.removed.insert(id);
    }

    pub fn is_clean(&self) -> bool {
        self.changed.is_empty() && self.removed.is_empty()
    }

    /// Drains the dirty-set into a `state` message, or `None` if nothing
    /// changed. Changed shapes that no longer exist are skipped.
    pub fn flush(&mut self, store: &EntityStore) -> Option<ServerMessage> {
        if self.is_clean() {
            return None;
        }
        let shapes = std::mem::take(&mut self.changed)
            .iter()
            .filter_map(|id| store.shape(id))
            .map(|shape| shape.to_state())
            .collect();
        let removed = std::mem::take(&mut self.removed).into_iter().collect();
        Some(ServerMessage::State { shapes, removed })
    }
}
