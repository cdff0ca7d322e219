//! Per-tick change tracking
//!
//! Records which entities were created or destroyed and which (entity,
//! component) pairs were touched during the current tick, in first-touch
//! order. Values are not copied: the diff engine reads the final state from
//! the store, which makes the last write of the tick win.

use indexmap::{IndexMap, IndexSet};
use scene_protocol::EntityId;

/// Everything that changed during one tick
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ChangeSet {
    /// Entities created this tick, in creation order
    pub created: IndexSet<EntityId>,
    /// Entities destroyed this tick, in destruction order
    pub destroyed: IndexSet<EntityId>,
    /// Touched component types, grouped by entity in first-touch order
    pub touched: IndexMap<EntityId, IndexSet<String>>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.destroyed.is_empty() && self.touched.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct ChangeTracker {
    pending: ChangeSet,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_create(&mut self, entity: EntityId) {
        self.pending.created.insert(entity);
    }

    pub fn record_destroy(&mut self, entity: EntityId) {
        self.pending.destroyed.insert(entity);
    }

    /// Note that a component was attached, mutated or detached
    pub fn record_touch(&mut self, entity: EntityId, component: &str) {
        let types = self.pending.touched.entry(entity).or_default();
        if !types.contains(component) {
            types.insert(component.to_string());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Hand over the tick's changes and start a fresh list
    pub fn take(&mut self) -> ChangeSet {
        std::mem::take(&mut self.pending)
    }
}
