//! Entity identity
//!
//! Ids are handed out monotonically starting at 1. A destroyed id is never
//! handed out again for the lifetime of the registry.

use scene_protocol::EntityId;
use std::collections::BTreeSet;

use crate::error::{EcsError, Result};

#[derive(Debug)]
pub struct EntityRegistry {
    next_id: u64,
    alive: BTreeSet<EntityId>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            alive: BTreeSet::new(),
        }
    }

    /// Allocate a fresh id and mark it live
    pub fn create(&mut self) -> EntityId {
        let id = EntityId::new(self.next_id);
        self.next_id += 1;
        self.alive.insert(id);
        id
    }

    /// Mark an id dead
    pub fn destroy(&mut self, id: EntityId) -> Result<()> {
        if self.alive.remove(&id) {
            Ok(())
        } else {
            Err(EcsError::UnknownEntity(id))
        }
    }

    pub fn is_alive(&self, id: EntityId) -> bool {
        self.alive.contains(&id)
    }

    /// Fail with `UnknownEntity` unless the id is live
    pub fn ensure_alive(&self, id: EntityId) -> Result<()> {
        if self.is_alive(id) {
            Ok(())
        } else {
            Err(EcsError::UnknownEntity(id))
        }
    }

    pub fn len(&self) -> usize {
        self.alive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alive.is_empty()
    }

    /// Live ids in ascending order
    pub fn iter(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.alive.iter().copied()
    }
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_start_at_one_and_increase() {
        let mut registry = EntityRegistry::new();
        assert_eq!(registry.create(), EntityId(1));
        assert_eq!(registry.create(), EntityId(2));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_destroyed_ids_are_not_reused() {
        let mut registry = EntityRegistry::new();
        let a = registry.create();
        registry.destroy(a).unwrap();

        let b = registry.create();
        assert_ne!(a, b);
        assert!(!registry.is_alive(a));
        assert!(registry.is_alive(b));
    }

    #[test]
    fn test_destroy_unknown_fails() {
        let mut registry = EntityRegistry::new();
        let a = registry.create();
        registry.destroy(a).unwrap();

        assert!(matches!(registry.destroy(a), Err(EcsError::UnknownEntity(id)) if id == a));
        assert!(registry.destroy(EntityId(99)).is_err());
    }
}
