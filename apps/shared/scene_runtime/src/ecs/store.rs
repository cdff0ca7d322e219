//! Component value storage
//!
//! Plain data: one JSON value per (entity, component type). The store owns
//! no behavior; liveness and validation are checked by the world.

use scene_protocol::EntityId;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct ComponentStore {
    entities: HashMap<EntityId, HashMap<String, Value>>,
}

impl ComponentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value, returning the one it replaced
    pub fn insert(&mut self, entity: EntityId, component: &str, value: Value) -> Option<Value> {
        self.entities
            .entry(entity)
            .or_default()
            .insert(component.to_string(), value)
    }

    pub fn get(&self, entity: EntityId, component: &str) -> Option<&Value> {
        self.entities.get(&entity)?.get(component)
    }

    pub fn contains(&self, entity: EntityId, component: &str) -> bool {
        self.get(entity, component).is_some()
    }

    pub fn remove(&mut self, entity: EntityId, component: &str) -> Option<Value> {
        let components = self.entities.get_mut(&entity)?;
        let removed = components.remove(component);
        if components.is_empty() {
            self.entities.remove(&entity);
        }
        removed
    }

    /// Drop every component of an entity, returning the detached type ids
    pub fn remove_entity(&mut self, entity: EntityId) -> Vec<String> {
        self.entities
            .remove(&entity)
            .map(|components| components.into_keys().collect())
            .unwrap_or_default()
    }

    /// Type ids attached to an entity, sorted
    pub fn component_names(&self, entity: EntityId) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .entities
            .get(&entity)
            .map(|components| components.keys().map(String::as_str).collect())
            .unwrap_or_default();
        names.sort_unstable();
        names
    }

    /// Total number of component instances
    pub fn len(&self) -> usize {
        self.entities.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_instance_per_type() {
        let mut store = ComponentStore::new();
        let e = EntityId(1);

        assert!(store.insert(e, "Health", json!({"hp": 1})).is_none());
        let previous = store.insert(e, "Health", json!({"hp": 2}));

        assert_eq!(previous, Some(json!({"hp": 1})));
        assert_eq!(store.get(e, "Health"), Some(&json!({"hp": 2})));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_remove_entity_returns_types() {
        let mut store = ComponentStore::new();
        let e = EntityId(1);
        store.insert(e, "B", json!(1));
        store.insert(e, "A", json!(2));
        assert_eq!(store.component_names(e), vec!["A", "B"]);

        let mut removed = store.remove_entity(e);
        removed.sort();
        assert_eq!(removed, vec!["A".to_string(), "B".to_string()]);
        assert!(store.is_empty());
        assert!(store.remove_entity(e).is_empty());
    }

    #[test]
    fn test_remove_missing_is_none() {
        let mut store = ComponentStore::new();
        assert!(store.remove(EntityId(1), "A").is_none());
        store.insert(EntityId(1), "A", json!(null));
        assert!(store.remove(EntityId(1), "A").is_some());
        assert!(store.is_empty());
    }
}
