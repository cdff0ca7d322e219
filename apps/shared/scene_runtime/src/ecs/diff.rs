//! Diff engine
//!
//! Turns one tick's [`ChangeSet`] into the ordered operation list sent to the
//! host. Output order:
//!
//! 1. `CreateEntity` for entities created this tick that are still alive
//! 2. component updates/removals, grouped by entity in first-touch order
//! 3. `RemoveEntity` for destroyed entities (preceded by their
//!    `CreateEntity` when they were born in the same tick)
//!
//! A mirror of what the host was last told lets the engine skip updates that
//! would not change anything and removals of components the host never saw.

use scene_protocol::{EntityId, OutboundOperation};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

use super::changes::ChangeSet;
use super::store::ComponentStore;

#[derive(Debug, Default)]
pub struct DiffEngine {
    host_entities: HashSet<EntityId>,
    host_components: HashMap<EntityId, HashMap<String, Value>>,
}

impl DiffEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce the operations for one tick and record them as sent
    pub fn diff(&mut self, changes: ChangeSet, store: &ComponentStore) -> Vec<OutboundOperation> {
        let ChangeSet {
            created,
            destroyed,
            touched,
        } = changes;

        let mut ops = Vec::new();

        for &entity_id in &created {
            if destroyed.contains(&entity_id) {
                continue;
            }
            self.host_entities.insert(entity_id);
            ops.push(OutboundOperation::CreateEntity { entity_id });
        }

        for (entity_id, components) in touched {
            // Removing the entity implies removing its components
            if destroyed.contains(&entity_id) || !self.host_entities.contains(&entity_id) {
                continue;
            }

            for component in components {
                match store.get(entity_id, &component) {
                    Some(value) => {
                        let known = self
                            .host_components
                            .get(&entity_id)
                            .and_then(|c| c.get(&component));
                        if known == Some(value) {
                            continue;
                        }
                        self.host_components
                            .entry(entity_id)
                            .or_default()
                            .insert(component.clone(), value.clone());
                        ops.push(OutboundOperation::UpdateComponent {
                            entity_id,
                            component,
                            value: value.clone(),
                        });
                    }
                    None => {
                        let was_known = self
                            .host_components
                            .get_mut(&entity_id)
                            .and_then(|c| c.remove(&component))
                            .is_some();
                        if was_known {
                            ops.push(OutboundOperation::RemoveComponent {
                                entity_id,
                                component,
                            });
                        }
                    }
                }
            }
        }

        for entity_id in destroyed {
            if created.contains(&entity_id) {
                ops.push(OutboundOperation::CreateEntity { entity_id });
                ops.push(OutboundOperation::RemoveEntity { entity_id });
            } else if self.host_entities.remove(&entity_id) {
                self.host_components.remove(&entity_id);
                ops.push(OutboundOperation::RemoveEntity { entity_id });
            }
        }

        ops
    }

    /// Whether the host has been told about an entity
    pub fn host_knows(&self, entity_id: EntityId) -> bool {
        self.host_entities.contains(&entity_id)
    }
}
