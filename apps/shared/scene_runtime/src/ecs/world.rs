//! The per-session ECS world
//!
//! `EcsWorld` owns every piece of scene state: live entities, component
//! values, declared component types, the tick's pending changes and the
//! pending host queries. It is the object systems and event handlers receive,
//! so it also queues scheduler and router changes requested while a tick is
//! running.

use scene_protocol::{EntityId, RequestId};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashSet;

use super::changes::{ChangeSet, ChangeTracker};
use super::entity::EntityRegistry;
use super::store::ComponentStore;
use super::system::{System, SystemCommand, SystemId};
use super::types::{ComponentRegistry, ComponentSchema, QueryOptions, QueryResult};
use crate::bridge::events::{EventTarget, HandlerResult, HostEvent, SubscriptionCommand, SubscriptionId};
use crate::bridge::query::{QueryCallback, QueryOutcome, QueryTable};
use crate::error::{EcsError, Result};

pub struct EcsWorld {
    entities: EntityRegistry,
    store: ComponentStore,
    components: ComponentRegistry,
    changes: ChangeTracker,
    queries: QueryTable,
    tick: u64,

    next_system_id: u64,
    systems: HashSet<SystemId>,
    system_commands: Vec<SystemCommand>,

    next_subscription_id: u64,
    subscriptions: HashSet<SubscriptionId>,
    subscription_commands: Vec<SubscriptionCommand>,
}

impl EcsWorld {
    /// A world that knows the built-in scene components
    pub fn new() -> Self {
        Self::with_registry(ComponentRegistry::with_builtin())
    }

    pub fn with_registry(components: ComponentRegistry) -> Self {
        Self {
            entities: EntityRegistry::new(),
            store: ComponentStore::new(),
            components,
            changes: ChangeTracker::new(),
            queries: QueryTable::new(),
            tick: 0,
            next_system_id: 0,
            systems: HashSet::new(),
            system_commands: Vec::new(),
            next_subscription_id: 0,
            subscriptions: HashSet::new(),
            subscription_commands: Vec::new(),
        }
    }

    /// Declare (or redeclare) a component type
    pub fn register_component(&mut self, schema: ComponentSchema) {
        self.components.register(schema);
    }

    pub fn component_registry(&self) -> &ComponentRegistry {
        &self.components
    }

    pub fn create_entity(&mut self) -> EntityId {
        let id = self.entities.create();
        self.changes.record_create(id);
        id
    }

    /// Destroy an entity and everything attached to it
    pub fn destroy_entity(&mut self, entity: EntityId) -> Result<()> {
        self.entities.destroy(entity)?;
        for component in self.store.remove_entity(entity) {
            self.changes.record_touch(entity, &component);
        }
        self.changes.record_destroy(entity);
        Ok(())
    }

    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.entities.is_alive(entity)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Live entities in ascending id order
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.iter()
    }

    /// Attach a component, replacing any previous value of the same type
    pub fn attach(&mut self, entity: EntityId, component: &str, value: Value) -> Result<()> {
        self.entities.ensure_alive(entity)?;
        self.components.validate(component, &value)?;

        self.store.insert(entity, component, value);
        self.changes.record_touch(entity, component);
        Ok(())
    }

    /// Attach a typed value, serialized to JSON
    pub fn attach_as<T: Serialize>(&mut self, entity: EntityId, component: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.attach(entity, component, value)
    }

    /// Current value of a component; `None` for dead entities
    pub fn get(&self, entity: EntityId, component: &str) -> Option<&Value> {
        if !self.entities.is_alive(entity) {
            return None;
        }
        self.store.get(entity, component)
    }

    /// Current value of a component, deserialized into `T`
    pub fn get_as<T: DeserializeOwned>(&self, entity: EntityId, component: &str) -> Result<Option<T>> {
        match self.get(entity, component) {
            Some(value) => Ok(Some(T::deserialize(value)?)),
            None => Ok(None),
        }
    }

    pub fn has(&self, entity: EntityId, component: &str) -> bool {
        self.get(entity, component).is_some()
    }

    /// Read-modify-write a component
    ///
    /// Starts from the current value, or from the type's default when the
    /// entity has none. The result must still satisfy the type's schema;
    /// otherwise the store is left untouched.
    pub fn mutate<F>(&mut self, entity: EntityId, component: &str, updater: F) -> Result<()>
    where
        F: FnOnce(&mut Value),
    {
        self.entities.ensure_alive(entity)?;
        if !self.components.contains(component) {
            return Err(EcsError::UnknownComponentType(component.to_string()));
        }

        let mut value = match self.store.get(entity, component) {
            Some(current) => current.clone(),
            None => self
                .components
                .default_for(component)
                .cloned()
                .ok_or_else(|| EcsError::ComponentNotFound {
                    entity,
                    component: component.to_string(),
                })?,
        };

        updater(&mut value);
        self.components.validate(component, &value)?;

        self.store.insert(entity, component, value);
        self.changes.record_touch(entity, component);
        Ok(())
    }

    /// Detach a component; returns false when it was not attached
    pub fn detach(&mut self, entity: EntityId, component: &str) -> Result<bool> {
        self.entities.ensure_alive(entity)?;

        if self.store.remove(entity, component).is_none() {
            return Ok(false);
        }
        self.changes.record_touch(entity, component);
        Ok(true)
    }

    /// Component types attached to an entity, sorted
    pub fn components_of(&self, entity: EntityId) -> Vec<&str> {
        if !self.entities.is_alive(entity) {
            return Vec::new();
        }
        self.store.component_names(entity)
    }

    /// Entities having all `with` and none of the `without` components
    pub fn query(&self, options: &QueryOptions) -> Vec<QueryResult> {
        let limit = options.limit.unwrap_or(usize::MAX);

        self.entities
            .iter()
            .filter(|&entity| {
                options
                    .with_components
                    .iter()
                    .all(|c| self.store.contains(entity, c))
                    && !options
                        .without_components
                        .iter()
                        .any(|c| self.store.contains(entity, c))
            })
            .take(limit)
            .map(|entity| {
                options
                    .with_components
                    .iter()
                    .fold(QueryResult::new(entity), |result, c| {
                        match self.store.get(entity, c) {
                            Some(value) => result.with_component(c.clone(), value.clone()),
                            None => result,
                        }
                    })
            })
            .collect()
    }

    /// Add a system; it runs from the next tick on
    pub fn register_system(&mut self, system: impl System + 'static, priority: i32) -> SystemId {
        self.next_system_id += 1;
        let id = SystemId(self.next_system_id);

        self.systems.insert(id);
        self.system_commands.push(SystemCommand::Register {
            id,
            priority,
            system: Box::new(system),
        });
        id
    }

    /// Remove a system starting with the next tick
    pub fn unregister_system(&mut self, id: SystemId) -> bool {
        if !self.systems.remove(&id) {
            return false;
        }
        self.system_commands.push(SystemCommand::Unregister(id));
        true
    }

    pub(crate) fn take_system_commands(&mut self) -> Vec<SystemCommand> {
        std::mem::take(&mut self.system_commands)
    }

    /// Subscribe to host events; active from the next dispatch phase
    pub fn subscribe<F>(&mut self, event_name: impl Into<String>, target: EventTarget, handler: F) -> SubscriptionId
    where
        F: FnMut(&mut EcsWorld, &HostEvent) -> HandlerResult + Send + 'static,
    {
        self.next_subscription_id += 1;
        let id = SubscriptionId(self.next_subscription_id);

        self.subscriptions.insert(id);
        self.subscription_commands.push(SubscriptionCommand::Subscribe {
            id,
            event_name: event_name.into(),
            target,
            handler: Box::new(handler),
        });
        id
    }

    /// Stop a subscription starting with the next dispatch phase
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        if !self.subscriptions.remove(&id) {
            return false;
        }
        self.subscription_commands.push(SubscriptionCommand::Unsubscribe(id));
        true
    }

    pub(crate) fn take_subscription_commands(&mut self) -> Vec<SubscriptionCommand> {
        std::mem::take(&mut self.subscription_commands)
    }

    pub(crate) fn forget_subscriptions(&mut self, ids: &[SubscriptionId]) {
        for id in ids {
            self.subscriptions.remove(id);
        }
    }

    /// Ask the host something; the answer arrives in a later tick
    pub fn issue_query<F>(&mut self, query: impl Into<String>, payload: Value, callback: F) -> RequestId
    where
        F: FnOnce(&mut EcsWorld, QueryOutcome) + Send + 'static,
    {
        self.queries.issue(query, payload, Box::new(callback))
    }

    /// Drop a pending query; returns false if it was not pending
    pub fn cancel_query(&mut self, request_id: &RequestId) -> bool {
        self.queries.cancel(request_id)
    }

    pub fn has_pending_query(&self, request_id: &RequestId) -> bool {
        self.queries.is_pending(request_id)
    }

    pub fn pending_query_count(&self) -> usize {
        self.queries.len()
    }

    pub(crate) fn queries_mut(&mut self) -> &mut QueryTable {
        &mut self.queries
    }

    pub(crate) fn take_query(&mut self, request_id: &RequestId) -> Option<QueryCallback> {
        self.queries.resolve(request_id)
    }

    /// Number of the tick in progress (0 before the first tick)
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    pub(crate) fn begin_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// Hand the tick's pending changes to the diff engine
    pub(crate) fn take_changes(&mut self) -> ChangeSet {
        self.changes.take()
    }

    pub(crate) fn store(&self) -> &ComponentStore {
        &self.store
    }
}

impl Default for EcsWorld {
    fn default() -> Self {
        Self::new()
    }
}
