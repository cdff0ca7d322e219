//! Event router
//!
//! Delivers host events to subscribers during the dispatch phase of a tick.
//! Subscriptions are keyed by event name and target: either any entity or
//! one specific entity. Handlers run in subscription order.
//!
//! Subscribing and unsubscribing go through the world and take effect at the
//! next dispatch boundary, never in the middle of a dispatch pass.

use scene_protocol::EntityId;
use serde_json::Value;
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::error;

use crate::ecs::EcsWorld;
use crate::ecs::system::panic_message;

pub type HandlerResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Callback invoked for each matching event
pub type EventHandler = Box<dyn FnMut(&mut EcsWorld, &HostEvent) -> HandlerResult + Send>;

/// Which events of a name a subscriber receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTarget {
    /// Every event with the name
    Any,
    /// Only events targeting this entity
    Entity(EntityId),
}

impl EventTarget {
    fn matches(&self, entity: Option<EntityId>) -> bool {
        match self {
            EventTarget::Any => true,
            EventTarget::Entity(id) => entity == Some(*id),
        }
    }
}

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// An event received from the host
#[derive(Debug, Clone, PartialEq)]
pub struct HostEvent {
    pub name: String,
    pub entity: Option<EntityId>,
    pub payload: Value,
}

/// Router changes queued on the world
pub(crate) enum SubscriptionCommand {
    Subscribe {
        id: SubscriptionId,
        event_name: String,
        target: EventTarget,
        handler: EventHandler,
    },
    Unsubscribe(SubscriptionId),
}

struct Subscription {
    id: SubscriptionId,
    event_name: String,
    target: EventTarget,
    handler: EventHandler,
}

/// Result of delivering one event
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Handlers invoked
    pub delivered: usize,
    /// Handlers that returned an error or panicked
    pub failed: usize,
}

pub struct EventRouter {
    scene_id: String,
    subscriptions: Vec<Subscription>,
}

impl EventRouter {
    pub fn new(scene_id: impl Into<String>) -> Self {
        Self {
            scene_id: scene_id.into(),
            subscriptions: Vec::new(),
        }
    }

    pub(crate) fn apply(&mut self, commands: Vec<SubscriptionCommand>) {
        for command in commands {
            match command {
                SubscriptionCommand::Subscribe {
                    id,
                    event_name,
                    target,
                    handler,
                } => self.subscriptions.push(Subscription {
                    id,
                    event_name,
                    target,
                    handler,
                }),
                SubscriptionCommand::Unsubscribe(id) => {
                    self.subscriptions.retain(|s| s.id != id);
                }
            }
        }
    }

    /// Drop subscriptions bound to entities that no longer exist
    ///
    /// Returns the ids that were removed.
    pub fn prune(&mut self, world: &EcsWorld) -> Vec<SubscriptionId> {
        let mut pruned = Vec::new();
        self.subscriptions.retain(|s| match s.target {
            EventTarget::Entity(id) if !world.is_alive(id) => {
                pruned.push(s.id);
                false
            }
            _ => true,
        });
        pruned
    }

    /// Invoke every matching handler, in subscription order
    pub fn dispatch(&mut self, world: &mut EcsWorld, event: &HostEvent) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();

        for subscription in &mut self.subscriptions {
            if subscription.event_name != event.name || !subscription.target.matches(event.entity) {
                continue;
            }

            outcome.delivered += 1;
            let handler = &mut subscription.handler;
            let reason = match catch_unwind(AssertUnwindSafe(|| handler(world, event))) {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(panic) => format!("panicked: {}", panic_message(panic.as_ref())),
            };

            outcome.failed += 1;
            error!(
                scene_id = %self.scene_id,
                system = %format!("on:{}", event.name),
                "event handler failed: {}",
                reason
            );
        }

        outcome
    }

    /// Number of live subscriptions for an event name
    pub fn handler_count(&self, event_name: &str) -> usize {
        self.subscriptions
            .iter()
            .filter(|s| s.event_name == event_name)
            .count()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}
