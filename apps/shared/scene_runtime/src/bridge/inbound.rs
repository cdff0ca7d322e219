//! Inbound bridge
//!
//! Parses frames from the host and queues them, in arrival order, until the
//! dispatch phase of the next tick. Nothing is delivered from `on_message`
//! itself. Messages that lost a race with the scene (events for destroyed
//! entities, responses to cancelled or expired queries) are dropped.

use scene_protocol::{InboundMessage, RequestId};
use std::collections::VecDeque;
use tracing::{debug, warn};

use super::events::HostEvent;
use super::query::QueryOutcome;
use crate::ecs::EcsWorld;

/// Why an inbound message was discarded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropReason {
    /// The target entity is no longer alive
    DeadEntity,
    /// No pending query has this request id
    UnmatchedRequest,
    /// The frame is not a valid inbound message
    Malformed,
}

/// A parsed message waiting for the dispatch phase
#[derive(Debug, Clone, PartialEq)]
pub enum InboundItem {
    Event(HostEvent),
    QueryResponse {
        request_id: RequestId,
        outcome: QueryOutcome,
    },
}

#[derive(Debug, Default)]
pub struct InboundBridge {
    queue: VecDeque<InboundItem>,
}

impl InboundBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one frame and queue it for dispatch
    pub fn on_message(&mut self, raw: &str, world: &EcsWorld) -> Result<(), DropReason> {
        let message = match InboundMessage::from_json(raw) {
            Ok(message) => message,
            Err(e) => {
                warn!("Dropping malformed inbound message: {}", e);
                return Err(DropReason::Malformed);
            }
        };

        match message {
            InboundMessage::Event {
                event_name,
                entity_id,
                payload,
            } => {
                if let Some(id) = entity_id {
                    if !world.is_alive(id) {
                        debug!("Dropping '{}' event for destroyed {}", event_name, id);
                        return Err(DropReason::DeadEntity);
                    }
                }
                self.queue.push_back(InboundItem::Event(HostEvent {
                    name: event_name,
                    entity: entity_id,
                    payload,
                }));
            }
            InboundMessage::QueryResponse {
                request_id,
                payload,
                error,
            } => {
                if !world.has_pending_query(&request_id) {
                    debug!("Dropping response for unknown query '{}'", request_id);
                    return Err(DropReason::UnmatchedRequest);
                }
                let outcome = match error {
                    Some(message) => QueryOutcome::Failed(message),
                    None => QueryOutcome::Resolved(payload),
                };
                self.queue.push_back(InboundItem::QueryResponse {
                    request_id,
                    outcome,
                });
            }
        }

        Ok(())
    }

    /// Take every queued item, oldest first
    pub fn drain(&mut self) -> VecDeque<InboundItem> {
        std::mem::take(&mut self.queue)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
