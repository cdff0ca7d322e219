use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{EntityId, RequestId};

/// A single change the host applies to its copy of the scene
///
/// Serialized as `{"op": "updateComponent", "entityId": 1, ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum OutboundOperation {
    /// The entity now exists
    CreateEntity {
        entity_id: EntityId,
    },

    /// The entity and everything attached to it is gone
    RemoveEntity {
        entity_id: EntityId,
    },

    /// Set (or replace) a component value
    UpdateComponent {
        entity_id: EntityId,
        /// Component type id
        component: String,
        value: Value,
    },

    /// Detach a component from an entity that stays alive
    RemoveComponent {
        entity_id: EntityId,
        /// Component type id
        component: String,
    },
}

impl OutboundOperation {
    /// Entity this operation refers to
    pub fn entity_id(&self) -> EntityId {
        match self {
            OutboundOperation::CreateEntity { entity_id }
            | OutboundOperation::RemoveEntity { entity_id }
            | OutboundOperation::UpdateComponent { entity_id, .. }
            | OutboundOperation::RemoveComponent { entity_id, .. } => *entity_id,
        }
    }

    /// Component type id, for component-level operations
    pub fn component(&self) -> Option<&str> {
        match self {
            OutboundOperation::UpdateComponent { component, .. }
            | OutboundOperation::RemoveComponent { component, .. } => Some(component),
            _ => None,
        }
    }
}

/// A query the scene asks the host to answer (raycast, etc.)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub request_id: RequestId,
    /// Query kind, e.g. "raycast"
    pub query: String,
    #[serde(default)]
    pub payload: Value,
}

/// The one message a scene sends to its host per tick
///
/// Shape: `{ "tickSeq": 3, "ops": [...] }`. Queries issued during the tick
/// ride along in `queries`, which is omitted when empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundBatch {
    /// Batch sequence number, starting at 1, without gaps
    pub tick_seq: u64,
    pub ops: Vec<OutboundOperation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub queries: Vec<QueryRequest>,
}

impl OutboundBatch {
    pub fn new(tick_seq: u64, ops: Vec<OutboundOperation>) -> Self {
        Self {
            tick_seq,
            ops,
            queries: Vec::new(),
        }
    }

    pub fn with_queries(mut self, queries: Vec<QueryRequest>) -> Self {
        self.queries = queries;
        self
    }

    /// True when there is nothing for the host to do
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty() && self.queries.is_empty()
    }

    /// Serialize to a JSON text frame
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from a JSON text frame
    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }
}
