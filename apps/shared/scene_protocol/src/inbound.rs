use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{EntityId, RequestId};

/// Messages the host sends back to the scene
///
/// Shape: `{ "type": "event" | "queryResponse", "eventName"?, "entityId"?, "payload", "requestId"? }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum InboundMessage {
    /// Something happened on the host side (click, collision, input)
    Event {
        event_name: String,
        /// Entity the event targets, if any
        #[serde(default, skip_serializing_if = "Option::is_none")]
        entity_id: Option<EntityId>,
        #[serde(default)]
        payload: Value,
    },

    /// Answer to a query previously issued by the scene
    QueryResponse {
        request_id: RequestId,
        #[serde(default)]
        payload: Value,
        /// Set when the host could not answer the query
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl InboundMessage {
    /// Build an event message
    pub fn event(
        event_name: impl Into<String>,
        entity_id: Option<EntityId>,
        payload: Value,
    ) -> Self {
        InboundMessage::Event {
            event_name: event_name.into(),
            entity_id,
            payload,
        }
    }

    /// Build a successful query response
    pub fn query_response(request_id: impl Into<RequestId>, payload: Value) -> Self {
        InboundMessage::QueryResponse {
            request_id: request_id.into(),
            payload,
            error: None,
        }
    }

    /// Target entity, when the message names one
    pub fn entity_id(&self) -> Option<EntityId> {
        match self {
            InboundMessage::Event { entity_id, .. } => *entity_id,
            InboundMessage::QueryResponse { .. } => None,
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_event() {
        let msg = InboundMessage::from_json(
            r#"{"type":"event","eventName":"click","entityId":5,"payload":{"button":0}}"#,
        )
        .unwrap();

        assert_eq!(
            msg,
            InboundMessage::event("click", Some(EntityId(5)), json!({"button": 0}))
        );
        assert_eq!(msg.entity_id(), Some(EntityId(5)));
    }

    #[test]
    fn test_parse_event_without_target_or_payload() {
        let msg = InboundMessage::from_json(r#"{"type":"event","eventName":"sceneStart"}"#).unwrap();
        match msg {
            InboundMessage::Event { entity_id, payload, .. } => {
                assert_eq!(entity_id, None);
                assert_eq!(payload, Value::Null);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_parse_query_response_with_error() {
        let msg = InboundMessage::from_json(
            r#"{"type":"queryResponse","requestId":"q7","payload":null,"error":"no hit"}"#,
        )
        .unwrap();

        match msg {
            InboundMessage::QueryResponse { request_id, error, .. } => {
                assert_eq!(request_id.as_str(), "q7");
                assert_eq!(error.as_deref(), Some("no hit"));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(InboundMessage::from_json(r#"{"type":"teleport"}"#).is_err());
        assert!(InboundMessage::from_json("not json").is_err());
    }
}
