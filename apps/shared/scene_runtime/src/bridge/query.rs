//! Pending host queries
//!
//! A query issued by the scene (a raycast, for example) is queued for the
//! next outbound batch and parked in the pending table until the host answers,
//! the scene cancels it, or it expires.

use scene_protocol::{QueryRequest, RequestId};
use serde_json::Value;
use std::collections::HashMap;

use crate::ecs::EcsWorld;

/// How a pending query ended
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// The host answered with a payload
    Resolved(Value),
    /// The host answered with an error message
    Failed(String),
    /// No answer within the configured number of ticks
    TimedOut,
}

/// Callback invoked once with the outcome of a query
pub type QueryCallback = Box<dyn FnOnce(&mut EcsWorld, QueryOutcome) + Send>;

struct PendingQuery {
    /// Tick whose batch carried the request; `None` until flushed
    sent_tick: Option<u64>,
    callback: QueryCallback,
}

#[derive(Default)]
pub struct QueryTable {
    next_id: u64,
    pending: HashMap<RequestId, PendingQuery>,
    outgoing: Vec<QueryRequest>,
}

impl QueryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a query and queue its request for the host
    pub fn issue(
        &mut self,
        query: impl Into<String>,
        payload: Value,
        callback: QueryCallback,
    ) -> RequestId {
        self.next_id += 1;
        let request_id = RequestId::from(format!("q{}", self.next_id));

        self.outgoing.push(QueryRequest {
            request_id: request_id.clone(),
            query: query.into(),
            payload,
        });
        self.pending.insert(
            request_id.clone(),
            PendingQuery {
                sent_tick: None,
                callback,
            },
        );

        request_id
    }

    /// Forget a query; a later response for it is treated as unmatched
    pub fn cancel(&mut self, request_id: &RequestId) -> bool {
        self.outgoing.retain(|q| &q.request_id != request_id);
        self.pending.remove(request_id).is_some()
    }

    pub fn is_pending(&self, request_id: &RequestId) -> bool {
        self.pending.contains_key(request_id)
    }

    /// Remove a query that has been answered
    pub fn resolve(&mut self, request_id: &RequestId) -> Option<QueryCallback> {
        self.pending.remove(request_id).map(|p| p.callback)
    }

    /// Remove queries sent `timeout_ticks` or more ticks ago (0 disables expiry)
    ///
    /// Queries not yet sent to the host never expire.
    pub fn expire(&mut self, now_tick: u64, timeout_ticks: u64) -> Vec<(RequestId, QueryCallback)> {
        if timeout_ticks == 0 {
            return Vec::new();
        }

        let mut expired_ids: Vec<RequestId> = self
            .pending
            .iter()
            .filter(|(_, p)| {
                p.sent_tick
                    .is_some_and(|sent| now_tick.saturating_sub(sent) >= timeout_ticks)
            })
            .map(|(id, _)| id.clone())
            .collect();
        expired_ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));

        expired_ids
            .into_iter()
            .filter_map(|id| self.pending.remove(&id).map(|p| (id, p.callback)))
            .collect()
    }

    /// Requests not yet sent to the host, stamped as sent in `tick`
    pub fn take_outgoing(&mut self, tick: u64) -> Vec<QueryRequest> {
        let outgoing = std::mem::take(&mut self.outgoing);
        for request in &outgoing {
            if let Some(pending) = self.pending.get_mut(&request.request_id) {
                pending.sent_tick = Some(tick);
            }
        }
        outgoing
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn noop() -> QueryCallback {
        Box::new(|_world: &mut EcsWorld, _outcome: QueryOutcome| {})
    }

    #[test]
    fn test_issue_queues_request() {
        let mut table = QueryTable::new();
        let id = table.issue("raycast", json!({"dir": "down"}), noop());

        assert!(table.is_pending(&id));
        let outgoing = table.take_outgoing(1);
        assert_eq!(outgoing.len(), 1);
        assert_eq!(outgoing[0].request_id, id);
        assert_eq!(outgoing[0].query, "raycast");
        assert!(table.take_outgoing(2).is_empty());
    }

    #[test]
    fn test_cancel_removes_pending_and_unsent() {
        let mut table = QueryTable::new();
        let id = table.issue("raycast", Value::Null, noop());

        assert!(table.cancel(&id));
        assert!(!table.cancel(&id));
        assert!(table.take_outgoing(1).is_empty());
        assert!(table.resolve(&id).is_none());
    }

    #[test]
    fn test_expire_after_timeout() {
        let mut table = QueryTable::new();
        let old = table.issue("raycast", Value::Null, noop());
        table.take_outgoing(1);
        let fresh = table.issue("raycast", Value::Null, noop());
        table.take_outgoing(5);

        assert!(table.expire(3, 3).is_empty());

        let expired = table.expire(4, 3);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].0, old);
        assert!(table.is_pending(&fresh));

        assert!(table.expire(1000, 0).is_empty());
    }

    #[test]
    fn test_timeout_counts_from_send_tick() {
        let mut table = QueryTable::new();
        let id = table.issue("raycast", Value::Null, noop());

        // Unsent requests never expire
        assert!(table.expire(100, 3).is_empty());

        table.take_outgoing(101);
        assert!(table.expire(103, 3).is_empty());
        assert_eq!(table.expire(104, 3).len(), 1);
        assert!(!table.is_pending(&id));
    }
}
