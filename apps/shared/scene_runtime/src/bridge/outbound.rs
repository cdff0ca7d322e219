//! Outbound bridge
//!
//! Packs one tick's operations (and any queries issued during the tick) into
//! a single sequence-numbered batch and hands it to the port. Operation order
//! is kept exactly as the diff engine produced it. Delivery is fire and
//! forget: the tick never waits for the host.

use scene_protocol::{OutboundBatch, OutboundOperation, ProtocolError, QueryRequest};
use tracing::trace;

use super::port::MessagePort;
use crate::error::Result;

/// What a flush put on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushSummary {
    pub tick_seq: u64,
    pub ops: usize,
    pub queries: usize,
    pub bytes: usize,
}

#[derive(Debug)]
pub struct OutboundBridge {
    next_seq: u64,
    send_empty: bool,
    max_message_size: usize,
}

impl OutboundBridge {
    pub fn new(max_message_size: usize, send_empty: bool) -> Self {
        Self {
            next_seq: 1,
            send_empty,
            max_message_size,
        }
    }

    /// Send the tick's batch
    ///
    /// Returns `None` when there was nothing to send and empty batches are
    /// disabled. Sequence numbers only advance for batches actually sent.
    pub fn flush(
        &mut self,
        port: &mut dyn MessagePort,
        ops: Vec<OutboundOperation>,
        queries: Vec<QueryRequest>,
    ) -> Result<Option<FlushSummary>> {
        if ops.is_empty() && queries.is_empty() && !self.send_empty {
            return Ok(None);
        }

        let batch = OutboundBatch::new(self.next_seq, ops).with_queries(queries);
        let frame = batch.to_json()?;
        if frame.len() > self.max_message_size {
            return Err(ProtocolError::MessageTooLarge(frame.len(), self.max_message_size).into());
        }

        let summary = FlushSummary {
            tick_seq: batch.tick_seq,
            ops: batch.ops.len(),
            queries: batch.queries.len(),
            bytes: frame.len(),
        };

        port.send(frame)?;
        self.next_seq += 1;

        trace!(
            "Flushed batch #{} ({} ops, {} queries, {} bytes)",
            summary.tick_seq, summary.ops, summary.queries, summary.bytes
        );

        Ok(Some(summary))
    }

    /// Sequence number the next batch will carry
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::port::ChannelPort;
    use crate::error::EcsError;
    use scene_protocol::EntityId;

    #[test]
    fn test_sequence_numbers_are_gapless() {
        let (mut port, mut host) = ChannelPort::pair();
        let mut bridge = OutboundBridge::new(1024, false);

        let create = vec![OutboundOperation::CreateEntity { entity_id: EntityId(1) }];
        bridge.flush(&mut port, create.clone(), Vec::new()).unwrap();
        assert_eq!(bridge.flush(&mut port, Vec::new(), Vec::new()).unwrap(), None);
        bridge.flush(&mut port, create, Vec::new()).unwrap();

        let first = host.try_recv_batch().unwrap().unwrap();
        let second = host.try_recv_batch().unwrap().unwrap();
        assert_eq!(first.tick_seq, 1);
        assert_eq!(second.tick_seq, 2);
        assert!(host.try_recv_batch().is_none());
    }

    #[test]
    fn test_empty_batches_when_enabled() {
        let (mut port, mut host) = ChannelPort::pair();
        let mut bridge = OutboundBridge::new(1024, true);

        let summary = bridge.flush(&mut port, Vec::new(), Vec::new()).unwrap().unwrap();
        assert_eq!(summary.ops, 0);

        let batch = host.try_recv_batch().unwrap().unwrap();
        assert_eq!(batch.tick_seq, 1);
        assert!(batch.ops.is_empty());
    }

    #[test]
    fn test_oversized_batch_fails() {
        let (mut port, _host) = ChannelPort::pair();
        let mut bridge = OutboundBridge::new(8, false);

        let result = bridge.flush(
            &mut port,
            vec![OutboundOperation::CreateEntity { entity_id: EntityId(1) }],
            Vec::new(),
        );
        assert!(matches!(
            result,
            Err(EcsError::Protocol(ProtocolError::MessageTooLarge(_, 8)))
        ));
        assert_eq!(bridge.next_seq(), 1);
    }
}
