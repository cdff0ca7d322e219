//! Scene <-> host message bridge
//!
//! Outbound: one sequence-numbered batch of operations per tick.
//! Inbound: host events and query responses, queued on arrival and handled
//! during the dispatch phase of the next tick.

pub mod events;
pub mod inbound;
pub mod outbound;
pub mod port;
pub mod query;

pub use events::{
    DispatchOutcome, EventHandler, EventRouter, EventTarget, HandlerResult, HostEvent,
    SubscriptionId,
};
pub use inbound::{DropReason, InboundBridge, InboundItem};
pub use outbound::{FlushSummary, OutboundBridge};
pub use port::{ChannelPort, HostEndpoint, MessagePort, StreamTasks, spawn_stream_port};
pub use query::{QueryCallback, QueryOutcome, QueryTable};
