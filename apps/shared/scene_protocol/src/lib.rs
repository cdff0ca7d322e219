pub mod error;
pub mod ids;
pub mod inbound;
pub mod outbound;
pub mod stream;

pub use error::{ProtocolError, Result};
pub use ids::{EntityId, RequestId};
pub use inbound::InboundMessage;
pub use outbound::{OutboundBatch, OutboundOperation, QueryRequest};
pub use stream::{
    DEFAULT_MAX_MESSAGE_SIZE, read_frame, read_message, write_frame, write_message,
};
