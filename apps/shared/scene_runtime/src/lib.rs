//! Scene Runtime
//!
//! An entity-component-system core for a scene running beside a host
//! renderer. The scene never touches rendering state directly: every tick it
//! sends the host one ordered batch of entity and component operations, and
//! it receives input events and query answers back over the same message
//! channel.
//!
//! # Architecture
//!
//! - **EcsWorld**: entities, schema-checked component values, pending changes and host queries
//! - **Scheduler**: runs registered systems in priority order, isolating failures
//! - **DiffEngine**: turns a tick's changes into a minimal operation list
//! - **OutboundBridge / InboundBridge**: the serialization boundary to the host
//! - **EventRouter**: delivers host events to subscribers
//! - **SceneSession**: drives all of the above through the per-tick sequence
//!
//! # Usage
//!
//! ```rust,ignore
//! use scene_runtime::{ChannelPort, FnSystem, SceneSession, SessionConfig};
//! use serde_json::json;
//!
//! let (port, host) = ChannelPort::pair();
//! let mut session = SceneSession::new(SessionConfig::default(), port);
//!
//! let cube = session.world_mut().create_entity();
//! session.world_mut().attach(cube, "BoxShape", json!({"visible": true}))?;
//! session.register_system(
//!     FnSystem::new("spin", move |world, dt| {
//!         world.mutate(cube, "Transform", |t| t["rotation"]["y"] = json!(dt))?;
//!         Ok(())
//!     }),
//!     0,
//! );
//!
//! session.tick(1.0 / 30.0)?;
//! ```

pub mod bridge;
pub mod config;
pub mod ecs;
pub mod error;
pub mod logging;
pub mod session;

pub use bridge::{
    ChannelPort, DropReason, EventTarget, HandlerResult, HostEndpoint, HostEvent, MessagePort,
    QueryOutcome, SubscriptionId, spawn_stream_port,
};
pub use config::{ByteSize, SessionConfig};
pub use ecs::{
    ComponentRegistry, ComponentSchema, EcsWorld, FieldType, FnSystem, QueryOptions, QueryResult,
    System, SystemId, SystemResult,
};
pub use error::{EcsError, Result};
pub use session::{SceneSession, SessionStats, TickReport};

pub use scene_protocol::{EntityId, RequestId};
