//! Entity-component-system core
//!
//! Entities are opaque ids, components are schema-checked JSON values keyed
//! by type id, and systems are polled once per tick. Every mutation made
//! during a tick is tracked so the diff engine can turn the tick into a
//! minimal, ordered list of host operations.

pub mod changes;
pub mod diff;
pub mod entity;
pub mod store;
pub mod system;
pub mod types;
pub mod world;

pub use changes::{ChangeSet, ChangeTracker};
pub use diff::DiffEngine;
pub use entity::EntityRegistry;
pub use store::ComponentStore;
pub use system::{FnSystem, Scheduler, System, SystemId, SystemResult, TickOutcome};
pub use types::*;
pub use world::EcsWorld;
