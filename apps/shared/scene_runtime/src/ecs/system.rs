//! System scheduler
//!
//! Systems run once per tick, ordered by priority (lower first) and then by
//! registration order. Registration and removal requested while a tick is
//! running are queued on the world and applied when the next tick starts, so
//! a sibling system is never skipped or run twice.
//!
//! A system that returns an error or panics is logged and reported, and the
//! remaining systems of the tick still run.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::error;

use super::world::EcsWorld;
use crate::error::EcsError;

pub type SystemResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Per-tick logic operating over the world
pub trait System: Send {
    /// Name used in logs and failure reports
    fn name(&self) -> &str;

    /// Advance by `dt` seconds
    fn update(&mut self, world: &mut EcsWorld, dt: f64) -> SystemResult;
}

/// A system built from a closure
pub struct FnSystem<F> {
    name: String,
    func: F,
}

impl<F> FnSystem<F>
where
    F: FnMut(&mut EcsWorld, f64) -> SystemResult + Send,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> System for FnSystem<F>
where
    F: FnMut(&mut EcsWorld, f64) -> SystemResult + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn update(&mut self, world: &mut EcsWorld, dt: f64) -> SystemResult {
        (self.func)(world, dt)
    }
}

/// Handle returned by system registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SystemId(pub u64);

/// Scheduler changes queued on the world
pub(crate) enum SystemCommand {
    Register {
        id: SystemId,
        priority: i32,
        system: Box<dyn System>,
    },
    Unregister(SystemId),
}

struct RegisteredSystem {
    id: SystemId,
    priority: i32,
    system: Box<dyn System>,
}

/// What happened during one pass over the systems
#[derive(Debug, Default)]
pub struct TickOutcome {
    /// Number of systems invoked
    pub ran: usize,
    /// One `SystemExecution` error per failed system
    pub failures: Vec<EcsError>,
}

pub struct Scheduler {
    scene_id: String,
    systems: Vec<RegisteredSystem>,
}

impl Scheduler {
    pub fn new(scene_id: impl Into<String>) -> Self {
        Self {
            scene_id: scene_id.into(),
            systems: Vec::new(),
        }
    }

    pub(crate) fn apply(&mut self, commands: Vec<SystemCommand>) {
        for command in commands {
            match command {
                SystemCommand::Register {
                    id,
                    priority,
                    system,
                } => {
                    // After every system with the same or lower priority
                    let position = self
                        .systems
                        .iter()
                        .position(|s| s.priority > priority)
                        .unwrap_or(self.systems.len());
                    self.systems.insert(
                        position,
                        RegisteredSystem {
                            id,
                            priority,
                            system,
                        },
                    );
                }
                SystemCommand::Unregister(id) => {
                    self.systems.retain(|s| s.id != id);
                }
            }
        }
    }

    /// Run every system once, in order
    pub fn run_tick(&mut self, world: &mut EcsWorld, dt: f64) -> TickOutcome {
        self.apply(world.take_system_commands());

        let mut outcome = TickOutcome::default();

        for registered in &mut self.systems {
            let system = &mut registered.system;
            let result = catch_unwind(AssertUnwindSafe(|| system.update(world, dt)));
            outcome.ran += 1;

            let reason = match result {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(panic) => format!("panicked: {}", panic_message(panic.as_ref())),
            };

            error!(
                scene_id = %self.scene_id,
                system = %system.name(),
                "update failed: {}",
                reason
            );
            outcome.failures.push(EcsError::SystemExecution {
                system: system.name().to_string(),
                reason,
            });
        }

        outcome
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// System names in execution order
    pub fn names(&self) -> Vec<&str> {
        self.systems.iter().map(|s| s.system.name()).collect()
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
