//! Scene session
//!
//! A `SceneSession` owns one `EcsWorld` together with the scheduler, the
//! event router, the diff engine and both bridges, and drives them through
//! the fixed per-tick sequence:
//!
//! 1. drain every frame received from the host into the inbound queue
//! 2. dispatch queued events and query responses, then expire old queries
//! 3. run the systems (skipped while paused)
//! 4. diff the tick's changes against what the host already knows
//! 5. flush one batch to the host
//!
//! Nothing inside a tick waits on the host.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use scene_protocol::RequestId;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info};

use crate::bridge::{
    DropReason, EventTarget, FlushSummary, HandlerResult, HostEvent, InboundBridge, InboundItem,
    MessagePort, OutboundBridge, QueryCallback, QueryOutcome, EventRouter, SubscriptionId,
};
use crate::config::SessionConfig;
use crate::ecs::system::panic_message;
use crate::ecs::{DiffEngine, EcsWorld, Scheduler, System, SystemId};
use crate::error::{EcsError, Result};

/// What happened during one tick
#[derive(Debug, Default)]
pub struct TickReport {
    /// Number of the tick
    pub tick: u64,
    /// Events delivered to the router
    pub events_dispatched: usize,
    /// Query callbacks invoked with a host answer
    pub queries_resolved: usize,
    /// Query callbacks invoked with `TimedOut`
    pub queries_timed_out: usize,
    /// Inbound messages discarded this tick
    pub dropped: Vec<DropReason>,
    /// Systems invoked (0 while paused)
    pub systems_ran: usize,
    /// Failed systems, as `SystemExecution` errors
    pub system_failures: Vec<EcsError>,
    /// Event handlers and query callbacks that returned an error or panicked
    pub handler_failures: usize,
    /// The batch sent to the host, if any
    pub flushed: Option<FlushSummary>,
}

/// Counters accumulated over the session lifetime
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionStats {
    pub ticks: u64,
    pub batches_sent: u64,
    pub ops_sent: u64,
    pub dropped_dead_entity: u64,
    pub dropped_unmatched: u64,
    pub dropped_malformed: u64,
    pub system_failures: u64,
    pub handler_failures: u64,
}

impl SessionStats {
    fn record_drop(&mut self, reason: DropReason) {
        match reason {
            DropReason::DeadEntity => self.dropped_dead_entity += 1,
            DropReason::UnmatchedRequest => self.dropped_unmatched += 1,
            DropReason::Malformed => self.dropped_malformed += 1,
        }
    }

    /// Total inbound messages discarded
    pub fn dropped(&self) -> u64 {
        self.dropped_dead_entity + self.dropped_unmatched + self.dropped_malformed
    }
}

pub struct SceneSession {
    config: SessionConfig,
    world: EcsWorld,
    scheduler: Scheduler,
    router: EventRouter,
    inbound: InboundBridge,
    outbound: OutboundBridge,
    diff: DiffEngine,
    port: Box<dyn MessagePort>,
    paused: bool,
    stats: SessionStats,
    /// Set by the first fatal error; the session refuses to tick afterwards
    failure: Option<String>,
}

impl SceneSession {
    pub fn new(config: SessionConfig, port: impl MessagePort + 'static) -> Self {
        Self::with_world(config, EcsWorld::new(), port)
    }

    /// Build a session around an existing world (custom component registry)
    pub fn with_world(config: SessionConfig, world: EcsWorld, port: impl MessagePort + 'static) -> Self {
        let outbound = OutboundBridge::new(
            config.max_message_size.as_bytes(),
            config.send_empty_batches,
        );

        Self {
            scheduler: Scheduler::new(config.scene_id.clone()),
            router: EventRouter::new(config.scene_id.clone()),
            inbound: InboundBridge::new(),
            outbound,
            diff: DiffEngine::new(),
            port: Box::new(port),
            paused: false,
            stats: SessionStats::default(),
            failure: None,
            world,
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn world(&self) -> &EcsWorld {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut EcsWorld {
        &mut self.world
    }

    pub fn register_system(&mut self, system: impl System + 'static, priority: i32) -> SystemId {
        self.world.register_system(system, priority)
    }

    pub fn unregister_system(&mut self, id: SystemId) -> bool {
        self.world.unregister_system(id)
    }

    pub fn subscribe<F>(&mut self, event_name: impl Into<String>, target: EventTarget, handler: F) -> SubscriptionId
    where
        F: FnMut(&mut EcsWorld, &HostEvent) -> HandlerResult + Send + 'static,
    {
        self.world.subscribe(event_name, target, handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.world.unsubscribe(id)
    }

    /// Skip the system phase until `resume`; inbound and flush keep running
    pub fn pause(&mut self) {
        if !self.paused {
            debug!(scene_id = %self.config.scene_id, system = "session", "paused");
        }
        self.paused = true;
    }

    pub fn resume(&mut self) {
        if self.paused {
            debug!(scene_id = %self.config.scene_id, system = "session", "resumed");
        }
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Whether a fatal error has stopped the session
    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    /// Run one tick with the given delta time in seconds
    ///
    /// Only a channel failure (or a batch too large to send) is returned as
    /// an error. The session cannot continue after one: every later call
    /// fails with `EcsError::Channel` without touching the host.
    pub fn tick(&mut self, dt: f64) -> Result<TickReport> {
        if let Some(reason) = &self.failure {
            return Err(EcsError::Channel(format!(
                "session stopped after an earlier failure: {}",
                reason
            )));
        }

        self.step(dt).inspect_err(|e| {
            error!(scene_id = %self.config.scene_id, system = "session", "stopping: {}", e);
            self.failure = Some(e.to_string());
        })
    }

    fn step(&mut self, dt: f64) -> Result<TickReport> {
        let mut report = TickReport {
            tick: self.world.begin_tick(),
            ..TickReport::default()
        };

        while let Some(frame) = self.port.try_recv()? {
            if let Err(reason) = self.inbound.on_message(&frame, &self.world) {
                report.dropped.push(reason);
            }
        }

        self.dispatch(&mut report);

        if !self.paused {
            let outcome = self.scheduler.run_tick(&mut self.world, dt);
            report.systems_ran = outcome.ran;
            report.system_failures = outcome.failures;
        }

        let ops = self.diff.diff(self.world.take_changes(), self.world.store());
        let queries = self.world.queries_mut().take_outgoing(report.tick);
        report.flushed = self.outbound.flush(self.port.as_mut(), ops, queries)?;

        self.record(&report);
        Ok(report)
    }

    fn dispatch(&mut self, report: &mut TickReport) {
        self.router.apply(self.world.take_subscription_commands());
        let pruned = self.router.prune(&self.world);
        self.world.forget_subscriptions(&pruned);

        for item in self.inbound.drain() {
            match item {
                InboundItem::Event(event) => {
                    // An earlier handler may have destroyed the target
                    if let Some(entity) = event.entity {
                        if !self.world.is_alive(entity) {
                            debug!("Dropping '{}' event for destroyed {}", event.name, entity);
                            report.dropped.push(DropReason::DeadEntity);
                            continue;
                        }
                    }
                    let outcome = self.router.dispatch(&mut self.world, &event);
                    report.events_dispatched += 1;
                    report.handler_failures += outcome.failed;
                }
                InboundItem::QueryResponse { request_id, outcome } => {
                    match self.world.take_query(&request_id) {
                        Some(callback) => {
                            if !self.complete_query(&request_id, callback, outcome) {
                                report.handler_failures += 1;
                            }
                            report.queries_resolved += 1;
                        }
                        None => {
                            debug!("Dropping response for unknown query '{}'", request_id);
                            report.dropped.push(DropReason::UnmatchedRequest);
                        }
                    }
                }
            }
        }

        let now = self.world.current_tick();
        let timeout = u64::from(self.config.query_timeout_ticks);
        for (request_id, callback) in self.world.queries_mut().expire(now, timeout) {
            debug!("Query '{}' timed out", request_id);
            if !self.complete_query(&request_id, callback, QueryOutcome::TimedOut) {
                report.handler_failures += 1;
            }
            report.queries_timed_out += 1;
        }
    }

    /// Invoke a query callback; false when it panicked
    fn complete_query(&mut self, request_id: &RequestId, callback: QueryCallback, outcome: QueryOutcome) -> bool {
        let world = &mut self.world;
        match catch_unwind(AssertUnwindSafe(move || callback(world, outcome))) {
            Ok(()) => true,
            Err(panic) => {
                error!(
                    scene_id = %self.config.scene_id,
                    system = %format!("query:{}", request_id),
                    "query callback panicked: {}",
                    panic_message(panic.as_ref())
                );
                false
            }
        }
    }

    fn record(&mut self, report: &TickReport) {
        self.stats.ticks += 1;
        for reason in &report.dropped {
            self.stats.record_drop(*reason);
        }
        self.stats.system_failures += report.system_failures.len() as u64;
        self.stats.handler_failures += report.handler_failures as u64;
        if let Some(summary) = report.flushed {
            self.stats.batches_sent += 1;
            self.stats.ops_sent += summary.ops as u64;
        }
    }

    /// Tick at the configured rate until `shutdown` is set or the channel fails
    pub async fn run(&mut self, shutdown: Arc<AtomicBool>) -> Result<SessionStats> {
        let mut ticker = interval(self.config.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Scene '{}' running at {} Hz",
            self.config.scene_id, self.config.tick_rate
        );

        ticker.tick().await;
        let mut last = Instant::now();

        while !shutdown.load(Ordering::Relaxed) {
            ticker.tick().await;
            if shutdown.load(Ordering::Relaxed) {
                break;
            }

            let now = Instant::now();
            let dt = now.duration_since(last).as_secs_f64();
            last = now;

            self.tick(dt)?;
        }

        info!(
            "Scene '{}' stopped after {} ticks ({} batches, {} ops)",
            self.config.scene_id, self.stats.ticks, self.stats.batches_sent, self.stats.ops_sent
        );
        Ok(self.stats.clone())
    }
}
