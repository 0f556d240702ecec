//! Shared simulation context handed to every node and channel task.

use crate::config::EngineConfig;
use crate::event::{Event, EventBus};
use std::time::Duration;
use tokio::time::Instant;

/// Simulated time source. Follows tokio's clock, so a paused test runtime
/// gives fully deterministic timestamps.
#[derive(Debug, Clone, Copy)]
pub struct SimClock {
    epoch: Instant,
}

impl SimClock {
    /// Start a clock at the current instant.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    /// Time elapsed since the clock started.
    pub fn elapsed(&self) -> Duration {
        self.epoch.elapsed()
    }
}

/// Clock, configuration and event bus of one topology.
#[derive(Debug)]
pub struct SimContext {
    pub clock: SimClock,
    pub config: EngineConfig,
    pub events: EventBus,
}

impl SimContext {
    pub fn new(config: EngineConfig) -> Self {
        let events = EventBus::new(config.event_capacity);
        Self {
            clock: SimClock::start(),
            config,
            events,
        }
    }

    pub fn now(&self) -> Duration {
        self.clock.elapsed()
    }

    pub fn emit(&self, event: Event) {
        self.events.emit(event);
    }
}
