//! Structured simulation events.
//!
//! Node and channel tasks report what they do as [`Event`]s on an
//! [`EventBus`] instead of printing. Display layers subscribe and decide
//! how to render them.
//!
//! # Delivery
//!
//! The bus is a `tokio::sync::broadcast` channel. Emitting never blocks and
//! never fails: with no subscribers the event is dropped, and a subscriber
//! that falls more than the configured capacity behind skips the gap
//! (logged as a warning) instead of stalling the simulation.
//!
//! # Suppression
//!
//! Event kinds can be suppressed via [`EventBus::suppress`]. Suppressed
//! events are never sent.

use crate::id::{ChannelId, ResourceId};
use crate::node::NodeKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A simulation event. Every event carries the simulated time it happened at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // -- Structure --
    NodeCreated {
        node: String,
        kind: NodeKind,
        at: Duration,
    },
    NodeDeleted {
        node: String,
        at: Duration,
    },
    ChannelConnected {
        channel: ChannelId,
        resource_type: String,
        at: Duration,
    },
    ChannelRemoved {
        channel: ChannelId,
        at: Duration,
    },

    // -- Lifecycle --
    TaskStarted {
        target: String,
        at: Duration,
    },
    TaskStopped {
        target: String,
        at: Duration,
    },

    // -- Production --
    ResourceProduced {
        node: String,
        resource: ResourceId,
        resource_type: String,
        at: Duration,
    },
    ResourcesConsumed {
        node: String,
        consumed: Vec<(String, u32)>,
        at: Duration,
    },
    ProductionStarved {
        node: String,
        missing: Vec<(String, u32)>,
        at: Duration,
    },

    // -- Transport --
    ResourceLoaded {
        channel: ChannelId,
        resource: ResourceId,
        at: Duration,
    },
    ChannelFull {
        channel: ChannelId,
        at: Duration,
    },
    ResourceUnloaded {
        channel: ChannelId,
        resource: ResourceId,
        at: Duration,
    },
}

/// Discriminant tag for event types, used for suppression and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NodeCreated,
    NodeDeleted,
    ChannelConnected,
    ChannelRemoved,
    TaskStarted,
    TaskStopped,
    ResourceProduced,
    ResourcesConsumed,
    ProductionStarved,
    ResourceLoaded,
    ChannelFull,
    ResourceUnloaded,
}

/// Total number of event kinds.
const EVENT_KIND_COUNT: usize = 12;

impl Event {
    /// Get the discriminant kind for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::NodeCreated { .. } => EventKind::NodeCreated,
            Event::NodeDeleted { .. } => EventKind::NodeDeleted,
            Event::ChannelConnected { .. } => EventKind::ChannelConnected,
            Event::ChannelRemoved { .. } => EventKind::ChannelRemoved,
            Event::TaskStarted { .. } => EventKind::TaskStarted,
            Event::TaskStopped { .. } => EventKind::TaskStopped,
            Event::ResourceProduced { .. } => EventKind::ResourceProduced,
            Event::ResourcesConsumed { .. } => EventKind::ResourcesConsumed,
            Event::ProductionStarved { .. } => EventKind::ProductionStarved,
            Event::ResourceLoaded { .. } => EventKind::ResourceLoaded,
            Event::ChannelFull { .. } => EventKind::ChannelFull,
            Event::ResourceUnloaded { .. } => EventKind::ResourceUnloaded,
        }
    }

    /// Simulated time at which the event occurred.
    pub fn at(&self) -> Duration {
        match self {
            Event::NodeCreated { at, .. }
            | Event::NodeDeleted { at, .. }
            | Event::ChannelConnected { at, .. }
            | Event::ChannelRemoved { at, .. }
            | Event::TaskStarted { at, .. }
            | Event::TaskStopped { at, .. }
            | Event::ResourceProduced { at, .. }
            | Event::ResourcesConsumed { at, .. }
            | Event::ProductionStarved { at, .. }
            | Event::ResourceLoaded { at, .. }
            | Event::ChannelFull { at, .. }
            | Event::ResourceUnloaded { at, .. } => *at,
        }
    }
}

impl EventKind {
    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Fan-out bus for simulation events.
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
    suppressed: [AtomicBool; EVENT_KIND_COUNT],
}

impl EventBus {
    /// Create a bus whose subscribers may lag by up to `capacity` events.
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            suppressed: std::array::from_fn(|_| AtomicBool::new(false)),
        }
    }

    /// Stop sending events of `kind`.
    pub fn suppress(&self, kind: EventKind) {
        self.suppressed[kind.index()].store(true, Ordering::Relaxed);
    }

    /// Resume sending events of `kind`.
    pub fn unsuppress(&self, kind: EventKind) {
        self.suppressed[kind.index()].store(false, Ordering::Relaxed);
    }

    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind.index()].load(Ordering::Relaxed)
    }

    /// Send an event to every current subscriber.
    pub fn emit(&self, event: Event) {
        if self.is_suppressed(event.kind()) {
            return;
        }
        // No receivers is not an error: nobody is watching.
        let _ = self.sender.send(event);
    }

    /// Subscribe to every event kind.
    pub fn subscribe(&self) -> EventSubscription {
        EventSubscription {
            receiver: self.sender.subscribe(),
            filter: None,
        }
    }

    /// Subscribe to a subset of event kinds.
    pub fn subscribe_to(&self, kinds: &[EventKind]) -> EventSubscription {
        EventSubscription {
            receiver: self.sender.subscribe(),
            filter: Some(kinds.to_vec()),
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// Receiving end of an [`EventBus`], optionally filtered by kind.
#[derive(Debug)]
pub struct EventSubscription {
    receiver: broadcast::Receiver<Event>,
    filter: Option<Vec<EventKind>>,
}

impl EventSubscription {
    fn wants(&self, event: &Event) -> bool {
        self.filter
            .as_ref()
            .is_none_or(|kinds| kinds.contains(&event.kind()))
    }

    /// Wait for the next matching event. Returns `None` once the bus has
    /// been dropped and every buffered event has been read.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.wants(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event subscriber lagged; events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching event if one is already buffered.
    pub fn try_recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.wants(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event subscriber lagged; events dropped");
                }
                Err(_) => return None,
            }
        }
    }

    /// Drain every matching event that is already buffered.
    pub fn drain(&mut self) -> Vec<Event> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}
