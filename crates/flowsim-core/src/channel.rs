//! Channels: rate- and latency-limited conduits between two nodes.
//!
//! A channel moves resources of one type from its output node's stock into
//! its input node's stock. Two parameters shape the flow independently:
//!
//! - **bandwidth** -- how many resources may be in transit at once. A full
//!   channel refuses to load; the producer keeps accumulating in its own
//!   stock instead. No signal crosses back to the producer.
//! - **latency** -- how long each resource spends in transit.
//!
//! # Transport cycle
//!
//! While active, the channel task repeats:
//!
//! 1. **Load** -- if below bandwidth, take the oldest resource of its type
//!    from the output node.
//! 2. **Unload** -- hand every resource whose transit time has elapsed to
//!    the input node, oldest first.
//! 3. **Wait** -- until the next in-flight resource is due, or for the idle
//!    poll interval, whichever comes first.
//!
//! Load and unload are each one indivisible step; between them the resource
//! is owned by the channel queue alone.
//!
//! After [`Channel::deactivate`] the task stops loading but keeps unloading
//! until its queue is empty, then exits.

use crate::error::{FlowError, TopologyRule};
use crate::event::Event;
use crate::id::{ChannelId, ResourceId};
use crate::node::{Consumer, Node, Producer};
use crate::resource::Resource;
use crate::sim::SimContext;
use crate::task::{TaskPoll, TaskSlot, pause};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Transport parameters of a channel, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSpec {
    /// Maximum resources in transit at once.
    pub bandwidth: usize,
    /// Transit time per resource.
    pub latency: Duration,
}

impl ChannelSpec {
    pub fn new(bandwidth: usize, latency: Duration) -> Self {
        Self { bandwidth, latency }
    }

    pub fn validate(&self) -> Result<(), FlowError> {
        if self.bandwidth == 0 {
            return Err(FlowError::InvalidParameter(
                "channel bandwidth must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Transit state
// ---------------------------------------------------------------------------

/// A resource on its way, with the simulated time it may be delivered.
#[derive(Debug)]
struct InTransit {
    resource: Resource,
    due: Duration,
}

#[derive(Debug, Default)]
struct TransitQueue {
    items: VecDeque<InTransit>,
    /// The last load attempt was refused for lack of bandwidth.
    blocked: bool,
}

/// Result of one load attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A resource moved from the output node into the queue.
    Loaded(ResourceId),
    /// The output node had nothing of the channel's type.
    SourceEmpty,
    /// The queue is at bandwidth.
    Full,
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Channel {
    id: ChannelId,
    resource_type: String,
    spec: ChannelSpec,
    output: Arc<dyn Producer>,
    input: Arc<dyn Consumer>,
    queue: Mutex<TransitQueue>,
    loaded: AtomicU64,
    delivered: AtomicU64,
    task: TaskSlot,
}

impl Channel {
    /// Build a channel from `output` to `input`, validating the connection
    /// rules. Nothing is wired into the endpoints until [`Channel::attach`].
    pub fn new(output: &Node, input: &Node, spec: ChannelSpec) -> Result<Self, FlowError> {
        spec.validate()?;
        let producer = output.as_producer().ok_or_else(|| {
            FlowError::InvalidTopology(TopologyRule::OutputCannotProduce {
                node: output.name().to_string(),
            })
        })?;
        let consumer = input.as_consumer().ok_or_else(|| {
            FlowError::InvalidTopology(TopologyRule::InputCannotConsume {
                node: input.name().to_string(),
            })
        })?;
        if output.name() == input.name() {
            return Err(FlowError::InvalidTopology(TopologyRule::SelfConnection {
                node: output.name().to_string(),
            }));
        }

        let resource_type = producer.core().resource_type().to_string();
        consumer
            .check_input(&resource_type)
            .map_err(FlowError::InvalidTopology)?;

        Ok(Self {
            id: ChannelId::between(output.name(), input.name()),
            resource_type,
            spec,
            output: producer,
            input: consumer,
            queue: Mutex::new(TransitQueue::default()),
            loaded: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            task: TaskSlot::new(),
        })
    }

    /// Register this channel in both endpoints' input/output lists.
    pub(crate) fn attach(&self) {
        self.output.attach_output(self.id.clone());
        self.input.attach_input(self.id.clone(), &self.resource_type);
    }

    /// Remove this channel from both endpoints' lists.
    pub(crate) fn detach(&self) {
        self.output.detach_output(&self.id);
        self.input.detach_input(&self.id);
    }

    pub fn id(&self) -> &ChannelId {
        &self.id
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn spec(&self) -> ChannelSpec {
        self.spec
    }

    pub fn output_name(&self) -> &str {
        self.output.core().name()
    }

    pub fn input_name(&self) -> &str {
        self.input.core().name()
    }

    /// Resources currently in transit.
    pub fn queue_len(&self) -> usize {
        self.queue.lock().items.len()
    }

    /// Ids of the resources in transit, oldest first.
    pub fn in_transit(&self) -> Vec<ResourceId> {
        self.queue
            .lock()
            .items
            .iter()
            .map(|t| t.resource.id().clone())
            .collect()
    }

    pub fn loaded_total(&self) -> u64 {
        self.loaded.load(Ordering::SeqCst)
    }

    pub fn delivered_total(&self) -> u64 {
        self.delivered.load(Ordering::SeqCst)
    }

    pub fn is_active(&self) -> bool {
        self.task.is_active()
    }

    /// Whether the transport task is alive (possibly still draining).
    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }

    // -----------------------------------------------------------------------
    // Transport steps
    // -----------------------------------------------------------------------

    /// Move the oldest matching resource from the output node into the
    /// queue, unless the queue is at bandwidth.
    pub fn load(&self, ctx: &SimContext) -> LoadOutcome {
        let mut queue = self.queue.lock();
        if queue.items.len() >= self.spec.bandwidth {
            if !std::mem::replace(&mut queue.blocked, true) {
                tracing::debug!(channel = %self.id, "channel full");
                ctx.emit(Event::ChannelFull {
                    channel: self.id.clone(),
                    at: ctx.now(),
                });
            }
            return LoadOutcome::Full;
        }
        queue.blocked = false;

        let Some(resource) = self.output.take_output() else {
            return LoadOutcome::SourceEmpty;
        };
        let id = resource.id().clone();
        let now = ctx.now();
        queue.items.push_back(InTransit {
            resource,
            due: now + self.spec.latency,
        });
        self.loaded.fetch_add(1, Ordering::SeqCst);

        tracing::trace!(channel = %self.id, resource = %id, "loaded");
        ctx.emit(Event::ResourceLoaded {
            channel: self.id.clone(),
            resource: id.clone(),
            at: now,
        });
        LoadOutcome::Loaded(id)
    }

    /// Deliver the oldest resource to the input node if its transit time
    /// has elapsed.
    pub fn unload(&self, ctx: &SimContext) -> Option<ResourceId> {
        let now = ctx.now();
        let mut queue = self.queue.lock();
        if queue.items.front()?.due > now {
            return None;
        }
        let InTransit { resource, .. } = queue.items.pop_front()?;
        let id = resource.id().clone();
        // Still under the queue lock: the resource is never in neither
        // container as seen by another thread.
        self.input.add_resource(resource);
        drop(queue);
        self.delivered.fetch_add(1, Ordering::SeqCst);

        tracing::trace!(channel = %self.id, resource = %id, "unloaded");
        ctx.emit(Event::ResourceUnloaded {
            channel: self.id.clone(),
            resource: id.clone(),
            at: now,
        });
        Some(id)
    }

    /// How long until the oldest in-flight resource is due, if any.
    fn until_next_due(&self, now: Duration) -> Option<Duration> {
        self.queue
            .lock()
            .items
            .front()
            .map(|t| t.due.saturating_sub(now))
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Start transporting. Idempotent.
    pub fn activate(self: &Arc<Self>, ctx: &Arc<SimContext>) -> bool {
        let channel = Arc::clone(self);
        let ctx = Arc::clone(ctx);
        self.task.start(move || tokio::spawn(channel.run(ctx)))
    }

    /// Stop loading; what is already in transit is still delivered.
    /// Idempotent.
    pub fn deactivate(&self) -> bool {
        self.task.stop()
    }

    /// Stop immediately, abandoning anything in transit.
    pub(crate) fn halt(&self) {
        self.task.halt();
    }

    async fn run(self: Arc<Self>, ctx: Arc<SimContext>) {
        let poll_interval = ctx.config.poll_interval();
        loop {
            match self.task.poll(|| self.queue.lock().items.is_empty()) {
                TaskPoll::Exit => break,
                TaskPoll::Run => {
                    self.load(&ctx);
                }
                TaskPoll::Drain => {}
            }

            while self.unload(&ctx).is_some() {}

            let wait = self
                .until_next_due(ctx.now())
                .map_or(poll_interval, |due| due.min(poll_interval));
            pause(wait).await;
        }
        tracing::debug!(channel = %self.id, "transport task exited");
    }
}
