//! Nodes: the three kinds of building in a flow topology.
//!
//! Every node shares a [`NodeCore`] (name, stock, counter, interval, task
//! slot). What a node can do at its edges is expressed through two
//! capability traits rather than a class hierarchy:
//!
//! - [`Producer`] -- a channel may load resources out of it
//!   (Generator, Production).
//! - [`Consumer`] -- a channel may unload resources into it
//!   (Production, Storage).
//!
//! A Generator simply has no `Consumer` impl and a Storage node no
//! `Producer` impl, so an illegal wiring cannot be expressed at all.

use crate::error::{Capability, FlowError, TopologyRule};
use crate::generator::GeneratorNode;
use crate::id::ChannelId;
use crate::production::ProductionNode;
use crate::resource::{Resource, Stock};
use crate::sim::SimContext;
use crate::storage::StorageNode;
use crate::task::TaskSlot;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Node kind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Generator,
    Production,
    Storage,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Generator => f.write_str("generator"),
            NodeKind::Production => f.write_str("production"),
            NodeKind::Storage => f.write_str("storage"),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared record
// ---------------------------------------------------------------------------

/// State common to every node kind.
///
/// The stock is only ever touched inside short, non-suspending critical
/// sections, so each mutation is a single indivisible step with respect to
/// every other task.
#[derive(Debug)]
pub struct NodeCore {
    name: String,
    resource_type: String,
    interval: Duration,
    stock: Mutex<Stock>,
    produced: AtomicU64,
    pub(crate) task: TaskSlot,
}

impl NodeCore {
    pub(crate) fn new(
        name: impl Into<String>,
        resource_type: impl Into<String>,
        interval: Duration,
        stock: Stock,
    ) -> Self {
        Self {
            name: name.into(),
            resource_type: resource_type.into(),
            interval,
            stock: Mutex::new(stock),
            produced: AtomicU64::new(0),
            task: TaskSlot::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The single type this node produces (or, for storage, holds).
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of resources this node has produced so far.
    pub fn production_count(&self) -> u64 {
        self.produced.load(Ordering::SeqCst)
    }

    /// Bump the production counter and return the new sequence number.
    pub(crate) fn next_sequence(&self) -> u64 {
        self.produced.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_active(&self) -> bool {
        self.task.is_active()
    }

    /// Run `f` with exclusive access to the stock.
    pub(crate) fn with_stock<R>(&self, f: impl FnOnce(&mut Stock) -> R) -> R {
        f(&mut self.stock.lock())
    }

    /// A copy of the current stock.
    pub fn stock(&self) -> Stock {
        self.stock.lock().clone()
    }

    pub fn stock_total(&self) -> usize {
        self.stock.lock().total()
    }

    pub fn quantity(&self, resource_type: &str) -> usize {
        self.stock.lock().quantity(resource_type)
    }
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// A node a channel can load resources from.
pub trait Producer: Send + Sync + fmt::Debug {
    fn core(&self) -> &NodeCore;

    /// Remove the oldest resource of the produced type from stock.
    fn take_output(&self) -> Option<Resource> {
        let core = self.core();
        core.with_stock(|stock| stock.take_oldest(core.resource_type()))
    }

    fn attach_output(&self, channel: ChannelId);

    fn detach_output(&self, channel: &ChannelId);

    fn outputs(&self) -> Vec<ChannelId>;
}

/// A node a channel can unload resources into.
pub trait Consumer: Send + Sync + fmt::Debug {
    fn core(&self) -> &NodeCore;

    /// Whether resources of `resource_type` belong in this node at all.
    fn accepts(&self, resource_type: &str) -> Result<(), TopologyRule>;

    /// Whether a new input channel carrying `resource_type` may be attached.
    fn check_input(&self, resource_type: &str) -> Result<(), TopologyRule>;

    /// Record `channel` as an input. Callers check first with
    /// [`Consumer::check_input`].
    fn attach_input(&self, channel: ChannelId, resource_type: &str);

    fn detach_input(&self, channel: &ChannelId);

    fn inputs(&self) -> Vec<ChannelId>;

    /// Take ownership of an arriving resource.
    fn add_resource(&self, resource: Resource) {
        self.core().with_stock(|stock| stock.push(resource));
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A node of any kind. Cheap to clone: every variant is reference-counted
/// and shared with the node's own task.
#[derive(Debug, Clone)]
pub enum Node {
    Generator(Arc<GeneratorNode>),
    Production(Arc<ProductionNode>),
    Storage(Arc<StorageNode>),
}

impl Node {
    pub fn core(&self) -> &NodeCore {
        match self {
            Node::Generator(n) => n.core(),
            Node::Production(n) => n.core(),
            Node::Storage(n) => n.core(),
        }
    }

    pub fn name(&self) -> &str {
        self.core().name()
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Generator(_) => NodeKind::Generator,
            Node::Production(_) => NodeKind::Production,
            Node::Storage(_) => NodeKind::Storage,
        }
    }

    pub fn as_producer(&self) -> Option<Arc<dyn Producer>> {
        match self {
            Node::Generator(n) => Some(Arc::clone(n) as Arc<dyn Producer>),
            Node::Production(n) => Some(Arc::clone(n) as Arc<dyn Producer>),
            Node::Storage(_) => None,
        }
    }

    pub fn as_consumer(&self) -> Option<Arc<dyn Consumer>> {
        match self {
            Node::Generator(_) => None,
            Node::Production(n) => Some(Arc::clone(n) as Arc<dyn Consumer>),
            Node::Storage(n) => Some(Arc::clone(n) as Arc<dyn Consumer>),
        }
    }

    /// Like [`Node::as_consumer`], but a missing capability is an error.
    pub fn require_consumer(&self) -> Result<Arc<dyn Consumer>, FlowError> {
        self.as_consumer()
            .ok_or_else(|| FlowError::CapabilityViolation {
                node: self.name().to_string(),
                capability: Capability::Consume,
            })
    }

    /// Like [`Node::as_producer`], but a missing capability is an error.
    pub fn require_producer(&self) -> Result<Arc<dyn Producer>, FlowError> {
        self.as_producer()
            .ok_or_else(|| FlowError::CapabilityViolation {
                node: self.name().to_string(),
                capability: Capability::Produce,
            })
    }

    /// Every channel attached to this node, inputs first.
    pub fn attached_channels(&self) -> Vec<ChannelId> {
        let mut channels = self
            .as_consumer()
            .map(|c| c.inputs())
            .unwrap_or_default();
        if let Some(p) = self.as_producer() {
            channels.extend(p.outputs());
        }
        channels
    }

    /// Start the node's task. Storage nodes have none, so this is a no-op
    /// for them. Returns whether anything changed.
    pub fn start(&self, ctx: &Arc<SimContext>) -> bool {
        match self {
            Node::Generator(n) => n.start(ctx),
            Node::Production(n) => n.start(ctx),
            Node::Storage(_) => false,
        }
    }

    /// Ask the node's task to stop after its current cycle.
    pub fn stop(&self) -> bool {
        self.core().task.stop()
    }

    /// Stop the node's task immediately.
    pub(crate) fn halt(&self) {
        self.core().task.halt();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::production::Recipe;

    fn sample_nodes() -> (Node, Node, Node) {
        let g = Node::Generator(Arc::new(GeneratorNode::new("G", "wood", Duration::from_secs(1))));
        let p = Node::Production(Arc::new(
            ProductionNode::new(
                "P",
                "plank",
                Recipe::from_pairs([("wood", 2)]),
                Duration::from_secs(1),
            )
            .unwrap(),
        ));
        let s = Node::Storage(Arc::new(StorageNode::new("S", "wood")));
        (g, p, s)
    }

    #[test]
    fn capabilities_by_kind() {
        let (g, p, s) = sample_nodes();
        assert!(g.as_producer().is_some() && g.as_consumer().is_none());
        assert!(p.as_producer().is_some() && p.as_consumer().is_some());
        assert!(s.as_producer().is_none() && s.as_consumer().is_some());
    }

    #[test]
    fn missing_capability_is_an_error() {
        let (g, _, s) = sample_nodes();
        assert_eq!(
            g.require_consumer().unwrap_err(),
            FlowError::CapabilityViolation {
                node: "G".into(),
                capability: Capability::Consume
            }
        );
        assert!(matches!(
            s.require_producer(),
            Err(FlowError::CapabilityViolation {
                capability: Capability::Produce,
                ..
            })
        ));
    }

    #[test]
    fn kind_and_display() {
        let (g, p, s) = sample_nodes();
        assert_eq!(g.kind(), NodeKind::Generator);
        assert_eq!(p.kind().to_string(), "production");
        assert_eq!(s.kind(), NodeKind::Storage);
        assert_eq!(s.core().production_count(), 0);
    }

    #[test]
    fn storage_start_is_noop() {
        let (_, _, s) = sample_nodes();
        let ctx = Arc::new(SimContext::new(Default::default()));
        assert!(!s.start(&ctx));
        assert!(!s.core().is_active());
    }
}
