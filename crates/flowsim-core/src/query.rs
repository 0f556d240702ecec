//! Read-only query API for inspecting simulation state.
//!
//! Snapshot types aggregate topology state into owned views for display
//! layers. Nothing here borrows from the live topology, and every type
//! serializes to JSON for rendering.

use crate::channel::Channel;
use crate::id::ChannelId;
use crate::node::{Node, NodeKind};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Node snapshot
// ---------------------------------------------------------------------------

/// A read-only view of a single node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeSnapshot {
    pub name: String,
    pub kind: NodeKind,
    /// Produced type (or, for storage, the held type).
    pub resource_type: String,
    pub active: bool,
    pub production_count: u64,
    pub interval: Duration,
    /// Per-type stock counts.
    pub stock: BTreeMap<String, usize>,
    /// Recipe of a production node; empty for the other kinds.
    pub recipe: BTreeMap<String, u32>,
    pub inputs: Vec<ChannelId>,
    pub outputs: Vec<ChannelId>,
}

impl NodeSnapshot {
    pub(crate) fn capture(node: &Node) -> Self {
        let core = node.core();
        let recipe = match node {
            Node::Production(p) => p
                .recipe()
                .iter()
                .map(|(t, q)| (t.to_string(), q))
                .collect(),
            _ => BTreeMap::new(),
        };
        Self {
            name: core.name().to_string(),
            kind: node.kind(),
            resource_type: core.resource_type().to_string(),
            active: core.is_active(),
            production_count: core.production_count(),
            interval: core.interval(),
            stock: core.stock().counts(),
            recipe,
            inputs: node.as_consumer().map(|c| c.inputs()).unwrap_or_default(),
            outputs: node.as_producer().map(|p| p.outputs()).unwrap_or_default(),
        }
    }

    /// Stock count of one type.
    pub fn quantity(&self, resource_type: &str) -> usize {
        self.stock.get(resource_type).copied().unwrap_or(0)
    }

    pub fn stock_total(&self) -> usize {
        self.stock.values().sum()
    }
}

// ---------------------------------------------------------------------------
// Channel snapshot
// ---------------------------------------------------------------------------

/// A read-only view of a single channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelSnapshot {
    pub id: ChannelId,
    pub from: String,
    pub to: String,
    pub resource_type: String,
    pub active: bool,
    pub bandwidth: usize,
    pub latency: Duration,
    pub in_transit: usize,
    pub loaded_total: u64,
    pub delivered_total: u64,
}

impl ChannelSnapshot {
    pub(crate) fn capture(channel: &Channel) -> Self {
        let spec = channel.spec();
        Self {
            id: channel.id().clone(),
            from: channel.output_name().to_string(),
            to: channel.input_name().to_string(),
            resource_type: channel.resource_type().to_string(),
            active: channel.is_active(),
            bandwidth: spec.bandwidth,
            latency: spec.latency,
            in_transit: channel.queue_len(),
            loaded_total: channel.loaded_total(),
            delivered_total: channel.delivered_total(),
        }
    }

    /// Fraction of bandwidth currently in use.
    pub fn utilization(&self) -> f64 {
        self.in_transit as f64 / self.bandwidth as f64
    }
}

// ---------------------------------------------------------------------------
// Topology snapshot
// ---------------------------------------------------------------------------

/// Every node and channel, in name order.
///
/// Containers are captured one at a time. While tasks run on a
/// multi-thread runtime a resource can move between two captures, so
/// [`total_resources`](Self::total_resources) and
/// [`count_of`](Self::count_of) are approximate mid-run. They are exact on
/// a current-thread runtime, and on any runtime once the topology is
/// stopped and its channels have drained.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopologySnapshot {
    /// Simulated time since the topology was created.
    pub elapsed: Duration,
    pub nodes: Vec<NodeSnapshot>,
    pub channels: Vec<ChannelSnapshot>,
}

impl TopologySnapshot {
    pub fn node(&self, name: &str) -> Option<&NodeSnapshot> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn channel(&self, id: &str) -> Option<&ChannelSnapshot> {
        self.channels.iter().find(|c| c.id.as_str() == id)
    }

    /// Resources held anywhere: all stocks plus all channel queues.
    pub fn total_resources(&self) -> usize {
        let stocked: usize = self.nodes.iter().map(NodeSnapshot::stock_total).sum();
        let in_transit: usize = self.channels.iter().map(|c| c.in_transit).sum();
        stocked + in_transit
    }

    /// Resources of one type held anywhere.
    pub fn count_of(&self, resource_type: &str) -> usize {
        let stocked: usize = self.nodes.iter().map(|n| n.quantity(resource_type)).sum();
        let in_transit: usize = self
            .channels
            .iter()
            .filter(|c| c.resource_type == resource_type)
            .map(|c| c.in_transit)
            .sum();
        stocked + in_transit
    }
}
