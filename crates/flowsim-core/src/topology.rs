//! The topology registry: owns every node and channel of one simulation.
//!
//! The registry is the only place structure changes (create, connect,
//! disconnect, delete) and the only place tasks are started or stopped.
//! It never touches stock or queue contents itself, apart from explicit
//! stock seeding.
//!
//! Every failing command returns before its first side effect, so a failed
//! command leaves the topology unchanged.
//!
//! # Runtime
//!
//! Starting tasks spawns them on the ambient tokio runtime. Outside one,
//! `start*` fails with [`FlowError::NoRuntime`] and starts nothing.

use crate::channel::{Channel, ChannelSpec};
use crate::config::EngineConfig;
use crate::error::{FlowError, TopologyRule};
use crate::event::{Event, EventBus, EventSubscription};
use crate::generator::GeneratorNode;
use crate::id::{ChannelId, ResourceId, validate_name};
use crate::node::{Node, NodeKind};
use crate::production::{ProductionNode, Recipe};
use crate::query::{ChannelSnapshot, NodeSnapshot, TopologySnapshot};
use crate::resource::{Resource, Stock};
use crate::sim::SimContext;
use crate::storage::StorageNode;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Target keywords that cannot be used as node names.
const RESERVED_NAMES: [&str; 3] = ["nodes", "channels", "all"];

// ---------------------------------------------------------------------------
// Targets
// ---------------------------------------------------------------------------

/// What a `start` / `stop` command applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Nodes,
    Channels,
    All,
    /// A node or channel, looked up by name or channel id.
    Named(String),
}

impl Target {
    pub fn parse(s: &str) -> Self {
        match s {
            "nodes" => Target::Nodes,
            "channels" => Target::Channels,
            "all" => Target::All,
            other => Target::Named(other.to_string()),
        }
    }
}

impl From<&str> for Target {
    fn from(s: &str) -> Self {
        Target::parse(s)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Nodes => f.write_str("nodes"),
            Target::Channels => f.write_str("channels"),
            Target::All => f.write_str("all"),
            Target::Named(name) => f.write_str(name),
        }
    }
}

// ---------------------------------------------------------------------------
// Topology
// ---------------------------------------------------------------------------

/// Owns all nodes and channels of one simulation. Dropping it halts every
/// task it started.
#[derive(Debug)]
pub struct Topology {
    ctx: Arc<SimContext>,
    generators: BTreeMap<String, Arc<GeneratorNode>>,
    productions: BTreeMap<String, Arc<ProductionNode>>,
    storages: BTreeMap<String, Arc<StorageNode>>,
    channels: BTreeMap<ChannelId, Arc<Channel>>,
    seeded: u64,
}

impl Default for Topology {
    fn default() -> Self {
        Self::from_context(SimContext::new(EngineConfig::default()))
    }
}

impl Topology {
    /// Create an empty topology. The simulation clock starts now.
    pub fn new(config: EngineConfig) -> Result<Self, FlowError> {
        config.validate()?;
        Ok(Self::from_context(SimContext::new(config)))
    }

    fn from_context(ctx: SimContext) -> Self {
        Self {
            ctx: Arc::new(ctx),
            generators: BTreeMap::new(),
            productions: BTreeMap::new(),
            storages: BTreeMap::new(),
            channels: BTreeMap::new(),
            seeded: 0,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.ctx.config
    }

    pub fn events(&self) -> &EventBus {
        &self.ctx.events
    }

    pub fn subscribe(&self) -> EventSubscription {
        self.ctx.events.subscribe()
    }

    /// Simulated time since the topology was created.
    pub fn elapsed(&self) -> Duration {
        self.ctx.now()
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    /// Find a node of any kind by name.
    pub fn node(&self, name: &str) -> Option<Node> {
        if let Some(g) = self.generators.get(name) {
            Some(Node::Generator(Arc::clone(g)))
        } else if let Some(p) = self.productions.get(name) {
            Some(Node::Production(Arc::clone(p)))
        } else {
            self.storages.get(name).map(|s| Node::Storage(Arc::clone(s)))
        }
    }

    fn require_node(&self, name: &str) -> Result<Node, FlowError> {
        self.node(name)
            .ok_or_else(|| FlowError::NodeNotFound(name.to_string()))
    }

    pub fn channel(&self, id: &str) -> Option<Arc<Channel>> {
        let id = ChannelId::parse(id)?;
        self.channels.get(&id).cloned()
    }

    pub fn contains_node(&self, name: &str) -> bool {
        self.generators.contains_key(name)
            || self.productions.contains_key(name)
            || self.storages.contains_key(name)
    }

    /// All node names, sorted.
    pub fn node_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .generators
            .keys()
            .chain(self.productions.keys())
            .chain(self.storages.keys())
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn channel_ids(&self) -> Vec<ChannelId> {
        self.channels.keys().cloned().collect()
    }

    fn all_nodes(&self) -> Vec<Node> {
        self.node_names()
            .iter()
            .filter_map(|name| self.node(name))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    fn check_new_node(&self, name: &str, resource_type: &str) -> Result<(), FlowError> {
        validate_name(name)?;
        if RESERVED_NAMES.contains(&name) {
            return Err(FlowError::InvalidName(name.to_string()));
        }
        validate_name(resource_type)?;
        if self.contains_node(name) {
            return Err(FlowError::DuplicateName(name.to_string()));
        }
        Ok(())
    }

    fn announce_node(&self, name: &str, kind: NodeKind) {
        tracing::info!(node = name, %kind, "node created");
        self.ctx.emit(Event::NodeCreated {
            node: name.to_string(),
            kind,
            at: self.ctx.now(),
        });
    }

    pub fn create_generator(
        &mut self,
        name: &str,
        resource_type: &str,
        interval: Duration,
    ) -> Result<(), FlowError> {
        self.check_new_node(name, resource_type)?;
        let node = GeneratorNode::new(name, resource_type, interval);
        self.generators.insert(name.to_string(), Arc::new(node));
        self.announce_node(name, NodeKind::Generator);
        Ok(())
    }

    pub fn create_production(
        &mut self,
        name: &str,
        resource_type: &str,
        recipe: Recipe,
        interval: Duration,
    ) -> Result<(), FlowError> {
        self.check_new_node(name, resource_type)?;
        let node = ProductionNode::new(name, resource_type, recipe, interval)?;
        self.productions.insert(name.to_string(), Arc::new(node));
        self.announce_node(name, NodeKind::Production);
        Ok(())
    }

    pub fn create_storage(&mut self, name: &str, resource_type: &str) -> Result<(), FlowError> {
        self.check_new_node(name, resource_type)?;
        let node = StorageNode::new(name, resource_type);
        self.storages.insert(name.to_string(), Arc::new(node));
        self.announce_node(name, NodeKind::Storage);
        Ok(())
    }

    /// Connect two nodes with a channel using the configured default
    /// bandwidth and latency.
    pub fn connect(&mut self, output: &str, input: &str) -> Result<ChannelId, FlowError> {
        let spec = ChannelSpec::new(
            self.ctx.config.default_bandwidth,
            self.ctx.config.default_latency(),
        );
        self.connect_with(output, input, spec)
    }

    /// Connect two nodes with a channel of the given parameters.
    pub fn connect_with(
        &mut self,
        output: &str,
        input: &str,
        spec: ChannelSpec,
    ) -> Result<ChannelId, FlowError> {
        let out_node = self.require_node(output)?;
        let in_node = self.require_node(input)?;
        let id = ChannelId::between(output, input);
        if self.channels.contains_key(&id) {
            return Err(FlowError::InvalidTopology(TopologyRule::ChannelExists(id)));
        }

        let channel = Channel::new(&out_node, &in_node, spec)?;
        channel.attach();
        tracing::info!(
            channel = %id,
            resource_type = channel.resource_type(),
            bandwidth = spec.bandwidth,
            latency_ms = spec.latency.as_millis() as u64,
            "connected"
        );
        self.ctx.emit(Event::ChannelConnected {
            channel: id.clone(),
            resource_type: channel.resource_type().to_string(),
            at: self.ctx.now(),
        });
        self.channels.insert(id.clone(), Arc::new(channel));
        Ok(id)
    }

    /// Remove one channel. Its task is halted and anything in transit is
    /// discarded with it.
    pub fn disconnect(&mut self, id: &str) -> Result<(), FlowError> {
        let key = ChannelId::parse(id)
            .filter(|key| self.channels.contains_key(key))
            .ok_or_else(|| FlowError::ChannelNotFound(id.to_string()))?;
        self.remove_channel(&key);
        Ok(())
    }

    fn remove_channel(&mut self, id: &ChannelId) {
        if let Some(channel) = self.channels.remove(id) {
            channel.halt();
            channel.detach();
            tracing::info!(channel = %id, discarded = channel.queue_len(), "channel removed");
            self.ctx.emit(Event::ChannelRemoved {
                channel: id.clone(),
                at: self.ctx.now(),
            });
        }
    }

    /// Remove a node. Its task and every attached channel are halted and
    /// removed first.
    pub fn delete(&mut self, name: &str) -> Result<(), FlowError> {
        let node = self.require_node(name)?;
        for channel in node.attached_channels() {
            self.remove_channel(&channel);
        }
        node.halt();

        match node.kind() {
            NodeKind::Generator => {
                self.generators.remove(name);
            }
            NodeKind::Production => {
                self.productions.remove(name);
            }
            NodeKind::Storage => {
                self.storages.remove(name);
            }
        }
        tracing::info!(node = name, "node deleted");
        self.ctx.emit(Event::NodeDeleted {
            node: name.to_string(),
            at: self.ctx.now(),
        });
        Ok(())
    }

    pub fn delete_by_name(&mut self, name: &str) -> Result<(), FlowError> {
        self.delete(name)
    }

    /// Place `quantity` fresh resources of `resource_type` directly into a
    /// node's stock.
    pub fn seed_stock(
        &mut self,
        name: &str,
        resource_type: &str,
        quantity: u32,
    ) -> Result<(), FlowError> {
        let node = self.require_node(name)?;
        let consumer = node.require_consumer()?;
        consumer
            .accepts(resource_type)
            .map_err(FlowError::InvalidTopology)?;

        let now = self.ctx.now();
        for _ in 0..quantity {
            self.seeded += 1;
            let id = ResourceId::seeded(name, resource_type, self.seeded);
            consumer.add_resource(Resource::new(id, resource_type, now));
        }
        tracing::debug!(node = name, resource_type, quantity, "stock seeded");
        Ok(())
    }

    /// Contents of a storage node.
    pub fn storage_stock(&self, name: &str) -> Result<Stock, FlowError> {
        self.storages
            .get(name)
            .map(|s| s.get_stock())
            .ok_or_else(|| FlowError::NodeNotFound(name.to_string()))
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Start the tasks of `target`. Already-running tasks are left alone.
    /// Returns how many tasks were started.
    pub fn start(&mut self, target: impl Into<Target>) -> Result<usize, FlowError> {
        let target = target.into();
        let (nodes, channels) = self.resolve(&target)?;
        tokio::runtime::Handle::try_current().map_err(|_| FlowError::NoRuntime)?;
        let mut started = 0;
        for node in nodes {
            if node.start(&self.ctx) {
                started += 1;
                self.announce_task(node.name(), true);
            }
        }
        for channel in channels {
            if channel.activate(&self.ctx) {
                started += 1;
                self.announce_task(channel.id().as_str(), true);
            }
        }
        Ok(started)
    }

    /// Ask the tasks of `target` to stop after their current cycle.
    /// Returns how many tasks were asked.
    pub fn stop(&mut self, target: impl Into<Target>) -> Result<usize, FlowError> {
        let target = target.into();
        let (nodes, channels) = self.resolve(&target)?;
        let mut stopped = 0;
        for node in nodes {
            if node.stop() {
                stopped += 1;
                self.announce_task(node.name(), false);
            }
        }
        for channel in channels {
            if channel.deactivate() {
                stopped += 1;
                self.announce_task(channel.id().as_str(), false);
            }
        }
        Ok(stopped)
    }

    pub fn start_all(&mut self) -> Result<usize, FlowError> {
        self.start(Target::All)
    }

    pub fn stop_all(&mut self) -> usize {
        self.stop(Target::All).unwrap_or(0)
    }

    pub fn start_by_name(&mut self, name: &str) -> Result<usize, FlowError> {
        self.start(Target::Named(name.to_string()))
    }

    pub fn stop_by_name(&mut self, name: &str) -> Result<usize, FlowError> {
        self.stop(Target::Named(name.to_string()))
    }

    fn resolve(&self, target: &Target) -> Result<(Vec<Node>, Vec<Arc<Channel>>), FlowError> {
        let channels = || self.channels.values().cloned().collect::<Vec<_>>();
        match target {
            Target::Nodes => Ok((self.all_nodes(), Vec::new())),
            Target::Channels => Ok((Vec::new(), channels())),
            Target::All => Ok((self.all_nodes(), channels())),
            Target::Named(name) => {
                if let Some(node) = self.node(name) {
                    Ok((vec![node], Vec::new()))
                } else if let Some(channel) = self.channel(name) {
                    Ok((Vec::new(), vec![channel]))
                } else {
                    Err(FlowError::TargetNotFound(name.clone()))
                }
            }
        }
    }

    fn announce_task(&self, target: &str, started: bool) {
        let at = self.ctx.now();
        if started {
            tracing::info!(target_name = target, "task started");
            self.ctx.emit(Event::TaskStarted {
                target: target.to_string(),
                at,
            });
        } else {
            tracing::info!(target_name = target, "task stopping");
            self.ctx.emit(Event::TaskStopped {
                target: target.to_string(),
                at,
            });
        }
    }

    /// Halt every task immediately. The structure is kept.
    pub fn shutdown(&mut self) {
        for channel in self.channels.values() {
            channel.halt();
        }
        for node in self.all_nodes() {
            node.halt();
        }
    }

    // -----------------------------------------------------------------------
    // Query
    // -----------------------------------------------------------------------

    /// A read-only view of every node and channel. See [`TopologySnapshot`]
    /// for when its totals are exact.
    pub fn snapshot(&self) -> TopologySnapshot {
        TopologySnapshot {
            elapsed: self.ctx.now(),
            nodes: self.all_nodes().iter().map(NodeSnapshot::capture).collect(),
            channels: self
                .channels
                .values()
                .map(|c| ChannelSnapshot::capture(c))
                .collect(),
        }
    }
}

impl Drop for Topology {
    fn drop(&mut self) {
        self.shutdown();
    }
}
