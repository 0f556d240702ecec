//! Production nodes: the gating logic of the simulation.
//!
//! A production node turns a fixed recipe of inputs into one unit of its
//! output type. Inputs are debited from its own stock before the build wait
//! begins, in the same critical section as the availability check, so no
//! input can be claimed by two production attempts.

use crate::error::{FlowError, TopologyRule};
use crate::event::Event;
use crate::id::{ChannelId, ResourceId, validate_name};
use crate::node::{Consumer, NodeCore, Producer};
use crate::resource::{Resource, Stock};
use crate::sim::SimContext;
use crate::task::{TaskPoll, pause};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Recipe
// ---------------------------------------------------------------------------

/// Input resource type -> quantity needed for one unit of output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Recipe(BTreeMap<String, u32>);

impl Recipe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<S: Into<String>>(pairs: impl IntoIterator<Item = (S, u32)>) -> Self {
        Self(pairs.into_iter().map(|(t, q)| (t.into(), q)).collect())
    }

    pub fn with(mut self, resource_type: impl Into<String>, quantity: u32) -> Self {
        self.0.insert(resource_type.into(), quantity);
        self
    }

    /// `(type, quantity)` entries in type order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(t, q)| (t.as_str(), *q))
    }

    pub fn requires(&self, resource_type: &str) -> bool {
        self.0.contains_key(resource_type)
    }

    pub fn quantity(&self, resource_type: &str) -> u32 {
        self.0.get(resource_type).copied().unwrap_or(0)
    }

    /// Sum of all input quantities.
    pub fn total_quantity(&self) -> u32 {
        self.0.values().sum()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A recipe needs at least one entry, legal type names, and no zero
    /// quantities.
    pub fn validate(&self) -> Result<(), FlowError> {
        if self.0.is_empty() {
            return Err(FlowError::InvalidParameter(
                "recipe must list at least one input".into(),
            ));
        }
        for (resource_type, quantity) in &self.0 {
            validate_name(resource_type)?;
            if *quantity == 0 {
                return Err(FlowError::InvalidParameter(format!(
                    "recipe quantity for '{resource_type}' must be at least 1"
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ProductionNode
// ---------------------------------------------------------------------------

/// Consumes recipe inputs from its stock and produces one output per cycle.
#[derive(Debug)]
pub struct ProductionNode {
    core: NodeCore,
    recipe: Recipe,
    /// At most one input channel per recipe type.
    inputs: Mutex<BTreeMap<String, ChannelId>>,
    outputs: Mutex<Vec<ChannelId>>,
}

impl ProductionNode {
    pub fn new(
        name: impl Into<String>,
        resource_type: impl Into<String>,
        recipe: Recipe,
        interval: Duration,
    ) -> Result<Self, FlowError> {
        recipe.validate()?;
        let resource_type = resource_type.into();
        let stock = Stock::with_types(
            recipe
                .iter()
                .map(|(t, _)| t)
                .chain(std::iter::once(resource_type.as_str())),
        );
        Ok(Self {
            core: NodeCore::new(name, resource_type, interval, stock),
            recipe,
            inputs: Mutex::new(BTreeMap::new()),
            outputs: Mutex::new(Vec::new()),
        })
    }

    pub fn core(&self) -> &NodeCore {
        &self.core
    }

    pub fn recipe(&self) -> &Recipe {
        &self.recipe
    }

    /// Whether the recipe is currently covered by stock.
    pub fn can_produce(&self) -> bool {
        self.core
            .with_stock(|stock| stock.shortfall(&self.recipe).is_empty())
    }

    /// Check availability and debit the recipe in one step. On success the
    /// debited inputs are returned; they leave the system with this call.
    /// On starvation nothing is touched and the shortfall is returned.
    pub fn begin_batch(&self, ctx: &SimContext) -> Result<Vec<Resource>, Vec<(String, u32)>> {
        let core = &self.core;
        let outcome = core.with_stock(|stock| {
            stock
                .debit(&self.recipe)
                .ok_or_else(|| stock.shortfall(&self.recipe))
        });

        match &outcome {
            Ok(_) => {
                let consumed: Vec<(String, u32)> =
                    self.recipe.iter().map(|(t, q)| (t.to_string(), q)).collect();
                tracing::debug!(node = core.name(), ?consumed, "recipe inputs debited");
                ctx.emit(Event::ResourcesConsumed {
                    node: core.name().to_string(),
                    consumed,
                    at: ctx.now(),
                });
            }
            Err(missing) => {
                tracing::trace!(node = core.name(), ?missing, "starved");
                ctx.emit(Event::ProductionStarved {
                    node: core.name().to_string(),
                    missing: missing.clone(),
                    at: ctx.now(),
                });
            }
        }
        outcome
    }

    /// Finish a batch begun by [`ProductionNode::begin_batch`]: mint one
    /// output resource into stock.
    pub fn complete_batch(&self, ctx: &SimContext) -> ResourceId {
        let core = &self.core;
        let sequence = core.next_sequence();
        let id = ResourceId::new(core.name(), core.resource_type(), sequence);
        let resource = Resource::new(id.clone(), core.resource_type(), ctx.now());
        core.with_stock(|stock| stock.push(resource));

        tracing::debug!(node = core.name(), resource = %id, "produced");
        ctx.emit(Event::ResourceProduced {
            node: core.name().to_string(),
            resource: id.clone(),
            resource_type: core.resource_type().to_string(),
            at: ctx.now(),
        });
        id
    }

    pub(crate) fn start(self: &Arc<Self>, ctx: &Arc<SimContext>) -> bool {
        let node = Arc::clone(self);
        let ctx = Arc::clone(ctx);
        self.core.task.start(move || tokio::spawn(node.run(ctx)))
    }

    async fn run(self: Arc<Self>, ctx: Arc<SimContext>) {
        let interval = self.core.interval();
        while self.core.task.poll(|| true) == TaskPoll::Run {
            match self.begin_batch(&ctx) {
                Ok(_inputs) => {
                    // Build time.
                    pause(interval).await;
                    self.complete_batch(&ctx);
                }
                Err(_) => pause(ctx.config.starvation_retry(interval)).await,
            }
        }
        tracing::debug!(node = self.core.name(), "production task exited");
    }
}

impl Producer for ProductionNode {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn attach_output(&self, channel: ChannelId) {
        self.outputs.lock().push(channel);
    }

    fn detach_output(&self, channel: &ChannelId) {
        self.outputs.lock().retain(|c| c != channel);
    }

    fn outputs(&self) -> Vec<ChannelId> {
        self.outputs.lock().clone()
    }
}

impl Consumer for ProductionNode {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn accepts(&self, resource_type: &str) -> Result<(), TopologyRule> {
        if self.recipe.requires(resource_type) {
            Ok(())
        } else {
            Err(TopologyRule::RecipeDoesNotRequire {
                node: self.core.name().to_string(),
                resource_type: resource_type.to_string(),
            })
        }
    }

    fn check_input(&self, resource_type: &str) -> Result<(), TopologyRule> {
        self.accepts(resource_type)?;
        match self.inputs.lock().get(resource_type) {
            Some(existing) => Err(TopologyRule::InputAlreadySupplied {
                node: self.core.name().to_string(),
                resource_type: resource_type.to_string(),
                existing: existing.clone(),
            }),
            None => Ok(()),
        }
    }

    fn attach_input(&self, channel: ChannelId, resource_type: &str) {
        self.inputs.lock().insert(resource_type.to_string(), channel);
    }

    fn detach_input(&self, channel: &ChannelId) {
        self.inputs.lock().retain(|_, c| c != channel);
    }

    fn inputs(&self) -> Vec<ChannelId> {
        self.inputs.lock().values().cloned().collect()
    }
}
