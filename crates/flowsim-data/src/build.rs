//! Turn a parsed [`Scenario`] into a live [`Topology`].

use crate::loader::{ScenarioError, load_scenario};
use crate::schema::{Scenario, seconds};
use flowsim_core::channel::ChannelSpec;
use flowsim_core::topology::Topology;
use std::path::Path;

/// Build a topology from a scenario.
///
/// Entries are applied in file order: generators, productions, storages,
/// channels, then stock seeds. The first rejected entry aborts the build.
/// No task is started.
pub fn build_topology(scenario: &Scenario) -> Result<Topology, ScenarioError> {
    let mut topo = Topology::new(scenario.config.clone())?;

    for g in &scenario.generators {
        let interval = seconds("generator interval", g.interval)?;
        topo.create_generator(&g.name, &g.resource_type, interval)?;
    }
    for p in &scenario.productions {
        let interval = seconds("production interval", p.interval)?;
        topo.create_production(&p.name, &p.resource_type, p.recipe.clone(), interval)?;
    }
    for s in &scenario.storages {
        topo.create_storage(&s.name, &s.resource_type)?;
    }

    let config = topo.config().clone();
    for c in &scenario.channels {
        let latency = match c.latency {
            Some(latency) => seconds("channel latency", latency)?,
            None => config.default_latency(),
        };
        let bandwidth = c.bandwidth.unwrap_or(config.default_bandwidth);
        topo.connect_with(&c.from, &c.to, ChannelSpec::new(bandwidth, latency))?;
    }

    for seed in &scenario.seed {
        topo.seed_stock(&seed.node, &seed.resource_type, seed.quantity)?;
    }

    tracing::info!(
        nodes = topo.node_names().len(),
        channels = topo.channel_ids().len(),
        "scenario built"
    );
    Ok(topo)
}

/// Load a scenario file and build its topology.
pub fn load_topology(path: &Path) -> Result<Topology, ScenarioError> {
    build_topology(&load_scenario(path)?)
}
