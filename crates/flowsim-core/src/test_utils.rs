//! Shared test helpers for unit and integration tests.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so integration
//! tests can reach them through the `test-utils` feature.

use crate::config::EngineConfig;
use crate::production::Recipe;
use crate::topology::Topology;
use std::time::Duration;

// ===========================================================================
// Time helpers
// ===========================================================================

pub fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

pub fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

/// Let simulated time run for `duration` on a paused test runtime.
pub async fn run_for(duration: Duration) {
    tokio::time::sleep(duration).await;
}

// ===========================================================================
// Topology builders
// ===========================================================================

pub fn topology() -> Topology {
    Topology::default()
}

/// Topology with a custom config; panics on invalid config.
pub fn topology_with(config: EngineConfig) -> Topology {
    Topology::new(config).expect("valid config")
}

pub fn wood_recipe(quantity: u32) -> Recipe {
    Recipe::from_pairs([("wood", quantity)])
}

/// `G (wood, 1s) -> S (wood)`.
pub fn generator_to_storage() -> Topology {
    let mut topo = topology();
    topo.create_generator("G", "wood", secs(1)).expect("create G");
    topo.create_storage("S", "wood").expect("create S");
    topo.connect("G", "S").expect("connect G->S");
    topo
}

/// `G (wood, 1s) -> P (2 wood => plank, 1s) -> S (plank)`.
pub fn plank_chain() -> Topology {
    let mut topo = topology();
    topo.create_generator("G", "wood", secs(1)).expect("create G");
    topo.create_production("P", "plank", wood_recipe(2), secs(1))
        .expect("create P");
    topo.create_storage("S", "plank").expect("create S");
    topo.connect("G", "P").expect("connect G->P");
    topo.connect("P", "S").expect("connect P->S");
    topo
}
