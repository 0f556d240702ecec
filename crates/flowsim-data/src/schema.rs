//! Serde structs for scenario files.
//!
//! A scenario describes a whole topology declaratively: engine config, the
//! nodes of each kind, the channels between them, and any initial stock.
//! Times are written in seconds as floating-point numbers and converted to
//! [`Duration`]s when the topology is built.

use flowsim_core::config::EngineConfig;
use flowsim_core::error::FlowError;
use flowsim_core::production::Recipe;
use serde::Deserialize;
use std::time::Duration;

// ===========================================================================
// Scenario
// ===========================================================================

/// Top-level scenario file. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub config: EngineConfig,
    pub generators: Vec<GeneratorDef>,
    pub productions: Vec<ProductionDef>,
    pub storages: Vec<StorageDef>,
    pub channels: Vec<ChannelDef>,
    pub seed: Vec<SeedDef>,
}

// ===========================================================================
// Nodes
// ===========================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorDef {
    pub name: String,
    pub resource_type: String,
    /// Seconds between two resources.
    pub interval: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductionDef {
    pub name: String,
    /// Output type.
    pub resource_type: String,
    /// Input type to quantity consumed per batch.
    pub recipe: Recipe,
    /// Build time of one batch, in seconds.
    pub interval: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageDef {
    pub name: String,
    pub resource_type: String,
}

// ===========================================================================
// Channels and stock
// ===========================================================================

/// A channel between two named nodes. Omitted parameters fall back to the
/// scenario's engine config.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelDef {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub bandwidth: Option<usize>,
    /// Transit time in seconds.
    #[serde(default)]
    pub latency: Option<f64>,
}

/// Resources placed into a node's stock before the simulation starts.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedDef {
    pub node: String,
    pub resource_type: String,
    pub quantity: u32,
}

/// Convert a seconds value from a scenario file, rejecting negative and
/// non-finite values.
pub fn seconds(field: &str, value: f64) -> Result<Duration, FlowError> {
    if !value.is_finite() || value < 0.0 {
        return Err(FlowError::InvalidParameter(format!(
            "{field} must be a non-negative number of seconds, got {value}"
        )));
    }
    Duration::try_from_secs_f64(value).map_err(|e| {
        FlowError::InvalidParameter(format!("{field} = {value} is out of range: {e}"))
    })
}
