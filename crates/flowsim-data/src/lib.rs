//! Declarative scenario files for flowsim topologies.
//!
//! A scenario lists nodes, channels and initial stock in RON, TOML or JSON
//! (chosen by file extension). [`build_topology`] applies it to a fresh
//! [`flowsim_core::Topology`].

pub mod build;
pub mod loader;
pub mod schema;

pub use build::{build_topology, load_topology};
pub use loader::{ScenarioError, load_scenario};
pub use schema::Scenario;
