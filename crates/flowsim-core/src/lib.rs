//! Flowsim Core -- a concurrent resource-flow simulation engine.
//!
//! A flow topology is made of three node kinds joined by channels:
//!
//! - **Generator** -- makes one resource of its type every interval, from
//!   nothing.
//! - **Production** -- consumes a recipe's worth of inputs, waits its
//!   interval, then makes one resource of its output type.
//! - **Storage** -- a terminal sink that accumulates one resource type.
//!
//! Every generator, production node and channel runs as its own tokio task.
//! Tasks share no state except the stocks they move resources between, and
//! every stock mutation is one short critical section, so a resource is at
//! every instant owned by exactly one node stock or one channel queue.
//!
//! # Transport
//!
//! Channels are rate- and latency-limited. A full channel refuses to load
//! and the surplus waits in the producer's own stock; see [`channel`].
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut topo = Topology::new(EngineConfig::default())?;
//! topo.create_generator("G", "wood", Duration::from_secs(1))?;
//! topo.create_storage("S", "wood")?;
//! topo.connect("G", "S")?;
//! topo.start_all()?;
//! tokio::time::sleep(Duration::from_secs(5)).await;
//! topo.stop_all();
//! println!("{:?}", topo.storage_stock("S")?.quantity("wood"));
//! ```
//!
//! # Key Types
//!
//! - [`topology::Topology`] -- Registry owning every node and channel, and
//!   the only entry point for structural changes and task control.
//! - [`node::Node`] -- A node of any kind, with [`node::Producer`] and
//!   [`node::Consumer`] capabilities.
//! - [`channel::Channel`] -- Bandwidth- and latency-limited conduit.
//! - [`production::Recipe`] -- Input quantities per production batch.
//! - [`resource::Stock`] -- Per-type FIFO inventory of a node.
//! - [`event::EventBus`] -- Broadcast stream of simulation events.
//! - [`query::TopologySnapshot`] -- Owned, serializable view of the state.

pub mod channel;
pub mod config;
pub mod error;
pub mod event;
pub mod generator;
pub mod id;
pub mod node;
pub mod production;
pub mod query;
pub mod resource;
pub mod sim;
pub mod storage;
pub mod task;
pub mod topology;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use channel::ChannelSpec;
pub use config::EngineConfig;
pub use error::FlowError;
pub use production::Recipe;
pub use topology::{Target, Topology};
