//! Error taxonomy for topology commands.
//!
//! Every variant is a local, recoverable failure of the command that raised
//! it. A failed command leaves the topology exactly as it was.

use crate::id::ChannelId;
use std::fmt;

/// Errors returned by topology operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("invalid name '{0}': expected ASCII letters, digits or underscores")]
    InvalidName(String),
    #[error("name '{0}' is already in use")]
    DuplicateName(String),
    #[error("node not found: {0}")]
    NodeNotFound(String),
    #[error("channel not found: {0}")]
    ChannelNotFound(String),
    #[error("target not found: {0}")]
    TargetNotFound(String),
    #[error("invalid topology: {0}")]
    InvalidTopology(TopologyRule),
    #[error("node '{node}' cannot {capability}")]
    CapabilityViolation { node: String, capability: Capability },
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("tasks can only be started inside a tokio runtime")]
    NoRuntime,
}

/// The connection rule a rejected `connect` violated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopologyRule {
    /// The output endpoint is not a Generator or Production node.
    OutputCannotProduce { node: String },
    /// The input endpoint is not a Production or Storage node.
    InputCannotConsume { node: String },
    /// Both endpoints name the same node.
    SelfConnection { node: String },
    /// A Production node's recipe does not list the offered type.
    RecipeDoesNotRequire { node: String, resource_type: String },
    /// A Production node already has an input channel for the type.
    InputAlreadySupplied {
        node: String,
        resource_type: String,
        existing: ChannelId,
    },
    /// A Storage node already has its one input channel.
    StorageAlreadyConnected { node: String, existing: ChannelId },
    /// A Storage node holds a different resource type.
    StorageTypeMismatch {
        node: String,
        expected: String,
        found: String,
    },
    /// A channel between the same endpoints is already registered.
    ChannelExists(ChannelId),
}

impl fmt::Display for TopologyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopologyRule::OutputCannotProduce { node } => {
                write!(f, "'{node}' cannot be a channel output (must be a generator or production node)")
            }
            TopologyRule::InputCannotConsume { node } => {
                write!(f, "'{node}' cannot be a channel input (must be a production or storage node)")
            }
            TopologyRule::SelfConnection { node } => {
                write!(f, "'{node}' cannot be connected to itself")
            }
            TopologyRule::RecipeDoesNotRequire {
                node,
                resource_type,
            } => write!(f, "recipe of '{node}' does not require '{resource_type}'"),
            TopologyRule::InputAlreadySupplied {
                node,
                resource_type,
                existing,
            } => write!(
                f,
                "'{node}' already receives '{resource_type}' through {existing}"
            ),
            TopologyRule::StorageAlreadyConnected { node, existing } => {
                write!(f, "storage '{node}' already has input channel {existing}")
            }
            TopologyRule::StorageTypeMismatch {
                node,
                expected,
                found,
            } => write!(f, "storage '{node}' holds '{expected}', not '{found}'"),
            TopologyRule::ChannelExists(id) => write!(f, "channel {id} already exists"),
        }
    }
}

/// A capability a node variant may lack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Receive resources (have inputs).
    Consume,
    /// Hand out resources (have outputs).
    Produce,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Consume => f.write_str("receive resources"),
            Capability::Produce => f.write_str("supply resources"),
        }
    }
}
