use crate::error::TopologyRule;
use crate::id::ChannelId;
use crate::node::{Consumer, NodeCore};
use crate::resource::Stock;
use parking_lot::Mutex;
use std::time::Duration;

/// Terminal sink for a single resource type.
///
/// Has no task of its own: it only accumulates what its one input channel
/// unloads into it.
#[derive(Debug)]
pub struct StorageNode {
    core: NodeCore,
    input: Mutex<Option<ChannelId>>,
}

impl StorageNode {
    pub fn new(name: impl Into<String>, resource_type: impl Into<String>) -> Self {
        let resource_type = resource_type.into();
        let stock = Stock::with_types([resource_type.as_str()]);
        Self {
            core: NodeCore::new(name, resource_type, Duration::ZERO, stock),
            input: Mutex::new(None),
        }
    }

    pub fn core(&self) -> &NodeCore {
        &self.core
    }

    /// Everything stored so far.
    pub fn get_stock(&self) -> Stock {
        self.core.stock()
    }
}

impl Consumer for StorageNode {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn accepts(&self, resource_type: &str) -> Result<(), TopologyRule> {
        if resource_type == self.core.resource_type() {
            Ok(())
        } else {
            Err(TopologyRule::StorageTypeMismatch {
                node: self.core.name().to_string(),
                expected: self.core.resource_type().to_string(),
                found: resource_type.to_string(),
            })
        }
    }

    fn check_input(&self, resource_type: &str) -> Result<(), TopologyRule> {
        if let Some(existing) = self.input.lock().as_ref() {
            return Err(TopologyRule::StorageAlreadyConnected {
                node: self.core.name().to_string(),
                existing: existing.clone(),
            });
        }
        self.accepts(resource_type)
    }

    fn attach_input(&self, channel: ChannelId, _resource_type: &str) {
        *self.input.lock() = Some(channel);
    }

    fn detach_input(&self, channel: &ChannelId) {
        let mut input = self.input.lock();
        if input.as_ref() == Some(channel) {
            *input = None;
        }
    }

    fn inputs(&self) -> Vec<ChannelId> {
        self.input.lock().iter().cloned().collect()
    }
}
