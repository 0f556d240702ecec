use crate::event::Event;
use crate::id::{ChannelId, ResourceId};
use crate::node::{NodeCore, Producer};
use crate::resource::{Resource, Stock};
use crate::sim::SimContext;
use crate::task::{TaskPoll, pause};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Produces one resource of its type from nothing every interval.
#[derive(Debug)]
pub struct GeneratorNode {
    core: NodeCore,
    outputs: Mutex<Vec<ChannelId>>,
}

impl GeneratorNode {
    pub fn new(name: impl Into<String>, resource_type: impl Into<String>, interval: Duration) -> Self {
        let resource_type = resource_type.into();
        let stock = Stock::with_types([resource_type.as_str()]);
        Self {
            core: NodeCore::new(name, resource_type, interval, stock),
            outputs: Mutex::new(Vec::new()),
        }
    }

    pub fn core(&self) -> &NodeCore {
        &self.core
    }

    /// One production cycle minus the wait: mint a resource into stock.
    pub fn produce_once(&self, ctx: &SimContext) -> ResourceId {
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
        while self.core.task.poll(|| true) == TaskPoll::Run {
            self.produce_once(&ctx);
            pause(self.core.interval()).await;
        }
        tracing::debug!(node = self.core.name(), "generator task exited");
    }
}

impl Producer for GeneratorNode {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produce_once_mints_sequential_ids() {
        let ctx = SimContext::new(Default::default());
        let g = GeneratorNode::new("G", "wood", Duration::from_secs(1));

        assert_eq!(g.produce_once(&ctx).as_str(), "G.wood.1");
        assert_eq!(g.produce_once(&ctx).as_str(), "G.wood.2");
        assert_eq!(g.core().production_count(), 2);
        assert_eq!(g.core().quantity("wood"), 2);
    }

    #[test]
    fn take_output_is_fifo() {
        let ctx = SimContext::new(Default::default());
        let g = GeneratorNode::new("G", "wood", Duration::from_secs(1));
        g.produce_once(&ctx);
        g.produce_once(&ctx);

        assert_eq!(g.take_output().unwrap().id().as_str(), "G.wood.1");
        assert_eq!(g.core().quantity("wood"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn produces_every_interval_until_stopped() {
        let ctx = Arc::new(SimContext::new(Default::default()));
        let g = Arc::new(GeneratorNode::new("G", "wood", Duration::from_secs(1)));

        assert!(g.start(&ctx));
        assert!(!g.start(&ctx));
        // Cycles at t = 0, 1, 2.
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(g.core().production_count(), 3);

        assert!(g.core().task.stop());
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(g.core().production_count(), 3);
        assert!(!g.core().task.is_running());
    }

    #[test]
    fn outputs_attach_and_detach() {
        let g = GeneratorNode::new("G", "wood", Duration::ZERO);
        let id = ChannelId::between("G", "S");
        g.attach_output(id.clone());
        assert_eq!(g.outputs(), vec![id.clone()]);
        g.detach_output(&id);
        assert!(g.outputs().is_empty());
    }
}
