//! Property-based tests for the flow core.
//!
//! Drives channels and production nodes through random step sequences and
//! checks that bandwidth and recipe accounting hold after every step.

use flowsim_core::channel::{Channel, LoadOutcome};
use flowsim_core::generator::GeneratorNode;
use flowsim_core::id::ResourceId;
use flowsim_core::node::{Consumer, Node};
use flowsim_core::production::{ProductionNode, Recipe};
use flowsim_core::resource::Resource;
use flowsim_core::sim::SimContext;
use flowsim_core::storage::StorageNode;
use flowsim_core::test_utils::*;
use flowsim_core::{ChannelSpec, EngineConfig};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

// ===========================================================================
// Generators
// ===========================================================================

#[derive(Debug, Clone)]
enum TransportOp {
    Produce,
    Load,
    Unload,
}

fn arb_transport_op() -> impl Strategy<Value = TransportOp> {
    prop_oneof![
        Just(TransportOp::Produce),
        Just(TransportOp::Load),
        Just(TransportOp::Unload),
    ]
}

fn arb_type() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("wood"), Just("stone"), Just("iron")]
}

fn arb_recipe() -> impl Strategy<Value = Recipe> {
    proptest::collection::btree_map(arb_type(), 1..5u32, 1..=3)
        .prop_map(|entries| Recipe::from_pairs(entries))
}

fn arb_seed() -> impl Strategy<Value = Vec<(&'static str, u32)>> {
    proptest::collection::vec((arb_type(), 0..6u32), 0..4)
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    /// A channel never holds more than its bandwidth, and every resource is
    /// in exactly one place.
    #[test]
    fn channel_respects_bandwidth(
        bandwidth in 1usize..5,
        ops in proptest::collection::vec(arb_transport_op(), 1..60),
    ) {
        let ctx = SimContext::new(EngineConfig::default());
        let g = Arc::new(GeneratorNode::new("G", "wood", secs(1)));
        let s = Arc::new(StorageNode::new("S", "wood"));
        let channel = Channel::new(
            &Node::Generator(Arc::clone(&g)),
            &Node::Storage(Arc::clone(&s)),
            ChannelSpec::new(bandwidth, Duration::ZERO),
        )
        .unwrap();

        for op in ops {
            match op {
                TransportOp::Produce => {
                    g.produce_once(&ctx);
                }
                TransportOp::Load => {
                    let before = channel.queue_len();
                    if channel.load(&ctx) == LoadOutcome::Full {
                        prop_assert_eq!(before, bandwidth);
                    }
                }
                TransportOp::Unload => {
                    channel.unload(&ctx);
                }
            }

            prop_assert!(channel.queue_len() <= bandwidth);
            let held = g.core().quantity("wood") + channel.queue_len() + s.core().quantity("wood");
            prop_assert_eq!(held as u64, g.core().production_count());
        }
    }

    /// Starting a batch either removes exactly the recipe from stock or
    /// leaves stock untouched.
    #[test]
    fn batch_debits_all_or_nothing(recipe in arb_recipe(), seed in arb_seed()) {
        let ctx = SimContext::new(EngineConfig::default());
        let p = ProductionNode::new("P", "widget", recipe.clone(), secs(1)).unwrap();
        let mut sequence = 0;
        for (resource_type, quantity) in &seed {
            if !recipe.requires(resource_type) {
                continue;
            }
            for _ in 0..*quantity {
                sequence += 1;
                let id = ResourceId::seeded("P", resource_type, sequence);
                p.add_resource(Resource::new(id, *resource_type, Duration::ZERO));
            }
        }

        let before = p.core().stock();
        let coverable = recipe
            .iter()
            .all(|(t, q)| before.quantity(t) >= q as usize);

        match p.begin_batch(&ctx) {
            Ok(inputs) => {
                prop_assert!(coverable);
                prop_assert_eq!(inputs.len(), recipe.total_quantity() as usize);
                let after = p.core().stock();
                for (t, q) in recipe.iter() {
                    prop_assert_eq!(after.quantity(t), before.quantity(t) - q as usize);
                }
            }
            Err(missing) => {
                prop_assert!(!coverable);
                prop_assert!(!missing.is_empty());
                prop_assert_eq!(p.core().stock(), before);
            }
        }
        prop_assert_eq!(p.core().production_count(), 0);
    }
}
