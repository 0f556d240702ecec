//! End-to-end tests running real node and channel tasks on a paused tokio
//! clock. Sample points sit between task wake-ups so timer ordering at a
//! shared instant never matters.

use flowsim_core::error::{FlowError, TopologyRule};
use flowsim_core::event::{Event, EventKind};
use flowsim_core::test_utils::*;
use flowsim_core::{ChannelSpec, Target};
use std::time::Duration;

// ===========================================================================
// Generator to storage
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn generator_fills_storage() {
    let mut topo = generator_to_storage();
    assert_eq!(topo.start_all(), Ok(2));

    run_for(millis(2500)).await;

    let snap = topo.snapshot();
    assert_eq!(snap.node("G").unwrap().production_count, 3);
    assert_eq!(topo.storage_stock("S").unwrap().quantity("wood"), 3);
    assert_eq!(snap.node("G").unwrap().quantity("wood"), 0);
    assert_eq!(snap.channel("G->S").unwrap().delivered_total, 3);
}

#[tokio::test(start_paused = true)]
async fn storage_keeps_arrival_order() {
    let mut topo = generator_to_storage();
    topo.start_all().unwrap();
    run_for(millis(3500)).await;

    let stock = topo.storage_stock("S").unwrap();
    let ids: Vec<&str> = stock.iter_type("wood").map(|r| r.id().as_str()).collect();
    assert_eq!(ids, vec!["G.wood.1", "G.wood.2", "G.wood.3", "G.wood.4"]);
}

#[tokio::test(start_paused = true)]
async fn stopped_topology_is_frozen() {
    let mut topo = generator_to_storage();
    topo.start_all().unwrap();
    run_for(millis(2500)).await;
    assert_eq!(topo.stop_all(), 2);

    let before = topo.snapshot();
    run_for(secs(5)).await;
    let after = topo.snapshot();

    assert_eq!(after.node("G").unwrap().production_count, 3);
    assert_eq!(after.node("S").unwrap().quantity("wood"), 3);
    assert_eq!(before.nodes, after.nodes);
    assert!(!topo.channel("G->S").unwrap().is_running());
}

#[tokio::test(start_paused = true)]
async fn restart_resumes_production() {
    let mut topo = generator_to_storage();
    topo.start_all().unwrap();
    run_for(millis(1500)).await;
    topo.stop_all();
    run_for(secs(3)).await;
    assert_eq!(topo.snapshot().node("G").unwrap().production_count, 2);

    topo.start_all().unwrap();
    run_for(millis(1500)).await;
    let snap = topo.snapshot();
    assert_eq!(snap.node("G").unwrap().production_count, 4);
    assert_eq!(snap.node("S").unwrap().quantity("wood"), 4);
}

// ===========================================================================
// Production
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn starved_production_changes_nothing() {
    let mut topo = topology();
    topo.create_production("P", "plank", wood_recipe(2), secs(1))
        .unwrap();
    topo.seed_stock("P", "wood", 1).unwrap();
    let mut starved = topo.events().subscribe_to(&[EventKind::ProductionStarved]);

    assert_eq!(topo.start("P").unwrap(), 1);
    run_for(millis(1500)).await;

    let snap = topo.snapshot();
    let p = snap.node("P").unwrap();
    assert_eq!(p.production_count, 0);
    assert_eq!(p.quantity("wood"), 1);
    assert_eq!(p.quantity("plank"), 0);

    let events = starved.drain();
    assert_eq!(events.len(), 2);
    match &events[0] {
        Event::ProductionStarved { node, missing, .. } => {
            assert_eq!(node, "P");
            assert_eq!(missing, &vec![("wood".to_string(), 1)]);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn zero_interval_starved_production_lets_time_pass() {
    let mut topo = topology();
    topo.create_production("P", "plank", wood_recipe(2), Duration::ZERO)
        .unwrap();
    let mut starved = topo.events().subscribe_to(&[EventKind::ProductionStarved]);
    topo.start("P").unwrap();

    assert!(tokio::time::timeout(secs(5), run_for(millis(550))).await.is_ok());
    assert_eq!(starved.drain().len(), 6);

    topo.seed_stock("P", "wood", 2).unwrap();
    run_for(millis(100)).await;
    let snap = topo.snapshot();
    assert_eq!(snap.node("P").unwrap().production_count, 1);
    assert_eq!(snap.node("P").unwrap().quantity("plank"), 1);
}

#[tokio::test(start_paused = true)]
async fn seeded_production_builds_after_interval() {
    let mut topo = topology();
    topo.create_production("P", "plank", wood_recipe(2), secs(1))
        .unwrap();
    topo.seed_stock("P", "wood", 5).unwrap();
    topo.start("P").unwrap();

    run_for(millis(500)).await;
    let p = topo.snapshot().node("P").unwrap().clone();
    // Inputs are gone at batch start; the output appears after the interval.
    assert_eq!(p.quantity("wood"), 3);
    assert_eq!(p.quantity("plank"), 0);

    run_for(secs(2)).await;
    let p = topo.snapshot().node("P").unwrap().clone();
    assert_eq!(p.production_count, 2);
    assert_eq!(p.quantity("plank"), 2);
    assert_eq!(p.quantity("wood"), 1);
}

#[tokio::test(start_paused = true)]
async fn plank_chain_conserves_resources() {
    let mut topo = plank_chain();
    let mut consumed = topo.events().subscribe_to(&[EventKind::ResourcesConsumed]);
    topo.start_all().unwrap();

    run_for(millis(6500)).await;

    let snap = topo.snapshot();
    let batches = consumed.drain().len();
    let wood_made = snap.node("G").unwrap().production_count as usize;
    let planks_made = snap.node("P").unwrap().production_count as usize;

    assert_eq!(wood_made, 7);
    assert_eq!(wood_made, snap.count_of("wood") + 2 * batches);
    assert_eq!(planks_made, snap.count_of("plank"));
    assert!(snap.node("S").unwrap().quantity("plank") >= 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn settled_snapshot_is_exact_on_multi_thread_runtime() {
    let mut topo = topology();
    topo.create_generator("G", "wood", millis(10)).unwrap();
    topo.create_production("P", "plank", wood_recipe(2), millis(10))
        .unwrap();
    topo.create_storage("S", "plank").unwrap();
    topo.connect("G", "P").unwrap();
    topo.connect("P", "S").unwrap();
    let mut consumed = topo.events().subscribe_to(&[EventKind::ResourcesConsumed]);

    topo.start_all().unwrap();
    run_for(millis(200)).await;
    topo.stop_all();
    // Finish in-flight builds and drain the channels.
    run_for(millis(300)).await;

    let snap = topo.snapshot();
    assert_eq!(snap.nodes, topo.snapshot().nodes);
    let batches = consumed.drain().len();
    let wood_made = snap.node("G").unwrap().production_count as usize;
    let planks_made = snap.node("P").unwrap().production_count as usize;
    assert!(wood_made > 0);
    assert_eq!(wood_made, snap.count_of("wood") + 2 * batches);
    assert_eq!(planks_made, snap.count_of("plank"));
    assert_eq!(snap.total_resources(), snap.count_of("wood") + snap.count_of("plank"));
}

// ===========================================================================
// Channels
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn latency_delays_delivery() {
    let mut topo = topology();
    topo.create_generator("G", "wood", secs(1)).unwrap();
    topo.create_storage("S", "wood").unwrap();
    topo.connect_with("G", "S", ChannelSpec::new(10, millis(1200)))
        .unwrap();
    topo.start_all().unwrap();

    run_for(millis(2500)).await;

    let snap = topo.snapshot();
    assert_eq!(snap.node("S").unwrap().quantity("wood"), 2);
    assert_eq!(snap.channel("G->S").unwrap().in_transit, 1);
    assert_eq!(snap.total_resources(), 3);
}

#[tokio::test(start_paused = true)]
async fn full_channel_leaves_surplus_at_producer() {
    let mut topo = topology();
    topo.create_generator("G", "wood", secs(1)).unwrap();
    topo.create_storage("S", "wood").unwrap();
    topo.connect_with("G", "S", ChannelSpec::new(1, millis(2500)))
        .unwrap();
    let mut full = topo.events().subscribe_to(&[EventKind::ChannelFull]);
    topo.start_all().unwrap();

    run_for(millis(5500)).await;

    let snap = topo.snapshot();
    assert_eq!(snap.node("G").unwrap().production_count, 6);
    assert_eq!(snap.node("S").unwrap().quantity("wood"), 2);
    assert_eq!(snap.channel("G->S").unwrap().in_transit, 1);
    assert_eq!(snap.node("G").unwrap().quantity("wood"), 3);
    assert!(!full.drain().is_empty());
}

#[tokio::test(start_paused = true)]
async fn stopping_channel_alone_backs_up_producer() {
    let mut topo = generator_to_storage();
    topo.start_all().unwrap();
    run_for(millis(1500)).await;
    assert_eq!(topo.stop("G->S").unwrap(), 1);

    run_for(secs(2)).await;
    let snap = topo.snapshot();
    assert_eq!(snap.node("S").unwrap().quantity("wood"), 2);
    assert_eq!(snap.node("G").unwrap().quantity("wood"), 2);
    assert!(snap.node("G").unwrap().active);
    assert!(!snap.channel("G->S").unwrap().active);
}

// ===========================================================================
// Topology rules
// ===========================================================================

#[test]
fn second_input_of_same_type_rejected() {
    let mut topo = topology();
    topo.create_generator("G1", "wood", secs(1)).unwrap();
    topo.create_generator("G2", "wood", secs(1)).unwrap();
    topo.create_production("P", "plank", wood_recipe(2), secs(1))
        .unwrap();
    topo.connect("G1", "P").unwrap();

    let before = topo.snapshot();
    let err = topo.connect("G2", "P").unwrap_err();
    assert!(matches!(
        err,
        FlowError::InvalidTopology(TopologyRule::InputAlreadySupplied { ref existing, .. })
            if existing.as_str() == "G1->P"
    ));
    let after = topo.snapshot();
    assert_eq!(after.nodes, before.nodes);
    assert_eq!(after.channels, before.channels);
}

#[test]
fn production_input_must_be_in_recipe() {
    let mut topo = topology();
    topo.create_generator("G", "stone", secs(1)).unwrap();
    topo.create_production("P", "plank", wood_recipe(2), secs(1))
        .unwrap();
    assert!(matches!(
        topo.connect("G", "P"),
        Err(FlowError::InvalidTopology(TopologyRule::RecipeDoesNotRequire { .. }))
    ));
}

#[test]
fn storage_type_mismatch_creates_no_channel() {
    let mut topo = topology();
    topo.create_generator("G", "wood", secs(1)).unwrap();
    topo.create_storage("S", "stone").unwrap();

    assert!(matches!(
        topo.connect("G", "S"),
        Err(FlowError::InvalidTopology(TopologyRule::StorageTypeMismatch { .. }))
    ));
    assert!(topo.channel_ids().is_empty());
    assert!(topo.snapshot().node("G").unwrap().outputs.is_empty());
}

#[test]
fn storage_accepts_only_one_input() {
    let mut topo = generator_to_storage();
    topo.create_generator("G2", "wood", secs(1)).unwrap();
    assert!(matches!(
        topo.connect("G2", "S"),
        Err(FlowError::InvalidTopology(TopologyRule::StorageAlreadyConnected { .. }))
    ));
}

#[test]
fn duplicate_channel_rejected() {
    let mut topo = plank_chain();
    assert!(matches!(
        topo.connect("G", "P"),
        Err(FlowError::InvalidTopology(TopologyRule::ChannelExists(_)))
    ));
    assert_eq!(topo.channel_ids().len(), 2);
}

#[test]
fn production_may_fan_out() {
    let mut topo = plank_chain();
    topo.create_storage("S2", "plank").unwrap();
    topo.connect("P", "S2").unwrap();
    assert_eq!(topo.snapshot().node("P").unwrap().outputs.len(), 2);
}

// ===========================================================================
// Lifecycle
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn start_and_stop_are_idempotent() {
    let mut topo = generator_to_storage();

    assert_eq!(topo.start("G").unwrap(), 1);
    assert_eq!(topo.start("G").unwrap(), 0);
    // Storage nodes have no task.
    assert_eq!(topo.start("S").unwrap(), 0);
    assert_eq!(topo.start("channels").unwrap(), 1);
    assert_eq!(topo.start(Target::All).unwrap(), 0);

    assert_eq!(topo.stop("nodes").unwrap(), 1);
    assert_eq!(topo.stop("nodes").unwrap(), 0);
    assert_eq!(topo.stop_by_name("G->S").unwrap(), 1);
    assert_eq!(topo.stop_all(), 0);
}

#[tokio::test(start_paused = true)]
async fn unknown_target_is_an_error() {
    let mut topo = generator_to_storage();
    assert_eq!(
        topo.start("X"),
        Err(FlowError::TargetNotFound("X".into()))
    );
    assert_eq!(
        topo.start_by_name("S->G"),
        Err(FlowError::TargetNotFound("S->G".into()))
    );
    assert!(!topo.snapshot().node("G").unwrap().active);
}

#[tokio::test(start_paused = true)]
async fn delete_stops_node_and_removes_channels() {
    let mut topo = generator_to_storage();
    let mut events = topo.subscribe();
    topo.start_all().unwrap();
    run_for(millis(2500)).await;

    topo.delete_by_name("G").unwrap();
    run_for(secs(5)).await;

    let snap = topo.snapshot();
    assert!(snap.node("G").is_none());
    assert!(snap.channels.is_empty());
    assert!(snap.node("S").unwrap().inputs.is_empty());
    assert_eq!(snap.node("S").unwrap().quantity("wood"), 3);
    assert_eq!(topo.node_names(), vec!["S"]);

    let kinds: Vec<EventKind> = events.drain().iter().map(Event::kind).collect();
    let tail = &kinds[kinds.len() - 2..];
    assert_eq!(tail, &[EventKind::ChannelRemoved, EventKind::NodeDeleted]);

    // The name is free again.
    topo.create_generator("G", "wood", secs(1)).unwrap();
}

#[tokio::test(start_paused = true)]
async fn shutdown_halts_everything() {
    let mut topo = plank_chain();
    topo.seed_stock("P", "wood", 4).unwrap();
    topo.start_all().unwrap();
    run_for(millis(2500)).await;

    topo.shutdown();
    let before = topo.snapshot();
    run_for(secs(5)).await;
    let after = topo.snapshot();

    assert!(after.nodes.iter().all(|n| !n.active));
    assert!(after.channels.iter().all(|c| !c.active));
    assert_eq!(before.nodes, after.nodes);
    assert_eq!(before.channels, after.channels);
}

#[tokio::test(start_paused = true)]
async fn produced_events_are_time_ordered() {
    let mut topo = generator_to_storage();
    let mut produced = topo.events().subscribe_to(&[EventKind::ResourceProduced]);
    topo.start("G").unwrap();
    run_for(millis(2500)).await;

    let events = produced.drain();
    assert_eq!(events.len(), 3);
    assert!(events.windows(2).all(|w| w[0].at() < w[1].at()));
}

#[tokio::test(start_paused = true)]
async fn snapshot_serializes_to_json() {
    let mut topo = plank_chain();
    topo.start_all().unwrap();
    run_for(millis(1500)).await;

    let json = serde_json::to_value(topo.snapshot()).unwrap();
    assert_eq!(json["nodes"].as_array().unwrap().len(), 3);
    assert_eq!(json["channels"][0]["id"], "G->P");
    assert_eq!(json["nodes"][1]["kind"], "production");
    assert_eq!(json["nodes"][1]["recipe"]["wood"], 2);
}
