//! Master and emulated binary nodes on one simulated bus.

use doorlink_core::{DoorState, FeedbackKind, NodeUid};
use doorlink_emulator::{SimulatedBus, Simulation, simulation::DEFAULT_READERS};
use doorlink_hardware::OutputLine;
use doorlink_master::{
    AccessPolicy, GrantAll, MasterConfig, MasterEngine, MasterEvent, NodeStatus, OfflineReason,
    SlaveConfig,
};
use std::time::Duration;
use tokio::sync::mpsc;

fn uid(s: &str) -> NodeUid {
    NodeUid::new(s).unwrap()
}

fn config() -> MasterConfig {
    MasterConfig {
        slaves: vec![SlaveConfig::new(uid("AABBCCDD"), 5, "Front door")],
        ..MasterConfig::default()
    }
}

async fn run_for<P: AccessPolicy>(engine: &mut MasterEngine<SimulatedBus, P>, secs: u64) {
    let _ = tokio::time::timeout(Duration::from_secs(secs), engine.run()).await;
}

fn drain(events: &mut mpsc::Receiver<MasterEvent>) -> Vec<MasterEvent> {
    std::iter::from_fn(|| events.try_recv().ok()).collect()
}

#[tokio::test(start_paused = true)]
async fn test_node_is_addressed_and_comes_online() {
    let sim = Simulation::start(config(), DEFAULT_READERS);
    let (mut engine, mut events) = sim.master(GrantAll);

    run_for(&mut engine, 4).await;
    assert_eq!(engine.registry().status(5), Some(NodeStatus::Unknown));
    assert_eq!(sim.bus().addresses(), vec![0x08]);

    run_for(&mut engine, 4).await;
    let node = sim.node(&uid("AABBCCDD")).unwrap();
    assert_eq!(node.stored_address(), Some(5));
    assert_eq!(sim.bus().addresses(), vec![5]);
    assert_eq!(engine.registry().status(5), Some(NodeStatus::Online));

    let events = drain(&mut events);
    assert!(events.contains(&MasterEvent::AddressAssigned {
        uid: uid("AABBCCDD"),
        address: 5
    }));
    assert!(events.contains(&MasterEvent::NodeOnline { address: 5 }));
    // A freshly configured node reports every door once.
    assert!(events.contains(&MasterEvent::DoorContact {
        address: 5,
        reader_id: 4,
        state: DoorState::Closed
    }));

    sim.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_card_read_is_granted_end_to_end() {
    let sim = Simulation::start(config(), DEFAULT_READERS);
    let (mut engine, mut events) = sim.master(GrantAll);
    run_for(&mut engine, 8).await;
    drain(&mut events);

    let node = sim.node(&uid("AABBCCDD")).unwrap().clone();
    let reader = node.reader(2);
    tokio::spawn(async move { reader.present_card_26(0, 1000).await });
    run_for(&mut engine, 2).await;

    let events = drain(&mut events);
    assert!(events.iter().any(|event| matches!(
        event,
        MasterEvent::CardRead {
            address: 5,
            reader_id: 2,
            bits: 26,
            decision: FeedbackKind::Grant,
            ..
        }
    )));
    let green = node
        .outputs()
        .changes_for(2)
        .into_iter()
        .any(|change| change.line == OutputLine::GreenLed && change.on);
    assert!(green);

    sim.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_exit_request_is_granted() {
    let sim = Simulation::start(config(), DEFAULT_READERS);
    let (mut engine, mut events) = sim.master(GrantAll);
    run_for(&mut engine, 8).await;
    drain(&mut events);

    let node = sim.node(&uid("AABBCCDD")).unwrap();
    node.inputs().press_rex(3, true);
    run_for(&mut engine, 1).await;

    assert!(drain(&mut events).contains(&MasterEvent::Rex {
        address: 5,
        reader_id: 3,
        decision: FeedbackKind::Grant
    }));
    sim.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_unknown_node_is_reported_and_left_alone() {
    let sim = Simulation::start_with_uids(config(), [uid("DEADBEEF")], DEFAULT_READERS);
    let (mut engine, mut events) = sim.master(GrantAll);
    run_for(&mut engine, 7).await;

    assert!(drain(&mut events).contains(&MasterEvent::UnknownNode {
        uid: uid("DEADBEEF")
    }));
    assert_eq!(sim.node(&uid("DEADBEEF")).unwrap().stored_address(), None);
    assert_eq!(sim.bus().addresses(), vec![0x08]);
    sim.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_lost_node_goes_offline_and_recovers() {
    let sim = Simulation::start(config(), DEFAULT_READERS);
    let (mut engine, mut events) = sim.master(GrantAll);
    run_for(&mut engine, 8).await;
    drain(&mut events);

    sim.bus().set_fault(5, true);
    run_for(&mut engine, 1).await;
    assert_eq!(engine.registry().status(5), Some(NodeStatus::Offline));
    assert!(drain(&mut events).contains(&MasterEvent::NodeOffline {
        address: 5,
        reason: OfflineReason::PollFailures(3)
    }));

    sim.bus().set_fault(5, false);
    run_for(&mut engine, 1).await;
    assert_eq!(engine.registry().status(5), Some(NodeStatus::Online));
    sim.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_heartbeats_reach_the_master() {
    let sim = Simulation::start(config(), DEFAULT_READERS);
    let (mut engine, mut events) = sim.master(GrantAll);
    run_for(&mut engine, 40).await;

    assert!(drain(&mut events).contains(&MasterEvent::Heartbeat { address: 5 }));
    assert_eq!(engine.registry().status(5), Some(NodeStatus::Online));
    sim.shutdown().await;
}
