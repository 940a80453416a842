//! Serial monitor talking to a text node over an in-memory link.

use doorlink_core::{AckStatus, NodeUid};
use doorlink_emulator::link;
use doorlink_hardware::mock::{MockInputs, MockOutputs};
use doorlink_hardware::{OutputLine, ReaderBank};
use doorlink_node::{NodeConfig, NodeExit, NodeHardware, NodeSettings, TextNode};
use doorlink_protocol::Message;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn text_node(hub_address: u8, dir: &TempDir) -> (TextNode, doorlink_hardware::mock::MockOutputsHandle) {
    let config = NodeConfig {
        hub_address,
        unique_id_override: Some("AABBCCDD".into()),
        ..NodeConfig::default()
    };
    let readers = config.reader_ids();
    let (outputs, handle) = MockOutputs::new(readers.clone());
    let (inputs, _) = MockInputs::new(readers.clone());
    let hardware = NodeHardware::new(Arc::new(ReaderBank::new(readers)), outputs, inputs);
    let node = TextNode::from_config(
        config,
        dir.path().join("config.json"),
        &[0x01],
        hardware,
        NodeSettings::default(),
    )
    .unwrap();
    (node, handle)
}

#[tokio::test(start_paused = true)]
async fn test_monitor_addresses_a_text_node() {
    let dir = TempDir::new().unwrap();
    let (node, _) = text_node(0, &dir);
    let (task, mut monitor) = link::connect(node);

    monitor.identify(0).await.unwrap();
    let reply = monitor.next_envelope().await.unwrap().unwrap();
    assert!(matches!(
        reply.message,
        Message::IdentifyResponse { ref uid, reader_count: 4, .. } if uid.as_str() == "AABBCCDD"
    ));
    assert_eq!(
        monitor.hub(0).unwrap().uid,
        Some(NodeUid::new("AABBCCDD").unwrap())
    );

    monitor
        .set_address(0, 7, Some(NodeUid::new("AABBCCDD").unwrap()))
        .await
        .unwrap();
    let ack = monitor.next_envelope().await.unwrap().unwrap();
    assert_eq!(
        ack.message,
        Message::AddressAck {
            status: AckStatus::Success,
            address: 7
        }
    );

    assert_eq!(task.await.unwrap().unwrap(), NodeExit::Restart { address: 7 });
    let saved = NodeConfig::load(dir.path().join("config.json")).unwrap();
    assert_eq!(saved.hub_address, 7);
}

#[tokio::test(start_paused = true)]
async fn test_monitor_sees_events_and_drives_feedback() {
    let dir = TempDir::new().unwrap();
    let (node, outputs) = text_node(2, &dir);
    let (task, mut monitor) = link::connect(node);

    // Initial contact state of every door.
    for _ in 0..4 {
        let envelope = monitor.next_envelope().await.unwrap().unwrap();
        assert_eq!(envelope.hub_addr, 2);
        assert!(matches!(envelope.message, Message::DoorContact { .. }));
    }

    monitor.deny(2, 1).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(outputs.is_on(1, OutputLine::RedLed));

    tokio::time::sleep(Duration::from_secs(30)).await;
    let envelope = monitor.next_envelope().await.unwrap().unwrap();
    assert_eq!(envelope.message, Message::Heartbeat);
    assert!(monitor.stale_hubs(Duration::from_secs(45)).is_empty());

    drop(monitor);
    assert_eq!(task.await.unwrap().unwrap(), NodeExit::Disconnected);
}
