//! Text node behaviour over an in-memory serial link.

use doorlink_core::{AckStatus, DeviceKind, NodeUid};
use doorlink_hardware::mock::{MockInputs, MockOutputs, MockOutputsHandle};
use doorlink_hardware::{OutputLine, ReaderBank};
use doorlink_node::{NodeConfig, NodeExit, NodeHardware, NodeSettings, Result, TextNode};
use doorlink_protocol::{Envelope, Message, TextCodec};
use futures::{SinkExt, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;

const HARDWARE_ID: [u8; 4] = [0xAA, 0xBB, 0xCC, 0xDD];

struct Link {
    master: Framed<DuplexStream, TextCodec>,
    node: JoinHandle<Result<NodeExit>>,
    outputs: MockOutputsHandle,
}

fn start(hub_address: u8, config_path: &Path) -> Link {
    let config = NodeConfig {
        hub_address,
        doors: vec![
            doorlink_node::DoorConfig::consecutive(1, 2),
            doorlink_node::DoorConfig::consecutive(2, 9),
        ],
        ..NodeConfig::default()
    };
    let readers = config.reader_ids();
    let (outputs, outputs_handle) = MockOutputs::new(readers.clone());
    let (inputs, _) = MockInputs::new(readers.clone());
    let hardware = NodeHardware::new(Arc::new(ReaderBank::new(readers)), outputs, inputs);

    let node = TextNode::from_config(
        config,
        config_path,
        &HARDWARE_ID,
        hardware,
        NodeSettings::default(),
    )
    .unwrap();

    let (master_io, node_io) = tokio::io::duplex(4096);
    Link {
        master: Framed::new(master_io, TextCodec::new()),
        node: tokio::spawn(node.run(node_io)),
        outputs: outputs_handle,
    }
}

async fn recv(master: &mut Framed<DuplexStream, TextCodec>) -> Envelope {
    master.next().await.unwrap().unwrap().unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_identify_while_unconfigured() {
    let dir = TempDir::new().unwrap();
    let mut link = start(0, &dir.path().join("config.json"));

    link.master.send(Envelope::new(0, Message::Identify)).await.unwrap();

    let reply = recv(&mut link.master).await;
    assert_eq!(reply.hub_addr, 0);
    assert_eq!(
        reply.message,
        Message::IdentifyResponse {
            uid: NodeUid::new("AABBCCDD").unwrap(),
            device_kind: DeviceKind::Rp2040,
            address: 0,
            reader_count: 2,
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_targeted_set_address_persists_and_restarts() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    let mut link = start(0, &path);

    let other = Message::SetAddress {
        new_addr: 9,
        target_uid: Some(NodeUid::new("11223344").unwrap()),
    };
    link.master.send(Envelope::new(0, other)).await.unwrap();

    let mine = Message::SetAddress {
        new_addr: 3,
        target_uid: Some(NodeUid::new("AABBCCDD").unwrap()),
    };
    link.master.send(Envelope::new(0, mine)).await.unwrap();

    let ack = recv(&mut link.master).await;
    assert_eq!(
        ack.message,
        Message::AddressAck { status: AckStatus::Success, address: 3 }
    );
    assert_eq!(NodeConfig::load(&path).unwrap().hub_address, 3);

    let exit = link.node.await.unwrap().unwrap();
    assert_eq!(exit, NodeExit::Restart { address: 3 });
}

#[tokio::test(start_paused = true)]
async fn test_commands_for_other_hubs_ignored() {
    let dir = TempDir::new().unwrap();
    let mut link = start(3, &dir.path().join("config.json"));

    // Initial contact reports from both doors.
    for _ in 0..2 {
        let envelope = recv(&mut link.master).await;
        assert_eq!(envelope.hub_addr, 3);
        assert!(matches!(envelope.message, Message::DoorContact { .. }));
    }

    link.master.send(Envelope::new(4, Message::grant(1))).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(link.outputs.changes().is_empty());

    link.master.send(Envelope::new(3, Message::grant(1))).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(link.outputs.is_on(1, OutputLine::GreenLed));
}

#[tokio::test(start_paused = true)]
async fn test_line_noise_does_not_break_link() {
    let dir = TempDir::new().unwrap();
    let mut link = start(0, &dir.path().join("config.json"));

    link.master
        .get_mut()
        .write_all(b"garbage\n<{\"type\":\"command\",\"cmd\":\"identify\"}>|00\n")
        .await
        .unwrap();
    link.master.send(Envelope::new(0, Message::Identify)).await.unwrap();

    let reply = recv(&mut link.master).await;
    assert!(matches!(reply.message, Message::IdentifyResponse { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_link_closed_ends_run() {
    let dir = TempDir::new().unwrap();
    let link = start(0, &dir.path().join("config.json"));

    drop(link.master);
    let exit = link.node.await.unwrap().unwrap();
    assert_eq!(exit, NodeExit::Disconnected);
}
