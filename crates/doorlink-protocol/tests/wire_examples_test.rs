//! Reference frames exchanged between real nodes and the master.

use doorlink_core::{DeviceKind, Error, NodeUid};
use doorlink_protocol::{BinaryFrame, BinaryPacket, Envelope, Message, binary, text};

#[test]
fn test_card_read_reference_frame() {
    let bytes = [0x81, 0x06, 0x02, 0x1A, 0x00, 0x00, 0x03, 0xE8, 0x74];

    let msg = binary::decode_bytes(&bytes).unwrap().unwrap();

    assert_eq!(
        msg,
        Message::CardRead {
            reader_id: 2,
            bits: 26,
            code: 1000
        }
    );
}

#[test]
fn test_heartbeat_reference_line() {
    let line = "<{\"type\":\"heartbeat\",\"hub_addr\":1}>|48\n";

    let envelope = text::decode_line(line).unwrap();

    assert_eq!(envelope, Envelope::new(1, Message::Heartbeat));
}

#[test]
fn test_heartbeat_flipped_digit_rejected() {
    for flipped in ["|49", "|58", "|4A", "|08"] {
        let line = format!("<{{\"type\":\"heartbeat\",\"hub_addr\":1}}>{flipped}\n");
        assert!(
            matches!(text::decode_line(&line), Err(Error::ChecksumMismatch { .. })),
            "{line} should be rejected"
        );
    }
}

#[test]
fn test_discovery_exchange() {
    // Master probes the unconfigured address.
    let probe = binary::encode_to_bytes(&Message::Identify).unwrap();
    assert_eq!(&probe[..], &[0x01, 0x00, 0x01]);

    // Node answers with its identity.
    let response = binary::encode_to_bytes(&Message::IdentifyResponse {
        uid: NodeUid::new("AABBCCDD").unwrap(),
        device_kind: DeviceKind::Esp32,
        address: 0x08,
        reader_count: 1,
    })
    .unwrap();

    let BinaryPacket::Frame(frame) = BinaryFrame::parse(&response).unwrap() else {
        panic!("identity response must be a frame");
    };
    match binary::decode(&frame).unwrap() {
        Message::IdentifyResponse { uid, address, .. } => {
            assert_eq!(uid.as_str(), "AABBCCDD");
            assert_eq!(address, 0x08);
        }
        other => panic!("unexpected {other:?}"),
    }

    // Master assigns address 5.
    let assign = binary::encode_to_bytes(&Message::SetAddress {
        new_addr: 5,
        target_uid: None,
    })
    .unwrap();
    assert_eq!(&assign[..], &[0x02, 0x01, 0x05, 0x06]);
}

#[test]
fn test_idle_filler_reads_as_nothing() {
    assert_eq!(binary::decode_bytes(&[0x00]).unwrap(), None);
}
