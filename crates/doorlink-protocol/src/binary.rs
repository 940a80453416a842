//! Compact binary encoding used on the addressed bus.
//!
//! Every message is one [`BinaryFrame`]: a type tag, a field-length byte,
//! big-endian fields, and the XOR trailer. The node answers a read with either
//! one frame or the single [`IDLE_FILLER`] byte.
//!
//! # Field Layouts
//!
//! | Message | Tag | Fields |
//! |---|---|---|
//! | `Identify` | `0x01` | none |
//! | `SetAddress` | `0x02` | `new_addr` |
//! | `IdentifyResponse` | `0x41` | `uid_len`, `uid…`, `kind`, `address`, `readers` |
//! | `AddressAck` | `0x42` | `status`, `address` |
//! | `CardRead` | `0x81` | `reader_id`, `bits`, `code: u32` |
//! | `Heartbeat` | `0x82` | none |
//! | `RexEvent` | `0x83` | `reader_id` |
//! | `DoorContact` | `0x84` | `reader_id`, `state` |
//! | grant / deny | `0x10` / `0x11` | `reader_id` |
//!
//! # Examples
//!
//! ```
//! use doorlink_protocol::{Message, binary};
//!
//! let bytes = [0x81, 0x06, 0x02, 0x1A, 0x00, 0x00, 0x03, 0xE8, 0x74];
//! let msg = binary::decode_bytes(&bytes).unwrap();
//! assert_eq!(msg, Some(Message::CardRead { reader_id: 2, code: 1000, bits: 26 }));
//!
//! assert_eq!(&binary::encode_to_bytes(&msg.unwrap()).unwrap()[..], &bytes[..]);
//! ```
//!
//! [`IDLE_FILLER`]: doorlink_core::constants::IDLE_FILLER

use bytes::{BufMut, Bytes, BytesMut};
use doorlink_core::{
    AckStatus, DeviceKind, DoorState, Error, FeedbackKind, NodeUid, Result, constants::*,
};

use crate::frame::{BinaryFrame, BinaryPacket};
use crate::message::Message;

const FORMAT: &str = "binary";

/// Encode a message into a binary frame.
///
/// # Errors
/// - `Error::Unrepresentable` for a `CardRead` code above `u32::MAX` or a
///   `SetAddress` that names a target UID
/// - `Error::FrameTooLarge` if the fields exceed the length byte
pub fn encode(message: &Message) -> Result<BinaryFrame> {
    let mut fields = BytesMut::new();

    let tag = match message {
        Message::Identify => TAG_IDENTIFY,
        Message::SetAddress {
            new_addr,
            target_uid,
        } => {
            if target_uid.is_some() {
                return Err(Error::Unrepresentable {
                    format: FORMAT,
                    reason: "set_address cannot carry a target uid".to_string(),
                });
            }
            fields.put_u8(*new_addr);
            TAG_SET_ADDRESS
        }
        Message::IdentifyResponse {
            uid,
            device_kind,
            address,
            reader_count,
        } => {
            let uid = uid.as_str().as_bytes();
            fields.put_u8(uid.len() as u8);
            fields.put_slice(uid);
            fields.put_u8(device_kind.code());
            fields.put_u8(*address);
            fields.put_u8(*reader_count);
            TAG_IDENTIFY_RESPONSE
        }
        Message::AddressAck { status, address } => {
            fields.put_u8(status.to_u8());
            fields.put_u8(*address);
            TAG_ADDRESS_ACK
        }
        Message::CardRead {
            reader_id,
            code,
            bits,
        } => {
            let code = u32::try_from(*code).map_err(|_| Error::Unrepresentable {
                format: FORMAT,
                reason: format!("card code {code} does not fit 32 bits"),
            })?;
            fields.put_u8(*reader_id);
            fields.put_u8(*bits);
            fields.put_u32(code);
            TAG_CARD_READ
        }
        Message::Heartbeat => TAG_HEARTBEAT,
        Message::RexEvent { reader_id } => {
            fields.put_u8(*reader_id);
            TAG_REX
        }
        Message::DoorContact { reader_id, state } => {
            fields.put_u8(*reader_id);
            fields.put_u8(state.to_u8());
            TAG_DOOR_CONTACT
        }
        Message::FeedbackCommand { reader_id, kind } => {
            fields.put_u8(*reader_id);
            match kind {
                FeedbackKind::Grant => TAG_FEEDBACK_GRANT,
                FeedbackKind::Deny => TAG_FEEDBACK_DENY,
            }
        }
    };

    BinaryFrame::new(tag, &fields)
}

/// Encode a message straight to wire bytes.
///
/// # Errors
/// Same as [`encode`].
pub fn encode_to_bytes(message: &Message) -> Result<Bytes> {
    encode(message).map(|frame| frame.to_bytes())
}

/// Interpret a verified frame as a message.
///
/// # Errors
/// - `Error::UnknownMessageType` for an unassigned tag
/// - `Error::InvalidField` when the fields do not match the tag's layout
pub fn decode(frame: &BinaryFrame) -> Result<Message> {
    let fields = frame.fields();

    match frame.tag() {
        TAG_IDENTIFY => {
            expect_len(fields, 0)?;
            Ok(Message::Identify)
        }
        TAG_SET_ADDRESS => {
            expect_len(fields, 1)?;
            Ok(Message::SetAddress {
                new_addr: fields[0],
                target_uid: None,
            })
        }
        TAG_IDENTIFY_RESPONSE => decode_identify_response(fields),
        TAG_ADDRESS_ACK => {
            expect_len(fields, 2)?;
            Ok(Message::AddressAck {
                status: AckStatus::from_u8(fields[0]),
                address: fields[1],
            })
        }
        TAG_CARD_READ => {
            expect_len(fields, 6)?;
            let code = u32::from_be_bytes([fields[2], fields[3], fields[4], fields[5]]);
            Ok(Message::CardRead {
                reader_id: fields[0],
                bits: fields[1],
                code: u64::from(code),
            })
        }
        TAG_HEARTBEAT => {
            expect_len(fields, 0)?;
            Ok(Message::Heartbeat)
        }
        TAG_REX => {
            expect_len(fields, 1)?;
            Ok(Message::RexEvent {
                reader_id: fields[0],
            })
        }
        TAG_DOOR_CONTACT => {
            expect_len(fields, 2)?;
            Ok(Message::DoorContact {
                reader_id: fields[0],
                state: DoorState::from_u8(fields[1])?,
            })
        }
        TAG_FEEDBACK_GRANT | TAG_FEEDBACK_DENY => {
            expect_len(fields, 1)?;
            let kind = if frame.tag() == TAG_FEEDBACK_GRANT {
                FeedbackKind::Grant
            } else {
                FeedbackKind::Deny
            };
            Ok(Message::FeedbackCommand {
                reader_id: fields[0],
                kind,
            })
        }
        other => Err(Error::UnknownMessageType(format!("0x{other:02X}"))),
    }
}

/// Parse and interpret one transaction's bytes.
///
/// Returns `Ok(None)` for the idle filler.
///
/// # Errors
/// Any framing error from [`BinaryFrame::parse`] or message error from [`decode`].
pub fn decode_bytes(data: &[u8]) -> Result<Option<Message>> {
    match BinaryFrame::parse(data)? {
        BinaryPacket::Idle => Ok(None),
        BinaryPacket::Frame(frame) => decode(&frame).map(Some),
    }
}

fn decode_identify_response(fields: &[u8]) -> Result<Message> {
    let Some((&uid_len, rest)) = fields.split_first() else {
        return Err(Error::invalid_field("uid_len", "missing"));
    };
    let uid_len = uid_len as usize;
    if rest.len() != uid_len + 3 {
        return Err(Error::invalid_field(
            "identify_response",
            format!(
                "uid length {uid_len} needs {} field bytes, got {}",
                uid_len + 4,
                fields.len()
            ),
        ));
    }

    let (uid, tail) = rest.split_at(uid_len);
    let uid = std::str::from_utf8(uid).map_err(|_| Error::invalid_field("uid", "not ASCII"))?;

    Ok(Message::IdentifyResponse {
        uid: NodeUid::new(uid)?,
        device_kind: DeviceKind::from_code(tail[0])?,
        address: tail[1],
        reader_count: tail[2],
    })
}

fn expect_len(fields: &[u8], expected: usize) -> Result<()> {
    if fields.len() == expected {
        Ok(())
    } else {
        Err(Error::invalid_field(
            "fields",
            format!("expected {expected} bytes, got {}", fields.len()),
        ))
    }
}
