//! JSON text encoding used on serial links.
//!
//! Each line carries one [`Envelope`] serialized as compact JSON inside the
//! `<…>|HH` frame. The `type` key selects the variant; commands share
//! `type: "command"` and are told apart by `cmd`.
//!
//! ```text
//! <{"type":"card_read","hub_addr":1,"rdr_id":2,"card":1000,"bits":26}>|XX
//! <{"type":"command","hub_addr":1,"cmd":"feedback_grant","rdr_id":2}>|XX
//! <{"type":"rp2040","hub_addr":0,"uid":"E6614103E7","readers":4}>|XX
//! ```
//!
//! `addr` is accepted as an alias of `hub_addr` on decode. Identify and
//! set-address commands may omit the address entirely; they default to the
//! unconfigured hub address.

use doorlink_core::{
    AckStatus, DeviceKind, DoorState, Error, FeedbackKind, NodeUid, Result, constants::*,
};
use serde::{Deserialize, Serialize};

use crate::frame::TextFrame;
use crate::message::{Envelope, Message};

const TYPE_CARD_READ: &str = "card_read";
const TYPE_HEARTBEAT: &str = "heartbeat";
const TYPE_REX: &str = "event_rex";
const TYPE_DOOR_CONTACT: &str = "event_door_contact";
const TYPE_COMMAND: &str = "command";
const TYPE_ACK: &str = "ack_set_address";

const CMD_IDENTIFY: &str = "identify";
const CMD_SET_ADDRESS: &str = "set_address";

/// Flat JSON record; key order here is the wire order.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct WireRecord {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[serde(alias = "addr", skip_serializing_if = "Option::is_none")]
    hub_addr: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cmd: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rdr_id: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    card: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bits: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<DoorState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    uid: Option<NodeUid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_uid: Option<NodeUid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    new_addr: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<AckStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    readers: Option<u8>,
}

impl WireRecord {
    fn typed(kind: &str, hub_addr: u8) -> Self {
        Self {
            kind: Some(kind.to_string()),
            hub_addr: Some(hub_addr),
            ..Self::default()
        }
    }

    fn command(cmd: &str, hub_addr: u8) -> Self {
        Self {
            cmd: Some(cmd.to_string()),
            ..Self::typed(TYPE_COMMAND, hub_addr)
        }
    }
}

fn require<T>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| Error::MissingField(field.to_string()))
}

impl From<&Envelope> for WireRecord {
    fn from(envelope: &Envelope) -> Self {
        let hub_addr = envelope.hub_addr;

        match &envelope.message {
            Message::Identify => WireRecord::command(CMD_IDENTIFY, hub_addr),
            Message::SetAddress {
                new_addr,
                target_uid,
            } => WireRecord {
                target_uid: target_uid.clone(),
                new_addr: Some(*new_addr),
                ..WireRecord::command(CMD_SET_ADDRESS, hub_addr)
            },
            Message::IdentifyResponse {
                uid,
                device_kind,
                address,
                reader_count,
            } => WireRecord {
                uid: Some(uid.clone()),
                readers: Some(*reader_count),
                ..WireRecord::typed(device_kind.as_type_tag(), *address)
            },
            Message::AddressAck { status, address } => WireRecord {
                status: Some(*status),
                new_addr: Some(*address),
                ..WireRecord::typed(TYPE_ACK, hub_addr)
            },
            Message::CardRead {
                reader_id,
                code,
                bits,
            } => WireRecord {
                rdr_id: Some(*reader_id),
                card: Some(*code),
                bits: Some(*bits),
                ..WireRecord::typed(TYPE_CARD_READ, hub_addr)
            },
            Message::Heartbeat => WireRecord::typed(TYPE_HEARTBEAT, hub_addr),
            Message::RexEvent { reader_id } => WireRecord {
                rdr_id: Some(*reader_id),
                ..WireRecord::typed(TYPE_REX, hub_addr)
            },
            Message::DoorContact { reader_id, state } => WireRecord {
                rdr_id: Some(*reader_id),
                state: Some(*state),
                ..WireRecord::typed(TYPE_DOOR_CONTACT, hub_addr)
            },
            Message::FeedbackCommand { reader_id, kind } => WireRecord {
                rdr_id: Some(*reader_id),
                ..WireRecord::command(kind.as_command(), hub_addr)
            },
        }
    }
}

impl TryFrom<WireRecord> for Envelope {
    type Error = Error;

    fn try_from(record: WireRecord) -> Result<Self> {
        let kind = require(record.kind, "type")?;

        let message = match kind.as_str() {
            TYPE_CARD_READ => Message::CardRead {
                reader_id: require(record.rdr_id, "rdr_id")?,
                code: require(record.card, "card")?,
                bits: require(record.bits, "bits")?,
            },
            TYPE_HEARTBEAT => Message::Heartbeat,
            TYPE_REX => Message::RexEvent {
                reader_id: require(record.rdr_id, "rdr_id")?,
            },
            TYPE_DOOR_CONTACT => Message::DoorContact {
                reader_id: require(record.rdr_id, "rdr_id")?,
                state: require(record.state, "state")?,
            },
            TYPE_ACK => {
                let address = require(record.new_addr, "new_addr")?;
                let message = Message::AddressAck {
                    status: require(record.status, "status")?,
                    address,
                };
                // Nodes acknowledge before restarting and may omit their old address.
                return Ok(Envelope::new(record.hub_addr.unwrap_or(address), message));
            }
            TYPE_COMMAND => {
                let cmd = require(record.cmd, "cmd")?;
                let message = match cmd.as_str() {
                    CMD_IDENTIFY => Message::Identify,
                    CMD_SET_ADDRESS => Message::SetAddress {
                        new_addr: require(record.new_addr, "new_addr")?,
                        target_uid: record.target_uid,
                    },
                    other => {
                        let kind = if other == FeedbackKind::Grant.as_command() {
                            FeedbackKind::Grant
                        } else if other == FeedbackKind::Deny.as_command() {
                            FeedbackKind::Deny
                        } else {
                            return Err(Error::UnknownMessageType(format!("command '{other}'")));
                        };
                        Message::FeedbackCommand {
                            reader_id: require(record.rdr_id, "rdr_id")?,
                            kind,
                        }
                    }
                };

                // Addressing commands reach nodes that may not have an address yet.
                let hub_addr = match message {
                    Message::Identify | Message::SetAddress { .. } => {
                        record.hub_addr.unwrap_or(UNCONFIGURED_HUB_ADDRESS)
                    }
                    _ => require(record.hub_addr, "hub_addr")?,
                };
                return Ok(Envelope::new(hub_addr, message));
            }
            other => match DeviceKind::from_type_tag(other) {
                Some(device_kind) => {
                    let address = require(record.hub_addr, "hub_addr")?;
                    return Ok(Envelope::new(
                        address,
                        Message::IdentifyResponse {
                            uid: require(record.uid, "uid")?,
                            device_kind,
                            address,
                            reader_count: require(record.readers, "readers")?,
                        },
                    ));
                }
                None => return Err(Error::UnknownMessageType(other.to_string())),
            },
        };

        Ok(Envelope::new(require(record.hub_addr, "hub_addr")?, message))
    }
}

/// Encode an envelope into a text frame.
///
/// # Errors
/// Returns `Error::InvalidMessageFormat` if serialization fails.
pub fn encode(envelope: &Envelope) -> Result<TextFrame> {
    let payload = serde_json::to_string(&WireRecord::from(envelope))
        .map_err(|e| Error::InvalidMessageFormat(format!("cannot serialize payload: {e}")))?;
    Ok(TextFrame::new(payload))
}

/// Encode an envelope into a complete wire line (newline included).
///
/// # Examples
/// ```
/// use doorlink_protocol::{Envelope, Message, text};
///
/// let line = text::encode_line(&Envelope::new(1, Message::Heartbeat)).unwrap();
/// assert_eq!(line, "<{\"type\":\"heartbeat\",\"hub_addr\":1}>|48\n");
/// ```
///
/// # Errors
/// Same as [`encode`].
pub fn encode_line(envelope: &Envelope) -> Result<String> {
    encode(envelope).map(|frame| frame.to_line())
}

/// Interpret a verified text frame.
///
/// # Errors
/// - `Error::InvalidMessageFormat` if the payload is not a JSON object or a
///   field has the wrong JSON type
/// - `Error::MissingField` if a field the variant needs is absent
/// - `Error::UnknownMessageType` for an unrecognized `type` or `cmd`
pub fn decode(frame: &TextFrame) -> Result<Envelope> {
    let record: WireRecord = serde_json::from_str(frame.payload())
        .map_err(|e| Error::InvalidMessageFormat(format!("invalid payload: {e}")))?;
    Envelope::try_from(record)
}

/// Parse and interpret one received line.
///
/// # Errors
/// Any framing error from [`TextFrame::parse`] or message error from [`decode`].
pub fn decode_line(line: &str) -> Result<Envelope> {
    decode(&TextFrame::parse(line)?)
}
