//! Bus messages exchanged between the master and door-controller nodes.
//!
//! [`Message`] is the closed set of everything either side may say. Both wire
//! encodings map onto it: [`crate::binary`] for the addressed bus and
//! [`crate::text`] for serial links, where a message travels inside an
//! [`Envelope`] that also names the node address.

use doorlink_core::{AckStatus, DeviceKind, DoorState, FeedbackKind, NodeUid, ReaderEvent};
use std::fmt;

/// A protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Master → node: report your identity.
    Identify,

    /// Master → node: take a new address.
    ///
    /// Without `target_uid` the command is a broadcast accepted by any node
    /// listening on the unconfigured address.
    SetAddress {
        new_addr: u8,
        target_uid: Option<NodeUid>,
    },

    /// Node → master: answer to [`Message::Identify`].
    IdentifyResponse {
        uid: NodeUid,
        device_kind: DeviceKind,
        address: u8,
        reader_count: u8,
    },

    /// Node → master: result of a [`Message::SetAddress`].
    AddressAck { status: AckStatus, address: u8 },

    /// Node → master: a credential was read.
    CardRead { reader_id: u8, code: u64, bits: u8 },

    /// Node → master: periodic liveness.
    Heartbeat,

    /// Node → master: request-to-exit pressed.
    RexEvent { reader_id: u8 },

    /// Node → master: door contact changed.
    DoorContact { reader_id: u8, state: DoorState },

    /// Master → node: run a feedback sequence on a reader.
    FeedbackCommand { reader_id: u8, kind: FeedbackKind },
}

impl Message {
    /// Short name used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Message::Identify => "identify",
            Message::SetAddress { .. } => "set_address",
            Message::IdentifyResponse { .. } => "identify_response",
            Message::AddressAck { .. } => "address_ack",
            Message::CardRead { .. } => "card_read",
            Message::Heartbeat => "heartbeat",
            Message::RexEvent { .. } => "event_rex",
            Message::DoorContact { .. } => "event_door_contact",
            Message::FeedbackCommand { .. } => "feedback",
        }
    }

    /// Returns `true` for messages the master sends to nodes.
    #[must_use]
    pub fn is_command(&self) -> bool {
        matches!(
            self,
            Message::Identify | Message::SetAddress { .. } | Message::FeedbackCommand { .. }
        )
    }

    /// Returns `true` for unsolicited node events.
    #[must_use]
    pub fn is_event(&self) -> bool {
        matches!(
            self,
            Message::CardRead { .. }
                | Message::Heartbeat
                | Message::RexEvent { .. }
                | Message::DoorContact { .. }
        )
    }

    /// Reader the message concerns, if any.
    #[must_use]
    pub fn reader_id(&self) -> Option<u8> {
        match self {
            Message::CardRead { reader_id, .. }
            | Message::RexEvent { reader_id }
            | Message::DoorContact { reader_id, .. }
            | Message::FeedbackCommand { reader_id, .. } => Some(*reader_id),
            _ => None,
        }
    }

    /// Grant feedback for `reader_id`.
    #[inline]
    #[must_use]
    pub fn grant(reader_id: u8) -> Self {
        Message::FeedbackCommand {
            reader_id,
            kind: FeedbackKind::Grant,
        }
    }

    /// Deny feedback for `reader_id`.
    #[inline]
    #[must_use]
    pub fn deny(reader_id: u8) -> Self {
        Message::FeedbackCommand {
            reader_id,
            kind: FeedbackKind::Deny,
        }
    }
}

impl From<ReaderEvent> for Message {
    fn from(event: ReaderEvent) -> Self {
        Message::CardRead {
            reader_id: event.reader_id,
            code: event.code,
            bits: event.bit_length,
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Identify => write!(f, "IDENTIFY"),
            Message::SetAddress {
                new_addr,
                target_uid: Some(uid),
            } => write!(f, "SET_ADDRESS {new_addr} for {uid}"),
            Message::SetAddress { new_addr, .. } => write!(f, "SET_ADDRESS {new_addr}"),
            Message::IdentifyResponse {
                uid,
                device_kind,
                address,
                reader_count,
            } => write!(
                f,
                "IDENTITY {uid} ({device_kind}) at {address} with {reader_count} readers"
            ),
            Message::AddressAck { status, address } => {
                write!(f, "ADDRESS_ACK {} {address}", status.as_str())
            }
            Message::CardRead {
                reader_id,
                code,
                bits,
            } => write!(f, "CARD reader {reader_id} code {code} ({bits} bits)"),
            Message::Heartbeat => write!(f, "HEARTBEAT"),
            Message::RexEvent { reader_id } => write!(f, "REX reader {reader_id}"),
            Message::DoorContact { reader_id, state } => {
                write!(f, "DOOR reader {reader_id} {state}")
            }
            Message::FeedbackCommand { reader_id, kind } => {
                write!(f, "{kind} reader {reader_id}")
            }
        }
    }
}

/// A text-protocol message with the node address it belongs to.
///
/// Nodes stamp their own address on everything they send; the master stamps
/// the destination address on commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub hub_addr: u8,
    pub message: Message,
}

impl Envelope {
    #[must_use]
    pub fn new(hub_addr: u8, message: Message) -> Self {
        Self { hub_addr, message }
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.hub_addr, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_direction() {
        assert!(Message::Identify.is_command());
        assert!(Message::grant(1).is_command());
        assert!(!Message::Heartbeat.is_command());
        assert!(Message::Heartbeat.is_event());
        assert!(Message::RexEvent { reader_id: 1 }.is_event());
        assert!(
            !Message::AddressAck {
                status: AckStatus::Success,
                address: 5
            }
            .is_event()
        );
    }

    #[test]
    fn test_reader_event_conversion() {
        let msg = Message::from(ReaderEvent::new(2, 1000, 26));
        assert_eq!(
            msg,
            Message::CardRead {
                reader_id: 2,
                code: 1000,
                bits: 26
            }
        );
        assert_eq!(msg.reader_id(), Some(2));
    }

    #[test]
    fn test_display() {
        assert_eq!(Message::deny(3).to_string(), "DENY reader 3");
        assert_eq!(
            Envelope::new(1, Message::Heartbeat).to_string(),
            "[1] HEARTBEAT"
        );
    }
}
