//! Application-facing notifications from the master engine.

use doorlink_core::{DoorState, FeedbackKind, NodeUid};
use std::fmt;
use tokio::sync::mpsc;
use tracing::warn;

use crate::registry::OfflineReason;

/// Something the application layer may want to know about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MasterEvent {
    /// A node answered a poll after being unknown or offline.
    NodeOnline { address: u8 },
    /// A node that was online stopped answering.
    NodeOffline { address: u8, reason: OfflineReason },
    /// A credential was read and `decision` was sent back.
    CardRead {
        address: u8,
        reader_id: u8,
        code: u64,
        bits: u8,
        decision: FeedbackKind,
    },
    /// Request-to-exit pressed and `decision` was sent back.
    Rex {
        address: u8,
        reader_id: u8,
        decision: FeedbackKind,
    },
    DoorContact {
        address: u8,
        reader_id: u8,
        state: DoorState,
    },
    Heartbeat { address: u8 },
    /// Discovery found a node that is not in the configuration.
    UnknownNode { uid: NodeUid },
    /// Discovery told a configured node to move to its address.
    AddressAssigned { uid: NodeUid, address: u8 },
}

impl fmt::Display for MasterEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MasterEvent::NodeOnline { address } => write!(f, "node {address} online"),
            MasterEvent::NodeOffline { address, reason } => {
                write!(f, "node {address} offline ({reason})")
            }
            MasterEvent::CardRead {
                address,
                reader_id,
                code,
                bits,
                decision,
            } => write!(
                f,
                "card {code} ({bits} bits) at {address}/{reader_id}: {decision}"
            ),
            MasterEvent::Rex {
                address,
                reader_id,
                decision,
            } => write!(f, "exit request at {address}/{reader_id}: {decision}"),
            MasterEvent::DoorContact {
                address,
                reader_id,
                state,
            } => write!(f, "door {address}/{reader_id} {state}"),
            MasterEvent::Heartbeat { address } => write!(f, "heartbeat from {address}"),
            MasterEvent::UnknownNode { uid } => write!(f, "unknown node {uid}"),
            MasterEvent::AddressAssigned { uid, address } => {
                write!(f, "node {uid} assigned address {address}")
            }
        }
    }
}

/// Non-blocking publisher in front of the event channel.
#[derive(Debug, Clone)]
pub(crate) struct EventSink {
    tx: mpsc::Sender<MasterEvent>,
}

impl EventSink {
    pub(crate) fn new(tx: mpsc::Sender<MasterEvent>) -> Self {
        Self { tx }
    }

    /// Publish `event`; a full or closed channel drops it.
    pub(crate) fn publish(&self, event: MasterEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(%event, "master event channel full, dropping event");
            }
            // Nobody is listening; the engine keeps running regardless.
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_channel_drops_newest() {
        let (tx, mut rx) = mpsc::channel(1);
        let sink = EventSink::new(tx);
        sink.publish(MasterEvent::Heartbeat { address: 5 });
        sink.publish(MasterEvent::Heartbeat { address: 6 });

        assert_eq!(rx.try_recv().unwrap(), MasterEvent::Heartbeat { address: 5 });
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_channel_is_ignored() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        EventSink::new(tx).publish(MasterEvent::NodeOnline { address: 1 });
    }

    #[test]
    fn test_display() {
        let event = MasterEvent::NodeOffline {
            address: 5,
            reason: OfflineReason::Timeout,
        };
        assert_eq!(event.to_string(), "node 5 offline (silent past timeout)");
    }
}
