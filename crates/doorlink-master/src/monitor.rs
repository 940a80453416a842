//! PC-side tool for text-protocol nodes on a serial link.
//!
//! The monitor reads node envelopes, keeps the last time each hub address was
//! heard from, and sends operator commands. Rejected lines are logged and
//! skipped; only transport errors end the stream.

use chrono::{DateTime, Utc};
use doorlink_core::{NodeUid, Result};
use doorlink_protocol::{Envelope, Message, TextCodec};
use futures::{SinkExt, StreamExt};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

/// What the monitor knows about one hub address.
#[derive(Debug, Clone)]
pub struct HubStatus {
    pub hub_addr: u8,
    pub uid: Option<NodeUid>,
    pub last_seen: Instant,
    pub last_seen_at: DateTime<Utc>,
    pub messages: u64,
}

/// Serial monitor over any byte stream.
pub struct SerialMonitor<T> {
    framed: Framed<T, TextCodec>,
    hubs: BTreeMap<u8, HubStatus>,
}

impl<T: AsyncRead + AsyncWrite + Unpin> SerialMonitor<T> {
    pub fn new(io: T) -> Self {
        Self {
            framed: Framed::new(io, TextCodec::new()),
            hubs: BTreeMap::new(),
        }
    }

    /// Next valid envelope, or `None` once the link closes.
    ///
    /// # Errors
    /// Returns the transport error that ended the stream.
    pub async fn next_envelope(&mut self) -> Result<Option<Envelope>> {
        while let Some(item) = self.framed.next().await {
            match item? {
                Ok(envelope) => {
                    self.observe(&envelope);
                    return Ok(Some(envelope));
                }
                Err(e) => debug!(error = %e, "rejected line"),
            }
        }
        Ok(None)
    }

    /// Send `message` to the node at `hub_addr`.
    ///
    /// # Errors
    /// Returns an encoding or transport error.
    pub async fn send(&mut self, hub_addr: u8, message: Message) -> Result<()> {
        info!(hub_addr, %message, "sending command");
        self.framed.send(Envelope::new(hub_addr, message)).await
    }

    /// # Errors
    /// See [`send`](Self::send).
    pub async fn grant(&mut self, hub_addr: u8, reader_id: u8) -> Result<()> {
        self.send(hub_addr, Message::grant(reader_id)).await
    }

    /// # Errors
    /// See [`send`](Self::send).
    pub async fn deny(&mut self, hub_addr: u8, reader_id: u8) -> Result<()> {
        self.send(hub_addr, Message::deny(reader_id)).await
    }

    /// # Errors
    /// See [`send`](Self::send).
    pub async fn identify(&mut self, hub_addr: u8) -> Result<()> {
        self.send(hub_addr, Message::Identify).await
    }

    /// Ask a node to move to `new_addr`, optionally only if its UID matches.
    ///
    /// # Errors
    /// See [`send`](Self::send).
    pub async fn set_address(
        &mut self,
        hub_addr: u8,
        new_addr: u8,
        target_uid: Option<NodeUid>,
    ) -> Result<()> {
        self.send(
            hub_addr,
            Message::SetAddress {
                new_addr,
                target_uid,
            },
        )
        .await
    }

    /// Hubs heard from so far, by address.
    pub fn hubs(&self) -> impl Iterator<Item = &HubStatus> {
        self.hubs.values()
    }

    #[must_use]
    pub fn hub(&self, hub_addr: u8) -> Option<&HubStatus> {
        self.hubs.get(&hub_addr)
    }

    /// Hubs silent for longer than `timeout`.
    #[must_use]
    pub fn stale_hubs(&self, timeout: Duration) -> Vec<u8> {
        let now = Instant::now();
        self.hubs
            .values()
            .filter(|hub| now.saturating_duration_since(hub.last_seen) > timeout)
            .map(|hub| hub.hub_addr)
            .collect()
    }

    fn observe(&mut self, envelope: &Envelope) {
        let hub_addr = envelope.hub_addr;
        let hub = self.hubs.entry(hub_addr).or_insert_with(|| {
            info!(hub_addr, "new hub on the link");
            HubStatus {
                hub_addr,
                uid: None,
                last_seen: Instant::now(),
                last_seen_at: Utc::now(),
                messages: 0,
            }
        });
        hub.last_seen = Instant::now();
        hub.last_seen_at = Utc::now();
        hub.messages += 1;

        match &envelope.message {
            Message::IdentifyResponse {
                uid,
                device_kind,
                reader_count,
                ..
            } => {
                info!(hub_addr, %uid, %device_kind, reader_count, "identity");
                hub.uid = Some(uid.clone());
            }
            Message::CardRead {
                reader_id,
                code,
                bits,
            } => info!(hub_addr, reader_id, code, bits, "card read"),
            Message::RexEvent { reader_id } => info!(hub_addr, reader_id, "exit request"),
            Message::DoorContact { reader_id, state } => {
                info!(hub_addr, reader_id, %state, "door contact");
            }
            Message::Heartbeat => debug!(hub_addr, "heartbeat"),
            Message::AddressAck { status, address } => {
                info!(hub_addr, status = status.as_str(), address, "address ack");
            }
            other => warn!(hub_addr, message = other.name(), "command echoed by a node"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, duplex};

    fn link() -> (SerialMonitor<DuplexStream>, DuplexStream) {
        let (ours, theirs) = duplex(1024);
        (SerialMonitor::new(ours), theirs)
    }

    #[tokio::test(start_paused = true)]
    async fn test_reads_envelopes_and_tracks_hubs() {
        let (mut monitor, mut node) = link();
        node.write_all(b"garbage\n<{\"type\":\"heartbeat\",\"hub_addr\":1}>|48\n")
            .await
            .unwrap();

        let envelope = monitor.next_envelope().await.unwrap().unwrap();
        assert_eq!(envelope, Envelope::new(1, Message::Heartbeat));
        assert_eq!(monitor.hub(1).unwrap().messages, 1);
        assert!(monitor.stale_hubs(Duration::from_secs(45)).is_empty());

        tokio::time::advance(Duration::from_secs(46)).await;
        assert_eq!(monitor.stale_hubs(Duration::from_secs(45)), vec![1]);

        drop(node);
        assert!(monitor.next_envelope().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sends_commands() {
        let (mut monitor, mut node) = link();
        monitor.grant(3, 2).await.unwrap();
        monitor.identify(0).await.unwrap();
        drop(monitor);

        let mut received = String::new();
        node.read_to_string(&mut received).await.unwrap();
        let lines: Vec<_> = received
            .lines()
            .map(|line| doorlink_protocol::text::decode_line(line).unwrap())
            .collect();
        assert_eq!(
            lines,
            vec![
                Envelope::new(3, Message::grant(2)),
                Envelope::new(0, Message::Identify)
            ]
        );
    }
}
