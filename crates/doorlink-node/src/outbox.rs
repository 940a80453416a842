//! Encoder plus queue: where events become frames waiting for the master.

use bytes::Bytes;
use doorlink_core::Result;
use doorlink_protocol::{Envelope, Message, binary, text};
use tracing::{trace, warn};

use crate::queue::OutboundQueue;

/// Turns messages into the frames a transport writes.
pub trait FrameEncoder: Send + Sync {
    type Frame: Send;

    /// Encode `message` for the wire.
    ///
    /// # Errors
    /// Returns the codec error if the message cannot be represented.
    fn encode(&self, message: &Message) -> Result<Self::Frame>;
}

/// Binary frames for the addressed bus.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryEncoder;

impl FrameEncoder for BinaryEncoder {
    type Frame = Bytes;

    fn encode(&self, message: &Message) -> Result<Bytes> {
        binary::encode_to_bytes(message)
    }
}

/// Newline-terminated text frames stamped with this node's hub address.
#[derive(Debug, Clone, Copy)]
pub struct TextEncoder {
    hub_addr: u8,
}

impl TextEncoder {
    #[must_use]
    pub fn new(hub_addr: u8) -> Self {
        Self { hub_addr }
    }
}

impl FrameEncoder for TextEncoder {
    type Frame = String;

    fn encode(&self, message: &Message) -> Result<String> {
        text::encode_line(&Envelope::new(self.hub_addr, message.clone()))
    }
}

/// Outbound queue paired with the encoder for its transport.
#[derive(Debug)]
pub struct Outbox<E: FrameEncoder> {
    encoder: E,
    queue: OutboundQueue<E::Frame>,
}

impl<E: FrameEncoder> Outbox<E> {
    pub fn new(encoder: E, capacity: usize) -> Self {
        Self {
            encoder,
            queue: OutboundQueue::with_capacity(capacity),
        }
    }

    /// Encode and queue `message`.
    ///
    /// # Errors
    /// Returns the codec error, or `Error::QueueFull` if the frame was dropped.
    pub fn publish(&self, message: &Message) -> Result<()> {
        let frame = self.encoder.encode(message).inspect_err(|e| {
            warn!(message = message.name(), error = %e, "cannot encode outbound message");
        })?;
        self.queue.enqueue(frame)?;
        trace!(message = message.name(), queued = self.queue.len(), "message queued");
        Ok(())
    }

    /// Next frame to transmit.
    pub fn next_frame(&self) -> Option<E::Frame> {
        self.queue.dequeue()
    }

    #[must_use]
    pub fn queue(&self) -> &OutboundQueue<E::Frame> {
        &self.queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doorlink_core::Error;

    #[test]
    fn test_binary_outbox() {
        let outbox = Outbox::new(BinaryEncoder, 4);
        outbox.publish(&Message::Heartbeat).unwrap();
        assert_eq!(outbox.next_frame().unwrap().as_ref(), &[0x82, 0x00, 0x82]);
        assert!(outbox.next_frame().is_none());
    }

    #[test]
    fn test_text_outbox_stamps_hub_address() {
        let outbox = Outbox::new(TextEncoder::new(1), 4);
        outbox.publish(&Message::Heartbeat).unwrap();
        assert_eq!(
            outbox.next_frame().unwrap(),
            "<{\"type\":\"heartbeat\",\"hub_addr\":1}>|48\n"
        );
    }

    #[test]
    fn test_unencodable_message_not_queued() {
        let outbox = Outbox::new(BinaryEncoder, 4);
        let result = outbox.publish(&Message::CardRead {
            reader_id: 1,
            code: u64::from(u32::MAX) + 1,
            bits: 40,
        });
        assert!(matches!(result, Err(Error::Unrepresentable { .. })));
        assert!(outbox.queue().is_empty());
    }

    #[test]
    fn test_full_outbox_reports_overflow() {
        let outbox = Outbox::new(BinaryEncoder, 1);
        outbox.publish(&Message::Heartbeat).unwrap();
        assert!(matches!(
            outbox.publish(&Message::RexEvent { reader_id: 1 }),
            Err(Error::QueueFull { capacity: 1 })
        ));
    }
}
