//! Text node on a shared serial link.
//!
//! The link is a byte stream carrying newline-terminated text frames. A
//! listener parses incoming lines with [`TextCodec`] and hands envelopes to
//! the event loop; a sender drains the outbox onto the stream every poll
//! period. Rejected lines are logged and skipped, so line noise never takes
//! the link down.

use doorlink_protocol::TextCodec;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time;
use tokio_util::codec::FramedRead;
use tracing::{debug, info, trace};

use crate::config::NodeConfig;
use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::identity::{ConfigAddressStore, NodeIdentity};
use crate::outbox::{Outbox, TextEncoder};
use crate::runtime::{INBOUND_CAPACITY, Inbound, NodeCore, NodeExit, NodeHardware, NodeSettings};
use doorlink_core::WireFormat;

/// Event loop of a text node.
pub struct TextNode {
    core: NodeCore<TextEncoder>,
}

impl std::fmt::Debug for TextNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextNode")
            .field("identity", self.core.dispatcher.identity())
            .finish_non_exhaustive()
    }
}

impl TextNode {
    pub fn new(dispatcher: Dispatcher, hardware: NodeHardware, settings: NodeSettings) -> Self {
        let encoder = TextEncoder::new(dispatcher.identity().address());
        Self {
            core: NodeCore::new(dispatcher, encoder, hardware, settings),
        }
    }

    /// Build a node from its configuration document.
    ///
    /// Address changes are written back to `config_path`.
    ///
    /// # Errors
    /// Returns `NodeError::Protocol` if no valid UID can be derived.
    pub fn from_config(
        config: NodeConfig,
        config_path: impl Into<PathBuf>,
        hardware_id: &[u8],
        hardware: NodeHardware,
        settings: NodeSettings,
    ) -> Result<Self> {
        let uid = config.resolve_uid(hardware_id)?;
        let identity = NodeIdentity::new(
            uid,
            config.device_kind,
            WireFormat::Text,
            config.hub_address,
            hardware.reader_count(),
        );
        let readers: Vec<u8> = hardware.bank.reader_ids().collect();
        let store = ConfigAddressStore::new(config_path, config);
        Ok(Self::new(
            Dispatcher::new(identity, store, readers),
            hardware,
            settings,
        ))
    }

    #[must_use]
    pub fn identity(&self) -> &NodeIdentity {
        self.core.dispatcher.identity()
    }

    /// Serve the link until a restart is due or the stream ends.
    ///
    /// Frames still queued when a restart fires are flushed first, so the
    /// address acknowledgement reaches the master.
    ///
    /// # Errors
    /// Returns `NodeError::Transport` or `NodeError::Protocol` on an I/O
    /// failure of the stream.
    pub async fn run<T>(self, io: T) -> Result<NodeExit>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let (read, mut write) = tokio::io::split(io);
        let mut lines = FramedRead::new(read, TextCodec::new());
        let outbox = Arc::clone(&self.core.outbox);
        let poll = self.core.settings.sender_poll_interval;
        let (tx, rx) = mpsc::channel(INBOUND_CAPACITY);

        let exit = tokio::select! {
            exit = self.core.run(rx) => exit,
            result = serve_link(&mut lines, &mut write, tx, &outbox, poll) => {
                result?;
                NodeExit::Disconnected
            }
        };

        flush(&outbox, &mut write).await?;
        Ok(exit)
    }
}

async fn serve_link<R, W>(
    lines: &mut FramedRead<R, TextCodec>,
    writer: &mut W,
    inbound: mpsc::Sender<Inbound>,
    outbox: &Outbox<TextEncoder>,
    poll: Duration,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut tick = time::interval(poll);
    tick.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            item = lines.next() => match item {
                Some(Ok(Ok(envelope))) => {
                    trace!(%envelope, "line received");
                    if inbound.send(Inbound::Link(envelope)).await.is_err() {
                        return Ok(());
                    }
                }
                Some(Ok(Err(e))) => debug!(error = %e, "line rejected"),
                Some(Err(e)) => return Err(e.into()),
                None => {
                    info!("serial link closed");
                    return Ok(());
                }
            },
            _ = tick.tick() => flush(outbox, writer).await?,
        }
    }
}

async fn flush<W: AsyncWrite + Unpin>(outbox: &Outbox<TextEncoder>, writer: &mut W) -> Result<()> {
    let mut sent = 0usize;
    while let Some(line) = outbox.next_frame() {
        writer.write_all(line.as_bytes()).await?;
        sent += 1;
    }
    if sent > 0 {
        writer.flush().await?;
        trace!(sent, "outbox flushed");
    }
    Ok(())
}
