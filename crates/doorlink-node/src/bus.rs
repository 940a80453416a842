//! Binary node on an addressed bus.
//!
//! The bus itself is driven by the master; the node only reacts. Its
//! transport-facing half is [`BusSlave`], a cheap clonable handle whose two
//! methods mirror the two bus callbacks of a slave peripheral:
//!
//! - [`BusSlave::on_receive`]: the master wrote a frame to this address.
//! - [`BusSlave::on_transmit`]: the master is reading; hand over the next
//!   queued frame, or the `0x00` idle filler.
//!
//! Both are synchronous and never block, so they can be called from an
//! interrupt-style callback or a simulated bus alike.

use bytes::Bytes;
use doorlink_core::constants::{IDLE_FILLER, UNCONFIGURED_BUS_ADDRESS};
use doorlink_core::{DeviceKind, NodeUid, WireFormat};
use doorlink_protocol::binary;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::dispatcher::Dispatcher;
use crate::identity::{AddressStore, NodeIdentity};
use crate::outbox::{BinaryEncoder, Outbox};
use crate::runtime::{INBOUND_CAPACITY, Inbound, NodeCore, NodeExit, NodeHardware, NodeSettings};

/// Event loop of a binary node.
pub struct BinaryNode {
    core: NodeCore<BinaryEncoder>,
    inbound: mpsc::Receiver<Inbound>,
}

impl std::fmt::Debug for BinaryNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinaryNode")
            .field("identity", self.core.dispatcher.identity())
            .finish_non_exhaustive()
    }
}

impl BinaryNode {
    /// Create a node and the bus handle that feeds it.
    pub fn new(
        dispatcher: Dispatcher,
        hardware: NodeHardware,
        settings: NodeSettings,
    ) -> (Self, BusSlave) {
        let address = dispatcher.identity().address();
        let core = NodeCore::new(dispatcher, BinaryEncoder, hardware, settings);
        let (tx, inbound) = mpsc::channel(INBOUND_CAPACITY);
        let slave = BusSlave {
            address,
            inbound: tx,
            outbox: Arc::clone(&core.outbox),
        };
        (Self { core, inbound }, slave)
    }

    /// Boot a node the way the firmware does: read the stored address
    /// (falling back to `0x08`) and report every reader in the bank.
    pub fn boot(
        uid: NodeUid,
        device_kind: DeviceKind,
        store: impl AddressStore + 'static,
        hardware: NodeHardware,
        settings: NodeSettings,
    ) -> (Self, BusSlave) {
        let address = match store.load() {
            Ok(Some(address)) => address,
            Ok(None) => UNCONFIGURED_BUS_ADDRESS,
            Err(e) => {
                warn!(error = %e, "cannot load address, starting unconfigured");
                UNCONFIGURED_BUS_ADDRESS
            }
        };
        let identity = NodeIdentity::new(
            uid,
            device_kind,
            WireFormat::Binary,
            address,
            hardware.reader_count(),
        );
        let readers: Vec<u8> = hardware.bank.reader_ids().collect();
        let dispatcher = Dispatcher::new(identity, store, readers);
        Self::new(dispatcher, hardware, settings)
    }

    #[must_use]
    pub fn identity(&self) -> &NodeIdentity {
        self.core.dispatcher.identity()
    }

    /// Run until a restart is due or every [`BusSlave`] handle is dropped.
    pub async fn run(self) -> NodeExit {
        self.core.run(self.inbound).await
    }
}

/// Bus-facing handle of a [`BinaryNode`].
#[derive(Debug, Clone)]
pub struct BusSlave {
    address: u8,
    inbound: mpsc::Sender<Inbound>,
    outbox: Arc<Outbox<BinaryEncoder>>,
}

impl BusSlave {
    /// Address this node answers on.
    #[must_use]
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Returns `false` once the node has stopped.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        !self.inbound.is_closed()
    }

    /// The master wrote `data` to this node.
    ///
    /// Frames that fail to decode are dropped here; nothing reaches the
    /// dispatcher unless its checksum validates.
    pub fn on_receive(&self, data: &[u8]) {
        let message = match binary::decode_bytes(data) {
            Ok(Some(message)) => message,
            Ok(None) => {
                trace!(address = self.address, "idle filler received");
                return;
            }
            Err(e) => {
                debug!(address = self.address, error = %e, "frame rejected");
                return;
            }
        };

        trace!(address = self.address, message = message.name(), "command received");
        match self.inbound.try_send(Inbound::Bus(message)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(address = self.address, "command backlog full, dropping command");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(address = self.address, "node stopped, command dropped");
            }
        }
    }

    /// The master is reading from this node.
    #[must_use]
    pub fn on_transmit(&self) -> Bytes {
        self.outbox
            .next_frame()
            .unwrap_or_else(|| Bytes::from_static(&[IDLE_FILLER]))
    }

    /// Frames waiting for the master.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.outbox.queue().len()
    }
}
