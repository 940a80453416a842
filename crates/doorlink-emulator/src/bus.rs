//! In-memory addressed bus.
//!
//! Every attached [`BusSlave`] answers on its own address. A write reaches
//! every live slave on the address, the way a broadcast on the unconfigured
//! address reaches every waiting node; a read is served by the first one.
//! Slaves whose node has stopped are pruned on the next transaction.

use bytes::{Bytes, BytesMut};
use doorlink_master::{AddressedBus, BusError, BusResult};
use doorlink_node::BusSlave;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace};

/// Byte a released bus line reads as.
const PAD_BYTE: u8 = 0xFF;

#[derive(Debug, Default)]
struct Wiring {
    slaves: Vec<BusSlave>,
    faulted: BTreeSet<u8>,
}

impl Wiring {
    fn live(&mut self, address: u8) -> Vec<BusSlave> {
        self.slaves.retain(BusSlave::is_attached);
        if self.faulted.contains(&address) {
            return Vec::new();
        }
        self.slaves
            .iter()
            .filter(|slave| slave.address() == address)
            .cloned()
            .collect()
    }
}

/// Shared in-memory bus. Clones refer to the same wiring.
#[derive(Debug, Clone, Default)]
pub struct SimulatedBus {
    wiring: Arc<Mutex<Wiring>>,
    pad_reads: bool,
}

impl SimulatedBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pad every read to the requested length, like a hardware controller.
    #[must_use]
    pub fn with_read_padding(mut self, pad_reads: bool) -> Self {
        self.pad_reads = pad_reads;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Wiring> {
        self.wiring.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Connect a node to the bus.
    pub fn attach(&self, slave: BusSlave) {
        debug!(address = slave.address(), "slave attached");
        self.lock().slaves.push(slave);
    }

    /// Drop every slave on `address`; their nodes see the transport close.
    pub fn detach(&self, address: u8) {
        self.lock().slaves.retain(|slave| slave.address() != address);
    }

    /// Make `address` stop acknowledging, or bring it back.
    pub fn set_fault(&self, address: u8, faulted: bool) {
        let mut wiring = self.lock();
        if faulted {
            wiring.faulted.insert(address);
        } else {
            wiring.faulted.remove(&address);
        }
    }

    /// Addresses with a live slave, ascending and deduplicated.
    #[must_use]
    pub fn addresses(&self) -> Vec<u8> {
        let mut wiring = self.lock();
        wiring.slaves.retain(BusSlave::is_attached);
        let faulted = wiring.faulted.clone();
        let addresses: BTreeSet<u8> = wiring
            .slaves
            .iter()
            .map(BusSlave::address)
            .filter(|address| !faulted.contains(address))
            .collect();
        addresses.into_iter().collect()
    }
}

impl AddressedBus for SimulatedBus {
    async fn write(&mut self, address: u8, data: &[u8]) -> BusResult<()> {
        let targets = self.lock().live(address);
        if targets.is_empty() {
            return Err(BusError::no_device(address));
        }
        trace!(address, len = data.len(), "bus write");
        for slave in &targets {
            slave.on_receive(data);
        }
        Ok(())
    }

    async fn read(&mut self, address: u8, max_len: usize) -> BusResult<Bytes> {
        let slave = self
            .lock()
            .live(address)
            .into_iter()
            .next()
            .ok_or_else(|| BusError::no_device(address))?;

        let frame = slave.on_transmit();
        trace!(address, len = frame.len(), "bus read");
        if !self.pad_reads || frame.len() >= max_len {
            return Ok(frame);
        }

        let mut padded = BytesMut::with_capacity(max_len);
        padded.extend_from_slice(&frame);
        padded.resize(max_len, PAD_BYTE);
        Ok(padded.freeze())
    }

    async fn scan(&mut self) -> BusResult<Vec<u8>> {
        Ok(self.addresses())
    }
}
