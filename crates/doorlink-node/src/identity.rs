//! Node identity and persisted address.
//!
//! A node boots at its unconfigured address (`0x08` on the addressed bus,
//! `0` on a serial link) until the master assigns it one. The assignment is
//! written through an [`AddressStore`] and takes effect after a restart, so
//! the identity itself is immutable for the lifetime of one run.

use doorlink_core::{DeviceKind, NodeUid, WireFormat};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

use crate::config::NodeConfig;
use crate::error::{NodeError, Result};
use doorlink_protocol::Message;

/// Who this node is and where it listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIdentity {
    uid: NodeUid,
    device_kind: DeviceKind,
    format: WireFormat,
    address: u8,
    reader_count: u8,
}

impl NodeIdentity {
    #[must_use]
    pub fn new(
        uid: NodeUid,
        device_kind: DeviceKind,
        format: WireFormat,
        address: u8,
        reader_count: u8,
    ) -> Self {
        Self {
            uid,
            device_kind,
            format,
            address,
            reader_count,
        }
    }

    #[must_use]
    pub fn uid(&self) -> &NodeUid {
        &self.uid
    }

    #[must_use]
    pub fn device_kind(&self) -> DeviceKind {
        self.device_kind
    }

    #[must_use]
    pub fn format(&self) -> WireFormat {
        self.format
    }

    #[must_use]
    pub fn address(&self) -> u8 {
        self.address
    }

    #[must_use]
    pub fn reader_count(&self) -> u8 {
        self.reader_count
    }

    /// Returns `true` once the node holds an assigned address.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.address != self.format.unconfigured_address()
    }

    /// Answer to an identify request.
    #[must_use]
    pub fn identify_response(&self) -> Message {
        Message::IdentifyResponse {
            uid: self.uid.clone(),
            device_kind: self.device_kind,
            address: self.address,
            reader_count: self.reader_count,
        }
    }
}

/// Persistent home of the node address.
pub trait AddressStore: Send {
    /// Stored address, or `None` if nothing valid has been stored.
    ///
    /// # Errors
    /// Returns `NodeError::Storage` if the medium cannot be read.
    fn load(&self) -> Result<Option<u8>>;

    /// Persist `address`.
    ///
    /// # Errors
    /// Returns `NodeError::Storage` if the medium cannot be written.
    fn store(&mut self, address: u8) -> Result<()>;
}

impl<T: AddressStore + ?Sized> AddressStore for Box<T> {
    fn load(&self) -> Result<Option<u8>> {
        (**self).load()
    }

    fn store(&mut self, address: u8) -> Result<()> {
        (**self).store(address)
    }
}

/// One-byte address file used by bus nodes.
#[derive(Debug, Clone)]
pub struct AddressFile {
    path: PathBuf,
}

impl AddressFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored address, or `default` if the file is missing or invalid.
    pub fn load_or(&self, default: u8) -> u8 {
        match self.load() {
            Ok(Some(address)) => address,
            Ok(None) => default,
            Err(e) => {
                warn!(error = %e, "cannot read address file, using default");
                default
            }
        }
    }
}

impl AddressStore for AddressFile {
    fn load(&self) -> Result<Option<u8>> {
        match std::fs::read(&self.path) {
            Ok(bytes) if bytes.len() == 1 => Ok(Some(bytes[0])),
            Ok(bytes) => {
                warn!(
                    path = %self.path.display(),
                    len = bytes.len(),
                    "address file must hold exactly one byte"
                );
                Ok(None)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(NodeError::storage(
                self.path.display().to_string(),
                e.to_string(),
            )),
        }
    }

    fn store(&mut self, address: u8) -> Result<()> {
        std::fs::write(&self.path, [address]).map_err(|e| {
            NodeError::storage(self.path.display().to_string(), e.to_string())
        })?;
        debug!(path = %self.path.display(), address, "address saved");
        Ok(())
    }
}

/// Stores the address in the `HUB_ADDRESS` field of a configuration document.
#[derive(Debug, Clone)]
pub struct ConfigAddressStore {
    path: PathBuf,
    config: NodeConfig,
}

impl ConfigAddressStore {
    /// Store backed by the document at `path`, currently holding `config`.
    pub fn new(path: impl Into<PathBuf>, config: NodeConfig) -> Self {
        Self {
            path: path.into(),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }
}

impl AddressStore for ConfigAddressStore {
    fn load(&self) -> Result<Option<u8>> {
        Ok(Some(self.config.hub_address))
    }

    fn store(&mut self, address: u8) -> Result<()> {
        let mut updated = self.config.clone();
        updated.hub_address = address;
        updated.save(&self.path)?;
        self.config = updated;
        Ok(())
    }
}

/// In-memory store shared between clones, used by emulated nodes so an
/// assignment survives a simulated restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryAddressStore {
    address: Arc<Mutex<Option<u8>>>,
}

impl MemoryAddressStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_address(address: u8) -> Self {
        Self {
            address: Arc::new(Mutex::new(Some(address))),
        }
    }

    /// Last stored address.
    #[must_use]
    pub fn get(&self) -> Option<u8> {
        *self.address.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AddressStore for MemoryAddressStore {
    fn load(&self) -> Result<Option<u8>> {
        Ok(self.get())
    }

    fn store(&mut self, address: u8) -> Result<()> {
        *self.address.lock().unwrap_or_else(PoisonError::into_inner) = Some(address);
        Ok(())
    }
}
