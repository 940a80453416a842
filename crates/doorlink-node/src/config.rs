//! Persisted node configuration document.
//!
//! The document is JSON with upper-case keys so it can be edited by hand on
//! the device filesystem:
//!
//! ```json
//! {
//!   "HUB_ADDRESS": 0,
//!   "UNIQUE_ID_OVERRIDE": "DOOR-LOBBY",
//!   "DEVICE_KIND": "rp2040",
//!   "UART_BUS": { "id": 0, "baudrate": 115200, "tx_pin": 0, "rx_pin": 1 },
//!   "DOORS": [
//!     { "id": 1, "name": "Door 1", "d0_pin": 2, "d1_pin": 3, "gled_pin": 4,
//!       "rled_pin": 5, "buzz_pin": 6, "rex_pin": 7, "contact_pin": 8 }
//!   ]
//! }
//! ```
//!
//! A missing or unreadable document is never fatal: [`NodeConfig::load_or_default`]
//! logs a warning, writes the default document back and carries on with it.

use doorlink_core::constants::UNCONFIGURED_HUB_ADDRESS;
use doorlink_core::{DeviceKind, Error, NodeUid};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{NodeError, Result};

/// Serial port settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UartConfig {
    pub id: u8,
    pub baudrate: u32,
    pub tx_pin: u8,
    pub rx_pin: u8,
}

impl Default for UartConfig {
    fn default() -> Self {
        Self {
            id: 0,
            baudrate: 115_200,
            tx_pin: 0,
            rx_pin: 1,
        }
    }
}

/// Pin assignment of one door.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoorConfig {
    /// Reader id used on the wire.
    pub id: u8,
    #[serde(default)]
    pub name: String,
    pub d0_pin: u8,
    pub d1_pin: u8,
    pub gled_pin: u8,
    pub rled_pin: u8,
    pub buzz_pin: u8,
    pub rex_pin: u8,
    pub contact_pin: u8,
}

impl DoorConfig {
    /// Door `id` laid out on seven consecutive pins starting at `first_pin`.
    #[must_use]
    pub fn consecutive(id: u8, first_pin: u8) -> Self {
        Self {
            id,
            name: format!("Door {id}"),
            d0_pin: first_pin,
            d1_pin: first_pin + 1,
            gled_pin: first_pin + 2,
            rled_pin: first_pin + 3,
            buzz_pin: first_pin + 4,
            rex_pin: first_pin + 5,
            contact_pin: first_pin + 6,
        }
    }
}

fn default_doors() -> Vec<DoorConfig> {
    (1..=4).map(|id| DoorConfig::consecutive(id, 2 + (id - 1) * 7)).collect()
}

fn default_device_kind() -> DeviceKind {
    DeviceKind::Rp2040
}

/// Node configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct NodeConfig {
    /// Assigned bus address; `0` means unconfigured.
    #[serde(default)]
    pub hub_address: u8,

    /// Replaces the hardware id as the node UID when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_id_override: Option<String>,

    #[serde(default = "default_device_kind")]
    pub device_kind: DeviceKind,

    #[serde(default)]
    pub uart_bus: UartConfig,

    #[serde(default = "default_doors")]
    pub doors: Vec<DoorConfig>,
}

impl Default for NodeConfig {
    /// Unconfigured node with four doors.
    fn default() -> Self {
        Self {
            hub_address: UNCONFIGURED_HUB_ADDRESS,
            unique_id_override: None,
            device_kind: default_device_kind(),
            uart_bus: UartConfig::default(),
            doors: default_doors(),
        }
    }
}

impl NodeConfig {
    /// Parse a document.
    ///
    /// # Errors
    /// Returns `Error::Config` if the JSON is malformed or has the wrong shape.
    pub fn from_json(json: &str) -> doorlink_core::Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    /// Serialize as pretty-printed JSON.
    ///
    /// # Errors
    /// Returns `Error::Config` if serialization fails.
    pub fn to_json(&self) -> doorlink_core::Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Read the document at `path`.
    ///
    /// # Errors
    /// Returns `NodeError::Storage` if the file cannot be read, or
    /// `NodeError::Protocol` if it does not parse.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| NodeError::storage(path.display().to_string(), e.to_string()))?;
        Ok(Self::from_json(&json)?)
    }

    /// Write the document to `path`.
    ///
    /// # Errors
    /// Returns `NodeError::Storage` if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = self.to_json()?;
        std::fs::write(path, json)
            .map_err(|e| NodeError::storage(path.display().to_string(), e.to_string()))?;
        debug!(path = %path.display(), hub_address = self.hub_address, "configuration saved");
        Ok(())
    }

    /// Read the document at `path`, falling back to (and persisting) the
    /// default document if it is missing or corrupt.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => {
                info!(
                    path = %path.display(),
                    hub_address = config.hub_address,
                    doors = config.doors.len(),
                    "configuration loaded"
                );
                config
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "configuration unusable, using defaults");
                let config = Self::default();
                if let Err(e) = config.save(path) {
                    warn!(error = %e, "cannot persist default configuration");
                }
                config
            }
        }
    }

    /// Reader ids of the configured doors, in document order.
    #[must_use]
    pub fn reader_ids(&self) -> Vec<u8> {
        self.doors.iter().map(|door| door.id).collect()
    }

    /// Number of doors reported in identity responses.
    #[must_use]
    pub fn reader_count(&self) -> u8 {
        u8::try_from(self.doors.len()).unwrap_or(u8::MAX)
    }

    /// UID this node reports: the override if present and valid, otherwise
    /// the hex-encoded hardware id.
    ///
    /// # Errors
    /// Returns `Error::InvalidUid` if neither source yields a usable UID.
    pub fn resolve_uid(&self, hardware_id: &[u8]) -> doorlink_core::Result<NodeUid> {
        if let Some(custom) = self.unique_id_override.as_deref().filter(|s| !s.trim().is_empty()) {
            match NodeUid::new(custom) {
                Ok(uid) => return Ok(uid),
                Err(e) => warn!(error = %e, "ignoring invalid UNIQUE_ID_OVERRIDE"),
            }
        }
        NodeUid::from_hardware_id(hardware_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_has_four_doors() {
        let config = NodeConfig::default();
        assert_eq!(config.hub_address, 0);
        assert_eq!(config.reader_ids(), vec![1, 2, 3, 4]);
        assert_eq!(config.doors[1].d0_pin, 9);
        assert_eq!(config.doors[3].contact_pin, 29);
    }

    #[test]
    fn test_uses_screaming_keys() {
        let json = NodeConfig::default().to_json().unwrap();
        assert!(json.contains("\"HUB_ADDRESS\""));
        assert!(json.contains("\"DOORS\""));
        assert!(json.contains("\"UART_BUS\""));
        assert!(!json.contains("UNIQUE_ID_OVERRIDE"));
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let config = NodeConfig::from_json(r#"{"HUB_ADDRESS": 3, "DOORS": []}"#).unwrap();
        assert_eq!(config.hub_address, 3);
        assert!(config.doors.is_empty());
        assert_eq!(config.device_kind, DeviceKind::Rp2040);
        assert_eq!(config.uart_bus.baudrate, 115_200);
    }

    #[test]
    fn test_rejects_non_object() {
        assert!(matches!(
            NodeConfig::from_json("[1, 2]"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_load_or_default_persists_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let config = NodeConfig::load_or_default(&path);
        assert_eq!(config, NodeConfig::default());
        assert_eq!(NodeConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_or_default_replaces_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let config = NodeConfig::load_or_default(&path);
        assert_eq!(config.doors.len(), 4);
        assert!(NodeConfig::load(&path).is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let mut config = NodeConfig::default();
        config.hub_address = 7;
        config.unique_id_override = Some("lobby-1".into());
        config.save(&path).unwrap();

        assert_eq!(NodeConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_resolve_uid() {
        let mut config = NodeConfig::default();
        let hw = [0xE6, 0x61, 0x41, 0x03];
        assert_eq!(config.resolve_uid(&hw).unwrap().as_str(), "E6614103");

        config.unique_id_override = Some("aabbccdd".into());
        assert_eq!(config.resolve_uid(&hw).unwrap().as_str(), "AABBCCDD");

        config.unique_id_override = Some("  ".into());
        assert_eq!(config.resolve_uid(&hw).unwrap().as_str(), "E6614103");

        config.unique_id_override = Some("bad uid".into());
        assert_eq!(config.resolve_uid(&hw).unwrap().as_str(), "E6614103");
    }
}
