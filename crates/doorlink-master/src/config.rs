//! Master configuration document.
//!
//! ```json
//! {
//!   "I2C_BUS": { "id": 0, "scl_pin": 22, "sda_pin": 21, "freq": 100000 },
//!   "SLAVES": [
//!     { "uid": "AABBCCDD", "final_address": 5, "name": "Front door" }
//!   ],
//!   "POLLING": { "poll_stagger_ms": 150, "offline_timeout_secs": 45 }
//! }
//! ```
//!
//! Every `POLLING` field is optional. A missing or invalid document yields a
//! master with no known nodes, which still runs discovery and reports the
//! UIDs it finds.

use doorlink_core::constants::*;
use doorlink_core::{Error, NodeUid, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Bus controller settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusConfig {
    pub id: u8,
    pub scl_pin: u8,
    pub sda_pin: u8,
    pub freq: u32,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            id: 0,
            scl_pin: 22,
            sda_pin: 21,
            freq: 100_000,
        }
    }
}

/// A node the master knows by UID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaveConfig {
    pub uid: NodeUid,
    pub final_address: u8,
    #[serde(default)]
    pub name: String,
}

impl SlaveConfig {
    pub fn new(uid: NodeUid, final_address: u8, name: impl Into<String>) -> Self {
        Self {
            uid,
            final_address,
            name: name.into(),
        }
    }

    /// Name for logs, falling back to the UID.
    #[must_use]
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            self.uid.as_str()
        } else {
            &self.name
        }
    }
}

/// Scheduling of discovery and polling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub initial_discovery_delay_secs: u64,
    pub discovery_interval_secs: u64,
    pub response_delay_ms: u64,
    pub poll_stagger_ms: u64,
    pub empty_backoff_ms: u64,
    pub offline_timeout_secs: u64,
    pub offline_after_failures: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            initial_discovery_delay_secs: INITIAL_DISCOVERY_DELAY_SECS,
            discovery_interval_secs: DISCOVERY_INTERVAL_SECS,
            response_delay_ms: DISCOVERY_RESPONSE_DELAY_MS,
            poll_stagger_ms: POLL_STAGGER_MS,
            empty_backoff_ms: EMPTY_POLL_BACKOFF_MS,
            offline_timeout_secs: OFFLINE_TIMEOUT_SECS,
            offline_after_failures: DEFAULT_OFFLINE_AFTER_FAILURES,
        }
    }
}

impl PollingConfig {
    #[must_use]
    pub fn initial_discovery_delay(&self) -> Duration {
        Duration::from_secs(self.initial_discovery_delay_secs)
    }

    #[must_use]
    pub fn discovery_interval(&self) -> Duration {
        Duration::from_secs(self.discovery_interval_secs)
    }

    #[must_use]
    pub fn response_delay(&self) -> Duration {
        Duration::from_millis(self.response_delay_ms)
    }

    #[must_use]
    pub fn poll_stagger(&self) -> Duration {
        Duration::from_millis(self.poll_stagger_ms)
    }

    #[must_use]
    pub fn empty_backoff(&self) -> Duration {
        Duration::from_millis(self.empty_backoff_ms)
    }

    #[must_use]
    pub fn offline_timeout(&self) -> Duration {
        Duration::from_secs(self.offline_timeout_secs)
    }
}

/// Master configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct MasterConfig {
    #[serde(default)]
    pub i2c_bus: BusConfig,
    #[serde(default)]
    pub slaves: Vec<SlaveConfig>,
    #[serde(default)]
    pub polling: PollingConfig,
}

impl MasterConfig {
    /// Parse and validate a document.
    ///
    /// # Errors
    /// Returns `Error::Config` if the JSON is malformed or fails
    /// [`validate`](Self::validate).
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize as pretty-printed JSON.
    ///
    /// # Errors
    /// Returns `Error::Config` if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Read and validate the document at `path`.
    ///
    /// # Errors
    /// Returns `Error::Io` if the file cannot be read, otherwise as
    /// [`from_json`](Self::from_json).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Read the document at `path`, or fall back to an empty configuration.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => {
                info!(path = %path.display(), slaves = config.slaves.len(), "configuration loaded");
                config
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "configuration unusable, continuing without known nodes"
                );
                Self::default()
            }
        }
    }

    /// Check the identity table.
    ///
    /// Final addresses must be unique, must not be the unconfigured bus
    /// address, and must lie in the 7-bit range `0x01..=0x77`. UIDs must be
    /// unique. The failure threshold must be at least one.
    ///
    /// # Errors
    /// Returns `Error::Config` naming the first problem found.
    pub fn validate(&self) -> Result<()> {
        let mut addresses = HashSet::new();
        let mut uids = HashSet::new();

        for slave in &self.slaves {
            let address = slave.final_address;
            if address == UNCONFIGURED_BUS_ADDRESS {
                return Err(Error::Config(format!(
                    "{}: address 0x{address:02X} is reserved for unconfigured nodes",
                    slave.uid
                )));
            }
            if !(0x01..=0x77).contains(&address) {
                return Err(Error::Config(format!(
                    "{}: address 0x{address:02X} outside 0x01..=0x77",
                    slave.uid
                )));
            }
            if !addresses.insert(address) {
                return Err(Error::Config(format!(
                    "address 0x{address:02X} assigned twice"
                )));
            }
            if !uids.insert(slave.uid.clone()) {
                return Err(Error::Config(format!("uid {} listed twice", slave.uid)));
            }
        }

        if self.polling.offline_after_failures == 0 {
            return Err(Error::Config(
                "offline_after_failures must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Configured entry for `uid`.
    #[must_use]
    pub fn slave_by_uid(&self, uid: &NodeUid) -> Option<&SlaveConfig> {
        self.slaves.iter().find(|slave| &slave.uid == uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"{
        "I2C_BUS": { "id": 0, "scl_pin": 22, "sda_pin": 21, "freq": 100000 },
        "SLAVES": [
            { "uid": "aabbccdd", "final_address": 5, "name": "Front door" },
            { "uid": "11223344", "final_address": 6 }
        ],
        "POLLING": { "poll_stagger_ms": 50 }
    }"#;

    #[test]
    fn test_parse_sample() {
        let config = MasterConfig::from_json(SAMPLE).unwrap();
        assert_eq!(config.slaves.len(), 2);
        assert_eq!(config.slaves[0].uid.as_str(), "AABBCCDD");
        assert_eq!(config.slaves[0].label(), "Front door");
        assert_eq!(config.slaves[1].label(), "11223344");
        assert_eq!(config.polling.poll_stagger(), Duration::from_millis(50));
        assert_eq!(config.polling.offline_timeout(), Duration::from_secs(45));
        assert_eq!(config.polling.offline_after_failures, 3);
    }

    #[test]
    fn test_lookup_by_uid() {
        let config = MasterConfig::from_json(SAMPLE).unwrap();
        let uid = NodeUid::new("11223344").unwrap();
        assert_eq!(config.slave_by_uid(&uid).unwrap().final_address, 6);
        assert!(config.slave_by_uid(&NodeUid::new("FF").unwrap()).is_none());
    }

    #[rstest]
    #[case::reserved(r#"{"SLAVES":[{"uid":"A1","final_address":8}]}"#)]
    #[case::zero(r#"{"SLAVES":[{"uid":"A1","final_address":0}]}"#)]
    #[case::too_high(r#"{"SLAVES":[{"uid":"A1","final_address":120}]}"#)]
    #[case::dup_address(r#"{"SLAVES":[{"uid":"A1","final_address":5},{"uid":"A2","final_address":5}]}"#)]
    #[case::dup_uid(r#"{"SLAVES":[{"uid":"A1","final_address":5},{"uid":"a1","final_address":6}]}"#)]
    #[case::no_threshold(r#"{"POLLING":{"offline_after_failures":0}}"#)]
    #[case::bad_uid(r#"{"SLAVES":[{"uid":"","final_address":5}]}"#)]
    fn test_rejects_invalid(#[case] json: &str) {
        assert!(matches!(MasterConfig::from_json(json), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_or_default_on_missing_file() {
        let dir = TempDir::new().unwrap();
        let config = MasterConfig::load_or_default(dir.path().join("master.json"));
        assert_eq!(config, MasterConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("master.json");
        std::fs::write(&path, SAMPLE).unwrap();
        assert_eq!(MasterConfig::load(&path).unwrap().slaves.len(), 2);
    }

    #[test]
    fn test_roundtrip() {
        let config = MasterConfig::from_json(SAMPLE).unwrap();
        let json = config.to_json().unwrap();
        assert!(json.contains("\"SLAVES\""));
        assert_eq!(MasterConfig::from_json(&json).unwrap(), config);
    }
}
