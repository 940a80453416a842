//! Liveness table of every node the master knows.
//!
//! Each record follows a small state machine:
//!
//! ```text
//!            valid response             failures / timeout
//!  Unknown ─────────────────► Online ─────────────────────► Offline
//!                               ▲                              │
//!                               └──────── valid response ──────┘
//! ```
//!
//! Failed polls of a node that is not online leave it where it is. Records
//! are never removed; a re-addressed node gets a fresh `Unknown` record.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::SlaveConfig;

/// Liveness of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeStatus {
    Unknown,
    Online,
    Offline,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeStatus::Unknown => write!(f, "unknown"),
            NodeStatus::Online => write!(f, "online"),
            NodeStatus::Offline => write!(f, "offline"),
        }
    }
}

/// Why a node was declared offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfflineReason {
    /// Too many consecutive polls failed.
    PollFailures(u32),
    /// Nothing was heard for longer than the offline timeout.
    Timeout,
}

impl fmt::Display for OfflineReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OfflineReason::PollFailures(n) => write!(f, "{n} failed polls"),
            OfflineReason::Timeout => write!(f, "silent past timeout"),
        }
    }
}

/// State the master keeps per address.
#[derive(Debug, Clone)]
pub struct NodeRecord {
    pub address: u8,
    pub config: SlaveConfig,
    pub status: NodeStatus,
    /// Monotonic time of the last bus presence, for timeouts.
    pub last_seen: Option<Instant>,
    /// Wall-clock time of the last bus presence, for display.
    pub last_seen_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
}

impl NodeRecord {
    #[must_use]
    pub fn new(config: SlaveConfig) -> Self {
        Self {
            address: config.final_address,
            config,
            status: NodeStatus::Unknown,
            last_seen: None,
            last_seen_at: None,
            consecutive_failures: 0,
        }
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        self.status == NodeStatus::Online
    }

    fn touch(&mut self, now: Instant) {
        self.last_seen = Some(now);
        self.last_seen_at = Some(Utc::now());
    }
}

/// Address-keyed node table.
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    records: BTreeMap<u8, NodeRecord>,
}

impl NodeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Table seeded with an `Unknown` record per configured node.
    pub fn seeded<'a>(slaves: impl IntoIterator<Item = &'a SlaveConfig>) -> Self {
        let records = slaves
            .into_iter()
            .map(|slave| (slave.final_address, NodeRecord::new(slave.clone())))
            .collect();
        Self { records }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn get(&self, address: u8) -> Option<&NodeRecord> {
        self.records.get(&address)
    }

    /// Known addresses in ascending order.
    #[must_use]
    pub fn addresses(&self) -> Vec<u8> {
        self.records.keys().copied().collect()
    }

    pub fn records(&self) -> impl Iterator<Item = &NodeRecord> {
        self.records.values()
    }

    #[must_use]
    pub fn status(&self, address: u8) -> Option<NodeStatus> {
        self.records.get(&address).map(|record| record.status)
    }

    /// Replace whatever is known about `config.final_address` with a fresh
    /// `Unknown` record.
    pub fn reset(&mut self, config: SlaveConfig) {
        self.records
            .insert(config.final_address, NodeRecord::new(config));
    }

    /// A valid (possibly empty) response arrived. Returns `true` if the node
    /// just came online.
    pub fn mark_alive(&mut self, address: u8, now: Instant) -> bool {
        let Some(record) = self.records.get_mut(&address) else {
            return false;
        };
        record.touch(now);
        record.consecutive_failures = 0;
        if record.status == NodeStatus::Online {
            return false;
        }
        record.status = NodeStatus::Online;
        true
    }

    /// Something answered but the response was unusable: presence only.
    pub fn mark_present(&mut self, address: u8, now: Instant) {
        if let Some(record) = self.records.get_mut(&address) {
            record.touch(now);
        }
    }

    /// A poll failed. Returns the reason if an online node just went offline.
    pub fn mark_failed(&mut self, address: u8, threshold: u32) -> Option<OfflineReason> {
        let record = self.records.get_mut(&address)?;
        record.consecutive_failures = record.consecutive_failures.saturating_add(1);
        if record.status == NodeStatus::Online && record.consecutive_failures >= threshold {
            record.status = NodeStatus::Offline;
            return Some(OfflineReason::PollFailures(record.consecutive_failures));
        }
        None
    }

    /// Mark every online node silent for longer than `timeout` as offline.
    /// Returns the affected addresses.
    pub fn expire(&mut self, now: Instant, timeout: Duration) -> Vec<u8> {
        let mut expired = Vec::new();
        for record in self.records.values_mut() {
            if record.status != NodeStatus::Online {
                continue;
            }
            let silent = record
                .last_seen
                .is_none_or(|seen| now.saturating_duration_since(seen) > timeout);
            if silent {
                record.status = NodeStatus::Offline;
                expired.push(record.address);
            }
        }
        expired
    }
}
