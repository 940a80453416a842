//! Bus master for door-controller nodes.
//!
//! [`MasterEngine`] owns the addressed bus. It discovers nodes waiting on the
//! unconfigured address, moves the ones listed in [`MasterConfig`] to their
//! final address, and then polls every known address in turn. Node liveness
//! lives in the [`NodeRegistry`]; card reads and exit requests are answered
//! with feedback chosen by an [`AccessPolicy`]; everything else is published
//! as a [`MasterEvent`].
//!
//! [`SerialMonitor`] is the counterpart for text-protocol nodes on a serial
//! link, where an operator issues the commands instead.

#![allow(async_fn_in_trait)]

pub mod bus;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod monitor;
pub mod policy;
pub mod registry;

pub use bus::{AddressedBus, trim_response};
pub use config::{BusConfig, MasterConfig, PollingConfig, SlaveConfig};
pub use engine::{DiscoveryOutcome, MasterEngine, PollOutcome};
pub use error::{BusError, BusResult};
pub use events::MasterEvent;
pub use monitor::{HubStatus, SerialMonitor};
pub use policy::{AccessPolicy, CardAllowList, GrantAll};
pub use registry::{NodeRecord, NodeRegistry, NodeStatus, OfflineReason};
