//! Door-controller node runtime.
//!
//! A node sits between up to a handful of door readers and the bus master.
//! It decodes card reads, watches the request-to-exit button and door
//! contact of every door, and plays grant/deny feedback when told to. All of
//! it is reported to the master through a bounded [`OutboundQueue`].
//!
//! Two transports are supported:
//!
//! - [`BinaryNode`] + [`BusSlave`]: compact binary frames on an addressed bus
//!   where the master polls each node in turn.
//! - [`TextNode`]: newline-delimited text frames on a shared serial stream.
//!
//! Both share the same event loop and [`Dispatcher`]. A node boots at its
//! unconfigured address, answers identify requests, and stays silent
//! otherwise until the master assigns it an address. The assignment is
//! persisted through an [`AddressStore`] and the run ends with
//! [`NodeExit::Restart`]; the owner starts a fresh node on the new address.
//!
//! # Example
//!
//! ```
//! use doorlink_core::{DeviceKind, NodeUid};
//! use doorlink_hardware::{ReaderBank, mock::{MockInputs, MockOutputs}};
//! use doorlink_node::{BinaryNode, MemoryAddressStore, NodeHardware, NodeSettings};
//! use doorlink_protocol::{Message, binary};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread", start_paused = true)]
//! # async fn main() {
//! let (outputs, _) = MockOutputs::new([1, 2]);
//! let (inputs, _) = MockInputs::new([1, 2]);
//! let hardware = NodeHardware::new(Arc::new(ReaderBank::new([1, 2])), outputs, inputs);
//!
//! let (node, slave) = BinaryNode::boot(
//!     NodeUid::new("AABBCCDD").unwrap(),
//!     DeviceKind::Esp32,
//!     MemoryAddressStore::new(),
//!     hardware,
//!     NodeSettings::default(),
//! );
//! tokio::spawn(node.run());
//!
//! slave.on_receive(&binary::encode_to_bytes(&Message::Identify).unwrap());
//! tokio::time::sleep(std::time::Duration::from_millis(100)).await;
//!
//! let reply = binary::decode_bytes(&slave.on_transmit()).unwrap();
//! assert!(matches!(reply, Some(Message::IdentifyResponse { address: 0x08, .. })));
//! # }
//! ```

pub mod bus;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod identity;
pub mod outbox;
pub mod queue;
pub mod runtime;
pub mod serial;

pub use bus::{BinaryNode, BusSlave};
pub use config::{DoorConfig, NodeConfig, UartConfig};
pub use dispatcher::{Dispatcher, NodeAction};
pub use error::{NodeError, Result};
pub use identity::{AddressFile, AddressStore, ConfigAddressStore, MemoryAddressStore, NodeIdentity};
pub use outbox::{BinaryEncoder, FrameEncoder, Outbox, TextEncoder};
pub use queue::OutboundQueue;
pub use runtime::{NodeExit, NodeHardware, NodeSettings};
pub use serial::TextNode;
