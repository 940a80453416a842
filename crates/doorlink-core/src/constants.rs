//! Core constants for the doorlink bus protocol.
//!
//! This module defines the protocol-level constants shared by the bus master,
//! the door-controller nodes, and the emulator. Timing values are expressed in
//! the unit named by the constant suffix.
//!
//! # Binary Frame Structure
//!
//! ```text
//! [TYPE][LEN][FIELD...][XOR]
//!   ^     ^      ^       ^
//!   |     |      |       XOR of every preceding byte
//!   |     |      big-endian, LEN bytes
//!   |     number of field bytes
//!   message type tag
//! ```
//!
//! # Text Frame Structure
//!
//! ```text
//! <{"type":"heartbeat","hub_addr":1}>|48\n
//! ^                                 ^^ ^
//! |                                 || two hex digits: XOR of the JSON characters
//! TEXT_FRAME_START                  |TEXT_CHECKSUM_SEPARATOR
//!                                   TEXT_FRAME_END
//! ```
//!
//! # Usage
//!
//! ```
//! use doorlink_core::constants::*;
//!
//! assert_eq!(UNCONFIGURED_BUS_ADDRESS, 0x08);
//! assert_eq!(TAG_CARD_READ, 0x81);
//! ```

// ============================================================================
// Addressing
// ============================================================================

/// Bus address every binary node answers on until it has been assigned one.
///
/// The master probes this address during discovery.
pub const UNCONFIGURED_BUS_ADDRESS: u8 = 0x08;

/// Hub address carried by text-protocol nodes that have not been configured.
pub const UNCONFIGURED_HUB_ADDRESS: u8 = 0;

/// Byte a binary node transmits when its outbound queue is empty.
pub const IDLE_FILLER: u8 = 0x00;

// ============================================================================
// Binary Message Tags
// ============================================================================

/// Master → node: identify yourself.
pub const TAG_IDENTIFY: u8 = 0x01;

/// Master → node: take a new bus address.
pub const TAG_SET_ADDRESS: u8 = 0x02;

/// Master → node: run the grant feedback sequence.
pub const TAG_FEEDBACK_GRANT: u8 = 0x10;

/// Master → node: run the deny feedback sequence.
pub const TAG_FEEDBACK_DENY: u8 = 0x11;

/// Node → master: identity response.
pub const TAG_IDENTIFY_RESPONSE: u8 = 0x41;

/// Node → master: address change acknowledgement.
pub const TAG_ADDRESS_ACK: u8 = 0x42;

/// Node → master: a credential was read.
pub const TAG_CARD_READ: u8 = 0x81;

/// Node → master: periodic liveness message.
pub const TAG_HEARTBEAT: u8 = 0x82;

/// Node → master: request-to-exit button pressed.
pub const TAG_REX: u8 = 0x83;

/// Node → master: door contact changed state.
pub const TAG_DOOR_CONTACT: u8 = 0x84;

/// Status byte of a successful [`TAG_ADDRESS_ACK`].
pub const STATUS_OK: u8 = 0x01;

/// Header bytes in a binary frame (type + length).
pub const BINARY_HEADER_LEN: usize = 2;

/// Bytes added around the fields of a binary frame (header + checksum).
pub const BINARY_FRAME_OVERHEAD: usize = BINARY_HEADER_LEN + 1;

/// Number of bytes the master reads from a node per transaction.
pub const MAX_RESPONSE_LEN: usize = 32;

// ============================================================================
// Text Framing
// ============================================================================

/// Opening marker of a text frame.
pub const TEXT_FRAME_START: char = '<';

/// Closing marker of the JSON payload.
pub const TEXT_FRAME_END: char = '>';

/// Separator between the closing marker and the checksum digits.
pub const TEXT_CHECKSUM_SEPARATOR: char = '|';

/// Default upper bound for a single text line, in bytes.
///
/// Lines longer than this are discarded by the stream codec.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1024;

// ============================================================================
// Credential Decoder
// ============================================================================

/// Minimum spacing between two accepted edges on one reader, in microseconds.
///
/// Edges closer than this are treated as contact bounce.
pub const MIN_PULSE_WIDTH_US: u64 = 200;

/// Quiet period after the last edge that ends a pulse train, in milliseconds.
pub const IDLE_TIMEOUT_MS: u64 = 50;

/// Upper bound on accumulated bits per train.
pub const MAX_BITS: u8 = 64;

/// Bit length of the standard 26-bit Wiegand format.
pub const WIEGAND_26_BITS: u8 = 26;

// ============================================================================
// Node Timing
// ============================================================================

/// Outbound queue capacity used when none is configured.
pub const DEFAULT_QUEUE_CAPACITY: usize = 20;

/// Interval between input scans (REX and door contact), in milliseconds.
pub const INPUT_POLL_INTERVAL_MS: u64 = 50;

/// Interval between heartbeats, in seconds.
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Delay between acknowledging an address change and restarting, in milliseconds.
pub const RESTART_DELAY_MS: u64 = 1000;

/// Idle poll period of the text node sender, in milliseconds.
pub const SENDER_POLL_INTERVAL_MS: u64 = 20;

// ============================================================================
// Master Timing
// ============================================================================

/// Interval between discovery probes, in seconds.
pub const DISCOVERY_INTERVAL_SECS: u64 = 10;

/// Delay before the first discovery probe, in seconds.
pub const INITIAL_DISCOVERY_DELAY_SECS: u64 = 5;

/// Wait between the identify write and the response read, in milliseconds.
pub const DISCOVERY_RESPONSE_DELAY_MS: u64 = 100;

/// Pause between polling two nodes, in milliseconds.
pub const POLL_STAGGER_MS: u64 = 150;

/// Idle period of the poll loop when no node is known, in milliseconds.
pub const EMPTY_POLL_BACKOFF_MS: u64 = 1000;

/// Age of `last_seen` after which an online node is declared offline, in seconds.
pub const OFFLINE_TIMEOUT_SECS: u64 = 45;

/// Consecutive failed polls before an online node is declared offline.
pub const DEFAULT_OFFLINE_AFTER_FAILURES: u32 = 3;

/// Capacity of the master's application event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;
