use crate::{
    Result,
    constants::{UNCONFIGURED_BUS_ADDRESS, UNCONFIGURED_HUB_ADDRESS},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length of a node unique identifier.
///
/// Bounded by the single length byte of the binary identity response.
pub const MAX_UID_LENGTH: usize = 64;

/// Hardware-derived unique identifier of a node (uppercase hex by convention).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeUid(String);

impl NodeUid {
    /// Create a node UID with validation.
    ///
    /// The value is trimmed and uppercased before validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidUid` if the identifier is empty, longer than
    /// [`MAX_UID_LENGTH`], or contains characters outside printable ASCII.
    pub fn new(uid: &str) -> Result<Self> {
        let uid = uid.trim().to_uppercase();

        if uid.is_empty() || uid.len() > MAX_UID_LENGTH {
            return Err(Error::InvalidUid(format!(
                "length must be 1-{MAX_UID_LENGTH}, got {}",
                uid.len()
            )));
        }

        if !uid.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(Error::InvalidUid(format!("'{uid}' is not printable ASCII")));
        }

        Ok(NodeUid(uid))
    }

    /// Build a UID from raw hardware id bytes (hex encoded, uppercase).
    ///
    /// # Errors
    /// Returns `Error::InvalidUid` if `bytes` is empty or too long.
    pub fn from_hardware_id(bytes: &[u8]) -> Result<Self> {
        let hex: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
        NodeUid::new(&hex)
    }

    /// Get the UID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeUid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for NodeUid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        NodeUid::new(s)
    }
}

impl TryFrom<String> for NodeUid {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        NodeUid::new(&value)
    }
}

impl From<NodeUid> for String {
    fn from(uid: NodeUid) -> Self {
        uid.0
    }
}

/// Hardware family a node runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// Unspecified node; reported as `"identity"` in text frames.
    Generic,
    Esp32,
    Rp2040,
}

impl DeviceKind {
    /// Parse a binary device-kind code.
    ///
    /// # Errors
    /// Returns `Error::InvalidField` for unknown codes.
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0x00 => Ok(DeviceKind::Generic),
            0x01 => Ok(DeviceKind::Esp32),
            0x02 => Ok(DeviceKind::Rp2040),
            _ => Err(Error::invalid_field(
                "device_kind",
                format!("unknown code 0x{code:02X}"),
            )),
        }
    }

    /// Binary device-kind code.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            DeviceKind::Generic => 0x00,
            DeviceKind::Esp32 => 0x01,
            DeviceKind::Rp2040 => 0x02,
        }
    }

    /// Text `type` tag used in identity responses.
    #[must_use]
    pub fn as_type_tag(self) -> &'static str {
        match self {
            DeviceKind::Generic => "identity",
            DeviceKind::Esp32 => "esp32",
            DeviceKind::Rp2040 => "rp2040",
        }
    }

    /// Parse a text `type` tag, returning `None` if it names no device kind.
    #[must_use]
    pub fn from_type_tag(tag: &str) -> Option<Self> {
        match tag {
            "identity" => Some(DeviceKind::Generic),
            "esp32" => Some(DeviceKind::Esp32),
            "rp2040" => Some(DeviceKind::Rp2040),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_type_tag())
    }
}

/// Door contact state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum DoorState {
    Closed = 0,
    Open = 1,
}

impl DoorState {
    /// Create a door state from its binary encoding.
    ///
    /// # Errors
    /// Returns `Error::InvalidField` if the value is not 0 or 1.
    #[inline]
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(DoorState::Closed),
            1 => Ok(DoorState::Open),
            _ => Err(Error::invalid_field(
                "state",
                format!("expected 0 or 1, got {value}"),
            )),
        }
    }

    /// Binary encoding (1 = open, 0 = closed).
    #[inline]
    #[must_use]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Door state for a contact input level (high = open).
    #[inline]
    #[must_use]
    pub fn from_level(high: bool) -> Self {
        if high { DoorState::Open } else { DoorState::Closed }
    }

    /// Text encoding.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DoorState::Closed => "closed",
            DoorState::Open => "open",
        }
    }

    /// Parse the text encoding.
    ///
    /// # Errors
    /// Returns `Error::InvalidField` for anything but `"open"` / `"closed"`.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "open" => Ok(DoorState::Open),
            "closed" => Ok(DoorState::Closed),
            other => Err(Error::invalid_field(
                "state",
                format!("expected \"open\" or \"closed\", got \"{other}\""),
            )),
        }
    }
}

impl fmt::Display for DoorState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Feedback sequence requested by the master.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackKind {
    Grant,
    Deny,
}

impl FeedbackKind {
    /// Text `cmd` value.
    #[must_use]
    pub fn as_command(self) -> &'static str {
        match self {
            FeedbackKind::Grant => "feedback_grant",
            FeedbackKind::Deny => "feedback_deny",
        }
    }
}

impl fmt::Display for FeedbackKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FeedbackKind::Grant => write!(f, "GRANT"),
            FeedbackKind::Deny => write!(f, "DENY"),
        }
    }
}

/// Outcome reported in an address acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Success,
    Failure,
}

impl AckStatus {
    /// Binary status byte.
    #[must_use]
    pub fn to_u8(self) -> u8 {
        match self {
            AckStatus::Success => crate::constants::STATUS_OK,
            AckStatus::Failure => 0x00,
        }
    }

    /// Parse a binary status byte; anything but `STATUS_OK` is a failure.
    #[must_use]
    pub fn from_u8(value: u8) -> Self {
        if value == crate::constants::STATUS_OK {
            AckStatus::Success
        } else {
            AckStatus::Failure
        }
    }

    /// Text status value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AckStatus::Success => "success",
            AckStatus::Failure => "failure",
        }
    }

    /// Parse the text status value.
    ///
    /// # Errors
    /// Returns `Error::InvalidField` for unrecognised strings.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "success" => Ok(AckStatus::Success),
            "failure" => Ok(AckStatus::Failure),
            other => Err(Error::invalid_field(
                "status",
                format!("unknown status \"{other}\""),
            )),
        }
    }
}

/// A completed, parity-valid credential read.
///
/// Produced once per pulse train by the credential decoder and consumed
/// exactly once by the message layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReaderEvent {
    pub reader_id: u8,
    pub code: u64,
    pub bit_length: u8,
}

impl ReaderEvent {
    #[must_use]
    pub fn new(reader_id: u8, code: u64, bit_length: u8) -> Self {
        Self {
            reader_id,
            code,
            bit_length,
        }
    }
}

impl fmt::Display for ReaderEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "reader {} code {} ({} bits)",
            self.reader_id, self.code, self.bit_length
        )
    }
}

/// Wire format a deployment speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// Compact binary frames over an addressed bus.
    Binary,
    /// JSON text frames over a serial stream.
    Text,
}

impl WireFormat {
    /// Address a node of this format holds before it is configured.
    #[must_use]
    pub fn unconfigured_address(self) -> u8 {
        match self {
            WireFormat::Binary => UNCONFIGURED_BUS_ADDRESS,
            WireFormat::Text => UNCONFIGURED_HUB_ADDRESS,
        }
    }
}

impl fmt::Display for WireFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WireFormat::Binary => write!(f, "binary"),
            WireFormat::Text => write!(f, "text"),
        }
    }
}
