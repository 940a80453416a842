//! Wire-level frames and the shared XOR integrity rule.
//!
//! Both encodings protect their payload with the same 8-bit checksum: the XOR
//! of every payload byte. A frame type in this module only exists once its
//! checksum has been verified, so holding a [`BinaryFrame`] or [`TextFrame`]
//! is proof of integrity. Interpreting the payload as a [`Message`] is a
//! separate step (see [`crate::binary`] and [`crate::text`]), which keeps
//! unknown message types a dispatcher concern rather than a framing one.
//!
//! # Binary Frame
//! ```text
//! 81 06 02 1A 00 00 03 E8 74
//! ^^ ^^ ^^^^^^^^^^^^^^^^^ ^^
//! |  |  fields            XOR of all preceding bytes
//! |  field length
//! type tag
//! ```
//!
//! # Text Frame
//! ```text
//! <{"type":"heartbeat","hub_addr":1}>|48\n
//! ```
//!
//! [`Message`]: crate::Message

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;
use doorlink_core::{Error, Result, constants::*};

/// XOR of every byte in `data`.
///
/// # Examples
/// ```
/// use doorlink_protocol::frame::xor_checksum;
///
/// assert_eq!(xor_checksum(&[]), 0);
/// assert_eq!(xor_checksum(&[0x81, 0x06, 0x02, 0x1A, 0x00, 0x00, 0x03, 0xE8]), 0x74);
/// ```
#[must_use]
pub fn xor_checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc ^ b)
}

/// Result of reading one binary transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinaryPacket {
    /// The single `0x00` filler: the node had nothing queued.
    Idle,
    /// A checksum-verified frame.
    Frame(BinaryFrame),
}

/// A checksum-verified binary frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryFrame {
    /// Tag, length, and fields (checksum excluded).
    payload: Bytes,
}

impl BinaryFrame {
    /// Build a frame from a tag and its encoded fields.
    ///
    /// # Errors
    /// Returns `Error::FrameTooLarge` if the fields do not fit the length byte.
    pub fn new(tag: u8, fields: &[u8]) -> Result<Self> {
        if fields.len() > u8::MAX as usize {
            return Err(Error::FrameTooLarge {
                size: fields.len(),
                max_size: u8::MAX as usize,
            });
        }

        let mut buf = BytesMut::with_capacity(BINARY_HEADER_LEN + fields.len());
        buf.put_u8(tag);
        buf.put_u8(fields.len() as u8);
        buf.put_slice(fields);

        Ok(Self {
            payload: buf.freeze(),
        })
    }

    /// Parse one transaction's bytes.
    ///
    /// # Errors
    /// - `Error::Truncated` when fewer than header + checksum bytes arrived
    /// - `Error::ChecksumMismatch` when the trailer does not match
    /// - `Error::LengthMismatch` when the length byte disagrees with the data
    pub fn parse(data: &[u8]) -> Result<BinaryPacket> {
        if data == [IDLE_FILLER] {
            return Ok(BinaryPacket::Idle);
        }

        if data.len() < BINARY_FRAME_OVERHEAD {
            return Err(Error::Truncated {
                needed: BINARY_FRAME_OVERHEAD,
                actual: data.len(),
            });
        }

        let (payload, trailer) = data.split_at(data.len() - 1);
        let expected = xor_checksum(payload);
        if trailer[0] != expected {
            return Err(Error::ChecksumMismatch {
                expected,
                actual: trailer[0],
            });
        }

        let declared = payload[1] as usize;
        let actual = payload.len() - BINARY_HEADER_LEN;
        if declared != actual {
            return Err(Error::LengthMismatch { declared, actual });
        }

        Ok(BinaryPacket::Frame(Self {
            payload: Bytes::copy_from_slice(payload),
        }))
    }

    /// Message type tag.
    #[must_use]
    pub fn tag(&self) -> u8 {
        self.payload[0]
    }

    /// Field bytes following the header.
    #[must_use]
    pub fn fields(&self) -> &[u8] {
        &self.payload[BINARY_HEADER_LEN..]
    }

    /// Checksum of this frame.
    #[must_use]
    pub fn checksum(&self) -> u8 {
        xor_checksum(&self.payload)
    }

    /// Wire bytes: payload followed by the checksum.
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.payload.len() + 1);
        buf.put_slice(&self.payload);
        buf.put_u8(self.checksum());
        buf.freeze()
    }
}

impl fmt::Display for BinaryFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex: Vec<String> = self
            .to_bytes()
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect();
        write!(f, "{}", hex.join(" "))
    }
}

/// A checksum-verified text frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFrame {
    /// Compact JSON between the `<` and `>` markers.
    payload: String,
}

impl TextFrame {
    /// Wrap a serialized JSON payload.
    #[must_use]
    pub fn new(payload: String) -> Self {
        Self { payload }
    }

    /// Parse one received line.
    ///
    /// Surrounding whitespace (including the trailing newline) is ignored, the
    /// checksum is split off at the last `|`, and its hex digits compare
    /// case-insensitively.
    ///
    /// # Errors
    /// - `Error::InvalidMessageFormat` for missing `<`, `>` or `|` markers or
    ///   a checksum that is not two hex digits
    /// - `Error::ChecksumMismatch` when the checksum does not match
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();

        if !line.starts_with(TEXT_FRAME_START) {
            return Err(Error::InvalidMessageFormat(
                "missing '<' start marker".to_string(),
            ));
        }

        let Some((framed, received)) = line.rsplit_once(TEXT_CHECKSUM_SEPARATOR) else {
            return Err(Error::InvalidMessageFormat(
                "missing '|' checksum separator".to_string(),
            ));
        };

        if framed.len() < 2 || !framed.ends_with(TEXT_FRAME_END) {
            return Err(Error::InvalidMessageFormat(
                "missing '>' end marker".to_string(),
            ));
        }

        if received.len() != 2 || !received.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::InvalidMessageFormat(format!(
                "checksum must be two hex digits, got '{received}'"
            )));
        }
        let actual = u8::from_str_radix(received, 16).map_err(|_| {
            Error::InvalidMessageFormat(format!("checksum '{received}' is not hex"))
        })?;

        let payload = &framed[1..framed.len() - 1];
        let expected = xor_checksum(payload.as_bytes());
        if actual != expected {
            return Err(Error::ChecksumMismatch { expected, actual });
        }

        Ok(Self {
            payload: payload.to_string(),
        })
    }

    /// The verified JSON payload.
    #[must_use]
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Checksum of the payload characters.
    #[must_use]
    pub fn checksum(&self) -> u8 {
        xor_checksum(self.payload.as_bytes())
    }

    /// Full wire line including the trailing newline.
    #[must_use]
    pub fn to_line(&self) -> String {
        format!(
            "{TEXT_FRAME_START}{}{TEXT_FRAME_END}{TEXT_CHECKSUM_SEPARATOR}{:02X}\n",
            self.payload,
            self.checksum()
        )
    }
}

impl fmt::Display for TextFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_line().trim_end())
    }
}
