//! Tokio codec for newline-delimited text frames.
//!
//! [`TextCodec`] lets a serial port (or any `AsyncRead + AsyncWrite`) be used
//! as a `Framed` stream of [`Envelope`]s.
//!
//! # Rejected lines are items, not errors
//!
//! A `Framed` stream ends at the first decoder error. Noise on a serial line
//! must not do that, so the decoder's item is itself a [`Result`]: a line that
//! fails framing or message validation is yielded as `Some(Err(..))` and the
//! next line decodes normally. Only I/O failures surface as stream errors.
//!
//! ```text
//! bytes -> LinesCodec -> TextFrame::parse -> text::decode -> Result<Envelope>
//! Envelope -> text::encode_line -> bytes
//! ```
//!
//! # Usage with Tokio Framed
//!
//! ```rust,no_run
//! use doorlink_protocol::{Envelope, Message, TextCodec};
//! use futures::{SinkExt, StreamExt};
//! use tokio_util::codec::Framed;
//!
//! # async fn example(port: tokio::io::DuplexStream) -> doorlink_core::Result<()> {
//! let mut framed = Framed::new(port, TextCodec::new());
//!
//! framed.send(Envelope::new(1, Message::grant(2))).await?;
//!
//! while let Some(item) = framed.next().await {
//!     match item? {
//!         Ok(envelope) => println!("received {envelope}"),
//!         Err(e) => eprintln!("dropped line: {e}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use bytes::BytesMut;
use std::io;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

use crate::{message::Envelope, text};
use doorlink_core::{Error, Result, constants::DEFAULT_MAX_LINE_LENGTH};

/// Tokio codec for text-protocol envelopes.
#[derive(Debug)]
pub struct TextCodec {
    lines: LinesCodec,

    /// Maximum line length in bytes, newline excluded.
    max_line_length: usize,
}

impl TextCodec {
    /// Create a codec with the default 1 KiB line limit.
    ///
    /// # Example
    ///
    /// ```
    /// use doorlink_protocol::TextCodec;
    ///
    /// let codec = TextCodec::new();
    /// assert_eq!(codec.max_line_length(), 1024);
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_line_length(DEFAULT_MAX_LINE_LENGTH)
    }

    /// Create a codec with a custom line limit.
    ///
    /// Longer lines are discarded up to their newline and reported once as
    /// `Error::FrameTooLarge`.
    #[must_use]
    pub fn with_max_line_length(max_line_length: usize) -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(max_line_length),
            max_line_length,
        }
    }

    #[must_use]
    pub fn max_line_length(&self) -> usize {
        self.max_line_length
    }

    /// Pull lines until one is worth reporting.
    fn next_item(&mut self, src: &mut BytesMut, eof: bool) -> Result<Option<Result<Envelope>>> {
        loop {
            let next = if eof {
                self.lines.decode_eof(src)
            } else {
                self.lines.decode(src)
            };

            let line = match next {
                Ok(Some(line)) => line,
                Ok(None) => return Ok(None),
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    return Ok(Some(Err(Error::FrameTooLarge {
                        size: self.max_line_length + 1,
                        max_size: self.max_line_length,
                    })));
                }
                Err(LinesCodecError::Io(e)) if e.kind() == io::ErrorKind::InvalidData => {
                    return Ok(Some(Err(Error::InvalidMessageFormat(
                        "line is not valid UTF-8".to_string(),
                    ))));
                }
                Err(LinesCodecError::Io(e)) => return Err(Error::Io(e)),
            };

            if line.trim().is_empty() {
                continue;
            }
            return Ok(Some(text::decode_line(&line)));
        }
    }
}

impl Default for TextCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for TextCodec {
    type Item = Result<Envelope>;
    type Error = Error;

    /// Decode the next non-blank line.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Ok(envelope)))` - a valid frame
    /// - `Ok(Some(Err(e)))` - a line was rejected and dropped
    /// - `Ok(None)` - need more data
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.next_item(src, false)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.next_item(src, true)
    }
}

impl Encoder<Envelope> for TextCodec {
    type Error = Error;

    /// Encode an envelope as one line.
    ///
    /// # Errors
    ///
    /// Returns `Error::FrameTooLarge` if the line would exceed the limit.
    fn encode(&mut self, item: Envelope, dst: &mut BytesMut) -> Result<()> {
        let line = text::encode_line(&item)?;

        // The newline is not counted against the limit.
        if line.len() - 1 > self.max_line_length {
            return Err(Error::FrameTooLarge {
                size: line.len() - 1,
                max_size: self.max_line_length,
            });
        }

        dst.extend_from_slice(line.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Message;

    const HEARTBEAT: &[u8] = b"<{\"type\":\"heartbeat\",\"hub_addr\":1}>|48\n";

    #[test]
    fn test_codec_default() {
        let codec = TextCodec::default();
        assert_eq!(codec.max_line_length(), DEFAULT_MAX_LINE_LENGTH);
    }

    #[test]
    fn test_decode_complete_line() {
        let mut codec = TextCodec::new();
        let mut buffer = BytesMut::from(HEARTBEAT);

        let item = codec.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(item.unwrap(), Envelope::new(1, Message::Heartbeat));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_decode_partial_line() {
        let mut codec = TextCodec::new();
        let mut buffer = BytesMut::from(&HEARTBEAT[..10]);

        assert!(codec.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(&HEARTBEAT[10..]);
        assert!(codec.decode(&mut buffer).unwrap().unwrap().is_ok());
    }

    #[test]
    fn test_rejected_line_does_not_end_stream() {
        let mut codec = TextCodec::new();
        let mut buffer = BytesMut::from(&b"garbage\n"[..]);
        buffer.extend_from_slice(HEARTBEAT);

        let first = codec.decode(&mut buffer).unwrap().unwrap();
        assert!(matches!(first, Err(Error::InvalidMessageFormat(_))));

        let second = codec.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(second.unwrap(), Envelope::new(1, Message::Heartbeat));
    }

    #[test]
    fn test_blank_lines_skipped() {
        let mut codec = TextCodec::new();
        let mut buffer = BytesMut::from(&b"\n\r\n"[..]);
        buffer.extend_from_slice(HEARTBEAT);

        assert!(codec.decode(&mut buffer).unwrap().unwrap().is_ok());
    }

    #[test]
    fn test_oversized_line_discarded() {
        let mut codec = TextCodec::with_max_line_length(64);
        let mut buffer = BytesMut::from(&[b'x'; 100][..]);
        buffer.extend_from_slice(b"\n");
        buffer.extend_from_slice(HEARTBEAT);

        let first = codec.decode(&mut buffer).unwrap().unwrap();
        assert!(matches!(first, Err(Error::FrameTooLarge { max_size: 64, .. })));

        let second = codec.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(second.unwrap(), Envelope::new(1, Message::Heartbeat));
    }

    #[test]
    fn test_decode_eof_without_newline() {
        let mut codec = TextCodec::new();
        let mut buffer = BytesMut::from(&HEARTBEAT[..HEARTBEAT.len() - 1]);

        assert!(codec.decode(&mut buffer).unwrap().is_none());
        assert!(codec.decode_eof(&mut buffer).unwrap().unwrap().is_ok());
    }

    #[test]
    fn test_encode_line() {
        let mut codec = TextCodec::new();
        let mut buffer = BytesMut::new();

        codec
            .encode(Envelope::new(1, Message::Heartbeat), &mut buffer)
            .unwrap();
        assert_eq!(&buffer[..], HEARTBEAT);
    }

    #[test]
    fn test_encode_too_large() {
        let mut codec = TextCodec::with_max_line_length(8);
        let mut buffer = BytesMut::new();

        let result = codec.encode(Envelope::new(1, Message::Heartbeat), &mut buffer);
        assert!(matches!(result, Err(Error::FrameTooLarge { .. })));
        assert!(buffer.is_empty());
    }
}
