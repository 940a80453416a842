use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Framing errors
    #[error("Invalid message format: {0}")]
    InvalidMessageFormat(String),

    #[error("Checksum mismatch: expected {expected:02X}, got {actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    #[error("Truncated frame: need at least {needed} bytes, got {actual}")]
    Truncated { needed: usize, actual: usize },

    #[error("Length mismatch: header declares {declared} payload bytes, frame carries {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("Frame too large: {size} bytes (max {max_size})")]
    FrameTooLarge { size: usize, max_size: usize },

    // Message errors
    #[error("Unknown message type: {0}")]
    UnknownMessageType(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Message cannot be represented in {format} encoding: {reason}")]
    Unrepresentable {
        format: &'static str,
        reason: String,
    },

    #[error("Invalid unique id: {0}")]
    InvalidUid(String),

    // Queue errors
    #[error("Outbound queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create an invalid field error.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` for errors that only concern a single frame.
    ///
    /// Framing errors never invalidate the transport they arrived on; the
    /// offending frame is dropped and reading continues.
    #[must_use]
    pub fn is_frame_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidMessageFormat(_)
                | Error::ChecksumMismatch { .. }
                | Error::Truncated { .. }
                | Error::LengthMismatch { .. }
                | Error::FrameTooLarge { .. }
                | Error::UnknownMessageType(_)
                | Error::MissingField(_)
                | Error::InvalidField { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
