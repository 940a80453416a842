//! Error types for hardware operations.
//!
//! This module defines error types specific to the node's physical
//! collaborators: card-reader data lines, feedback outputs, and door inputs.

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur while driving or sampling reader lines.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// A reader id that is not part of the configured bank.
    #[error("Unknown reader: {reader_id}")]
    UnknownReader { reader_id: u8 },

    /// Driving or sampling a line failed.
    #[error("Line fault on reader {reader_id}: {message}")]
    LineFault { reader_id: u8, message: String },
}

impl HardwareError {
    /// Create a new unknown reader error.
    pub fn unknown_reader(reader_id: u8) -> Self {
        Self::UnknownReader { reader_id }
    }

    /// Create a new line fault error.
    pub fn line_fault(reader_id: u8, message: impl Into<String>) -> Self {
        Self::LineFault {
            reader_id,
            message: message.into(),
        }
    }

    /// Reader the error refers to.
    #[must_use]
    pub fn reader_id(&self) -> u8 {
        match self {
            Self::UnknownReader { reader_id } | Self::LineFault { reader_id, .. } => *reader_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_reader_error() {
        let error = HardwareError::unknown_reader(7);
        assert!(matches!(error, HardwareError::UnknownReader { reader_id: 7 }));
        assert_eq!(error.to_string(), "Unknown reader: 7");
    }

    #[test]
    fn test_line_fault_error() {
        let error = HardwareError::line_fault(2, "buzzer driver stuck");
        assert_eq!(
            error.to_string(),
            "Line fault on reader 2: buzzer driver stuck"
        );
        assert_eq!(error.reader_id(), 2);
    }
}
