//! Error types for the node runtime.

use doorlink_hardware::HardwareError;

/// Result type alias for node operations.
pub type Result<T> = std::result::Result<T, NodeError>;

/// Errors raised by the node runtime.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// Encoding, decoding, queueing or configuration failure.
    #[error(transparent)]
    Protocol(#[from] doorlink_core::Error),

    /// A reader line could not be driven or sampled.
    #[error(transparent)]
    Hardware(#[from] HardwareError),

    /// The transport failed.
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Persisted state could not be read or written.
    #[error("Storage error at {path}: {message}")]
    Storage { path: String, message: String },
}

impl NodeError {
    /// Create a new storage error.
    pub fn storage(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Storage {
            path: path.into(),
            message: message.into(),
        }
    }
}
