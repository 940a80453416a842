//! Bus transport errors.

/// Result type alias for bus transactions.
pub type BusResult<T> = std::result::Result<T, BusError>;

/// Failure of a single bus transaction.
///
/// None of these are fatal to the master: each one counts as a missed poll
/// for the addressed node.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// No device acknowledged the address.
    #[error("No device at address 0x{address:02X}")]
    NoDevice { address: u8 },

    /// The device did not finish the transaction in time.
    #[error("Timeout talking to 0x{address:02X}")]
    Timeout { address: u8 },

    /// Bus-level fault such as arbitration loss or a stuck line.
    #[error("Bus I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The message has no binary encoding.
    #[error("Cannot encode frame: {0}")]
    Encode(#[from] doorlink_core::Error),
}

impl BusError {
    /// Create a new no-device error.
    pub fn no_device(address: u8) -> Self {
        Self::NoDevice { address }
    }

    /// Create a new timeout error.
    pub fn timeout(address: u8) -> Self {
        Self::Timeout { address }
    }

    /// Returns `true` if the address simply had nobody listening.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::NoDevice { .. })
    }
}
