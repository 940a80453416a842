//! The addressed bus as seen by its single initiator.
//!
//! The master never talks to a node unprompted by its own schedule: every
//! exchange is a write of one frame, a read of one frame, or both. Concrete
//! transports (an I2C controller, the in-memory bus of the emulator) live
//! outside this crate and implement [`AddressedBus`].

use bytes::Bytes;

use crate::error::BusResult;

/// Initiator side of an addressed bus.
///
/// **NOTE**: This trait uses native `async fn` and is therefore not object
/// safe; the engine is generic over it instead.
pub trait AddressedBus: Send {
    /// Write `data` to the device at `address`.
    ///
    /// # Errors
    /// Returns `BusError::NoDevice` if nobody acknowledges the address.
    async fn write(&mut self, address: u8, data: &[u8]) -> BusResult<()>;

    /// Read up to `max_len` bytes from the device at `address`.
    ///
    /// Hardware buses may pad the result to `max_len`; callers trim to the
    /// frame length.
    ///
    /// # Errors
    /// Returns `BusError::NoDevice` if nobody acknowledges the address.
    async fn read(&mut self, address: u8, max_len: usize) -> BusResult<Bytes>;

    /// Addresses that currently acknowledge, if the transport can tell.
    ///
    /// # Errors
    /// Returns the transport error if the scan itself fails.
    async fn scan(&mut self) -> BusResult<Vec<u8>> {
        Ok(Vec::new())
    }
}

/// Cut a possibly padded read down to the single frame it starts with.
///
/// A leading `0x00` is the idle filler. Otherwise the length byte decides;
/// reads shorter than their declared length are returned unchanged so the
/// decoder can reject them.
#[must_use]
pub fn trim_response(data: &[u8]) -> &[u8] {
    match data {
        [] => data,
        [0x00, ..] => &data[..1],
        [_, len, ..] => {
            let total = usize::from(*len) + doorlink_core::constants::BINARY_FRAME_OVERHEAD;
            data.get(..total).unwrap_or(data)
        }
        [_] => data,
    }
}
