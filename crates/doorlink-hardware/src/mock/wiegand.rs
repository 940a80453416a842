//! Simulated card reader that clocks credentials into a [`ReaderBank`].

use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

use crate::bank::ReaderBank;
use crate::decoder::wiegand_26;
use crate::error::Result;
use crate::types::DataLine;

/// Typical spacing between Wiegand bits on real readers.
const DEFAULT_BIT_INTERVAL: Duration = Duration::from_millis(2);

/// Mock Wiegand reader wired to one slot of a bank.
///
/// # Examples
///
/// ```
/// use doorlink_hardware::{ReaderBank, mock::MockWiegandReader};
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread", start_paused = true)]
/// # async fn main() -> doorlink_hardware::Result<()> {
/// let bank = Arc::new(ReaderBank::new([1]));
/// let reader = MockWiegandReader::new(Arc::clone(&bank), 1);
///
/// reader.present(0b1011, 4).await?;
/// assert_eq!(bank.next_deadline().is_some(), true);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MockWiegandReader {
    bank: Arc<ReaderBank>,
    reader_id: u8,
    bit_interval: Duration,
}

impl MockWiegandReader {
    pub fn new(bank: Arc<ReaderBank>, reader_id: u8) -> Self {
        Self {
            bank,
            reader_id,
            bit_interval: DEFAULT_BIT_INTERVAL,
        }
    }

    /// Use a custom spacing between bits.
    #[must_use]
    pub fn with_bit_interval(mut self, bit_interval: Duration) -> Self {
        self.bit_interval = bit_interval;
        self
    }

    #[must_use]
    pub fn reader_id(&self) -> u8 {
        self.reader_id
    }

    /// Clock `bits` bits of `data` out, most significant first.
    ///
    /// # Errors
    /// Returns `HardwareError::UnknownReader` if the reader is not in the bank.
    pub async fn present(&self, data: u64, bits: u8) -> Result<()> {
        trace!(reader_id = self.reader_id, bits, "presenting credential");

        for i in (0..u32::from(bits)).rev() {
            let bit = data.checked_shr(i).unwrap_or(0) & 1;
            self.bank.pulse(self.reader_id, DataLine::for_bit(bit))?;
            tokio::time::sleep(self.bit_interval).await;
        }
        Ok(())
    }

    /// Present a parity-correct 26-bit card and return the frame value.
    ///
    /// # Errors
    /// Same as [`present`](Self::present).
    pub async fn present_card_26(&self, facility: u8, card: u16) -> Result<u64> {
        let frame = wiegand_26(facility, card);
        self.present(frame, 26).await?;
        Ok(frame)
    }

    /// Emit a single edge followed by a bounce inside the debounce window.
    ///
    /// # Errors
    /// Same as [`present`](Self::present).
    pub async fn bouncy_edge(&self, line: DataLine) -> Result<()> {
        self.bank.pulse(self.reader_id, line)?;
        tokio::time::sleep(Duration::from_micros(50)).await;
        self.bank.pulse(self.reader_id, line)?;
        tokio::time::sleep(self.bit_interval).await;
        Ok(())
    }
}
