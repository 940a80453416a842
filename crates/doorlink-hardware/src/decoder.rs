//! Wiegand credential decoder.
//!
//! A reader clocks a credential out as falling edges on two lines: an edge on
//! `D0` is a 0 bit, an edge on `D1` a 1 bit. The decoder accumulates those
//! bits and, once the lines have been quiet for [`IDLE_TIMEOUT_MS`], turns the
//! train into a [`ReaderEvent`].
//!
//! [`WiegandDecoder`] is a pure state machine. It never reads a clock itself;
//! every edge carries its timestamp, and the caller decides when the idle
//! deadline has passed. This keeps the edge path allocation-free and lets tests
//! drive it with exact timings.
//!
//! # Rules
//!
//! - An edge closer than [`MIN_PULSE_WIDTH_US`] to the previous *accepted*
//!   edge is contact bounce and is ignored.
//! - At most [`MAX_BITS`] bits are recorded. Further edges still count as
//!   activity and push the idle deadline out.
//! - A 26-bit train must have even parity over its high 13 bits and odd
//!   parity over its low 13 bits. Other lengths are passed through unchecked.
//!
//! # Examples
//!
//! ```
//! use doorlink_hardware::decoder::{FinalizeOutcome, WiegandDecoder};
//! use doorlink_hardware::types::DataLine;
//! use std::time::Duration;
//! use tokio::time::Instant;
//!
//! let mut decoder = WiegandDecoder::new(1);
//! let mut at = Instant::now();
//! for bit in [1, 0, 1] {
//!     decoder.on_pulse(DataLine::for_bit(bit), at);
//!     at += Duration::from_millis(2);
//! }
//!
//! match decoder.finalize() {
//!     FinalizeOutcome::Event(event) => assert_eq!((event.code, event.bit_length), (0b101, 3)),
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```
//!
//! [`IDLE_TIMEOUT_MS`]: doorlink_core::constants::IDLE_TIMEOUT_MS
//! [`MIN_PULSE_WIDTH_US`]: doorlink_core::constants::MIN_PULSE_WIDTH_US
//! [`MAX_BITS`]: doorlink_core::constants::MAX_BITS

use doorlink_core::{ReaderEvent, constants::*};
use std::time::Duration;
use tokio::time::Instant;

use crate::types::DataLine;

/// Minimum spacing between accepted edges.
pub const MIN_PULSE_WIDTH: Duration = Duration::from_micros(MIN_PULSE_WIDTH_US);

/// Quiet period that ends a pulse train.
pub const IDLE_TIMEOUT: Duration = Duration::from_millis(IDLE_TIMEOUT_MS);

/// What happened to a single edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseOutcome {
    /// The bit was shifted in.
    Accepted,
    /// Too close to the previous accepted edge; ignored entirely.
    Bounced,
    /// The train already holds [`MAX_BITS`] bits; the bit was dropped but the
    /// idle deadline moved.
    Saturated,
}

/// Result of closing a pulse train.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// No bits were accumulated.
    Empty,
    /// A valid credential.
    Event(ReaderEvent),
    /// A 26-bit train failed its parity check.
    ParityRejected { data: u64, bit_length: u8 },
}

/// Per-reader bit accumulator.
#[derive(Debug, Clone)]
pub struct WiegandDecoder {
    reader_id: u8,
    data: u64,
    bit_count: u8,
    last_pulse: Option<Instant>,
}

impl WiegandDecoder {
    #[must_use]
    pub fn new(reader_id: u8) -> Self {
        Self {
            reader_id,
            data: 0,
            bit_count: 0,
            last_pulse: None,
        }
    }

    #[must_use]
    pub fn reader_id(&self) -> u8 {
        self.reader_id
    }

    /// Bits accumulated in the current train.
    #[must_use]
    pub fn bit_count(&self) -> u8 {
        self.bit_count
    }

    /// Record a falling edge observed at `at`.
    pub fn on_pulse(&mut self, line: DataLine, at: Instant) -> PulseOutcome {
        if let Some(last) = self.last_pulse {
            if at.saturating_duration_since(last) < MIN_PULSE_WIDTH {
                return PulseOutcome::Bounced;
            }
        }
        self.last_pulse = Some(at);

        if self.bit_count >= MAX_BITS {
            return PulseOutcome::Saturated;
        }

        self.data = (self.data << 1) | line.bit();
        self.bit_count += 1;
        PulseOutcome::Accepted
    }

    /// Instant at which the current train times out, if one is in progress.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        if self.bit_count == 0 {
            return None;
        }
        self.last_pulse.map(|last| last + IDLE_TIMEOUT)
    }

    /// Returns `true` once a train is in progress and its deadline has passed.
    #[must_use]
    pub fn is_expired(&self, now: Instant) -> bool {
        self.deadline().is_some_and(|deadline| now >= deadline)
    }

    /// Close the current train and reset the accumulator.
    ///
    /// The debounce reference is kept so an edge right after a finalize is
    /// still filtered.
    pub fn finalize(&mut self) -> FinalizeOutcome {
        let data = self.data;
        let bit_length = self.bit_count;
        self.data = 0;
        self.bit_count = 0;

        if bit_length == 0 {
            return FinalizeOutcome::Empty;
        }

        if bit_length == WIEGAND_26_BITS && !check_parity_26(data) {
            return FinalizeOutcome::ParityRejected { data, bit_length };
        }

        FinalizeOutcome::Event(ReaderEvent::new(self.reader_id, data, bit_length))
    }
}

/// Parity rule of the 26-bit format: the high 13 bits have an even number of
/// ones, the low 13 bits an odd number.
#[must_use]
pub fn check_parity_26(data: u64) -> bool {
    const HALF_MASK: u64 = 0x1FFF;
    let high = (data >> 13) & HALF_MASK;
    let low = data & HALF_MASK;
    high.count_ones() % 2 == 0 && low.count_ones() % 2 == 1
}

/// Build a parity-correct 26-bit frame from a facility code and card number.
///
/// Layout: even parity bit, 8 facility bits, 16 card bits, odd parity bit.
#[must_use]
pub fn wiegand_26(facility: u8, card: u16) -> u64 {
    let payload = (u64::from(facility) << 16) | u64::from(card);
    // Bits 24..13 of the final frame are the top 12 payload bits.
    let high_ones = (payload >> 12).count_ones();
    let low_ones = (payload & 0x0FFF).count_ones();
    let even = u64::from(high_ones % 2 == 1);
    let odd = u64::from(low_ones % 2 == 0);
    (even << 25) | (payload << 1) | odd
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn feed(decoder: &mut WiegandDecoder, data: u64, bits: u8, start: Instant) -> Instant {
        let mut at = start;
        for i in (0..bits).rev() {
            decoder.on_pulse(DataLine::for_bit((data >> i) & 1), at);
            at += Duration::from_millis(2);
        }
        at
    }

    #[test]
    fn test_debounce_ignores_close_edges() {
        let mut decoder = WiegandDecoder::new(1);
        let t0 = Instant::now();

        assert_eq!(decoder.on_pulse(DataLine::D1, t0), PulseOutcome::Accepted);
        assert_eq!(
            decoder.on_pulse(DataLine::D0, t0 + Duration::from_micros(150)),
            PulseOutcome::Bounced
        );
        assert_eq!(
            decoder.on_pulse(DataLine::D0, t0 + Duration::from_micros(199)),
            PulseOutcome::Bounced
        );
        assert_eq!(
            decoder.on_pulse(DataLine::D0, t0 + Duration::from_micros(200)),
            PulseOutcome::Accepted
        );
        assert_eq!(decoder.bit_count(), 2);
    }

    #[test]
    fn test_bounce_measured_from_last_accepted_edge() {
        let mut decoder = WiegandDecoder::new(1);
        let t0 = Instant::now();

        decoder.on_pulse(DataLine::D1, t0);
        // Bounced edges do not move the reference point.
        decoder.on_pulse(DataLine::D1, t0 + Duration::from_micros(100));
        decoder.on_pulse(DataLine::D1, t0 + Duration::from_micros(190));
        assert_eq!(
            decoder.on_pulse(DataLine::D1, t0 + Duration::from_micros(210)),
            PulseOutcome::Accepted
        );
    }

    #[test]
    fn test_saturates_at_64_bits() {
        let mut decoder = WiegandDecoder::new(1);
        let end = feed(&mut decoder, u64::MAX, 64, Instant::now());
        assert_eq!(decoder.bit_count(), 64);

        assert_eq!(decoder.on_pulse(DataLine::D0, end), PulseOutcome::Saturated);
        assert_eq!(decoder.bit_count(), 64);
        assert_eq!(decoder.deadline(), Some(end + IDLE_TIMEOUT));

        match decoder.finalize() {
            FinalizeOutcome::Event(event) => {
                assert_eq!(event.code, u64::MAX);
                assert_eq!(event.bit_length, 64);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_deadline_tracks_last_edge() {
        let mut decoder = WiegandDecoder::new(1);
        let t0 = Instant::now();
        assert_eq!(decoder.deadline(), None);

        decoder.on_pulse(DataLine::D0, t0);
        assert!(!decoder.is_expired(t0 + Duration::from_millis(49)));
        assert!(decoder.is_expired(t0 + IDLE_TIMEOUT));
    }

    #[test]
    fn test_valid_26_bit_frame() {
        let mut decoder = WiegandDecoder::new(3);
        let code = wiegand_26(0x12, 0x3456);
        assert!(check_parity_26(code));

        feed(&mut decoder, code, 26, Instant::now());

        assert_eq!(
            decoder.finalize(),
            FinalizeOutcome::Event(ReaderEvent::new(3, code, 26))
        );
        assert_eq!(decoder.bit_count(), 0);
        assert_eq!(decoder.finalize(), FinalizeOutcome::Empty);
    }

    #[test]
    fn test_bad_parity_rejected() {
        let mut decoder = WiegandDecoder::new(1);
        let code = wiegand_26(0x12, 0x3456) ^ 0b10;
        feed(&mut decoder, code, 26, Instant::now());

        assert_eq!(
            decoder.finalize(),
            FinalizeOutcome::ParityRejected {
                data: code,
                bit_length: 26
            }
        );
        assert_eq!(decoder.bit_count(), 0);
    }

    #[test]
    fn test_other_lengths_skip_parity() {
        let mut decoder = WiegandDecoder::new(1);
        // 34 bits with arbitrary content.
        feed(&mut decoder, 0x2_0000_0001, 34, Instant::now());
        assert!(matches!(decoder.finalize(), FinalizeOutcome::Event(_)));
    }

    #[test]
    fn test_parity_rule() {
        // high half: one bit set (odd) -> fails
        assert!(!check_parity_26(1 << 13 | 1));
        // high half empty (even), low half one bit (odd) -> passes
        assert!(check_parity_26(1));
        // low half empty (even) -> fails
        assert!(!check_parity_26(0));
    }

    #[rstest]
    #[case(0, 0)]
    #[case(0x12, 0x3456)]
    #[case(0xFF, 0xFFFF)]
    #[case(1, 1000)]
    fn test_wiegand_26_builder_is_parity_valid(#[case] facility: u8, #[case] card: u16) {
        let frame = wiegand_26(facility, card);
        assert!(check_parity_26(frame));
        assert_eq!((frame >> 1) & 0xFFFF, u64::from(card));
        assert_eq!((frame >> 17) & 0xFF, u64::from(facility));
        assert!(frame < 1 << 26);
    }

    #[test]
    fn test_card_1000_frame_is_parity_valid() {
        // 1000 = 0b1111101000: high half empty, low half six ones.
        assert!(!check_parity_26(1000));
        assert!(check_parity_26(wiegand_26(0, 1000)));
    }
}
