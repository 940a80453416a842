//! Physical collaborators of a door node.
//!
//! A node drives up to a handful of door readers. Each reader has two
//! Wiegand data lines, three feedback outputs (green LED, red LED, buzzer),
//! and two inputs (request-to-exit button and door contact). This crate
//! models those lines and the logic that sits directly on top of them:
//!
//! - [`decoder`]: the per-reader Wiegand bit accumulator with debounce,
//!   saturation and 26-bit parity.
//! - [`bank`]: the fixed set of decoders plus the idle finalizer task that
//!   publishes completed reads.
//! - [`feedback`]: the grant and deny LED/buzzer sequences.
//! - [`inputs`]: edge detection over periodic input samples.
//! - [`mock`]: in-memory implementations used by tests and the emulator.
//!
//! Line access goes through two small traits, [`FeedbackOutputs`] and
//! [`InputLines`]. They are synchronous on purpose: a GPIO write or read
//! never blocks, and the timing lives in the async callers.
//!
//! # Example
//!
//! ```
//! use doorlink_core::FeedbackKind;
//! use doorlink_hardware::{mock::MockOutputs, run_feedback, types::OutputLine};
//!
//! # #[tokio::main(flavor = "current_thread", start_paused = true)]
//! # async fn main() {
//! let (outputs, handle) = MockOutputs::new([1]);
//! run_feedback(&outputs, 1, FeedbackKind::Grant).await.unwrap();
//!
//! // Every sequence ends with its lines switched off.
//! assert!(!handle.is_on(1, OutputLine::GreenLed));
//! # }
//! ```

pub mod bank;
pub mod decoder;
pub mod error;
pub mod feedback;
pub mod inputs;
pub mod mock;
pub mod types;

pub use bank::ReaderBank;
pub use decoder::{FinalizeOutcome, PulseOutcome, WiegandDecoder};
pub use error::{HardwareError, Result};
pub use feedback::{FeedbackOutputs, FeedbackStep, run_feedback};
pub use inputs::{DoorInputTracker, InputChange, InputLines};
pub use types::{DataLine, InputLine, OutputLine};
