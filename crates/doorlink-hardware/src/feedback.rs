//! Feedback actuation: LEDs and buzzer sequences on a reader.
//!
//! Sequences are data. A [`FeedbackStep`] either drives one output or waits,
//! and [`run_feedback`] plays a sequence to completion. There is no
//! cancellation: a second command for the same reader simply runs alongside
//! and the last write to a line wins.
//!
//! | Kind | Sequence |
//! |---|---|
//! | grant | green on, red off, buzzer on · 250 ms · buzzer off · 1500 ms · green off |
//! | deny | green off, red on, buzzer on · 150 ms · buzzer off · 100 ms · buzzer on · 150 ms · buzzer off · 1500 ms · red off |

use doorlink_core::FeedbackKind;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::Result;
use crate::types::OutputLine;

/// Driver for the feedback outputs of every reader on a node.
///
/// Writes are immediate; implementations must not block.
pub trait FeedbackOutputs: Send + Sync {
    /// Switch `line` of `reader_id` on or off.
    ///
    /// # Errors
    /// Returns `HardwareError::UnknownReader` for an unconfigured reader or
    /// `HardwareError::LineFault` if the output could not be driven.
    fn set(&self, reader_id: u8, line: OutputLine, on: bool) -> Result<()>;
}

impl<T: FeedbackOutputs + ?Sized> FeedbackOutputs for Arc<T> {
    fn set(&self, reader_id: u8, line: OutputLine, on: bool) -> Result<()> {
        (**self).set(reader_id, line, on)
    }
}

/// One step of a feedback sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackStep {
    Set(OutputLine, bool),
    Wait(Duration),
}

use FeedbackStep::{Set, Wait};
use OutputLine::{Buzzer, GreenLed, RedLed};

/// Success indicator plus one short tone.
pub const GRANT_SEQUENCE: &[FeedbackStep] = &[
    Set(GreenLed, true),
    Set(RedLed, false),
    Set(Buzzer, true),
    Wait(Duration::from_millis(250)),
    Set(Buzzer, false),
    Wait(Duration::from_millis(1500)),
    Set(GreenLed, false),
];

/// Failure indicator plus a double tone.
pub const DENY_SEQUENCE: &[FeedbackStep] = &[
    Set(GreenLed, false),
    Set(RedLed, true),
    Set(Buzzer, true),
    Wait(Duration::from_millis(150)),
    Set(Buzzer, false),
    Wait(Duration::from_millis(100)),
    Set(Buzzer, true),
    Wait(Duration::from_millis(150)),
    Set(Buzzer, false),
    Wait(Duration::from_millis(1500)),
    Set(RedLed, false),
];

/// Steps played for `kind`.
#[must_use]
pub fn sequence_for(kind: FeedbackKind) -> &'static [FeedbackStep] {
    match kind {
        FeedbackKind::Grant => GRANT_SEQUENCE,
        FeedbackKind::Deny => DENY_SEQUENCE,
    }
}

/// Total wall time of a sequence.
#[must_use]
pub fn sequence_duration(steps: &[FeedbackStep]) -> Duration {
    steps
        .iter()
        .map(|step| match step {
            Wait(d) => *d,
            Set(..) => Duration::ZERO,
        })
        .sum()
}

/// Play the `kind` sequence on `reader_id`.
///
/// A failed write is logged and the sequence continues, so the closing
/// "off" steps still run; the first failure is returned at the end.
///
/// # Errors
/// The first error reported by `outputs`.
pub async fn run_feedback<O: FeedbackOutputs + ?Sized>(
    outputs: &O,
    reader_id: u8,
    kind: FeedbackKind,
) -> Result<()> {
    debug!(reader_id, %kind, "feedback sequence started");
    let mut first_error = None;

    for step in sequence_for(kind) {
        match *step {
            Set(line, on) => {
                if let Err(e) = outputs.set(reader_id, line, on) {
                    warn!(reader_id, %line, on, error = %e, "feedback output failed");
                    first_error.get_or_insert(e);
                }
            }
            Wait(duration) => tokio::time::sleep(duration).await,
        }
    }

    debug!(reader_id, %kind, "feedback sequence finished");
    first_error.map_or(Ok(()), Err)
}
