//! Mock feedback outputs that record every transition.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;

use crate::error::{HardwareError, Result};
use crate::feedback::FeedbackOutputs;
use crate::types::OutputLine;

/// One recorded output write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputChange {
    pub reader_id: u8,
    pub line: OutputLine,
    pub on: bool,
    pub at: Instant,
}

#[derive(Debug, Default)]
struct State {
    readers: HashSet<u8>,
    levels: HashMap<(u8, OutputLine), bool>,
    changes: Vec<OutputChange>,
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock output driver for a fixed set of readers.
///
/// # Examples
///
/// ```
/// use doorlink_hardware::feedback::FeedbackOutputs;
/// use doorlink_hardware::mock::MockOutputs;
/// use doorlink_hardware::types::OutputLine;
///
/// let (outputs, handle) = MockOutputs::new([1]);
/// outputs.set(1, OutputLine::GreenLed, true).unwrap();
/// assert!(handle.is_on(1, OutputLine::GreenLed));
/// assert!(outputs.set(2, OutputLine::GreenLed, true).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct MockOutputs {
    state: Arc<Mutex<State>>,
}

impl MockOutputs {
    /// Create outputs for `reader_ids`, all lines off.
    pub fn new(reader_ids: impl IntoIterator<Item = u8>) -> (Self, MockOutputsHandle) {
        let state = Arc::new(Mutex::new(State {
            readers: reader_ids.into_iter().collect(),
            ..State::default()
        }));

        (
            Self {
                state: Arc::clone(&state),
            },
            MockOutputsHandle { state },
        )
    }
}

impl FeedbackOutputs for MockOutputs {
    fn set(&self, reader_id: u8, line: OutputLine, on: bool) -> Result<()> {
        let mut state = lock(&self.state);
        if !state.readers.contains(&reader_id) {
            return Err(HardwareError::unknown_reader(reader_id));
        }

        state.levels.insert((reader_id, line), on);
        state.changes.push(OutputChange {
            reader_id,
            line,
            on,
            at: Instant::now(),
        });
        Ok(())
    }
}

/// Inspection handle for [`MockOutputs`].
#[derive(Debug, Clone)]
pub struct MockOutputsHandle {
    state: Arc<Mutex<State>>,
}

impl MockOutputsHandle {
    /// Current level of a line.
    pub fn is_on(&self, reader_id: u8, line: OutputLine) -> bool {
        lock(&self.state)
            .levels
            .get(&(reader_id, line))
            .copied()
            .unwrap_or(false)
    }

    /// Every write so far, oldest first.
    pub fn changes(&self) -> Vec<OutputChange> {
        lock(&self.state).changes.clone()
    }

    /// Writes for one reader.
    pub fn changes_for(&self, reader_id: u8) -> Vec<OutputChange> {
        lock(&self.state)
            .changes
            .iter()
            .filter(|c| c.reader_id == reader_id)
            .copied()
            .collect()
    }

    pub fn clear(&self) {
        lock(&self.state).changes.clear();
    }
}
