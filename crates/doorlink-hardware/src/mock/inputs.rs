//! Mock door inputs whose levels a test sets directly.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{HardwareError, Result};
use crate::inputs::InputLines;
use crate::types::InputLine;

#[derive(Debug, Default)]
struct State {
    levels: HashMap<(u8, InputLine), bool>,
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock input sampler.
///
/// Every reader starts with REX released (high) and the door closed (low).
#[derive(Debug, Clone)]
pub struct MockInputs {
    state: Arc<Mutex<State>>,
}

impl MockInputs {
    pub fn new(reader_ids: impl IntoIterator<Item = u8>) -> (Self, MockInputsHandle) {
        let mut levels = HashMap::new();
        for reader_id in reader_ids {
            levels.insert((reader_id, InputLine::Rex), true);
            levels.insert((reader_id, InputLine::Contact), false);
        }
        let state = Arc::new(Mutex::new(State { levels }));

        (
            Self {
                state: Arc::clone(&state),
            },
            MockInputsHandle { state },
        )
    }
}

impl InputLines for MockInputs {
    fn level(&self, reader_id: u8, line: InputLine) -> Result<bool> {
        lock(&self.state)
            .levels
            .get(&(reader_id, line))
            .copied()
            .ok_or_else(|| HardwareError::unknown_reader(reader_id))
    }
}

/// Control handle for [`MockInputs`].
#[derive(Debug, Clone)]
pub struct MockInputsHandle {
    state: Arc<Mutex<State>>,
}

impl MockInputsHandle {
    /// Force a raw line level.
    pub fn set(&self, reader_id: u8, line: InputLine, high: bool) {
        lock(&self.state).levels.insert((reader_id, line), high);
    }

    /// Hold the REX button down (`true`) or release it.
    pub fn press_rex(&self, reader_id: u8, pressed: bool) {
        self.set(reader_id, InputLine::Rex, !pressed);
    }

    /// Open (`true`) or close the door.
    pub fn set_door_open(&self, reader_id: u8, open: bool) {
        self.set(reader_id, InputLine::Contact, open);
    }
}
