//! Door inputs: request-to-exit button and door contact.
//!
//! [`InputLines`] samples raw levels. [`DoorInputTracker`] turns successive
//! samples into [`InputChange`]s:
//!
//! - REX fires on a transition from high (released) to low (pressed). The
//!   line is assumed released before the first sample.
//! - The contact fires on every level change, including the first sample.
//!   High means open.

use doorlink_core::DoorState;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use crate::error::Result;
use crate::types::InputLine;

/// Level sampler for the door inputs of every reader on a node.
pub trait InputLines: Send + Sync {
    /// Current level of `line` on `reader_id` (`true` = high).
    ///
    /// # Errors
    /// Returns `HardwareError::UnknownReader` or `HardwareError::LineFault`.
    fn level(&self, reader_id: u8, line: InputLine) -> Result<bool>;
}

impl<T: InputLines + ?Sized> InputLines for Arc<T> {
    fn level(&self, reader_id: u8, line: InputLine) -> Result<bool> {
        (**self).level(reader_id, line)
    }
}

/// A change worth reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputChange {
    RexPressed { reader_id: u8 },
    Contact { reader_id: u8, state: DoorState },
}

#[derive(Debug, Clone, Copy)]
struct LastLevels {
    rex: bool,
    contact: Option<bool>,
}

impl Default for LastLevels {
    fn default() -> Self {
        Self {
            rex: true,
            contact: None,
        }
    }
}

/// Edge detector over periodic input samples.
#[derive(Debug, Default)]
pub struct DoorInputTracker {
    last: HashMap<u8, LastLevels>,
}

impl DoorInputTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one sample for a reader.
    pub fn observe(&mut self, reader_id: u8, rex: bool, contact: bool) -> Vec<InputChange> {
        let last = self.last.entry(reader_id).or_default();
        let mut changes = Vec::new();

        if !rex && last.rex {
            changes.push(InputChange::RexPressed { reader_id });
        }
        last.rex = rex;

        if last.contact != Some(contact) {
            changes.push(InputChange::Contact {
                reader_id,
                state: DoorState::from_level(contact),
            });
        }
        last.contact = Some(contact);

        changes
    }

    /// Sample every reader in `reader_ids` and collect the changes.
    ///
    /// A reader whose lines cannot be read is skipped for this scan.
    pub fn scan<I: InputLines + ?Sized>(
        &mut self,
        inputs: &I,
        reader_ids: impl IntoIterator<Item = u8>,
    ) -> Vec<InputChange> {
        let mut changes = Vec::new();

        for reader_id in reader_ids {
            let sample = inputs
                .level(reader_id, InputLine::Rex)
                .and_then(|rex| Ok((rex, inputs.level(reader_id, InputLine::Contact)?)));

            match sample {
                Ok((rex, contact)) => changes.extend(self.observe(reader_id, rex, contact)),
                Err(e) => warn!(reader_id, error = %e, "cannot sample door inputs"),
            }
        }

        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockInputs;

    #[test]
    fn test_first_sample_reports_contact_only() {
        let mut tracker = DoorInputTracker::new();
        let changes = tracker.observe(1, true, false);
        assert_eq!(
            changes,
            vec![InputChange::Contact {
                reader_id: 1,
                state: DoorState::Closed
            }]
        );
        assert!(tracker.observe(1, true, false).is_empty());
    }

    #[test]
    fn test_rex_fires_on_falling_edge_only() {
        let mut tracker = DoorInputTracker::new();
        tracker.observe(1, true, false);

        assert_eq!(
            tracker.observe(1, false, false),
            vec![InputChange::RexPressed { reader_id: 1 }]
        );
        // Held down: no repeat.
        assert!(tracker.observe(1, false, false).is_empty());
        // Released: nothing.
        assert!(tracker.observe(1, true, false).is_empty());
        assert_eq!(tracker.observe(1, false, false).len(), 1);
    }

    #[test]
    fn test_rex_pressed_at_first_sample_fires() {
        let mut tracker = DoorInputTracker::new();
        let changes = tracker.observe(1, false, true);
        assert!(changes.contains(&InputChange::RexPressed { reader_id: 1 }));
        assert!(changes.contains(&InputChange::Contact {
            reader_id: 1,
            state: DoorState::Open
        }));
    }

    #[test]
    fn test_scan_skips_unknown_readers() {
        let (inputs, handle) = MockInputs::new([1, 2]);
        handle.set(2, InputLine::Contact, true);

        let mut tracker = DoorInputTracker::new();
        let changes = tracker.scan(&inputs, [1, 2, 7]);

        assert_eq!(changes.len(), 2);
        assert!(changes.contains(&InputChange::Contact {
            reader_id: 2,
            state: DoorState::Open
        }));
    }
}
