//! Fixed set of credential readers sharing one idle finalizer.
//!
//! Readers are configured once. The bank builds an arena of decoder slots
//! plus a reader-id → slot index, so the edge path is a map lookup and a short
//! lock on that reader's slot. Nothing on the edge path allocates or awaits.
//!
//! ```text
//!  edge (reader 2, D1) ──► slot[1].lock ──► WiegandDecoder::on_pulse
//!                                │
//!                                └─ train started ──► Notify
//!
//!  run_finalizer task: sleep_until(next deadline) or Notify
//!        └─► finalize expired slots ──► mpsc<ReaderEvent>
//! ```
//!
//! The finalizer hands completed reads to an ordinary channel, which is where
//! the node turns them into outbound messages.

use doorlink_core::ReaderEvent;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::{Notify, mpsc};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::decoder::{FinalizeOutcome, PulseOutcome, WiegandDecoder};
use crate::error::{HardwareError, Result};
use crate::types::DataLine;

#[derive(Debug)]
struct ReaderSlot {
    reader_id: u8,
    decoder: Mutex<WiegandDecoder>,
}

impl ReaderSlot {
    fn lock(&self) -> MutexGuard<'_, WiegandDecoder> {
        // Every decoder update is a single assignment pair; poison is harmless.
        self.decoder.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Decoder arena for every configured reader.
#[derive(Debug)]
pub struct ReaderBank {
    slots: Vec<ReaderSlot>,
    index: HashMap<u8, usize>,
    wake: Notify,
}

impl ReaderBank {
    /// Build a bank for the given reader ids.
    ///
    /// Duplicate ids are skipped with a warning; the first occurrence wins.
    pub fn new(reader_ids: impl IntoIterator<Item = u8>) -> Self {
        let mut slots = Vec::new();
        let mut index = HashMap::new();

        for reader_id in reader_ids {
            if index.contains_key(&reader_id) {
                warn!(reader_id, "duplicate reader id in configuration, ignoring");
                continue;
            }
            index.insert(reader_id, slots.len());
            slots.push(ReaderSlot {
                reader_id,
                decoder: Mutex::new(WiegandDecoder::new(reader_id)),
            });
        }

        debug!(readers = slots.len(), "reader bank initialized");

        Self {
            slots,
            index,
            wake: Notify::new(),
        }
    }

    /// Number of configured readers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns `true` if `reader_id` is configured.
    #[must_use]
    pub fn contains(&self, reader_id: u8) -> bool {
        self.index.contains_key(&reader_id)
    }

    /// Configured reader ids in slot order.
    pub fn reader_ids(&self) -> impl Iterator<Item = u8> + '_ {
        self.slots.iter().map(|slot| slot.reader_id)
    }

    /// Record an edge on `reader_id` at the current time.
    ///
    /// # Errors
    /// Returns `HardwareError::UnknownReader` for an unconfigured reader.
    pub fn pulse(&self, reader_id: u8, line: DataLine) -> Result<PulseOutcome> {
        self.pulse_at(reader_id, line, Instant::now())
    }

    /// Record an edge on `reader_id` observed at `at`.
    ///
    /// # Errors
    /// Returns `HardwareError::UnknownReader` for an unconfigured reader.
    pub fn pulse_at(&self, reader_id: u8, line: DataLine, at: Instant) -> Result<PulseOutcome> {
        let slot = self
            .index
            .get(&reader_id)
            .map(|&i| &self.slots[i])
            .ok_or_else(|| HardwareError::unknown_reader(reader_id))?;

        let (outcome, started) = {
            let mut decoder = slot.lock();
            let was_idle = decoder.bit_count() == 0;
            let outcome = decoder.on_pulse(line, at);
            (outcome, was_idle && outcome == PulseOutcome::Accepted)
        };

        // Later edges only push the deadline out; the finalizer re-reads it
        // when the earlier one fires.
        if started {
            self.wake.notify_one();
        }

        Ok(outcome)
    }

    /// Earliest pending idle deadline across all readers.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.slots
            .iter()
            .filter_map(|slot| slot.lock().deadline())
            .min()
    }

    /// Finalize every reader whose train has timed out by `now`.
    ///
    /// Parity failures are logged and dropped.
    pub fn finalize_expired(&self, now: Instant) -> Vec<ReaderEvent> {
        let mut events = Vec::new();

        for slot in &self.slots {
            let mut decoder = slot.lock();
            if !decoder.is_expired(now) {
                continue;
            }

            match decoder.finalize() {
                FinalizeOutcome::Event(event) => {
                    trace!(
                        reader_id = event.reader_id,
                        bits = event.bit_length,
                        "credential decoded"
                    );
                    events.push(event);
                }
                FinalizeOutcome::ParityRejected { data, bit_length } => {
                    warn!(
                        reader_id = slot.reader_id,
                        data = %format!("{data:#x}"),
                        bit_length,
                        "parity error, discarding read"
                    );
                }
                FinalizeOutcome::Empty => {}
            }
        }

        events
    }

    /// Deliver completed reads to `events` until the receiver is dropped.
    ///
    /// Runs as a single background task per bank. A full channel drops the
    /// read with a warning.
    pub async fn run_finalizer(&self, events: mpsc::Sender<ReaderEvent>) {
        loop {
            match self.next_deadline() {
                Some(deadline) => {
                    tokio::select! {
                        _ = tokio::time::sleep_until(deadline) => {}
                        _ = self.wake.notified() => {}
                    }
                }
                None => self.wake.notified().await,
            }

            for event in self.finalize_expired(Instant::now()) {
                match events.try_send(event) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(event)) => {
                        warn!(
                            reader_id = event.reader_id,
                            "reader event channel full, dropping read"
                        );
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        debug!("reader event receiver dropped, stopping finalizer");
                        return;
                    }
                }
            }

            if events.is_closed() {
                return;
            }
        }
    }
}
