//! Bounded outbound FIFO between event producers and the transport sender.
//!
//! Producers never block: when the queue is full the *new* frame is dropped
//! and [`Error::QueueFull`] is returned after a warning is logged. Frames
//! already queued keep their order. There is a single consumer.

use doorlink_core::constants::DEFAULT_QUEUE_CAPACITY;
use doorlink_core::{Error, Result};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::warn;

/// Drop-newest FIFO of encoded frames.
///
/// # Examples
///
/// ```
/// use doorlink_node::OutboundQueue;
///
/// let queue = OutboundQueue::with_capacity(2);
/// queue.enqueue("a").unwrap();
/// queue.enqueue("b").unwrap();
/// assert!(queue.enqueue("c").is_err());
///
/// assert_eq!(queue.dequeue(), Some("a"));
/// assert_eq!(queue.dequeue(), Some("b"));
/// assert_eq!(queue.dequeue(), None);
/// ```
#[derive(Debug)]
pub struct OutboundQueue<F> {
    items: Mutex<VecDeque<F>>,
    capacity: usize,
}

impl<F> OutboundQueue<F> {
    /// Queue with the default capacity of 20 frames.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Queue holding at most `capacity` frames (at least one).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<F>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `frame`, or drop it if the queue is full.
    ///
    /// # Errors
    /// Returns [`Error::QueueFull`] when the frame was dropped.
    pub fn enqueue(&self, frame: F) -> Result<()> {
        let mut items = self.lock();
        if items.len() >= self.capacity {
            warn!(capacity = self.capacity, "outbound queue full, dropping newest frame");
            return Err(Error::QueueFull {
                capacity: self.capacity,
            });
        }
        items.push_back(frame);
        Ok(())
    }

    /// Pop the oldest frame.
    pub fn dequeue(&self) -> Option<F> {
        self.lock().pop_front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<F> Default for OutboundQueue<F> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_default_capacity() {
        let queue: OutboundQueue<u8> = OutboundQueue::new();
        assert_eq!(queue.capacity(), 20);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_overflow_drops_newest_and_keeps_order() {
        let queue = OutboundQueue::with_capacity(20);
        for i in 0..25u8 {
            let result = queue.enqueue(i);
            assert_eq!(result.is_ok(), i < 20, "frame {i}");
        }
        assert_eq!(queue.len(), 20);

        let drained: Vec<u8> = std::iter::from_fn(|| queue.dequeue()).collect();
        assert_eq!(drained, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_overflow_reports_capacity() {
        let queue = OutboundQueue::with_capacity(1);
        queue.enqueue(1).unwrap();
        assert!(matches!(
            queue.enqueue(2),
            Err(Error::QueueFull { capacity: 1 })
        ));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let queue = OutboundQueue::with_capacity(0);
        assert_eq!(queue.capacity(), 1);
        assert!(queue.enqueue('x').is_ok());
    }

    #[test]
    fn test_many_producers_never_exceed_capacity() {
        let queue = Arc::new(OutboundQueue::with_capacity(8));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let queue = Arc::clone(&queue);
                std::thread::spawn(move || {
                    for i in 0..10 {
                        let _ = queue.enqueue(t * 100 + i);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(queue.len(), 8);
    }
}
