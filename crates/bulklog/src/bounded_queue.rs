//! Fixed-capacity FIFO buffering.
//!
//! [`BoundedQueue`] is a thread-safe bounded FIFO buffer with
//! drop-oldest-on-overflow semantics. It decouples producer rate from
//! dispatch rate when the backend is unavailable: enqueue never blocks
//! and never fails, and memory stays bounded at the configured capacity.
//!
//! # Eviction Behavior
//!
//! When the queue is full and a new item arrives:
//! 1. The oldest item (front of queue) is removed and dropped
//! 2. A warning is logged indicating data loss
//! 3. The new item is appended at the back
//!
//! # Synchronization
//!
//! All operations are mutually exclusive behind a single lock per
//! instance. This is a coarse-grained but correct bounded buffer, not a
//! high-throughput lock-free structure; log volumes are bursty but
//! bounded by this capacity anyway, so correctness wins over throughput.

use std::collections::VecDeque;
use std::sync::Mutex;

use tracing::warn;

use crate::error::{ConfigError, QueueError};

/// Thread-safe bounded FIFO buffer with drop-oldest eviction.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    items: Mutex<VecDeque<T>>,
    capacity: usize,
}

#[allow(clippy::expect_used)]
impl<T> BoundedQueue<T> {
    /// Creates a queue bounded at `capacity` items.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidCapacity`] if `capacity` is zero.
    /// Negative capacities are unrepresentable in this API.
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::InvalidCapacity);
        }
        Ok(BoundedQueue {
            items: Mutex::new(VecDeque::with_capacity(capacity.min(10_000))),
            capacity,
        })
    }

    /// Appends an item, evicting the single oldest item first when the
    /// queue is at capacity. Never blocks, never fails.
    pub fn enqueue(&self, item: T) {
        let mut items = self.items.lock().expect("lock poisoned");
        if items.len() >= self.capacity {
            items.pop_front();
            warn!(
                capacity = self.capacity,
                "bounded queue full, dropping oldest item"
            );
        }
        items.push_back(item);
    }

    /// Removes and returns the oldest item.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Empty`] if the queue holds no items.
    pub fn dequeue(&self) -> Result<T, QueueError> {
        self.items
            .lock()
            .expect("lock poisoned")
            .pop_front()
            .ok_or(QueueError::Empty)
    }

    /// Removes and returns up to `max` oldest items, in FIFO order.
    ///
    /// Returns an empty vector when the queue is empty.
    pub fn dequeue_up_to(&self, max: usize) -> Vec<T> {
        let mut items = self.items.lock().expect("lock poisoned");
        let count = max.min(items.len());
        items.drain(..count).collect()
    }

    /// Empties the queue.
    pub fn clear(&self) {
        self.items.lock().expect("lock poisoned").clear();
    }

    /// Current number of buffered items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.lock().expect("lock poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured capacity bound.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[allow(clippy::expect_used)]
impl<T: Clone> BoundedQueue<T> {
    /// Returns a copy of the oldest item without removing it.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Empty`] if the queue holds no items.
    pub fn peek(&self) -> Result<T, QueueError> {
        self.items
            .lock()
            .expect("lock poisoned")
            .front()
            .cloned()
            .ok_or(QueueError::Empty)
    }

    /// Returns a copy of the current contents in FIFO order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<T> {
        self.items
            .lock()
            .expect("lock poisoned")
            .iter()
            .cloned()
            .collect()
    }
}

#[allow(clippy::expect_used)]
impl<T: PartialEq> BoundedQueue<T> {
    /// Membership test using value equality. Returns `false` on an
    /// empty queue without error.
    #[must_use]
    pub fn contains(&self, item: &T) -> bool {
        self.items
            .lock()
            .expect("lock poisoned")
            .iter()
            .any(|existing| existing == item)
    }
}
