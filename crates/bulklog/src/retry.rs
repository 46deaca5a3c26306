//! Bounded retry buffering.
//!
//! The dispatcher performs no implicit retry; a caller that wants to
//! survive backend outages wraps it with a [`RetryBuffer`]. Failed
//! events are parked in a [`crate::bounded_queue::BoundedQueue`] and
//! re-dispatched on demand. The buffer is bounded with drop-oldest
//! eviction, so an outage that outlasts the capacity sheds the oldest
//! events instead of growing without bound.
//!
//! Completion callbacks have already fired by the time an event reaches
//! this buffer (the original batch failure notified them), so
//! redelivery is best-effort and notifies nobody twice.
//!
//! The buffer runs no background thread: the caller decides when to
//! drain it, typically on its own flush cadence.

use tracing::debug;

use crate::bounded_queue::BoundedQueue;
use crate::dispatcher::BatchDispatcher;
use crate::error::ConfigError;
use crate::event::LogEvent;

/// Bounded parking lot for events that failed to ship.
pub struct RetryBuffer {
    queue: BoundedQueue<LogEvent>,
}

impl RetryBuffer {
    /// Creates a buffer bounded at `capacity` events.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidCapacity`] if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        Ok(RetryBuffer {
            queue: BoundedQueue::new(capacity)?,
        })
    }

    /// Parks failed events for later redelivery.
    pub fn buffer_failed(&self, events: Vec<LogEvent>) {
        if events.is_empty() {
            return;
        }
        debug!("RETRY | buffering {} undelivered events", events.len());
        for event in events {
            self.queue.enqueue(event);
        }
    }

    /// Number of events currently parked.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drops all parked events.
    pub fn clear(&self) {
        self.queue.clear();
    }

    /// Re-dispatches up to `max_batch` parked events as one batch.
    ///
    /// Events that fail again are parked again (at the back of the
    /// buffer). Returns the number of events redelivered.
    pub async fn flush_retries(&self, dispatcher: &BatchDispatcher, max_batch: usize) -> usize {
        let events = self.queue.dequeue_up_to(max_batch);
        if events.is_empty() {
            return 0;
        }

        let attempted = events.len();
        let failed = dispatcher.send_batch(events).await;
        let redelivered = attempted - failed.len();
        self.buffer_failed(failed);

        debug!(
            "RETRY | redelivered {} of {} buffered events",
            redelivered, attempted
        );
        redelivered
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::dispatcher::BulkPayload;
    use crate::error::TransportError;
    use crate::event::Level;
    use crate::render::PatternRenderer;
    use crate::transport::{BulkTransport, BulkWriteOutcome};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Collaborator that fails until told to recover.
    struct FlakyTransport {
        healthy: AtomicBool,
    }

    impl FlakyTransport {
        fn down() -> Arc<Self> {
            Arc::new(FlakyTransport {
                healthy: AtomicBool::new(false),
            })
        }

        fn recover(&self) {
            self.healthy.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl BulkTransport for FlakyTransport {
        async fn bulk_write(
            &self,
            payload: &BulkPayload,
        ) -> Result<BulkWriteOutcome, TransportError> {
            let _ = payload;
            if self.healthy.load(Ordering::SeqCst) {
                Ok(BulkWriteOutcome {
                    success: true,
                    http_status: 200,
                    original_error: None,
                })
            } else {
                Err(TransportError::Encode("backend down".to_string()))
            }
        }
    }

    fn dispatcher(transport: Arc<FlakyTransport>) -> BatchDispatcher {
        BatchDispatcher::with_transport(&Config::default(), Arc::new(PatternRenderer), transport)
    }

    fn batch(count: usize) -> Vec<LogEvent> {
        (0..count)
            .map(|i| LogEvent::new(Level::Info, format!("event {i}")))
            .collect()
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            RetryBuffer::new(0),
            Err(ConfigError::InvalidCapacity)
        ));
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let buffer = RetryBuffer::new(2).unwrap();
        buffer.buffer_failed(batch(3));
        assert_eq!(buffer.pending(), 2);
    }

    #[tokio::test]
    async fn test_failed_flush_parks_events_again() {
        let transport = FlakyTransport::down();
        let dispatcher = dispatcher(Arc::clone(&transport));
        let buffer = RetryBuffer::new(10).unwrap();

        buffer.buffer_failed(dispatcher.send_batch(batch(3)).await);
        assert_eq!(buffer.pending(), 3);

        let redelivered = buffer.flush_retries(&dispatcher, 100).await;
        assert_eq!(redelivered, 0);
        assert_eq!(buffer.pending(), 3);
    }

    #[tokio::test]
    async fn test_flush_drains_after_recovery() {
        let transport = FlakyTransport::down();
        let dispatcher = dispatcher(Arc::clone(&transport));
        let buffer = RetryBuffer::new(10).unwrap();

        buffer.buffer_failed(dispatcher.send_batch(batch(3)).await);
        transport.recover();

        let redelivered = buffer.flush_retries(&dispatcher, 100).await;
        assert_eq!(redelivered, 3);
        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn test_flush_respects_max_batch() {
        let transport = FlakyTransport::down();
        let dispatcher = dispatcher(Arc::clone(&transport));
        let buffer = RetryBuffer::new(10).unwrap();

        buffer.buffer_failed(dispatcher.send_batch(batch(5)).await);
        transport.recover();

        let redelivered = buffer.flush_retries(&dispatcher, 2).await;
        assert_eq!(redelivered, 2);
        assert_eq!(buffer.pending(), 3);
    }

    #[tokio::test]
    async fn test_flush_on_empty_buffer_is_noop() {
        let transport = FlakyTransport::down();
        let dispatcher = dispatcher(transport);
        let buffer = RetryBuffer::new(10).unwrap();

        assert_eq!(buffer.flush_retries(&dispatcher, 100).await, 0);
    }

    #[test]
    fn test_clear_empties_buffer() {
        let buffer = RetryBuffer::new(10).unwrap();
        buffer.buffer_failed(batch(4));
        buffer.clear();
        assert!(buffer.is_empty());
    }
}
