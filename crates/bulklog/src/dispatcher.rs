//! Batch dispatch and completion reporting.
//!
//! [`BatchDispatcher::send_batch`] is the single entry point of the
//! delivery pipeline: it runs the document builder over every event in
//! order, assembles one bulk payload, submits it through the delivery
//! collaborator, and resolves every event's completion callback from
//! the outcome.
//!
//! # Failure Policy
//!
//! Batch failure is all-or-nothing at the notification level: one
//! representative error (the collaborator's reported detail, or a
//! generic placeholder) is delivered to every callback in the batch,
//! even though the backend may have partially applied documents. Any
//! error raised while building or submitting the payload is caught and
//! treated identically - `send_batch` never lets an error escape to its
//! caller, because the caller is a logging pipeline that must never
//! crash the hosting process over a logging failure.
//!
//! # State
//!
//! Nothing persists across calls and there is no implicit retry; retry
//! policy belongs to the caller or a wrapping layer such as
//! [`crate::retry::RetryBuffer`]. The only lazily-built state is the
//! transport client, constructed at most once under `OnceCell` and
//! read-only afterwards, so `send_batch` is safe to invoke concurrently.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OnceCell;
use tracing::{debug, error};

use crate::config::Config;
use crate::connection::ConnectionConfigurator;
use crate::constants::NO_ERROR_DETAIL;
use crate::document::{Document, DocumentBuilder, DocumentMetadata};
use crate::error::{ConfigError, ShipError};
use crate::event::LogEvent;
use crate::render::Renderer;
use crate::transport::{BulkTransport, HttpBulkTransport};

/// One entry of a bulk payload.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkEntry {
    Metadata(DocumentMetadata),
    Document(Document),
}

/// An ordered bulk write payload.
///
/// Entries alternate metadata, document, metadata, document - exactly
/// 2xN entries for N input events, order-preserving relative to input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkPayload {
    entries: Vec<BulkEntry>,
}

impl BulkPayload {
    #[must_use]
    pub fn with_capacity(events: usize) -> Self {
        BulkPayload {
            entries: Vec::with_capacity(events * 2),
        }
    }

    /// Appends one (metadata, document) pair.
    ///
    /// Pairs are contiguous by construction; this is the only way to
    /// grow a payload.
    pub fn push_pair(&mut self, metadata: DocumentMetadata, document: Document) {
        self.entries.push(BulkEntry::Metadata(metadata));
        self.entries.push(BulkEntry::Document(document));
    }

    /// Total entry count; always even.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of (metadata, document) pairs.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.entries.len() / 2
    }

    #[must_use]
    pub fn entries(&self) -> &[BulkEntry] {
        &self.entries
    }
}

/// Produces the delivery collaborator on first use.
pub type TransportFactory =
    Box<dyn Fn() -> Result<Arc<dyn BulkTransport>, ConfigError> + Send + Sync>;

/// Groups pending events into bulk payloads and dispatches them.
pub struct BatchDispatcher {
    builder: DocumentBuilder,
    factory: TransportFactory,
    /// Transport client (initialized on first use, then read-only).
    transport: OnceCell<Option<Arc<dyn BulkTransport>>>,
}

impl BatchDispatcher {
    /// Creates a dispatcher backed by the default HTTP bulk transport.
    ///
    /// The transport is not built here: connection settings are
    /// resolved and the client constructed on first dispatch, at most
    /// once, so a dispatcher can be created before the backend is
    /// reachable.
    #[must_use]
    pub fn new(config: Arc<Config>, renderer: Arc<dyn Renderer>) -> Self {
        let timeout = Duration::from_secs(config.flush_timeout_secs);
        let configurator = ConnectionConfigurator::new(Arc::clone(&config), Arc::clone(&renderer));
        let factory: TransportFactory = Box::new(move || {
            let settings = configurator.build()?;
            let transport = HttpBulkTransport::new(settings, timeout)?;
            Ok(Arc::new(transport) as Arc<dyn BulkTransport>)
        });

        Self::with_factory(&config, renderer, factory)
    }

    /// Creates a dispatcher around an existing delivery collaborator.
    #[must_use]
    pub fn with_transport(
        config: &Config,
        renderer: Arc<dyn Renderer>,
        transport: Arc<dyn BulkTransport>,
    ) -> Self {
        Self::with_factory(
            config,
            renderer,
            Box::new(move || Ok(Arc::clone(&transport))),
        )
    }

    /// Creates a dispatcher with a custom transport factory.
    #[must_use]
    pub fn with_factory(
        config: &Config,
        renderer: Arc<dyn Renderer>,
        factory: TransportFactory,
    ) -> Self {
        BatchDispatcher {
            builder: DocumentBuilder::new(config, renderer),
            factory,
            transport: OnceCell::new(),
        }
    }

    /// Sends one batch and resolves every event's completion callback.
    ///
    /// Does not return until the bulk request completes or fails. On
    /// success every callback receives `None`; on any failure every
    /// callback receives the same representative error. Events that
    /// failed to ship are returned so a wrapping layer can buffer them
    /// for retry; on success the returned vector is empty.
    pub async fn send_batch(&self, mut events: Vec<LogEvent>) -> Vec<LogEvent> {
        if events.is_empty() {
            return events;
        }

        match self.try_send(&events).await {
            Ok(()) => {
                debug!("SHIP | delivered batch of {} events", events.len());
                for event in &mut events {
                    event.complete(None);
                }
                Vec::new()
            }
            Err(e) => {
                error!(
                    "SHIP | failed to deliver batch of {} events: {}",
                    events.len(),
                    e
                );
                let e = Arc::new(e);
                for event in &mut events {
                    event.complete(Some(Arc::clone(&e)));
                }
                events
            }
        }
    }

    async fn try_send(&self, events: &[LogEvent]) -> Result<(), ShipError> {
        let mut payload = BulkPayload::with_capacity(events.len());
        for event in events {
            let (metadata, document) = self.builder.build(event)?;
            payload.push_pair(metadata, document);
        }

        let Some(transport) = self.transport().await else {
            return Err(ShipError::TransportUnavailable);
        };

        let outcome = transport.bulk_write(&payload).await?;
        if outcome.success {
            Ok(())
        } else {
            Err(ShipError::Backend {
                status: outcome.http_status,
                detail: outcome
                    .original_error
                    .unwrap_or_else(|| NO_ERROR_DETAIL.to_string()),
            })
        }
    }

    async fn transport(&self) -> Option<Arc<dyn BulkTransport>> {
        self.transport
            .get_or_init(|| async {
                match (self.factory)() {
                    Ok(transport) => Some(transport),
                    Err(e) => {
                        error!("SHIP | failed to initialize bulk transport: {}", e);
                        None
                    }
                }
            })
            .await
            .clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::event::Level;
    use crate::render::PatternRenderer;
    use crate::transport::BulkWriteOutcome;
    use crate::error::TransportError;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted collaborator recording every payload it receives.
    struct MockTransport {
        response: Mutex<Result<BulkWriteOutcome, String>>,
        payloads: Mutex<Vec<BulkPayload>>,
    }

    impl MockTransport {
        fn replying(outcome: BulkWriteOutcome) -> Arc<Self> {
            Arc::new(MockTransport {
                response: Mutex::new(Ok(outcome)),
                payloads: Mutex::new(Vec::new()),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(MockTransport {
                response: Mutex::new(Err(message.to_string())),
                payloads: Mutex::new(Vec::new()),
            })
        }

        fn success() -> Arc<Self> {
            Self::replying(BulkWriteOutcome {
                success: true,
                http_status: 200,
                original_error: None,
            })
        }

        fn received(&self) -> Vec<BulkPayload> {
            self.payloads.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BulkTransport for MockTransport {
        async fn bulk_write(
            &self,
            payload: &BulkPayload,
        ) -> Result<BulkWriteOutcome, TransportError> {
            self.payloads.lock().unwrap().push(payload.clone());
            match &*self.response.lock().unwrap() {
                Ok(outcome) => Ok(outcome.clone()),
                Err(message) => Err(TransportError::Encode(message.clone())),
            }
        }
    }

    fn dispatcher(transport: Arc<MockTransport>) -> BatchDispatcher {
        BatchDispatcher::with_transport(&Config::default(), Arc::new(PatternRenderer), transport)
    }

    /// Counts callback invocations, split by outcome.
    #[derive(Default)]
    struct CallbackTally {
        ok: Arc<AtomicUsize>,
        failed: Arc<AtomicUsize>,
        last_error: Arc<Mutex<Option<String>>>,
    }

    impl CallbackTally {
        fn track(&self, event: LogEvent) -> LogEvent {
            let ok = Arc::clone(&self.ok);
            let failed = Arc::clone(&self.failed);
            let last_error = Arc::clone(&self.last_error);
            event.on_completion(Box::new(move |error| match error {
                None => {
                    ok.fetch_add(1, Ordering::SeqCst);
                }
                Some(e) => {
                    failed.fetch_add(1, Ordering::SeqCst);
                    *last_error.lock().unwrap() = Some(e.to_string());
                }
            }))
        }
    }

    fn events(tally: &CallbackTally, count: usize) -> Vec<LogEvent> {
        (0..count)
            .map(|i| tally.track(LogEvent::new(Level::Info, format!("event {i}"))))
            .collect()
    }

    #[tokio::test]
    async fn test_success_resolves_every_callback_with_none() {
        let transport = MockTransport::success();
        let tally = CallbackTally::default();

        let failed = dispatcher(Arc::clone(&transport))
            .send_batch(events(&tally, 3))
            .await;

        assert!(failed.is_empty());
        assert_eq!(tally.ok.load(Ordering::SeqCst), 3);
        assert_eq!(tally.failed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_payload_alternates_in_input_order() {
        let transport = MockTransport::success();
        let tally = CallbackTally::default();

        dispatcher(Arc::clone(&transport))
            .send_batch(events(&tally, 3))
            .await;

        let payloads = transport.received();
        assert_eq!(payloads.len(), 1);
        let payload = &payloads[0];
        assert_eq!(payload.len(), 6);
        assert_eq!(payload.event_count(), 3);

        for (i, entry) in payload.entries().iter().enumerate() {
            match entry {
                BulkEntry::Metadata(_) => assert_eq!(i % 2, 0, "entry {i} out of place"),
                BulkEntry::Document(document) => {
                    assert_eq!(i % 2, 1, "entry {i} out of place");
                    assert_eq!(
                        document.get("message"),
                        Some(&Value::String(format!("event {}", i / 2)))
                    );
                }
            }
        }
    }

    #[tokio::test]
    async fn test_backend_failure_fans_out_to_every_callback() {
        let transport = MockTransport::replying(BulkWriteOutcome {
            success: false,
            http_status: 503,
            original_error: Some("cluster unavailable".to_string()),
        });
        let tally = CallbackTally::default();

        let failed = dispatcher(transport).send_batch(events(&tally, 4)).await;

        assert_eq!(failed.len(), 4);
        assert_eq!(tally.ok.load(Ordering::SeqCst), 0);
        assert_eq!(tally.failed.load(Ordering::SeqCst), 4);
        let last_error = tally.last_error.lock().unwrap().clone().unwrap();
        assert!(last_error.contains("503"));
        assert!(last_error.contains("cluster unavailable"));
    }

    #[tokio::test]
    async fn test_missing_error_detail_uses_placeholder() {
        let transport = MockTransport::replying(BulkWriteOutcome {
            success: false,
            http_status: 500,
            original_error: None,
        });
        let tally = CallbackTally::default();

        dispatcher(transport).send_batch(events(&tally, 1)).await;

        let last_error = tally.last_error.lock().unwrap().clone().unwrap();
        assert!(last_error.contains(NO_ERROR_DETAIL));
    }

    #[tokio::test]
    async fn test_transport_error_fans_out_to_every_callback() {
        let transport = MockTransport::failing("connection reset");
        let tally = CallbackTally::default();

        let failed = dispatcher(transport).send_batch(events(&tally, 2)).await;

        assert_eq!(failed.len(), 2);
        assert_eq!(tally.failed.load(Ordering::SeqCst), 2);
        let last_error = tally.last_error.lock().unwrap().clone().unwrap();
        assert!(last_error.contains("connection reset"));
    }

    #[tokio::test]
    async fn test_render_failure_is_caught_and_reported() {
        let config = Config {
            index_template: "bad-{unclosed".to_string(),
            ..Config::default()
        };
        let transport = MockTransport::success();
        let dispatcher = BatchDispatcher::with_transport(
            &config,
            Arc::new(PatternRenderer),
            Arc::clone(&transport) as Arc<dyn BulkTransport>,
        );
        let tally = CallbackTally::default();

        let failed = dispatcher.send_batch(events(&tally, 2)).await;

        // The batch never reached the collaborator
        assert!(transport.received().is_empty());
        assert_eq!(failed.len(), 2);
        assert_eq!(tally.failed.load(Ordering::SeqCst), 2);
        let last_error = tally.last_error.lock().unwrap().clone().unwrap();
        assert!(last_error.contains("failed to build bulk payload"));
    }

    #[tokio::test]
    async fn test_empty_batch_is_a_noop() {
        let transport = MockTransport::success();

        let failed = dispatcher(Arc::clone(&transport)).send_batch(Vec::new()).await;

        assert!(failed.is_empty());
        assert!(transport.received().is_empty());
    }

    #[tokio::test]
    async fn test_factory_failure_marks_transport_unavailable() {
        static FACTORY_CALLS: AtomicUsize = AtomicUsize::new(0);

        let dispatcher = BatchDispatcher::with_factory(
            &Config::default(),
            Arc::new(PatternRenderer),
            Box::new(|| {
                FACTORY_CALLS.fetch_add(1, Ordering::SeqCst);
                Err(ConfigError::MissingEndpoint)
            }),
        );
        let tally = CallbackTally::default();

        dispatcher.send_batch(events(&tally, 1)).await;
        dispatcher.send_batch(events(&tally, 1)).await;

        assert_eq!(tally.failed.load(Ordering::SeqCst), 2);
        // The factory runs at most once; the failed init is cached
        assert_eq!(FACTORY_CALLS.load(Ordering::SeqCst), 1);
        let last_error = tally.last_error.lock().unwrap().clone().unwrap();
        assert!(last_error.contains("could not be initialized"));
    }

    #[tokio::test]
    async fn test_concurrent_batches_share_one_transport() {
        let transport = MockTransport::success();
        let dispatcher = Arc::new(dispatcher(Arc::clone(&transport)));
        let tally = CallbackTally::default();

        let first = {
            let dispatcher = Arc::clone(&dispatcher);
            let batch = events(&tally, 2);
            tokio::spawn(async move { dispatcher.send_batch(batch).await })
        };
        let second = {
            let dispatcher = Arc::clone(&dispatcher);
            let batch = events(&tally, 2);
            tokio::spawn(async move { dispatcher.send_batch(batch).await })
        };

        first.await.unwrap();
        second.await.unwrap();

        assert_eq!(tally.ok.load(Ordering::SeqCst), 4);
        assert_eq!(transport.received().len(), 2);
    }
}
