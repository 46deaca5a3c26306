//! Log events consumed by the shipper.
//!
//! A [`LogEvent`] is the unit of input: a timestamped, leveled message
//! with optional exception and property bag, plus a completion callback
//! that is invoked exactly once when processing of the event finishes
//! (successfully or with an error).
//!
//! Events are consumed read-only by document construction; only the
//! completion callback is taken out of the event, and only once.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::ShipError;

/// Callback invoked exactly once per submitted event.
///
/// `None` signals successful delivery; `Some(error)` carries the single
/// representative error for the batch the event was part of.
pub type CompletionCallback = Box<dyn FnOnce(Option<Arc<ShipError>>) + Send + Sync>;

/// Severity of a log event.
///
/// Serialized by name (never by ordinal) into the `level` document key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl Level {
    /// Returns the lowercase name used in documents.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed projection of an exception attached to a log event.
///
/// Reflection-free by design: the shipper serializes exactly these
/// fields rather than walking an arbitrary object graph. The inner
/// chain is depth-capped at serialization time, so cyclic or absurdly
/// deep chains cannot recurse unboundedly.
#[derive(Debug, Clone, Default)]
pub struct ExceptionRecord {
    /// Name of the exception type (e.g. `IoError`).
    pub type_name: String,
    /// Human-readable error message.
    pub message: String,
    /// Rendered stack description, if the host framework captured one.
    pub stack_trace: Option<String>,
    /// Arbitrary key/value data attached to the exception.
    ///
    /// Keys may contain dots; they are sanitized at serialization time
    /// because the target storage format treats dots as path separators.
    pub data: HashMap<String, Value>,
    /// The next exception in the causal chain, if any.
    pub inner: Option<Box<ExceptionRecord>>,
}

/// One structured log event submitted to the shipper.
pub struct LogEvent {
    /// Time the event was generated.
    pub timestamp: DateTime<Utc>,
    /// Severity of the event.
    pub level: Level,
    /// Main message template, rendered against the event to produce the
    /// document's `message` value.
    pub message_template: String,
    /// Exception attached to the event, if any.
    pub exception: Option<ExceptionRecord>,
    /// Event properties by name.
    pub properties: HashMap<String, Value>,
    /// Completion callback; present until the event has been completed.
    completion: Option<CompletionCallback>,
}

impl LogEvent {
    /// Creates an event with the given level and message template,
    /// timestamped now.
    #[must_use]
    pub fn new(level: Level, message_template: impl Into<String>) -> Self {
        LogEvent {
            timestamp: Utc::now(),
            level,
            message_template: message_template.into(),
            exception: None,
            properties: HashMap::new(),
            completion: None,
        }
    }

    /// Creates the empty event used for configuration-time template
    /// rendering (connection credentials, static index names).
    ///
    /// Rendering against the null event resolves literal text and
    /// leaves event-dependent tokens empty.
    #[must_use]
    pub fn null() -> Self {
        LogEvent::new(Level::Info, "")
    }

    /// Attaches a property to the event.
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: Value) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    /// Attaches an exception record to the event.
    #[must_use]
    pub fn with_exception(mut self, exception: ExceptionRecord) -> Self {
        self.exception = Some(exception);
        self
    }

    /// Registers the completion callback for this event.
    ///
    /// The callback is invoked exactly once when the batch containing
    /// this event finishes, with `None` on success or the batch's
    /// representative error on failure.
    #[must_use]
    pub fn on_completion(mut self, callback: CompletionCallback) -> Self {
        self.completion = Some(callback);
        self
    }

    /// Invokes the completion callback, if it has not already fired.
    ///
    /// Completion is take-once: a second call is a no-op, which keeps
    /// the exactly-once contract even when an event is re-dispatched
    /// through a retry layer.
    pub(crate) fn complete(&mut self, error: Option<Arc<ShipError>>) {
        if let Some(callback) = self.completion.take() {
            callback(error);
        }
    }
}

impl fmt::Debug for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogEvent")
            .field("timestamp", &self.timestamp)
            .field("level", &self.level)
            .field("message_template", &self.message_template)
            .field("exception", &self.exception)
            .field("properties", &self.properties)
            .field("has_completion", &self.completion.is_some())
            .finish()
    }
}
