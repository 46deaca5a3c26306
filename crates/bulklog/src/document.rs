//! Document construction.
//!
//! [`DocumentBuilder`] converts one log event plus the configured extra
//! fields into an index-ready [`Document`] and its matching
//! [`DocumentMetadata`] routing record.
//!
//! # Key Policy
//!
//! Documents are key-ordered mappings with first-write-wins insertion:
//! the three mandatory keys (`@timestamp`, `level`, `message`) are
//! seeded first, configured fields come next, then the serialized
//! exception, then bulk event properties. A later source can never
//! overwrite a key written by an earlier one, so the document key set
//! never contains duplicates.
//!
//! # Field Coercion
//!
//! Configured fields render their template against the event and coerce
//! the text to the declared type. A field whose template renders to
//! whitespace is skipped entirely; a field whose text fails coercion is
//! logged and skipped. Neither aborts the rest of the batch.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::SecondsFormat;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::warn;

use crate::config::{Config, FieldSpec, FieldType};
use crate::constants::{KEY_DOT_SUBSTITUTE, MAX_INNER_EXCEPTION_DEPTH};
use crate::event::{ExceptionRecord, LogEvent};
use crate::render::{RenderError, Renderer};

/// One index-ready record, keyed by field name in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    inner: Map<String, Value>,
}

impl Document {
    #[must_use]
    pub fn new() -> Self {
        Document { inner: Map::new() }
    }

    /// Inserts `value` under `key` unless the key already exists.
    ///
    /// Returns `true` when the value was inserted. First-write-wins is
    /// the single insertion policy for documents, which is what keeps
    /// the key set duplicate-free.
    pub fn insert_first(&mut self, key: impl Into<String>, value: Value) -> bool {
        let key = key.into();
        if self.inner.contains_key(&key) {
            return false;
        }
        self.inner.insert(key, value);
        true
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.inner.get(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Document keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.inner.keys().map(String::as_str)
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.inner)
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.inner.serialize(serializer)
    }
}

/// Per-document routing record, paired 1:1 with a [`Document`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMetadata {
    /// Target index name; always lower-cased.
    pub index: String,
    /// Document type.
    pub doc_type: String,
    /// Server-side ingest pipeline, if configured.
    pub pipeline: Option<String>,
}

impl DocumentMetadata {
    /// The metadata's bulk action line as a JSON value.
    #[must_use]
    pub fn action(&self) -> Value {
        let mut fields = Map::new();
        fields.insert("_index".to_string(), Value::String(self.index.clone()));
        fields.insert("_type".to_string(), Value::String(self.doc_type.clone()));
        if let Some(pipeline) = &self.pipeline {
            fields.insert("pipeline".to_string(), Value::String(pipeline.clone()));
        }

        let mut action = Map::new();
        action.insert("index".to_string(), Value::Object(fields));
        Value::Object(action)
    }
}

/// Replaces literal dots in a key name.
///
/// The target storage format treats dots as path separators, so a key
/// such as `config.path` would otherwise be split into a nested object.
fn sanitize_key(key: &str) -> String {
    key.replace('.', &KEY_DOT_SUBSTITUTE.to_string())
}

/// Rewrites every object key in `value`, recursively.
fn sanitize_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sanitized = Map::new();
            for (key, nested) in map {
                sanitized.insert(sanitize_key(key), sanitize_value(nested));
            }
            Value::Object(sanitized)
        }
        Value::Array(items) => Value::Array(items.iter().map(sanitize_value).collect()),
        other => other.clone(),
    }
}

/// Serializes an exception record into a structured object.
///
/// The projection is fixed: type, message, stack trace, attached data,
/// and the inner chain up to `depth` levels. All keys are sanitized.
fn serialize_exception(record: &ExceptionRecord, depth: usize) -> Value {
    let mut map = Map::new();
    map.insert(
        "type".to_string(),
        Value::String(record.type_name.clone()),
    );
    map.insert(
        "message".to_string(),
        Value::String(record.message.clone()),
    );
    if let Some(stack_trace) = &record.stack_trace {
        map.insert(
            "stack_trace".to_string(),
            Value::String(stack_trace.clone()),
        );
    }

    // Deterministic output regardless of hash order
    let mut data_keys: Vec<&String> = record.data.keys().collect();
    data_keys.sort();
    for key in data_keys {
        let sanitized = sanitize_key(key);
        if !map.contains_key(&sanitized) {
            map.insert(sanitized, sanitize_value(&record.data[key]));
        }
    }

    if depth > 1 {
        if let Some(inner) = &record.inner {
            map.insert("inner".to_string(), serialize_exception(inner, depth - 1));
        }
    }

    Value::Object(map)
}

fn coerce(text: &str, value_type: FieldType) -> Result<Value, String> {
    match value_type {
        FieldType::String => Ok(Value::String(text.to_string())),
        FieldType::Number => {
            let trimmed = text.trim();
            if let Ok(integer) = trimmed.parse::<i64>() {
                return Ok(Value::from(integer));
            }
            match trimmed.parse::<f64>() {
                Ok(float) if float.is_finite() => Ok(Value::from(float)),
                Ok(_) => Err("non-finite number".to_string()),
                Err(e) => Err(e.to_string()),
            }
        }
        FieldType::Boolean => match text.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            other => Err(format!("`{other}` is not a boolean")),
        },
        FieldType::Json => serde_json::from_str(text).map_err(|e| e.to_string()),
    }
}

/// Converts log events into (metadata, document) pairs.
pub struct DocumentBuilder {
    fields: Vec<FieldSpec>,
    excluded: HashSet<String>,
    include_event_properties: bool,
    index_template: String,
    doc_type_template: String,
    pipeline_template: Option<String>,
    renderer: Arc<dyn Renderer>,
}

impl DocumentBuilder {
    #[must_use]
    pub fn new(config: &Config, renderer: Arc<dyn Renderer>) -> Self {
        DocumentBuilder {
            fields: config.fields.clone(),
            excluded: config.excluded_properties.iter().cloned().collect(),
            include_event_properties: config.include_event_properties,
            index_template: config.index_template.clone(),
            doc_type_template: config.doc_type_template.clone(),
            pipeline_template: config.pipeline_template.clone(),
            renderer,
        }
    }

    /// Builds the (metadata, document) pair for one event.
    ///
    /// # Errors
    ///
    /// Returns a [`RenderError`] when the message, index, type, or
    /// pipeline template cannot be rendered. Field coercion failures
    /// are logged and skipped, never returned.
    pub fn build(&self, event: &LogEvent) -> Result<(DocumentMetadata, Document), RenderError> {
        let mut document = Document::new();

        // Mandatory keys are seeded first and therefore win over every
        // configured field and event property
        document.insert_first(
            "@timestamp",
            Value::String(
                event
                    .timestamp
                    .to_rfc3339_opts(SecondsFormat::Millis, true),
            ),
        );
        document.insert_first("level", Value::String(event.level.as_str().to_string()));
        document.insert_first(
            "message",
            Value::String(self.renderer.render(&event.message_template, event)?),
        );

        for spec in &self.fields {
            let text = self.renderer.render(&spec.template, event)?;
            if text.trim().is_empty() {
                continue;
            }
            match coerce(&text, spec.value_type) {
                Ok(value) => {
                    document.insert_first(spec.name.clone(), value);
                }
                Err(reason) => {
                    warn!(
                        field = spec.name.as_str(),
                        reason = reason.as_str(),
                        "DOC | failed to coerce field value, skipping field"
                    );
                }
            }
        }

        if let Some(exception) = &event.exception {
            if !document.contains_key("exception") {
                document.insert_first(
                    "exception",
                    serialize_exception(exception, MAX_INNER_EXCEPTION_DEPTH),
                );
            }
        }

        if self.include_event_properties {
            // Deterministic output regardless of hash order
            let mut names: Vec<&String> = event.properties.keys().collect();
            names.sort();
            for name in names {
                if self.excluded.contains(name.as_str()) {
                    continue;
                }
                document.insert_first(name.clone(), event.properties[name].clone());
            }
        }

        let metadata = self.build_metadata(event)?;
        Ok((metadata, document))
    }

    fn build_metadata(&self, event: &LogEvent) -> Result<DocumentMetadata, RenderError> {
        let index = self
            .renderer
            .render(&self.index_template, event)?
            .to_lowercase();
        let doc_type = self.renderer.render(&self.doc_type_template, event)?;
        let pipeline = match &self.pipeline_template {
            Some(template) => {
                let rendered = self.renderer.render(template, event)?;
                if rendered.trim().is_empty() {
                    None
                } else {
                    Some(rendered)
                }
            }
            None => None,
        };

        Ok(DocumentMetadata {
            index,
            doc_type,
            pipeline,
        })
    }
}
