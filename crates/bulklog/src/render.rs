//! Template rendering capability.
//!
//! Rendering a template against an event is a capability supplied by
//! the host logging framework; the shipper only requires that it is
//! pure with respect to the event (no event mutation). The [`Renderer`]
//! trait abstracts that capability so the pipeline is independent of
//! any particular framework's layout system.
//!
//! [`PatternRenderer`] is a minimal built-in implementation so the
//! shipper is usable stand-alone: it substitutes `{token}` placeholders
//! from the event and passes literal text through unchanged.

use serde_json::Value;

use crate::event::LogEvent;

/// Error raised when a template cannot be rendered against an event.
#[derive(Debug, thiserror::Error)]
#[error("failed to render template `{template}`: {reason}")]
pub struct RenderError {
    template: String,
    reason: String,
}

impl RenderError {
    #[must_use]
    pub fn new(template: impl Into<String>, reason: impl Into<String>) -> Self {
        RenderError {
            template: template.into(),
            reason: reason.into(),
        }
    }
}

/// Renders a template against an event, producing a string.
///
/// Implementations must not mutate the event.
pub trait Renderer: Send + Sync {
    fn render(&self, template: &str, event: &LogEvent) -> Result<String, RenderError>;
}

/// Minimal placeholder renderer.
///
/// Recognized tokens:
/// - `{level}`: lowercase severity name
/// - `{message}`: the event's raw message template (not re-rendered,
///   which keeps substitution non-recursive)
/// - `{date}`: event timestamp as `yyyy.MM.dd`, for dated index names
/// - `{timestamp}`: event timestamp as RFC 3339
/// - `{name}`: the event property `name`; string properties substitute
///   their raw value, other values substitute their JSON form; unknown
///   properties substitute the empty string
///
/// `{{` and `}}` escape literal braces. An unclosed `{` is a
/// [`RenderError`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternRenderer;

impl PatternRenderer {
    fn resolve(token: &str, event: &LogEvent) -> String {
        match token {
            "level" => event.level.as_str().to_string(),
            "message" => event.message_template.clone(),
            "date" => event.timestamp.format("%Y.%m.%d").to_string(),
            "timestamp" => event.timestamp.to_rfc3339(),
            name => match event.properties.get(name) {
                Some(Value::String(s)) => s.clone(),
                Some(value) => value.to_string(),
                None => String::new(),
            },
        }
    }
}

impl Renderer for PatternRenderer {
    fn render(&self, template: &str, event: &LogEvent) -> Result<String, RenderError> {
        let mut out = String::with_capacity(template.len());
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' => {
                    // Escaped literal brace
                    if chars.peek() == Some(&'{') {
                        chars.next();
                        out.push('{');
                        continue;
                    }
                    let mut token = String::new();
                    let mut closed = false;
                    for t in chars.by_ref() {
                        if t == '}' {
                            closed = true;
                            break;
                        }
                        token.push(t);
                    }
                    if !closed {
                        return Err(RenderError::new(template, "unclosed `{` token"));
                    }
                    out.push_str(&Self::resolve(&token, event));
                }
                '}' => {
                    if chars.peek() == Some(&'}') {
                        chars.next();
                    }
                    out.push('}');
                }
                other => out.push(other),
            }
        }

        Ok(out)
    }
}
