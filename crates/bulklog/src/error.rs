//! Error taxonomy for the shipper.
//!
//! Errors fall into four classes with different delivery rules:
//!
//! 1. **Configuration errors** ([`ConfigError`]): fatal at setup time,
//!    surfaced immediately to the caller building the component
//! 2. **Queue errors** ([`QueueError`]): caller errors on a specific
//!    queue operation, surfaced as a `Result` from that operation
//! 3. **Render errors** ([`RenderError`]): raised by the host
//!    framework's template renderer; inside a batch they are converted
//!    into per-event callback errors, never propagated
//! 4. **Shipping errors** ([`ShipError`]): anything that fails a batch.
//!    These are only ever delivered through completion callbacks -
//!    `send_batch` itself never returns an error

use crate::render::RenderError;

/// Fatal configuration errors, surfaced at setup time.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("queue capacity must be greater than zero")]
    InvalidCapacity,

    #[error("proxy address configured without credentials")]
    ProxyCredentialsMissing,

    #[error("proxy credentials must be of the basic username/password kind")]
    UnsupportedProxyCredentials,

    #[error("no endpoint or cloud id configured")]
    MissingEndpoint,

    #[error("invalid cloud id: {0}")]
    InvalidCloudId(String),

    #[error("failed to render credentials template: {0}")]
    CredentialsTemplate(String),
}

/// Caller errors on individual queue operations.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("queue is empty")]
    Empty,
}

/// Errors raised while physically delivering a bulk payload.
///
/// Distinct from a backend rejection: a transport error means the
/// request never produced a usable response at all.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to encode bulk payload: {0}")]
    Encode(String),
}

/// Errors that fail an entire batch.
///
/// One representative `ShipError` is delivered to every completion
/// callback in the failed batch; batch failure is all-or-nothing at the
/// notification level even though the backend may have partially applied
/// documents.
#[derive(Debug, thiserror::Error)]
pub enum ShipError {
    #[error("bulk write rejected by backend (status {status}): {detail}")]
    Backend { status: u16, detail: String },

    #[error("bulk transport failed: {0}")]
    Transport(#[from] TransportError),

    #[error("failed to build bulk payload: {0}")]
    Build(#[from] RenderError),

    #[error("bulk transport could not be initialized")]
    TransportUnavailable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = ConfigError::ProxyCredentialsMissing;
        assert_eq!(
            error.to_string(),
            "proxy address configured without credentials"
        );
    }

    #[test]
    fn test_queue_error_display() {
        assert_eq!(QueueError::Empty.to_string(), "queue is empty");
    }

    #[test]
    fn test_ship_error_wraps_render_error() {
        let render_err = RenderError::new("{oops", "unclosed `{` token");
        let error = ShipError::from(render_err);
        let message = error.to_string();
        assert!(message.contains("failed to build bulk payload"));
        assert!(message.contains("unclosed"));
    }

    #[test]
    fn test_ship_error_backend_display() {
        let error = ShipError::Backend {
            status: 503,
            detail: "cluster unavailable".to_string(),
        };
        assert!(error.to_string().contains("503"));
        assert!(error.to_string().contains("cluster unavailable"));
    }
}
