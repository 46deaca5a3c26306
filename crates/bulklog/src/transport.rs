//! Delivery collaborator contract and the default HTTP implementation.
//!
//! The dispatcher treats delivery as opaque: a [`BulkTransport`] takes a
//! bulk payload and reports `{success, http_status, original_error}`.
//! The dispatcher inspects only `success` and `original_error`.
//!
//! [`HttpBulkTransport`] is the default implementation: it encodes the
//! payload as NDJSON, optionally gzip-compresses the body, applies
//! credentials, and POSTs to the node's bulk endpoint.
//!
//! # Success Semantics
//!
//! A 2xx response whose body carries `"errors": true` is reported as a
//! non-success outcome with the first item-level error as detail; the
//! backend applied part of the payload, but the batch as a whole is
//! treated as failed.

use std::io::Write;
use std::time::Duration;

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_ENCODING, CONTENT_TYPE};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, error};

use crate::connection::{ConnectionSettings, Credentials};
use crate::constants::{BULK_PATH, NDJSON_CONTENT_TYPE};
use crate::dispatcher::{BulkEntry, BulkPayload};
use crate::error::{ConfigError, TransportError};

/// Outcome of one bulk write, as reported by the collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkWriteOutcome {
    pub success: bool,
    pub http_status: u16,
    /// Error detail reported by the backend, if any.
    pub original_error: Option<String>,
}

/// Sends one bulk payload to the backend.
///
/// Implementations are the boundary to the physical cluster client;
/// the shipper never retries through them on its own.
#[async_trait]
pub trait BulkTransport: Send + Sync {
    async fn bulk_write(&self, payload: &BulkPayload) -> Result<BulkWriteOutcome, TransportError>;
}

/// Default HTTP bulk transport.
pub struct HttpBulkTransport {
    client: reqwest::Client,
    base_url: String,
    bulk_url: String,
    settings: ConnectionSettings,
    /// Cached headers (initialized on first use).
    headers: OnceCell<HeaderMap>,
}

impl HttpBulkTransport {
    /// Creates a transport for the node resolved from `settings`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when no node can be resolved from the
    /// settings (empty pool, undecodable cloud id).
    pub fn new(settings: ConnectionSettings, timeout: Duration) -> Result<Self, ConfigError> {
        let base_url = settings.base_url()?;
        let bulk_url = format!("{base_url}{BULK_PATH}");
        let client = build_http_client(&settings, timeout);

        Ok(HttpBulkTransport {
            client,
            base_url,
            bulk_url,
            settings,
            headers: OnceCell::new(),
        })
    }

    /// Pings the node root to confirm it is reachable and accepting
    /// requests. Honors the settings' `ping` toggle at the call site.
    pub async fn ping(&self) -> Result<(), TransportError> {
        let mut request = self.client.get(&self.base_url);
        if let Some(Credentials::Basic { username, password }) = &self.settings.credentials {
            request = request.basic_auth(username, Some(password));
        }
        request.send().await?.error_for_status()?;
        debug!("HTTP | node ping succeeded");
        Ok(())
    }

    /// Encodes the payload as NDJSON: one action line per metadata
    /// entry, one source line per document, each newline-terminated.
    fn encode(payload: &BulkPayload) -> Result<Vec<u8>, TransportError> {
        let mut body = Vec::new();
        for entry in payload.entries() {
            let line = match entry {
                BulkEntry::Metadata(metadata) => serde_json::to_vec(&metadata.action()),
                BulkEntry::Document(document) => serde_json::to_vec(document),
            }
            .map_err(|e| TransportError::Encode(e.to_string()))?;
            body.extend_from_slice(&line);
            body.push(b'\n');
        }
        Ok(body)
    }

    fn compress(data: &[u8]) -> Result<Vec<u8>, TransportError> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(data)
            .and_then(|()| encoder.finish())
            .map_err(|e| TransportError::Encode(e.to_string()))
    }

    #[allow(clippy::expect_used)]
    async fn get_headers(&self) -> &HeaderMap {
        self.headers
            .get_or_init(|| async {
                let mut headers = HeaderMap::new();
                headers.insert(
                    CONTENT_TYPE,
                    NDJSON_CONTENT_TYPE.parse().expect("failed to parse header"),
                );
                if self.settings.compression {
                    headers.insert(
                        CONTENT_ENCODING,
                        "gzip".parse().expect("failed to parse header"),
                    );
                }
                if let Some(Credentials::ApiKey(api_key)) = &self.settings.credentials {
                    headers.insert(
                        AUTHORIZATION,
                        HeaderValue::from_str(&format!("ApiKey {api_key}"))
                            .expect("failed to parse header"),
                    );
                }
                headers
            })
            .await
    }
}

#[async_trait]
impl BulkTransport for HttpBulkTransport {
    async fn bulk_write(&self, payload: &BulkPayload) -> Result<BulkWriteOutcome, TransportError> {
        let mut body = Self::encode(payload)?;
        if self.settings.compression {
            body = Self::compress(&body)?;
        }

        let headers = self.get_headers().await.clone();
        let mut request = self.client.post(&self.bulk_url).headers(headers).body(body);
        if let Some(Credentials::Basic { username, password }) = &self.settings.credentials {
            request = request.basic_auth(username, Some(password));
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Ok(BulkWriteOutcome {
                success: false,
                http_status: status.as_u16(),
                original_error: non_empty(detail),
            });
        }

        // 2xx can still carry item-level failures
        let outcome = match response.json::<Value>().await {
            Ok(body) if body.get("errors").and_then(Value::as_bool) == Some(true) => {
                BulkWriteOutcome {
                    success: false,
                    http_status: status.as_u16(),
                    original_error: first_item_error(&body),
                }
            }
            _ => BulkWriteOutcome {
                success: true,
                http_status: status.as_u16(),
                original_error: None,
            },
        };
        Ok(outcome)
    }
}

fn non_empty(text: String) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Extracts the first item-level error from a bulk response body.
fn first_item_error(body: &Value) -> Option<String> {
    let items = body.get("items")?.as_array()?;
    for item in items {
        let operations = item.as_object()?;
        for operation in operations.values() {
            if let Some(error) = operation.get("error") {
                return Some(
                    error
                        .get("reason")
                        .and_then(Value::as_str)
                        .map_or_else(|| error.to_string(), ToString::to_string),
                );
            }
        }
    }
    None
}

/// Builds the HTTP client, applying proxy settings when present.
///
/// An invalid proxy configuration is logged and the client falls back
/// to a direct connection, so the shipper keeps operating even with a
/// misconfigured proxy.
fn build_http_client(settings: &ConnectionSettings, timeout: Duration) -> reqwest::Client {
    match build_client_inner(settings, timeout, true) {
        Ok(client) => client,
        Err(e) => {
            error!(
                "HTTP | unable to apply proxy configuration: {}, falling back to direct connection",
                e
            );
            match build_client_inner(settings, timeout, false) {
                Ok(client) => client,
                Err(inner) => {
                    error!(
                        "HTTP | failed to build client without proxy: {}, using defaults",
                        inner
                    );
                    reqwest::Client::new()
                }
            }
        }
    }
}

fn build_client_inner(
    settings: &ConnectionSettings,
    timeout: Duration,
    allow_proxy: bool,
) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = reqwest::Client::builder()
        .timeout(timeout)
        .pool_idle_timeout(Some(Duration::from_secs(270)))
        // TCP keepalive to detect dead pooled connections
        .tcp_keepalive(Some(Duration::from_secs(120)));

    if allow_proxy {
        if let Some(proxy) = &settings.proxy {
            let proxy = reqwest::Proxy::all(proxy.address.as_str())?
                .basic_auth(&proxy.username, &proxy.password);
            builder = builder.proxy(proxy);
        }
    }

    builder.build()
}
