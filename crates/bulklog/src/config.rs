//! Configuration surface for the shipper.
//!
//! The configuration is a plain struct with public fields and sensible
//! defaults; a host integration fills it from whatever source it owns
//! (environment, config file, framework attributes). Templates are
//! strings rendered through the configured [`crate::render::Renderer`].
//!
//! Fatal misconfiguration (no target, bad proxy credentials, zero
//! capacities) is surfaced at setup time, not at dispatch time.

use serde::Deserialize;

use crate::connection::Credentials;
use crate::constants;
use crate::error::ConfigError;

/// Target value type of a configured extra field.
///
/// The rendered template text is coerced to this type before insertion
/// into the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    /// The rendered text is parsed as a JSON value and inserted as
    /// structured data.
    Json,
}

/// A configured extra field added to every document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FieldSpec {
    /// Document key the coerced value is inserted under.
    pub name: String,
    /// Template rendered against the event to produce the field text.
    pub template: String,
    /// Target type the rendered text is coerced to.
    pub value_type: FieldType,
}

/// Shipper configuration.
#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct Config {
    // Connection
    /// Comma-separated list of node URLs for a static pool.
    pub endpoints: String,
    /// Managed cloud identifier; takes precedence over `endpoints` when
    /// present and non-blank.
    pub cloud_id: Option<String>,
    /// Whether basic authentication is applied to backend requests.
    pub require_auth: bool,
    /// Username template, rendered at configuration time.
    pub username: String,
    /// Password template, rendered at configuration time.
    pub password: String,
    /// API key passed through as-is; wins over basic auth when set.
    pub api_key: Option<String>,
    /// Proxy address; requires `proxy_credentials` of the basic kind.
    pub proxy_address: Option<String>,
    pub proxy_credentials: Option<Credentials>,
    /// Gzip-compress bulk request bodies.
    pub enable_compression: bool,
    /// Let the cluster client discover nodes beyond the configured list.
    pub auto_discovery: bool,
    /// Ping nodes before first use.
    pub ping: bool,

    // Documents
    /// Index name template; the rendered value is lower-cased.
    pub index_template: String,
    /// Document type template.
    pub doc_type_template: String,
    /// Optional server-side ingest pipeline template.
    pub pipeline_template: Option<String>,
    /// Copy every event property into the document (minus exclusions).
    pub include_event_properties: bool,
    /// Property names never copied into documents.
    pub excluded_properties: Vec<String>,
    /// Configured extra fields.
    pub fields: Vec<FieldSpec>,

    // Delivery
    /// Timeout for a single bulk write request, in seconds.
    pub flush_timeout_secs: u64,
    /// Capacity of the retry buffer.
    pub retry_buffer_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            endpoints: "http://localhost:9200".to_string(),
            cloud_id: None,
            require_auth: false,
            username: String::new(),
            password: String::new(),
            api_key: None,
            proxy_address: None,
            proxy_credentials: None,
            enable_compression: false,
            auto_discovery: false,
            ping: false,
            index_template: "logstash-{date}".to_string(),
            doc_type_template: "_doc".to_string(),
            pipeline_template: None,
            include_event_properties: false,
            excluded_properties: constants::DEFAULT_EXCLUDED_PROPERTIES
                .iter()
                .map(ToString::to_string)
                .collect(),
            fields: Vec::new(),
            flush_timeout_secs: constants::DEFAULT_FLUSH_TIMEOUT_SECS,
            retry_buffer_capacity: constants::DEFAULT_RETRY_BUFFER_CAPACITY,
        }
    }
}

impl Config {
    /// Checks the configuration for fatal setup errors.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEndpoint`] when neither an endpoint
    /// list nor a cloud identifier is configured, and the proxy errors
    /// from [`crate::connection::ConnectionConfigurator`] rules when the
    /// proxy section is incoherent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let cloud_configured = self
            .cloud_id
            .as_deref()
            .is_some_and(|id| !id.trim().is_empty());
        if !cloud_configured && self.endpoints.trim().is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }

        if self.proxy_address.is_some() {
            match &self.proxy_credentials {
                None => return Err(ConfigError::ProxyCredentialsMissing),
                Some(Credentials::ApiKey(_)) => {
                    return Err(ConfigError::UnsupportedProxyCredentials)
                }
                Some(Credentials::Basic { .. }) => {}
            }
        }

        Ok(())
    }
}
