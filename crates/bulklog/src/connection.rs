//! Connection settings for the delivery collaborator.
//!
//! [`ConnectionConfigurator`] turns the configuration into
//! [`ConnectionSettings`]: the node pool (static list or managed cloud
//! endpoint), credentials, proxy, compression, and discovery/ping
//! toggles. The build is a pure function of its inputs, so it is safe
//! to re-run whenever the endpoint or cloud-id configuration changes at
//! runtime.
//!
//! # Pool Selection
//!
//! A non-blank cloud identifier always wins over the endpoint list. The
//! identifier is the managed-cluster form `label:base64(domain$uuid)`;
//! [`ConnectionSettings::base_url`] decodes it into the cluster URL.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;

use crate::config::Config;
use crate::error::ConfigError;
use crate::event::LogEvent;
use crate::render::Renderer;

/// Backend credentials.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Credentials {
    /// Basic username/password (network-credential kind).
    Basic { username: String, password: String },
    /// Opaque API key, passed through in the `Authorization` header.
    ApiKey(String),
}

/// Proxy applied to backend requests.
///
/// Only basic credentials are supported for proxies; the configurator
/// rejects anything else at build time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySettings {
    pub address: String,
    pub username: String,
    pub password: String,
}

/// The connection pool the cluster client should use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodePool {
    /// Fixed list of node URLs.
    Static(Vec<String>),
    /// Managed cloud cluster, addressed by its opaque identifier.
    Cloud { cloud_id: String },
}

/// Settings handed to the delivery collaborator's cluster client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub pool: NodePool,
    pub credentials: Option<Credentials>,
    pub proxy: Option<ProxySettings>,
    /// Gzip-compress request bodies.
    pub compression: bool,
    /// Allow the cluster client to discover nodes beyond the pool.
    pub auto_discovery: bool,
    /// Ping nodes before first use.
    pub ping: bool,
}

impl ConnectionSettings {
    /// Resolves the base URL of the node used for bulk writes.
    ///
    /// For a static pool this is the first configured node; node
    /// rotation and failover belong to the cluster client, not the
    /// shipper. For a cloud pool the identifier is decoded.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEndpoint`] for an empty static
    /// pool and [`ConfigError::InvalidCloudId`] for an undecodable
    /// cloud identifier.
    pub fn base_url(&self) -> Result<String, ConfigError> {
        match &self.pool {
            NodePool::Static(nodes) => nodes
                .first()
                .map(|node| node.trim_end_matches('/').to_string())
                .ok_or(ConfigError::MissingEndpoint),
            NodePool::Cloud { cloud_id } => decode_cloud_id(cloud_id),
        }
    }
}

/// Decodes a managed cloud identifier into the cluster URL.
///
/// The identifier has the form `label:base64(domain$cluster-uuid...)`;
/// the resulting URL is `https://{cluster-uuid}.{domain}`, preserving a
/// port if the domain segment carries one.
fn decode_cloud_id(cloud_id: &str) -> Result<String, ConfigError> {
    let (_, encoded) = cloud_id
        .split_once(':')
        .ok_or_else(|| ConfigError::InvalidCloudId("missing `:` separator".to_string()))?;

    let decoded = BASE64
        .decode(encoded.trim())
        .map_err(|e| ConfigError::InvalidCloudId(format!("bad base64 payload: {e}")))?;
    let decoded = String::from_utf8(decoded)
        .map_err(|_| ConfigError::InvalidCloudId("payload is not utf-8".to_string()))?;

    let mut parts = decoded.split('$');
    let domain = parts
        .next()
        .filter(|part| !part.is_empty())
        .ok_or_else(|| ConfigError::InvalidCloudId("missing domain segment".to_string()))?;
    let cluster = parts
        .next()
        .filter(|part| !part.is_empty())
        .ok_or_else(|| ConfigError::InvalidCloudId("missing cluster segment".to_string()))?;

    match domain.split_once(':') {
        Some((host, port)) => Ok(format!("https://{cluster}.{host}:{port}")),
        None => Ok(format!("https://{cluster}.{domain}")),
    }
}

/// Builds [`ConnectionSettings`] from configuration.
///
/// Credential templates are rendered against the null event, so they
/// may be literals or draw on environment-derived renderer state, but
/// never on a specific log event.
pub struct ConnectionConfigurator {
    config: Arc<Config>,
    renderer: Arc<dyn Renderer>,
}

impl ConnectionConfigurator {
    #[must_use]
    pub fn new(config: Arc<Config>, renderer: Arc<dyn Renderer>) -> Self {
        ConnectionConfigurator { config, renderer }
    }

    /// Builds connection settings.
    ///
    /// Safe to call repeatedly; the result depends only on the current
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for an empty target, a proxy without
    /// credentials, proxy credentials of an unsupported kind, or an
    /// unrenderable credentials template.
    pub fn build(&self) -> Result<ConnectionSettings, ConfigError> {
        let pool = self.build_pool()?;
        let credentials = self.build_credentials()?;
        let proxy = self.build_proxy()?;

        Ok(ConnectionSettings {
            pool,
            credentials,
            proxy,
            compression: self.config.enable_compression,
            auto_discovery: self.config.auto_discovery,
            ping: self.config.ping,
        })
    }

    fn build_pool(&self) -> Result<NodePool, ConfigError> {
        if let Some(cloud_id) = &self.config.cloud_id {
            let cloud_id = cloud_id.trim();
            if !cloud_id.is_empty() {
                return Ok(NodePool::Cloud {
                    cloud_id: cloud_id.to_string(),
                });
            }
        }

        let nodes: Vec<String> = self
            .config
            .endpoints
            .split(',')
            .map(str::trim)
            .filter(|node| !node.is_empty())
            .map(ToString::to_string)
            .collect();
        if nodes.is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }
        Ok(NodePool::Static(nodes))
    }

    fn build_credentials(&self) -> Result<Option<Credentials>, ConfigError> {
        // API key wins over basic auth
        if let Some(api_key) = &self.config.api_key {
            if !api_key.trim().is_empty() {
                return Ok(Some(Credentials::ApiKey(api_key.clone())));
            }
        }

        if !self.config.require_auth {
            return Ok(None);
        }

        let null_event = LogEvent::null();
        let username = self
            .renderer
            .render(&self.config.username, &null_event)
            .map_err(|e| ConfigError::CredentialsTemplate(e.to_string()))?;
        let password = self
            .renderer
            .render(&self.config.password, &null_event)
            .map_err(|e| ConfigError::CredentialsTemplate(e.to_string()))?;

        Ok(Some(Credentials::Basic { username, password }))
    }

    fn build_proxy(&self) -> Result<Option<ProxySettings>, ConfigError> {
        let Some(address) = &self.config.proxy_address else {
            return Ok(None);
        };

        match &self.config.proxy_credentials {
            None => Err(ConfigError::ProxyCredentialsMissing),
            Some(Credentials::ApiKey(_)) => Err(ConfigError::UnsupportedProxyCredentials),
            Some(Credentials::Basic { username, password }) => Ok(Some(ProxySettings {
                address: address.clone(),
                username: username.clone(),
                password: password.clone(),
            })),
        }
    }
}
