// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for the client.

use std::time::Duration;

use kubewire_protocol::Codec;

use crate::error::{ClientError, Result};

const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8001";

/// Configuration for the Client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API server base URL, scheme included.
    pub endpoint: String,
    /// Namespace used when neither the call nor the object names one.
    pub namespace: Option<String>,
    /// Encoding for request and response bodies.
    pub content_type: Codec,
    /// Bearer token sent with every request.
    pub bearer_token: Option<String>,
    /// Skip TLS certificate verification (development only).
    pub skip_cert_verification: bool,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Request timeout. Not applied to watch streams.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(), // kubectl proxy default port
            namespace: None,
            content_type: Codec::Json,
            bearer_token: None,
            skip_cert_verification: false,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration for a local proxy.
    ///
    /// This enables certificate verification skipping.
    pub fn localhost() -> Self {
        Self {
            skip_cert_verification: true,
            ..Self::default()
        }
    }

    /// Create a configuration from environment variables.
    ///
    /// Environment variables:
    /// - `KUBEWIRE_ENDPOINT`: API server URL (default: "http://127.0.0.1:8001")
    /// - `KUBEWIRE_NAMESPACE`: Default namespace (default: unset, meaning "default")
    /// - `KUBEWIRE_TOKEN`: Bearer token (default: unset)
    /// - `KUBEWIRE_CONTENT_TYPE`: `json`, `protobuf` or a media type (default: "json")
    /// - `KUBEWIRE_SKIP_CERT_VERIFICATION`: Skip TLS verification (default: "false")
    /// - `KUBEWIRE_CONNECT_TIMEOUT_MS`: Connection timeout in milliseconds (default: 10000)
    /// - `KUBEWIRE_REQUEST_TIMEOUT_MS`: Request timeout in milliseconds (default: 30000)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = lookup("KUBEWIRE_ENDPOINT").unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        let namespace = lookup("KUBEWIRE_NAMESPACE").filter(|ns| !ns.is_empty());

        let bearer_token = lookup("KUBEWIRE_TOKEN").filter(|token| !token.is_empty());

        let content_type = match lookup("KUBEWIRE_CONTENT_TYPE") {
            Some(value) => value
                .parse()
                .map_err(|e| ClientError::Config(format!("invalid KUBEWIRE_CONTENT_TYPE: {}", e)))?,
            None => Codec::Json,
        };

        let skip_cert_verification = lookup("KUBEWIRE_SKIP_CERT_VERIFICATION")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(false);

        let connect_timeout_ms: u64 = lookup("KUBEWIRE_CONNECT_TIMEOUT_MS")
            .unwrap_or_else(|| "10000".to_string())
            .parse()
            .map_err(|e| ClientError::Config(format!("invalid KUBEWIRE_CONNECT_TIMEOUT_MS: {}", e)))?;

        let request_timeout_ms: u64 = lookup("KUBEWIRE_REQUEST_TIMEOUT_MS")
            .unwrap_or_else(|| "30000".to_string())
            .parse()
            .map_err(|e| ClientError::Config(format!("invalid KUBEWIRE_REQUEST_TIMEOUT_MS: {}", e)))?;

        let config = Self {
            endpoint,
            namespace,
            content_type,
            bearer_token,
            skip_cert_verification,
            connect_timeout: Duration::from_millis(connect_timeout_ms),
            request_timeout: Duration::from_millis(request_timeout_ms),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that the endpoint is an absolute http(s) URL.
    pub fn validate(&self) -> Result<()> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(ClientError::Config(format!(
                "endpoint must start with http:// or https://, got {:?}",
                self.endpoint
            )));
        }
        Ok(())
    }

    /// Namespace applied when a call and its object name none.
    pub fn default_namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or("default")
    }

    /// Set the API server URL.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the default namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set the body encoding.
    pub fn with_content_type(mut self, codec: Codec) -> Self {
        self.content_type = codec;
        self
    }

    /// Set the bearer token.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Enable or disable certificate verification skipping.
    pub fn with_skip_cert_verification(mut self, skip: bool) -> Self {
        self.skip_cert_verification = skip;
        self
    }

    /// Set the connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
