// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Request URL construction.
//!
//! Paths follow the REST layout
//! `{endpoint}/(api|apis/{group})/{version}[/namespaces/{ns}]/{plural}[/{name}][/{subresource}]`.
//! Query parameters are emitted in a fixed order: `resourceVersion`,
//! `timeoutSeconds`, `labelSelector`, custom parameters in insertion order,
//! and `watch=true` last.

use std::time::Duration;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::error::{ClientError, Result};
use crate::registry::ResourceCoordinates;

/// Everything except RFC 3986 unreserved characters is escaped.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

fn encode(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

/// Per-request modifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    pub resource_version: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub label_selector: Option<String>,
    pub subresource: Option<String>,
    pub custom_params: Vec<(String, String)>,
    pub watch: bool,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource_version(mut self, version: impl Into<String>) -> Self {
        self.resource_version = Some(version.into());
        self
    }

    /// Server-side timeout, sent with second granularity.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_seconds = Some(timeout.as_secs());
        self
    }

    /// Accepts a raw selector string or a [`LabelSelector`](crate::LabelSelector).
    pub fn with_label_selector(mut self, selector: impl Into<String>) -> Self {
        self.label_selector = Some(selector.into());
        self
    }

    pub fn with_subresource(mut self, subresource: impl Into<String>) -> Self {
        self.subresource = Some(subresource.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_params.push((key.into(), value.into()));
        self
    }

    pub fn with_watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }
}

/// Builds request URLs against one API endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlResolver {
    endpoint: String,
}

impl UrlResolver {
    /// `endpoint` is the scheme and authority, e.g. `https://10.0.0.1:6443`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Resolve the URL for a resource collection or a named object.
    ///
    /// `namespace` must already be defaulted; pass `None` for cluster-scoped
    /// types and cluster-wide collection requests.
    pub fn resolve(
        &self,
        coords: &ResourceCoordinates,
        namespace: Option<&str>,
        name: Option<&str>,
        options: &RequestOptions,
    ) -> Result<String> {
        let namespace = namespace.filter(|ns| !ns.is_empty());
        let name = name.filter(|n| !n.is_empty());

        if namespace.is_some() && !coords.namespaced {
            return Err(ClientError::Validation(format!(
                "type is not namespaced: {}",
                coords.plural
            )));
        }
        if let Some(subresource) = &options.subresource
            && name.is_none()
        {
            return Err(ClientError::Validation(format!(
                "subresource {subresource:?} requires a resource name"
            )));
        }
        if options.custom_params.iter().any(|(key, _)| key == "watch") {
            return Err(ClientError::Validation(
                "custom parameter \"watch\" conflicts with the watch flag".to_string(),
            ));
        }

        let mut url = self.endpoint.clone();
        if coords.api_group.is_empty() {
            url.push_str("/api");
        } else {
            url.push_str("/apis/");
            url.push_str(&encode(&coords.api_group));
        }
        url.push('/');
        url.push_str(&encode(&coords.api_version));
        if let Some(namespace) = namespace {
            url.push_str("/namespaces/");
            url.push_str(&encode(namespace));
        }
        url.push('/');
        url.push_str(&encode(&coords.plural));
        if let Some(name) = name {
            url.push('/');
            url.push_str(&encode(name));
        }
        if let Some(subresource) = &options.subresource {
            url.push('/');
            url.push_str(&encode(subresource));
        }

        let timeout = options.timeout_seconds.map(|s| s.to_string());
        let mut query: Vec<(&str, &str)> = Vec::new();
        if let Some(version) = &options.resource_version {
            query.push(("resourceVersion", version.as_str()));
        }
        if let Some(timeout) = &timeout {
            query.push(("timeoutSeconds", timeout.as_str()));
        }
        if let Some(selector) = &options.label_selector {
            query.push(("labelSelector", selector.as_str()));
        }
        for (key, value) in &options.custom_params {
            query.push((key.as_str(), value.as_str()));
        }
        if options.watch {
            query.push(("watch", "true"));
        }

        for (i, (key, value)) in query.iter().enumerate() {
            url.push(if i == 0 { '?' } else { '&' });
            url.push_str(&encode(key));
            url.push('=');
            url.push_str(&encode(value));
        }
        Ok(url)
    }

    /// Join an absolute API path such as `/version` to the endpoint.
    pub fn path_url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path.trim_start_matches('/'))
    }
}
