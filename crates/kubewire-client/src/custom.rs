// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Client for user-defined resource groups.
//!
//! Custom resources have no registered Rust type, so they are addressed by
//! plural resource name and exchanged as JSON on any serde type.

use kubewire_protocol::{Codec, EncodeError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use crate::client::Client;
use crate::error::{ClientError, Result};
use crate::registry::ResourceCoordinates;
use crate::transport::{HttpRequest, Method};
use crate::url::RequestOptions;

/// JSON CRUD for one `group/version`.
#[derive(Debug, Clone)]
pub struct CustomResources {
    client: Client,
    group: String,
    version: String,
}

impl CustomResources {
    pub(crate) fn new(client: Client, group: String, version: String) -> Self {
        Self {
            client,
            group,
            version,
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Build the URL after checking every addressing component is present.
    fn url(
        &self,
        resource: &str,
        namespace: Option<&str>,
        name: Option<&str>,
        options: &RequestOptions,
    ) -> Result<String> {
        let checks = [
            (self.group.as_str(), "no api group provided"),
            (self.version.as_str(), "no api version provided"),
            (resource, "no resource name provided"),
        ];
        for (value, message) in checks {
            if value.is_empty() {
                return Err(ClientError::Validation(message.to_string()));
            }
        }
        if name.is_some_and(str::is_empty) {
            return Err(ClientError::Validation("no object name provided".to_string()));
        }

        let coords = ResourceCoordinates::namespaced(&self.group, &self.version, resource);
        let namespace = self.client.namespace_for(&coords, namespace, None);
        self.client
            .resolver()
            .resolve(&coords, namespace.as_deref(), name, options)
    }

    fn request(&self, method: Method, url: String) -> HttpRequest {
        HttpRequest::new(method, url)
            .with_codec(Codec::Json)
            .with_timeout(Some(self.client.config().request_timeout))
    }

    async fn fetch<R: DeserializeOwned>(&self, request: HttpRequest) -> Result<R> {
        let response = self.client.execute(request, Codec::Json).await?;
        let body = self.client.read_body(response).await?;
        serde_json::from_slice(&body).map_err(|e| ClientError::Decode(e.into()))
    }

    fn encode<T: Serialize>(object: &T) -> Result<bytes::Bytes> {
        let body = serde_json::to_vec(object).map_err(EncodeError::from)?;
        Ok(body.into())
    }

    #[instrument(skip(self, object), fields(group = %self.group, resource = %resource))]
    pub async fn create<T: Serialize, R: DeserializeOwned>(
        &self,
        resource: &str,
        namespace: Option<&str>,
        object: &T,
    ) -> Result<R> {
        let url = self.url(resource, namespace, None, &RequestOptions::default())?;
        info!("Creating custom resource");
        self.fetch(self.request(Method::Post, url).with_body(Self::encode(object)?))
            .await
    }

    #[instrument(skip(self, object), fields(group = %self.group, resource = %resource))]
    pub async fn update<T: Serialize, R: DeserializeOwned>(
        &self,
        resource: &str,
        namespace: Option<&str>,
        name: &str,
        object: &T,
    ) -> Result<R> {
        let url = self.url(resource, namespace, Some(name), &RequestOptions::default())?;
        info!("Updating custom resource");
        self.fetch(self.request(Method::Put, url).with_body(Self::encode(object)?))
            .await
    }

    #[instrument(skip(self), fields(group = %self.group))]
    pub async fn get<R: DeserializeOwned>(
        &self,
        resource: &str,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<R> {
        let url = self.url(resource, namespace, Some(name), &RequestOptions::default())?;
        debug!("Getting custom resource");
        self.fetch(self.request(Method::Get, url)).await
    }

    #[instrument(skip(self), fields(group = %self.group))]
    pub async fn delete(&self, resource: &str, namespace: Option<&str>, name: &str) -> Result<()> {
        let url = self.url(resource, namespace, Some(name), &RequestOptions::default())?;
        info!("Deleting custom resource");
        let response = self
            .client
            .execute(self.request(Method::Delete, url), Codec::Json)
            .await?;
        self.client.read_body(response).await?;
        Ok(())
    }

    /// List into a caller-defined list type such as `{metadata, items: Vec<_>}`.
    #[instrument(skip(self, options), fields(group = %self.group))]
    pub async fn list<R: DeserializeOwned>(
        &self,
        resource: &str,
        namespace: Option<&str>,
        options: &RequestOptions,
    ) -> Result<R> {
        let url = self.url(resource, namespace, None, options)?;
        debug!("Listing custom resources");
        self.fetch(self.request(Method::Get, url)).await
    }
}
