// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Typed client for the resource API.

use std::sync::Arc;

use bytes::Bytes;
use kubewire_protocol::meta::{ListMeta, ObjectMeta, Status};
use kubewire_protocol::{Codec, DeferredList, WireMessage, decode_list};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::ClientConfig;
use crate::custom::CustomResources;
use crate::error::{ApiError, ClientError, Result};
use crate::registry::{Resource, ResourceCoordinates, ResourceRegistry};
use crate::transport::{HttpRequest, HttpResponse, Method, ReqwestTransport, Transport};
use crate::url::{RequestOptions, UrlResolver};
use crate::watch::Watcher;

/// Typed items of a collection together with the collection metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectList<T> {
    pub metadata: ListMeta,
    pub items: Vec<T>,
}

/// Client for create, read, update, delete, list and watch calls.
///
/// Cloning is cheap: the transport and registry are shared. Every request
/// races the client's cancellation token and returns
/// [`ClientError::Cancelled`] when it fires.
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    registry: Arc<ResourceRegistry>,
    resolver: UrlResolver,
    config: ClientConfig,
    cancel: CancellationToken,
}

impl Client {
    /// Create a client with the `reqwest` transport and built-in resource types.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_registry(config, ResourceRegistry::with_builtins())
    }

    /// Create a client with the `reqwest` transport and a caller-populated registry.
    pub fn with_registry(config: ClientConfig, registry: ResourceRegistry) -> Result<Self> {
        config.validate()?;
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self::with_transport(
            config,
            Arc::new(transport),
            Arc::new(registry),
        ))
    }

    /// Create a client over any transport.
    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        registry: Arc<ResourceRegistry>,
    ) -> Self {
        info!(
            endpoint = %config.endpoint,
            content_type = %config.content_type,
            resources = registry.len(),
            "Created client"
        );
        Self {
            transport,
            registry,
            resolver: UrlResolver::new(config.endpoint.clone()),
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Create a client from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Create a client for a local proxy.
    pub fn localhost() -> Result<Self> {
        Self::new(ClientConfig::localhost())
    }

    /// A clone of this client whose requests are cancelled by `token`.
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            cancel: token,
            ..self.clone()
        }
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &UrlResolver {
        &self.resolver
    }

    pub fn codec(&self) -> Codec {
        self.config.content_type
    }

    /// JSON client for user-defined resources in `group/version`.
    pub fn custom(&self, group: impl Into<String>, version: impl Into<String>) -> CustomResources {
        CustomResources::new(self.clone(), group.into(), version.into())
    }

    // =========================================================================
    // Internal helpers
    // =========================================================================

    /// Resolve the namespace for a request.
    ///
    /// Namespaced types fall back from the explicit namespace to the object's
    /// namespace, the configured default and finally `"default"`. For
    /// cluster-scoped types only an explicit namespace is passed through, so
    /// the resolver can reject it.
    pub(crate) fn namespace_for(
        &self,
        coords: &ResourceCoordinates,
        explicit: Option<&str>,
        meta: Option<&ObjectMeta>,
    ) -> Option<String> {
        let explicit = explicit.filter(|ns| !ns.is_empty());
        if !coords.namespaced {
            return explicit.map(str::to_string);
        }
        let namespace = explicit
            .or_else(|| {
                meta.map(|m| m.namespace.as_str())
                    .filter(|ns| !ns.is_empty())
            })
            .unwrap_or_else(|| self.config.default_namespace());
        Some(namespace.to_string())
    }

    fn request(&self, method: Method, url: String) -> HttpRequest {
        HttpRequest::new(method, url)
            .with_codec(self.codec())
            .with_timeout(Some(self.config.request_timeout))
    }

    /// Send a request, racing it against the cancellation token.
    pub(crate) async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ClientError::Cancelled),
            response = self.transport.send(request) => Ok(response?),
        }
    }

    pub(crate) async fn read_body(&self, response: HttpResponse) -> Result<Bytes> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ClientError::Cancelled),
            body = response.bytes() => Ok(body?),
        }
    }

    /// Send a request and map a non-success response to an error.
    ///
    /// The error body is decoded as a `Status` using the response content
    /// type when it is recognised, and `fallback` otherwise.
    pub(crate) async fn execute(
        &self,
        request: HttpRequest,
        fallback: Codec,
    ) -> Result<HttpResponse> {
        let response = self.send(request).await?;
        if response.is_success() {
            return Ok(response);
        }

        let http_status = response.status;
        let codec = response.codec().unwrap_or(fallback);
        let body = self.read_body(response).await?;
        match codec.decode::<Status>(&body) {
            Ok(status) => {
                debug!(http_status, reason = %status.reason, "Server returned error status");
                Err(ApiError::new(http_status, status).into())
            }
            Err(source) => {
                warn!(http_status, error = %source, "Undecodable error body");
                Err(ClientError::ErrorBody {
                    http_status,
                    source,
                })
            }
        }
    }

    async fn fetch<T: WireMessage>(&self, request: HttpRequest) -> Result<T> {
        let response = self.execute(request, self.codec()).await?;
        let codec = response.codec().unwrap_or(self.codec());
        let body = self.read_body(response).await?;
        Ok(codec.decode(&body)?)
    }

    fn resource_url<T: Resource>(
        &self,
        namespace: Option<&str>,
        meta: Option<&ObjectMeta>,
        name: Option<&str>,
        options: &RequestOptions,
    ) -> Result<String> {
        let coords = self.registry.lookup(&T::ID)?;
        let namespace = self.namespace_for(coords, namespace, meta);
        self.resolver
            .resolve(coords, namespace.as_deref(), name, options)
    }

    fn collection_url<T: Resource>(
        &self,
        namespace: Option<&str>,
        all_namespaces: bool,
        options: &RequestOptions,
    ) -> Result<String> {
        if all_namespaces {
            let coords = self.registry.lookup(&T::ID)?;
            return self.resolver.resolve(coords, None, None, options);
        }
        self.resource_url::<T>(namespace, None, None, options)
    }

    // =========================================================================
    // CRUD
    // =========================================================================

    /// Create an object. Requires `metadata.name` or `metadata.generateName`.
    #[instrument(skip(self, object), fields(kind = T::ID.kind, name = %object.metadata().name))]
    pub async fn create<T: Resource>(&self, object: &T) -> Result<T> {
        let meta = object.metadata();
        if meta.name.is_empty() && meta.generate_name.is_empty() {
            return Err(ClientError::Validation(
                "no resource name or generateName provided".to_string(),
            ));
        }
        let url = self.resource_url::<T>(None, Some(meta), None, &RequestOptions::default())?;
        let body = self.codec().encode(object)?;
        info!("Creating resource");

        self.fetch(self.request(Method::Post, url).with_body(body))
            .await
    }

    #[instrument(skip(self, options), fields(kind = T::ID.kind))]
    pub async fn get<T: Resource>(
        &self,
        namespace: Option<&str>,
        name: &str,
        options: &RequestOptions,
    ) -> Result<T> {
        if name.is_empty() {
            return Err(ClientError::Validation("no resource name provided".to_string()));
        }
        let url = self.resource_url::<T>(namespace, None, Some(name), options)?;
        debug!("Getting resource");

        self.fetch(self.request(Method::Get, url)).await
    }

    /// Replace an object. The server rejects stale `resourceVersion`s with a conflict.
    #[instrument(skip(self, object), fields(kind = T::ID.kind, name = %object.metadata().name))]
    pub async fn update<T: Resource>(&self, object: &T) -> Result<T> {
        let meta = object.metadata();
        if meta.name.is_empty() {
            return Err(ClientError::Validation("no resource name provided".to_string()));
        }
        let url = self.resource_url::<T>(
            None,
            Some(meta),
            Some(&meta.name),
            &RequestOptions::default(),
        )?;
        let body = self.codec().encode(object)?;
        info!("Updating resource");

        self.fetch(self.request(Method::Put, url).with_body(body))
            .await
    }

    pub async fn delete<T: Resource>(&self, object: &T) -> Result<()> {
        let meta = object.metadata();
        let namespace = Some(meta.namespace.as_str()).filter(|ns| !ns.is_empty());
        let coords = self.registry.lookup(&T::ID)?;
        // Cluster-scoped objects ignore their (empty) namespace.
        let namespace = if coords.namespaced { namespace } else { None };
        self.delete_named::<T>(namespace, &meta.name).await
    }

    #[instrument(skip(self), fields(kind = T::ID.kind))]
    pub async fn delete_named<T: Resource>(&self, namespace: Option<&str>, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(ClientError::Validation("no resource name provided".to_string()));
        }
        let url = self.resource_url::<T>(namespace, None, Some(name), &RequestOptions::default())?;
        info!("Deleting resource");

        let response = self.execute(self.request(Method::Delete, url), self.codec()).await?;
        // Drain so the connection can be reused.
        self.read_body(response).await?;
        Ok(())
    }

    // =========================================================================
    // Lists
    // =========================================================================

    /// List a collection in one namespace, deferring item decoding.
    #[instrument(skip(self, options), fields(kind = T::ID.kind))]
    pub async fn list<T: Resource>(
        &self,
        namespace: Option<&str>,
        options: &RequestOptions,
    ) -> Result<DeferredList> {
        let url = self.collection_url::<T>(namespace, false, options)?;
        self.fetch_list(url).await
    }

    /// List a collection across all namespaces.
    #[instrument(skip(self, options), fields(kind = T::ID.kind))]
    pub async fn list_all<T: Resource>(&self, options: &RequestOptions) -> Result<DeferredList> {
        let url = self.collection_url::<T>(None, true, options)?;
        self.fetch_list(url).await
    }

    /// List and decode every item as `T`.
    pub async fn list_typed<T: Resource>(
        &self,
        namespace: Option<&str>,
        options: &RequestOptions,
    ) -> Result<ObjectList<T>> {
        let list = self.list::<T>(namespace, options).await?;
        let metadata = list.metadata.clone();
        Ok(ObjectList {
            metadata,
            items: list.into_typed()?,
        })
    }

    async fn fetch_list(&self, url: String) -> Result<DeferredList> {
        debug!(url = %url, "Listing resources");
        let response = self
            .execute(self.request(Method::Get, url), self.codec())
            .await?;
        let codec = response.codec().unwrap_or(self.codec());
        let body = self.read_body(response).await?;
        Ok(decode_list(&body, codec)?)
    }

    // =========================================================================
    // Watch
    // =========================================================================

    /// Open a watch stream on a collection in one namespace.
    #[instrument(skip(self, options), fields(kind = T::ID.kind))]
    pub async fn watch<T: Resource>(
        &self,
        namespace: Option<&str>,
        options: &RequestOptions,
    ) -> Result<Watcher<T>> {
        let options = options.clone().with_watch(true);
        let url = self.collection_url::<T>(namespace, false, &options)?;
        self.open_watch(url).await
    }

    /// Open a watch stream across all namespaces.
    #[instrument(skip(self, options), fields(kind = T::ID.kind))]
    pub async fn watch_all<T: Resource>(&self, options: &RequestOptions) -> Result<Watcher<T>> {
        let options = options.clone().with_watch(true);
        let url = self.collection_url::<T>(None, true, &options)?;
        self.open_watch(url).await
    }

    async fn open_watch<T: Resource>(&self, url: String) -> Result<Watcher<T>> {
        info!(url = %url, "Opening watch");
        // Streams stay open until closed, so no whole-request deadline.
        let request = self.request(Method::Get, url).with_timeout(None);
        let response = self.execute(request, self.codec()).await?;
        let codec = response.codec().unwrap_or(self.codec());
        Ok(Watcher::new(response.body, codec, self.cancel.child_token()))
    }

    // =========================================================================
    // Raw requests
    // =========================================================================

    /// GET an arbitrary API path such as `/version` and return the body.
    #[instrument(skip(self))]
    pub async fn raw_get(&self, path: &str) -> Result<Bytes> {
        let url = self.resolver.path_url(path);
        let response = self
            .execute(self.request(Method::Get, url), self.codec())
            .await?;
        self.read_body(response).await
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.config.endpoint)
            .field("content_type", &self.config.content_type)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
