// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Kubewire Client
//!
//! Typed client for a resource-oriented management API: create, read, update,
//! delete, list and watch objects identified by group, version and kind.
//!
//! # Architecture
//!
//! A CRUD call resolves the type's REST coordinates through the
//! [`ResourceRegistry`], builds the URL with the [`UrlResolver`], encodes the
//! body with the configured [`Codec`], and sends it over a [`Transport`].
//! Non-success responses are decoded as a `Status` and surface as
//! [`ClientError::Api`]. A watch call keeps the response body open and hands
//! it to a [`Watcher`].
//!
//! # Example
//!
//! ```no_run
//! use kubewire_client::{Client, ClientConfig, ConfigMap, EventType, RequestOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::new(ClientConfig::from_env()?)?;
//!
//! let created = client
//!     .create(&ConfigMap::new("default", "settings").with_data("mode", "fast"))
//!     .await?;
//! println!("Created at version {}", created.metadata.resource_version);
//!
//! let options = RequestOptions::new().with_resource_version(&created.metadata.resource_version);
//! let watcher = client.watch::<ConfigMap>(Some("default"), &options).await?;
//! while let Ok(event) = watcher.next().await {
//!     if event.event_type == EventType::Deleted {
//!         break;
//!     }
//! }
//! watcher.close();
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod custom;
mod error;
mod registry;
mod resources;
mod selector;
mod transport;
mod url;
mod watch;

pub use client::{Client, ObjectList};
pub use config::ClientConfig;
pub use custom::CustomResources;
pub use error::{ApiError, ClientError, RegistrationError, Result};
pub use registry::{Resource, ResourceCoordinates, ResourceId, ResourceRegistry};
pub use resources::{ConfigMap, ConfigMapList, Namespace, NamespaceSpec, NamespaceStatus};
pub use selector::LabelSelector;
pub use transport::{
    BodyReader, HttpRequest, HttpResponse, Method, ReqwestTransport, Transport, TransportError,
};
pub use url::{RequestOptions, UrlResolver};
pub use watch::{WatchEvent, Watcher};

pub use kubewire_protocol::meta::{ListMeta, ObjectMeta, Status, Time};
pub use kubewire_protocol::{Codec, DeferredItem, DeferredList, EventType, ListItem};
pub use tokio_util::sync::CancellationToken;
