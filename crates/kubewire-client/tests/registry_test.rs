// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Resource registry tests, including a caller-defined resource type.

mod common;

use std::sync::Arc;

use kubewire_client::{
    Client, ClientConfig, ClientError, ConfigMap, Namespace, ObjectMeta, RegistrationError,
    RequestOptions, Resource, ResourceCoordinates, ResourceId, ResourceRegistry,
};
use prost::Message;
use serde::{Deserialize, Serialize};

/// A coordination lease, registered by the caller.
#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Lease {
    #[prost(message, required, tag = "1")]
    metadata: ObjectMeta,
    #[prost(string, tag = "2")]
    holder_identity: String,
}

impl Resource for Lease {
    const ID: ResourceId = ResourceId::new("coordination.k8s.io", "v1", "Lease");

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

fn lease_coords() -> ResourceCoordinates {
    ResourceCoordinates::namespaced("coordination.k8s.io", "v1", "leases")
}

#[test]
fn test_lookup_registered_type() {
    let mut registry = ResourceRegistry::new();
    registry.register_resource::<Lease>(lease_coords());

    let coords = registry.lookup(&Lease::ID).unwrap();
    assert_eq!(coords, &lease_coords());
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_lookup_unregistered_type() {
    let registry = ResourceRegistry::with_builtins();
    let err = registry.lookup(&Lease::ID).unwrap_err();
    assert!(matches!(err, ClientError::NotRegistered(id) if id == Lease::ID));
}

#[test]
fn test_try_register_duplicate() {
    let mut registry = ResourceRegistry::with_builtins();
    let err = registry
        .try_register(
            ConfigMap::ID,
            ResourceCoordinates::namespaced("", "v1", "other"),
        )
        .unwrap_err();
    assert_eq!(err, RegistrationError(ConfigMap::ID));

    // The first registration is kept.
    assert_eq!(registry.lookup(&ConfigMap::ID).unwrap().plural, "configmaps");
}

#[test]
#[should_panic(expected = "registered twice")]
fn test_register_duplicate_panics() {
    let mut registry = ResourceRegistry::new();
    registry.register_resource::<Lease>(lease_coords());
    registry.register_resource::<Lease>(lease_coords());
}

#[test]
fn test_distinct_identities_may_share_coordinates() {
    let mut registry = ResourceRegistry::new();
    let v1 = ResourceId::new("example.com", "v1", "Widget");
    let v1beta1 = ResourceId::new("example.com", "v1beta1", "Widget");
    let coords = ResourceCoordinates::namespaced("example.com", "v1", "widgets");

    registry.try_register(v1, coords.clone()).unwrap();
    registry.try_register(v1beta1, coords.clone()).unwrap();
    assert_eq!(registry.lookup(&v1).unwrap(), registry.lookup(&v1beta1).unwrap());
}

#[test]
fn test_builtins_scope() {
    let registry = ResourceRegistry::with_builtins();
    assert!(registry.lookup(&ConfigMap::ID).unwrap().namespaced);
    assert!(!registry.lookup(&Namespace::ID).unwrap().namespaced);
}

#[tokio::test]
async fn test_client_rejects_unregistered_type() {
    let server = common::FakeApiServer::new();
    let client = server.client(kubewire_client::Codec::Json);

    let err = client
        .get::<Lease>(None, "leader", &RequestOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NotRegistered(_)));
    assert!(server.requests().await.is_empty());
}

#[tokio::test]
async fn test_client_uses_caller_registry() {
    let server = common::FakeApiServer::new();
    let mut registry = ResourceRegistry::with_builtins();
    registry.register_resource::<Lease>(lease_coords());
    let client = Client::with_transport(
        ClientConfig::new().with_endpoint(common::ENDPOINT),
        server.clone(),
        Arc::new(registry),
    );

    // The fake server only serves config maps; the URL is what matters here.
    let err = client
        .get::<Lease>(Some("kube-system"), "leader", &RequestOptions::new())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    let requests = server.requests().await;
    assert_eq!(
        requests[0].1,
        "http://fake.local/apis/coordination.k8s.io/v1/namespaces/kube-system/leases/leader"
    );
}
