// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Resource registry.
//!
//! Maps the static identity of a resource type to the REST coordinates used
//! to address it. The registry is populated at start-up and then shared
//! read-only behind an `Arc`.

use std::collections::HashMap;
use std::fmt;

use kubewire_protocol::WireMessage;
use kubewire_protocol::meta::ObjectMeta;
use tracing::debug;

use crate::error::{ClientError, RegistrationError, Result};
use crate::resources::{ConfigMap, Namespace};

/// Static identity of a resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceId {
    /// API group; empty for the core group.
    pub group: &'static str,
    pub version: &'static str,
    pub kind: &'static str,
}

impl ResourceId {
    pub const fn new(group: &'static str, version: &'static str, kind: &'static str) -> Self {
        Self {
            group,
            version,
            kind,
        }
    }

    /// `group/version`, or just `version` for the core group.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.to_string()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, Kind={}", self.api_version(), self.kind)
    }
}

/// Where a resource type lives in the REST API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceCoordinates {
    /// API group; empty selects the legacy `/api` prefix.
    pub api_group: String,
    pub api_version: String,
    /// Plural resource name used in paths, e.g. `configmaps`.
    pub plural: String,
    pub namespaced: bool,
}

impl ResourceCoordinates {
    pub fn namespaced(
        api_group: impl Into<String>,
        api_version: impl Into<String>,
        plural: impl Into<String>,
    ) -> Self {
        Self {
            api_group: api_group.into(),
            api_version: api_version.into(),
            plural: plural.into(),
            namespaced: true,
        }
    }

    pub fn cluster_scoped(
        api_group: impl Into<String>,
        api_version: impl Into<String>,
        plural: impl Into<String>,
    ) -> Self {
        Self {
            namespaced: false,
            ..Self::namespaced(api_group, api_version, plural)
        }
    }
}

/// A typed object the client can send and receive.
pub trait Resource: WireMessage + Clone + Send + Sync + 'static {
    const ID: ResourceId;

    fn metadata(&self) -> &ObjectMeta;

    fn metadata_mut(&mut self) -> &mut ObjectMeta;
}

/// Lookup table from resource identity to REST coordinates.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    entries: HashMap<ResourceId, ResourceCoordinates>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the resource types shipped in this crate.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_resource::<ConfigMap>(ResourceCoordinates::namespaced(
            "",
            "v1",
            "configmaps",
        ));
        registry.register_resource::<Namespace>(ResourceCoordinates::cluster_scoped(
            "",
            "v1",
            "namespaces",
        ));
        registry
    }

    pub fn try_register(
        &mut self,
        id: ResourceId,
        coords: ResourceCoordinates,
    ) -> std::result::Result<(), RegistrationError> {
        if self.entries.contains_key(&id) {
            return Err(RegistrationError(id));
        }
        debug!(resource = %id, plural = %coords.plural, "Registered resource");
        self.entries.insert(id, coords);
        Ok(())
    }

    /// Register a resource identity.
    ///
    /// # Panics
    ///
    /// Panics if `id` is already registered. Registration happens once at
    /// start-up, so a duplicate is a programming error.
    pub fn register(&mut self, id: ResourceId, coords: ResourceCoordinates) {
        if let Err(err) = self.try_register(id, coords) {
            panic!("{err}");
        }
    }

    pub fn register_resource<T: Resource>(&mut self, coords: ResourceCoordinates) {
        self.register(T::ID, coords);
    }

    pub fn lookup(&self, id: &ResourceId) -> Result<&ResourceCoordinates> {
        self.entries
            .get(id)
            .ok_or(ClientError::NotRegistered(*id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
