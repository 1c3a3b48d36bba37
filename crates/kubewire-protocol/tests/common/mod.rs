// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Message types shared by the protocol integration tests.

#![allow(dead_code)]

use kubewire_protocol::codec::wrap_envelope;
use kubewire_protocol::meta::{ListMeta, ObjectMeta};
use prost::Message;
use serde::{Deserialize, Serialize};

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Widget {
    #[prost(message, required, tag = "1")]
    pub metadata: ObjectMeta,
    #[prost(int32, tag = "2")]
    pub size: i32,
    #[prost(string, tag = "3")]
    pub color: String,
}

impl Widget {
    pub fn new(namespace: &str, name: &str, size: i32) -> Self {
        Self {
            metadata: ObjectMeta::named(namespace, name),
            size,
            color: "blue".to_string(),
        }
    }
}

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WidgetList {
    #[prost(message, required, tag = "1")]
    pub metadata: ListMeta,
    #[prost(message, repeated, tag = "2")]
    pub items: Vec<Widget>,
}

/// Protobuf list body with the given items.
pub fn protobuf_list(resource_version: &str, items: Vec<Widget>) -> Vec<u8> {
    let list = WidgetList {
        metadata: ListMeta {
            resource_version: resource_version.to_string(),
            ..Default::default()
        },
        items,
    };
    wrap_envelope(&list.encode_to_vec()).unwrap().to_vec()
}
