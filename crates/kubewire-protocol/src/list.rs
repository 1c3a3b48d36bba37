// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Deferred list decoding.
//!
//! Collection responses are decoded without knowing the item type. Each item
//! keeps its raw encoded bytes alongside eagerly extracted metadata, and is
//! decoded into a concrete type only when the caller materializes it.
//!
//! For protobuf the envelope payload is walked field by field:
//! - field 1 (length-delimited): `ListMeta`
//! - field 2 (length-delimited, repeated): one item
//!
//! Any other field is skipped according to its wire type.

use std::ops::Range;

use bytes::Bytes;
use prost::Message;
use serde::Deserialize;
use serde_json::value::RawValue;
use tracing::debug;

use crate::codec::{Codec, DecodeError, DecodeStage, WireMessage, unwrap_envelope};
use crate::meta::{ListMeta, ObjectMeta};

const WIRE_VARINT: u64 = 0;
const WIRE_FIXED64: u64 = 1;
const WIRE_LEN: u64 = 2;
const WIRE_FIXED32: u64 = 5;

const LIST_META_FIELD: u64 = 1;
const ITEM_FIELD: u64 = 2;

/// One collection item whose payload has not been decoded yet.
#[derive(Debug, Clone)]
pub struct DeferredItem {
    codec: Codec,
    raw: Bytes,
    metadata: ObjectMeta,
}

impl DeferredItem {
    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn content_type(&self) -> &'static str {
        self.codec.content_type()
    }

    pub fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    /// The item's encoded bytes, exactly as they appeared in the response.
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    /// Decode the payload into `T`, consuming the item.
    pub fn materialize<T: WireMessage>(self) -> Result<T, DecodeError> {
        self.decode()
    }

    /// Protobuf items are bare messages; the envelope belongs to the list.
    fn decode<T: WireMessage>(&self) -> Result<T, DecodeError> {
        match self.codec {
            Codec::Json => Ok(serde_json::from_slice(&self.raw)?),
            Codec::Protobuf => T::decode(self.raw.clone())
                .map_err(DecodeError::protobuf(DecodeStage::Payload)),
        }
    }
}

/// A list item that is either still raw or already decoded.
#[derive(Debug, Clone)]
pub enum ListItem<T> {
    Unmaterialized(DeferredItem),
    Materialized(T),
}

impl<T: WireMessage> ListItem<T> {
    pub fn is_materialized(&self) -> bool {
        matches!(self, ListItem::Materialized(_))
    }

    /// Decode in place on first use and return the typed value.
    ///
    /// On failure the item stays unmaterialized.
    pub fn materialize(&mut self) -> Result<&T, DecodeError> {
        let value = match self {
            ListItem::Unmaterialized(item) => item.decode()?,
            ListItem::Materialized(_) => return self.value(),
        };
        *self = ListItem::Materialized(value);
        self.value()
    }

    fn value(&self) -> Result<&T, DecodeError> {
        match self {
            ListItem::Materialized(value) => Ok(value),
            ListItem::Unmaterialized(_) => {
                Err(DecodeError::List("item has not been materialized".to_string()))
            }
        }
    }

    pub fn into_value(self) -> Result<T, DecodeError> {
        match self {
            ListItem::Unmaterialized(item) => item.materialize(),
            ListItem::Materialized(value) => Ok(value),
        }
    }
}

impl<T> From<DeferredItem> for ListItem<T> {
    fn from(item: DeferredItem) -> Self {
        ListItem::Unmaterialized(item)
    }
}

/// A decoded collection with deferred items, in response order.
#[derive(Debug, Clone, Default)]
pub struct DeferredList {
    pub metadata: ListMeta,
    pub items: Vec<DeferredItem>,
}

impl DeferredList {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Materialize every item as `T`, preserving order.
    pub fn into_typed<T: WireMessage>(self) -> Result<Vec<T>, DecodeError> {
        self.items.into_iter().map(DeferredItem::materialize).collect()
    }

    pub fn into_items<T>(self) -> Vec<ListItem<T>> {
        self.items.into_iter().map(ListItem::from).collect()
    }
}

/// Decode a collection response body.
///
/// Fails as a whole on any malformed input; no partial list is returned.
pub fn decode_list(bytes: &[u8], codec: Codec) -> Result<DeferredList, DecodeError> {
    let list = match codec {
        Codec::Json => decode_json_list(bytes)?,
        Codec::Protobuf => decode_protobuf_list(bytes)?,
    };
    debug!(
        items = list.items.len(),
        resource_version = %list.metadata.resource_version,
        "Decoded list"
    );
    Ok(list)
}

// ============================================================================
// JSON
// ============================================================================

#[derive(Deserialize)]
struct JsonListProbe<'a> {
    #[serde(default)]
    metadata: Option<ListMeta>,
    #[serde(default, borrow)]
    items: Option<Vec<&'a RawValue>>,
}

#[derive(Deserialize)]
struct JsonItemProbe {
    #[serde(default)]
    metadata: Option<ObjectMeta>,
}

fn decode_json_list(bytes: &[u8]) -> Result<DeferredList, DecodeError> {
    let probe: JsonListProbe<'_> = serde_json::from_slice(bytes)?;
    let items = probe
        .items
        .unwrap_or_default()
        .into_iter()
        .map(|raw| {
            let item: JsonItemProbe = serde_json::from_str(raw.get())?;
            Ok(DeferredItem {
                codec: Codec::Json,
                raw: Bytes::copy_from_slice(raw.get().as_bytes()),
                metadata: item.metadata.unwrap_or_default(),
            })
        })
        .collect::<Result<Vec<_>, DecodeError>>()?;

    Ok(DeferredList {
        metadata: probe.metadata.unwrap_or_default(),
        items,
    })
}

// ============================================================================
// Protobuf
// ============================================================================

/// Reads only the metadata of an item; every other field is ignored by prost.
#[derive(Clone, PartialEq, Message)]
struct ItemProbe {
    #[prost(message, optional, tag = "1")]
    metadata: Option<ObjectMeta>,
}

fn decode_protobuf_list(bytes: &[u8]) -> Result<DeferredList, DecodeError> {
    let body = unwrap_envelope(bytes)?;
    let mut list = DeferredList::default();
    let mut pos = 0;

    while pos < body.len() {
        let key = read_varint(&body, &mut pos)?;
        let field = key >> 3;
        let wire_type = key & 0x7;

        match field {
            0 => return Err(DecodeError::List("field number 0".to_string())),
            LIST_META_FIELD | ITEM_FIELD if wire_type != WIRE_LEN => {
                return Err(DecodeError::List(format!(
                    "field {field} has wire type {wire_type}, expected length-delimited"
                )));
            }
            LIST_META_FIELD => {
                let range = read_len(&body, &mut pos)?;
                list.metadata = ListMeta::decode(&body[range])
                    .map_err(DecodeError::protobuf(DecodeStage::List))?;
            }
            ITEM_FIELD => {
                let raw = body.slice(read_len(&body, &mut pos)?);
                let probe = ItemProbe::decode(raw.clone())
                    .map_err(DecodeError::protobuf(DecodeStage::List))?;
                list.items.push(DeferredItem {
                    codec: Codec::Protobuf,
                    raw,
                    metadata: probe.metadata.unwrap_or_default(),
                });
            }
            _ => skip_field(&body, &mut pos, wire_type)?,
        }
    }

    Ok(list)
}

fn read_varint(buf: &[u8], pos: &mut usize) -> Result<u64, DecodeError> {
    let mut value = 0u64;
    for shift in (0..64).step_by(7) {
        let Some(&byte) = buf.get(*pos) else {
            return Err(DecodeError::List(format!("truncated varint at offset {pos}")));
        };
        *pos += 1;
        if shift == 63 && byte > 1 {
            return Err(DecodeError::List("varint overflows 64 bits".to_string()));
        }
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(DecodeError::List("varint overflows 64 bits".to_string()))
}

fn read_len(buf: &[u8], pos: &mut usize) -> Result<Range<usize>, DecodeError> {
    let len = read_varint(buf, pos)?;
    let remaining = buf.len() - *pos;
    let len = usize::try_from(len)
        .ok()
        .filter(|len| *len <= remaining)
        .ok_or_else(|| {
            DecodeError::List(format!(
                "length {len} exceeds remaining {remaining} bytes"
            ))
        })?;
    let range = *pos..*pos + len;
    *pos += len;
    Ok(range)
}

fn advance(buf: &[u8], pos: &mut usize, n: usize) -> Result<(), DecodeError> {
    if buf.len() - *pos < n {
        return Err(DecodeError::List(format!(
            "truncated fixed-width field at offset {pos}"
        )));
    }
    *pos += n;
    Ok(())
}

fn skip_field(buf: &[u8], pos: &mut usize, wire_type: u64) -> Result<(), DecodeError> {
    match wire_type {
        WIRE_VARINT => read_varint(buf, pos).map(drop),
        WIRE_FIXED64 => advance(buf, pos, 8),
        WIRE_LEN => read_len(buf, pos).map(drop),
        WIRE_FIXED32 => advance(buf, pos, 4),
        other => Err(DecodeError::List(format!("unsupported wire type {other}"))),
    }
}
