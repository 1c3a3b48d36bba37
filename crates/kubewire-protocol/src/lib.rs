// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Kubewire Protocol - wire layer for a resource-oriented management API
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    kubewire-protocol                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Watch framing: JSON value stream / length-prefixed frames  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Lists: deferred per-item decoding                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Codec: JSON (serde) or k8s\0 envelope + protobuf (prost)   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use kubewire_protocol::{Codec, decode_list, meta::Status};
//!
//! let status: Status = Codec::Protobuf.decode(&body)?;
//!
//! let list = decode_list(&body, Codec::Json)?;
//! for item in &list.items {
//!     println!("{}", item.metadata().name);
//! }
//! let typed: Vec<ConfigMap> = list.into_typed()?;
//! ```

pub mod codec;
pub mod frame;
pub mod list;
pub mod meta;

pub use codec::{
    Codec, DecodeError, DecodeStage, EncodeError, MAGIC, UnsupportedContentType, WireMessage,
};
pub use frame::{EventReader, EventType, FrameError, RawEvent};
pub use list::{DeferredItem, DeferredList, ListItem, decode_list};
pub use meta::{ListMeta, ObjectMeta, Status, Time};
