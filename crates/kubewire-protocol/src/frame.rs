// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Watch event framing.
//!
//! A watch response body is an unbounded sequence of events.
//!
//! JSON bodies carry concatenated `{"type": ..., "object": ...}` values.
//!
//! Protobuf bodies carry length-prefixed frames:
//! - 4 bytes: frame length (big-endian)
//! - N bytes: envelope holding a `WatchEvent` whose `object.raw` is itself an
//!   envelope holding the changed object

use std::fmt;
use std::str::FromStr;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use prost::Message;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

use crate::codec::{
    Codec, DecodeError, DecodeStage, EncodeError, WireMessage, unwrap_envelope, wrap_envelope,
};
use crate::meta::{RawExtension, WatchEvent};

/// Maximum frame size (64 MB)
pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// Protobuf frame length prefix size
pub const LENGTH_PREFIX_SIZE: usize = 4;

const READ_CHUNK: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Added,
    Modified,
    Deleted,
    /// The object is a `Status` describing a server-side failure.
    Error,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Added => "ADDED",
            EventType::Modified => "MODIFIED",
            EventType::Deleted => "DELETED",
            EventType::Error => "ERROR",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADDED" => Ok(EventType::Added),
            "MODIFIED" => Ok(EventType::Modified),
            "DELETED" => Ok(EventType::Deleted),
            "ERROR" => Ok(EventType::Error),
            other => Err(FrameError::UnknownEventType(other.to_string())),
        }
    }
}

/// Errors that can occur while reading watch frames
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame too large: {0} bytes (max: {MAX_FRAME_SIZE})")]
    FrameTooLarge(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("event decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("unknown watch event type: {0:?}")]
    UnknownEventType(String),

    #[error("watch event has no object")]
    MissingObject,

    #[error("connection closed")]
    ConnectionClosed,
}

/// One watch event with its object still encoded.
#[derive(Debug, Clone)]
pub struct RawEvent {
    pub event_type: EventType,
    pub codec: Codec,
    /// The object in `codec`'s full wire form (enveloped for protobuf).
    pub object: Bytes,
}

impl RawEvent {
    pub fn decode<T: WireMessage>(&self) -> Result<T, DecodeError> {
        self.codec.decode(&self.object)
    }
}

#[derive(Deserialize)]
struct JsonEventProbe<'a> {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default, borrow)]
    object: Option<&'a RawValue>,
}

#[derive(Serialize)]
struct JsonEventOut<'a, T> {
    #[serde(rename = "type")]
    event_type: &'static str,
    object: &'a T,
}

/// Reads successive watch events from a response body.
///
/// Not cancel-safe: a read abandoned mid-frame leaves the reader positioned
/// inside that frame, so the reader must be dropped afterwards.
pub struct EventReader<R> {
    reader: R,
    codec: Codec,
    buf: BytesMut,
    boundary: JsonBoundary,
}

impl<R: AsyncRead + Unpin> EventReader<R> {
    pub fn new(reader: R, codec: Codec) -> Self {
        Self {
            reader,
            codec,
            buf: BytesMut::new(),
            boundary: JsonBoundary::default(),
        }
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Read the next event.
    ///
    /// Returns `ConnectionClosed` when the body ends on a frame boundary and
    /// `Io(UnexpectedEof)` when it ends inside a frame.
    pub async fn read_event(&mut self) -> Result<RawEvent, FrameError> {
        let event = match self.codec {
            Codec::Json => self.read_json().await?,
            Codec::Protobuf => self.read_protobuf().await?,
        };
        trace!(event_type = %event.event_type, size = event.object.len(), "Read watch event");
        Ok(event)
    }

    async fn read_json(&mut self) -> Result<RawEvent, FrameError> {
        loop {
            // Parse only once the scan has seen the value close.
            if self.boundary.complete(&self.buf)
                && let Some((consumed, event)) = parse_json_event(&self.buf)?
            {
                self.buf.advance(consumed);
                self.boundary = JsonBoundary::default();
                return Ok(event);
            }

            if self.buf.len() > MAX_FRAME_SIZE {
                return Err(FrameError::FrameTooLarge(self.buf.len()));
            }

            self.buf.reserve(READ_CHUNK);
            if self.reader.read_buf(&mut self.buf).await? == 0 {
                if self.buf.iter().all(u8::is_ascii_whitespace) {
                    return Err(FrameError::ConnectionClosed);
                }
                return Err(truncated("truncated watch event"));
            }
        }
    }

    async fn read_protobuf(&mut self) -> Result<RawEvent, FrameError> {
        let prefix = read_prefix(&mut self.reader).await?;
        let length = u32::from_be_bytes(prefix) as usize;
        if length > MAX_FRAME_SIZE {
            return Err(FrameError::FrameTooLarge(length));
        }

        let mut payload = vec![0u8; length];
        self.reader.read_exact(&mut payload).await?;
        decode_protobuf_event(&payload)
    }
}

fn truncated(message: &'static str) -> FrameError {
    FrameError::Io(std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        message,
    ))
}

/// Read the length prefix. EOF before its first byte is a clean close.
async fn read_prefix<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<[u8; LENGTH_PREFIX_SIZE], FrameError> {
    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    let mut filled = 0;
    while filled < LENGTH_PREFIX_SIZE {
        match reader.read(&mut prefix[filled..]).await? {
            0 if filled == 0 => return Err(FrameError::ConnectionClosed),
            0 => return Err(truncated("truncated frame length prefix")),
            n => filled += n,
        }
    }
    Ok(prefix)
}

/// Incremental scan for the end of the first JSON value in a buffer.
///
/// Tracks string and nesting state across reads so each byte is looked at
/// once per event. Values that do not start with `{` or `[` are reported
/// complete straight away and left to the parser.
#[derive(Debug, Default)]
struct JsonBoundary {
    scanned: usize,
    depth: usize,
    started: bool,
    in_string: bool,
    escaped: bool,
}

impl JsonBoundary {
    fn complete(&mut self, buf: &[u8]) -> bool {
        while let Some(&byte) = buf.get(self.scanned) {
            self.scanned += 1;
            if self.in_string {
                match byte {
                    _ if self.escaped => self.escaped = false,
                    b'\\' => self.escaped = true,
                    b'"' => self.in_string = false,
                    _ => {}
                }
                continue;
            }
            match byte {
                b'{' | b'[' => {
                    self.started = true;
                    self.depth += 1;
                }
                b if b.is_ascii_whitespace() => {}
                _ if !self.started => return true,
                b'"' => self.in_string = true,
                b'}' | b']' => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        return true;
                    }
                }
                _ => {}
            }
        }
        false
    }
}

/// Try to parse one complete JSON event from the front of `buf`.
///
/// `Ok(None)` means more input is needed.
fn parse_json_event(buf: &[u8]) -> Result<Option<(usize, RawEvent)>, FrameError> {
    let mut stream = serde_json::Deserializer::from_slice(buf).into_iter::<JsonEventProbe<'_>>();
    match stream.next() {
        None => Ok(None),
        Some(Err(e)) if e.is_eof() => Ok(None),
        Some(Err(e)) => Err(FrameError::Decode(DecodeError::Json(e))),
        Some(Ok(probe)) => {
            let consumed = stream.byte_offset();
            let event_type = probe.event_type.parse()?;
            let object = probe.object.ok_or(FrameError::MissingObject)?;
            Ok(Some((
                consumed,
                RawEvent {
                    event_type,
                    codec: Codec::Json,
                    object: Bytes::copy_from_slice(object.get().as_bytes()),
                },
            )))
        }
    }
}

fn decode_protobuf_event(frame: &[u8]) -> Result<RawEvent, FrameError> {
    let body = unwrap_envelope(frame)?;
    let message = WatchEvent::decode(body).map_err(DecodeError::protobuf(DecodeStage::Frame))?;
    let event_type = message.event_type.parse()?;
    let object = message.object.ok_or(FrameError::MissingObject)?;
    Ok(RawEvent {
        event_type,
        codec: Codec::Protobuf,
        object: object.raw,
    })
}

/// Encode one event as it would appear in a watch response body.
pub fn encode_event<T: WireMessage>(
    codec: Codec,
    event_type: EventType,
    object: &T,
) -> Result<Bytes, EncodeError> {
    match codec {
        Codec::Json => {
            let mut out = serde_json::to_vec(&JsonEventOut {
                event_type: event_type.as_str(),
                object,
            })?;
            out.push(b'\n');
            Ok(Bytes::from(out))
        }
        Codec::Protobuf => {
            let message = WatchEvent {
                event_type: event_type.as_str().to_string(),
                object: Some(RawExtension {
                    raw: codec.encode(object)?,
                }),
            };
            let frame = wrap_envelope(&message.encode_to_vec())?;
            if frame.len() > MAX_FRAME_SIZE {
                return Err(EncodeError::FrameTooLarge(frame.len()));
            }
            let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + frame.len());
            buf.put_u32(frame.len() as u32);
            buf.put(frame);
            Ok(buf.freeze())
        }
    }
}
