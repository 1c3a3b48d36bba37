// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Envelope codec.
//!
//! Objects travel either as plain JSON or as a protobuf envelope:
//! - 4 bytes: magic `k8s\0`
//! - N bytes: container message whose field 1 (bytes) holds the encoded object

use std::fmt;
use std::str::FromStr;

use bytes::{BufMut, Bytes, BytesMut};
use prost::Message;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Envelope prefix for protobuf payloads.
pub const MAGIC: [u8; 4] = *b"k8s\0";

pub const JSON_MEDIA_TYPE: &str = "application/json";
pub const PROTOBUF_MEDIA_TYPE: &str = "application/vnd.kubernetes.protobuf";

/// A message that can travel through either codec.
pub trait WireMessage: Message + Default + Serialize + DeserializeOwned {}

impl<T> WireMessage for T where T: Message + Default + Serialize + DeserializeOwned {}

/// Container wrapped by the envelope magic.
#[derive(Clone, PartialEq, Message)]
pub struct Container {
    #[prost(bytes = "bytes", tag = "1")]
    pub raw: Bytes,
}

/// Which part of a payload failed to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStage {
    Json,
    /// Envelope length or magic check
    Magic,
    /// Container message inside the envelope
    Container,
    /// The typed message itself
    Payload,
    /// Collection walk in the list decoder
    List,
    /// Watch frame wrapper
    Frame,
}

impl fmt::Display for DecodeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DecodeStage::Json => "json",
            DecodeStage::Magic => "magic",
            DecodeStage::Container => "container",
            DecodeStage::Payload => "payload",
            DecodeStage::List => "list",
            DecodeStage::Frame => "frame",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("envelope too short: {0} bytes (need at least {need})", need = MAGIC.len())]
    TooShort(usize),

    #[error("invalid envelope magic: {0:02x?}")]
    BadMagic([u8; 4]),

    #[error("protobuf {stage} decode error: {source}")]
    Protobuf {
        stage: DecodeStage,
        #[source]
        source: prost::DecodeError,
    },

    #[error("JSON decode error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed list: {0}")]
    List(String),
}

impl DecodeError {
    pub fn stage(&self) -> DecodeStage {
        match self {
            DecodeError::TooShort(_) | DecodeError::BadMagic(_) => DecodeStage::Magic,
            DecodeError::Protobuf { stage, .. } => *stage,
            DecodeError::Json(_) => DecodeStage::Json,
            DecodeError::List(_) => DecodeStage::List,
        }
    }

    pub(crate) fn protobuf(stage: DecodeStage) -> impl FnOnce(prost::DecodeError) -> Self {
        move |source| DecodeError::Protobuf { stage, source }
    }
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("JSON encode error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("protobuf encode error: {0}")]
    Protobuf(#[from] prost::EncodeError),

    #[error("frame too large: {0} bytes")]
    FrameTooLarge(usize),
}

#[derive(Debug, Error)]
#[error("unsupported content type: {0}")]
pub struct UnsupportedContentType(pub String);

/// Negotiated wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Codec {
    #[default]
    Json,
    Protobuf,
}

impl Codec {
    pub fn content_type(&self) -> &'static str {
        match self {
            Codec::Json => JSON_MEDIA_TYPE,
            Codec::Protobuf => PROTOBUF_MEDIA_TYPE,
        }
    }

    /// `Accept` and `Content-Type` header pairs for a request body in this codec.
    pub fn headers(&self) -> [(&'static str, &'static str); 2] {
        [
            ("Accept", self.content_type()),
            ("Content-Type", self.content_type()),
        ]
    }

    /// Parse a response `Content-Type`, ignoring parameters such as `charset`.
    pub fn from_media_type(value: &str) -> Option<Self> {
        let essence = value.split(';').next().unwrap_or_default().trim();
        if essence.eq_ignore_ascii_case(JSON_MEDIA_TYPE) {
            Some(Codec::Json)
        } else if essence.eq_ignore_ascii_case(PROTOBUF_MEDIA_TYPE) {
            Some(Codec::Protobuf)
        } else {
            None
        }
    }

    pub fn encode<T: WireMessage>(&self, msg: &T) -> Result<Bytes, EncodeError> {
        match self {
            Codec::Json => Ok(Bytes::from(serde_json::to_vec(msg)?)),
            Codec::Protobuf => wrap_envelope(&msg.encode_to_vec()),
        }
    }

    pub fn decode<T: WireMessage>(&self, bytes: &[u8]) -> Result<T, DecodeError> {
        match self {
            Codec::Json => Ok(serde_json::from_slice(bytes)?),
            Codec::Protobuf => {
                let inner = unwrap_envelope(bytes)?;
                T::decode(inner).map_err(DecodeError::protobuf(DecodeStage::Payload))
            }
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.content_type())
    }
}

impl FromStr for Codec {
    type Err = UnsupportedContentType;

    /// Accepts a full media type or the short names `json` and `protobuf`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Codec::Json),
            "protobuf" | "proto" => Ok(Codec::Protobuf),
            other => Codec::from_media_type(other).ok_or_else(|| UnsupportedContentType(s.to_string())),
        }
    }
}

/// Prefix `inner` with the magic and wrap it in a container message.
pub fn wrap_envelope(inner: &[u8]) -> Result<Bytes, EncodeError> {
    let container = Container {
        raw: Bytes::copy_from_slice(inner),
    };
    let mut buf = BytesMut::with_capacity(MAGIC.len() + container.encoded_len());
    buf.put_slice(&MAGIC);
    container.encode(&mut buf)?;
    Ok(buf.freeze())
}

/// Check the magic and return the bytes held by the container.
pub fn unwrap_envelope(bytes: &[u8]) -> Result<Bytes, DecodeError> {
    let Some((prefix, rest)) = bytes.split_first_chunk::<4>() else {
        return Err(DecodeError::TooShort(bytes.len()));
    };
    if *prefix != MAGIC {
        return Err(DecodeError::BadMagic(*prefix));
    }
    let container = Container::decode(rest).map_err(DecodeError::protobuf(DecodeStage::Container))?;
    Ok(container.raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{ObjectMeta, Status};

    #[test]
    fn test_media_type_parsing() {
        assert_eq!(
            Codec::from_media_type("application/json; charset=utf-8"),
            Some(Codec::Json)
        );
        assert_eq!(
            Codec::from_media_type("application/vnd.kubernetes.protobuf"),
            Some(Codec::Protobuf)
        );
        assert_eq!(Codec::from_media_type("text/plain"), None);
        assert_eq!(Codec::from_media_type(""), None);
    }

    #[test]
    fn test_codec_from_str() {
        assert_eq!("json".parse::<Codec>().unwrap(), Codec::Json);
        assert_eq!("Protobuf".parse::<Codec>().unwrap(), Codec::Protobuf);
        assert_eq!(
            "application/vnd.kubernetes.protobuf".parse::<Codec>().unwrap(),
            Codec::Protobuf
        );
        assert!("yaml".parse::<Codec>().is_err());
    }

    #[test]
    fn test_headers_match_content_type() {
        let headers = Codec::Protobuf.headers();
        assert_eq!(headers[0], ("Accept", PROTOBUF_MEDIA_TYPE));
        assert_eq!(headers[1], ("Content-Type", PROTOBUF_MEDIA_TYPE));
    }

    #[test]
    fn test_envelope_layout() {
        let meta = ObjectMeta::named("default", "cm1");
        let bytes = Codec::Protobuf.encode(&meta).unwrap();

        assert_eq!(&bytes[..4], b"k8s\0");
        let container = Container::decode(&bytes[4..]).unwrap();
        assert_eq!(container.raw.as_ref(), meta.encode_to_vec().as_slice());
    }

    #[test]
    fn test_decode_stage_reporting() {
        let err = Codec::Protobuf.decode::<Status>(b"k8s").unwrap_err();
        assert!(matches!(err, DecodeError::TooShort(3)));
        assert_eq!(err.stage(), DecodeStage::Magic);

        let err = Codec::Protobuf.decode::<Status>(b"k9s\0\x0a\x00").unwrap_err();
        assert!(matches!(err, DecodeError::BadMagic(_)));
        assert_eq!(err.stage(), DecodeStage::Magic);

        // Length prefix claims 16 bytes but none follow.
        let err = Codec::Protobuf.decode::<Status>(b"k8s\0\x0a\x10").unwrap_err();
        assert_eq!(err.stage(), DecodeStage::Container);

        let err = Codec::Json.decode::<Status>(b"{not json").unwrap_err();
        assert_eq!(err.stage(), DecodeStage::Json);
    }

    #[test]
    fn test_decode_error_display() {
        assert_eq!(
            DecodeError::TooShort(3).to_string(),
            "envelope too short: 3 bytes (need at least 4)"
        );
        let json = serde_json::from_slice::<Status>(b"[").unwrap_err();
        assert!(DecodeError::from(json).to_string().starts_with("JSON decode error"));
    }

    #[test]
    fn test_payload_stage_error() {
        // Container holds a truncated inner message.
        let bytes = wrap_envelope(&[0x0a, 0x05, b'a']).unwrap();
        let err = Codec::Protobuf.decode::<ObjectMeta>(&bytes).unwrap_err();
        assert_eq!(err.stage(), DecodeStage::Payload);
    }
}
