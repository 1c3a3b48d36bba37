// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for kubewire-client.

use kubewire_protocol::meta::Status;
use kubewire_protocol::{DecodeError, EncodeError, FrameError};
use thiserror::Error;

use crate::registry::ResourceId;
use crate::transport::TransportError;

/// Result type using ClientError.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when using the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Server returned a non-success status with a body that is not a `Status`.
    #[error("decode error status {http_status}: {source}")]
    ErrorBody {
        http_status: u16,
        #[source]
        source: DecodeError,
    },

    /// Request rejected before it was sent.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Server returned a decoded `Status` failure.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Type has no registered coordinates.
    #[error("resource type not registered: {0}")]
    NotRegistered(ResourceId),

    /// Request body could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// Transport failed to deliver the request or read the response.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Watch stream framing failed.
    #[error("watch stream error: {0}")]
    Frame(#[from] FrameError),

    /// Caller cancelled the request.
    #[error("request cancelled")]
    Cancelled,

    /// Watch stream was closed.
    #[error("watch stream closed")]
    StreamClosed,

    /// Configuration error (missing or invalid values).
    #[error("configuration error: {0}")]
    Config(String),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Api(api) if api.is_not_found())
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ClientError::Api(api) if api.is_conflict())
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, ClientError::Api(api) if api.is_already_exists())
    }

    /// The decoded server status, if the server sent one.
    pub fn status(&self) -> Option<&Status> {
        match self {
            ClientError::Api(api) => Some(&api.status),
            _ => None,
        }
    }
}

/// A failure reported by the server as a `Status` body.
#[derive(Debug, Clone, Error)]
#[error("api error {http_status} {}: {}", .status.reason, .status.message)]
pub struct ApiError {
    pub http_status: u16,
    pub status: Status,
}

impl ApiError {
    pub fn new(http_status: u16, status: Status) -> Self {
        Self {
            http_status,
            status,
        }
    }

    /// HTTP status code, preferring the code carried in the body.
    pub fn code(&self) -> u16 {
        u16::try_from(self.status.code)
            .ok()
            .filter(|code| *code != 0)
            .unwrap_or(self.http_status)
    }

    pub fn is_not_found(&self) -> bool {
        self.status.reason == "NotFound" || self.code() == 404
    }

    pub fn is_conflict(&self) -> bool {
        self.status.reason == "Conflict" || self.code() == 409
    }

    pub fn is_already_exists(&self) -> bool {
        self.status.reason == "AlreadyExists"
    }
}

/// Duplicate registration of a resource identity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("resource {0} registered twice")]
pub struct RegistrationError(pub ResourceId);
