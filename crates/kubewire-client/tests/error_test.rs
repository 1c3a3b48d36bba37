// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error type tests for kubewire-client.

use kubewire_client::{ApiError, ClientError, RegistrationError, ResourceId, Status};
use kubewire_protocol::{DecodeError, FrameError};

fn api_error(http_status: u16, code: i32, reason: &str) -> ClientError {
    ApiError::new(http_status, Status::failure(code, reason, "something happened")).into()
}

#[test]
fn test_api_error_display() {
    let err = api_error(404, 404, "NotFound");
    let display = err.to_string();
    assert!(display.contains("api error 404"));
    assert!(display.contains("NotFound"));
    assert!(display.contains("something happened"));
}

#[test]
fn test_error_body_display() {
    let err = ClientError::ErrorBody {
        http_status: 502,
        source: DecodeError::TooShort(2),
    };
    let display = err.to_string();
    assert!(display.contains("decode error status 502"));
    assert!(display.contains("too short"));
}

#[test]
fn test_validation_error_display() {
    let err = ClientError::Validation("no resource name provided".to_string());
    assert!(err.to_string().contains("invalid request"));
    assert!(err.to_string().contains("no resource name provided"));
}

#[test]
fn test_not_registered_display() {
    let err = ClientError::NotRegistered(ResourceId::new("apps", "v1", "Deployment"));
    assert!(err.to_string().contains("not registered"));
    assert!(err.to_string().contains("apps/v1, Kind=Deployment"));
}

#[test]
fn test_frame_error_display() {
    let err = ClientError::from(FrameError::ConnectionClosed);
    assert!(err.to_string().contains("watch stream error"));
    assert!(err.to_string().contains("connection closed"));
}

#[test]
fn test_cancelled_and_closed_display() {
    assert_eq!(ClientError::Cancelled.to_string(), "request cancelled");
    assert_eq!(ClientError::StreamClosed.to_string(), "watch stream closed");
}

#[test]
fn test_registration_error_display() {
    let err = RegistrationError(ResourceId::new("", "v1", "ConfigMap"));
    assert_eq!(err.to_string(), "resource v1, Kind=ConfigMap registered twice");
}

#[test]
fn test_not_found_by_reason_or_code() {
    assert!(api_error(404, 404, "NotFound").is_not_found());
    // Reason alone is enough when the body carries no code.
    assert!(api_error(500, 0, "NotFound").is_not_found());
    assert!(api_error(404, 0, "").is_not_found());
    assert!(!api_error(409, 409, "Conflict").is_not_found());
}

#[test]
fn test_conflict_and_already_exists() {
    let conflict = api_error(409, 409, "Conflict");
    assert!(conflict.is_conflict());
    assert!(!conflict.is_already_exists());

    let exists = api_error(409, 409, "AlreadyExists");
    assert!(exists.is_already_exists());
    assert!(exists.is_conflict());
}

#[test]
fn test_status_accessor() {
    let err = api_error(403, 403, "Forbidden");
    let status = err.status().expect("api errors carry a status");
    assert_eq!(status.reason, "Forbidden");
    assert_eq!(status.code, 403);

    assert!(ClientError::Cancelled.status().is_none());
}

#[test]
fn test_api_error_code_prefers_body() {
    let err = ApiError::new(500, Status::failure(422, "Invalid", "bad field"));
    assert_eq!(err.code(), 422);

    let err = ApiError::new(503, Status::failure(0, "", "unavailable"));
    assert_eq!(err.code(), 503);
}
