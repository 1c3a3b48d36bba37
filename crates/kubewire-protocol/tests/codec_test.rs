// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Envelope codec tests for kubewire-protocol.

mod common;

use common::Widget;
use kubewire_protocol::codec::{Container, unwrap_envelope, wrap_envelope};
use kubewire_protocol::meta::{ObjectMeta, Status, Time};
use kubewire_protocol::{Codec, DecodeError, DecodeStage, MAGIC};
use prost::Message;

#[test]
fn test_protobuf_round_trip() {
    let mut widget = Widget::new("default", "w1", 3);
    widget.metadata.labels.insert("tier".into(), "gold".into());
    widget.metadata.creation_timestamp = Some(Time {
        seconds: 1_700_000_000,
        nanos: 0,
    });

    let bytes = Codec::Protobuf.encode(&widget).unwrap();
    let decoded: Widget = Codec::Protobuf.decode(&bytes).unwrap();

    assert_eq!(decoded, widget);
}

#[test]
fn test_json_round_trip() {
    let widget = Widget::new("prod", "w2", 9);

    let bytes = Codec::Json.encode(&widget).unwrap();
    let text = std::str::from_utf8(&bytes).unwrap();
    assert!(text.contains(r#""namespace":"prod""#));

    let decoded: Widget = Codec::Json.decode(&bytes).unwrap();
    assert_eq!(decoded, widget);
}

#[test]
fn test_json_round_trip_keeps_subsecond_timestamps() {
    let mut widget = Widget::new("prod", "w3", 1);
    widget.metadata.creation_timestamp = Some(Time {
        seconds: 1_700_000_000,
        nanos: 123_456_789,
    });
    widget.metadata.deletion_timestamp = Some(Time::now());

    let bytes = Codec::Json.encode(&widget).unwrap();
    let text = std::str::from_utf8(&bytes).unwrap();
    assert!(text.contains(r#""creationTimestamp":"2023-11-14T22:13:20.123456789Z""#));

    let decoded: Widget = Codec::Json.decode(&bytes).unwrap();
    assert_eq!(decoded, widget);
}

#[test]
fn test_envelope_starts_with_magic() {
    let bytes = Codec::Protobuf.encode(&Widget::new("a", "b", 1)).unwrap();
    assert_eq!(bytes[..4], MAGIC);
}

#[test]
fn test_empty_message_round_trip() {
    // An all-default message encodes to an empty inner payload.
    let bytes = Codec::Protobuf.encode(&Status::default()).unwrap();
    assert_eq!(bytes.len(), 4);

    let decoded: Status = Codec::Protobuf.decode(&bytes).unwrap();
    assert_eq!(decoded, Status::default());
}

#[test]
fn test_decode_rejects_short_input() {
    for len in 0..4 {
        let err = Codec::Protobuf.decode::<Widget>(&MAGIC[..len]).unwrap_err();
        assert!(matches!(err, DecodeError::TooShort(n) if n == len));
    }
}

#[test]
fn test_decode_rejects_wrong_magic() {
    let mut bytes = Codec::Protobuf
        .encode(&Widget::new("a", "b", 1))
        .unwrap()
        .to_vec();
    bytes[3] = b'!';

    let err = Codec::Protobuf.decode::<Widget>(&bytes).unwrap_err();
    assert_eq!(err.stage(), DecodeStage::Magic);
    assert!(err.to_string().contains("magic"));
}

#[test]
fn test_decode_json_with_protobuf_codec_fails_at_magic() {
    let bytes = Codec::Json.encode(&Widget::new("a", "b", 1)).unwrap();
    let err = Codec::Protobuf.decode::<Widget>(&bytes).unwrap_err();
    assert_eq!(err.stage(), DecodeStage::Magic);
}

#[test]
fn test_unwrap_envelope_returns_inner_bytes() {
    let meta = ObjectMeta::named("ns", "x");
    let inner = meta.encode_to_vec();
    let wrapped = wrap_envelope(&inner).unwrap();

    assert_eq!(unwrap_envelope(&wrapped).unwrap().as_ref(), inner.as_slice());

    let container = Container::decode(&wrapped[4..]).unwrap();
    assert_eq!(container.raw.as_ref(), inner.as_slice());
}

#[test]
fn test_status_json_from_server() {
    let body = br#"{
        "kind": "Status",
        "apiVersion": "v1",
        "metadata": {},
        "status": "Failure",
        "message": "configmaps \"missing\" not found",
        "reason": "NotFound",
        "details": {"name": "missing", "kind": "configmaps"},
        "code": 404
    }"#;

    let status: Status = Codec::Json.decode(body).unwrap();
    assert_eq!(status.code, 404);
    assert_eq!(status.reason, "NotFound");
    assert_eq!(status.details.unwrap().name, "missing");
}
