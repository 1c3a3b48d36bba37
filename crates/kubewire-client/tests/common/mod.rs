// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for kubewire-client tests.
//!
//! Provides an in-memory API server that stores config maps and streams
//! watch events over `tokio::io::duplex` pipes.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use kubewire_client::{
    Client, ClientConfig, Codec, ConfigMap, ConfigMapList, EventType, HttpRequest, HttpResponse,
    ListMeta, Method, ResourceRegistry, Status, Time, Transport, TransportError,
};
use kubewire_protocol::WireMessage;
use kubewire_protocol::frame::encode_event;
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::sync::Mutex;

pub const ENDPOINT: &str = "http://fake.local";

const WATCH_BUFFER: usize = 64 * 1024;

struct OpenWatch {
    namespace: String,
    codec: Codec,
    stream: DuplexStream,
}

#[derive(Default)]
struct State {
    objects: BTreeMap<(String, String), ConfigMap>,
    last_version: u64,
    watches: Vec<OpenWatch>,
    requests: Vec<(Method, String)>,
}

impl State {
    fn next_version(&mut self) -> String {
        self.last_version += 1;
        self.last_version.to_string()
    }

    async fn broadcast(&mut self, event_type: EventType, cm: &ConfigMap) {
        let mut alive = Vec::new();
        for mut watch in self.watches.drain(..) {
            if watch.namespace != cm.metadata.namespace {
                alive.push(watch);
                continue;
            }
            let frame = encode_event(watch.codec, event_type, cm).unwrap();
            // A closed watcher drops its end of the pipe.
            if watch.stream.write_all(&frame).await.is_ok() {
                alive.push(watch);
            }
        }
        self.watches = alive;
    }
}

/// In-memory API server serving `/api/v1/namespaces/{ns}/configmaps`.
#[derive(Default)]
pub struct FakeApiServer {
    state: Mutex<State>,
}

impl FakeApiServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn client(self: &Arc<Self>, codec: Codec) -> Client {
        let config = ClientConfig::new()
            .with_endpoint(ENDPOINT)
            .with_content_type(codec);
        Client::with_transport(
            config,
            self.clone(),
            Arc::new(ResourceRegistry::with_builtins()),
        )
    }

    pub async fn requests(&self) -> Vec<(Method, String)> {
        self.state.lock().await.requests.clone()
    }

    pub async fn open_watches(&self) -> usize {
        self.state.lock().await.watches.len()
    }

    /// Send an `ERROR` event to every open watch.
    pub async fn send_error_event(&self, status: &Status) {
        let mut state = self.state.lock().await;
        for watch in &mut state.watches {
            let frame = encode_event(watch.codec, EventType::Error, status).unwrap();
            let _ = watch.stream.write_all(&frame).await;
        }
    }

    /// Close every watch connection from the server side.
    pub async fn drop_watches(&self) {
        self.state.lock().await.watches.clear();
    }
}

fn respond<T: WireMessage>(status: u16, codec: Codec, body: &T) -> HttpResponse {
    let bytes = codec.encode(body).unwrap();
    HttpResponse::new(
        status,
        Some(codec.content_type().to_string()),
        Box::pin(Cursor::new(bytes.to_vec())),
    )
}

fn failure(code: u16, reason: &str, message: String, codec: Codec) -> HttpResponse {
    respond(code, codec, &Status::failure(code as i32, reason, message))
}

#[async_trait]
impl Transport for FakeApiServer {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let codec = request
            .header("Content-Type")
            .and_then(Codec::from_media_type)
            .unwrap_or(Codec::Json);
        let Some(rest) = request.url.strip_prefix(ENDPOINT) else {
            return Err(TransportError::Other(format!("unknown host in {}", request.url)));
        };
        let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
        let params: Vec<(&str, &str)> = query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .collect();
        let watch = params.contains(&("watch", "true"));
        let since_version = params.iter().any(|(key, _)| *key == "resourceVersion");

        let mut state = self.state.lock().await;
        state.requests.push((request.method, request.url.clone()));

        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        let (namespace, name) = match segments.as_slice() {
            ["api", "v1", "namespaces", ns, "configmaps"] => (ns.to_string(), None),
            ["api", "v1", "namespaces", ns, "configmaps", name] => {
                (ns.to_string(), Some(name.to_string()))
            }
            _ => {
                return Ok(failure(
                    404,
                    "NotFound",
                    "the server could not find the requested resource".to_string(),
                    codec,
                ));
            }
        };

        let body = request.body.as_deref().unwrap_or_default();

        match (request.method, name) {
            (Method::Post, None) => {
                let Ok(mut cm) = codec.decode::<ConfigMap>(body) else {
                    return Ok(failure(400, "BadRequest", "undecodable body".into(), codec));
                };
                cm.metadata.namespace = namespace.clone();
                let key = (namespace, cm.metadata.name.clone());
                if state.objects.contains_key(&key) {
                    let message = format!("configmaps {:?} already exists", key.1);
                    return Ok(failure(409, "AlreadyExists", message, codec));
                }
                let version = state.next_version();
                cm.metadata.resource_version = version.clone();
                cm.metadata.uid = format!("uid-{version}");
                cm.metadata.creation_timestamp = Some(Time::now());
                state.objects.insert(key, cm.clone());
                state.broadcast(EventType::Added, &cm).await;
                Ok(respond(201, codec, &cm))
            }
            (Method::Put, Some(name)) => {
                let Ok(mut cm) = codec.decode::<ConfigMap>(body) else {
                    return Ok(failure(400, "BadRequest", "undecodable body".into(), codec));
                };
                let key = (namespace.clone(), name.clone());
                let Some(stored) = state.objects.get(&key).cloned() else {
                    return Ok(failure(404, "NotFound", format!("configmaps {name:?} not found"), codec));
                };
                if cm.metadata.resource_version != stored.metadata.resource_version {
                    let message = format!("the object {name:?} has been modified");
                    return Ok(failure(409, "Conflict", message, codec));
                }
                cm.metadata.namespace = namespace;
                cm.metadata.uid = stored.metadata.uid;
                cm.metadata.creation_timestamp = stored.metadata.creation_timestamp;
                cm.metadata.resource_version = state.next_version();
                state.objects.insert(key, cm.clone());
                state.broadcast(EventType::Modified, &cm).await;
                Ok(respond(200, codec, &cm))
            }
            (Method::Delete, Some(name)) => {
                let Some(mut cm) = state.objects.remove(&(namespace, name.clone())) else {
                    return Ok(failure(404, "NotFound", format!("configmaps {name:?} not found"), codec));
                };
                cm.metadata.resource_version = state.next_version();
                state.broadcast(EventType::Deleted, &cm).await;
                let status = Status {
                    status: "Success".to_string(),
                    ..Default::default()
                };
                Ok(respond(200, codec, &status))
            }
            (Method::Get, Some(name)) => match state.objects.get(&(namespace, name.clone())) {
                Some(cm) => Ok(respond(200, codec, cm)),
                None => Ok(failure(404, "NotFound", format!("configmaps {name:?} not found"), codec)),
            },
            (Method::Get, None) if watch => {
                let (client_end, mut server_end) = tokio::io::duplex(WATCH_BUFFER);
                if !since_version {
                    // Without a starting version the current state is replayed first.
                    let existing: Vec<ConfigMap> = state
                        .objects
                        .values()
                        .filter(|cm| cm.metadata.namespace == namespace)
                        .cloned()
                        .collect();
                    for cm in &existing {
                        let frame = encode_event(codec, EventType::Added, cm).unwrap();
                        server_end.write_all(&frame).await?;
                    }
                }
                state.watches.push(OpenWatch {
                    namespace,
                    codec,
                    stream: server_end,
                });
                Ok(HttpResponse::new(
                    200,
                    Some(codec.content_type().to_string()),
                    Box::pin(client_end),
                ))
            }
            (Method::Get, None) => {
                let items: Vec<ConfigMap> = state
                    .objects
                    .values()
                    .filter(|cm| cm.metadata.namespace == namespace)
                    .cloned()
                    .collect();
                let list = ConfigMapList {
                    metadata: ListMeta {
                        resource_version: state.last_version.to_string(),
                        ..Default::default()
                    },
                    items,
                };
                Ok(respond(200, codec, &list))
            }
            (method, _) => Ok(failure(
                405,
                "MethodNotAllowed",
                format!("{method} is not supported here"),
                codec,
            )),
        }
    }
}
