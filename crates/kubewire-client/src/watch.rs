// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Watch streams.
//!
//! A [`Watcher`] owns the streaming response body of a `watch=true` request
//! and yields one decoded event per call to [`Watcher::next`]. It moves from
//! open to closed exactly once: on [`Watcher::close`], on an `ERROR` event, or
//! on any read or decode failure. There is no reconnect; callers resume by
//! opening a new watch from the last observed `resourceVersion`.

use std::marker::PhantomData;

use futures::Stream;
use kubewire_protocol::meta::Status;
use kubewire_protocol::{Codec, EventReader, EventType, RawEvent};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ApiError, ClientError, Result};
use crate::registry::Resource;
use crate::transport::BodyReader;

/// One change observed on a watched collection.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchEvent<T> {
    pub event_type: EventType,
    pub object: T,
}

/// Pull-based stream of [`WatchEvent`]s.
///
/// Intended for one reader at a time. [`close`](Watcher::close) may be called
/// from any task and interrupts a pending [`next`](Watcher::next).
pub struct Watcher<T> {
    reader: Mutex<Option<EventReader<BodyReader>>>,
    closed: CancellationToken,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Resource> Watcher<T> {
    pub(crate) fn new(body: BodyReader, codec: Codec, closed: CancellationToken) -> Self {
        Self {
            reader: Mutex::new(Some(EventReader::new(body, codec))),
            closed,
            _marker: PhantomData,
        }
    }

    /// Wait for the next event.
    ///
    /// Returns [`ClientError::StreamClosed`] once the watcher is closed, and
    /// [`ClientError::Api`] for a server-sent `ERROR` event.
    pub async fn next(&self) -> Result<WatchEvent<T>> {
        let mut guard = tokio::select! {
            biased;
            _ = self.closed.cancelled() => return Err(ClientError::StreamClosed),
            guard = self.reader.lock() => guard,
        };
        let Some(reader) = guard.as_mut() else {
            return Err(ClientError::StreamClosed);
        };

        let read = tokio::select! {
            biased;
            _ = self.closed.cancelled() => None,
            event = reader.read_event() => Some(event),
        };

        let outcome = match read {
            None => Err(ClientError::StreamClosed),
            Some(Ok(raw)) => decode_event(raw),
            Some(Err(err)) => Err(err.into()),
        };

        if outcome.is_err() {
            // Dropping the reader releases the connection.
            *guard = None;
            self.closed.cancel();
        }
        outcome
    }

    /// Close the stream and release the connection.
    ///
    /// A concurrent [`next`](Watcher::next) returns
    /// [`ClientError::StreamClosed`] promptly; later calls fail the same way.
    pub fn close(&self) {
        if self.closed.is_cancelled() {
            return;
        }
        info!("Closing watch");
        self.closed.cancel();
        // A pending `next` holds the lock and drops the reader itself.
        if let Ok(mut guard) = self.reader.try_lock() {
            *guard = None;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Adapt into a `Stream` that ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<WatchEvent<T>>> {
        futures::stream::unfold(Some(self), |watcher| async move {
            let watcher = watcher?;
            match watcher.next().await {
                Ok(event) => Some((Ok(event), Some(watcher))),
                Err(ClientError::StreamClosed) => None,
                Err(err) => Some((Err(err), None)),
            }
        })
    }
}

impl<T> Drop for Watcher<T> {
    fn drop(&mut self) {
        self.closed.cancel();
    }
}

fn decode_event<T: Resource>(raw: RawEvent) -> Result<WatchEvent<T>> {
    if raw.event_type == EventType::Error {
        let status: Status = raw.decode()?;
        warn!(code = status.code, reason = %status.reason, "Watch returned error event");
        let http_status = u16::try_from(status.code).unwrap_or(500);
        return Err(ApiError::new(http_status, status).into());
    }

    let object: T = raw.decode()?;
    debug!(
        event_type = %raw.event_type,
        name = %object.metadata().name,
        resource_version = %object.metadata().resource_version,
        "Watch event"
    );
    Ok(WatchEvent {
        event_type: raw.event_type,
        object,
    })
}
