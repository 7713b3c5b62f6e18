//! In-memory channel registry: session id -> set of open output streams.
//!
//! A session key is present only while it has at least one stream. The
//! registry holds the sending half of each stream's queue, never the client
//! connection itself, so a stream lives exactly as long as its HTTP response.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use crate::types::{new_id, SessionId, StreamId};

/// A serialized event, shared between every stream it is written to
pub type Frame = Arc<str>;

/// Registry-side handle to one output stream
#[derive(Debug, Clone)]
pub struct StreamHandle {
    pub id: StreamId,
    tx: mpsc::UnboundedSender<Frame>,
}

impl StreamHandle {
    /// Create a handle and the receiving end the HTTP layer reads from
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Frame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { id: new_id(), tx }, rx)
    }
}

type Channels = HashMap<SessionId, HashMap<StreamId, StreamHandle>>;

#[derive(Debug, Default)]
pub struct ChannelRegistry {
    channels: Mutex<Channels>,
    /// Set by `close_all`; read and written only while `channels` is locked
    closed: AtomicBool,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // Every critical section is a plain map operation, so a poisoned lock
    // still guards a consistent map.
    fn lock(&self) -> MutexGuard<'_, Channels> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a stream to a session's channel, creating the channel if needed.
    /// After `close_all` the handle is dropped instead, ending its stream.
    pub fn subscribe(&self, session_id: &str, handle: StreamHandle) {
        let mut channels = self.lock();
        if self.closed.load(Ordering::SeqCst) {
            tracing::debug!(session_id, "Registry closed, refusing stream");
            return;
        }
        let streams = channels.entry(session_id.to_string()).or_default();
        streams.insert(handle.id.clone(), handle);
        tracing::debug!(
            session_id,
            streams = streams.len(),
            "Stream subscribed"
        );
    }

    /// Remove a stream; drops the channel once it is empty.
    /// Absent sessions or streams are ignored.
    pub fn unsubscribe(&self, session_id: &str, stream_id: &str) {
        let mut channels = self.lock();
        let Some(streams) = channels.get_mut(session_id) else {
            return;
        };
        if streams.remove(stream_id).is_some() {
            tracing::debug!(session_id, stream_id, "Stream unsubscribed");
        }
        if streams.is_empty() {
            channels.remove(session_id);
            tracing::debug!(session_id, "Channel removed");
        }
    }

    /// Write a frame to every open stream of a session.
    ///
    /// Streams whose receiver has gone away are skipped and pruned. Returns
    /// the number of streams that accepted the frame.
    pub fn deliver(&self, session_id: &str, frame: &Frame) -> usize {
        let mut channels = self.lock();
        let Some(streams) = channels.get_mut(session_id) else {
            return 0;
        };

        let mut delivered = 0;
        streams.retain(|stream_id, handle| match handle.tx.send(frame.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(_) => {
                tracing::debug!(session_id, stream_id, "Pruning closed stream");
                false
            }
        });

        if streams.is_empty() {
            channels.remove(session_id);
        }
        delivered
    }

    /// Create a stream for a session and register it. Dropping the returned
    /// subscription unregisters it.
    pub fn open(self: &Arc<Self>, session_id: &str) -> Subscription {
        let (handle, rx) = StreamHandle::new();
        let stream_id = handle.id.clone();
        self.subscribe(session_id, handle);
        Subscription {
            registry: Arc::clone(self),
            session_id: session_id.to_string(),
            stream_id,
            rx,
        }
    }

    /// Drop every stream so their receivers observe end-of-stream. Streams
    /// opened afterwards end immediately.
    pub fn close_all(&self) {
        let mut channels = self.lock();
        self.closed.store(true, Ordering::SeqCst);
        let streams: usize = channels.values().map(HashMap::len).sum();
        channels.clear();
        tracing::info!(streams, "Closed all streams");
    }

    pub fn session_count(&self) -> usize {
        self.lock().len()
    }

    pub fn stream_count(&self, session_id: &str) -> usize {
        self.lock().get(session_id).map_or(0, HashMap::len)
    }

    pub fn total_streams(&self) -> usize {
        self.lock().values().map(HashMap::len).sum()
    }

    pub fn contains_session(&self, session_id: &str) -> bool {
        self.lock().contains_key(session_id)
    }
}

/// A registered stream owned by the HTTP layer.
///
/// Unsubscribes from the registry when dropped, whatever the reason.
#[derive(Debug)]
pub struct Subscription {
    registry: Arc<ChannelRegistry>,
    session_id: SessionId,
    stream_id: StreamId,
    rx: mpsc::UnboundedReceiver<Frame>,
}

impl Subscription {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Next frame, or `None` once the registry has dropped this stream
    pub async fn recv(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.unsubscribe(&self.session_id, &self.stream_id);
    }
}
