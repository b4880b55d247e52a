//! Connection registry: peer ID → live socket write half.
//!
//! The registry is the sole authority on peer liveness. The indexes hold
//! peer IDs as plain values and come back here whenever they need to write
//! to, or check on, an actual connection.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::SinkExt;
use futures::stream::SplitSink;
use parking_lot::Mutex;

use crate::error::SignalError;

type WsSink = SplitSink<WebSocket, Message>;

/// One registered connection: the socket's write half behind a lock that
/// serializes whole-message writes. The lock is held for the duration of a
/// single `send` and nothing else.
struct PeerHandle {
    sink: tokio::sync::Mutex<WsSink>,
}

#[derive(Default)]
pub struct PeerRegistry {
    peers: Mutex<HashMap<String, Arc<PeerHandle>>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a fresh peer ID to a connection's write half and record it.
    ///
    /// IDs are time-ordered UUIDv7s, so later connections sort after
    /// earlier ones. They are never reused within a process; a generator
    /// collision must not overwrite a live entry, so insertion retries
    /// until vacant.
    pub fn register(&self, sink: WsSink) -> String {
        let handle = Arc::new(PeerHandle {
            sink: tokio::sync::Mutex::new(sink),
        });
        let mut peers = self.peers.lock();
        loop {
            let id = uuid::Uuid::now_v7().to_string();
            if let std::collections::hash_map::Entry::Vacant(slot) = peers.entry(id.clone()) {
                slot.insert(handle);
                return id;
            }
        }
    }

    /// Drop a peer's entry. Idempotent — unregistering an unknown or
    /// already-removed peer does nothing.
    pub fn unregister(&self, peer_id: &str) {
        self.peers.lock().remove(peer_id);
    }

    pub fn is_live(&self, peer_id: &str) -> bool {
        self.peers.lock().contains_key(peer_id)
    }

    pub fn len(&self) -> usize {
        self.peers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.lock().is_empty()
    }

    /// Write one framed text message to a peer.
    ///
    /// The registry map guard is released before any await; only the
    /// per-peer sink lock is held across the write, so concurrent senders
    /// to the same peer produce whole, non-interleaved frames and writes
    /// to unrelated peers never contend.
    pub async fn write_to(&self, peer_id: &str, payload: String) -> Result<(), SignalError> {
        let handle = {
            let peers = self.peers.lock();
            peers
                .get(peer_id)
                .cloned()
                .ok_or_else(|| SignalError::UnknownPeer(peer_id.to_string()))?
        };
        let mut sink = handle.sink.lock().await;
        sink.send(Message::Text(payload.into()))
            .await
            .map_err(|source| SignalError::Transport {
                peer: peer_id.to_string(),
                source,
            })
    }
}
