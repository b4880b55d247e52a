use thiserror::Error;

/// Everything that can go wrong while servicing one inbound message.
///
/// None of these terminate the originating connection — the router logs
/// them and keeps reading. The protocol has no error-reply message, so the
/// sending peer is never notified.
#[derive(Debug, Error)]
pub enum SignalError {
    #[error(transparent)]
    Protocol(#[from] swarmlink_proto::ProtocolError),

    /// Write or forward target is not registered.
    #[error("unknown peer `{0}`")]
    UnknownPeer(String),

    /// Swarm was never created for this file.
    #[error("unknown swarm `{0}`")]
    UnknownSwarm(String),

    /// Piece was never advertised.
    #[error("unknown piece `{0}`")]
    UnknownPiece(String),

    /// A forward whose source and destination are the same peer.
    #[error("peer `{0}` attempted to forward a message to itself")]
    SelfAddressed(String),

    /// The socket write failed; the peer is on its way out.
    #[error("transport write to `{peer}` failed: {source}")]
    Transport { peer: String, source: axum::Error },

    #[error("response encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}
