//! Piece index: who holds which piece, and which pieces a peer holds.
//!
//! The relation is a many-to-many graph kept as two sharded adjacency maps
//! that must stay mirror images of each other. Every mutation funnels
//! through [`PieceIndex::add`], [`PieceIndex::remove`] or
//! [`PieceIndex::drop_peer`]; lock order is holdings-then-holders
//! everywhere, and no path holds guards on both maps at once.
//!
//! [`PieceCatalog`] is the separate, append-only record behind `info`:
//! every piece ever advertised for a file name, regardless of whether
//! anyone still holds it.

use std::collections::HashSet;

use dashmap::DashMap;

use crate::error::SignalError;

#[derive(Default)]
pub struct PieceIndex {
    /// piece ID → peers currently holding it
    holders: DashMap<String, HashSet<String>>,
    /// peer ID → pieces it currently holds
    holdings: DashMap<String, HashSet<String>>,
}

impl PieceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a peer holds a piece. Idempotent.
    pub fn add(&self, peer_id: &str, piece_id: &str) {
        self.holdings
            .entry(peer_id.to_string())
            .or_default()
            .insert(piece_id.to_string());
        self.holders
            .entry(piece_id.to_string())
            .or_default()
            .insert(peer_id.to_string());
    }

    /// Record that a peer no longer holds a piece.
    ///
    /// Unlike [`add`](Self::add), this is strict: retracting on behalf of a
    /// peer that never advertised anything, or a piece nobody ever held, is
    /// an error rather than a silent no-op.
    pub fn remove(&self, peer_id: &str, piece_id: &str) -> Result<(), SignalError> {
        {
            let mut pieces = self
                .holdings
                .get_mut(peer_id)
                .ok_or_else(|| SignalError::UnknownPeer(peer_id.to_string()))?;
            pieces.remove(piece_id);
        }
        {
            let mut peers = self
                .holders
                .get_mut(piece_id)
                .ok_or_else(|| SignalError::UnknownPiece(piece_id.to_string()))?;
            peers.remove(peer_id);
        }
        Ok(())
    }

    /// Scrub a disconnected peer out of both halves of the index.
    ///
    /// The peer's holdings entry is taken out whole, then each affected
    /// holders set is visited one guard at a time.
    pub fn drop_peer(&self, peer_id: &str) -> Result<(), SignalError> {
        let (_, pieces) = self
            .holdings
            .remove(peer_id)
            .ok_or_else(|| SignalError::UnknownPeer(peer_id.to_string()))?;
        for piece_id in pieces {
            if let Some(mut peers) = self.holders.get_mut(&piece_id) {
                peers.remove(peer_id);
            }
        }
        Ok(())
    }

    /// Peers currently holding a piece, excluding the asking peer.
    ///
    /// An unseen piece yields an empty list, not an error — asking about a
    /// piece implies it exists, so this path materializes an empty holders
    /// set on the way through.
    pub fn holders_of(&self, piece_id: &str, excluding: &str) -> Vec<String> {
        let peers = self.holders.entry(piece_id.to_string()).or_default();
        peers.iter().filter(|p| *p != excluding).cloned().collect()
    }

    /// Pieces a peer currently holds. Empty for an unknown peer.
    pub fn peer_holdings(&self, peer_id: &str) -> Vec<String> {
        self.holdings
            .get(peer_id)
            .map(|pieces| pieces.iter().cloned().collect())
            .unwrap_or_default()
    }
}

/// File name → every piece ID ever advertised for it.
///
/// Entries only accumulate; retractions and disconnects do not unrecord a
/// piece. Reads are pure — looking up an unseen name creates nothing.
#[derive(Default)]
pub struct PieceCatalog {
    files: DashMap<String, HashSet<String>>,
}

impl PieceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, name: &str, piece_id: &str) {
        self.files
            .entry(name.to_string())
            .or_default()
            .insert(piece_id.to_string());
    }

    pub fn pieces_of(&self, name: &str) -> Vec<String> {
        self.files
            .get(name)
            .map(|pieces| pieces.iter().cloned().collect())
            .unwrap_or_default()
    }
}
