//! Swarm index: file ID → the set of peers in that file's swarm.
//!
//! Membership is many-to-many, but there is deliberately no reverse
//! peer → swarms index: instead of chasing down every swarm a peer belonged
//! to when it disconnects, stale members are reaped the next time a swarm
//! is read. A snapshot therefore never returns a peer the registry no
//! longer knows.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::SignalError;

#[derive(Default)]
struct Swarm {
    peers: Mutex<HashSet<String>>,
}

/// The outer map guard is only held long enough to find or create a swarm;
/// all membership work happens under the per-swarm lock, so distinct files
/// never contend.
#[derive(Default)]
pub struct SwarmIndex {
    swarms: Mutex<HashMap<String, Arc<Swarm>>>,
}

impl SwarmIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a peer to a file's swarm, creating the swarm on first join.
    /// Idempotent.
    pub fn join(&self, peer_id: &str, file_id: &str) {
        let swarm = {
            let mut swarms = self.swarms.lock();
            Arc::clone(swarms.entry(file_id.to_string()).or_default())
        };
        swarm.peers.lock().insert(peer_id.to_string());
    }

    /// Remove a peer from a file's swarm.
    ///
    /// Leaving a swarm that was never created is an error; leaving one the
    /// peer is not a member of is silently idempotent.
    pub fn leave(&self, peer_id: &str, file_id: &str) -> Result<(), SignalError> {
        let swarm = {
            let swarms = self.swarms.lock();
            swarms
                .get(file_id)
                .cloned()
                .ok_or_else(|| SignalError::UnknownSwarm(file_id.to_string()))?
        };
        swarm.peers.lock().remove(peer_id);
        Ok(())
    }

    /// Current membership of a file's swarm, reaping members the oracle no
    /// longer considers live. The reap is the only cleanup swarms ever get.
    pub fn snapshot(
        &self,
        file_id: &str,
        is_live: impl Fn(&str) -> bool,
    ) -> Result<Vec<String>, SignalError> {
        let swarm = {
            let swarms = self.swarms.lock();
            swarms
                .get(file_id)
                .cloned()
                .ok_or_else(|| SignalError::UnknownSwarm(file_id.to_string()))?
        };
        let mut peers = swarm.peers.lock();
        peers.retain(|p| is_live(p));
        Ok(peers.iter().cloned().collect())
    }

    /// Number of swarms ever created (stale members included until reaped).
    pub fn len(&self) -> usize {
        self.swarms.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.swarms.lock().is_empty()
    }
}
