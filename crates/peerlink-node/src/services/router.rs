// ============================================
// File: crates/peerlink-node/src/services/router.rs
// ============================================
//! # Peer Router
//!
//! ## Creation Reason
//! Maps socket identities to connected peers so messages can be sent by
//! address and the node can enforce its peer cap.
//!
//! ## Main Functionality
//! - `Router`: the peer table capability set used by the node
//! - `PeerTable`: `RwLock<HashMap>` implementation with a hard cap
//!
//! ## Peer Table Structure
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   Peer Table                        │
//! ├─────────────────────┬───────────────────────────────┤
//! │  Socket identity    │  Peer                         │
//! ├─────────────────────┼───────────────────────────────┤
//! │  127.0.0.1:9090     │  Arc<Peer> (dialed)           │
//! │  10.0.0.7:51544     │  Arc<Peer> (accepted)         │
//! └─────────────────────┴───────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The cap is checked under the write lock, together with the insert
//! - Replacing an identity never counts against the cap; the caller
//!   closes the superseded peer
//! - `remove` compares by pointer, so a stale watch loop cannot evict
//!   the peer that replaced it
//!
//! ## Last Modified
//! v0.1.0 - Initial peer router

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use peerlink_common::SocketId;

use crate::error::{NodeError, Result};
use crate::peer::Peer;

// ============================================
// Router Trait
// ============================================

/// Peer table used by the node.
pub trait Router: Send + Sync {
    /// Inserts `peer` under its socket identity.
    ///
    /// Returns the peer it replaced, if any.
    ///
    /// # Errors
    /// `MaxPeersExceeded` when inserting a new identity at capacity.
    fn add(&self, peer: Arc<Peer>) -> Result<Option<Arc<Peer>>>;

    /// Removes `peer` if it is still the entry for its identity.
    fn remove(&self, peer: &Arc<Peer>) -> bool;

    /// Looks up a peer by socket identity.
    fn query(&self, socket: &str) -> Option<Arc<Peer>>;

    /// Number of distinct identities stored.
    fn len(&self) -> usize;

    /// Returns `true` if no peers are stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all peers.
    fn peers(&self) -> Vec<Arc<Peer>>;

    /// Removes and returns every peer.
    fn clear(&self) -> Vec<Arc<Peer>>;
}

// ============================================
// PeerTable
// ============================================

/// Capped peer table.
pub struct PeerTable {
    peers: RwLock<HashMap<SocketId, Arc<Peer>>>,
    max_peers: usize,
}

impl PeerTable {
    /// Creates an empty table holding at most `max_peers` identities.
    #[must_use]
    pub fn new(max_peers: usize) -> Self {
        Self {
            peers: RwLock::new(HashMap::new()),
            max_peers,
        }
    }

    /// Configured cap.
    #[must_use]
    pub const fn max_peers(&self) -> usize {
        self.max_peers
    }

    /// Returns `true` if a new identity would be rejected.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.peers.read().len() >= self.max_peers
    }
}

impl Router for PeerTable {
    fn add(&self, peer: Arc<Peer>) -> Result<Option<Arc<Peer>>> {
        let mut peers = self.peers.write();
        let socket = peer.socket().clone();

        if !peers.contains_key(&socket) && peers.len() >= self.max_peers {
            warn!(peer = %socket, limit = self.max_peers, "Peer rejected: table full");
            return Err(NodeError::MaxPeersExceeded {
                limit: self.max_peers,
            });
        }

        let previous = peers.insert(socket.clone(), peer);
        if previous.is_some() {
            debug!(peer = %socket, "Peer replaced");
        } else {
            debug!(peer = %socket, total = peers.len(), "Peer added");
        }
        Ok(previous)
    }

    fn remove(&self, peer: &Arc<Peer>) -> bool {
        let mut peers = self.peers.write();
        let socket = peer.socket();

        match peers.get(socket) {
            Some(current) if Arc::ptr_eq(current, peer) => {
                peers.remove(socket);
                debug!(peer = %socket, total = peers.len(), "Peer removed");
                true
            }
            _ => false,
        }
    }

    fn query(&self, socket: &str) -> Option<Arc<Peer>> {
        self.peers.read().get(socket).cloned()
    }

    fn len(&self) -> usize {
        self.peers.read().len()
    }

    fn peers(&self) -> Vec<Arc<Peer>> {
        self.peers.read().values().cloned().collect()
    }

    fn clear(&self) -> Vec<Arc<Peer>> {
        let drained: Vec<_> = self.peers.write().drain().map(|(_, peer)| peer).collect();
        debug!(count = drained.len(), "All peers cleared");
        drained
    }
}

impl std::fmt::Debug for PeerTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerTable")
            .field("peers", &self.len())
            .field("max_peers", &self.max_peers)
            .finish()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::PeerLimits;

    fn peer(socket: &str) -> Arc<Peer> {
        Arc::new(Peer::new(
            SocketId::new(socket).unwrap(),
            Box::new(tokio::io::sink()),
            PeerLimits::default(),
        ))
    }

    #[test]
    fn test_add_query_remove() {
        let table = PeerTable::new(10);
        let a = peer("127.0.0.1:9000");

        assert!(table.add(a.clone()).unwrap().is_none());
        assert_eq!(table.len(), 1);
        assert!(Arc::ptr_eq(&table.query("127.0.0.1:9000").unwrap(), &a));
        assert!(table.query("127.0.0.1:9001").is_none());

        assert!(table.remove(&a));
        assert!(!table.remove(&a));
        assert!(table.is_empty());
    }

    #[test]
    fn test_add_six_remove_two() {
        let table = PeerTable::new(10);
        let peers: Vec<_> = (0..6).map(|i| peer(&format!("10.0.0.{i}:4000"))).collect();
        for p in &peers {
            table.add(p.clone()).unwrap();
        }

        assert!(table.remove(&peers[1]));
        assert!(table.remove(&peers[4]));

        assert_eq!(table.len(), 4);
        assert!(table.query("10.0.0.1:4000").is_none());
        assert!(table.query("10.0.0.4:4000").is_none());
        assert!(table.query("10.0.0.0:4000").is_some());
    }

    #[test]
    fn test_add_replaces_same_identity() {
        let table = PeerTable::new(10);
        let old = peer("127.0.0.1:9000");
        let new = peer("127.0.0.1:9000");

        table.add(old.clone()).unwrap();
        let previous = table.add(new.clone()).unwrap().unwrap();

        assert!(Arc::ptr_eq(&previous, &old));
        assert_eq!(table.len(), 1);
        assert!(Arc::ptr_eq(&table.query("127.0.0.1:9000").unwrap(), &new));

        // The superseded peer no longer owns the entry.
        assert!(!table.remove(&old));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_capacity_enforced_for_new_identities() {
        let table = PeerTable::new(2);
        table.add(peer("127.0.0.1:1")).unwrap();
        table.add(peer("127.0.0.1:2")).unwrap();
        assert!(table.is_full());

        let err = table.add(peer("127.0.0.1:3")).unwrap_err();
        assert!(matches!(err, NodeError::MaxPeersExceeded { limit: 2 }));
        assert_eq!(table.len(), 2);

        // Replacement at capacity is still allowed.
        assert!(table.add(peer("127.0.0.1:2")).unwrap().is_some());
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_clear_returns_everything() {
        let table = PeerTable::new(4);
        table.add(peer("127.0.0.1:1")).unwrap();
        table.add(peer("127.0.0.1:2")).unwrap();

        let drained = table.clear();
        assert_eq!(drained.len(), 2);
        assert!(table.is_empty());
        assert!(table.peers().is_empty());
    }
}
