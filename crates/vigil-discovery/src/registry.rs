//! Peer registry
//!
//! Concurrency-safe mapping from node id to network address. There is no
//! expiry: once discovered, a peer stays registered for the life of the
//! process even if it becomes unreachable. `last_seen` is refreshed on
//! every upsert so consumers can layer their own staleness policy on top.

use std::collections::HashMap;
use std::net::IpAddr;

use parking_lot::RwLock;

use vigil_core::{NodeId, Timestamp};

/// One known peer.
#[derive(Clone, Debug, PartialEq)]
pub struct PeerRecord {
    pub node_id: NodeId,
    pub ip: IpAddr,
    pub port: u16,
    pub last_seen: Option<Timestamp>,
}

/// The single source of truth for "who is reachable".
///
/// All iteration goes through [`snapshot`](PeerRegistry::snapshot) so no
/// caller ever holds the lock across network I/O.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: RwLock<HashMap<NodeId, PeerRecord>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or refresh a peer. Idempotent: a known node_id keeps its
    /// single entry, with address and port overwritten (peers may change
    /// IP between leases).
    pub fn upsert(&self, node_id: NodeId, ip: IpAddr, port: u16) {
        let mut peers = self.peers.write();
        peers.insert(
            node_id.clone(),
            PeerRecord {
                node_id,
                ip,
                port,
                last_seen: Some(Timestamp::now()),
            },
        );
    }

    /// Point-in-time copy of all known peers, safe to iterate while the
    /// beacon keeps mutating the registry.
    pub fn snapshot(&self) -> Vec<PeerRecord> {
        self.peers.read().values().cloned().collect()
    }

    pub fn get(&self, node_id: &NodeId) -> Option<PeerRecord> {
        self.peers.read().get(node_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }
}
