//! Configuration
//!
//! Defaults mirror the deployed fleet: one well-known mesh port, one
//! well-known discovery port, a fast join cadence that relaxes once at
//! least one peer is known.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::NodeId;

/// A statically configured peer, used when discovery is unavailable.
#[derive(Clone, Debug)]
pub struct StaticPeer {
    pub node_id: NodeId,
    pub ip: IpAddr,
    pub port: u16,
}

/// Mesh-wide networking configuration.
#[derive(Clone, Debug)]
pub struct MeshConfig {
    /// Port this node's publish endpoint binds to.
    pub node_port: u16,
    /// Local bind port for the discovery beacon.
    pub discovery_port: u16,
    /// Destination for discovery broadcasts.
    pub broadcast_to: SocketAddr,
    /// Beacon cadence while no peers are known.
    pub fast_interval: Duration,
    /// Beacon cadence once at least one peer is known; doubles as the
    /// liveness-refresh interval.
    pub slow_interval: Duration,
    /// Read timeout on sockets, so loops can observe shutdown.
    pub poll_timeout: Duration,
    /// Cadence of system_status envelopes.
    pub status_interval: Duration,
    /// Peers seeded into the registry at startup (discovery fallback).
    pub static_peers: Vec<StaticPeer>,
}

impl Default for MeshConfig {
    fn default() -> Self {
        MeshConfig {
            node_port: 5555,
            discovery_port: 50000,
            broadcast_to: SocketAddr::new(IpAddr::V4(Ipv4Addr::BROADCAST), 50000),
            fast_interval: Duration::from_secs(2),
            slow_interval: Duration::from_secs(15),
            poll_timeout: Duration::from_secs(1),
            status_interval: Duration::from_secs(2),
            static_peers: Vec::new(),
        }
    }
}

/// Motion sampling configuration.
#[derive(Clone, Debug)]
pub struct MotionConfig {
    /// Change-ratio threshold in [0, 1]; crossing it edge-triggers flags.
    pub threshold: f64,
    /// Sampling cadence (10 fps in the deployed pipeline).
    pub sample_interval: Duration,
}

impl Default for MotionConfig {
    fn default() -> Self {
        MotionConfig {
            threshold: 0.1,
            sample_interval: Duration::from_millis(100),
        }
    }
}
