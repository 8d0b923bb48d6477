//! Discovery beacon
//!
//! Symmetric on every node: broadcast a Discover each cycle, listen for
//! one datagram, upsert whoever speaks, and answer a Discover with a
//! unicast Announce so the sender learns about us without waiting for its
//! own next round. While the registry is empty the cycle repeats every
//! `fast_interval` (fast join); once a peer is known it relaxes to
//! `slow_interval`, which doubles as the liveness refresh.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use vigil_core::{MeshConfig, NodeId, ShutdownToken};
use vigil_transport::BeaconSocket;
use vigil_wire::{DiscoveryKind, DiscoveryMessage};

use crate::PeerRegistry;

/// Beacon-specific slice of the mesh configuration.
#[derive(Clone, Debug)]
pub struct BeaconConfig {
    /// Local bind port for the discovery socket.
    pub bind_port: u16,
    /// Destination for Discover broadcasts.
    pub broadcast_to: SocketAddr,
    pub fast_interval: Duration,
    pub slow_interval: Duration,
    pub recv_timeout: Duration,
}

impl BeaconConfig {
    pub fn from_mesh(config: &MeshConfig) -> Self {
        BeaconConfig {
            bind_port: config.discovery_port,
            broadcast_to: config.broadcast_to,
            fast_interval: config.fast_interval,
            slow_interval: config.slow_interval,
            recv_timeout: config.poll_timeout,
        }
    }
}

impl Default for BeaconConfig {
    fn default() -> Self {
        BeaconConfig::from_mesh(&MeshConfig::default())
    }
}

/// Periodic broadcast/announce protocol that populates the peer registry.
pub struct DiscoveryBeacon {
    node_id: NodeId,
    advertised_ip: IpAddr,
    advertised_port: u16,
    registry: Arc<PeerRegistry>,
    config: BeaconConfig,
}

impl DiscoveryBeacon {
    pub fn new(
        node_id: NodeId,
        advertised_ip: IpAddr,
        advertised_port: u16,
        registry: Arc<PeerRegistry>,
        config: BeaconConfig,
    ) -> Self {
        DiscoveryBeacon {
            node_id,
            advertised_ip,
            advertised_port,
            registry,
            config,
        }
    }

    /// Spawn the beacon loop. A bind failure (port already in use) is not
    /// fatal: it is logged and the node runs with discovery disabled,
    /// relying on statically configured peers.
    pub fn spawn(self, shutdown: ShutdownToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let socket = match BeaconSocket::bind(self.config.bind_port).await {
                Ok(socket) => socket,
                Err(e) => {
                    tracing::warn!("discovery disabled: {e}");
                    return;
                }
            };
            self.run(socket, shutdown).await;
        })
    }

    async fn run(self, socket: BeaconSocket, mut shutdown: ShutdownToken) {
        tracing::info!(node_id = %self.node_id, "discovery beacon started");

        loop {
            let discover = DiscoveryMessage::discover(
                self.node_id.clone(),
                self.advertised_ip,
                self.advertised_port,
            );
            if let Err(e) = socket.send(&discover, self.config.broadcast_to).await {
                tracing::warn!("discover broadcast failed: {e}");
            }

            match socket.recv_timeout(self.config.recv_timeout).await {
                Ok(Some((msg, from))) => self.handle(&socket, msg, from).await,
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("discovery receive error: {e}");
                }
            }

            let pause = if self.registry.is_empty() {
                self.config.fast_interval
            } else {
                self.config.slow_interval
            };
            tokio::select! {
                _ = shutdown.wait() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }

        tracing::info!(node_id = %self.node_id, "discovery beacon stopped");
    }

    async fn handle(&self, socket: &BeaconSocket, msg: DiscoveryMessage, from: SocketAddr) {
        // Our own broadcasts loop back over the broadcast address.
        if msg.node_id == self.node_id {
            return;
        }

        tracing::debug!(peer = %msg.node_id, kind = ?msg.kind, "peer seen");
        // An absent advertised address falls back to where the datagram
        // actually came from.
        let peer_ip = msg.ip.unwrap_or_else(|| from.ip());
        self.registry.upsert(msg.node_id.clone(), peer_ip, msg.port);

        // Every beacon sends from its bound discovery socket, so the
        // datagram's source address is the peer's discovery endpoint.
        if msg.kind == DiscoveryKind::Discover {
            let announce = DiscoveryMessage::announce(
                self.node_id.clone(),
                self.advertised_ip,
                self.advertised_port,
            );
            if let Err(e) = socket.send(&announce, from).await {
                tracing::warn!("announce to {from} failed: {e}");
            }
        }
    }
}
