//! UDP beacon socket for discovery

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;

use vigil_core::{VigilError, VigilResult};
use vigil_wire::{DiscoveryMessage, MAX_DATAGRAM_SIZE};

/// Broadcast-enabled UDP socket bound to the discovery port.
pub struct BeaconSocket {
    socket: UdpSocket,
    local_addr: SocketAddr,
}

impl BeaconSocket {
    /// Bind to `0.0.0.0:port` with broadcast enabled. A bind failure is
    /// reported as [`VigilError::BindFailed`] so the caller can degrade
    /// (discovery disabled) instead of aborting.
    pub async fn bind(port: u16) -> VigilResult<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", port))
            .await
            .map_err(|source| VigilError::BindFailed { port, source })?;

        socket
            .set_broadcast(true)
            .map_err(|source| VigilError::BindFailed { port, source })?;

        let local_addr = socket.local_addr().map_err(VigilError::transport)?;

        Ok(BeaconSocket { socket, local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Send a discovery message to a destination (broadcast or unicast).
    pub async fn send(&self, msg: &DiscoveryMessage, dest: SocketAddr) -> VigilResult<()> {
        let bytes = msg.encode()?;
        self.socket
            .send_to(&bytes, dest)
            .await
            .map_err(VigilError::transport)?;
        Ok(())
    }

    /// Await one inbound datagram. `Ok(None)` on timeout; a malformed
    /// datagram is a codec error for the caller to log and skip.
    pub async fn recv_timeout(
        &self,
        wait: Duration,
    ) -> VigilResult<Option<(DiscoveryMessage, SocketAddr)>> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        match timeout(wait, self.socket.recv_from(&mut buf)).await {
            Err(_) => Ok(None),
            Ok(Err(e)) => Err(VigilError::transport(e)),
            Ok(Ok((len, addr))) => {
                let msg = DiscoveryMessage::decode(&buf[..len])?;
                Ok(Some((msg, addr)))
            }
        }
    }
}
