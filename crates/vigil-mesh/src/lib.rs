//! VIGIL Mesh - the pub/sub client
//!
//! A `MeshClient` owns this node's publish endpoint and, on request, a
//! background sweep that keeps one subscription open to every peer the
//! registry knows about. Inbound envelopes from all subscriptions
//! interleave on a single channel.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use vigil_core::{NodeId, ShutdownToken, VigilResult};
use vigil_discovery::PeerRegistry;
use vigil_transport::{PubEndpoint, SubConnection};
use vigil_wire::Envelope;

/// Inbound channel depth; the bounded receive buffer per subscriber set.
const INBOUND_BUFFER: usize = 256;

/// Publish/subscribe client for one node.
pub struct MeshClient {
    node_id: NodeId,
    endpoint: Arc<PubEndpoint>,
    poll_interval: Duration,
    shutdown: ShutdownToken,
}

impl MeshClient {
    /// Bind this node's publish endpoint. Failure here is fatal to the
    /// caller: a node that cannot publish cannot participate in the mesh.
    pub async fn bind(
        node_id: NodeId,
        port: u16,
        poll_interval: Duration,
        shutdown: ShutdownToken,
    ) -> VigilResult<Self> {
        let endpoint = PubEndpoint::bind(port, shutdown.clone()).await?;
        tracing::info!(%node_id, addr = %endpoint.local_addr(), "publish endpoint bound");
        Ok(MeshClient {
            node_id,
            endpoint: Arc::new(endpoint),
            poll_interval,
            shutdown,
        })
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.endpoint.local_addr()
    }

    /// Fire-and-forget broadcast of one envelope to whoever is subscribed
    /// to this node. Never blocks.
    pub fn publish(&self, envelope: &Envelope) -> VigilResult<()> {
        self.endpoint.publish(envelope)
    }

    /// Start the subscription sweep: each poll cycle, snapshot the registry
    /// and open a subscriber connection to every peer not yet connected
    /// (never twice to the same peer). All decoded envelopes arrive on the
    /// returned channel. On any subscription error the whole connected set
    /// is cleared so the next sweep reconnects everything - a failed peer
    /// is retried, not abandoned. The returned handle is joined at node
    /// shutdown.
    pub fn subscribe_all(
        &self,
        registry: Arc<PeerRegistry>,
    ) -> (mpsc::Receiver<Envelope>, JoinHandle<()>) {
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_BUFFER);
        let sweep = Sweep {
            node_id: self.node_id.clone(),
            registry,
            poll_interval: self.poll_interval,
            inbound_tx,
            shutdown: self.shutdown.clone(),
        };
        let handle = tokio::spawn(sweep.run());
        (inbound_rx, handle)
    }

    /// The accept-loop task behind the publish endpoint, for joining at
    /// shutdown. Present until taken.
    pub fn take_accept_task(&self) -> Option<JoinHandle<()>> {
        self.endpoint.take_accept_task()
    }
}

struct Sweep {
    node_id: NodeId,
    registry: Arc<PeerRegistry>,
    poll_interval: Duration,
    inbound_tx: mpsc::Sender<Envelope>,
    shutdown: ShutdownToken,
}

impl Sweep {
    async fn run(self) {
        let mut shutdown = self.shutdown.clone();
        let (err_tx, mut err_rx) = mpsc::unbounded_channel::<NodeId>();
        let mut connected: HashMap<NodeId, JoinHandle<()>> = HashMap::new();

        loop {
            self.connect_missing(&mut connected, &err_tx).await;

            tokio::select! {
                _ = shutdown.wait() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
                Some(peer) = err_rx.recv() => {
                    // Blunt recovery: one lost subscription resets the whole
                    // set; the next scan re-subscribes every reachable peer.
                    tracing::warn!(%peer, "subscription error, clearing connected set");
                    for (_, handle) in connected.drain() {
                        handle.abort();
                    }
                }
            }
        }

        for (_, handle) in connected.drain() {
            handle.abort();
        }
    }

    async fn connect_missing(
        &self,
        connected: &mut HashMap<NodeId, JoinHandle<()>>,
        err_tx: &mpsc::UnboundedSender<NodeId>,
    ) {
        for record in self.registry.snapshot() {
            if record.node_id == self.node_id || connected.contains_key(&record.node_id) {
                continue;
            }

            let addr = SocketAddr::new(record.ip, record.port);
            // The connect gets one poll interval; a black-holed peer must
            // not stall the sweep past its shutdown check.
            let opened =
                tokio::time::timeout(self.poll_interval, SubConnection::open(addr)).await;
            match opened {
                Ok(Ok(conn)) => {
                    tracing::info!(peer = %record.node_id, %addr, "subscribed");
                    let tx = self.inbound_tx.clone();
                    let err_tx = err_tx.clone();
                    let peer = record.node_id.clone();
                    let token = self.shutdown.clone();
                    let handle = tokio::spawn(async move {
                        if let Err(e) = conn.run(tx, token).await {
                            tracing::warn!(%peer, "subscription lost: {e}");
                            let _ = err_tx.send(peer);
                        }
                    });
                    connected.insert(record.node_id, handle);
                }
                Ok(Err(e)) => {
                    // Unreachable peer: retried on the next sweep.
                    tracing::warn!(peer = %record.node_id, %addr, "connect failed: {e}");
                }
                Err(_) => {
                    tracing::warn!(peer = %record.node_id, %addr, "connect timed out");
                }
            }
        }
    }
}
