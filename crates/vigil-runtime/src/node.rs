//! Node composition
//!
//! One `Node` per process: it owns the publish endpoint, the peer
//! registry and the discovery beacon, and lends its mesh client to
//! whichever role loops the binary chooses to run. Roles are plain
//! strategies injected through traits; there is no node hierarchy.

use std::sync::Arc;

use tokio::task::JoinHandle;

use vigil_core::{
    MeshConfig, MotionConfig, NodeId, ShutdownSignal, ShutdownToken, VigilResult,
};
use vigil_correlate::{run_correlator, EventSink};
use vigil_discovery::{local_ip, BeaconConfig, DiscoveryBeacon, PeerRegistry};
use vigil_mesh::MeshClient;
use vigil_motion::{ChangeMetric, FrameSource, MotionSampler};

use crate::detect::{run_detection_loop, Detector};
use crate::status::{run_status_loop, ResourceSampler};

/// Full configuration for one node.
#[derive(Clone, Debug, Default)]
pub struct NodeConfig {
    pub mesh: MeshConfig,
    pub motion: MotionConfig,
}

/// A running mesh participant.
pub struct Node {
    node_id: NodeId,
    config: NodeConfig,
    mesh: Arc<MeshClient>,
    registry: Arc<PeerRegistry>,
    signal: ShutdownSignal,
    token: ShutdownToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Node {
    /// Bind the publish endpoint and start discovery. The endpoint bind is
    /// the only failure that aborts startup; a dead discovery port only
    /// degrades to the statically configured peers.
    pub async fn start(node_id: NodeId, config: NodeConfig) -> VigilResult<Self> {
        let (signal, token) = ShutdownSignal::new();

        let mesh = Arc::new(
            MeshClient::bind(
                node_id.clone(),
                config.mesh.node_port,
                config.mesh.poll_timeout,
                token.clone(),
            )
            .await?,
        );

        let registry = Arc::new(PeerRegistry::new());
        for peer in &config.mesh.static_peers {
            registry.upsert(peer.node_id.clone(), peer.ip, peer.port);
        }

        let beacon = DiscoveryBeacon::new(
            node_id.clone(),
            local_ip(),
            mesh.local_addr().port(),
            registry.clone(),
            BeaconConfig::from_mesh(&config.mesh),
        );
        let mut tasks = Vec::new();
        if let Some(task) = mesh.take_accept_task() {
            tasks.push(task);
        }
        tasks.push(beacon.spawn(token.clone()));

        tracing::info!(%node_id, "node started");
        Ok(Node {
            node_id,
            config,
            mesh,
            registry,
            signal,
            token,
            tasks,
        })
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn mesh(&self) -> &Arc<MeshClient> {
        &self.mesh
    }

    pub fn registry(&self) -> &Arc<PeerRegistry> {
        &self.registry
    }

    /// Camera role: sample frames, detect motion, publish flags and frames.
    pub fn spawn_motion_role(
        &mut self,
        source: Box<dyn FrameSource>,
        metric: Box<dyn ChangeMetric>,
    ) {
        let sampler = MotionSampler::new(
            self.mesh.clone(),
            source,
            metric,
            self.config.motion.clone(),
        );
        self.tasks.push(sampler.spawn(self.token.clone()));
    }

    /// Health role: publish a `system_status` envelope each interval.
    pub fn spawn_status_role(&mut self, sampler: Box<dyn ResourceSampler>) {
        self.tasks.push(tokio::spawn(run_status_loop(
            self.mesh.clone(),
            sampler,
            self.config.mesh.status_interval,
            self.token.clone(),
        )));
    }

    /// Inference role: run a detector over every inbound image.
    pub fn spawn_detection_role(&mut self, detector: Arc<dyn Detector>) {
        let (inbound, sweep) = self.mesh.subscribe_all(self.registry.clone());
        self.tasks.push(sweep);
        self.tasks.push(tokio::spawn(run_detection_loop(
            self.mesh.clone(),
            inbound,
            detector,
            self.token.clone(),
        )));
    }

    /// Gateway role: correlate motion flags with frames and hand completed
    /// events to the sink.
    pub fn spawn_correlator_role(&mut self, sink: impl EventSink + 'static) {
        let (inbound, sweep) = self.mesh.subscribe_all(self.registry.clone());
        self.tasks.push(sweep);
        self.tasks.push(tokio::spawn(run_correlator(
            inbound,
            sink,
            self.token.clone(),
        )));
    }

    /// Flip the shutdown signal and wait for every role to finish before
    /// the sockets drop.
    pub async fn shutdown(self) {
        tracing::info!(node_id = %self.node_id, "node stopping");
        self.signal.trigger();
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::warn!("role task ended abnormally: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use vigil_transport::SubConnection;
    use vigil_wire::{Detection, Envelope, ImagePayload};

    fn test_config() -> NodeConfig {
        NodeConfig {
            mesh: MeshConfig {
                node_port: 0,
                discovery_port: 0,
                // Dead loopback destination; discovery stays quiet.
                broadcast_to: "127.0.0.1:1".parse().unwrap(),
                fast_interval: Duration::from_millis(100),
                slow_interval: Duration::from_millis(500),
                poll_timeout: Duration::from_millis(50),
                status_interval: Duration::from_millis(20),
                static_peers: Vec::new(),
            },
            motion: MotionConfig::default(),
        }
    }

    async fn watch_endpoint(
        node: &Node,
        token: vigil_core::ShutdownToken,
    ) -> mpsc::Receiver<Envelope> {
        let addr = SocketAddr::new("127.0.0.1".parse().unwrap(), node.mesh().local_addr().port());
        let conn = SubConnection::open(addr).await.unwrap();
        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(conn.run(tx, token));
        tokio::time::sleep(Duration::from_millis(50)).await;
        rx
    }

    struct FlatSampler;

    impl ResourceSampler for FlatSampler {
        fn sample(&mut self) -> crate::status::StatusReading {
            crate::status::StatusReading {
                cpu_percent: 12.5,
                mem_total: 1024,
                mem_used: 512,
                mem_percent: 50.0,
                ..Default::default()
            }
        }
    }

    #[tokio::test]
    async fn test_status_role_publishes_on_interval() {
        let (_signal, token) = ShutdownSignal::new();
        let mut node = Node::start(NodeId::from("cam1-status"), test_config())
            .await
            .unwrap();
        let mut rx = watch_endpoint(&node, token).await;

        node.spawn_status_role(Box::new(FlatSampler));

        let envelope = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("no status published")
            .expect("channel closed");
        match envelope {
            Envelope::SystemStatus(p) => {
                assert_eq!(p.node_id, NodeId::from("cam1-status"));
                assert_eq!(p.mem_percent, 50.0);
            }
            other => panic!("unexpected envelope: {other:?}"),
        }

        // Shutdown joins every loop the node started, including the
        // endpoint's accept task, within a bounded time.
        tokio::time::timeout(Duration::from_secs(5), node.shutdown())
            .await
            .expect("shutdown hung");
    }

    struct StubDetector;

    #[async_trait]
    impl Detector for StubDetector {
        async fn detect(&self, _jpeg: &[u8]) -> VigilResult<Vec<Detection>> {
            Ok(vec![Detection {
                class_name: "person".into(),
                confidence: 0.88,
            }])
        }
    }

    #[tokio::test]
    async fn test_detection_role_answers_inbound_images() {
        let (_signal, token) = ShutdownSignal::new();

        // The "camera" is a second node publishing one image.
        let camera = Node::start(NodeId::from("cam1-camera"), test_config())
            .await
            .unwrap();
        let mut config = test_config();
        config.mesh.poll_timeout = Duration::from_millis(50);
        let mut inference = Node::start(NodeId::from("gpu1-infer"), config)
            .await
            .unwrap();

        // Wire them statically; no discovery in this test.
        inference.registry().upsert(
            camera.node_id().clone(),
            "127.0.0.1".parse().unwrap(),
            camera.mesh().local_addr().port(),
        );

        let mut rx = watch_endpoint(&inference, token).await;
        inference.spawn_detection_role(Arc::new(StubDetector));
        tokio::time::sleep(Duration::from_millis(150)).await;

        let image = ImagePayload::from_jpeg(
            camera.node_id().clone(),
            vigil_core::Timestamp::now(),
            &[0xFF, 0xD8, 0xFF, 0xD9],
        );
        camera.mesh().publish(&Envelope::Image(image)).unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        let results = loop {
            let envelope = tokio::time::timeout_at(deadline, rx.recv())
                .await
                .expect("no detection published")
                .expect("channel closed");
            if let Envelope::DetectionResults(p) = envelope {
                break p;
            }
        };
        assert_eq!(results.node_id, NodeId::from("gpu1-infer"));
        assert_eq!(results.detections[0].class_name, "person");

        tokio::time::timeout(Duration::from_secs(5), inference.shutdown())
            .await
            .expect("shutdown hung");
        tokio::time::timeout(Duration::from_secs(5), camera.shutdown())
            .await
            .expect("shutdown hung");
    }
}
