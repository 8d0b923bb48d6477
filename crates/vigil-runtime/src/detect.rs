//! Detection role
//!
//! Consumes inbound `image` envelopes from the whole mesh, hands the
//! JPEG bytes to an injected detector, and publishes the results. The
//! inference engine itself lives behind the [`Detector`] trait; this
//! crate only moves frames in and detections out.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use vigil_core::{ShutdownToken, Timestamp, VigilResult};
use vigil_mesh::MeshClient;
use vigil_wire::{Detection, DetectionPayload, Envelope};

/// Object detector over a single JPEG frame.
#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect(&self, jpeg: &[u8]) -> VigilResult<Vec<Detection>>;
}

pub(crate) async fn run_detection_loop(
    mesh: Arc<MeshClient>,
    mut inbound: mpsc::Receiver<Envelope>,
    detector: Arc<dyn Detector>,
    mut shutdown: ShutdownToken,
) {
    let node_id = mesh.node_id().clone();
    tracing::info!(%node_id, "detection role started");

    loop {
        let envelope = tokio::select! {
            _ = shutdown.wait() => break,
            received = inbound.recv() => match received {
                Some(envelope) => envelope,
                None => break,
            },
        };

        let Envelope::Image(image) = envelope else {
            continue;
        };

        let jpeg = match image.jpeg_bytes() {
            Ok(jpeg) => jpeg,
            Err(e) => {
                tracing::warn!(source = %image.node_id, "dropping undecodable image: {e}");
                continue;
            }
        };

        match detector.detect(&jpeg).await {
            Ok(detections) => {
                tracing::debug!(source = %image.node_id, count = detections.len(), "frame inferred");
                let payload = DetectionPayload {
                    node_id: node_id.clone(),
                    ts: Timestamp::now(),
                    detections,
                };
                if let Err(e) = mesh.publish(&Envelope::DetectionResults(payload)) {
                    tracing::warn!("detection publish failed: {e}");
                }
            }
            Err(e) => {
                tracing::warn!(source = %image.node_id, "inference failed: {e}");
            }
        }
    }

    tracing::info!(%node_id, "detection role stopped");
}
