//! Motion sampling loop
//!
//! Pulls frames from a [`FrameSource`] at a fixed cadence, runs them
//! through the state machine, and publishes the resulting flags and
//! frames over the mesh.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use vigil_core::{MotionConfig, ShutdownToken, VigilResult};
use vigil_mesh::MeshClient;
use vigil_wire::{Envelope, ImagePayload, MotionFlagPayload};

use crate::detector::{CapturedFrame, ChangeMetric, MotionStateMachine};

/// A camera, or anything that yields frames.
#[async_trait]
pub trait FrameSource: Send {
    async fn next_frame(&mut self) -> VigilResult<CapturedFrame>;
}

/// Drives one frame source and publishes motion traffic for it.
pub struct MotionSampler {
    mesh: Arc<MeshClient>,
    source: Box<dyn FrameSource>,
    metric: Box<dyn ChangeMetric>,
    config: MotionConfig,
}

impl MotionSampler {
    pub fn new(
        mesh: Arc<MeshClient>,
        source: Box<dyn FrameSource>,
        metric: Box<dyn ChangeMetric>,
        config: MotionConfig,
    ) -> Self {
        MotionSampler {
            mesh,
            source,
            metric,
            config,
        }
    }

    pub fn spawn(self, shutdown: ShutdownToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(mut self, mut shutdown: ShutdownToken) {
        let node_id = self.mesh.node_id().clone();
        let mut machine = MotionStateMachine::new(self.config.threshold);
        let mut prev: Option<CapturedFrame> = None;

        tracing::info!(%node_id, threshold = self.config.threshold, "motion sampler started");

        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                _ = tokio::time::sleep(self.config.sample_interval) => {}
            }

            let frame = match self.source.next_frame().await {
                Ok(frame) => frame,
                Err(e) => {
                    // A dropped frame is a skipped cycle, not a dead node.
                    tracing::warn!("frame capture failed: {e}");
                    continue;
                }
            };

            // The first frame only seeds the comparison baseline.
            let current = frame;
            let Some(previous) = prev.take() else {
                prev = Some(current);
                continue;
            };

            let ratio = self.metric.change_ratio(&previous, &current);
            let step = machine.observe(ratio);

            if let Some(flag) = step.flag {
                tracing::info!(flag, ratio, "motion edge");
                let envelope = Envelope::MotionFlag(MotionFlagPayload {
                    node_id: node_id.clone(),
                    ts: vigil_core::Timestamp::now(),
                    flag,
                });
                if let Err(e) = self.mesh.publish(&envelope) {
                    tracing::warn!("motion flag publish failed: {e}");
                }
            }

            if step.capture {
                let payload = ImagePayload::from_jpeg(
                    node_id.clone(),
                    vigil_core::Timestamp::now(),
                    &current.jpeg,
                );
                if let Err(e) = self.mesh.publish(&Envelope::Image(payload)) {
                    tracing::warn!("image publish failed: {e}");
                }
            }

            prev = Some(current);
        }

        tracing::info!(%node_id, "motion sampler stopped");
    }
}
