//! VIGIL Correlate - motion event assembly
//!
//! A camera announces motion with a flag and follows up with frames.
//! The correlator holds one pending slot: a start flag occupies it, the
//! next image completes it into a [`CorrelatedEvent`], and everything
//! else falls through. End flags carry no payload worth keeping and are
//! dropped. There is deliberately no queue: with several cameras firing
//! at once a newer start flag replaces the pending one, so the slot
//! always reflects the most recent motion start.

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;

use vigil_core::{NodeId, ShutdownToken, Timestamp, VigilResult};
use vigil_wire::{Envelope, ImagePayload, MotionFlagPayload};

/// Who and when, pulled out of the two halves of the event.
#[derive(Clone, Debug, Serialize)]
pub struct CorrelationMetadata {
    /// Node that captured the frame.
    pub node_id: NodeId,
    pub flag_ts: Timestamp,
    pub image_ts: Timestamp,
}

/// A motion start flag joined with the first frame that followed it.
#[derive(Clone, Debug, Serialize)]
pub struct CorrelatedEvent {
    pub flag: MotionFlagPayload,
    pub image: ImagePayload,
    pub metadata: CorrelationMetadata,
}

/// Single-slot flag/image joiner.
#[derive(Debug, Default)]
pub struct Correlator {
    pending: Option<MotionFlagPayload>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Feed one envelope; a completed event comes back when an image
    /// joins a pending start flag.
    pub fn offer(&mut self, envelope: Envelope) -> Option<CorrelatedEvent> {
        match envelope {
            Envelope::MotionFlag(flag) if flag.started() => {
                if let Some(old) = self.pending.replace(flag) {
                    tracing::warn!(node_id = %old.node_id, "pending motion flag replaced before a frame arrived");
                }
                None
            }
            // An end flag closes nothing here; the event completed (or
            // didn't) on the first image.
            Envelope::MotionFlag(_) => None,
            Envelope::Image(image) => match self.pending.take() {
                Some(flag) => {
                    let metadata = CorrelationMetadata {
                        node_id: image.node_id.clone(),
                        flag_ts: flag.ts,
                        image_ts: image.ts,
                    };
                    Some(CorrelatedEvent {
                        flag,
                        image,
                        metadata,
                    })
                }
                None => {
                    tracing::debug!(node_id = %image.node_id, "image with no pending motion flag dropped");
                    None
                }
            },
            _ => None,
        }
    }
}

/// Downstream consumer of completed events.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn deliver(&self, event: CorrelatedEvent) -> VigilResult<()>;
}

/// Drain an inbound envelope channel through a correlator until shutdown
/// or the channel closes. Sink failures are logged and the event is lost;
/// correlation never stalls on a slow consumer's error.
pub async fn run_correlator(
    mut inbound: mpsc::Receiver<Envelope>,
    sink: impl EventSink,
    mut shutdown: ShutdownToken,
) {
    let mut correlator = Correlator::new();

    loop {
        let envelope = tokio::select! {
            _ = shutdown.wait() => break,
            received = inbound.recv() => match received {
                Some(envelope) => envelope,
                None => break,
            },
        };

        if let Some(event) = correlator.offer(envelope) {
            tracing::info!(node_id = %event.metadata.node_id, "motion event correlated");
            if let Err(e) = sink.deliver(event).await {
                tracing::warn!("event sink failed: {e}");
            }
        }
    }

    tracing::info!("correlator stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::ShutdownSignal;

    fn flag(node: &str, value: u8) -> Envelope {
        Envelope::MotionFlag(MotionFlagPayload {
            node_id: NodeId::from(node),
            ts: Timestamp::now(),
            flag: value,
        })
    }

    fn image(node: &str) -> Envelope {
        Envelope::Image(ImagePayload::from_jpeg(
            NodeId::from(node),
            Timestamp::now(),
            &[0xFF, 0xD8, 0xFF, 0xD9],
        ))
    }

    #[test]
    fn test_start_flag_then_image_completes_one_event() {
        let mut correlator = Correlator::new();

        assert!(correlator.offer(flag("cam1-a", 1)).is_none());
        let event = correlator.offer(image("cam1-a")).expect("event");

        assert_eq!(event.metadata.node_id, NodeId::from("cam1-a"));
        assert_eq!(event.flag.flag, 1);
        assert!(!correlator.has_pending());

        // Further images join nothing.
        assert!(correlator.offer(image("cam1-a")).is_none());
    }

    #[test]
    fn test_end_flag_is_ignored() {
        let mut correlator = Correlator::new();
        assert!(correlator.offer(flag("cam1-a", 0)).is_none());
        assert!(correlator.offer(image("cam1-a")).is_none());
    }

    #[test]
    fn test_image_without_pending_flag_is_dropped() {
        let mut correlator = Correlator::new();
        assert!(correlator.offer(image("cam1-a")).is_none());
    }

    #[test]
    fn test_unrelated_envelopes_pass_through() {
        let mut correlator = Correlator::new();
        correlator.offer(flag("cam1-a", 1));

        let status = Envelope::DetectionResults(vigil_wire::DetectionPayload {
            node_id: NodeId::from("cam2-b"),
            ts: Timestamp::now(),
            detections: vec![],
        });
        assert!(correlator.offer(status).is_none());
        // The pending flag survives unrelated traffic.
        assert!(correlator.has_pending());
    }

    #[test]
    fn test_clobbered_pending_flag_is_lost() {
        // With one slot, simultaneous motion on two cameras merges into a
        // single event attributed to whichever image lands first.
        let mut correlator = Correlator::new();
        correlator.offer(flag("cam1-a", 1));
        correlator.offer(flag("cam2-b", 1));

        let event = correlator.offer(image("cam2-b")).expect("event");
        assert_eq!(event.flag.node_id, NodeId::from("cam2-b"));

        // cam1's start flag was replaced; its image now joins nothing.
        assert!(correlator.offer(image("cam1-a")).is_none());
    }

    #[test]
    fn test_correlated_event_serializes() {
        let mut correlator = Correlator::new();
        correlator.offer(flag("cam1-a", 1));
        let event = correlator.offer(image("cam1-a")).unwrap();

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["metadata"]["node_id"], "cam1-a");
        assert!(value["image"]["image_data"].is_string());
    }

    struct ChannelSink(mpsc::Sender<CorrelatedEvent>);

    #[async_trait]
    impl EventSink for ChannelSink {
        async fn deliver(&self, event: CorrelatedEvent) -> VigilResult<()> {
            let _ = self.0.send(event).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_run_correlator_delivers_to_sink() {
        let (signal, token) = ShutdownSignal::new();
        let (in_tx, in_rx) = mpsc::channel(8);
        let (out_tx, mut out_rx) = mpsc::channel(8);

        let task = tokio::spawn(run_correlator(in_rx, ChannelSink(out_tx), token));

        in_tx.send(flag("cam1-a", 1)).await.unwrap();
        in_tx.send(image("cam1-a")).await.unwrap();
        in_tx.send(flag("cam1-a", 0)).await.unwrap();

        let event = out_rx.recv().await.expect("event");
        assert_eq!(event.metadata.node_id, NodeId::from("cam1-a"));

        signal.trigger();
        task.await.unwrap();
    }
}
