//! Mesh envelopes
//!
//! Every message on the pub/sub fabric is a typed, timestamped envelope,
//! discriminated by the `type` field: `image`, `motion_flag`,
//! `detection_results`, or `system_status`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use vigil_core::{NodeId, Timestamp, VigilError, VigilResult};

/// A typed message unit exchanged over the mesh.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Envelope {
    #[serde(rename = "image")]
    Image(ImagePayload),
    #[serde(rename = "motion_flag")]
    MotionFlag(MotionFlagPayload),
    #[serde(rename = "detection_results")]
    DetectionResults(DetectionPayload),
    #[serde(rename = "system_status")]
    SystemStatus(StatusPayload),
}

impl Envelope {
    pub fn node_id(&self) -> &NodeId {
        match self {
            Envelope::Image(p) => &p.node_id,
            Envelope::MotionFlag(p) => &p.node_id,
            Envelope::DetectionResults(p) => &p.node_id,
            Envelope::SystemStatus(p) => &p.node_id,
        }
    }

    pub fn ts(&self) -> Timestamp {
        match self {
            Envelope::Image(p) => p.ts,
            Envelope::MotionFlag(p) => p.ts,
            Envelope::DetectionResults(p) => p.ts,
            Envelope::SystemStatus(p) => p.ts,
        }
    }

    pub fn encode(&self) -> VigilResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(VigilError::codec)
    }

    pub fn decode(buf: &[u8]) -> VigilResult<Self> {
        serde_json::from_slice(buf).map_err(VigilError::codec)
    }
}

/// JPEG frame snapshot, base64-encoded on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImagePayload {
    pub node_id: NodeId,
    pub ts: Timestamp,
    pub image_data: String,
    pub filename: String,
    /// Human-readable size, e.g. `"42.17 KB"`. Kept as a string for wire
    /// compatibility with existing consumers.
    pub size: String,
}

impl ImagePayload {
    /// Wrap raw JPEG bytes for the wire.
    pub fn from_jpeg(node_id: NodeId, ts: Timestamp, jpeg: &[u8]) -> Self {
        let filename = format!("{}_{}.jpg", node_id, ts.filename_safe());
        let size = format!("{:.2} KB", jpeg.len() as f64 / 1024.0);
        ImagePayload {
            node_id,
            ts,
            image_data: BASE64.encode(jpeg),
            filename,
            size,
        }
    }

    /// Recover the original JPEG bytes. Corrupt base64 is a decode error,
    /// never a panic.
    pub fn jpeg_bytes(&self) -> VigilResult<Vec<u8>> {
        BASE64
            .decode(&self.image_data)
            .map_err(|e| VigilError::PayloadDecode(e.to_string()))
    }
}

/// Edge-triggered motion flag: 1 = started, 0 = ended.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MotionFlagPayload {
    pub node_id: NodeId,
    pub ts: Timestamp,
    pub flag: u8,
}

impl MotionFlagPayload {
    pub fn started(&self) -> bool {
        self.flag == 1
    }
}

/// One detected object class with its confidence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "class")]
    pub class_name: String,
    pub confidence: f32,
}

/// Ordered inference results for one image.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionPayload {
    pub node_id: NodeId,
    pub ts: Timestamp,
    pub detections: Vec<Detection>,
}

/// Resource readings sampled on the publishing node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub node_id: NodeId,
    pub ts: Timestamp,
    pub cpu_percent: f32,
    pub mem_total: u64,
    pub mem_used: u64,
    pub mem_percent: f32,
    pub disk_total: u64,
    pub disk_used: u64,
    pub disk_percent: f32,
    pub net_up_kbps: f64,
    pub net_down_kbps: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_c: Option<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn node() -> NodeId {
        NodeId::from("cam1-motion")
    }

    #[test]
    fn test_motion_flag_wire_shape() {
        let env = Envelope::MotionFlag(MotionFlagPayload {
            node_id: node(),
            ts: Timestamp::now(),
            flag: 1,
        });
        let value: serde_json::Value = serde_json::from_slice(&env.encode().unwrap()).unwrap();

        assert_eq!(value["type"], "motion_flag");
        assert_eq!(value["node_id"], "cam1-motion");
        assert_eq!(value["flag"], 1);
        assert!(value["ts"].is_string());
    }

    #[test]
    fn test_image_wire_shape() {
        let env = Envelope::Image(ImagePayload::from_jpeg(node(), Timestamp::now(), &[0xFF, 0xD8, 0xFF]));
        let value: serde_json::Value = serde_json::from_slice(&env.encode().unwrap()).unwrap();

        assert_eq!(value["type"], "image");
        assert!(value["image_data"].is_string());
        assert!(value["filename"].as_str().unwrap().ends_with(".jpg"));
        assert!(value["size"].as_str().unwrap().ends_with(" KB"));
    }

    #[test]
    fn test_detection_results_field_names() {
        let env = Envelope::DetectionResults(DetectionPayload {
            node_id: node(),
            ts: Timestamp::now(),
            detections: vec![Detection {
                class_name: "person".into(),
                confidence: 0.91,
            }],
        });
        let value: serde_json::Value = serde_json::from_slice(&env.encode().unwrap()).unwrap();

        assert_eq!(value["type"], "detection_results");
        assert_eq!(value["detections"][0]["class"], "person");
    }

    #[test]
    fn test_image_bytes_roundtrip() {
        let jpeg = vec![0xFF, 0xD8, 0x00, 0x7F, 0x80, 0xFF, 0xD9];
        let payload = ImagePayload::from_jpeg(node(), Timestamp::now(), &jpeg);
        assert_eq!(payload.jpeg_bytes().unwrap(), jpeg);
    }

    #[test]
    fn test_corrupt_base64_is_decode_error() {
        let mut payload = ImagePayload::from_jpeg(node(), Timestamp::now(), &[1, 2, 3]);
        payload.image_data = "!!not base64!!".into();
        assert!(matches!(
            payload.jpeg_bytes().unwrap_err(),
            VigilError::PayloadDecode(_)
        ));
    }

    #[test]
    fn test_envelope_decode_rejects_unknown_type() {
        let err = Envelope::decode(br#"{"type":"telemetry","node_id":"x","ts":"2024-01-01T00:00:00Z"}"#);
        assert!(err.is_err());
    }

    proptest! {
        #[test]
        fn prop_image_bytes_survive_wire(bytes in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let payload = ImagePayload::from_jpeg(node(), Timestamp::now(), &bytes);
            let env = Envelope::Image(payload);
            let decoded = Envelope::decode(&env.encode().unwrap()).unwrap();
            match decoded {
                Envelope::Image(p) => prop_assert_eq!(p.jpeg_bytes().unwrap(), bytes),
                _ => prop_assert!(false),
            }
        }
    }
}
