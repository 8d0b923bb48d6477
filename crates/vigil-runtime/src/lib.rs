//! VIGIL Runtime - node lifecycle and roles
//!
//! Composition root for a mesh participant: `Node::start` brings up the
//! publish endpoint and discovery, the `spawn_*_role` methods attach the
//! behaviors a deployment needs (camera, inference, health, gateway),
//! and `Node::shutdown` tears everything down in order.

pub mod detect;
pub mod node;
pub mod status;
pub mod telemetry;

pub use detect::Detector;
pub use node::{Node, NodeConfig};
pub use status::{ResourceSampler, StatusReading, SysinfoSampler};
pub use telemetry::init_tracing;
