//! VIGIL Motion - edge-triggered motion detection
//!
//! The detector compares consecutive frames and flips between Idle and
//! Active when the change ratio crosses the configured threshold. Flags
//! go out only on the transitions; frames go out for as long as motion
//! is active.

pub mod detector;
pub mod sampler;

pub use detector::{
    CapturedFrame, ChangeMetric, MotionState, MotionStateMachine, MotionStep, PixelDeltaMetric,
};
pub use sampler::{FrameSource, MotionSampler};
