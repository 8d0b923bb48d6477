//! Motion state machine
//!
//! Edge-triggered on the change ratio between consecutive frames: a flag
//! is emitted only when the node crosses into or out of motion, never on
//! every frame. Frames are captured for the whole time motion is active.

/// Whether the node currently considers the scene in motion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MotionState {
    Idle,
    Active,
}

/// What the sampler should do after observing one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MotionStep {
    /// `Some(1)` on the Idle -> Active edge, `Some(0)` on Active -> Idle,
    /// `None` while the state holds.
    pub flag: Option<u8>,
    /// Publish the frame that produced this observation.
    pub capture: bool,
}

impl MotionStep {
    const HOLD_IDLE: MotionStep = MotionStep {
        flag: None,
        capture: false,
    };
    const HOLD_ACTIVE: MotionStep = MotionStep {
        flag: None,
        capture: true,
    };
    const STARTED: MotionStep = MotionStep {
        flag: Some(1),
        capture: true,
    };
    const ENDED: MotionStep = MotionStep {
        flag: Some(0),
        capture: false,
    };
}

/// Two-state detector over a stream of change ratios.
#[derive(Debug)]
pub struct MotionStateMachine {
    state: MotionState,
    threshold: f64,
}

impl MotionStateMachine {
    pub fn new(threshold: f64) -> Self {
        MotionStateMachine {
            state: MotionState::Idle,
            threshold,
        }
    }

    pub fn state(&self) -> MotionState {
        self.state
    }

    /// Feed one change ratio and learn what to do with the frame behind it.
    pub fn observe(&mut self, ratio: f64) -> MotionStep {
        let moving = ratio > self.threshold;
        match (self.state, moving) {
            (MotionState::Idle, false) => MotionStep::HOLD_IDLE,
            (MotionState::Idle, true) => {
                self.state = MotionState::Active;
                MotionStep::STARTED
            }
            (MotionState::Active, true) => MotionStep::HOLD_ACTIVE,
            (MotionState::Active, false) => {
                self.state = MotionState::Idle;
                MotionStep::ENDED
            }
        }
    }
}

/// A frame as handed over by a camera: the luma plane for change
/// measurement plus the encoded JPEG that goes on the wire.
#[derive(Clone, Debug)]
pub struct CapturedFrame {
    pub pixels: Vec<u8>,
    pub jpeg: Vec<u8>,
}

/// Measures how different two frames are, as a ratio in `0.0..=1.0`.
pub trait ChangeMetric: Send {
    fn change_ratio(&self, prev: &CapturedFrame, current: &CapturedFrame) -> f64;
}

/// Per-pixel absolute difference: the ratio of pixels whose luma moved by
/// more than `pixel_threshold`. Frames of mismatched size count as fully
/// changed.
#[derive(Clone, Copy, Debug)]
pub struct PixelDeltaMetric {
    pub pixel_threshold: u8,
}

impl Default for PixelDeltaMetric {
    fn default() -> Self {
        PixelDeltaMetric {
            pixel_threshold: 25,
        }
    }
}

impl ChangeMetric for PixelDeltaMetric {
    fn change_ratio(&self, prev: &CapturedFrame, current: &CapturedFrame) -> f64 {
        if prev.pixels.len() != current.pixels.len() || current.pixels.is_empty() {
            return 1.0;
        }
        let changed = prev
            .pixels
            .iter()
            .zip(&current.pixels)
            .filter(|(a, b)| a.abs_diff(**b) > self.pixel_threshold)
            .count();
        changed as f64 / current.pixels.len() as f64
    }
}
