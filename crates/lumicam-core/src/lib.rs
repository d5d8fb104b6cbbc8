//! lumicam-core — Face alignment evaluation and engagement tracking.
//!
//! Pure per-frame logic: an alignment evaluator that scores a landmark set
//! against size/centering thresholds, and the guide/locked state machine
//! that turns noisy per-frame verdicts into stable lock, revert, and
//! auto-capture decisions. No I/O and no runtime — the frame driver in
//! `lumicamd` feeds it one detection per tick.

pub mod alignment;
pub mod engagement;
pub mod types;

pub use alignment::AlignmentThresholds;
pub use engagement::{
    Engagement, EngagementEvent, Phase, AUTO_CAPTURE_FRAMES, CLOSE_UNLOCK_FRAMES,
    DISENGAGE_FRAME_LIMIT, MAX_MISS_COUNT,
};
pub use types::{AlignmentVerdict, Landmark, LandmarkSet};
