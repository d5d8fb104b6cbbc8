use serde::{Deserialize, Serialize};

/// A single tracked facial feature point, normalized to [0,1] per axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// True when both coordinates are finite. Providers occasionally emit
    /// NaN/inf points for occluded features; those are excluded from the
    /// bounding box.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Ordered set of landmarks for one detected face.
///
/// Indices are semantically fixed by the provider's model (specific indices
/// denote eyes, lips, and so on), so ordering must be preserved end to end.
pub type LandmarkSet = Vec<Landmark>;

/// Geometric verdict for one frame, derived from the landmark bounding box.
///
/// `is_close` is a deliberately looser size-only gate used as the hysteresis
/// signal; `is_aligned` additionally requires centering and unlocks
/// immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AlignmentVerdict {
    pub is_aligned: bool,
    pub is_close: bool,
}
