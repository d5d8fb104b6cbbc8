//! Alignment evaluation over the landmark bounding box.
//!
//! Stateless and recomputed every frame: the face is "close" when its
//! bounding box is large enough, and "aligned" when it is larger still and
//! centered in the frame. All coordinates are normalized to [0,1].

use crate::types::{AlignmentVerdict, Landmark};

/// Target face center in normalized coordinates.
const TARGET_CENTER: (f32, f32) = (0.5, 0.5);

/// Size and centering thresholds for the alignment verdict.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignmentThresholds {
    /// Bounding-box width required for "aligned".
    pub min_width: f32,
    /// Bounding-box height required for "aligned".
    pub min_height: f32,
    /// Bounding-box width required for "close" (looser).
    pub near_width: f32,
    /// Bounding-box height required for "close".
    pub near_height: f32,
    /// Allowed horizontal deviation from the target center.
    pub center_tolerance_x: f32,
    /// Allowed vertical deviation from the target center.
    pub center_tolerance_y: f32,
}

impl Default for AlignmentThresholds {
    fn default() -> Self {
        Self {
            min_width: 0.34,
            min_height: 0.44,
            near_width: 0.30,
            near_height: 0.36,
            center_tolerance_x: 0.12,
            center_tolerance_y: 0.12,
        }
    }
}

/// Axis-aligned bounding box over the finite landmarks of a set.
struct FaceBox {
    width: f32,
    height: f32,
    center_x: f32,
    center_y: f32,
}

fn bounding_box(landmarks: &[Landmark]) -> Option<FaceBox> {
    let mut min_x = f32::INFINITY;
    let mut min_y = f32::INFINITY;
    let mut max_x = f32::NEG_INFINITY;
    let mut max_y = f32::NEG_INFINITY;
    let mut any = false;

    for point in landmarks.iter().filter(|p| p.is_finite()) {
        min_x = min_x.min(point.x);
        min_y = min_y.min(point.y);
        max_x = max_x.max(point.x);
        max_y = max_y.max(point.y);
        any = true;
    }

    if !any {
        return None;
    }

    Some(FaceBox {
        width: max_x - min_x,
        height: max_y - min_y,
        center_x: (min_x + max_x) / 2.0,
        center_y: (min_y + max_y) / 2.0,
    })
}

/// Score a landmark set against the thresholds.
///
/// Empty or all-non-finite sets yield `{false, false}`. Pure and idempotent.
pub fn evaluate(landmarks: &[Landmark], thresholds: &AlignmentThresholds) -> AlignmentVerdict {
    let Some(bbox) = bounding_box(landmarks) else {
        return AlignmentVerdict::default();
    };

    let is_close = bbox.width >= thresholds.near_width && bbox.height >= thresholds.near_height;

    let centered = (bbox.center_x - TARGET_CENTER.0).abs() <= thresholds.center_tolerance_x
        && (bbox.center_y - TARGET_CENTER.1).abs() <= thresholds.center_tolerance_y;
    let is_aligned =
        bbox.width >= thresholds.min_width && bbox.height >= thresholds.min_height && centered;

    AlignmentVerdict { is_aligned, is_close }
}
