//! Landmark provider seam.
//!
//! The real kiosk links a face-landmark model here; the daemon only depends
//! on this trait. Errors from a provider degrade to "no face this frame" in
//! the driver and never stop the loop.

use lumicam_core::{Landmark, LandmarkSet};
use lumicam_video::Frame;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("inference failed: {0}")]
    InferenceFailed(String),
}

/// Per-frame face landmark detection.
pub trait LandmarkProvider: Send {
    /// Run detection on one frame. At most one face is reported; `Ok(None)`
    /// when no face is found.
    fn detect(&mut self, frame: &Frame) -> Result<Option<LandmarkSet>, ProviderError>;
}

/// Deterministic scripted provider for `simulate` runs and tests.
///
/// Models a user walking up to the kiosk: the face starts small and
/// off-center, drifts onto the target over `approach_frames` detections,
/// then holds steady. Every 16th frame is dropped and every 80th fails
/// outright, exercising the driver's missed-detection smoothing and its
/// error degradation.
pub struct SyntheticProvider {
    tick: u64,
    approach_frames: u64,
}

const DROPOUT_PERIOD: u64 = 16;
const FAILURE_PERIOD: u64 = 80;

impl SyntheticProvider {
    pub fn new(approach_frames: u64) -> Self {
        Self {
            tick: 0,
            approach_frames: approach_frames.max(1),
        }
    }

    /// Face outline at a given approach progress in [0, 1].
    fn face_at(progress: f32) -> LandmarkSet {
        let t = progress.clamp(0.0, 1.0);
        let cx = 0.32 + (0.50 - 0.32) * t;
        let cy = 0.38 + (0.50 - 0.38) * t;
        let half_w = 0.05 + (0.20 - 0.05) * t;
        let half_h = 0.06 + (0.25 - 0.06) * t;

        vec![
            Landmark::new(cx - half_w, cy - half_h),
            Landmark::new(cx + half_w, cy - half_h),
            Landmark::new(cx + half_w, cy + half_h),
            Landmark::new(cx - half_w, cy + half_h),
            Landmark::new(cx, cy),
        ]
    }
}

impl LandmarkProvider for SyntheticProvider {
    fn detect(&mut self, _frame: &Frame) -> Result<Option<LandmarkSet>, ProviderError> {
        self.tick += 1;
        if self.tick % FAILURE_PERIOD == 0 {
            return Err(ProviderError::InferenceFailed(
                "synthetic inference fault".to_string(),
            ));
        }
        if self.tick % DROPOUT_PERIOD == 0 {
            return Ok(None);
        }
        let progress = self.tick as f32 / self.approach_frames as f32;
        Ok(Some(Self::face_at(progress)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumicam_core::{alignment, AlignmentThresholds};
    use lumicam_video::{TestPatternSource, VideoSource};

    fn frame() -> Frame {
        TestPatternSource::new(8, 8).grab().unwrap().unwrap()
    }

    #[test]
    fn test_approach_starts_far_and_ends_aligned() {
        let thresholds = AlignmentThresholds::default();

        let start = alignment::evaluate(&SyntheticProvider::face_at(0.0), &thresholds);
        assert!(!start.is_close);
        assert!(!start.is_aligned);

        let end = alignment::evaluate(&SyntheticProvider::face_at(1.0), &thresholds);
        assert!(end.is_aligned);
        assert!(end.is_close);
    }

    #[test]
    fn test_dropouts_and_faults_follow_schedule() {
        let mut provider = SyntheticProvider::new(30);
        let frame = frame();
        let mut misses = 0;
        let mut faults = 0;
        for tick in 1..=160u64 {
            match provider.detect(&frame) {
                Ok(Some(_)) => {}
                Ok(None) => {
                    misses += 1;
                    assert_eq!(tick % DROPOUT_PERIOD, 0, "miss off-schedule at {tick}");
                }
                Err(_) => {
                    faults += 1;
                    assert_eq!(tick % FAILURE_PERIOD, 0, "fault off-schedule at {tick}");
                }
            }
        }
        assert_eq!(misses, 8, "80 and 160 fail instead of dropping");
        assert_eq!(faults, 2);
    }

    #[test]
    fn test_holds_steady_after_approach() {
        let mut provider = SyntheticProvider::new(10);
        let frame = frame();
        let thresholds = AlignmentThresholds::default();
        for _ in 0..30 {
            if let Some(set) = provider.detect(&frame).unwrap() {
                let _ = alignment::evaluate(&set, &thresholds);
            }
        }
        // Well past the approach: still pinned to the aligned target.
        let set = provider.detect(&frame).unwrap().expect("face");
        assert!(alignment::evaluate(&set, &thresholds).is_aligned);
    }
}
