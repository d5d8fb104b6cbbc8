//! Guide/locked engagement tracking with frame-count hysteresis.
//!
//! Raw per-frame landmark detection is noisy: a single missed or borderline
//! frame must not flip the UI, while a sustained signal should. The machine
//! therefore requires a run of close frames before locking the overlay, a
//! run of lost frames before reverting to the guide, and a long run of
//! close frames before firing the one-shot auto-capture.
//!
//! The state is an explicit struct advanced by one call per frame; it knows
//! nothing about rendering or scheduling, so tests drive it directly.

use std::time::{Duration, Instant};

use crate::alignment::{self, AlignmentThresholds};
use crate::types::{AlignmentVerdict, Landmark, LandmarkSet};

/// Consecutive close frames in `Guide` that unlock the overlay.
pub const CLOSE_UNLOCK_FRAMES: u32 = 6;
/// Consecutive not-close frames in `Locked` tolerated before reverting.
pub const DISENGAGE_FRAME_LIMIT: u32 = 12;
/// Consecutive close frames in `Locked` that trigger the auto-capture.
pub const AUTO_CAPTURE_FRAMES: u32 = 60;
/// Missed-detection frames across which the last landmarks are retained
/// for rendering continuity.
pub const MAX_MISS_COUNT: u32 = 45;

/// Engagement phase. The mesh overlay is rendered iff `Locked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Guiding the user into position; no overlay.
    Guide,
    /// Face acquired; overlay animates from `lock_started`.
    Locked,
}

/// Notable outcome of advancing the machine by one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngagementEvent {
    /// `Guide` → `Locked`: start rendering the overlay.
    Locked,
    /// `Locked` → `Guide` after sustained tracking loss.
    Reverted,
    /// Sustained close tracking while locked; fire the capture pipeline.
    /// Emitted at most once per session.
    AutoCapture,
}

/// Per-session engagement state. Created when the camera starts, reset when
/// it stops; a single driver mutates it once per frame.
pub struct Engagement {
    thresholds: AlignmentThresholds,
    phase: Phase,
    close_frames: u32,
    disengage_frames: u32,
    miss_count: u32,
    auto_capture_frames: u32,
    has_auto_captured: bool,
    lock_started: Option<Instant>,
    last_landmarks: Option<LandmarkSet>,
}

impl Engagement {
    pub fn new(thresholds: AlignmentThresholds) -> Self {
        Self {
            thresholds,
            phase: Phase::Guide,
            close_frames: 0,
            disengage_frames: 0,
            miss_count: 0,
            auto_capture_frames: 0,
            has_auto_captured: false,
            lock_started: None,
            last_landmarks: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_locked(&self) -> bool {
        self.phase == Phase::Locked
    }

    pub fn has_auto_captured(&self) -> bool {
        self.has_auto_captured
    }

    /// Landmarks for overlay rendering: the most recent detection, retained
    /// across up to [`MAX_MISS_COUNT`] missed frames to avoid flicker.
    pub fn overlay_landmarks(&self) -> Option<&[Landmark]> {
        self.last_landmarks.as_deref()
    }

    /// Time since the overlay locked, driving the animation phase.
    pub fn lock_elapsed(&self, now: Instant) -> Option<Duration> {
        self.lock_started.map(|started| now.duration_since(started))
    }

    /// Guide prompt for the UI status tuple.
    pub fn status_message(&self) -> &'static str {
        match self.phase {
            Phase::Locked if self.has_auto_captured => "Photo captured",
            Phase::Locked => "Hold steady",
            Phase::Guide if self.close_frames > 0 => "Almost there, hold still",
            Phase::Guide => "Center your face in the frame",
        }
    }

    /// Apply one frame's detection outcome. `None` means the provider found
    /// no face (or failed) this frame; `now` is the frame timestamp.
    ///
    /// Frame-ordered: the caller must fully apply frame N before frame N+1.
    pub fn advance(
        &mut self,
        detection: Option<LandmarkSet>,
        now: Instant,
    ) -> Option<EngagementEvent> {
        let verdict = self.observe(detection);
        match self.phase {
            Phase::Guide => self.advance_guide(verdict, now),
            Phase::Locked => self.advance_locked(verdict),
        }
    }

    /// Restore the initial state, including the auto-capture latch. Called
    /// on session start and stop.
    pub fn reset(&mut self) {
        let thresholds = self.thresholds;
        *self = Self::new(thresholds);
    }

    /// Track detection presence and landmark retention; produce this frame's
    /// verdict. A missed frame has no verdict and counts as not close.
    fn observe(&mut self, detection: Option<LandmarkSet>) -> Option<AlignmentVerdict> {
        match detection {
            Some(set) => {
                self.miss_count = 0;
                let verdict = alignment::evaluate(&set, &self.thresholds);
                self.last_landmarks = Some(set);
                Some(verdict)
            }
            None => {
                self.miss_count += 1;
                if self.miss_count > MAX_MISS_COUNT {
                    // Retention window elapsed: stop rendering stale landmarks.
                    self.last_landmarks = None;
                }
                None
            }
        }
    }

    fn advance_guide(
        &mut self,
        verdict: Option<AlignmentVerdict>,
        now: Instant,
    ) -> Option<EngagementEvent> {
        let verdict = verdict.unwrap_or_default();
        if verdict.is_close {
            self.close_frames += 1;
        } else {
            // No partial credit across interruptions.
            self.close_frames = 0;
        }

        if verdict.is_aligned || self.close_frames >= CLOSE_UNLOCK_FRAMES {
            self.close_frames = 0;
            self.disengage_frames = 0;
            self.lock_started = Some(now);
            self.phase = Phase::Locked;
            tracing::debug!(aligned = verdict.is_aligned, "engagement locked");
            return Some(EngagementEvent::Locked);
        }
        None
    }

    fn advance_locked(&mut self, verdict: Option<AlignmentVerdict>) -> Option<EngagementEvent> {
        // A detected-but-far frame and a missed frame count identically
        // toward disengagement; landmark retention only smooths rendering.
        let is_close = verdict.map(|v| v.is_close).unwrap_or(false);

        if is_close {
            self.disengage_frames = 0;
            if !self.has_auto_captured {
                self.auto_capture_frames += 1;
                if self.auto_capture_frames >= AUTO_CAPTURE_FRAMES {
                    self.has_auto_captured = true;
                    tracing::debug!("auto-capture threshold reached");
                    return Some(EngagementEvent::AutoCapture);
                }
            }
            return None;
        }

        self.auto_capture_frames = 0;
        self.disengage_frames += 1;
        if self.disengage_frames > DISENGAGE_FRAME_LIMIT {
            self.revert();
            tracing::debug!("tracking lost, reverted to guide");
            return Some(EngagementEvent::Reverted);
        }
        None
    }

    /// `Locked` → `Guide`: clear every counter and the retained landmarks.
    /// The auto-capture latch survives until the session resets.
    fn revert(&mut self) {
        self.phase = Phase::Guide;
        self.close_frames = 0;
        self.disengage_frames = 0;
        self.miss_count = 0;
        self.auto_capture_frames = 0;
        self.lock_started = None;
        self.last_landmarks = None;
    }
}
