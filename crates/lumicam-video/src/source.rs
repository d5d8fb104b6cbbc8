//! Pluggable video source seam.

use crate::frame::Frame;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("video source disconnected: {0}")]
    Disconnected(String),
    #[error("capture failed: {0}")]
    CaptureFailed(String),
}

/// Pull-based frame supply for the session driver.
///
/// `grab` returns `Ok(None)` while the source is warming up or has no new
/// frame; the driver skips that tick and tries again. Errors mid-session are
/// logged and skipped by the driver; they are fatal only at session start.
pub trait VideoSource: Send {
    fn grab(&mut self) -> Result<Option<Frame>, SourceError>;
    fn width(&self) -> u32;
    fn height(&self) -> u32;
}

/// Synthetic gradient source for diagnostics and tests.
///
/// Produces a scrolling RGB gradient so consecutive frames differ and
/// mirroring/encoding defects are visible. Optionally simulates a warmup
/// period of not-ready ticks, as real cameras exhibit during AGC/AE
/// stabilization.
pub struct TestPatternSource {
    width: u32,
    height: u32,
    sequence: u64,
    warmup_remaining: u32,
}

impl TestPatternSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            sequence: 0,
            warmup_remaining: 0,
        }
    }

    /// Report "not ready" for the first `ticks` grabs.
    pub fn with_warmup(mut self, ticks: u32) -> Self {
        self.warmup_remaining = ticks;
        self
    }
}

impl VideoSource for TestPatternSource {
    fn grab(&mut self) -> Result<Option<Frame>, SourceError> {
        if self.warmup_remaining > 0 {
            self.warmup_remaining -= 1;
            tracing::trace!(remaining = self.warmup_remaining, "test pattern warming up");
            return Ok(None);
        }

        let shift = self.sequence as u32;
        let mut data = Vec::with_capacity((self.width * self.height * 3) as usize);
        for y in 0..self.height {
            for x in 0..self.width {
                data.push((x.wrapping_add(shift) & 0xff) as u8);
                data.push((y & 0xff) as u8);
                data.push(((x ^ y) & 0xff) as u8);
            }
        }

        let frame = Frame::from_rgb(data, self.width, self.height, self.sequence)
            .map_err(|e| SourceError::CaptureFailed(e.to_string()))?;
        self.sequence += 1;
        Ok(Some(frame))
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_source_produces_frames() {
        let mut source = TestPatternSource::new(16, 8);
        let a = source.grab().unwrap().expect("frame");
        let b = source.grab().unwrap().expect("frame");
        assert_eq!(a.width, 16);
        assert_eq!(a.height, 8);
        assert_eq!(a.sequence, 0);
        assert_eq!(b.sequence, 1);
        assert_ne!(a.data, b.data, "pattern must scroll between frames");
    }

    #[test]
    fn test_warmup_reports_not_ready() {
        let mut source = TestPatternSource::new(4, 4).with_warmup(2);
        assert!(source.grab().unwrap().is_none());
        assert!(source.grab().unwrap().is_none());
        assert!(source.grab().unwrap().is_some());
    }
}
