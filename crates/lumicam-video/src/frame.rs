//! Frame type and pixel operations — validation and horizontal mirroring.

use std::time::Instant;

const BYTES_PER_PIXEL: usize = 3; // packed RGB8

/// A captured RGB camera frame.
#[derive(Clone)]
pub struct Frame {
    /// Packed RGB8 pixel data (width * height * 3 bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Instant,
    pub sequence: u64,
}

impl Frame {
    /// Build a frame from raw RGB data, validating the buffer length.
    pub fn from_rgb(
        data: Vec<u8>,
        width: u32,
        height: u32,
        sequence: u64,
    ) -> Result<Self, FrameError> {
        let expected = width as usize * height as usize * BYTES_PER_PIXEL;
        if data.len() != expected {
            return Err(FrameError::InvalidLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            timestamp: Instant::now(),
            sequence,
        })
    }

    /// RGB pixel at (x, y). Panics on out-of-range coordinates.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let idx = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }

    /// Mirror the frame horizontally, matching the user's self-view.
    ///
    /// The pixel at column x lands at column width-1-x; dimensions are
    /// unchanged.
    pub fn mirror_horizontal(&self) -> Frame {
        let w = self.width as usize;
        let h = self.height as usize;
        let mut data = vec![0u8; self.data.len()];

        for y in 0..h {
            let row = y * w * BYTES_PER_PIXEL;
            for x in 0..w {
                let src = row + x * BYTES_PER_PIXEL;
                let dst = row + (w - 1 - x) * BYTES_PER_PIXEL;
                data[dst..dst + BYTES_PER_PIXEL]
                    .copy_from_slice(&self.data[src..src + BYTES_PER_PIXEL]);
            }
        }

        Frame {
            data,
            width: self.width,
            height: self.height,
            timestamp: self.timestamp,
            sequence: self.sequence,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid RGB length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}
