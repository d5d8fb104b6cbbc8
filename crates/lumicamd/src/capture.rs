//! Capture pipeline — rasterize the current frame into a PNG artifact.
//!
//! Frames are mirrored horizontally before encoding so the saved photo
//! matches the user's self-view. Filenames carry a UTC timestamp plus a
//! UUID so concurrent kiosks can never collide.

use std::io::Cursor;

use chrono::Utc;
use image::{DynamicImage, ImageFormat, RgbImage};
use lumicam_video::Frame;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("frame dimensions do not match pixel data")]
    MalformedFrame,
    #[error("png encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// What initiated a capture; carried into upload metadata and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureTrigger {
    /// Fired by the engagement machine after sustained alignment.
    Auto,
    /// Explicit user action.
    Manual,
}

impl CaptureTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureTrigger::Auto => "auto",
            CaptureTrigger::Manual => "manual",
        }
    }
}

/// A finished capture, ready for the persistence and upload sinks.
pub struct CaptureArtifact {
    /// PNG-encoded image bytes.
    pub bytes: Vec<u8>,
    pub filename: String,
    pub timestamp_ms: i64,
    pub width: u32,
    pub height: u32,
}

/// Snapshot a frame: mirror, PNG-encode, and stamp a filename.
pub fn capture_frame(frame: &Frame) -> Result<CaptureArtifact, CaptureError> {
    let mirrored = frame.mirror_horizontal();
    let (width, height) = (mirrored.width, mirrored.height);

    let img = RgbImage::from_raw(width, height, mirrored.data)
        .ok_or(CaptureError::MalformedFrame)?;

    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;

    let now = Utc::now();
    let filename = format!(
        "face-{}-{}.png",
        now.format("%Y%m%dT%H%M%S%.3fZ"),
        Uuid::new_v4()
    );

    Ok(CaptureArtifact {
        bytes,
        filename,
        timestamp_ms: now.timestamp_millis(),
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumicam_video::{TestPatternSource, VideoSource};

    fn frame() -> Frame {
        TestPatternSource::new(32, 24).grab().unwrap().unwrap()
    }

    #[test]
    fn test_artifact_preserves_dimensions() {
        let artifact = capture_frame(&frame()).unwrap();
        assert_eq!(artifact.width, 32);
        assert_eq!(artifact.height, 24);

        let decoded = image::load_from_memory(&artifact.bytes).unwrap();
        assert_eq!(decoded.width(), 32);
        assert_eq!(decoded.height(), 24);
    }

    #[test]
    fn test_artifact_is_mirrored() {
        let source = frame();
        let artifact = capture_frame(&source).unwrap();
        let decoded = image::load_from_memory(&artifact.bytes).unwrap().to_rgb8();

        for y in 0..source.height {
            for x in 0..source.width {
                assert_eq!(
                    decoded.get_pixel(x, y).0,
                    source.pixel(source.width - 1 - x, y),
                    "pixel ({x}, {y})"
                );
            }
        }
    }

    #[test]
    fn test_filenames_do_not_collide() {
        let frame = frame();
        let a = capture_frame(&frame).unwrap();
        let b = capture_frame(&frame).unwrap();
        assert_ne!(a.filename, b.filename);
        assert!(a.filename.starts_with("face-"));
        assert!(a.filename.ends_with(".png"));
    }
}
