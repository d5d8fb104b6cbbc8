//! lumicam-video — Video frame abstraction for the capture session.
//!
//! Provides the RGB `Frame` type with the pixel operations the capture
//! pipeline needs, and the `VideoSource` seam behind which the actual
//! camera (or a synthetic pattern generator) lives.

pub mod frame;
pub mod source;

pub use frame::{Frame, FrameError};
pub use source::{SourceError, TestPatternSource, VideoSource};
