//! Video access abstractions.
//!
//! Decoding is out of scope for this toolkit, so arena detection and overlay
//! rendering talk to videos through these traits only.
//!
//! # Traits
//!
//! - [`VideoSource`]: a re-openable handle on one video
//! - [`FrameReader`]: a sequential, forward-only reader over decoded frames
//! - [`FrameWriter`]: a sink for annotated frames
//!
//! Readers and writers are scoped resources. They are acquired right before
//! use and release the underlying handle when dropped, so every exit path
//! (including `?` propagation) closes the video.

use image::RgbImage;

use crate::error::CoreResult;
use crate::types::FrameSize;

/// A video that can be opened for sequential reading any number of times.
pub trait VideoSource: Send + Sync {
    /// Human-readable name used in logs and batch reports.
    fn name(&self) -> &str;

    /// Opens a fresh reader positioned at the first frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying resource cannot be opened.
    fn open(&self) -> CoreResult<Box<dyn FrameReader + '_>>;
}

/// Sequential frame reader. No random seek is assumed.
pub trait FrameReader {
    /// Pixel dimensions of every frame.
    fn frame_size(&self) -> FrameSize;

    /// Nominal frame rate in frames per second.
    fn frame_rate(&self) -> f64;

    /// Decodes the next frame.
    ///
    /// Returns `Ok(None)` at the end of the stream.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::VideoRead`] when a frame fails to decode.
    fn read_frame(&mut self) -> CoreResult<Option<RgbImage>>;
}

/// Sink for rendered frames.
pub trait FrameWriter {
    /// Appends one frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame cannot be written.
    fn write_frame(&mut self, frame: &RgbImage) -> CoreResult<()>;

    /// Flushes and closes the output.
    ///
    /// # Errors
    ///
    /// Returns an error if the output cannot be finalized.
    fn finish(&mut self) -> CoreResult<()> {
        Ok(())
    }
}
