//! Error types for the ethotrack toolkit.
//!
//! This module provides the error type shared by every layer of the tagging
//! pipeline, built with [`thiserror`] for `Display` and `Error` impls.
//!
//! # Error classes
//!
//! - Structural input problems ([`CoreError::ShapeMismatch`],
//!   [`CoreError::InputAlignment`], [`CoreError::MissingBodyPart`]) are fatal
//!   to the computation that raised them and are never retried.
//! - Video-level failures ([`CoreError::ArenaNotFound`],
//!   [`CoreError::VideoRead`]) skip the affected video in a batch.
//! - [`CoreError::InvalidConfiguration`] is raised before any per-video work.
//!
//! # Example
//!
//! ```rust
//! use ethotrack_core::error::CoreError;
//!
//! fn check(frames_a: usize, frames_b: usize) -> Result<(), CoreError> {
//!     if frames_a != frames_b {
//!         return Err(CoreError::shape_mismatch("distance", frames_a, frames_b));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check(10, 12).is_err());
//! ```

use thiserror::Error;

/// A specialized `Result` type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Top-level error type for the ethotrack toolkit.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CoreError {
    /// Mismatched sequence lengths or point dimensions in a geometry operation
    #[error("Shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Operation that detected the mismatch
        context: String,
        /// Expected length or dimension
        expected: usize,
        /// Actual length or dimension
        actual: usize,
    },

    /// Detector inputs that are not frame-aligned
    #[error("Input alignment error in {context}: expected {expected} frames, got {actual}")]
    InputAlignment {
        /// Detector or stage that received the inputs
        context: String,
        /// Frame count of the reference input
        expected: usize,
        /// Frame count of the misaligned input
        actual: usize,
    },

    /// No arena boundary found in any sampled frame
    #[error("No arena detected in {frames_sampled} sampled frames")]
    ArenaNotFound {
        /// Number of frames inspected before giving up
        frames_sampled: usize,
    },

    /// Decode failure while reading a video
    #[error("Video read error at frame {frame}: {reason}")]
    VideoRead {
        /// Index of the frame that failed to decode
        frame: usize,
        /// Description of the failure
        reason: String,
    },

    /// Configuration rejected before any work started
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration {
        /// Description of the configuration error
        message: String,
    },

    /// A body part required by an operation is not tracked
    #[error("Missing body part: {part}")]
    MissingBodyPart {
        /// Fully qualified body part name
        part: String,
    },

    /// Validation error for input data
    #[error("Validation error: {message}")]
    Validation {
        /// Description of what validation failed
        message: String,
    },

    /// Underlying I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Creates a new shape mismatch error.
    #[must_use]
    pub fn shape_mismatch(context: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::ShapeMismatch {
            context: context.into(),
            expected,
            actual,
        }
    }

    /// Creates a new input alignment error.
    #[must_use]
    pub fn input_alignment(context: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::InputAlignment {
            context: context.into(),
            expected,
            actual,
        }
    }

    /// Creates a new video read error.
    #[must_use]
    pub fn video_read(frame: usize, reason: impl Into<String>) -> Self {
        Self::VideoRead {
            frame,
            reason: reason.into(),
        }
    }

    /// Creates a new configuration error.
    #[must_use]
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Creates a new missing body part error.
    #[must_use]
    pub fn missing_body_part(part: impl Into<String>) -> Self {
        Self::MissingBodyPart { part: part.into() }
    }

    /// Creates a new validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Returns `true` if partial results survive this error.
    ///
    /// Only mid-stream decode failures qualify: whatever was accumulated
    /// before the failing frame is still valid.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::VideoRead { .. })
    }

    /// Returns `true` if this error is scoped to a single video.
    ///
    /// Batch processing reports these and moves on to the next video.
    #[must_use]
    pub fn is_video_level(&self) -> bool {
        matches!(
            self,
            Self::ArenaNotFound { .. } | Self::VideoRead { .. } | Self::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::shape_mismatch("distance", 100, 99);
        assert_eq!(
            err.to_string(),
            "Shape mismatch in distance: expected 100, got 99"
        );

        let err = CoreError::ArenaNotFound { frames_sampled: 10 };
        assert!(err.to_string().contains("10 sampled frames"));
    }

    #[test]
    fn test_error_classification() {
        assert!(CoreError::video_read(12, "truncated").is_recoverable());
        assert!(CoreError::video_read(12, "truncated").is_video_level());
        assert!(CoreError::ArenaNotFound { frames_sampled: 5 }.is_video_level());
        assert!(!CoreError::ArenaNotFound { frames_sampled: 5 }.is_recoverable());
        assert!(!CoreError::input_alignment("huddle", 10, 9).is_video_level());
        assert!(!CoreError::invalid_configuration("bad").is_recoverable());
    }
}
