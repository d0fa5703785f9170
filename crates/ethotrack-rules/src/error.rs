//! Error types for the rule-based tagging crate.
//!
//! ## Hierarchy
//!
//! ```text
//! RulesError (top-level)
//! ├── CoreError     (geometry, alignment, arena, video I/O)
//! ├── SignalError   (feature extraction and smoothing)
//! ├── ConfigError   (config validation / file loading)
//! ├── serde_json    (annotation export)
//! └── image         (frame decoding and encoding)
//! ```

use std::path::PathBuf;

use ethotrack_core::CoreError;
use ethotrack_signal::SignalError;
use thiserror::Error;

// ---------------------------------------------------------------------------
// RulesResult
// ---------------------------------------------------------------------------

/// Convenient `Result` alias used by the tagger and batch entry points.
pub type RulesResult<T> = Result<T, RulesError>;

// ---------------------------------------------------------------------------
// RulesError
// ---------------------------------------------------------------------------

/// Top-level error type for arena detection, tagging and rendering.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RulesError {
    /// Error raised by the core types or geometry kernels.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Error raised while computing kinematic features.
    #[error(transparent)]
    Signal(#[from] SignalError),

    /// Configuration rejected before any per-video work.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Image decoding or encoding error.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl RulesError {
    /// Returns the underlying core error, looking through signal errors.
    #[must_use]
    pub fn as_core(&self) -> Option<&CoreError> {
        match self {
            Self::Core(e) | Self::Signal(SignalError::Core(e)) => Some(e),
            _ => None,
        }
    }

    /// Returns `true` if this error only concerns the video being processed.
    ///
    /// A batch reports these and continues with the next video.
    #[must_use]
    pub fn is_video_level(&self) -> bool {
        match self {
            Self::Image(_) => true,
            _ => self.as_core().is_some_and(CoreError::is_video_level),
        }
    }

    /// Returns `true` for errors that signal a programming mistake and must
    /// abort a whole batch.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_))
            || matches!(self.as_core(), Some(CoreError::InputAlignment { .. }))
    }
}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors produced when loading or validating a [`TaggingConfig`].
///
/// [`TaggingConfig`]: crate::config::TaggingConfig
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A field has an invalid value.
    #[error("Invalid value for `{field}`: {reason}")]
    InvalidValue {
        /// Name of the field.
        field: &'static str,
        /// Human-readable reason.
        reason: String,
    },

    /// A configuration file could not be read or written.
    #[error("Cannot access config file `{path}`: {source}")]
    FileRead {
        /// Path that was being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A configuration file contains malformed JSON.
    #[error("Cannot parse config file `{path}`: {source}")]
    ParseError {
        /// Path that was being parsed.
        path: PathBuf,
        /// Underlying JSON parse error.
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    /// Construct a [`ConfigError::InvalidValue`].
    pub fn invalid_value<S: Into<String>>(field: &'static str, reason: S) -> Self {
        ConfigError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

impl From<ConfigError> for CoreError {
    fn from(e: ConfigError) -> Self {
        CoreError::invalid_configuration(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_level_classification() {
        let e = RulesError::from(CoreError::ArenaNotFound { frames_sampled: 10 });
        assert!(e.is_video_level());
        assert!(!e.is_fatal());

        let e = RulesError::from(SignalError::Core(CoreError::video_read(3, "eof")));
        assert!(e.is_video_level());
    }

    #[test]
    fn test_alignment_and_config_are_fatal() {
        let e = RulesError::from(CoreError::input_alignment("huddle", 10, 9));
        assert!(e.is_fatal());
        assert!(!e.is_video_level());

        let e = RulesError::from(ConfigError::invalid_value("climb.tol", "must be > 0"));
        assert!(e.is_fatal());
        assert!(e.to_string().contains("climb.tol"));
    }

    #[test]
    fn test_config_error_maps_to_invalid_configuration() {
        let core: CoreError = ConfigError::invalid_value("fps", "must be > 0").into();
        assert!(matches!(core, CoreError::InvalidConfiguration { .. }));
    }
}
