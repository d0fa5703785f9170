//! Ethotrack Signal Processing Library
//!
//! This crate turns raw body-part trajectories into the per-frame features
//! the rule-based detectors consume, and summarizes categorical label
//! sequences produced downstream.
//!
//! # Features
//!
//! - **Smoothing**: single-frame flicker removal for Boolean detections,
//!   exponential and moving-average trajectory smoothing
//! - **Windows**: sliding-window reshaping and per-window trajectory alignment
//! - **Kinematics**: pairwise distances, triplet angles, polar coordinates,
//!   polygon areas and rolling speed of any derivative order
//! - **Sequences**: transition matrices, lag-1 autocorrelation, transition
//!   graphs and bout filtering over cluster label sequences
//!
//! # Example
//!
//! ```rust
//! use ethotrack_signal::{smooth_boolean_run, KinematicsConfig};
//!
//! assert_eq!(
//!     smooth_boolean_run(&[true, false, true]),
//!     vec![true, true, true]
//! );
//!
//! let config = KinematicsConfig::builder()
//!     .speed_window(5)
//!     .rounding(3)
//!     .build();
//! assert_eq!(config.speed_window, 5);
//! ```

pub mod kinematics;
pub mod sequence;
pub mod smoothing;
pub mod windows;

use ethotrack_core::CoreError;

// Re-export main types for convenience
pub use kinematics::{FeatureExtractor, KinematicsConfig, KinematicsConfigBuilder};
pub use sequence::{
    autocorrelation, bout_lengths, filter_short_bouts, ClusterSequenceAnalyzer, LabelEncoder,
    Normalization, TransitionEdge, TransitionGraph, TransitionMatrix,
};
pub use smoothing::{exponential_smooth, smooth_boolean_run, smooth_trajectories, TrajectorySmoothing};
pub use windows::{align_trajectories, rolling_window, rolling_window_views, AlignAxis};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common result type for signal processing operations
pub type Result<T> = std::result::Result<T, SignalError>;

/// Unified error type for signal processing operations
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SignalError {
    /// Error raised by a core table or geometry operation
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Parameter outside its valid range
    #[error("Invalid parameter {param}: {reason}")]
    InvalidParameter {
        /// Parameter name
        param: &'static str,
        /// Why the value was rejected
        reason: String,
    },

    /// Sequence too short for the requested window
    #[error("Insufficient frames: need at least {needed}, got {available}")]
    InsufficientFrames {
        /// Minimum number of frames required
        needed: usize,
        /// Number of frames provided
        available: usize,
    },

    /// Label outside the declared state space
    #[error("Label {label} out of range for {n_states} states")]
    InvalidLabel {
        /// Offending label
        label: usize,
        /// Declared number of states
        n_states: usize,
    },
}

impl SignalError {
    /// Creates a new invalid parameter error.
    #[must_use]
    pub fn invalid_parameter(param: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            param,
            reason: reason.into(),
        }
    }
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::kinematics::{FeatureExtractor, KinematicsConfig};
    pub use crate::sequence::{ClusterSequenceAnalyzer, Normalization, TransitionMatrix};
    pub use crate::smoothing::{exponential_smooth, smooth_boolean_run};
    pub use crate::windows::rolling_window;
    pub use crate::{Result, SignalError};
}
