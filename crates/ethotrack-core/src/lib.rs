//! # Ethotrack Core
//!
//! Core types, geometry primitives and video abstractions for rule-based
//! behavioral tagging of animal pose trajectories.
//!
//! This crate provides the foundational building blocks used throughout the
//! ethotrack workspace, including:
//!
//! - **Core Data Types**: [`CoordinateTable`], [`FrameTable`],
//!   [`ArenaDescriptor`] and [`AnnotationTable`] for representing body-part
//!   trajectories, derived features, arena geometry and tagging output.
//!
//! - **Error Types**: a single [`CoreError`] classifying structural input
//!   problems, video-level failures and configuration errors.
//!
//! - **Geometry**: the stateless kernels in [`geometry`] (distance, angle,
//!   rotation, polar conversion, polygon area).
//!
//! - **Traits**: [`VideoSource`], [`FrameReader`] and [`FrameWriter`], the
//!   contracts for sequential video access.
//!
//! ## Feature Flags
//!
//! - `serde` (default): serialization of arena descriptors and annotation
//!   tables
//!
//! ## Example
//!
//! ```rust
//! use ethotrack_core::{geometry, CoordinateTable, PartKey, RealScale};
//! use ndarray::array;
//!
//! let mut table = CoordinateTable::new(2);
//! table.insert(PartKey::new("Nose"), array![[0.0, 0.0], [3.0, 4.0]]).unwrap();
//! table.insert(PartKey::new("Tail_base"), array![[0.0, 0.0], [0.0, 0.0]]).unwrap();
//!
//! let d = geometry::distance(
//!     table.require(&PartKey::new("Nose")).unwrap(),
//!     table.require(&PartKey::new("Tail_base")).unwrap(),
//!     RealScale::identity(),
//! )
//! .unwrap();
//! assert_eq!(d[1], 5.0);
//! ```

#![deny(unsafe_code)]

pub mod error;
pub mod geometry;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types at the crate root
pub use error::{CoreError, CoreResult};
pub use traits::{FrameReader, FrameWriter, VideoSource};
pub use types::{
    // Identifiers
    AnimalId, PartKey, PartPair, PartTriplet, PolarComponent, PolarKey,
    // Trajectories
    CoordinateTable, Point2,
    // Derived tables
    AngleTable, DistanceTable, FrameTable, PolarTable, SpeedTable,
    // Arena
    ArenaDescriptor, ArenaGeometry, FrameSize, RealScale,
    // Output
    AnnotationColumn, AnnotationTable,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Physical diameter in millimeters assumed when none is configured
pub const DEFAULT_ARENA_DIAMETER_MM: f64 = 380.0;

/// Nominal frame rate assumed when a source does not report one
pub const DEFAULT_FRAME_RATE: f64 = 24.0;

/// Prelude module for convenient imports.
///
/// ```rust
/// use ethotrack_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{CoreError, CoreResult};
    pub use crate::geometry;
    pub use crate::traits::{FrameReader, FrameWriter, VideoSource};
    pub use crate::types::{
        AngleTable, AnimalId, AnnotationColumn, AnnotationTable, ArenaDescriptor, ArenaGeometry,
        CoordinateTable, DistanceTable, FrameSize, FrameTable, PartKey, PartPair, PartTriplet,
        Point2, PolarTable, RealScale, SpeedTable,
    };
}
