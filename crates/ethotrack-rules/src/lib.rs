//! Ethotrack Rule-Based Tagging
//!
//! Frame-by-frame behavioral tagging of pose-tracked rodents from geometric
//! rules: distances between body parts, body-part speeds and the animal's
//! position relative to the arena wall.
//!
//! # Features
//!
//! - **Arena detection**: Otsu binarization, contour extraction and a circle
//!   or ellipse fit, median-combined across sampled frames
//! - **Detectors**: single and double contact, wall climbing and sniffing,
//!   huddling, digging, looking around and path following
//! - **Tagging**: a per-video stage machine from arena detection to an
//!   annotation table with one row per tracked frame
//! - **Overlay**: arena outline, body-part markers, trait swatches and a
//!   speed bar drawn onto the source frames
//! - **Batch**: rayon fan-out over many videos with per-video failure
//!   markers
//!
//! # Example
//!
//! ```rust,no_run
//! use ethotrack_core::{ArenaDescriptor, ArenaGeometry, CoordinateTable, FrameSize, Point2};
//! use ethotrack_rules::{RuleBasedTagger, TaggingConfig, VideoContext};
//!
//! # fn load() -> CoordinateTable { CoordinateTable::new(0) }
//! let arena = ArenaDescriptor::new(
//!     ArenaGeometry::Circle { center: Point2::new(320.0, 240.0), radius: 200.0 },
//!     FrameSize::new(640, 480),
//! );
//! let tagger = RuleBasedTagger::new(TaggingConfig::with_animals(["B", "W"]))?;
//! let mut video = VideoContext::new("session_01", load()).with_arena(arena);
//! let table = tagger.tag(&mut video)?;
//! println!("{}", table.to_json_string()?);
//! # Ok::<(), ethotrack_rules::RulesError>(())
//! ```

pub mod arena;
pub mod batch;
pub mod config;
pub mod context;
pub mod detectors;
pub mod error;
pub mod overlay;
pub mod summary;
pub mod tagger;
pub mod video;

// Re-export main types for convenience
pub use arena::{fit_circle, fit_ellipse, ArenaDetector};
pub use batch::{BatchReport, BatchTagger, VideoOutcome};
pub use config::{
    ArenaConfig, ArenaShape, BodyPartRoles, ClimbConfig, ContactConfig, ExplorationConfig,
    FollowConfig, HuddleConfig, OverlayConfig, SniffConfig, TaggingConfig, WindowConfig,
};
pub use context::{context_for, BehaviorContext, MultiAnimalContext, SingleAnimalContext};
pub use error::{ConfigError, RulesError, RulesResult};
pub use overlay::OverlayRenderer;
pub use summary::{dominant_trait, trait_durations, trait_proportions, trait_transitions};
pub use tagger::{
    RenderStop, RenderSummary, RuleBasedTagger, TaggingStage, TraitColumns, VideoContext,
    VideoFeatures,
};
pub use video::{FrameCollector, ImageSequence, ImageSequenceWriter, InMemoryVideo};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::batch::{BatchReport, BatchTagger, VideoOutcome};
    pub use crate::config::TaggingConfig;
    pub use crate::context::BehaviorContext;
    pub use crate::error::{RulesError, RulesResult};
    pub use crate::tagger::{RuleBasedTagger, TaggingStage, VideoContext};
    pub use crate::video::{ImageSequence, ImageSequenceWriter};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_default_tagger_builds() {
        let tagger = RuleBasedTagger::new(TaggingConfig::default()).unwrap();
        assert_eq!(tagger.behavior_context().subjects(), vec![None]);
    }
}
