//! Tagging configuration.
//!
//! [`TaggingConfig`] gathers every threshold, window and role mapping the
//! tagger consumes. It is serializable via [`serde`] so experiments can keep
//! their settings next to the annotation output.
//!
//! Distance tolerances are in millimeters after arena scaling and speed
//! tolerances are in millimeters per frame.
//!
//! # Example
//!
//! ```rust
//! use ethotrack_rules::config::TaggingConfig;
//!
//! let cfg = TaggingConfig::default();
//! cfg.validate().expect("default config is valid");
//!
//! assert_eq!(cfg.contact.close_tol, 35.0);
//! assert_eq!(cfg.follow.frames, 10);
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use ethotrack_core::{AnimalId, DEFAULT_ARENA_DIAMETER_MM, DEFAULT_FRAME_RATE};
use ethotrack_signal::{KinematicsConfig, TrajectorySmoothing};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// TaggingConfig
// ---------------------------------------------------------------------------

/// Complete configuration for rule-based tagging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaggingConfig {
    /// Arena recognition settings
    pub arena: ArenaConfig,

    /// Nose-to-nose, nose-to-tail, nose-to-body and side contacts
    pub contact: ContactConfig,

    /// Wall climbing
    pub climb: ClimbConfig,

    /// Wall sniffing
    pub sniff: SniffConfig,

    /// Huddling posture
    pub huddle: HuddleConfig,

    /// Path following
    pub follow: FollowConfig,

    /// Digging and looking around
    pub exploration: ExplorationConfig,

    /// Speed computation
    pub kinematics: KinematicsConfig,

    /// Trajectory smoothing applied before feature extraction
    pub smoothing: TrajectorySmoothing,

    /// Sliding windows used for trait summaries
    pub window: WindowConfig,

    /// Overlay rendering
    pub overlay: OverlayConfig,

    /// Animal identifiers. Empty for single-animal experiments.
    pub animal_ids: Vec<AnimalId>,

    /// Body-part names playing each anatomical role
    pub roles: BodyPartRoles,

    /// Frame rate of the recordings. Default: **24**.
    pub fps: f64,
}

impl Default for TaggingConfig {
    fn default() -> Self {
        Self {
            arena: ArenaConfig::default(),
            contact: ContactConfig::default(),
            climb: ClimbConfig::default(),
            sniff: SniffConfig::default(),
            huddle: HuddleConfig::default(),
            follow: FollowConfig::default(),
            exploration: ExplorationConfig::default(),
            kinematics: KinematicsConfig::default(),
            smoothing: TrajectorySmoothing::None,
            window: WindowConfig::default(),
            overlay: OverlayConfig::default(),
            animal_ids: Vec::new(),
            roles: BodyPartRoles::default(),
            fps: DEFAULT_FRAME_RATE,
        }
    }
}

impl TaggingConfig {
    /// Configuration for a multi-animal experiment with default thresholds.
    #[must_use]
    pub fn with_animals<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            animal_ids: ids.into_iter().map(AnimalId::new).collect(),
            ..Self::default()
        }
    }

    /// Load and validate a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileRead`] if the file cannot be opened,
    /// [`ConfigError::ParseError`] if the JSON is malformed and
    /// [`ConfigError::InvalidValue`] if a field fails validation.
    pub fn from_json(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: TaggingConfig =
            serde_json::from_str(&contents).map_err(|source| ConfigError::ParseError {
                path: path.to_path_buf(),
                source,
            })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Save the configuration to a JSON file, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileRead`] if the directory cannot be created or
    /// the file cannot be written.
    pub fn to_json(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::FileRead {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::invalid_value("(serialization)", e.to_string()))?;
        std::fs::write(path, json).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    /// Checks every section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.arena.validate()?;

        positive("contact.close_tol", self.contact.close_tol)?;
        positive("contact.side_tol", self.contact.side_tol)?;
        positive("climb.tol", self.climb.tol)?;
        positive("sniff.tol", self.sniff.tol)?;
        positive("sniff.speed_tol", self.sniff.speed_tol)?;
        positive("huddle.forward_tol", self.huddle.forward_tol)?;
        positive("huddle.spine_tol", self.huddle.spine_tol)?;
        positive("huddle.speed_tol", self.huddle.speed_tol)?;
        positive("follow.tol", self.follow.tol)?;
        if self.follow.frames == 0 {
            return Err(ConfigError::invalid_value("follow.frames", "must be > 0"));
        }
        positive("exploration.speed_tol", self.exploration.speed_tol)?;
        if !(0.0..=1.0).contains(&self.exploration.nose_likelihood) {
            return Err(ConfigError::invalid_value(
                "exploration.nose_likelihood",
                format!("must be in [0, 1], got {}", self.exploration.nose_likelihood),
            ));
        }

        self.kinematics
            .validate()
            .map_err(|e| ConfigError::invalid_value("kinematics", e.to_string()))?;
        match self.smoothing {
            TrajectorySmoothing::Exponential { alpha } if !(0.0..=1.0).contains(&alpha) => {
                return Err(ConfigError::invalid_value(
                    "smoothing.alpha",
                    format!("must be in [0, 1], got {alpha}"),
                ));
            }
            TrajectorySmoothing::MovingAverage { window: 0 } => {
                return Err(ConfigError::invalid_value("smoothing.window", "must be > 0"));
            }
            _ => {}
        }

        if self.window.size == 0 {
            return Err(ConfigError::invalid_value("window.size", "must be > 0"));
        }
        if self.window.step == 0 {
            return Err(ConfigError::invalid_value("window.step", "must be > 0"));
        }
        if self.overlay.speed_pause == 0 {
            return Err(ConfigError::invalid_value("overlay.speed_pause", "must be > 0"));
        }

        let mut seen = BTreeSet::new();
        for id in &self.animal_ids {
            if id.as_str().is_empty() {
                return Err(ConfigError::invalid_value("animal_ids", "empty identifier"));
            }
            if !seen.insert(id) {
                return Err(ConfigError::invalid_value(
                    "animal_ids",
                    format!("duplicate identifier `{id}`"),
                ));
            }
        }

        self.roles.validate()?;
        positive("fps", self.fps)?;
        Ok(())
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid_value(field, format!("must be > 0, got {value}")))
    }
}

// ---------------------------------------------------------------------------
// Arena
// ---------------------------------------------------------------------------

/// Shape fitted to the arena boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArenaShape {
    /// Least-squares circle
    #[default]
    Circular,
    /// Ellipse from contour moments
    Elliptical,
}

/// Arena recognition settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Shape to fit. Default: **circular**.
    pub shape: ArenaShape,

    /// Physical arena diameter in millimeters. Default: **380**.
    pub diameter_mm: f64,

    /// Leading frames inspected before giving up. Default: **10**.
    pub sample_frames: usize,

    /// Fixed binarization level; `None` picks one with Otsu's method.
    pub threshold: Option<u8>,

    /// Treat dark pixels as the arena floor.
    pub invert: bool,

    /// Radius of the median filter applied after thresholding. Default: **2**.
    pub median_radius: u32,

    /// Smallest plausible radius as a fraction of the shorter frame side.
    pub min_radius_fraction: f64,

    /// Largest plausible radius as a fraction of the shorter frame side.
    pub max_radius_fraction: f64,

    /// Contours with fewer points are ignored. Default: **20**.
    pub min_contour_points: usize,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            shape: ArenaShape::Circular,
            diameter_mm: DEFAULT_ARENA_DIAMETER_MM,
            sample_frames: 10,
            threshold: None,
            invert: false,
            median_radius: 2,
            min_radius_fraction: 0.2,
            max_radius_fraction: 0.6,
            min_contour_points: 20,
        }
    }
}

impl ArenaConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        positive("arena.diameter_mm", self.diameter_mm)?;
        if self.sample_frames == 0 {
            return Err(ConfigError::invalid_value("arena.sample_frames", "must be > 0"));
        }
        positive("arena.min_radius_fraction", self.min_radius_fraction)?;
        if self.max_radius_fraction <= self.min_radius_fraction {
            return Err(ConfigError::invalid_value(
                "arena.max_radius_fraction",
                "must exceed min_radius_fraction",
            ));
        }
        if self.min_contour_points < 5 {
            return Err(ConfigError::invalid_value("arena.min_contour_points", "must be >= 5"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Detector sections
// ---------------------------------------------------------------------------

/// Proximity contact thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactConfig {
    /// Nose-to-nose, nose-to-tail and nose-to-body tolerance. Default: **35**.
    pub close_tol: f64,
    /// Side-by-side tolerance. Default: **80**.
    pub side_tol: f64,
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            close_tol: 35.0,
            side_tol: 80.0,
        }
    }
}

/// Wall climbing threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClimbConfig {
    /// Nose distance inside the boundary that still counts. Default: **10**.
    pub tol: f64,
}

impl Default for ClimbConfig {
    fn default() -> Self {
        Self { tol: 10.0 }
    }
}

/// Wall sniffing thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SniffConfig {
    /// Half-width of the ring around the boundary. Default: **10**.
    pub tol: f64,
    /// Center speed must stay below this. Default: **2**.
    pub speed_tol: f64,
}

impl Default for SniffConfig {
    fn default() -> Self {
        Self {
            tol: 10.0,
            speed_tol: 2.0,
        }
    }
}

/// Huddling thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HuddleConfig {
    /// Ear-to-forepaw distance on both sides. Default: **15**.
    pub forward_tol: f64,
    /// Mean spine segment length. Default: **25**.
    pub spine_tol: f64,
    /// Center speed. Default: **2**.
    pub speed_tol: f64,
}

impl Default for HuddleConfig {
    fn default() -> Self {
        Self {
            forward_tol: 15.0,
            spine_tol: 25.0,
            speed_tol: 2.0,
        }
    }
}

/// Path-following thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowConfig {
    /// Trailing window in frames. Default: **10**.
    pub frames: usize,
    /// Nose to recent tail-base distance. Default: **5**.
    pub tol: f64,
}

impl Default for FollowConfig {
    fn default() -> Self {
        Self {
            frames: 10,
            tol: 5.0,
        }
    }
}

/// Digging and look-around thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorationConfig {
    /// Center speed. Default: **2**.
    pub speed_tol: f64,
    /// Nose likelihood separating a hidden from a visible nose. Default: **0.85**.
    pub nose_likelihood: f64,
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self {
            speed_tol: 2.0,
            nose_likelihood: 0.85,
        }
    }
}

/// Sliding-window size and step in frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window length. Default: **24**.
    pub size: usize,
    /// Distance between window starts. Default: **1**.
    pub step: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { size: 24, step: 1 }
    }
}

/// Overlay rendering settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Stop after this many frames; `None` renders the whole table.
    pub frame_limit: Option<usize>,
    /// Frames between speed bar refreshes. Default: **5**.
    pub speed_pause: usize,
    /// Draw tracked body parts.
    pub draw_parts: bool,
    /// Draw the arena outline.
    pub draw_arena: bool,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            frame_limit: None,
            speed_pause: 5,
            draw_parts: true,
            draw_arena: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Body-part roles
// ---------------------------------------------------------------------------

/// Body-part names playing each anatomical role.
///
/// The detectors never refer to a part by a literal name, so any labelling
/// scheme can be tagged by remapping these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyPartRoles {
    /// Tip of the snout
    pub nose: String,
    /// Base of the tail
    pub tail_base: String,
    /// Body center
    pub center: String,
    /// Left ear
    pub left_ear: String,
    /// Right ear
    pub right_ear: String,
    /// Left forepaw
    pub left_forepaw: String,
    /// Right forepaw
    pub right_forepaw: String,
    /// Consecutive parts along the spine; each neighbor pair is a segment
    pub spine: Vec<String>,
    /// Targets of nose-to-body contacts; untracked names are skipped
    pub main_body: Vec<String>,
    /// Parts whose median speed forms the animal's speed; untracked names are skipped
    pub speed_parts: Vec<String>,
}

impl Default for BodyPartRoles {
    fn default() -> Self {
        let names = |list: &[&str]| list.iter().map(|s| (*s).to_string()).collect::<Vec<_>>();
        Self {
            nose: "Nose".into(),
            tail_base: "Tail_base".into(),
            center: "Center".into(),
            left_ear: "Left_ear".into(),
            right_ear: "Right_ear".into(),
            left_forepaw: "Left_fhip".into(),
            right_forepaw: "Right_fhip".into(),
            spine: names(&["Spine_1", "Center", "Spine_2", "Tail_base"]),
            main_body: names(&[
                "Left_ear", "Right_ear", "Spine_1", "Center", "Spine_2", "Left_fhip",
                "Right_fhip", "Left_bhip", "Right_bhip",
            ]),
            speed_parts: names(&[
                "Center", "Spine_1", "Spine_2", "Nose", "Left_ear", "Right_ear", "Left_fhip",
                "Right_fhip", "Left_bhip", "Right_bhip", "Tail_base",
            ]),
        }
    }
}

impl BodyPartRoles {
    /// Consecutive spine segments as `(from, to)` name pairs.
    pub fn spine_segments(&self) -> impl Iterator<Item = (&str, &str)> {
        self.spine
            .windows(2)
            .map(|w| (w[0].as_str(), w[1].as_str()))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let singles = [
            ("roles.nose", &self.nose),
            ("roles.tail_base", &self.tail_base),
            ("roles.center", &self.center),
            ("roles.left_ear", &self.left_ear),
            ("roles.right_ear", &self.right_ear),
            ("roles.left_forepaw", &self.left_forepaw),
            ("roles.right_forepaw", &self.right_forepaw),
        ];
        for (field, name) in singles {
            if name.is_empty() {
                return Err(ConfigError::invalid_value(field, "must not be empty"));
            }
        }
        if self.spine.len() < 2 {
            return Err(ConfigError::invalid_value("roles.spine", "needs at least two parts"));
        }
        if self.spine.iter().chain(&self.main_body).chain(&self.speed_parts).any(String::is_empty) {
            return Err(ConfigError::invalid_value("roles", "part lists must not contain empty names"));
        }
        if self.main_body.is_empty() {
            return Err(ConfigError::invalid_value("roles.main_body", "must not be empty"));
        }
        Ok(())
    }
}
