//! Per-video rule-based tagging.
//!
//! [`RuleBasedTagger::tag`] drives a [`VideoContext`] through
//!
//! ```text
//! Init -> ArenaDetected -> FeaturesComputed -> DetectorsRun -> Assembled [-> Rendered]
//! ```
//!
//! The arena is cached in the context, so re-tagging a video or rendering it
//! afterwards never runs detection twice. Per-animal and per-pair detector
//! evaluation fans out over rayon; assembly is sequential.

use std::fmt;
use std::sync::Arc;

use ethotrack_core::{
    utils, AnimalId, AnnotationColumn, AnnotationTable, ArenaDescriptor, CoordinateTable,
    CoreError, DistanceTable, FrameWriter, PartKey, PartPair, RealScale, SpeedTable, VideoSource,
};
use ethotrack_signal::{smooth_boolean_run, smooth_trajectories, FeatureExtractor};
use rayon::prelude::*;
use serde::Serialize;

use crate::arena::ArenaDetector;
use crate::config::{BodyPartRoles, TaggingConfig};
use crate::context::{self, context_for, BehaviorContext};
use crate::detectors::{self, ContactPairs, FollowInputs, HuddleInputs};
use crate::error::RulesResult;
use crate::overlay::OverlayRenderer;

// ---------------------------------------------------------------------------
// Per-video state
// ---------------------------------------------------------------------------

/// Progress of one video through the tagging pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaggingStage {
    /// Nothing computed yet
    Init,
    /// Arena resolved
    ArenaDetected,
    /// Distances and speeds computed
    FeaturesComputed,
    /// Every detector evaluated
    DetectorsRun,
    /// Annotation table built
    Assembled,
    /// Overlay video written
    Rendered,
}

/// Everything the pipeline knows about one video.
///
/// Owns the coordinate table and caches the arena, so concurrent videos
/// never share mutable state.
pub struct VideoContext {
    name: String,
    coordinates: CoordinateTable,
    video: Option<Arc<dyn VideoSource>>,
    arena: Option<ArenaDescriptor>,
    fallback_arena: Option<ArenaDescriptor>,
    arena_detections: usize,
    stage: TaggingStage,
}

impl fmt::Debug for VideoContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoContext")
            .field("name", &self.name)
            .field("frames", &self.coordinates.n_frames())
            .field("parts", &self.coordinates.len())
            .field("has_video", &self.video.is_some())
            .field("arena", &self.arena)
            .field("stage", &self.stage)
            .finish_non_exhaustive()
    }
}

impl VideoContext {
    /// Context for a coordinate table.
    pub fn new(name: impl Into<String>, coordinates: CoordinateTable) -> Self {
        Self {
            name: name.into(),
            coordinates,
            video: None,
            arena: None,
            fallback_arena: None,
            arena_detections: 0,
            stage: TaggingStage::Init,
        }
    }

    /// Attaches the source video used for arena detection and rendering.
    #[must_use]
    pub fn with_video(mut self, video: Arc<dyn VideoSource>) -> Self {
        self.video = Some(video);
        self
    }

    /// Uses a known arena instead of detecting one.
    #[must_use]
    pub fn with_arena(mut self, arena: ArenaDescriptor) -> Self {
        self.arena = Some(arena);
        self
    }

    /// Arena used when detection finds nothing.
    #[must_use]
    pub fn with_fallback_arena(mut self, arena: ArenaDescriptor) -> Self {
        self.fallback_arena = Some(arena);
        self
    }

    /// Video name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw coordinates.
    pub fn coordinates(&self) -> &CoordinateTable {
        &self.coordinates
    }

    /// Source video, if attached.
    pub fn video(&self) -> Option<&Arc<dyn VideoSource>> {
        self.video.as_ref()
    }

    /// Resolved arena, if any.
    pub fn arena(&self) -> Option<&ArenaDescriptor> {
        self.arena.as_ref()
    }

    /// Current stage.
    pub fn stage(&self) -> TaggingStage {
        self.stage
    }

    /// How many times arena detection ran for this video.
    pub fn arena_detections(&self) -> usize {
        self.arena_detections
    }

    fn advance(&mut self, stage: TaggingStage) {
        tracing::debug!(video = %self.name, ?stage, "stage reached");
        self.stage = stage;
    }

    /// Returns the cached arena, detecting it from the video on first use.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ArenaNotFound`] when no arena is cached, no video
    /// is attached or detection fails without a fallback.
    pub fn resolve_arena(&mut self, detector: &ArenaDetector) -> RulesResult<ArenaDescriptor> {
        if let Some(arena) = self.arena {
            return Ok(arena);
        }
        let Some(video) = self.video.clone() else {
            return Err(CoreError::ArenaNotFound { frames_sampled: 0 }.into());
        };

        self.arena_detections += 1;
        let arena = match detector.detect(video.as_ref()) {
            Ok(arena) => arena,
            Err(e) => match (e.as_core(), self.fallback_arena) {
                (Some(CoreError::ArenaNotFound { .. }), Some(fallback)) => {
                    tracing::warn!(video = %self.name, error = %e, "using fallback arena");
                    fallback
                }
                _ => return Err(e),
            },
        };
        self.arena = Some(arena);
        Ok(arena)
    }
}

/// Derived tables for one video, in real-world units.
#[derive(Debug, Clone)]
pub struct VideoFeatures {
    /// Smoothed coordinates
    pub coordinates: CoordinateTable,
    /// Distances for every pair a detector reads
    pub distances: DistanceTable,
    /// First-order speed of every part
    pub speeds: SpeedTable,
    /// Arena of the video
    pub arena: ArenaDescriptor,
    /// Pixel to millimeter conversion
    pub scale: RealScale,
}

/// Outcome of writing an overlay video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RenderStop {
    /// Every annotated frame was written
    Completed,
    /// The configured frame limit was reached
    FrameLimit,
    /// The video ended before the annotation table
    EndOfVideo,
    /// A frame failed to decode; earlier frames were written
    DecodeFailed {
        /// Index of the failing frame
        frame: usize,
        /// Decoder message
        message: String,
    },
}

/// What a render pass produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderSummary {
    /// Frames handed to the writer
    pub frames_written: usize,
    /// Why rendering stopped
    pub stop: RenderStop,
}

// ---------------------------------------------------------------------------
// Tagger
// ---------------------------------------------------------------------------

/// Named annotation columns produced by the detectors.
pub type TraitColumns = Vec<(String, AnnotationColumn)>;

/// Runs arena detection, feature extraction and every detector on a video.
#[derive(Debug)]
pub struct RuleBasedTagger {
    config: TaggingConfig,
    extractor: FeatureExtractor,
    arena_detector: ArenaDetector,
    context: Box<dyn BehaviorContext>,
}

impl RuleBasedTagger {
    /// Creates a tagger after validating `config`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RulesError::Config`] if the configuration is invalid.
    pub fn new(config: TaggingConfig) -> RulesResult<Self> {
        config.validate()?;
        let extractor = FeatureExtractor::new(config.kinematics.clone())?;
        let arena_detector = ArenaDetector::new(config.arena.clone());
        let context = context_for(&config.animal_ids);
        Ok(Self {
            config,
            extractor,
            arena_detector,
            context,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &TaggingConfig {
        &self.config
    }

    /// Animals and pairs this tagger evaluates.
    pub fn behavior_context(&self) -> &dyn BehaviorContext {
        self.context.as_ref()
    }

    /// Tags every frame of `video`.
    ///
    /// The returned table has exactly as many rows as the coordinate table.
    ///
    /// # Errors
    ///
    /// Returns the first error of any stage; the context keeps the stage
    /// reached so callers can report where tagging stopped.
    #[tracing::instrument(skip_all, fields(video = %video.name()))]
    pub fn tag(&self, video: &mut VideoContext) -> RulesResult<AnnotationTable> {
        video.stage = TaggingStage::Init;
        let arena = video.resolve_arena(&self.arena_detector)?;
        video.advance(TaggingStage::ArenaDetected);

        let features = self.compute_features(video.coordinates(), arena)?;
        video.advance(TaggingStage::FeaturesComputed);

        let columns = self.run_detectors(&features)?;
        video.advance(TaggingStage::DetectorsRun);

        let table = assemble(video.coordinates().n_frames(), columns)?;
        video.advance(TaggingStage::Assembled);
        Ok(table)
    }

    /// Smooths the trajectories and computes the distance and speed tables
    /// the detectors read.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MissingBodyPart`] if a role names an untracked
    /// part.
    pub fn compute_features(
        &self,
        coordinates: &CoordinateTable,
        arena: ArenaDescriptor,
    ) -> RulesResult<VideoFeatures> {
        let coordinates = smooth_trajectories(coordinates, self.config.smoothing)?;
        let scale = arena.scale(self.config.arena.diameter_mm);
        let pairs = self.required_pairs(&coordinates);
        let distances = self.extractor.distances(&coordinates, scale, Some(pairs.as_slice()))?;
        let speeds = self.extractor.speeds(&coordinates, scale, 1)?;
        Ok(VideoFeatures {
            coordinates,
            distances,
            speeds,
            arena,
            scale,
        })
    }

    fn required_pairs(&self, coordinates: &CoordinateTable) -> Vec<PartPair> {
        let roles = &self.config.roles;
        let mut pairs = Vec::new();
        for subject in self.context.subjects() {
            let key = |part: &str| PartKey::of(subject.as_ref(), part);
            pairs.push(PartPair::new(key(&roles.left_ear), key(&roles.left_forepaw)));
            pairs.push(PartPair::new(key(&roles.right_ear), key(&roles.right_forepaw)));
            pairs.extend(roles.spine_segments().map(|(a, b)| PartPair::new(key(a), key(b))));
        }
        for (a, b) in self.context.pairs() {
            let (a, b) = (Some(&a), Some(&b));
            let nose = |id| PartKey::of(id, &roles.nose);
            let tail = |id| PartKey::of(id, &roles.tail_base);
            pairs.push(PartPair::new(nose(a), nose(b)));
            pairs.push(PartPair::new(tail(a), tail(b)));
            pairs.push(PartPair::new(nose(a), tail(b)));
            pairs.push(PartPair::new(tail(a), nose(b)));
            for (x, y) in [(a, b), (b, a)] {
                pairs.extend(
                    main_body(coordinates, roles, y)
                        .into_iter()
                        .map(|target| PartPair::new(nose(x), target)),
                );
            }
        }
        pairs.sort();
        pairs.dedup();
        pairs
    }

    /// Evaluates every detector for every subject and pair.
    ///
    /// # Errors
    ///
    /// Returns the first detector error.
    pub fn run_detectors(&self, features: &VideoFeatures) -> RulesResult<TraitColumns> {
        let subjects = self.context.subjects();
        let per_subject = subjects
            .par_iter()
            .map(|subject| self.subject_columns(features, subject.as_ref()))
            .collect::<RulesResult<Vec<_>>>()?;
        let per_pair = self
            .context
            .pairs()
            .par_iter()
            .map(|(a, b)| self.pair_columns(features, a, b))
            .collect::<RulesResult<Vec<_>>>()?;
        Ok(per_subject.into_iter().chain(per_pair).flatten().collect())
    }

    fn subject_columns(
        &self,
        f: &VideoFeatures,
        subject: Option<&AnimalId>,
    ) -> RulesResult<TraitColumns> {
        let cfg = &self.config;
        let roles = &cfg.roles;
        let key = |part: &str| PartKey::of(subject, part);
        let column = |name: &str| self.context.subject_column(subject, name);

        let nose_key = key(&roles.nose);
        let nose = f.coordinates.require(&nose_key)?;
        let center_speed = f.speeds.require(&key(&roles.center))?;

        let mut out = Vec::new();
        out.push((
            column(context::CLIMBING),
            detectors::climbing(nose, &f.arena, f.scale, &cfg.climb),
        ));
        out.push((
            column(context::SNIFFING),
            detectors::sniffing(nose, center_speed, &f.arena, f.scale, &cfg.sniff)?,
        ));

        let huddle = HuddleInputs {
            left_ear_forepaw: f
                .distances
                .between(&key(&roles.left_ear), &key(&roles.left_forepaw))?,
            right_ear_forepaw: f
                .distances
                .between(&key(&roles.right_ear), &key(&roles.right_forepaw))?,
            spine_segments: roles
                .spine_segments()
                .map(|(a, b)| f.distances.between(&key(a), &key(b)))
                .collect::<Result<_, _>>()?,
            center_speed,
        };
        out.push((column(context::HUDDLE), detectors::huddling(&huddle, &cfg.huddle)?));

        if let Some(likelihood) = f.coordinates.likelihood(&nose_key) {
            let nose_speed = f.speeds.require(&nose_key)?;
            out.push((
                column(context::DIG),
                detectors::digging(center_speed, likelihood, &cfg.exploration)?,
            ));
            out.push((
                column(context::LOOKAROUND),
                detectors::looking_around(center_speed, nose_speed, likelihood, &cfg.exploration)?,
            ));
        }

        let mut columns: TraitColumns = out
            .into_iter()
            .map(|(name, flags)| (name, AnnotationColumn::Flags(smooth_boolean_run(&flags))))
            .collect();
        columns.push((
            column(context::SPEED),
            AnnotationColumn::Values(overall_speed(f, roles, subject)),
        ));
        Ok(columns)
    }

    fn pair_columns(
        &self,
        f: &VideoFeatures,
        a: &AnimalId,
        b: &AnimalId,
    ) -> RulesResult<TraitColumns> {
        let cfg = &self.config;
        let roles = &cfg.roles;
        let nose = |id: &AnimalId| PartKey::of(Some(id), &roles.nose);
        let tail = |id: &AnimalId| PartKey::of(Some(id), &roles.tail_base);
        let (an, at, bn, bt) = (nose(a), tail(a), nose(b), tail(b));
        let sides = ContactPairs {
            left1: &an,
            left2: &at,
            right1: &bn,
            right2: &bt,
        };

        let mut out = vec![
            (
                self.context.pair_column(a, b, context::NOSE2NOSE),
                detectors::single_contact(&f.distances, &an, &[bn.clone()], cfg.contact.close_tol)?,
            ),
            (
                self.context.pair_column(a, b, context::SIDEBYSIDE),
                detectors::double_contact(&f.distances, sides, cfg.contact.side_tol, false)?,
            ),
            (
                self.context.pair_column(a, b, context::SIDERESIDE),
                detectors::double_contact(&f.distances, sides, cfg.contact.side_tol, true)?,
            ),
        ];

        for (x, y) in [(a, b), (b, a)] {
            let (xn, yt) = (nose(x), tail(y));
            out.push((
                self.context.pair_column(x, y, context::NOSE2TAIL),
                detectors::single_contact(&f.distances, &xn, &[yt.clone()], cfg.contact.close_tol)?,
            ));
            let body = main_body(&f.coordinates, roles, Some(y));
            out.push((
                self.context.pair_column(x, y, context::NOSE2BODY),
                detectors::single_contact(&f.distances, &xn, &body, cfg.contact.close_tol)?,
            ));
            let inputs = FollowInputs {
                follower_nose: f.coordinates.require(&xn)?,
                follower_tail: f.coordinates.require(&tail(x))?,
                followed_nose: f.coordinates.require(&nose(y))?,
                followed_tail: f.coordinates.require(&yt)?,
            };
            out.push((
                self.context.pair_column(x, y, context::FOLLOWING),
                detectors::following_path(inputs, f.scale, &cfg.follow)?,
            ));
        }

        Ok(out
            .into_iter()
            .map(|(name, flags)| (name, AnnotationColumn::Flags(smooth_boolean_run(&flags))))
            .collect())
    }

    /// Draws the tagged traits onto the source video and writes every frame
    /// to `writer`.
    ///
    /// A decode failure stops rendering early; the frames written before it
    /// stay valid and the summary says where it stopped.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InputAlignment`] if `table` does not match the
    /// video's coordinates, [`CoreError::Validation`] if the context has no
    /// video or arena yet, or the writer's error.
    #[tracing::instrument(skip_all, fields(video = %video.name()))]
    pub fn render(
        &self,
        video: &mut VideoContext,
        table: &AnnotationTable,
        writer: &mut dyn FrameWriter,
    ) -> RulesResult<RenderSummary> {
        let n = video.coordinates().n_frames();
        if table.n_frames() != n {
            return Err(CoreError::input_alignment("render", n, table.n_frames()).into());
        }
        let source = video
            .video()
            .cloned()
            .ok_or_else(|| CoreError::validation("no video attached for rendering"))?;
        let arena = video
            .arena()
            .copied()
            .ok_or_else(|| CoreError::validation("render requires a resolved arena"))?;

        let renderer = OverlayRenderer::new(
            &self.config.overlay,
            &self.config.roles,
            arena,
            video.coordinates(),
            table,
            self.context.as_ref(),
        );
        let budget = renderer.frame_budget();
        let mut written = 0;
        let mut stop = None;
        let mut failure = None;
        for frame in renderer.frames(source.open()?) {
            let written_ok = match frame {
                Ok(image) => writer.write_frame(&image),
                Err(CoreError::VideoRead { frame, reason }) => {
                    tracing::warn!(frame, %reason, written, "decode failed, stopping overlay");
                    stop = Some(RenderStop::DecodeFailed {
                        frame,
                        message: reason,
                    });
                    break;
                }
                Err(e) => Err(e),
            };
            match written_ok {
                Ok(()) => written += 1,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        // The writer is finalized on every path; the first error wins.
        let finished = writer.finish();
        if let Some(e) = failure {
            tracing::warn!(written, error = %e, "overlay aborted");
            return Err(e.into());
        }
        finished?;

        let stop = stop.unwrap_or(if written == n {
            RenderStop::Completed
        } else if written == budget {
            RenderStop::FrameLimit
        } else {
            RenderStop::EndOfVideo
        });
        video.advance(TaggingStage::Rendered);
        Ok(RenderSummary {
            frames_written: written,
            stop,
        })
    }
}

/// Tracked main-body parts of `animal`.
fn main_body(
    coordinates: &CoordinateTable,
    roles: &BodyPartRoles,
    animal: Option<&AnimalId>,
) -> Vec<PartKey> {
    roles
        .main_body
        .iter()
        .map(|part| PartKey::of(animal, part.as_str()))
        .filter(|key| coordinates.get(key).is_some())
        .collect()
}

/// Per-frame median speed over the animal's tracked speed parts, zero where
/// no part has a value.
fn overall_speed(f: &VideoFeatures, roles: &BodyPartRoles, subject: Option<&AnimalId>) -> Vec<f64> {
    let columns: Vec<_> = roles
        .speed_parts
        .iter()
        .filter_map(|part| f.speeds.get(&PartKey::of(subject, part.as_str())))
        .collect();
    (0..f.speeds.n_frames())
        .map(|t| utils::nan_median(columns.iter().map(|c| c[t])).unwrap_or(0.0))
        .collect()
}

fn assemble(n_frames: usize, columns: TraitColumns) -> RulesResult<AnnotationTable> {
    let mut table = AnnotationTable::new(n_frames);
    for (name, column) in columns {
        table.insert(name, column)?;
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::{FrameCollector, InMemoryVideo};
    use ethotrack_core::{ArenaGeometry, CoreResult, FrameSize, Point2};
    use image::RgbImage;
    use ndarray::Array2;

    const PARTS: [&str; 11] = [
        "Nose", "Left_ear", "Right_ear", "Spine_1", "Center", "Left_fhip", "Right_fhip",
        "Spine_2", "Left_bhip", "Right_bhip", "Tail_base",
    ];

    fn arena() -> ArenaDescriptor {
        ArenaDescriptor::new(
            ArenaGeometry::Circle {
                center: Point2::new(200.0, 200.0),
                radius: 190.0,
            },
            FrameSize::new(400, 400),
        )
    }

    /// A motionless animal with its parts laid out along +x.
    fn still_animal(table: &mut CoordinateTable, animal: Option<&AnimalId>, origin: (f64, f64)) {
        let n = table.n_frames();
        for (i, part) in PARTS.iter().enumerate() {
            let x = origin.0 - 3.0 * i as f64;
            let points = Array2::from_shape_fn((n, 2), |(_, j)| if j == 0 { x } else { origin.1 });
            table.insert(PartKey::of(animal, *part), points).unwrap();
        }
    }

    #[test]
    fn test_single_animal_columns_and_frame_count() {
        let mut coords = CoordinateTable::new(30);
        still_animal(&mut coords, None, (220.0, 200.0));
        let tagger = RuleBasedTagger::new(TaggingConfig::default()).unwrap();
        let mut video = VideoContext::new("solo", coords).with_arena(arena());

        let table = tagger.tag(&mut video).unwrap();
        assert_eq!(video.stage(), TaggingStage::Assembled);
        assert_eq!(table.n_frames(), 30);
        let names: Vec<&str> = table.column_names().collect();
        assert_eq!(names, vec!["climbing", "huddle", "sniffing", "speed"]);
        // Compact, motionless posture
        assert!(table.flags("huddle").unwrap().iter().all(|&h| h));
        assert!(table.flags("climbing").unwrap().iter().all(|&c| !c));
        assert!(table.values("speed").unwrap().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_likelihood_enables_exploration_traits() {
        let mut coords = CoordinateTable::new(10);
        still_animal(&mut coords, None, (220.0, 200.0));
        coords
            .insert_likelihood(PartKey::new("Nose"), ndarray::Array1::from_elem(10, 0.1))
            .unwrap();
        let tagger = RuleBasedTagger::new(TaggingConfig::default()).unwrap();
        let table = tagger
            .tag(&mut VideoContext::new("dig", coords).with_arena(arena()))
            .unwrap();
        assert!(table.flags("dig").unwrap().iter().all(|&d| d));
        assert!(table.flags("lookaround").unwrap().iter().all(|&l| !l));
    }

    #[test]
    fn test_pair_columns_are_named_by_direction() {
        let (a, b) = (AnimalId::new("A"), AnimalId::new("B"));
        let mut coords = CoordinateTable::new(12);
        still_animal(&mut coords, Some(&a), (200.0, 200.0));
        still_animal(&mut coords, Some(&b), (200.0, 210.0));
        let tagger = RuleBasedTagger::new(TaggingConfig::with_animals(["A", "B"])).unwrap();
        let table = tagger
            .tag(&mut VideoContext::new("pair", coords).with_arena(arena()))
            .unwrap();

        for name in [
            "A_climbing", "B_speed", "A_B_nose2nose", "A_B_sidebyside", "A_B_sidereside",
            "A_B_nose2tail", "B_A_nose2tail", "A_B_nose2body", "B_A_following",
        ] {
            assert!(table.get(name).is_some(), "missing column {name}");
        }
        assert!(table.flags("A_B_nose2nose").unwrap().iter().all(|&c| c));
        assert!(table.flags("A_B_sidebyside").unwrap().iter().all(|&c| c));
    }

    #[test]
    fn test_missing_role_part_is_reported() {
        let mut coords = CoordinateTable::new(5);
        coords.insert(PartKey::new("Nose"), Array2::zeros((5, 2))).unwrap();
        let tagger = RuleBasedTagger::new(TaggingConfig::default()).unwrap();
        let err = tagger
            .tag(&mut VideoContext::new("sparse", coords).with_arena(arena()))
            .unwrap_err();
        assert!(matches!(err.as_core(), Some(CoreError::MissingBodyPart { .. })));
    }

    #[test]
    fn test_arena_detected_once_and_fallback() {
        let mut coords = CoordinateTable::new(4);
        still_animal(&mut coords, None, (220.0, 200.0));
        let blank = Arc::new(InMemoryVideo::new("blank", vec![RgbImage::new(400, 400); 3]));
        let tagger = RuleBasedTagger::new(TaggingConfig::default()).unwrap();

        let mut video = VideoContext::new("blank", coords.clone()).with_video(blank.clone());
        assert!(tagger.tag(&mut video).is_err());
        assert_eq!(video.stage(), TaggingStage::Init);

        let mut video = VideoContext::new("blank", coords)
            .with_video(blank.clone())
            .with_fallback_arena(arena());
        tagger.tag(&mut video).unwrap();
        tagger.tag(&mut video).unwrap();
        assert_eq!(video.arena_detections(), 1);
        assert_eq!(blank.open_readers(), 0);
    }

    #[test]
    fn test_render_stops_on_decode_failure() {
        let mut coords = CoordinateTable::new(6);
        still_animal(&mut coords, None, (220.0, 200.0));
        let source = Arc::new(
            InMemoryVideo::new("clip", vec![RgbImage::new(400, 400); 6]).with_decode_failure_at(4),
        );
        let tagger = RuleBasedTagger::new(TaggingConfig::default()).unwrap();
        let mut video = VideoContext::new("clip", coords)
            .with_video(source.clone())
            .with_arena(arena());
        let table = tagger.tag(&mut video).unwrap();

        let mut sink = FrameCollector::new();
        let summary = tagger.render(&mut video, &table, &mut sink).unwrap();
        assert_eq!(summary.frames_written, 4);
        assert!(matches!(summary.stop, RenderStop::DecodeFailed { frame: 4, .. }));
        assert_eq!(sink.frames().len(), 4);
        assert!(sink.is_finished());
        assert_eq!(video.stage(), TaggingStage::Rendered);
        assert_eq!(source.open_readers(), 0);
    }

    /// Accepts `fail_at` frames, then rejects every write.
    #[derive(Default)]
    struct FailingWriter {
        fail_at: usize,
        written: usize,
        finished: bool,
    }

    impl FrameWriter for FailingWriter {
        fn write_frame(&mut self, _frame: &RgbImage) -> CoreResult<()> {
            if self.written == self.fail_at {
                return Err(CoreError::validation("disk full"));
            }
            self.written += 1;
            Ok(())
        }

        fn finish(&mut self) -> CoreResult<()> {
            self.finished = true;
            Ok(())
        }
    }

    #[test]
    fn test_render_finishes_writer_after_write_error() {
        let mut coords = CoordinateTable::new(6);
        still_animal(&mut coords, None, (220.0, 200.0));
        let source = Arc::new(InMemoryVideo::new("clip", vec![RgbImage::new(400, 400); 6]));
        let tagger = RuleBasedTagger::new(TaggingConfig::default()).unwrap();
        let mut video = VideoContext::new("clip", coords)
            .with_video(source.clone())
            .with_arena(arena());
        let table = tagger.tag(&mut video).unwrap();

        let mut writer = FailingWriter {
            fail_at: 2,
            ..FailingWriter::default()
        };
        let err = tagger.render(&mut video, &table, &mut writer).unwrap_err();
        assert!(err.to_string().contains("disk full"), "{err}");
        assert_eq!(writer.written, 2);
        assert!(writer.finished);
        assert_eq!(video.stage(), TaggingStage::Assembled);
        assert_eq!(source.open_readers(), 0);
    }

    #[test]
    fn test_render_frame_limit() {
        let mut coords = CoordinateTable::new(6);
        still_animal(&mut coords, None, (220.0, 200.0));
        let mut config = TaggingConfig::default();
        config.overlay.frame_limit = Some(2);
        let tagger = RuleBasedTagger::new(config).unwrap();
        let mut video = VideoContext::new("clip", coords)
            .with_video(Arc::new(InMemoryVideo::new("clip", vec![RgbImage::new(400, 400); 6])))
            .with_arena(arena());
        let table = tagger.tag(&mut video).unwrap();

        let mut sink = FrameCollector::new();
        let summary = tagger.render(&mut video, &table, &mut sink).unwrap();
        assert_eq!(summary.frames_written, 2);
        assert_eq!(summary.stop, RenderStop::FrameLimit);

        let short = AnnotationTable::new(3);
        assert!(tagger.render(&mut video, &short, &mut sink).is_err());
    }
}
