//! Batch tagging over many videos.
//!
//! Videos are tagged in a rayon fork/join. A video that fails for its own
//! reasons (no arena, unreadable frames, missing body parts) becomes a
//! [`VideoOutcome::Failed`] marker and the batch moves on; configuration and
//! alignment errors abort the whole batch once every worker has joined.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use ethotrack_core::AnnotationTable;
use rayon::prelude::*;
use serde::Serialize;

use crate::config::TaggingConfig;
use crate::error::RulesResult;
use crate::tagger::{RenderSummary, RuleBasedTagger, TaggingStage, VideoContext};
use crate::video::ImageSequenceWriter;

/// Result of processing one video.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VideoOutcome {
    /// Every frame was annotated
    Tagged {
        /// Video name
        name: String,
        /// Complete annotation table
        table: AnnotationTable,
        /// Overlay result, when rendering was requested
        render: Option<RenderSummary>,
    },
    /// The video was skipped
    Failed {
        /// Video name
        name: String,
        /// Last stage reached before the failure
        stage: TaggingStage,
        /// Error message
        error: String,
    },
}

impl VideoOutcome {
    /// Video name.
    pub fn name(&self) -> &str {
        match self {
            Self::Tagged { name, .. } | Self::Failed { name, .. } => name,
        }
    }

    /// Annotation table of a tagged video.
    pub fn table(&self) -> Option<&AnnotationTable> {
        match self {
            Self::Tagged { table, .. } => Some(table),
            Self::Failed { .. } => None,
        }
    }

    /// Returns `true` for a skipped video.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Per-video outcomes of a batch, in input order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    /// When the batch started
    pub started_at: DateTime<Utc>,
    /// When the last video finished
    pub finished_at: DateTime<Utc>,
    /// One outcome per input video
    pub outcomes: Vec<VideoOutcome>,
}

impl BatchReport {
    /// Outcomes of the tagged videos.
    pub fn tagged(&self) -> impl Iterator<Item = &VideoOutcome> {
        self.outcomes.iter().filter(|o| !o.is_failed())
    }

    /// Outcomes of the skipped videos.
    pub fn failed(&self) -> impl Iterator<Item = &VideoOutcome> {
        self.outcomes.iter().filter(|o| o.is_failed())
    }

    /// Number of videos in the batch.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Returns `true` if the batch had no videos.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Serializes the report to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RulesError::Json`] if serialization fails.
    pub fn to_json_string(&self) -> RulesResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Tags a list of videos in parallel with one shared configuration.
#[derive(Debug)]
pub struct BatchTagger {
    tagger: RuleBasedTagger,
    render_dir: Option<PathBuf>,
}

impl BatchTagger {
    /// Creates a batch tagger, validating `config` before any video is
    /// touched.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RulesError::Config`] if the configuration is invalid.
    pub fn new(config: TaggingConfig) -> RulesResult<Self> {
        Ok(Self {
            tagger: RuleBasedTagger::new(config)?,
            render_dir: None,
        })
    }

    /// Writes an overlay image sequence to `dir/<video name>` for every
    /// tagged video with an attached source video.
    #[must_use]
    pub fn with_render_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.render_dir = Some(dir.into());
        self
    }

    /// The per-video tagger.
    pub fn tagger(&self) -> &RuleBasedTagger {
        &self.tagger
    }

    /// Tags every video.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error (invalid configuration or misaligned
    /// inputs) in input order. Every other failure is reported in the
    /// returned [`BatchReport`].
    #[tracing::instrument(skip_all, fields(videos = videos.len()))]
    pub fn run(&self, videos: Vec<VideoContext>) -> RulesResult<BatchReport> {
        let started_at = Utc::now();
        let results: Vec<RulesResult<VideoOutcome>> = videos
            .into_par_iter()
            .map(|video| self.process(video))
            .collect();
        let outcomes = results.into_iter().collect::<RulesResult<Vec<_>>>()?;

        let report = BatchReport {
            started_at,
            finished_at: Utc::now(),
            outcomes,
        };
        tracing::info!(
            tagged = report.tagged().count(),
            failed = report.failed().count(),
            "batch finished"
        );
        Ok(report)
    }

    fn process(&self, mut video: VideoContext) -> RulesResult<VideoOutcome> {
        let name = video.name().to_string();
        match self.tag_and_render(&mut video) {
            Ok((table, render)) => Ok(VideoOutcome::Tagged {
                name,
                table,
                render,
            }),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                tracing::warn!(video = %name, stage = ?video.stage(), error = %e, "skipping video");
                Ok(VideoOutcome::Failed {
                    name,
                    stage: video.stage(),
                    error: e.to_string(),
                })
            }
        }
    }

    fn tag_and_render(
        &self,
        video: &mut VideoContext,
    ) -> RulesResult<(AnnotationTable, Option<RenderSummary>)> {
        let table = self.tagger.tag(video)?;
        let render = match (&self.render_dir, video.video().is_some()) {
            (Some(dir), true) => {
                let mut writer = ImageSequenceWriter::create(dir.join(video.name()))?;
                Some(self.tagger.render(video, &table, &mut writer)?)
            }
            _ => None,
        };
        Ok((table, render))
    }
}
