//! Video adapters for the core reader and writer traits.
//!
//! - [`ImageSequence`] reads a directory of PNG frames in file-name order
//! - [`InMemoryVideo`] serves decoded frames from memory
//! - [`ImageSequenceWriter`] writes numbered PNG frames
//! - [`FrameCollector`] keeps rendered frames in memory
//!
//! Readers count as open from [`VideoSource::open`] until they are dropped.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use ethotrack_core::{
    CoreError, CoreResult, FrameReader, FrameSize, FrameWriter, VideoSource, DEFAULT_FRAME_RATE,
};
use image::RgbImage;

fn frame_size_of(frame: &RgbImage) -> FrameSize {
    let (width, height) = frame.dimensions();
    FrameSize::new(width, height)
}

// ---------------------------------------------------------------------------
// Image sequences on disk
// ---------------------------------------------------------------------------

/// A directory of PNG frames forming one video.
#[derive(Debug, Clone)]
pub struct ImageSequence {
    name: String,
    dir: PathBuf,
    frame_rate: f64,
}

impl ImageSequence {
    /// Sequence rooted at `dir`, named after the directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| dir.display().to_string());
        Self {
            name,
            dir,
            frame_rate: DEFAULT_FRAME_RATE,
        }
    }

    /// Overrides the nominal frame rate.
    #[must_use]
    pub fn with_frame_rate(mut self, frame_rate: f64) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    /// Directory holding the frames.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn frame_paths(&self) -> CoreResult<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_png = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
            if is_png {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

impl VideoSource for ImageSequence {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> CoreResult<Box<dyn FrameReader + '_>> {
        let paths = self.frame_paths()?;
        let pending = match paths.first() {
            Some(path) => Some(decode(path, 0)?),
            None => None,
        };
        let frame_size = pending
            .as_ref()
            .map_or(FrameSize::new(0, 0), frame_size_of);
        tracing::debug!(video = %self.name, frames = paths.len(), "opened image sequence");
        Ok(Box::new(ImageSequenceReader {
            name: &self.name,
            paths,
            next: 0,
            pending,
            frame_size,
            frame_rate: self.frame_rate,
        }))
    }
}

fn decode(path: &Path, index: usize) -> CoreResult<RgbImage> {
    image::open(path)
        .map(|img| img.to_rgb8())
        .map_err(|e| CoreError::video_read(index, format!("{}: {e}", path.display())))
}

struct ImageSequenceReader<'a> {
    name: &'a str,
    paths: Vec<PathBuf>,
    next: usize,
    pending: Option<RgbImage>,
    frame_size: FrameSize,
    frame_rate: f64,
}

impl FrameReader for ImageSequenceReader<'_> {
    fn frame_size(&self) -> FrameSize {
        self.frame_size
    }

    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    fn read_frame(&mut self) -> CoreResult<Option<RgbImage>> {
        let frame = match self.pending.take() {
            Some(frame) => frame,
            None => {
                let Some(path) = self.paths.get(self.next) else {
                    return Ok(None);
                };
                decode(path, self.next)?
            }
        };
        if frame_size_of(&frame) != self.frame_size {
            return Err(CoreError::video_read(
                self.next,
                format!(
                    "frame is {}x{}, expected {}x{}",
                    frame.width(),
                    frame.height(),
                    self.frame_size.width,
                    self.frame_size.height
                ),
            ));
        }
        self.next += 1;
        Ok(Some(frame))
    }
}

impl Drop for ImageSequenceReader<'_> {
    fn drop(&mut self) {
        tracing::trace!(video = %self.name, frames_read = self.next, "released image sequence");
    }
}

// ---------------------------------------------------------------------------
// In-memory video
// ---------------------------------------------------------------------------

/// Frames held in memory, with optional injected decode failure.
#[derive(Debug)]
pub struct InMemoryVideo {
    name: String,
    frames: Vec<RgbImage>,
    frame_rate: f64,
    fail_at: Option<usize>,
    opened: AtomicUsize,
    live: AtomicUsize,
}

impl InMemoryVideo {
    /// Video serving `frames` in order.
    pub fn new(name: impl Into<String>, frames: Vec<RgbImage>) -> Self {
        Self {
            name: name.into(),
            frames,
            frame_rate: DEFAULT_FRAME_RATE,
            fail_at: None,
            opened: AtomicUsize::new(0),
            live: AtomicUsize::new(0),
        }
    }

    /// Overrides the nominal frame rate.
    #[must_use]
    pub fn with_frame_rate(mut self, frame_rate: f64) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    /// Makes every read of frame `index` fail with a decode error.
    #[must_use]
    pub fn with_decode_failure_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the video has no frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// How many times the video has been opened.
    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Readers currently alive.
    pub fn open_readers(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

impl VideoSource for InMemoryVideo {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> CoreResult<Box<dyn FrameReader + '_>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(InMemoryReader {
            video: self,
            next: 0,
        }))
    }
}

struct InMemoryReader<'a> {
    video: &'a InMemoryVideo,
    next: usize,
}

impl FrameReader for InMemoryReader<'_> {
    fn frame_size(&self) -> FrameSize {
        self.video
            .frames
            .first()
            .map_or(FrameSize::new(0, 0), frame_size_of)
    }

    fn frame_rate(&self) -> f64 {
        self.video.frame_rate
    }

    fn read_frame(&mut self) -> CoreResult<Option<RgbImage>> {
        if self.video.fail_at == Some(self.next) {
            return Err(CoreError::video_read(self.next, "corrupt frame"));
        }
        let frame = self.video.frames.get(self.next).cloned();
        if frame.is_some() {
            self.next += 1;
        }
        Ok(frame)
    }
}

impl Drop for InMemoryReader<'_> {
    fn drop(&mut self) {
        self.video.live.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(video = %self.video.name, frames_read = self.next, "released reader");
    }
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

/// Writes frames as `frame_000000.png`, `frame_000001.png`, ...
#[derive(Debug)]
pub struct ImageSequenceWriter {
    dir: PathBuf,
    written: usize,
}

impl ImageSequenceWriter {
    /// Creates `dir` if needed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Io`] if the directory cannot be created.
    pub fn create(dir: impl Into<PathBuf>) -> CoreResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, written: 0 })
    }

    /// Frames written so far.
    pub fn written(&self) -> usize {
        self.written
    }
}

impl FrameWriter for ImageSequenceWriter {
    fn write_frame(&mut self, frame: &RgbImage) -> CoreResult<()> {
        let path = self.dir.join(format!("frame_{:06}.png", self.written));
        frame.save(&path).map_err(std::io::Error::other)?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> CoreResult<()> {
        tracing::debug!(dir = %self.dir.display(), frames = self.written, "image sequence written");
        Ok(())
    }
}

/// Keeps every written frame in memory.
#[derive(Debug, Default)]
pub struct FrameCollector {
    frames: Vec<RgbImage>,
    finished: bool,
}

impl FrameCollector {
    /// Empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames written so far.
    pub fn frames(&self) -> &[RgbImage] {
        &self.frames
    }

    /// Whether [`FrameWriter::finish`] was called.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Consumes the collector.
    pub fn into_frames(self) -> Vec<RgbImage> {
        self.frames
    }
}

impl FrameWriter for FrameCollector {
    fn write_frame(&mut self, frame: &RgbImage) -> CoreResult<()> {
        self.frames.push(frame.clone());
        Ok(())
    }

    fn finish(&mut self) -> CoreResult<()> {
        self.finished = true;
        Ok(())
    }
}
