//! Overlay rendering of tagged traits on video frames.
//!
//! [`OverlayRenderer`] draws one frame at a time. It draws the arena outline,
//! the tracked body parts, a colored link between animals engaged in a pair
//! trait, and a corner panel per animal. The panel holds a swatch of the
//! highest-priority active trait and a speed bar. [`AnnotatedFrames`] is the
//! lazy sequence of rendered frames read from a fresh video reader.

use std::f64::consts::TAU;

use ethotrack_core::{
    AnimalId, AnnotationTable, ArenaDescriptor, ArenaGeometry, CoordinateTable, CoreResult,
    FrameReader, PartKey, Point2,
};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

use crate::config::{BodyPartRoles, OverlayConfig};
use crate::context::{self, BehaviorContext, DIRECTED_TRAITS, SUBJECT_TRAITS, SYMMETRIC_TRAITS};

const ARENA_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
const SPEED_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const ANIMAL_COLORS: [Rgb<u8>; 4] = [
    Rgb([255, 64, 64]),
    Rgb([64, 255, 64]),
    Rgb([64, 160, 255]),
    Rgb([255, 64, 255]),
];
const ARENA_SEGMENTS: usize = 90;
const PART_RADIUS: i32 = 3;
const SWATCH: u32 = 16;
const BAR_HEIGHT: u32 = 6;
/// Offset of the speed bar below the swatch
const BAR_GAP: u32 = 6;
/// Speed bar pixels per unit of speed
const BAR_GAIN: f64 = 4.0;

/// Swatch color of a trait.
#[must_use]
pub fn trait_color(trait_name: &str) -> Rgb<u8> {
    match trait_name {
        context::CLIMBING => Rgb([220, 50, 47]),
        context::HUDDLE => Rgb([38, 139, 210]),
        context::SNIFFING => Rgb([133, 153, 0]),
        context::DIG => Rgb([181, 137, 0]),
        context::LOOKAROUND => Rgb([211, 54, 130]),
        context::NOSE2NOSE => Rgb([42, 161, 152]),
        context::SIDEBYSIDE => Rgb([108, 113, 196]),
        context::SIDERESIDE => Rgb([203, 75, 22]),
        context::NOSE2TAIL => Rgb([238, 232, 213]),
        context::NOSE2BODY => Rgb([147, 161, 161]),
        context::FOLLOWING => Rgb([255, 200, 0]),
        _ => Rgb([128, 128, 128]),
    }
}

/// Top-left anchor of the panel for the `slot`-th animal: lower-left,
/// lower-right, upper-left, upper-right.
fn corner(slot: usize, width: u32, height: u32) -> (i32, i32) {
    let (w, h) = (f64::from(width), f64::from(height));
    let panel = f64::from(SWATCH + BAR_GAP + BAR_HEIGHT);
    let (x, y) = match slot % 4 {
        0 => (w * 0.03, h / 1.05 - panel),
        1 => (w * 0.65, h / 1.05 - panel),
        2 => (w * 0.03, h / 20.0),
        _ => (w * 0.63, h / 20.0),
    };
    (x.max(0.0) as i32, y.max(0.0) as i32)
}

/// Draws tagged traits onto frames.
#[derive(Debug)]
pub struct OverlayRenderer<'a> {
    config: &'a OverlayConfig,
    roles: &'a BodyPartRoles,
    arena: ArenaDescriptor,
    coordinates: &'a CoordinateTable,
    table: &'a AnnotationTable,
    context: &'a dyn BehaviorContext,
    subjects: Vec<Option<AnimalId>>,
    pairs: Vec<(AnimalId, AnimalId)>,
}

impl<'a> OverlayRenderer<'a> {
    /// Renderer for one tagged video.
    pub fn new(
        config: &'a OverlayConfig,
        roles: &'a BodyPartRoles,
        arena: ArenaDescriptor,
        coordinates: &'a CoordinateTable,
        table: &'a AnnotationTable,
        context: &'a dyn BehaviorContext,
    ) -> Self {
        Self {
            config,
            roles,
            arena,
            coordinates,
            table,
            context,
            subjects: context.subjects(),
            pairs: context.pairs(),
        }
    }

    /// Frames that will be rendered: the table length, capped by the
    /// configured limit.
    #[must_use]
    pub fn frame_budget(&self) -> usize {
        let n = self.table.n_frames();
        self.config.frame_limit.map_or(n, |limit| limit.min(n))
    }

    /// Lazily renders the frames produced by `reader`.
    pub fn frames(&'a self, reader: Box<dyn FrameReader + 'a>) -> AnnotatedFrames<'a> {
        AnnotatedFrames {
            reader,
            renderer: self,
            next: 0,
            limit: self.frame_budget(),
            speeds: vec![0.0; self.subjects.len()],
            done: false,
        }
    }

    fn flag(&self, column: &str, frame: usize) -> bool {
        self.table
            .flags(column)
            .and_then(|flags| flags.get(frame))
            .copied()
            .unwrap_or(false)
    }

    fn point(&self, animal: Option<&AnimalId>, part: &str, frame: usize) -> Option<Point2> {
        let points = self.coordinates.get(&PartKey::of(animal, part))?;
        let p = Point2::new(points[[frame, 0]], points[[frame, 1]]);
        (p.x.is_finite() && p.y.is_finite()).then_some(p)
    }

    /// Draws every overlay element for `frame` onto `image`.
    ///
    /// `speeds` holds the speed shown for each subject and is refreshed every
    /// `speed_pause` frames.
    pub fn draw(&self, image: &mut RgbImage, frame: usize, speeds: &mut [f64]) {
        if self.config.draw_arena {
            self.draw_arena(image);
        }
        if self.config.draw_parts {
            self.draw_parts(image, frame);
        }
        self.draw_pair_links(image, frame);

        let refresh = frame % self.config.speed_pause.max(1) == 0;
        for (slot, subject) in self.subjects.iter().enumerate() {
            if refresh {
                let column = self.context.subject_column(subject.as_ref(), context::SPEED);
                if let Some(value) = self.table.values(&column).and_then(|v| v.get(frame)) {
                    speeds[slot] = *value;
                }
            }
            self.draw_panel(image, frame, slot, subject.as_ref(), speeds[slot]);
        }
    }

    fn draw_arena(&self, image: &mut RgbImage) {
        let (center, a, b, angle) = match *self.arena.geometry() {
            ArenaGeometry::Circle { center, radius } => (center, radius, radius, 0.0),
            ArenaGeometry::Ellipse {
                center,
                semi_major,
                semi_minor,
                angle,
            } => (center, semi_major, semi_minor, angle),
        };
        let (sin, cos) = angle.sin_cos();
        #[allow(clippy::cast_precision_loss)]
        let vertex = |i: usize| {
            let t = TAU * i as f64 / ARENA_SEGMENTS as f64;
            let (x, y) = (a * t.cos(), b * t.sin());
            (
                (center.x + x * cos - y * sin) as f32,
                (center.y + x * sin + y * cos) as f32,
            )
        };
        for i in 0..ARENA_SEGMENTS {
            draw_line_segment_mut(image, vertex(i), vertex(i + 1), ARENA_COLOR);
        }
    }

    fn draw_parts(&self, image: &mut RgbImage, frame: usize) {
        for (slot, subject) in self.subjects.iter().enumerate() {
            let color = ANIMAL_COLORS[slot % ANIMAL_COLORS.len()];
            for key in self.coordinates.parts_of(subject.as_ref()) {
                if let Some(p) = self.point(subject.as_ref(), key.part(), frame) {
                    draw_filled_circle_mut(image, (p.x as i32, p.y as i32), PART_RADIUS, color);
                }
            }
        }
    }

    fn draw_pair_links(&self, image: &mut RgbImage, frame: usize) {
        let nose = self.roles.nose.as_str();
        for (a, b) in &self.pairs {
            let links = SYMMETRIC_TRAITS
                .iter()
                .map(|t| (self.context.pair_column(a, b, t), *t))
                .chain(DIRECTED_TRAITS.iter().flat_map(|t| {
                    [
                        (self.context.pair_column(a, b, t), *t),
                        (self.context.pair_column(b, a, t), *t),
                    ]
                }));
            for (column, trait_name) in links {
                if !self.flag(&column, frame) {
                    continue;
                }
                if let (Some(p), Some(q)) = (
                    self.point(Some(a), nose, frame),
                    self.point(Some(b), nose, frame),
                ) {
                    let color = trait_color(trait_name);
                    draw_line_segment_mut(
                        image,
                        (p.x as f32, p.y as f32),
                        (q.x as f32, q.y as f32),
                        color,
                    );
                }
            }
        }
    }

    fn draw_panel(
        &self,
        image: &mut RgbImage,
        frame: usize,
        slot: usize,
        subject: Option<&AnimalId>,
        speed: f64,
    ) {
        let (x, y) = corner(slot, image.width(), image.height());
        let outline = ANIMAL_COLORS[slot % ANIMAL_COLORS.len()];
        draw_filled_rect_mut(image, Rect::at(x, y).of_size(SWATCH + 4, SWATCH + 4), outline);

        let active = SUBJECT_TRAITS
            .iter()
            .find(|t| self.flag(&self.context.subject_column(subject, t), frame));
        let fill = active.map_or(Rgb([0, 0, 0]), |t| trait_color(t));
        draw_filled_rect_mut(image, Rect::at(x + 2, y + 2).of_size(SWATCH, SWATCH), fill);

        let max_bar = image.width() / 4;
        let bar = (speed.max(0.0) * BAR_GAIN).round() as u32;
        let bar = bar.min(max_bar);
        if bar > 0 {
            draw_filled_rect_mut(
                image,
                Rect::at(x, y + (SWATCH + BAR_GAP) as i32).of_size(bar, BAR_HEIGHT),
                SPEED_COLOR,
            );
        }
    }
}

/// Annotated frames, produced one at a time.
///
/// The sequence ends at the frame budget, at the end of the video, or right
/// after the first decode error, which is yielded once. It cannot be
/// restarted; open a new reader instead.
pub struct AnnotatedFrames<'a> {
    reader: Box<dyn FrameReader + 'a>,
    renderer: &'a OverlayRenderer<'a>,
    next: usize,
    limit: usize,
    speeds: Vec<f64>,
    done: bool,
}

impl AnnotatedFrames<'_> {
    /// Index of the next frame to render.
    pub fn position(&self) -> usize {
        self.next
    }

    /// Frames that will be rendered at most.
    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl Iterator for AnnotatedFrames<'_> {
    type Item = CoreResult<RgbImage>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.next >= self.limit {
            return None;
        }
        match self.reader.read_frame() {
            Ok(Some(mut image)) => {
                self.renderer.draw(&mut image, self.next, &mut self.speeds);
                self.next += 1;
                Some(Ok(image))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
