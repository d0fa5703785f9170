//! Arena recognition from the first frames of a video.
//!
//! Each sampled frame is converted to grayscale, binarized (Otsu's level
//! unless a fixed threshold is configured), median filtered and traced into
//! contours. Every contour that does not touch the frame border is fitted
//! with a circle (algebraic least squares) or an ellipse (second-order area
//! moments), and the most plausible fit of the frame is kept.
//!
//! # Selection policy
//!
//! Within a frame, candidates are ranked by contour length, then by fitted
//! radius, then by closeness to the frame center. Across frames the
//! component-wise median of the per-frame winners is returned, so the result
//! only depends on the sampled pixels.

use ethotrack_core::{
    ArenaDescriptor, ArenaGeometry, CoreError, FrameSize, Point2, VideoSource, utils,
};
use image::RgbImage;
use imageproc::contours::find_contours;
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use imageproc::filter::median_filter;

use crate::config::{ArenaConfig, ArenaShape};
use crate::error::RulesResult;

/// Boundary pixel centers sit half a pixel inside the true edge.
const PIXEL_EDGE_OFFSET: f64 = 0.5;

/// Fits the arena boundary of a video.
#[derive(Debug, Clone, Default)]
pub struct ArenaDetector {
    config: ArenaConfig,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    geometry: ArenaGeometry,
    points: usize,
    radius: f64,
    offset: f64,
}

impl Candidate {
    fn outranks(&self, other: &Self) -> bool {
        self.points
            .cmp(&other.points)
            .then(self.radius.total_cmp(&other.radius))
            .then(other.offset.total_cmp(&self.offset))
            .is_gt()
    }
}

impl ArenaDetector {
    /// Creates a detector.
    #[must_use]
    pub fn new(config: ArenaConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Detects the arena in the first `sample_frames` frames of `source`.
    ///
    /// The reader is opened here and dropped on every return path. A frame
    /// that fails to decode ends sampling; the frames read before it still
    /// count.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ArenaNotFound`] if no sampled frame yields a
    /// plausible boundary, or the reader's error if opening fails.
    #[tracing::instrument(skip_all, fields(video = source.name()))]
    pub fn detect(&self, source: &dyn VideoSource) -> RulesResult<ArenaDescriptor> {
        let mut reader = source.open()?;
        let frame_size = reader.frame_size();

        let mut detections = Vec::new();
        let mut sampled = 0;
        while sampled < self.config.sample_frames {
            let frame = match reader.read_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(CoreError::VideoRead { frame, reason }) => {
                    tracing::warn!(frame, %reason, sampled, "decode failed, sampling stopped");
                    break;
                }
                Err(e) => return Err(e.into()),
            };
            match self.detect_in_frame(&frame) {
                Some(geometry) => detections.push(geometry),
                None => tracing::trace!(frame = sampled, "no plausible arena contour"),
            }
            sampled += 1;
        }
        drop(reader);

        if detections.is_empty() {
            return Err(CoreError::ArenaNotFound {
                frames_sampled: sampled,
            }
            .into());
        }

        let geometry = median_geometry(&detections);
        tracing::info!(
            detections = detections.len(),
            sampled,
            ?geometry,
            "arena detected"
        );
        Ok(ArenaDescriptor::new(geometry, frame_size))
    }

    /// Best boundary fit in a single frame, if any contour is plausible.
    #[must_use]
    pub fn detect_in_frame(&self, frame: &RgbImage) -> Option<ArenaGeometry> {
        let (width, height) = frame.dimensions();
        if width < 3 || height < 3 {
            return None;
        }
        let binary = self.binarize(frame);
        let frame_center = FrameSize::new(width, height).center();
        let short_side = f64::from(width.min(height));
        let (min_radius, max_radius) = (
            self.config.min_radius_fraction * short_side,
            self.config.max_radius_fraction * short_side,
        );

        let mut best: Option<Candidate> = None;
        for contour in find_contours::<i32>(&binary) {
            if contour.points.len() < self.config.min_contour_points {
                continue;
            }
            let touches_border = contour.points.iter().any(|p| {
                p.x <= 0 || p.y <= 0 || p.x >= width as i32 - 1 || p.y >= height as i32 - 1
            });
            if touches_border {
                continue;
            }

            let points: Vec<Point2> = contour
                .points
                .iter()
                .map(|p| Point2::new(f64::from(p.x), f64::from(p.y)))
                .collect();
            let geometry = match self.config.shape {
                ArenaShape::Circular => fit_circle(&points)
                    .map(|(center, radius)| ArenaGeometry::Circle { center, radius }),
                ArenaShape::Elliptical => fit_ellipse(&points),
            };
            let Some(geometry) = geometry else { continue };

            let radius = geometry.pixel_diameter() / 2.0;
            if !(min_radius..=max_radius).contains(&radius) {
                continue;
            }
            let candidate = Candidate {
                geometry,
                points: points.len(),
                radius,
                offset: geometry.center().distance_to(&frame_center),
            };
            if best.map_or(true, |b| candidate.outranks(&b)) {
                best = Some(candidate);
            }
        }
        best.map(|c| c.geometry)
    }

    fn binarize(&self, frame: &RgbImage) -> image::GrayImage {
        let gray = image::imageops::grayscale(frame);
        let level = self.config.threshold.unwrap_or_else(|| otsu_level(&gray));
        let kind = if self.config.invert {
            ThresholdType::BinaryInverted
        } else {
            ThresholdType::Binary
        };
        let binary = threshold(&gray, level, kind);
        if self.config.median_radius == 0 {
            binary
        } else {
            median_filter(&binary, self.config.median_radius, self.config.median_radius)
        }
    }
}

/// Algebraic least-squares circle through `points`.
///
/// Returns `None` for fewer than three points or collinear input.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn fit_circle(points: &[Point2]) -> Option<(Point2, f64)> {
    if points.len() < 3 {
        return None;
    }
    let n = points.len() as f64;
    let mx = points.iter().map(|p| p.x).sum::<f64>() / n;
    let my = points.iter().map(|p| p.y).sum::<f64>() / n;

    let (mut suu, mut svv, mut suv) = (0.0, 0.0, 0.0);
    let (mut suuu, mut svvv, mut suvv, mut svuu) = (0.0, 0.0, 0.0, 0.0);
    for p in points {
        let (u, v) = (p.x - mx, p.y - my);
        suu += u * u;
        svv += v * v;
        suv += u * v;
        suuu += u * u * u;
        svvv += v * v * v;
        suvv += u * v * v;
        svuu += v * u * u;
    }

    let det = suu * svv - suv * suv;
    if det.abs() < f64::EPSILON {
        return None;
    }
    let bu = 0.5 * (suuu + suvv);
    let bv = 0.5 * (svvv + svuu);
    let uc = (bu * svv - bv * suv) / det;
    let vc = (suu * bv - suv * bu) / det;
    let radius = (uc * uc + vc * vc + (suu + svv) / n).sqrt();

    radius
        .is_finite()
        .then(|| (Point2::new(uc + mx, vc + my), radius + PIXEL_EDGE_OFFSET))
}

/// Ellipse with the same area moments as the polygon traced by `points`.
///
/// Returns `None` for degenerate polygons.
#[must_use]
pub fn fit_ellipse(points: &[Point2]) -> Option<ArenaGeometry> {
    if points.len() < 5 {
        return None;
    }
    let (mut area, mut sx, mut sy) = (0.0, 0.0, 0.0);
    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for (i, p) in points.iter().enumerate() {
        let q = points[(i + 1) % points.len()];
        let cross = p.x * q.y - q.x * p.y;
        area += cross;
        sx += (p.x + q.x) * cross;
        sy += (p.y + q.y) * cross;
        sxx += (p.x * p.x + p.x * q.x + q.x * q.x) * cross;
        syy += (p.y * p.y + p.y * q.y + q.y * q.y) * cross;
        sxy += (p.x * q.y + 2.0 * p.x * p.y + 2.0 * q.x * q.y + q.x * p.y) * cross;
    }
    area *= 0.5;
    if area.abs() < 1.0 {
        return None;
    }

    let cx = sx / (6.0 * area);
    let cy = sy / (6.0 * area);
    let mu20 = sxx / (12.0 * area) - cx * cx;
    let mu02 = syy / (12.0 * area) - cy * cy;
    let mu11 = sxy / (24.0 * area) - cx * cy;

    let mean = 0.5 * (mu20 + mu02);
    let spread = (0.25 * (mu20 - mu02).powi(2) + mu11 * mu11).sqrt();
    let (major, minor) = (mean + spread, mean - spread);
    if minor <= 0.0 {
        return None;
    }

    Some(ArenaGeometry::Ellipse {
        center: Point2::new(cx, cy),
        semi_major: 2.0 * major.sqrt() + PIXEL_EDGE_OFFSET,
        semi_minor: 2.0 * minor.sqrt() + PIXEL_EDGE_OFFSET,
        angle: 0.5 * (2.0 * mu11).atan2(mu20 - mu02),
    })
}

fn median(values: impl IntoIterator<Item = f64>) -> f64 {
    utils::nan_median(values).unwrap_or(f64::NAN)
}

fn median_geometry(detections: &[ArenaGeometry]) -> ArenaGeometry {
    let center = Point2::new(
        median(detections.iter().map(|g| g.center().x)),
        median(detections.iter().map(|g| g.center().y)),
    );
    match detections[0] {
        ArenaGeometry::Circle { .. } => ArenaGeometry::Circle {
            center,
            radius: median(detections.iter().map(|g| g.pixel_diameter() / 2.0)),
        },
        ArenaGeometry::Ellipse { .. } => {
            let component = |pick: fn(&ArenaGeometry) -> f64| median(detections.iter().map(pick));
            ArenaGeometry::Ellipse {
                center,
                semi_major: component(|g| match *g {
                    ArenaGeometry::Ellipse { semi_major, .. } => semi_major,
                    ArenaGeometry::Circle { radius, .. } => radius,
                }),
                semi_minor: component(|g| match *g {
                    ArenaGeometry::Ellipse { semi_minor, .. } => semi_minor,
                    ArenaGeometry::Circle { radius, .. } => radius,
                }),
                angle: component(|g| match *g {
                    ArenaGeometry::Ellipse { angle, .. } => angle,
                    ArenaGeometry::Circle { .. } => 0.0,
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::InMemoryVideo;
    use approx::assert_abs_diff_eq;
    use image::Rgb;
    use imageproc::drawing::{draw_filled_circle_mut, draw_filled_ellipse_mut};
    use std::f64::consts::PI;

    fn disk_frame(width: u32, height: u32, center: (i32, i32), radius: i32) -> RgbImage {
        let mut img = RgbImage::new(width, height);
        draw_filled_circle_mut(&mut img, center, radius, Rgb([230, 230, 230]));
        img
    }

    #[test]
    fn test_fit_circle_exact_points() {
        let points: Vec<Point2> = (0..36)
            .map(|i| {
                let t = f64::from(i) * PI / 18.0;
                Point2::new(50.0 + 20.0 * t.cos(), -10.0 + 20.0 * t.sin())
            })
            .collect();
        let (center, radius) = fit_circle(&points).unwrap();
        assert_abs_diff_eq!(center.x, 50.0, epsilon = 1e-9);
        assert_abs_diff_eq!(center.y, -10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(radius, 20.0 + PIXEL_EDGE_OFFSET, epsilon = 1e-9);
    }

    #[test]
    fn test_fit_circle_degenerate() {
        let line: Vec<Point2> = (0..10).map(|i| Point2::new(f64::from(i), 0.0)).collect();
        assert!(fit_circle(&line).is_none());
        assert!(fit_circle(&line[..2]).is_none());
    }

    #[test]
    fn test_detects_drawn_circle() {
        let frame = disk_frame(320, 240, (170, 115), 80);
        let detector = ArenaDetector::default();
        match detector.detect_in_frame(&frame) {
            Some(ArenaGeometry::Circle { center, radius }) => {
                assert!((center.x - 170.0).abs() <= 3.0, "center x {}", center.x);
                assert!((center.y - 115.0).abs() <= 3.0, "center y {}", center.y);
                assert!((radius - 80.0).abs() <= 3.0, "radius {radius}");
            }
            other => panic!("expected a circle, got {other:?}"),
        }
    }

    #[test]
    fn test_detects_drawn_ellipse() {
        let mut frame = RgbImage::new(320, 240);
        draw_filled_ellipse_mut(&mut frame, (160, 120), 100, 70, Rgb([255, 255, 255]));
        let detector = ArenaDetector::new(ArenaConfig {
            shape: ArenaShape::Elliptical,
            ..ArenaConfig::default()
        });
        match detector.detect_in_frame(&frame) {
            Some(ArenaGeometry::Ellipse {
                center,
                semi_major,
                semi_minor,
                angle,
            }) => {
                assert!((center.x - 160.0).abs() <= 3.0);
                assert!((center.y - 120.0).abs() <= 3.0);
                assert!((semi_major - 100.0).abs() <= 3.0, "major {semi_major}");
                assert!((semi_minor - 70.0).abs() <= 3.0, "minor {semi_minor}");
                assert!(angle.abs() < 0.05, "angle {angle}");
            }
            other => panic!("expected an ellipse, got {other:?}"),
        }
    }

    #[test]
    fn test_small_blobs_are_implausible() {
        let frame = disk_frame(320, 240, (160, 120), 10);
        assert!(ArenaDetector::default().detect_in_frame(&frame).is_none());
    }

    #[test]
    fn test_largest_contour_wins() {
        let mut frame = disk_frame(400, 300, (150, 150), 100);
        draw_filled_circle_mut(&mut frame, (330, 150), 62, Rgb([230, 230, 230]));
        match ArenaDetector::default().detect_in_frame(&frame) {
            Some(ArenaGeometry::Circle { center, .. }) => {
                assert!((center.x - 150.0).abs() <= 3.0);
            }
            other => panic!("expected a circle, got {other:?}"),
        }
    }

    #[test]
    fn test_detect_uses_median_of_frames() {
        let frames = vec![
            disk_frame(320, 240, (160, 120), 80),
            RgbImage::new(320, 240),
            disk_frame(320, 240, (162, 120), 80),
            disk_frame(320, 240, (161, 121), 81),
        ];
        let video = InMemoryVideo::new("arena", frames);
        let arena = ArenaDetector::default().detect(&video).unwrap();
        assert_eq!(arena.frame_size(), FrameSize::new(320, 240));
        let center = arena.geometry().center();
        assert!((center.x - 161.0).abs() <= 3.0);
        assert!((center.y - 120.0).abs() <= 3.0);
        assert_eq!(video.open_count(), 1);
        assert_eq!(video.open_readers(), 0);
    }

    #[test]
    fn test_blank_video_reports_arena_not_found() {
        let video = InMemoryVideo::new("blank", vec![RgbImage::new(64, 64); 4]);
        let err = ArenaDetector::default().detect(&video).unwrap_err();
        assert!(matches!(
            err.as_core(),
            Some(CoreError::ArenaNotFound { frames_sampled: 4 })
        ));
        assert_eq!(video.open_readers(), 0);
    }

    #[test]
    fn test_decode_failure_releases_reader() {
        let video = InMemoryVideo::new("broken", vec![RgbImage::new(64, 64); 4])
            .with_decode_failure_at(1);
        let err = ArenaDetector::default().detect(&video).unwrap_err();
        assert!(matches!(
            err.as_core(),
            Some(CoreError::ArenaNotFound { frames_sampled: 1 })
        ));
        assert_eq!(video.open_readers(), 0);
    }

    #[test]
    fn test_decode_failure_keeps_earlier_detections() {
        let video = InMemoryVideo::new("partial", vec![disk_frame(320, 240, (160, 120), 80); 5])
            .with_decode_failure_at(3);
        let arena = ArenaDetector::default().detect(&video).unwrap();
        match *arena.geometry() {
            ArenaGeometry::Circle { center, radius } => {
                assert!((center.x - 160.0).abs() <= 3.0, "center x {}", center.x);
                assert!((center.y - 120.0).abs() <= 3.0, "center y {}", center.y);
                assert!((radius - 80.0).abs() <= 3.0, "radius {radius}");
            }
            other => panic!("expected a circle, got {other:?}"),
        }
        assert_eq!(video.open_readers(), 0);
    }

    #[test]
    fn test_decode_failure_on_first_frame_finds_nothing() {
        let video = InMemoryVideo::new("corrupt", vec![disk_frame(320, 240, (160, 120), 80); 3])
            .with_decode_failure_at(0);
        let err = ArenaDetector::default().detect(&video).unwrap_err();
        assert!(matches!(
            err.as_core(),
            Some(CoreError::ArenaNotFound { frames_sampled: 0 })
        ));
    }
}
