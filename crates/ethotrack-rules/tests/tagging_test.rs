//! End-to-end tagging tests on synthetic sessions
//!
//! Every scenario places animals at hand-picked positions inside a
//! 380 px arena, so one pixel is one millimeter and the expected tags can be
//! read off the layout.

use std::sync::Arc;

use ethotrack_core::{
    AnimalId, ArenaDescriptor, ArenaGeometry, CoordinateTable, FrameSize, FrameWriter, PartKey,
    Point2,
};
use ethotrack_rules::{
    ArenaDetector, ArenaShape, BatchTagger, FrameCollector, ImageSequence, ImageSequenceWriter, InMemoryVideo,
    RenderStop, RuleBasedTagger, TaggingConfig, VideoContext, VideoOutcome,
};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_ellipse_mut};
use ndarray::Array2;

/// Body parts from nose to tail: fraction along the body axis and sideways
/// offset in units of the lateral spread.
const LAYOUT: [(&str, f64, f64); 11] = [
    ("Nose", 0.0, 0.0),
    ("Left_ear", 0.1, 1.0),
    ("Right_ear", 0.1, -1.0),
    ("Spine_1", 0.25, 0.0),
    ("Left_fhip", 0.35, 1.0),
    ("Right_fhip", 0.35, -1.0),
    ("Center", 0.5, 0.0),
    ("Spine_2", 0.7, 0.0),
    ("Left_bhip", 0.8, 1.0),
    ("Right_bhip", 0.8, -1.0),
    ("Tail_base", 1.0, 0.0),
];

/// A 380 px circular arena centered at (300, 300)
fn arena() -> ArenaDescriptor {
    ArenaDescriptor::new(
        ArenaGeometry::Circle {
            center: Point2::new(300.0, 300.0),
            radius: 190.0,
        },
        FrameSize::new(600, 600),
    )
}

/// Inserts an animal whose nose and tail base follow `pose(frame)`.
fn insert_animal<F>(table: &mut CoordinateTable, animal: Option<&AnimalId>, lateral: f64, pose: F)
where
    F: Fn(usize) -> ((f64, f64), (f64, f64)),
{
    let n = table.n_frames();
    for (part, along, side) in LAYOUT {
        let points = Array2::from_shape_fn((n, 2), |(t, j)| {
            let ((nx, ny), (tx, ty)) = pose(t);
            let (dx, dy) = (tx - nx, ty - ny);
            let len = dx.hypot(dy);
            // Unit normal to the body axis
            let (ux, uy) = (-dy / len, dx / len);
            if j == 0 {
                nx + along * dx + side * lateral * ux
            } else {
                ny + along * dy + side * lateral * uy
            }
        });
        table.insert(PartKey::of(animal, part), points).unwrap();
    }
}

fn still(nose: (f64, f64), tail: (f64, f64)) -> impl Fn(usize) -> ((f64, f64), (f64, f64)) {
    move |_| (nose, tail)
}

fn disk_frame() -> RgbImage {
    let mut img = RgbImage::new(600, 600);
    draw_filled_circle_mut(&mut img, (300, 300), 190, Rgb([235, 235, 235]));
    img
}

/// A's nose reaches B's tail base at frame 60 and stays there; with a
/// 20-frame window the following tag switches on at frame 80.
#[test]
fn test_following_switches_on_after_full_window() {
    let (a, b) = (AnimalId::new("A"), AnimalId::new("B"));
    let mut coords = CoordinateTable::new(100);
    insert_animal(&mut coords, Some(&b), 4.0, still((300.0, 300.0), (260.0, 300.0)));
    insert_animal(&mut coords, Some(&a), 4.0, |t| {
        if t < 60 {
            ((256.0, 150.0), (216.0, 150.0))
        } else {
            ((256.0, 300.0), (216.0, 300.0))
        }
    });

    let mut config = TaggingConfig::with_animals(["A", "B"]);
    config.follow.frames = 20;
    config.follow.tol = 10.0;
    let tagger = RuleBasedTagger::new(config).unwrap();
    let mut video = VideoContext::new("follow", coords).with_arena(arena());
    let table = tagger.tag(&mut video).unwrap();

    let following = table.flags("A_B_following").unwrap();
    assert_eq!(following.len(), 100);
    assert!(following[..80].iter().all(|&f| !f));
    assert!(following[80..].iter().all(|&f| f));
    assert!(table.flags("B_A_following").unwrap().iter().all(|&f| !f));

    let nose2tail = table.flags("A_B_nose2tail").unwrap();
    assert!(!nose2tail[59] && nose2tail[60]);
}

#[test]
fn test_every_column_has_one_row_per_frame() {
    let mut coords = CoordinateTable::new(37);
    insert_animal(&mut coords, Some(&AnimalId::new("A")), 4.0, |t| {
        let x = 200.0 + t as f64;
        ((x, 300.0), (x - 40.0, 300.0))
    });
    let (b, c) = (AnimalId::new("B"), AnimalId::new("C"));
    insert_animal(&mut coords, Some(&b), 4.0, still((350.0, 350.0), (390.0, 350.0)));
    insert_animal(&mut coords, Some(&c), 4.0, still((300.0, 200.0), (300.0, 160.0)));

    let tagger = RuleBasedTagger::new(TaggingConfig::with_animals(["A", "B", "C"])).unwrap();
    let table = tagger
        .tag(&mut VideoContext::new("trio", coords).with_arena(arena()))
        .unwrap();

    assert_eq!(table.n_frames(), 37);
    // 3 subjects x 4 columns + 3 pairs x 9 columns
    assert_eq!(table.len(), 3 * 4 + 3 * 9);
    for (name, column) in table.iter() {
        assert_eq!(column.len(), 37, "column {name}");
    }
}

#[test]
fn test_huddle_needs_both_sides() {
    let mut compact = CoordinateTable::new(12);
    insert_animal(&mut compact, None, 4.0, still((320.0, 300.0), (280.0, 300.0)));
    let tagger = RuleBasedTagger::new(TaggingConfig::default()).unwrap();
    let table = tagger
        .tag(&mut VideoContext::new("compact", compact.clone()).with_arena(arena()))
        .unwrap();
    assert!(table.flags("huddle").unwrap().iter().all(|&h| h));

    // Splay only the left forepaw far from the left ear
    let mut splayed = compact;
    let paw = Array2::from_shape_fn((12, 2), |(_, j)| if j == 0 { 306.0 } else { 324.0 });
    splayed.insert(PartKey::new("Left_fhip"), paw).unwrap();
    let table = tagger
        .tag(&mut VideoContext::new("splayed", splayed).with_arena(arena()))
        .unwrap();
    assert!(table.flags("huddle").unwrap().iter().all(|&h| !h));
}

#[test]
fn test_side_contacts_follow_orientation() {
    let mut config = TaggingConfig::with_animals(["A", "B"]);
    config.contact.side_tol = 20.0;
    let tagger = RuleBasedTagger::new(config).unwrap();
    let (a, b) = (AnimalId::new("A"), AnimalId::new("B"));

    let mut parallel = CoordinateTable::new(6);
    insert_animal(&mut parallel, Some(&a), 4.0, still((300.0, 300.0), (260.0, 300.0)));
    insert_animal(&mut parallel, Some(&b), 4.0, still((300.0, 310.0), (260.0, 310.0)));
    let table = tagger
        .tag(&mut VideoContext::new("parallel", parallel).with_arena(arena()))
        .unwrap();
    assert!(table.flags("A_B_sidebyside").unwrap().iter().all(|&c| c));
    assert!(table.flags("A_B_sidereside").unwrap().iter().all(|&c| !c));

    let mut opposed = CoordinateTable::new(6);
    insert_animal(&mut opposed, Some(&a), 4.0, still((300.0, 300.0), (260.0, 300.0)));
    insert_animal(&mut opposed, Some(&b), 4.0, still((265.0, 310.0), (305.0, 310.0)));
    let table = tagger
        .tag(&mut VideoContext::new("opposed", opposed).with_arena(arena()))
        .unwrap();
    assert!(table.flags("A_B_sidebyside").unwrap().iter().all(|&c| !c));
    assert!(table.flags("A_B_sidereside").unwrap().iter().all(|&c| c));
}

#[test]
fn test_image_sequence_detect_tag_and_render() {
    let dir = tempfile::tempdir().unwrap();
    let frames_dir = dir.path().join("cage_01");
    let mut writer = ImageSequenceWriter::create(&frames_dir).unwrap();
    for _ in 0..4 {
        writer.write_frame(&disk_frame()).unwrap();
    }
    writer.finish().unwrap();

    let sequence = Arc::new(ImageSequence::new(&frames_dir));
    let arena = ArenaDetector::default().detect(sequence.as_ref()).unwrap();
    match *arena.geometry() {
        ArenaGeometry::Circle { center, radius } => {
            assert!((center.x - 300.0).abs() <= 3.0, "center x {}", center.x);
            assert!((center.y - 300.0).abs() <= 3.0, "center y {}", center.y);
            assert!((radius - 190.0).abs() <= 3.0, "radius {radius}");
        }
        other => panic!("expected a circle, got {other:?}"),
    }

    let mut coords = CoordinateTable::new(4);
    insert_animal(&mut coords, None, 4.0, still((320.0, 300.0), (280.0, 300.0)));
    let tagger = RuleBasedTagger::new(TaggingConfig::default()).unwrap();
    let mut video = VideoContext::new("cage_01", coords).with_video(sequence);
    let table = tagger.tag(&mut video).unwrap();
    assert_eq!(video.arena_detections(), 1);

    let mut sink = FrameCollector::new();
    let summary = tagger.render(&mut video, &table, &mut sink).unwrap();
    assert_eq!(summary.frames_written, 4);
    assert_eq!(summary.stop, RenderStop::Completed);
    assert_eq!(sink.frames()[0].dimensions(), (600, 600));
}

/// Nose against the wall on the short axis for 10 frames, then near but
/// inside the wall on the long axis.
fn wall_visits() -> CoordinateTable {
    let mut coords = CoordinateTable::new(20);
    insert_animal(&mut coords, None, 4.0, |t| {
        if t < 10 {
            ((300.0, 445.0), (300.0, 405.0))
        } else {
            ((485.0, 300.0), (445.0, 300.0))
        }
    });
    coords
}

#[test]
fn test_elliptical_arena_drives_climbing() {
    let mut frame = RgbImage::new(600, 600);
    draw_filled_ellipse_mut(&mut frame, (300, 300), 200, 150, Rgb([235, 235, 235]));
    let source = Arc::new(InMemoryVideo::new("oval", vec![frame; 3]));

    let mut config = TaggingConfig::default();
    config.arena.shape = ArenaShape::Elliptical;
    let tagger = RuleBasedTagger::new(config).unwrap();
    let mut video = VideoContext::new("oval", wall_visits()).with_video(source);
    let table = tagger.tag(&mut video).unwrap();

    match *video.arena().unwrap().geometry() {
        ArenaGeometry::Ellipse {
            semi_major,
            semi_minor,
            ..
        } => {
            assert!((semi_major - 200.0).abs() <= 3.0, "major {semi_major}");
            assert!((semi_minor - 150.0).abs() <= 3.0, "minor {semi_minor}");
        }
        other => panic!("expected an ellipse, got {other:?}"),
    }
    // 380 mm over a 350 px mean diameter puts the 10 mm tolerance at ~9.2 px
    let climbing = table.flags("climbing").unwrap();
    assert!(climbing[..10].iter().all(|&c| c));
    assert!(climbing[10..].iter().all(|&c| !c));

    // A circle with the same mean diameter flips both visits
    let circle = ArenaDescriptor::new(
        ArenaGeometry::Circle {
            center: Point2::new(300.0, 300.0),
            radius: 175.0,
        },
        FrameSize::new(600, 600),
    );
    let table = tagger
        .tag(&mut VideoContext::new("round", wall_visits()).with_arena(circle))
        .unwrap();
    let climbing = table.flags("climbing").unwrap();
    assert!(climbing[..10].iter().all(|&c| !c));
    assert!(climbing[10..].iter().all(|&c| c));
}

#[test]
fn test_batch_reports_unreadable_and_arenaless_videos() {
    let dir = tempfile::tempdir().unwrap();
    let mut coords = CoordinateTable::new(10);
    insert_animal(&mut coords, None, 4.0, still((320.0, 300.0), (280.0, 300.0)));

    let videos = vec![
        VideoContext::new("missing", coords.clone())
            .with_video(Arc::new(ImageSequence::new(dir.path().join("missing")))),
        VideoContext::new("blank", coords.clone()).with_video(Arc::new(InMemoryVideo::new(
            "blank",
            vec![RgbImage::new(600, 600); 3],
        ))),
        VideoContext::new("arena", coords.clone()).with_video(Arc::new(InMemoryVideo::new(
            "arena",
            vec![disk_frame(); 3],
        ))),
        VideoContext::new("known", coords).with_arena(arena()),
    ];

    let report = BatchTagger::new(TaggingConfig::default())
        .unwrap()
        .run(videos)
        .unwrap();
    assert_eq!(report.len(), 4);
    let failed: Vec<&str> = report.failed().map(VideoOutcome::name).collect();
    assert_eq!(failed, vec!["missing", "blank"]);
    for outcome in report.tagged() {
        assert_eq!(outcome.table().unwrap().n_frames(), 10);
    }
}
