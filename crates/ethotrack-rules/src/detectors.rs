//! Contact and posture detectors.
//!
//! Every detector is a pure function over frame-aligned inputs that returns
//! one Boolean per frame. Thresholds come from the per-detector configuration
//! structs in [`crate::config`] and are in real-world units.
//!
//! Missing values (`NaN`) never satisfy a condition, so a frame with an
//! occluded part is tagged `false`. Inputs of different lengths are rejected
//! with [`CoreError::InputAlignment`].

use ethotrack_core::{
    geometry, ArenaDescriptor, ArenaGeometry, CoreError, CoreResult, DistanceTable, PartKey,
    Point2, RealScale,
};
use ndarray::{ArrayView1, ArrayView2};

use crate::config::{ClimbConfig, ExplorationConfig, FollowConfig, HuddleConfig, SniffConfig};

fn ensure_aligned(context: &str, expected: usize, lengths: &[usize]) -> CoreResult<()> {
    match lengths.iter().find(|&&len| len != expected) {
        Some(&actual) => Err(CoreError::input_alignment(context, expected, actual)),
        None => Ok(()),
    }
}

// =============================================================================
// Proximity contacts
// =============================================================================

/// Frames where `part` is within `tol` of at least one of `targets`.
///
/// # Errors
///
/// Returns [`CoreError::Validation`] for an empty target list and
/// [`CoreError::MissingBodyPart`] if a pair is absent from `distances`.
pub fn single_contact(
    distances: &DistanceTable,
    part: &PartKey,
    targets: &[PartKey],
    tol: f64,
) -> CoreResult<Vec<bool>> {
    if targets.is_empty() {
        return Err(CoreError::validation(format!("no contact targets for {part}")));
    }
    let columns = targets
        .iter()
        .map(|target| distances.between(part, target))
        .collect::<CoreResult<Vec<_>>>()?;
    Ok((0..distances.n_frames())
        .map(|t| columns.iter().any(|d| d[t] <= tol))
        .collect())
}

/// Two body-part pairs of two animals, matched point by point.
#[derive(Debug, Clone, Copy)]
pub struct ContactPairs<'a> {
    /// First part of the first animal
    pub left1: &'a PartKey,
    /// Second part of the first animal
    pub left2: &'a PartKey,
    /// First part of the second animal
    pub right1: &'a PartKey,
    /// Second part of the second animal
    pub right2: &'a PartKey,
}

/// Frames where both point pairs are within `tol` at once.
///
/// Plain mode matches `left1~right1` and `left2~right2`. Reversed mode
/// matches `right1~left2` and `right2~left1`, so nose-to-nose becomes
/// nose-to-tail and side-by-side becomes side-by-side reversed.
///
/// # Errors
///
/// Returns [`CoreError::MissingBodyPart`] if a pair is absent from `distances`.
pub fn double_contact(
    distances: &DistanceTable,
    pairs: ContactPairs<'_>,
    tol: f64,
    reversed: bool,
) -> CoreResult<Vec<bool>> {
    let (a, b) = if reversed {
        (
            distances.between(pairs.right1, pairs.left2)?,
            distances.between(pairs.right2, pairs.left1)?,
        )
    } else {
        (
            distances.between(pairs.left1, pairs.right1)?,
            distances.between(pairs.left2, pairs.right2)?,
        )
    };
    Ok(a.iter().zip(b.iter()).map(|(&x, &y)| x <= tol && y <= tol).collect())
}

// =============================================================================
// Arena wall
// =============================================================================

/// Normalized elliptical radius of `point`: 1.0 on the boundary grown by
/// `margin_mm`, below 1.0 inside it.
fn boundary_level(point: Point2, arena: &ArenaDescriptor, scale: RealScale, margin_mm: f64) -> f64 {
    let (center, a, b, angle) = match *arena.geometry() {
        ArenaGeometry::Circle { center, radius } => (center, radius, radius, 0.0),
        ArenaGeometry::Ellipse {
            center,
            semi_major,
            semi_minor,
            angle,
        } => (center, semi_major, semi_minor, angle),
    };
    let local = geometry::rotate_point(point, -angle, center);
    let factor = scale.factor();
    let a = a * factor + margin_mm;
    let b = b * factor + margin_mm;
    if a <= 0.0 || b <= 0.0 {
        return f64::INFINITY;
    }
    let dx = (local.x - center.x) * factor / a;
    let dy = (local.y - center.y) * factor / b;
    dx * dx + dy * dy
}

fn row_point(points: ArrayView2<'_, f64>, t: usize) -> Point2 {
    Point2::new(points[[t, 0]], points[[t, 1]])
}

/// Frames where the nose lies within `tol` of the arena boundary or beyond.
///
/// For a circle this is `|nose - center| >= radius - tol`. Ellipses are
/// handled by rotating the nose into the ellipse frame.
#[must_use]
pub fn climbing(
    nose: ArrayView2<'_, f64>,
    arena: &ArenaDescriptor,
    scale: RealScale,
    config: &ClimbConfig,
) -> Vec<bool> {
    (0..nose.nrows())
        .map(|t| boundary_level(row_point(nose, t), arena, scale, -config.tol) >= 1.0)
        .collect()
}

/// Frames where the nose is inside a ring of `±tol` around the arena
/// boundary while the center barely moves.
///
/// # Errors
///
/// Returns [`CoreError::InputAlignment`] if the inputs differ in length.
pub fn sniffing(
    nose: ArrayView2<'_, f64>,
    center_speed: ArrayView1<'_, f64>,
    arena: &ArenaDescriptor,
    scale: RealScale,
    config: &SniffConfig,
) -> CoreResult<Vec<bool>> {
    ensure_aligned("sniffing", nose.nrows(), &[center_speed.len()])?;
    Ok((0..nose.nrows())
        .map(|t| {
            let p = row_point(nose, t);
            boundary_level(p, arena, scale, -config.tol) >= 1.0
                && boundary_level(p, arena, scale, config.tol) <= 1.0
                && center_speed[t] < config.speed_tol
        })
        .collect())
}

// =============================================================================
// Posture
// =============================================================================

/// Frame-aligned inputs of the huddling rule.
#[derive(Debug, Clone)]
pub struct HuddleInputs<'a> {
    /// Left ear to left forepaw distance
    pub left_ear_forepaw: ArrayView1<'a, f64>,
    /// Right ear to right forepaw distance
    pub right_ear_forepaw: ArrayView1<'a, f64>,
    /// Lengths of consecutive spine segments
    pub spine_segments: Vec<ArrayView1<'a, f64>>,
    /// Speed of the body center
    pub center_speed: ArrayView1<'a, f64>,
}

/// Frames where the animal is hunched and still.
///
/// All of the following must hold in the same frame:
/// - both ear-to-forepaw distances are below `forward_tol`
/// - the mean spine segment length is below `spine_tol`
/// - the center speed is below `speed_tol`
///
/// # Errors
///
/// Returns [`CoreError::InputAlignment`] if the inputs differ in length and
/// [`CoreError::Validation`] if no spine segment is given.
pub fn huddling(inputs: &HuddleInputs<'_>, config: &HuddleConfig) -> CoreResult<Vec<bool>> {
    let n = inputs.center_speed.len();
    let mut lengths = vec![inputs.left_ear_forepaw.len(), inputs.right_ear_forepaw.len()];
    lengths.extend(inputs.spine_segments.iter().map(|s| s.len()));
    ensure_aligned("huddling", n, &lengths)?;
    if inputs.spine_segments.is_empty() {
        return Err(CoreError::validation("huddling needs at least one spine segment"));
    }

    #[allow(clippy::cast_precision_loss)]
    let segments = inputs.spine_segments.len() as f64;
    Ok((0..n)
        .map(|t| {
            let forward = inputs.left_ear_forepaw[t] < config.forward_tol
                && inputs.right_ear_forepaw[t] < config.forward_tol;
            let mean_segment = inputs.spine_segments.iter().map(|s| s[t]).sum::<f64>() / segments;
            let spine = mean_segment < config.spine_tol;
            let still = inputs.center_speed[t] < config.speed_tol;
            forward && spine && still
        })
        .collect())
}

/// Frames where the animal is still with its nose hidden.
///
/// # Errors
///
/// Returns [`CoreError::InputAlignment`] if the inputs differ in length.
pub fn digging(
    center_speed: ArrayView1<'_, f64>,
    nose_likelihood: ArrayView1<'_, f64>,
    config: &ExplorationConfig,
) -> CoreResult<Vec<bool>> {
    ensure_aligned("digging", center_speed.len(), &[nose_likelihood.len()])?;
    Ok(center_speed
        .iter()
        .zip(nose_likelihood.iter())
        .map(|(&speed, &p)| speed < config.speed_tol && p < config.nose_likelihood)
        .collect())
}

/// Frames where the body is still but the visible nose moves faster.
///
/// # Errors
///
/// Returns [`CoreError::InputAlignment`] if the inputs differ in length.
pub fn looking_around(
    center_speed: ArrayView1<'_, f64>,
    nose_speed: ArrayView1<'_, f64>,
    nose_likelihood: ArrayView1<'_, f64>,
    config: &ExplorationConfig,
) -> CoreResult<Vec<bool>> {
    let n = center_speed.len();
    ensure_aligned("looking_around", n, &[nose_speed.len(), nose_likelihood.len()])?;
    Ok((0..n)
        .map(|t| {
            center_speed[t] < config.speed_tol
                && center_speed[t] < nose_speed[t]
                && nose_likelihood[t] > config.nose_likelihood
        })
        .collect())
}

// =============================================================================
// Following
// =============================================================================

/// Trajectories of a follower and the animal it may be following.
#[derive(Debug, Clone, Copy)]
pub struct FollowInputs<'a> {
    /// Follower nose
    pub follower_nose: ArrayView2<'a, f64>,
    /// Follower tail base
    pub follower_tail: ArrayView2<'a, f64>,
    /// Followed nose
    pub followed_nose: ArrayView2<'a, f64>,
    /// Followed tail base
    pub followed_tail: ArrayView2<'a, f64>,
}

/// Frames where the follower has been tracking the other animal's path for
/// the whole trailing window.
///
/// A frame `s` is on the path when the follower's nose is within `tol` of
/// where the followed tail base was during the `frames` frames up to `s`,
/// and the follower faces the followed tail: its nose is closer to that tail
/// than its own tail base is, and closer to that tail than to the followed
/// nose. Frame `t` is tagged when every frame in `[t - frames, t]` is on the
/// path, so the first `frames` frames are never tagged.
///
/// # Errors
///
/// Returns [`CoreError::InputAlignment`] if the trajectories differ in length.
pub fn following_path(
    inputs: FollowInputs<'_>,
    scale: RealScale,
    config: &FollowConfig,
) -> CoreResult<Vec<bool>> {
    let n = inputs.follower_nose.nrows();
    ensure_aligned(
        "following_path",
        n,
        &[
            inputs.follower_tail.nrows(),
            inputs.followed_nose.nrows(),
            inputs.followed_tail.nrows(),
        ],
    )?;
    let factor = scale.factor();
    let dist = |a: ArrayView2<'_, f64>, s: usize, b: ArrayView2<'_, f64>, u: usize| {
        row_point(a, s).distance_to(&row_point(b, u)) * factor
    };

    let on_path: Vec<bool> = (0..n)
        .map(|s| {
            let near_path = (0..config.frames.min(s + 1))
                .map(|lag| dist(inputs.follower_nose, s, inputs.followed_tail, s - lag))
                .filter(|d| !d.is_nan())
                .any(|d| d < config.tol);
            let nose_to_tail = dist(inputs.follower_nose, s, inputs.followed_tail, s);
            near_path
                && nose_to_tail < dist(inputs.follower_tail, s, inputs.followed_tail, s)
                && nose_to_tail < dist(inputs.follower_nose, s, inputs.followed_nose, s)
        })
        .collect();

    // Length of the run of on-path frames ending at each frame.
    let mut run = 0usize;
    Ok(on_path
        .iter()
        .map(|&hit| {
            run = if hit { run + 1 } else { 0 };
            run > config.frames
        })
        .collect())
}
