//! Vector-math primitives over frame-indexed point sequences.
//!
//! Every function takes `n x 2` (or `n x 3`) arrays whose rows are frames and
//! returns one value per frame. The third coordinate of 3D encodings is
//! carried through but never enters the geometry. These are stateless
//! kernels; the feature extractors and detectors build on them.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Zip};
use num_complex::Complex64;

use crate::error::{CoreError, CoreResult};
use crate::types::{Point2, RealScale};

fn check_points(context: &str, points: &ArrayView2<'_, f64>) -> CoreResult<()> {
    if points.ncols() < 2 {
        return Err(CoreError::shape_mismatch(context, 2, points.ncols()));
    }
    Ok(())
}

fn check_same_shape(
    context: &str,
    a: &ArrayView2<'_, f64>,
    b: &ArrayView2<'_, f64>,
) -> CoreResult<()> {
    check_points(context, a)?;
    if a.nrows() != b.nrows() {
        return Err(CoreError::shape_mismatch(context, a.nrows(), b.nrows()));
    }
    if a.ncols() != b.ncols() {
        return Err(CoreError::shape_mismatch(context, a.ncols(), b.ncols()));
    }
    Ok(())
}

/// Per-frame Euclidean distance between two point sequences, rescaled to
/// real-world units by `scale`.
///
/// # Errors
///
/// Returns [`CoreError::ShapeMismatch`] if the sequences differ in length or
/// point encoding.
pub fn distance(
    a: ArrayView2<'_, f64>,
    b: ArrayView2<'_, f64>,
    scale: RealScale,
) -> CoreResult<Array1<f64>> {
    check_same_shape("distance", &a, &b)?;
    let factor = scale.factor();
    Ok(a.outer_iter()
        .zip(b.outer_iter())
        .map(|(p, q)| (q[0] - p[0]).hypot(q[1] - p[1]) * factor)
        .collect())
}

/// Angle at vertex `b` between rays `b -> a` and `b -> c`, in radians.
///
/// The cosine is clamped to `[-1, 1]` before `acos`. Frames where either ray
/// has zero length yield `NaN`.
///
/// # Errors
///
/// Returns [`CoreError::ShapeMismatch`] if the three sequences are not aligned.
pub fn angle(
    a: ArrayView2<'_, f64>,
    b: ArrayView2<'_, f64>,
    c: ArrayView2<'_, f64>,
) -> CoreResult<Array1<f64>> {
    check_same_shape("angle", &a, &b)?;
    check_same_shape("angle", &b, &c)?;

    let mut out = Array1::zeros(a.nrows());
    Zip::from(&mut out)
        .and(a.rows())
        .and(b.rows())
        .and(c.rows())
        .for_each(|out, pa, pb, pc| {
            let (ux, uy) = (pa[0] - pb[0], pa[1] - pb[1]);
            let (vx, vy) = (pc[0] - pb[0], pc[1] - pb[1]);
            let cos = ux.mul_add(vx, uy * vy) / (ux.hypot(uy) * vx.hypot(vy));
            *out = cos.clamp(-1.0, 1.0).acos();
        });
    Ok(out)
}

/// Rotates a single point by `angle` radians around `origin`.
#[must_use]
pub fn rotate_point(point: Point2, angle: f64, origin: Point2) -> Point2 {
    let (sin, cos) = angle.sin_cos();
    let (dx, dy) = (point.x - origin.x, point.y - origin.y);
    Point2::new(
        origin.x + cos.mul_add(dx, -sin * dy),
        origin.y + sin.mul_add(dx, cos * dy),
    )
}

/// Rotates each point by its frame's angle around `origin`.
///
/// `angles` must either hold one angle per frame or a single angle applied
/// to every frame.
///
/// # Errors
///
/// Returns [`CoreError::ShapeMismatch`] if `angles` is neither frame-aligned
/// nor a single value.
pub fn rotate(
    points: ArrayView2<'_, f64>,
    angles: ArrayView1<'_, f64>,
    origin: Point2,
) -> CoreResult<Array2<f64>> {
    check_points("rotate", &points)?;
    if angles.len() != 1 && angles.len() != points.nrows() {
        return Err(CoreError::shape_mismatch(
            "rotate",
            points.nrows(),
            angles.len(),
        ));
    }

    let mut out = points.to_owned();
    for (i, mut row) in out.outer_iter_mut().enumerate() {
        let theta = if angles.len() == 1 { angles[0] } else { angles[i] };
        let rotated = rotate_point(Point2::new(row[0], row[1]), theta, origin);
        row[0] = rotated.x;
        row[1] = rotated.y;
    }
    Ok(out)
}

/// Converts Cartesian points to `(rho, phi)` columns.
///
/// # Errors
///
/// Returns [`CoreError::ShapeMismatch`] for point encodings narrower than 2D.
pub fn to_polar(points: ArrayView2<'_, f64>) -> CoreResult<Array2<f64>> {
    check_points("to_polar", &points)?;
    let mut out = Array2::zeros((points.nrows(), 2));
    for (row, mut dst) in points.outer_iter().zip(out.outer_iter_mut()) {
        let (rho, phi) = Complex64::new(row[0], row[1]).to_polar();
        dst[0] = rho;
        dst[1] = phi;
    }
    Ok(out)
}

/// Converts `(rho, phi)` columns back to Cartesian points.
///
/// # Errors
///
/// Returns [`CoreError::ShapeMismatch`] unless the input has two columns.
pub fn from_polar(polar: ArrayView2<'_, f64>) -> CoreResult<Array2<f64>> {
    if polar.ncols() != 2 {
        return Err(CoreError::shape_mismatch("from_polar", 2, polar.ncols()));
    }
    let mut out = Array2::zeros((polar.nrows(), 2));
    for (row, mut dst) in polar.outer_iter().zip(out.outer_iter_mut()) {
        let z = Complex64::from_polar(row[0], row[1]);
        dst[0] = z.re;
        dst[1] = z.im;
    }
    Ok(out)
}

/// Per-frame area of the polygon whose vertices are the given sequences,
/// in vertex order (shoelace formula), scaled to squared real-world units.
///
/// # Errors
///
/// Returns [`CoreError::ShapeMismatch`] with fewer than three vertices or
/// misaligned sequences.
pub fn polygon_area(vertices: &[ArrayView2<'_, f64>], scale: RealScale) -> CoreResult<Array1<f64>> {
    if vertices.len() < 3 {
        return Err(CoreError::shape_mismatch("polygon_area", 3, vertices.len()));
    }
    for v in &vertices[1..] {
        check_same_shape("polygon_area", &vertices[0], v)?;
    }

    let factor = scale.factor().powi(2);
    let n_frames = vertices[0].nrows();
    Ok((0..n_frames)
        .map(|t| {
            let twice: f64 = (0..vertices.len())
                .map(|i| {
                    let p = vertices[i].row(t);
                    let q = vertices[(i + 1) % vertices.len()].row(t);
                    p[0].mul_add(q[1], -q[0] * p[1])
                })
                .sum();
            0.5 * twice.abs() * factor
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array};
    use proptest::prelude::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_distance_scaled() {
        let a = array![[0.0, 0.0], [1.0, 1.0]];
        let b = array![[3.0, 4.0], [1.0, 1.0]];
        let d = distance(a.view(), b.view(), RealScale::new(380.0, 190.0)).unwrap();
        assert_abs_diff_eq!(d[0], 10.0, epsilon = 1e-12);
        assert_abs_diff_eq!(d[1], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_distance_ignores_third_coordinate() {
        let a = array![[0.0, 0.0, 5.0]];
        let b = array![[3.0, 4.0, -7.0]];
        let d = distance(a.view(), b.view(), RealScale::identity()).unwrap();
        assert_abs_diff_eq!(d[0], 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_distance_shape_mismatch() {
        let a = Array2::<f64>::zeros((5, 2));
        let b = Array2::<f64>::zeros((4, 2));
        assert!(matches!(
            distance(a.view(), b.view(), RealScale::identity()),
            Err(CoreError::ShapeMismatch { .. })
        ));
        let c = Array2::<f64>::zeros((5, 3));
        assert!(distance(a.view(), c.view(), RealScale::identity()).is_err());
    }

    #[test]
    fn test_distance_propagates_nan() {
        let a = array![[f64::NAN, 0.0]];
        let b = array![[1.0, 1.0]];
        let d = distance(a.view(), b.view(), RealScale::identity()).unwrap();
        assert!(d[0].is_nan());
    }

    #[test]
    fn test_right_angle() {
        let a = array![[1.0, 0.0]];
        let b = array![[0.0, 0.0]];
        let c = array![[0.0, 1.0]];
        let theta = angle(a.view(), b.view(), c.view()).unwrap();
        assert_abs_diff_eq!(theta[0], FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn test_collinear_angle_is_clamped() {
        let a = array![[1e8, 1e-8]];
        let b = array![[0.0, 0.0]];
        let c = array![[-3e8, -3e-8]];
        let theta = angle(a.view(), b.view(), c.view()).unwrap();
        assert!(!theta[0].is_nan());
        assert_abs_diff_eq!(theta[0], PI, epsilon = 1e-6);
    }

    #[test]
    fn test_rotate_quarter_turn_about_origin() {
        let points = array![[1.0, 0.0], [2.0, 2.0]];
        let rotated = rotate(points.view(), array![FRAC_PI_2].view(), Point2::new(1.0, 1.0)).unwrap();
        assert_abs_diff_eq!(rotated[[0, 0]], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(rotated[[0, 1]], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(rotated[[1, 0]], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(rotated[[1, 1]], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rotate_rejects_misaligned_angles() {
        let points = Array2::<f64>::zeros((4, 2));
        let angles = Array::zeros(3);
        assert!(rotate(points.view(), angles.view(), Point2::default()).is_err());
    }

    #[test]
    fn test_polygon_area_unit_square() {
        let p0 = array![[0.0, 0.0]];
        let p1 = array![[1.0, 0.0]];
        let p2 = array![[1.0, 1.0]];
        let p3 = array![[0.0, 1.0]];
        let area = polygon_area(
            &[p0.view(), p1.view(), p2.view(), p3.view()],
            RealScale::new(2.0, 1.0),
        )
        .unwrap();
        assert_abs_diff_eq!(area[0], 4.0, epsilon = 1e-12);
        assert!(polygon_area(&[p0.view(), p1.view()], RealScale::identity()).is_err());
    }

    fn points(n: usize) -> impl Strategy<Value = Array2<f64>> {
        prop::collection::vec(-500.0f64..500.0, n * 2)
            .prop_map(move |v| Array2::from_shape_vec((n, 2), v).unwrap())
    }

    proptest! {
        #[test]
        fn prop_distance_is_symmetric(a in points(16), b in points(16)) {
            let ab = distance(a.view(), b.view(), RealScale::new(380.0, 420.0)).unwrap();
            let ba = distance(b.view(), a.view(), RealScale::new(380.0, 420.0)).unwrap();
            prop_assert_eq!(ab, ba);
        }

        #[test]
        fn prop_angle_invariant_under_translation_and_scale(
            a in points(8), b in points(8), c in points(8),
            dx in -100.0f64..100.0, dy in -100.0f64..100.0, k in 0.1f64..10.0,
        ) {
            let base = angle(a.view(), b.view(), c.view()).unwrap();
            let shift = |p: &Array2<f64>| {
                let mut q = p.mapv(|v| v * k);
                q.column_mut(0).mapv_inplace(|v| v + dx);
                q.column_mut(1).mapv_inplace(|v| v + dy);
                q
            };
            let moved = angle(shift(&a).view(), shift(&b).view(), shift(&c).view()).unwrap();
            for (x, y) in base.iter().zip(moved.iter()) {
                if x.is_finite() && y.is_finite() {
                    prop_assert!((x - y).abs() < 1e-6);
                }
            }
        }

        #[test]
        fn prop_zero_rotation_is_identity(p in points(12), ox in -50.0f64..50.0, oy in -50.0f64..50.0) {
            let rotated = rotate(p.view(), Array::zeros(12).view(), Point2::new(ox, oy)).unwrap();
            for (x, y) in p.iter().zip(rotated.iter()) {
                prop_assert!((x - y).abs() < 1e-9);
            }
        }

        #[test]
        fn prop_polar_round_trip(p in points(12)) {
            let back = from_polar(to_polar(p.view()).unwrap().view()).unwrap();
            for (x, y) in p.iter().zip(back.iter()) {
                prop_assert!((x - y).abs() < 1e-9);
            }
        }
    }
}
