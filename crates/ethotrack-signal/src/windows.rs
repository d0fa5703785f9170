//! Sliding-window reshaping of per-frame feature matrices.
//!
//! A window is a contiguous block of `size` frames; consecutive windows start
//! `step` frames apart, giving `floor((frames - size) / step) + 1` windows.

use ethotrack_core::{geometry, Point2};
use ndarray::{s, Array3, ArrayView2, ArrayView3, Axis};

use crate::{Result, SignalError};

fn window_count(frames: usize, size: usize, step: usize) -> Result<usize> {
    if size == 0 {
        return Err(SignalError::invalid_parameter("window_size", "must be > 0"));
    }
    if step == 0 {
        return Err(SignalError::invalid_parameter("window_step", "must be > 0"));
    }
    if size > frames {
        return Err(SignalError::InsufficientFrames {
            needed: size,
            available: frames,
        });
    }
    Ok((frames - size) / step + 1)
}

/// Zero-copy iterator over the windows of a `frames x features` matrix.
///
/// # Errors
///
/// Returns [`SignalError::InvalidParameter`] for a zero size or step and
/// [`SignalError::InsufficientFrames`] when `size` exceeds the frame count.
pub fn rolling_window_views<'a>(
    data: ArrayView2<'a, f64>,
    size: usize,
    step: usize,
) -> Result<impl ExactSizeIterator<Item = ArrayView2<'a, f64>>> {
    let n = window_count(data.nrows(), size, step)?;
    Ok((0..n).map(move |w| {
        let start = w * step;
        data.slice_move(s![start..start + size, ..])
    }))
}

/// Materializes the windows of a `frames x features` matrix as a
/// `windows x size x features` array.
///
/// # Errors
///
/// See [`rolling_window_views`].
pub fn rolling_window(data: ArrayView2<'_, f64>, size: usize, step: usize) -> Result<Array3<f64>> {
    let n = window_count(data.nrows(), size, step)?;
    let mut out = Array3::zeros((n, size, data.ncols()));
    for (mut dst, src) in out
        .axis_iter_mut(Axis(0))
        .zip(rolling_window_views(data, size, step)?)
    {
        dst.assign(&src);
    }
    Ok(out)
}

/// Which frame of a window defines its alignment rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlignAxis {
    /// Rotate every frame by its own reference angle
    #[default]
    EveryFrame,
    /// Rotate the whole window by the angle of its center frame
    CenterFrame,
}

/// Rotates windows of flattened `[x0, y0, x1, y1, ...]` coordinates so the
/// first body part points along +y.
///
/// Coordinates are expected to be centered already (e.g. relative to the
/// animal's center). Frames whose reference part is missing keep `NaN`.
///
/// # Errors
///
/// Returns [`SignalError::InvalidParameter`] if the feature count is odd or
/// zero.
pub fn align_trajectories(windows: ArrayView3<'_, f64>, axis: AlignAxis) -> Result<Array3<f64>> {
    let features = windows.len_of(Axis(2));
    if features == 0 || features % 2 != 0 {
        return Err(SignalError::invalid_parameter(
            "windows",
            format!("expected interleaved x/y features, got {features} columns"),
        ));
    }

    let mut out = windows.to_owned();
    for mut window in out.axis_iter_mut(Axis(0)) {
        let center = window.nrows() / 2;
        let window_angle = window[[center, 0]].atan2(window[[center, 1]]);
        for mut frame in window.axis_iter_mut(Axis(0)) {
            let theta = match axis {
                AlignAxis::EveryFrame => frame[0].atan2(frame[1]),
                AlignAxis::CenterFrame => window_angle,
            };
            for part in 0..features / 2 {
                let p = geometry::rotate_point(
                    Point2::new(frame[2 * part], frame[2 * part + 1]),
                    theta,
                    Point2::default(),
                );
                frame[2 * part] = p.x;
                frame[2 * part + 1] = p.y;
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};
    use proptest::prelude::*;

    #[test]
    fn test_window_contents() {
        let data = Array2::from_shape_fn((6, 2), |(i, j)| (i * 10 + j) as f64);
        let windows = rolling_window(data.view(), 3, 2).unwrap();
        assert_eq!(windows.dim(), (2, 3, 2));
        assert_eq!(windows[[0, 0, 0]], 0.0);
        assert_eq!(windows[[1, 0, 0]], 20.0);
        assert_eq!(windows[[1, 2, 1]], 41.0);
    }

    #[test]
    fn test_window_errors() {
        let data = Array2::<f64>::zeros((4, 2));
        assert!(matches!(
            rolling_window(data.view(), 5, 1),
            Err(SignalError::InsufficientFrames { needed: 5, available: 4 })
        ));
        assert!(rolling_window(data.view(), 0, 1).is_err());
        assert!(rolling_window(data.view(), 2, 0).is_err());
    }

    #[test]
    fn test_views_match_materialized() {
        let data = Array2::from_shape_fn((9, 3), |(i, j)| (i * 3 + j) as f64);
        let views: Vec<_> = rolling_window_views(data.view(), 4, 1).unwrap().collect();
        let windows = rolling_window(data.view(), 4, 1).unwrap();
        assert_eq!(views.len(), windows.len_of(Axis(0)));
        for (w, view) in views.iter().enumerate() {
            assert_eq!(windows.index_axis(Axis(0), w), *view);
        }
    }

    #[test]
    fn test_align_points_reference_up() {
        let windows = array![[[1.0, 0.0, 2.0, 0.0], [0.0, -3.0, 0.0, 1.0]]];
        let aligned = align_trajectories(windows.view(), AlignAxis::EveryFrame).unwrap();
        assert_abs_diff_eq!(aligned[[0, 0, 0]], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(aligned[[0, 0, 1]], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(aligned[[0, 0, 3]], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(aligned[[0, 1, 0]], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(aligned[[0, 1, 1]], 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(aligned[[0, 1, 3]], -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_align_rejects_odd_features() {
        let windows = Array3::<f64>::zeros((1, 2, 3));
        assert!(align_trajectories(windows.view(), AlignAxis::CenterFrame).is_err());
    }

    proptest! {
        #[test]
        fn prop_window_shape(frames in 1usize..200, size in 1usize..50, step in 1usize..10, features in 1usize..6) {
            let data = Array2::<f64>::zeros((frames, features));
            match rolling_window(data.view(), size, step) {
                Ok(w) => {
                    prop_assert!(size <= frames);
                    prop_assert_eq!(w.dim(), ((frames - size) / step + 1, size, features));
                }
                Err(_) => prop_assert!(size > frames),
            }
        }
    }
}
