//! Trajectory and detection smoothing.
//!
//! Two families live here. [`smooth_boolean_run`] de-glitches Boolean
//! detector output by removing single-frame flips. [`exponential_smooth`]
//! and the moving average in [`ethotrack_core::utils`] smooth coordinate
//! trajectories before features are derived from them.
//!
//! All functions preserve the input length.

use ethotrack_core::{utils, CoordinateTable};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use crate::{Result, SignalError};

/// Removes single-frame flicker from a Boolean sequence.
///
/// An interior frame whose two neighbors agree with each other but not with
/// it takes the neighbors' value. Neighbors are read from the input, so the
/// rule is applied to every frame independently. Runs of two or more frames
/// and the first and last frames are never changed.
#[must_use]
pub fn smooth_boolean_run(sequence: &[bool]) -> Vec<bool> {
    let mut out = sequence.to_vec();
    for i in 1..sequence.len().saturating_sub(1) {
        if sequence[i - 1] == sequence[i + 1] && sequence[i] != sequence[i - 1] {
            out[i] = sequence[i - 1];
        }
    }
    out
}

/// Exponentially weighted smoothing.
///
/// `out[0] = series[0]` and `out[n] = alpha * series[n] + (1 - alpha) * out[n - 1]`.
/// A `NaN` sample carries the previous smoothed value forward; a leading run
/// of `NaN` stays `NaN` until the first finite sample seeds the recursion.
///
/// # Errors
///
/// Returns [`SignalError::InvalidParameter`] if `alpha` is outside `[0, 1]`.
pub fn exponential_smooth(series: ArrayView1<'_, f64>, alpha: f64) -> Result<Array1<f64>> {
    if !(0.0..=1.0).contains(&alpha) {
        return Err(SignalError::invalid_parameter(
            "alpha",
            format!("must be in [0, 1], got {alpha}"),
        ));
    }

    let mut out = Array1::from_elem(series.len(), f64::NAN);
    let mut previous = f64::NAN;
    for (i, &x) in series.iter().enumerate() {
        let value = if previous.is_nan() {
            x
        } else if x.is_nan() {
            previous
        } else {
            alpha.mul_add(x, (1.0 - alpha) * previous)
        };
        out[i] = value;
        previous = value;
    }
    Ok(out)
}

/// Smoothing applied to every coordinate column of a trajectory table.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum TrajectorySmoothing {
    /// Leave coordinates untouched
    #[default]
    None,
    /// Exponentially weighted smoothing with the given alpha
    Exponential {
        /// Weight of the current sample
        alpha: f64,
    },
    /// Centered moving average over `window` frames
    MovingAverage {
        /// Window length in frames
        window: usize,
    },
}

/// Smooths every coordinate column of `table` independently.
///
/// # Errors
///
/// Returns [`SignalError::InvalidParameter`] for an out-of-range alpha.
pub fn smooth_trajectories(
    table: &CoordinateTable,
    method: TrajectorySmoothing,
) -> Result<CoordinateTable> {
    let smoothed = table.try_map_trajectories(|points| {
        let mut out = Array2::zeros(points.raw_dim());
        for (src, mut dst) in points.axis_iter(Axis(1)).zip(out.axis_iter_mut(Axis(1))) {
            let column = match method {
                TrajectorySmoothing::None => src.to_owned(),
                TrajectorySmoothing::Exponential { alpha } => exponential_smooth(src, alpha)?,
                TrajectorySmoothing::MovingAverage { window } => utils::moving_average(src, window),
            };
            dst.assign(&column);
        }
        Ok::<_, SignalError>(out)
    })?;
    Ok(smoothed)
}
