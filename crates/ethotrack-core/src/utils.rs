//! Common numeric helpers for the ethotrack toolkit.
//!
//! Missing detections travel through the pipeline as `NaN`, so the
//! reductions here skip non-finite values instead of poisoning the result.

use ndarray::{Array1, ArrayView1};

/// Rounds to `decimals` places.
#[must_use]
pub fn round_decimals(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Median of the finite values, or `None` if there are none.
#[must_use]
pub fn nan_median(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let mut finite: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    finite.sort_by(f64::total_cmp);
    let mid = finite.len() / 2;
    if finite.len() % 2 == 0 {
        Some((finite[mid - 1] + finite[mid]) / 2.0)
    } else {
        Some(finite[mid])
    }
}

/// Mean of the finite values, or `None` if there are none.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn nan_mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Centered moving average with truncated edges.
///
/// Each output averages the finite inputs inside the window; a window with
/// no finite input yields `NaN`. Windows of zero or one frame return the
/// input unchanged.
#[must_use]
pub fn moving_average(data: ArrayView1<'_, f64>, window_size: usize) -> Array1<f64> {
    if window_size <= 1 || data.is_empty() {
        return data.to_owned();
    }

    let half_window = window_size / 2;
    let n = data.len();
    (0..n)
        .map(|i| {
            let start = i.saturating_sub(half_window);
            let end = (i + half_window + 1).min(n);
            nan_mean(data.slice(ndarray::s![start..end]).iter().copied()).unwrap_or(f64::NAN)
        })
        .collect()
}

/// Pearson correlation between two equally long series.
///
/// Returns `None` when either series has zero variance or fewer than two
/// samples, where the coefficient is undefined.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn pearson_correlation(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.len() < 2 {
        return None;
    }
    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;

    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (x, y) in a.iter().zip(b) {
        let (dx, dy) = (x - mean_a, y - mean_b);
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    if var_a.abs() < f64::EPSILON || var_b.abs() < f64::EPSILON {
        return None;
    }
    Some(cov / (var_a.sqrt() * var_b.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_round_decimals() {
        assert_abs_diff_eq!(round_decimals(1.23456, 3), 1.235, epsilon = 1e-12);
        assert_abs_diff_eq!(round_decimals(-0.5, 0), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_nan_median() {
        assert_eq!(nan_median([3.0, f64::NAN, 1.0, 2.0]), Some(2.0));
        assert_eq!(nan_median([4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(nan_median([f64::NAN]), None);
    }

    #[test]
    fn test_moving_average() {
        let data = array![1.0, 2.0, 3.0, 4.0, 5.0];
        let smoothed = moving_average(data.view(), 3);

        assert_abs_diff_eq!(smoothed[0], 1.5, epsilon = 1e-10);
        assert_abs_diff_eq!(smoothed[2], 3.0, epsilon = 1e-10);
        assert_abs_diff_eq!(smoothed[4], 4.5, epsilon = 1e-10);
    }

    #[test]
    fn test_moving_average_skips_nan() {
        let data = array![1.0, f64::NAN, 3.0];
        let smoothed = moving_average(data.view(), 3);
        assert_abs_diff_eq!(smoothed[1], 2.0, epsilon = 1e-10);
    }

    #[test]
    fn test_pearson_correlation() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [2.0, 4.0, 6.0, 8.0];
        assert_abs_diff_eq!(pearson_correlation(&a, &b).unwrap(), 1.0, epsilon = 1e-12);
        assert!(pearson_correlation(&a, &[1.0, 1.0, 1.0, 1.0]).is_none());
        assert!(pearson_correlation(&[1.0], &[1.0]).is_none());
    }
}
