//! Kinematic feature extraction from body-part trajectories.
//!
//! [`FeatureExtractor`] derives the per-frame tables the detectors consume:
//!
//! - pairwise distances in real-world units ([`DistanceTable`])
//! - angles at the vertex of body-part triplets ([`AngleTable`])
//! - polar coordinates per part ([`PolarTable`])
//! - rolling speed, acceleration, jerk and higher orders ([`SpeedTable`])
//!
//! Every derived table has exactly as many frames as its input. Values that
//! cannot be computed at the start of a sequence are zero-filled; gaps in the
//! middle of a sequence stay `NaN` so detectors treat them as "condition not
//! met" instead of "stationary".

use ethotrack_core::{
    geometry, utils, AngleTable, CoordinateTable, DistanceTable, FrameTable, PartKey, PartPair,
    PartTriplet, PolarComponent, PolarKey, PolarTable, RealScale, SpeedTable,
};
use ndarray::{Array1, ArrayView1, ArrayView2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{Result, SignalError};

/// Configuration for kinematic feature extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KinematicsConfig {
    /// Trailing rolling-mean window applied at every derivative order
    pub speed_window: usize,

    /// Decimal places kept in derivative tables
    pub rounding: u32,

    /// Frame offset used for finite differences
    pub shift: usize,
}

impl Default for KinematicsConfig {
    fn default() -> Self {
        Self {
            speed_window: 3,
            rounding: 3,
            shift: 1,
        }
    }
}

impl KinematicsConfig {
    /// Create a new builder
    pub fn builder() -> KinematicsConfigBuilder {
        KinematicsConfigBuilder::new()
    }

    /// Checks every field.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::InvalidParameter`] for a zero window or shift.
    pub fn validate(&self) -> Result<()> {
        if self.speed_window == 0 {
            return Err(SignalError::invalid_parameter("speed_window", "must be > 0"));
        }
        if self.shift == 0 {
            return Err(SignalError::invalid_parameter("shift", "must be > 0"));
        }
        Ok(())
    }

    /// Number of leading frames a derivative of `order` cannot cover.
    #[must_use]
    pub fn warmup(&self, order: usize) -> usize {
        order * (self.shift + self.speed_window - 1)
    }
}

/// Builder for KinematicsConfig
#[derive(Debug, Default)]
pub struct KinematicsConfigBuilder {
    config: KinematicsConfig,
}

impl KinematicsConfigBuilder {
    /// Create new builder
    pub fn new() -> Self {
        Self {
            config: KinematicsConfig::default(),
        }
    }

    /// Set rolling-mean window
    pub fn speed_window(mut self, window: usize) -> Self {
        self.config.speed_window = window;
        self
    }

    /// Set rounding precision
    pub fn rounding(mut self, decimals: u32) -> Self {
        self.config.rounding = decimals;
        self
    }

    /// Set finite-difference shift
    pub fn shift(mut self, shift: usize) -> Self {
        self.config.shift = shift;
        self
    }

    /// Build configuration
    pub fn build(self) -> KinematicsConfig {
        self.config
    }
}

/// Trailing rolling mean; a window containing any `NaN` (or not yet full)
/// yields `NaN`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rolling_mean(series: ArrayView1<'_, f64>, window: usize) -> Array1<f64> {
    let n = series.len();
    let mut out = Array1::from_elem(n, f64::NAN);
    if window == 0 {
        return out;
    }
    for t in (window - 1)..n {
        let slice = series.slice(ndarray::s![t + 1 - window..=t]);
        if slice.iter().all(|v| v.is_finite()) {
            out[t] = slice.sum() / window as f64;
        }
    }
    out
}

/// Builds derived per-frame feature tables from a coordinate table.
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor {
    config: KinematicsConfig,
}

impl FeatureExtractor {
    /// Creates an extractor.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::InvalidParameter`] if the configuration is invalid.
    pub fn new(config: KinematicsConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &KinematicsConfig {
        &self.config
    }

    /// Distances for every unordered pair of tracked parts, or only for the
    /// pairs in `allow` when given.
    ///
    /// # Errors
    ///
    /// Returns a core error if an allowed pair names an untracked part.
    #[tracing::instrument(skip_all, fields(parts = table.len()))]
    pub fn distances(
        &self,
        table: &CoordinateTable,
        scale: RealScale,
        allow: Option<&[PartPair]>,
    ) -> Result<DistanceTable> {
        let pairs: Vec<PartPair> = match allow {
            Some(pairs) => pairs.to_vec(),
            None => {
                let keys: Vec<&PartKey> = table.keys().collect();
                keys.iter()
                    .enumerate()
                    .flat_map(|(i, a)| {
                        keys[i + 1..]
                            .iter()
                            .map(move |b| PartPair::new((*a).clone(), (*b).clone()))
                    })
                    .collect()
            }
        };

        let columns: Vec<(PartPair, Array1<f64>)> = pairs
            .into_par_iter()
            .map(|pair| -> Result<(PartPair, Array1<f64>)> {
                let a = table.require(pair.first())?;
                let b = table.require(pair.second())?;
                let d = geometry::distance(a, b, scale)?;
                Ok((pair, d))
            })
            .collect::<Result<_>>()?;

        let mut out = FrameTable::new(table.n_frames());
        for (pair, column) in columns {
            out.insert(pair, column)?;
        }
        tracing::debug!(pairs = out.len(), "computed pairwise distances");
        Ok(out)
    }

    /// Vertex angle for each triplet.
    ///
    /// # Errors
    ///
    /// Returns a core error if a triplet names an untracked part.
    pub fn angles(&self, table: &CoordinateTable, triplets: &[PartTriplet]) -> Result<AngleTable> {
        let mut out = FrameTable::new(table.n_frames());
        for triplet in triplets {
            let column = geometry::angle(
                table.require(&triplet.start)?,
                table.require(&triplet.vertex)?,
                table.require(&triplet.end)?,
            )?;
            out.insert(triplet.clone(), column)?;
        }
        Ok(out)
    }

    /// Polar coordinates (rho, phi) for every tracked part.
    ///
    /// # Errors
    ///
    /// Propagates core shape errors.
    pub fn polar(&self, table: &CoordinateTable) -> Result<PolarTable> {
        let mut out = FrameTable::new(table.n_frames());
        for (key, points) in table.iter() {
            let polar = geometry::to_polar(points.view())?;
            for (component, idx) in [(PolarComponent::Rho, 0), (PolarComponent::Phi, 1)] {
                out.insert(
                    PolarKey {
                        part: key.clone(),
                        component,
                    },
                    polar.column(idx).to_owned(),
                )?;
            }
        }
        Ok(out)
    }

    /// Area of the polygon traced by `parts` in order, per frame.
    ///
    /// # Errors
    ///
    /// Returns a core error for fewer than three parts or untracked parts.
    pub fn area(
        &self,
        table: &CoordinateTable,
        parts: &[PartKey],
        scale: RealScale,
    ) -> Result<Array1<f64>> {
        let vertices = parts
            .iter()
            .map(|p| table.require(p))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(geometry::polygon_area(&vertices, scale)?)
    }

    /// Rolling derivative of `order` for a single trajectory.
    ///
    /// Order 1 is the scaled displacement between frame `t` and `t - shift`
    /// divided by `shift`, averaged over a trailing window. Each higher order
    /// applies the same difference-and-average step to the previous order.
    /// Results are rounded and leading uncomputable frames are set to zero.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::InvalidParameter`] for `order == 0`.
    #[allow(clippy::cast_precision_loss)]
    pub fn rolling_derivative(
        &self,
        points: ArrayView2<'_, f64>,
        scale: RealScale,
        order: usize,
    ) -> Result<Array1<f64>> {
        if order == 0 {
            return Err(SignalError::invalid_parameter("order", "must be >= 1"));
        }
        let n = points.nrows();
        let shift = self.config.shift;
        let factor = scale.factor();

        let displacement: Array1<f64> = (0..n)
            .map(|t| {
                if t < shift {
                    return f64::NAN;
                }
                let (p, q) = (points.row(t), points.row(t - shift));
                (p[0] - q[0]).hypot(p[1] - q[1]) * factor / shift as f64
            })
            .collect();
        let mut series = rolling_mean(displacement.view(), self.config.speed_window);

        for _ in 1..order {
            let diff: Array1<f64> = (0..n)
                .map(|t| {
                    if t < shift {
                        f64::NAN
                    } else {
                        (series[t] - series[t - shift]).abs() / shift as f64
                    }
                })
                .collect();
            series = rolling_mean(diff.view(), self.config.speed_window);
        }

        let warmup = self.config.warmup(order).min(n);
        for (t, v) in series.iter_mut().enumerate() {
            if t < warmup && v.is_nan() {
                *v = 0.0;
            } else {
                *v = utils::round_decimals(*v, self.config.rounding);
            }
        }
        Ok(series)
    }

    /// Rolling derivative of `order` for every tracked part.
    ///
    /// # Errors
    ///
    /// See [`FeatureExtractor::rolling_derivative`].
    #[tracing::instrument(skip_all, fields(parts = table.len(), order = order))]
    pub fn speeds(
        &self,
        table: &CoordinateTable,
        scale: RealScale,
        order: usize,
    ) -> Result<SpeedTable> {
        let mut out = FrameTable::new(table.n_frames());
        for (key, points) in table.iter() {
            out.insert(key.clone(), self.rolling_derivative(points.view(), scale, order)?)?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ethotrack_core::AnimalId;
    use ndarray::{array, Array2};
    use proptest::prelude::*;

    fn straight_line(n: usize, step: f64) -> Array2<f64> {
        Array2::from_shape_fn((n, 2), |(i, j)| if j == 0 { i as f64 * step } else { 0.0 })
    }

    fn extractor(window: usize) -> FeatureExtractor {
        FeatureExtractor::new(KinematicsConfig::builder().speed_window(window).build()).unwrap()
    }

    #[test]
    fn test_builder_and_validation() {
        let config = KinematicsConfig::builder().speed_window(5).rounding(2).shift(2).build();
        assert_eq!(config.speed_window, 5);
        assert_eq!(config.warmup(2), 12);
        assert!(FeatureExtractor::new(KinematicsConfig::builder().shift(0).build()).is_err());
    }

    #[test]
    fn test_rolling_mean() {
        let series = array![1.0, 2.0, 3.0, f64::NAN, 5.0, 6.0];
        let out = rolling_mean(series.view(), 2);
        assert!(out[0].is_nan());
        assert_abs_diff_eq!(out[1], 1.5, epsilon = 1e-12);
        assert!(out[3].is_nan());
        assert!(out[4].is_nan());
        assert_abs_diff_eq!(out[5], 5.5, epsilon = 1e-12);
    }

    #[test]
    fn test_constant_speed() {
        let points = straight_line(20, 2.0);
        let speed = extractor(3)
            .rolling_derivative(points.view(), RealScale::new(10.0, 5.0), 1)
            .unwrap();
        assert_eq!(speed.len(), 20);
        assert!(speed.iter().take(3).all(|&v| v == 0.0));
        assert!(speed.iter().skip(3).all(|&v| (v - 4.0).abs() < 1e-9));
    }

    #[test]
    fn test_acceleration_of_constant_speed_is_zero() {
        let points = straight_line(30, 1.5);
        let accel = extractor(2)
            .rolling_derivative(points.view(), RealScale::identity(), 2)
            .unwrap();
        assert_eq!(accel.len(), 30);
        assert!(accel.iter().all(|&v| v.abs() < 1e-9));
    }

    #[test]
    fn test_mid_sequence_gap_stays_nan() {
        let mut points = straight_line(12, 1.0);
        points[[8, 0]] = f64::NAN;
        let speed = extractor(1)
            .rolling_derivative(points.view(), RealScale::identity(), 1)
            .unwrap();
        assert_eq!(speed[0], 0.0);
        assert!(speed[8].is_nan());
        assert!(speed[9].is_nan());
        assert_abs_diff_eq!(speed[10], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_distance_table_covers_all_pairs() {
        let a = AnimalId::new("A");
        let mut table = CoordinateTable::new(3);
        for part in ["Nose", "Center", "Tail_base"] {
            table
                .insert(PartKey::of(Some(&a), part), Array2::zeros((3, 2)))
                .unwrap();
        }
        let fx = FeatureExtractor::default();
        let distances = fx.distances(&table, RealScale::identity(), None).unwrap();
        assert_eq!(distances.len(), 3);
        assert_eq!(distances.n_frames(), 3);

        let only = [PartPair::new(
            PartKey::of(Some(&a), "Nose"),
            PartKey::of(Some(&a), "Tail_base"),
        )];
        let restricted = fx.distances(&table, RealScale::identity(), Some(&only)).unwrap();
        assert_eq!(restricted.len(), 1);

        let missing = [PartPair::new(PartKey::new("Nose"), PartKey::new("Ear"))];
        assert!(fx.distances(&table, RealScale::identity(), Some(&missing)).is_err());
    }

    #[test]
    fn test_angles_and_polar() {
        let mut table = CoordinateTable::new(1);
        table.insert(PartKey::new("Nose"), array![[0.0, 1.0]]).unwrap();
        table.insert(PartKey::new("Center"), array![[0.0, 0.0]]).unwrap();
        table.insert(PartKey::new("Tail_base"), array![[0.0, -1.0]]).unwrap();

        let fx = FeatureExtractor::default();
        let triplet = PartTriplet::new(
            PartKey::new("Nose"),
            PartKey::new("Center"),
            PartKey::new("Tail_base"),
        );
        let angles = fx.angles(&table, &[triplet.clone()]).unwrap();
        assert_abs_diff_eq!(angles.require(&triplet).unwrap()[0], std::f64::consts::PI, epsilon = 1e-12);

        let polar = fx.polar(&table).unwrap();
        assert_eq!(polar.len(), 6);
        let rho = polar
            .require(&PolarKey { part: PartKey::new("Nose"), component: PolarComponent::Rho })
            .unwrap();
        assert_abs_diff_eq!(rho[0], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_area() {
        let mut table = CoordinateTable::new(1);
        table.insert(PartKey::new("Nose"), array![[0.0, 2.0]]).unwrap();
        table.insert(PartKey::new("Left_ear"), array![[-1.0, 0.0]]).unwrap();
        table.insert(PartKey::new("Right_ear"), array![[1.0, 0.0]]).unwrap();
        let parts = [PartKey::new("Nose"), PartKey::new("Left_ear"), PartKey::new("Right_ear")];
        let area = FeatureExtractor::default()
            .area(&table, &parts, RealScale::identity())
            .unwrap();
        assert_abs_diff_eq!(area[0], 2.0, epsilon = 1e-12);
    }

    proptest! {
        #[test]
        fn prop_speed_preserves_length(n in 1usize..120, window in 1usize..10, order in 1usize..4) {
            let points = straight_line(n, 0.7);
            let fx = extractor(window);
            let speed = fx.rolling_derivative(points.view(), RealScale::identity(), order).unwrap();
            prop_assert_eq!(speed.len(), n);
            prop_assert!(speed.iter().all(|v| !v.is_nan()));
        }
    }
}
