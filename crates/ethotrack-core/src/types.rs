//! Core data types for the ethotrack toolkit.
//!
//! This module defines the tables that flow through the tagging pipeline:
//! raw body-part trajectories, the derived per-frame feature tables, the
//! arena descriptor and the final annotation table.
//!
//! # Type Categories
//!
//! - **Identifiers**: [`AnimalId`], [`PartKey`], [`PartPair`], [`PartTriplet`]
//! - **Trajectories**: [`CoordinateTable`], [`Point2`]
//! - **Derived tables**: [`FrameTable`] and its aliases [`DistanceTable`],
//!   [`SpeedTable`], [`AngleTable`], [`PolarTable`]
//! - **Arena**: [`ArenaGeometry`], [`ArenaDescriptor`], [`RealScale`], [`FrameSize`]
//! - **Output**: [`AnnotationTable`], [`AnnotationColumn`]
//!
//! Every table carries its frame count and rejects columns of any other
//! length, so the row count of a video stays constant end to end. Missing
//! detections are stored as `NaN`, never as dropped rows.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Identifiers
// =============================================================================

/// Identifier of a tracked animal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AnimalId(String);

impl AnimalId {
    /// Creates a new animal ID from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the animal ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AnimalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AnimalId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A body part, optionally qualified by the animal carrying it.
///
/// Displays as `"{animal}_{part}"` for multi-animal tables and as the bare
/// part name otherwise.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartKey {
    animal: Option<AnimalId>,
    part: String,
}

impl PartKey {
    /// Creates a key for a body part of an unnamed (single) animal.
    #[must_use]
    pub fn new(part: impl Into<String>) -> Self {
        Self {
            animal: None,
            part: part.into(),
        }
    }

    /// Creates a key for a body part of the given animal.
    #[must_use]
    pub fn of(animal: Option<&AnimalId>, part: impl Into<String>) -> Self {
        Self {
            animal: animal.cloned(),
            part: part.into(),
        }
    }

    /// Returns the animal this part belongs to, if any.
    #[must_use]
    pub fn animal(&self) -> Option<&AnimalId> {
        self.animal.as_ref()
    }

    /// Returns the unqualified body part name.
    #[must_use]
    pub fn part(&self) -> &str {
        &self.part
    }
}

impl fmt::Display for PartKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.animal {
            Some(animal) => write!(f, "{}_{}", animal, self.part),
            None => write!(f, "{}", self.part),
        }
    }
}

/// An unordered pair of body parts.
///
/// The pair is stored in canonical order, so `PartPair::new(a, b)` and
/// `PartPair::new(b, a)` compare equal and hash identically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartPair {
    first: PartKey,
    second: PartKey,
}

impl PartPair {
    /// Creates a canonical unordered pair.
    #[must_use]
    pub fn new(a: PartKey, b: PartKey) -> Self {
        if a <= b {
            Self { first: a, second: b }
        } else {
            Self { first: b, second: a }
        }
    }

    /// Returns the lower part of the pair.
    #[must_use]
    pub fn first(&self) -> &PartKey {
        &self.first
    }

    /// Returns the higher part of the pair.
    #[must_use]
    pub fn second(&self) -> &PartKey {
        &self.second
    }

    /// Returns `true` if either side of the pair is `key`.
    #[must_use]
    pub fn contains(&self, key: &PartKey) -> bool {
        &self.first == key || &self.second == key
    }
}

impl fmt::Display for PartPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.first, self.second)
    }
}

/// Three body parts defining an angle at `vertex`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartTriplet {
    /// End of the first ray
    pub start: PartKey,
    /// Vertex of the angle
    pub vertex: PartKey,
    /// End of the second ray
    pub end: PartKey,
}

impl PartTriplet {
    /// Creates a new triplet.
    #[must_use]
    pub fn new(start: PartKey, vertex: PartKey, end: PartKey) -> Self {
        Self { start, vertex, end }
    }
}

impl fmt::Display for PartTriplet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.start, self.vertex, self.end)
    }
}

/// Component of a polar coordinate column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PolarComponent {
    /// Magnitude
    Rho,
    /// Phase in radians
    Phi,
}

/// Column key of a polar coordinate table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PolarKey {
    /// Body part the column belongs to
    pub part: PartKey,
    /// Which polar component the column holds
    pub component: PolarComponent,
}

impl fmt::Display for PolarKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = match self.component {
            PolarComponent::Rho => "rho",
            PolarComponent::Phi => "phi",
        };
        write!(f, "{}_{}", self.part, suffix)
    }
}

// =============================================================================
// Points and trajectories
// =============================================================================

/// A 2D point in pixel or millimeter units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Point2 {
    /// Horizontal coordinate
    pub x: f64,
    /// Vertical coordinate
    pub y: f64,
}

impl Point2 {
    /// Creates a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

/// Frame-indexed body-part coordinates for one video.
///
/// Each tracked part holds an `n_frames x 2` (or `x 3`) array. A likelihood
/// channel may accompany any part; the tagging core only reads it for the
/// exploration detectors and otherwise tolerates its absence.
#[derive(Debug, Clone, Default)]
pub struct CoordinateTable {
    n_frames: usize,
    positions: BTreeMap<PartKey, Array2<f64>>,
    likelihoods: BTreeMap<PartKey, Array1<f64>>,
}

impl CoordinateTable {
    /// Creates an empty table with a fixed frame count.
    #[must_use]
    pub fn new(n_frames: usize) -> Self {
        Self {
            n_frames,
            positions: BTreeMap::new(),
            likelihoods: BTreeMap::new(),
        }
    }

    /// Inserts the trajectory of one body part.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ShapeMismatch`] if the row count differs from the
    /// table's frame count or the point encoding is neither 2D nor 3D.
    pub fn insert(&mut self, key: PartKey, points: Array2<f64>) -> CoreResult<()> {
        if points.nrows() != self.n_frames {
            return Err(CoreError::shape_mismatch(
                format!("coordinates of {key}"),
                self.n_frames,
                points.nrows(),
            ));
        }
        if !(2..=3).contains(&points.ncols()) {
            return Err(CoreError::shape_mismatch(
                format!("point encoding of {key}"),
                2,
                points.ncols(),
            ));
        }
        self.positions.insert(key, points);
        Ok(())
    }

    /// Inserts the likelihood channel of one body part.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ShapeMismatch`] on a frame count mismatch.
    pub fn insert_likelihood(&mut self, key: PartKey, likelihood: Array1<f64>) -> CoreResult<()> {
        if likelihood.len() != self.n_frames {
            return Err(CoreError::shape_mismatch(
                format!("likelihood of {key}"),
                self.n_frames,
                likelihood.len(),
            ));
        }
        self.likelihoods.insert(key, likelihood);
        Ok(())
    }

    /// Number of frames in the table.
    #[must_use]
    pub fn n_frames(&self) -> usize {
        self.n_frames
    }

    /// Number of tracked body parts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns `true` if no body part is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Returns the trajectory of a body part, if tracked.
    #[must_use]
    pub fn get(&self, key: &PartKey) -> Option<ArrayView2<'_, f64>> {
        self.positions.get(key).map(Array2::view)
    }

    /// Returns the trajectory of a body part.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MissingBodyPart`] if the part is not tracked.
    pub fn require(&self, key: &PartKey) -> CoreResult<ArrayView2<'_, f64>> {
        self.get(key)
            .ok_or_else(|| CoreError::missing_body_part(key.to_string()))
    }

    /// Returns the likelihood channel of a body part, if present.
    #[must_use]
    pub fn likelihood(&self, key: &PartKey) -> Option<ArrayView1<'_, f64>> {
        self.likelihoods.get(key).map(Array1::view)
    }

    /// Iterates over tracked parts in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&PartKey, &Array2<f64>)> {
        self.positions.iter()
    }

    /// Iterates over tracked part keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &PartKey> {
        self.positions.keys()
    }

    /// Returns the set of animals present in the table.
    #[must_use]
    pub fn animals(&self) -> BTreeSet<AnimalId> {
        self.positions.keys().filter_map(|k| k.animal().cloned()).collect()
    }

    /// Returns the parts belonging to `animal` (`None` selects unqualified parts).
    #[must_use]
    pub fn parts_of(&self, animal: Option<&AnimalId>) -> Vec<&PartKey> {
        self.positions
            .keys()
            .filter(|k| k.animal() == animal)
            .collect()
    }

    /// Returns a copy of the table with every trajectory passed through `f`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ShapeMismatch`] if `f` changes a row count.
    pub fn map_trajectories<F>(&self, mut f: F) -> CoreResult<Self>
    where
        F: FnMut(ArrayView2<'_, f64>) -> Array2<f64>,
    {
        self.try_map_trajectories(|points| Ok::<_, CoreError>(f(points)))
    }

    /// Fallible [`map_trajectories`](Self::map_trajectories); the first
    /// error from `f` aborts the copy.
    ///
    /// # Errors
    ///
    /// Returns the error of `f`, or [`CoreError::ShapeMismatch`] converted
    /// into `E` if `f` changes a row count.
    pub fn try_map_trajectories<F, E>(&self, mut f: F) -> Result<Self, E>
    where
        F: FnMut(ArrayView2<'_, f64>) -> Result<Array2<f64>, E>,
        E: From<CoreError>,
    {
        let mut out = Self::new(self.n_frames);
        for (key, points) in &self.positions {
            out.insert(key.clone(), f(points.view())?)?;
        }
        out.likelihoods = self.likelihoods.clone();
        Ok(out)
    }
}

// =============================================================================
// Derived per-frame tables
// =============================================================================

/// A frame-aligned table of scalar columns keyed by `K`.
///
/// Derived tables are built once from a coordinate table and never mutated
/// in place afterwards; recompute them when the inputs change.
#[derive(Debug, Clone)]
pub struct FrameTable<K: Ord> {
    n_frames: usize,
    columns: BTreeMap<K, Array1<f64>>,
}

/// Pairwise body-part distances in real-world units.
pub type DistanceTable = FrameTable<PartPair>;

/// Per-part speeds (or higher-order derivatives).
pub type SpeedTable = FrameTable<PartKey>;

/// Angles in radians at the vertex of each triplet.
pub type AngleTable = FrameTable<PartTriplet>;

/// Polar coordinates per body part.
pub type PolarTable = FrameTable<PolarKey>;

impl<K: Ord + fmt::Display> FrameTable<K> {
    /// Creates an empty table with a fixed frame count.
    #[must_use]
    pub fn new(n_frames: usize) -> Self {
        Self {
            n_frames,
            columns: BTreeMap::new(),
        }
    }

    /// Inserts one column.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ShapeMismatch`] on a frame count mismatch.
    pub fn insert(&mut self, key: K, column: Array1<f64>) -> CoreResult<()> {
        if column.len() != self.n_frames {
            return Err(CoreError::shape_mismatch(
                format!("column {key}"),
                self.n_frames,
                column.len(),
            ));
        }
        self.columns.insert(key, column);
        Ok(())
    }

    /// Returns a column, if present.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<ArrayView1<'_, f64>> {
        self.columns.get(key).map(Array1::view)
    }

    /// Returns a column.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MissingBodyPart`] naming the absent column.
    pub fn require(&self, key: &K) -> CoreResult<ArrayView1<'_, f64>> {
        self.get(key)
            .ok_or_else(|| CoreError::missing_body_part(key.to_string()))
    }

    /// Number of frames in the table.
    #[must_use]
    pub fn n_frames(&self) -> usize {
        self.n_frames
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns `true` if the table has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Iterates over columns in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &Array1<f64>)> {
        self.columns.iter()
    }
}

impl FrameTable<PartPair> {
    /// Convenience lookup of the distance between two parts in either order.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MissingBodyPart`] if the pair was not computed.
    pub fn between(&self, a: &PartKey, b: &PartKey) -> CoreResult<ArrayView1<'_, f64>> {
        self.require(&PartPair::new(a.clone(), b.clone()))
    }
}

// =============================================================================
// Arena
// =============================================================================

/// Pixel dimensions of a video frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FrameSize {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
}

impl FrameSize {
    /// Creates a new frame size.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Center of the frame in pixel coordinates.
    #[must_use]
    pub fn center(&self) -> Point2 {
        Point2::new(f64::from(self.width) / 2.0, f64::from(self.height) / 2.0)
    }
}

/// Fitted arena boundary in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "shape", rename_all = "snake_case"))]
pub enum ArenaGeometry {
    /// Circular arena
    Circle {
        /// Center of the circle
        center: Point2,
        /// Radius in pixels
        radius: f64,
    },
    /// Elliptical arena
    Ellipse {
        /// Center of the ellipse
        center: Point2,
        /// Semi-major axis in pixels
        semi_major: f64,
        /// Semi-minor axis in pixels
        semi_minor: f64,
        /// Rotation of the major axis in radians, counter-clockwise from +x
        angle: f64,
    },
}

impl ArenaGeometry {
    /// Center of the arena.
    #[must_use]
    pub fn center(&self) -> Point2 {
        match *self {
            Self::Circle { center, .. } | Self::Ellipse { center, .. } => center,
        }
    }

    /// Mean pixel diameter of the boundary.
    #[must_use]
    pub fn pixel_diameter(&self) -> f64 {
        match *self {
            Self::Circle { radius, .. } => 2.0 * radius,
            Self::Ellipse {
                semi_major,
                semi_minor,
                ..
            } => semi_major + semi_minor,
        }
    }
}

/// One arena per video: the fitted boundary plus the frame size at detection.
///
/// Created once per video and immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ArenaDescriptor {
    geometry: ArenaGeometry,
    frame_size: FrameSize,
}

impl ArenaDescriptor {
    /// Creates a new descriptor.
    #[must_use]
    pub const fn new(geometry: ArenaGeometry, frame_size: FrameSize) -> Self {
        Self {
            geometry,
            frame_size,
        }
    }

    /// The fitted boundary.
    #[must_use]
    pub fn geometry(&self) -> &ArenaGeometry {
        &self.geometry
    }

    /// Frame size of the source video.
    #[must_use]
    pub fn frame_size(&self) -> FrameSize {
        self.frame_size
    }

    /// Pixel-to-millimeter scale given the known physical diameter.
    #[must_use]
    pub fn scale(&self, real_diameter_mm: f64) -> RealScale {
        RealScale::new(real_diameter_mm, self.geometry.pixel_diameter())
    }
}

/// Ratio converting pixel distances to real-world units.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RealScale {
    /// Physical length in millimeters
    pub real_mm: f64,
    /// The same length measured in pixels
    pub pixels: f64,
}

impl RealScale {
    /// Creates a new scale.
    #[must_use]
    pub const fn new(real_mm: f64, pixels: f64) -> Self {
        Self { real_mm, pixels }
    }

    /// Identity scale (coordinates already in real-world units).
    #[must_use]
    pub const fn identity() -> Self {
        Self::new(1.0, 1.0)
    }

    /// Multiplier applied to pixel distances.
    #[must_use]
    pub fn factor(&self) -> f64 {
        self.real_mm / self.pixels
    }

    /// Converts a real-world length back to pixels.
    #[must_use]
    pub fn to_pixels(&self, real: f64) -> f64 {
        real / self.factor()
    }
}

impl Default for RealScale {
    fn default() -> Self {
        Self::identity()
    }
}

// =============================================================================
// Annotation output
// =============================================================================

/// One named column of the annotation table.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AnnotationColumn {
    /// Boolean trait, one flag per frame
    Flags(Vec<bool>),
    /// Numeric trait (e.g. overall speed), one value per frame
    Values(Vec<f64>),
}

impl AnnotationColumn {
    /// Number of frames in the column.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Flags(v) => v.len(),
            Self::Values(v) => v.len(),
        }
    }

    /// Returns `true` if the column has no frames.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Boolean view of the column, if it is a flag column.
    #[must_use]
    pub fn as_flags(&self) -> Option<&[bool]> {
        match self {
            Self::Flags(v) => Some(v),
            Self::Values(_) => None,
        }
    }

    /// Numeric view of the column, if it is a value column.
    #[must_use]
    pub fn as_values(&self) -> Option<&[f64]> {
        match self {
            Self::Values(v) => Some(v),
            Self::Flags(_) => None,
        }
    }
}

/// Frame-indexed record of named behavioral traits for one video.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AnnotationTable {
    n_frames: usize,
    columns: BTreeMap<String, AnnotationColumn>,
}

impl AnnotationTable {
    /// Creates an empty table with a fixed frame count.
    #[must_use]
    pub fn new(n_frames: usize) -> Self {
        Self {
            n_frames,
            columns: BTreeMap::new(),
        }
    }

    /// Inserts a column, replacing any column with the same name.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InputAlignment`] if the column is not frame-aligned.
    pub fn insert(&mut self, name: impl Into<String>, column: AnnotationColumn) -> CoreResult<()> {
        let name = name.into();
        if column.len() != self.n_frames {
            return Err(CoreError::input_alignment(
                format!("annotation column {name}"),
                self.n_frames,
                column.len(),
            ));
        }
        self.columns.insert(name, column);
        Ok(())
    }

    /// Inserts a Boolean trait column.
    ///
    /// # Errors
    ///
    /// See [`AnnotationTable::insert`].
    pub fn insert_flags(&mut self, name: impl Into<String>, flags: Vec<bool>) -> CoreResult<()> {
        self.insert(name, AnnotationColumn::Flags(flags))
    }

    /// Inserts a numeric trait column.
    ///
    /// # Errors
    ///
    /// See [`AnnotationTable::insert`].
    pub fn insert_values(&mut self, name: impl Into<String>, values: Vec<f64>) -> CoreResult<()> {
        self.insert(name, AnnotationColumn::Values(values))
    }

    /// Moves every column of `other` into this table.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InputAlignment`] if the frame counts differ.
    pub fn merge(&mut self, other: Self) -> CoreResult<()> {
        if other.n_frames != self.n_frames {
            return Err(CoreError::input_alignment(
                "annotation merge",
                self.n_frames,
                other.n_frames,
            ));
        }
        self.columns.extend(other.columns);
        Ok(())
    }

    /// Number of frames (rows).
    #[must_use]
    pub fn n_frames(&self) -> usize {
        self.n_frames
    }

    /// Number of trait columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns `true` if the table has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Returns a column by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AnnotationColumn> {
        self.columns.get(name)
    }

    /// Returns a Boolean column by name.
    #[must_use]
    pub fn flags(&self, name: &str) -> Option<&[bool]> {
        self.get(name).and_then(AnnotationColumn::as_flags)
    }

    /// Returns a numeric column by name.
    #[must_use]
    pub fn values(&self, name: &str) -> Option<&[f64]> {
        self.get(name).and_then(AnnotationColumn::as_values)
    }

    /// Column names in order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Iterates over columns in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AnnotationColumn)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Names of the Boolean traits active at `frame`.
    #[must_use]
    pub fn active_traits(&self, frame: usize) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|(_, col)| {
                col.as_flags()
                    .and_then(|flags| flags.get(frame))
                    .copied()
                    .unwrap_or(false)
            })
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Serializes the table to a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if serialization fails.
    #[cfg(feature = "serde")]
    pub fn to_json_string(&self) -> CoreResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CoreError::validation(format!("annotation serialization: {e}")))
    }

    /// Writes the table as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Io`] if the file cannot be written.
    #[cfg(feature = "serde")]
    pub fn write_json(&self, path: &std::path::Path) -> CoreResult<()> {
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }
}
