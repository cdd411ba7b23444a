//! Pattern pieces and their precomputed rotation variants.

use marker_core::geom::{self, Point, EPS};
use marker_core::{Error, Polygon, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One orientation of a piece.
///
/// The outline is rotated about the original polygon's centroid and then
/// translated so its bounding box starts at the origin. The origin is the
/// reference point used by the NFP, the IFP and [`marker_core::Placement`].
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RotationVariant {
    /// Rotation angle in degrees, normalized to [0, 360).
    pub angle: f64,
    /// Normalized outline.
    pub polygon: Vec<Point>,
    /// Convex hull of the normalized outline (counter-clockwise).
    pub hull: Vec<Point>,
    /// Bounding-box width.
    pub width: f64,
    /// Bounding-box height.
    pub height: f64,
}

impl RotationVariant {
    fn new(original: &Polygon, angle: f64) -> Self {
        let angle = geom::normalize_angle(angle);
        let polygon = geom::normalize(&original.rotated_about_centroid(angle).into_points());
        let bbox = geom::bbox(&polygon);
        Self {
            angle,
            hull: geom::convex_hull(&polygon),
            width: bbox.width(),
            height: bbox.height(),
            polygon,
        }
    }
}

/// A pattern piece ready for nesting.
///
/// Immutable after construction; every strategy run and optimizer generation
/// shares the same variants read-only.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Piece {
    id: usize,
    original: Polygon,
    area: f64,
    variants: Vec<RotationVariant>,
}

impl Piece {
    /// Builds a piece from its outline and candidate rotation angles.
    ///
    /// Fails for fewer than 3 distinct points, non-finite coordinates or zero
    /// area. Duplicate angles (after normalization) are dropped; an empty
    /// angle list means "no rotation".
    pub fn new(id: usize, points: Vec<Point>, angles: &[f64]) -> Result<Self> {
        let original = Polygon::new(points);
        original
            .validate()
            .map_err(|e| Error::InvalidGeometry(format!("piece {}: {}", id, e)))?;

        let mut unique: Vec<f64> = Vec::with_capacity(angles.len().max(1));
        for &angle in angles {
            let angle = geom::normalize_angle(angle);
            if !unique.iter().any(|&a| (a - angle).abs() < EPS) {
                unique.push(angle);
            }
        }
        if unique.is_empty() {
            unique.push(0.0);
        }

        let variants = unique
            .iter()
            .map(|&angle| RotationVariant::new(&original, angle))
            .collect();

        Ok(Self {
            id,
            area: original.area(),
            original,
            variants,
        })
    }

    /// Source index of the piece.
    pub fn id(&self) -> usize {
        self.id
    }

    /// The polygon as received from the caller.
    pub fn original(&self) -> &Polygon {
        &self.original
    }

    /// Outline area (identical for every variant).
    pub fn area(&self) -> f64 {
        self.area
    }

    /// All rotation variants, in angle-list order.
    pub fn variants(&self) -> &[RotationVariant] {
        &self.variants
    }

    /// Returns one rotation variant.
    pub fn variant(&self, index: usize) -> Option<&RotationVariant> {
        self.variants.get(index)
    }

    /// Number of rotation variants.
    pub fn variant_count(&self) -> usize {
        self.variants.len()
    }

    /// Width of the first variant.
    pub fn width(&self) -> f64 {
        self.variants.first().map_or(0.0, |v| v.width)
    }

    /// Height of the first variant.
    pub fn height(&self) -> f64 {
        self.variants.first().map_or(0.0, |v| v.height)
    }

    /// Indices of the variants no wider than `usable_width`.
    pub fn fitting_variants(&self, usable_width: f64) -> impl Iterator<Item = usize> + '_ {
        self.variants
            .iter()
            .enumerate()
            .filter(move |(_, v)| v.width <= usable_width + EPS)
            .map(|(i, _)| i)
    }

    /// Returns true if at least one variant fits across `usable_width`.
    pub fn fits_width(&self, usable_width: f64) -> bool {
        self.fitting_variants(usable_width).next().is_some()
    }
}

/// Axis-aligned rectangle outline with its lower-left corner at the origin.
pub fn rectangle(width: f64, height: f64) -> Vec<Point> {
    vec![(0.0, 0.0), (width, 0.0), (width, height), (0.0, height)]
}

/// Regular `n`-gon approximating a circle (at least 8 vertices).
pub fn circle(radius: f64, n: usize) -> Vec<Point> {
    let n = n.max(8);
    let step = std::f64::consts::TAU / n as f64;
    (0..n)
        .map(|i| {
            let angle = i as f64 * step;
            (radius * angle.cos() + radius, radius * angle.sin() + radius)
        })
        .collect()
}

/// L-shaped outline: a `width` x `height` rectangle with the top-right
/// corner cut away above `notch_height` and right of `notch_width`.
pub fn l_shape(width: f64, height: f64, notch_width: f64, notch_height: f64) -> Vec<Point> {
    vec![
        (0.0, 0.0),
        (width, 0.0),
        (width, notch_height),
        (notch_width, notch_height),
        (notch_width, height),
        (0.0, height),
    ]
}
