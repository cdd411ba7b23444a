//! Placement of a single pattern piece on the strip.

use crate::geom::{self, Point};
use crate::transform::AABB2D;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A piece positioned on the strip.
///
/// `(x, y)` is the offset of the rotation variant's bounding-box origin; the
/// variant itself was rotated about the piece centroid and normalized, so the
/// placed polygon's bounding box starts exactly at `(x, y)`. Placements are
/// never mutated: compaction builds new ones.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Placement {
    /// Source index of the piece in the request.
    pub piece_id: usize,

    /// Rotation angle in degrees, normalized to [0, 360).
    pub rotation: f64,

    /// Index of the rotation variant that was used.
    pub rotation_index: usize,

    /// X offset of the variant's bounding-box origin.
    pub x: f64,

    /// Y offset of the variant's bounding-box origin.
    pub y: f64,

    /// The placed outline in strip coordinates.
    pub polygon: Vec<Point>,
}

impl Placement {
    /// Places a normalized variant outline at `(x, y)`.
    pub fn new(
        piece_id: usize,
        rotation: f64,
        rotation_index: usize,
        x: f64,
        y: f64,
        variant: &[Point],
    ) -> Self {
        Self {
            piece_id,
            rotation: geom::normalize_angle(rotation),
            rotation_index,
            x,
            y,
            polygon: geom::translate(variant, x, y),
        }
    }

    /// Returns the same placement shifted by `(dx, dy)`.
    pub fn moved(&self, dx: f64, dy: f64) -> Self {
        Self {
            piece_id: self.piece_id,
            rotation: self.rotation,
            rotation_index: self.rotation_index,
            x: self.x + dx,
            y: self.y + dy,
            polygon: geom::translate(&self.polygon, dx, dy),
        }
    }

    /// Bounding box of the placed outline.
    pub fn aabb(&self) -> AABB2D {
        geom::bbox(&self.polygon)
    }

    /// Area of the placed outline.
    pub fn area(&self) -> f64 {
        geom::area(&self.polygon)
    }

    /// Highest Y coordinate reached by the placed outline.
    pub fn top(&self) -> f64 {
        self.aabb().max_y
    }
}
