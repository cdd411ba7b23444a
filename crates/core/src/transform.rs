//! Rigid transforms and axis-aligned bounding boxes.

use crate::geom::normalize_angle;
use nalgebra::{Isometry2, Point2, Translation2, UnitComplex};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Returns `(sin, cos)` of an angle given in degrees.
///
/// Quarter turns are returned exactly so that 90° rotations of axis-aligned
/// pattern pieces stay axis-aligned without floating-point drift.
pub fn sin_cos_deg(degrees: f64) -> (f64, f64) {
    let angle = normalize_angle(degrees);
    let quarters = angle / 90.0;
    if (quarters - quarters.round()).abs() < 1e-12 {
        return match (quarters.round() as i64).rem_euclid(4) {
            0 => (0.0, 1.0),
            1 => (1.0, 0.0),
            2 => (0.0, -1.0),
            _ => (-1.0, 0.0),
        };
    }
    angle.to_radians().sin_cos()
}

/// A 2D rigid transformation: rotation (degrees, counter-clockwise) followed
/// by translation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Transform2D {
    /// Translation in x direction.
    pub tx: f64,
    /// Translation in y direction.
    pub ty: f64,
    /// Rotation angle in degrees, normalized to [0, 360).
    pub angle: f64,
}

impl Transform2D {
    /// Creates a new identity transform.
    pub fn identity() -> Self {
        Self {
            tx: 0.0,
            ty: 0.0,
            angle: 0.0,
        }
    }

    /// Creates a rotation about an arbitrary center point.
    pub fn rotation_about(angle: f64, center: (f64, f64)) -> Self {
        let (sin, cos) = sin_cos_deg(angle);
        let (cx, cy) = center;
        // p' = R (p - c) + c
        Self {
            tx: cx - (cos * cx - sin * cy),
            ty: cy - (sin * cx + cos * cy),
            angle: normalize_angle(angle),
        }
    }

    /// Converts to a nalgebra Isometry2.
    pub fn to_isometry(&self) -> Isometry2<f64> {
        let (sin, cos) = sin_cos_deg(self.angle);
        Isometry2::from_parts(
            Translation2::new(self.tx, self.ty),
            UnitComplex::from_cos_sin_unchecked(cos, sin),
        )
    }

    /// Transforms a 2D point.
    pub fn transform_point(&self, x: f64, y: f64) -> (f64, f64) {
        let p = self.to_isometry().transform_point(&Point2::new(x, y));
        (p.x, p.y)
    }

    /// Transforms a slice of 2D points.
    pub fn transform_points(&self, points: &[(f64, f64)]) -> Vec<(f64, f64)> {
        let iso = self.to_isometry();
        points
            .iter()
            .map(|&(x, y)| {
                let p = iso.transform_point(&Point2::new(x, y));
                (p.x, p.y)
            })
            .collect()
    }
}

impl Default for Transform2D {
    fn default() -> Self {
        Self::identity()
    }
}

/// Axis-aligned bounding box in strip coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AABB2D {
    /// Minimum x coordinate.
    pub min_x: f64,
    /// Minimum y coordinate.
    pub min_y: f64,
    /// Maximum x coordinate.
    pub max_x: f64,
    /// Maximum y coordinate.
    pub max_y: f64,
}

impl AABB2D {
    /// Creates a new AABB from min/max coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Creates an AABB from a set of points.
    pub fn from_points(points: &[(f64, f64)]) -> Option<Self> {
        let (&(x0, y0), rest) = points.split_first()?;
        let mut aabb = Self::new(x0, y0, x0, y0);
        for &(x, y) in rest {
            aabb.min_x = aabb.min_x.min(x);
            aabb.min_y = aabb.min_y.min(y);
            aabb.max_x = aabb.max_x.max(x);
            aabb.max_y = aabb.max_y.max(y);
        }
        Some(aabb)
    }

    /// Returns the width of the AABB.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Returns the height of the AABB.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Returns the area of the AABB.
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Returns true if the interiors of the two boxes overlap by more than `eps`.
    ///
    /// Boxes that only touch along an edge do not intersect.
    pub fn intersects(&self, other: &Self, eps: f64) -> bool {
        self.min_x < other.max_x - eps
            && other.min_x < self.max_x - eps
            && self.min_y < other.max_y - eps
            && other.min_y < self.max_y - eps
    }

    /// Returns the overlap of two boxes, if any.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let min_x = self.min_x.max(other.min_x);
        let min_y = self.min_y.max(other.min_y);
        let max_x = self.max_x.min(other.max_x);
        let max_y = self.max_y.min(other.max_y);
        if min_x <= max_x && min_y <= max_y {
            Some(Self::new(min_x, min_y, max_x, max_y))
        } else {
            None
        }
    }

    /// Returns the box grown by `margin` on every side.
    pub fn expand(&self, margin: f64) -> Self {
        Self::new(
            self.min_x - margin,
            self.min_y - margin,
            self.max_x + margin,
            self.max_y + margin,
        )
    }

}
