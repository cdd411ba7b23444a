//! The fabric strip and its inner-fit region.

use crate::piece::RotationVariant;
use marker_core::geom::{Point, EPS};
use marker_core::transform::AABB2D;
use marker_core::{Config, Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A fixed-width, unbounded-length strip of fabric.
///
/// Pieces keep `spacing` between each other and `margin` toward the left,
/// right and bottom edges. The strip grows upward (+Y) without limit.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Strip {
    width: f64,
    spacing: f64,
    margin: f64,
}

impl Strip {
    /// Creates a strip. Width must be finite and positive; spacing and
    /// margin finite and non-negative. Margins that meet or cross leave an
    /// empty feasible region, so nothing fits, but the strip is still valid.
    pub fn new(width: f64, spacing: f64, margin: f64) -> Result<Self> {
        if !width.is_finite() || width <= 0.0 {
            return Err(Error::InvalidStrip(format!(
                "width must be finite and positive, got {}",
                width
            )));
        }
        if !spacing.is_finite() || spacing < 0.0 {
            return Err(Error::InvalidStrip(format!(
                "gap must be finite and non-negative, got {}",
                spacing
            )));
        }
        if !margin.is_finite() || margin < 0.0 {
            return Err(Error::InvalidStrip(format!(
                "margin must be finite and non-negative, got {}",
                margin
            )));
        }
        Ok(Self {
            width,
            spacing,
            margin,
        })
    }

    /// Creates a strip from a run configuration.
    pub fn from_config(width: f64, config: &Config) -> Result<Self> {
        Self::new(width, config.spacing, config.margin)
    }

    /// Full strip width.
    pub fn width(&self) -> f64 {
        self.width
    }

    /// Clearance between pieces.
    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    /// Clearance toward the strip edges.
    pub fn margin(&self) -> f64 {
        self.margin
    }

    /// Width available between the side margins, zero if they meet.
    pub fn usable_width(&self) -> f64 {
        (self.width - 2.0 * self.margin).max(0.0)
    }

    /// Inner-fit rectangle for a variant: every reference-point position that
    /// keeps the variant inside the strip. `None` if it is too wide.
    pub fn ifp(&self, variant: &RotationVariant) -> Option<InnerFitRect> {
        self.ifp_for_width(variant.width)
    }

    /// Inner-fit rectangle for a bounding box of the given width. The strip
    /// is unbounded upward, so height never restricts it.
    pub fn ifp_for_width(&self, width: f64) -> Option<InnerFitRect> {
        let min_x = self.margin;
        let max_x = self.width - self.margin - width;
        if self.usable_width() <= 0.0 || max_x < min_x - EPS {
            return None;
        }
        Some(InnerFitRect {
            min_x,
            max_x: max_x.max(min_x),
            min_y: self.margin,
        })
    }

    /// Returns true if the box lies inside the strip, margins included.
    pub fn contains_box(&self, aabb: &AABB2D) -> bool {
        self.usable_width() > 0.0
            && aabb.min_x >= self.margin - 1e-7
            && aabb.max_x <= self.width - self.margin + 1e-7
            && aabb.min_y >= self.margin - 1e-7
    }
}

/// Valid reference-point positions for one variant: `[min_x, max_x] x [min_y, inf)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InnerFitRect {
    /// Leftmost reference x.
    pub min_x: f64,
    /// Rightmost reference x.
    pub max_x: f64,
    /// Lowest reference y.
    pub min_y: f64,
}

impl InnerFitRect {
    /// Returns true if the point lies in the region (with tolerance).
    pub fn contains(&self, point: Point) -> bool {
        point.0 >= self.min_x - EPS && point.0 <= self.max_x + EPS && point.1 >= self.min_y - EPS
    }

    /// Clamps a reference x into the region.
    pub fn clamp_x(&self, x: f64) -> f64 {
        x.clamp(self.min_x, self.max_x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::piece::{rectangle, Piece};
    use approx::assert_relative_eq;

    #[test]
    fn test_invalid_strips() {
        assert!(matches!(
            Strip::new(0.0, 0.0, 0.0),
            Err(Error::InvalidStrip(_))
        ));
        assert!(Strip::new(f64::INFINITY, 0.0, 0.0).is_err());
        assert!(Strip::new(100.0, -1.0, 0.0).is_err());
        assert!(Strip::new(100.0, 0.0, f64::NAN).is_err());
        assert!(Strip::new(100.0, 1.0, 0.5).is_ok());
    }

    #[test]
    fn test_ifp_bounds() {
        let strip = Strip::new(100.0, 2.0, 1.0).unwrap();
        let piece = Piece::new(0, rectangle(30.0, 10.0), &[0.0]).unwrap();
        let ifp = strip.ifp(&piece.variants()[0]).unwrap();
        assert_relative_eq!(ifp.min_x, 1.0);
        assert_relative_eq!(ifp.max_x, 69.0);
        assert_relative_eq!(ifp.min_y, 1.0);
        assert!(ifp.contains((1.0, 1.0)));
        assert!(!ifp.contains((70.0, 1.0)));
        assert_relative_eq!(ifp.clamp_x(80.0), 69.0);
        assert_relative_eq!(strip.usable_width(), 98.0);
    }

    #[test]
    fn test_exact_fit_has_degenerate_ifp() {
        let strip = Strip::new(40.0, 0.0, 0.0).unwrap();
        let ifp = strip.ifp_for_width(40.0).unwrap();
        assert_relative_eq!(ifp.min_x, ifp.max_x);
        assert!(strip.ifp_for_width(40.1).is_none());
    }

    #[test]
    fn test_margins_meeting_leave_no_room() {
        let strip = Strip::new(10.0, 10.0, 5.0).unwrap();
        assert_relative_eq!(strip.usable_width(), 0.0);
        assert!(strip.ifp_for_width(0.0).is_none());
        assert!(!strip.contains_box(&AABB2D::new(5.0, 5.0, 5.0, 6.0)));

        let crossed = Strip::new(1.0, 2.0, 1.0).unwrap();
        assert_relative_eq!(crossed.usable_width(), 0.0);
        assert!(crossed.ifp_for_width(0.5).is_none());
    }

    #[test]
    fn test_contains_box() {
        let strip = Strip::new(50.0, 0.0, 1.0).unwrap();
        assert!(strip.contains_box(&AABB2D::new(1.0, 1.0, 49.0, 300.0)));
        assert!(!strip.contains_box(&AABB2D::new(0.5, 1.0, 10.0, 10.0)));
        assert!(!strip.contains_box(&AABB2D::new(1.0, 1.0, 49.5, 10.0)));
    }
}
