//! Polygon geometry kernel.
//!
//! Every function here is pure and works on plain vertex slices so that the
//! strategies can run it on cached rotation variants without allocating a
//! [`Polygon`] wrapper. Coordinates are fabric units (centimeters); angles are
//! degrees, normalized to `[0, 360)`.
//!
//! Two collision predicates are provided:
//!
//! - [`polygons_intersect`]: bounding-box reject followed by vertex-in-polygon
//!   tests in both directions. Two polygons whose edges cross without either
//!   containing a vertex of the other are reported as disjoint.
//! - [`polygons_overlap`] / [`violates_clearance`]: the predicate used for
//!   placement decisions. Adds proper edge crossing, centroid and edge-midpoint
//!   containment, and an optional minimum clearance distance.

use crate::error::{Error, Result};
use crate::transform::{Transform2D, AABB2D};
use geo::{ConvexHull, Coord, LineString};
use std::sync::OnceLock;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A point in fabric coordinates.
pub type Point = (f64, f64);

/// Geometric tolerance used for boundary and ordering decisions.
pub const EPS: f64 = 1e-9;

/// Normalizes an angle in degrees to `[0, 360)`.
pub fn normalize_angle(degrees: f64) -> f64 {
    let a = degrees.rem_euclid(360.0);
    // rem_euclid can return 360.0 for tiny negative inputs
    if a >= 360.0 {
        0.0
    } else {
        a
    }
}

/// Signed area (shoelace). Positive for counter-clockwise rings.
pub fn signed_area(polygon: &[Point]) -> f64 {
    let n = polygon.len();
    if n < 3 {
        return 0.0;
    }
    let mut twice = 0.0;
    for i in 0..n {
        let (x1, y1) = polygon[i];
        let (x2, y2) = polygon[(i + 1) % n];
        twice += x1 * y2 - x2 * y1;
    }
    twice / 2.0
}

/// Unsigned area (shoelace). Always non-negative.
pub fn area(polygon: &[Point]) -> f64 {
    signed_area(polygon).abs()
}

/// Length of the closed outline.
pub fn perimeter(polygon: &[Point]) -> f64 {
    let n = polygon.len();
    if n < 2 {
        return 0.0;
    }
    (0..n)
        .map(|i| distance(polygon[i], polygon[(i + 1) % n]))
        .sum()
}

/// Arithmetic mean of the vertices.
pub fn vertex_centroid(polygon: &[Point]) -> Point {
    if polygon.is_empty() {
        return (0.0, 0.0);
    }
    let sum = polygon
        .iter()
        .fold((0.0, 0.0), |acc, &(x, y)| (acc.0 + x, acc.1 + y));
    let n = polygon.len() as f64;
    (sum.0 / n, sum.1 / n)
}

/// Area-weighted centroid. Falls back to the vertex mean for degenerate rings.
pub fn centroid(polygon: &[Point]) -> Point {
    let a = signed_area(polygon);
    if a.abs() < EPS {
        return vertex_centroid(polygon);
    }
    let n = polygon.len();
    let mut cx = 0.0;
    let mut cy = 0.0;
    for i in 0..n {
        let (x1, y1) = polygon[i];
        let (x2, y2) = polygon[(i + 1) % n];
        let cross = x1 * y2 - x2 * y1;
        cx += (x1 + x2) * cross;
        cy += (y1 + y2) * cross;
    }
    (cx / (6.0 * a), cy / (6.0 * a))
}

/// Axis-aligned bounding box. An empty slice yields a zero box at the origin.
pub fn bbox(polygon: &[Point]) -> AABB2D {
    AABB2D::from_points(polygon).unwrap_or_else(|| AABB2D::new(0.0, 0.0, 0.0, 0.0))
}

/// Rotates a polygon counter-clockwise by `degrees` about `center`.
pub fn rotate(polygon: &[Point], degrees: f64, center: Point) -> Vec<Point> {
    Transform2D::rotation_about(degrees, center).transform_points(polygon)
}

/// Rotates a polygon about its own centroid.
pub fn rotate_about_centroid(polygon: &[Point], degrees: f64) -> Vec<Point> {
    rotate(polygon, degrees, centroid(polygon))
}

/// Translates a polygon by `(dx, dy)`.
pub fn translate(polygon: &[Point], dx: f64, dy: f64) -> Vec<Point> {
    polygon.iter().map(|&(x, y)| (x + dx, y + dy)).collect()
}

/// Translates a polygon so that its bounding box starts at the origin.
pub fn normalize(polygon: &[Point]) -> Vec<Point> {
    let b = bbox(polygon);
    translate(polygon, -b.min_x, -b.min_y)
}

/// Returns the polygon in counter-clockwise order.
pub fn ensure_ccw(polygon: &[Point]) -> Vec<Point> {
    if signed_area(polygon) < 0.0 {
        polygon.iter().rev().copied().collect()
    } else {
        polygon.to_vec()
    }
}

/// Checks if a polygon is convex (all turns have the same sign).
pub fn is_convex(polygon: &[Point]) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let mut sign = 0i32;
    for i in 0..n {
        let p0 = polygon[i];
        let p1 = polygon[(i + 1) % n];
        let p2 = polygon[(i + 2) % n];
        let cross = (p1.0 - p0.0) * (p2.1 - p1.1) - (p1.1 - p0.1) * (p2.0 - p1.0);
        if cross.abs() > 1e-10 {
            let current = if cross > 0.0 { 1 } else { -1 };
            if sign == 0 {
                sign = current;
            } else if sign != current {
                return false;
            }
        }
    }
    true
}

/// Convex hull in counter-clockwise order, without a closing duplicate.
pub fn convex_hull(points: &[Point]) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let coords: Vec<Coord<f64>> = points.iter().map(|&(x, y)| Coord { x, y }).collect();
    let hull = LineString::from(coords).convex_hull();
    let ring: Vec<Point> = hull.exterior().coords().map(|c| (c.x, c.y)).collect();
    let mut hull_points = match (ring.first(), ring.last()) {
        (Some(first), Some(last)) if ring.len() > 1 && first == last => {
            ring[..ring.len() - 1].to_vec()
        }
        _ => ring,
    };
    if hull_points.len() >= 3 {
        hull_points = ensure_ccw(&hull_points);
    }
    hull_points
}

/// Moves every vertex radially away from (positive `distance`) or toward
/// (negative `distance`) the vertex centroid.
///
/// This is a centroid scale, not a true geometric offset: edges of elongated
/// or non-convex shapes move by less than `distance`. Vertices that would
/// cross the centroid collapse onto it.
pub fn offset_radial(polygon: &[Point], distance: f64) -> Vec<Point> {
    if distance == 0.0 {
        return polygon.to_vec();
    }
    let (cx, cy) = vertex_centroid(polygon);
    polygon
        .iter()
        .map(|&(x, y)| {
            let dx = x - cx;
            let dy = y - cy;
            let dist = (dx * dx + dy * dy).sqrt();
            if dist < 1e-10 {
                return (x, y);
            }
            let scaled = dist + distance;
            if scaled <= 0.0 {
                (cx, cy)
            } else {
                let factor = scaled / dist;
                (cx + dx * factor, cy + dy * factor)
            }
        })
        .collect()
}

fn distance(a: Point, b: Point) -> f64 {
    ((b.0 - a.0).powi(2) + (b.1 - a.1).powi(2)).sqrt()
}

fn orient(a: Point, b: Point, c: Point) -> f64 {
    (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0)
}

/// Distance from a point to the segment `[a, b]`.
pub fn point_segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len_sq = dx * dx + dy * dy;
    if len_sq < 1e-20 {
        return distance(p, a);
    }
    let t = (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len_sq).clamp(0.0, 1.0);
    distance(p, (a.0 + t * dx, a.1 + t * dy))
}

/// Checks whether a point lies within `eps` of the polygon outline.
pub fn point_on_boundary(point: Point, polygon: &[Point], eps: f64) -> bool {
    let n = polygon.len();
    (0..n).any(|i| point_segment_distance(point, polygon[i], polygon[(i + 1) % n]) <= eps)
}

/// Ray-casting point-in-polygon test.
///
/// Points within [`EPS`] of the outline count as outside, so two pieces that
/// merely touch are never reported as overlapping.
pub fn point_in_polygon(point: Point, polygon: &[Point]) -> bool {
    let n = polygon.len();
    if n < 3 || point_on_boundary(point, polygon, EPS) {
        return false;
    }
    let (px, py) = point;
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = polygon[i];
        let (xj, yj) = polygon[j];
        if ((yi > py) != (yj > py)) && (px < (xj - xi) * (py - yi) / (yj - yi) + xi) {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// True-shape intersection test: bounding-box reject, then vertex-in-polygon
/// in both directions.
///
/// Edge-crossing-only overlaps (no vertex of either polygon strictly inside
/// the other) are not detected.
pub fn polygons_intersect(a: &[Point], b: &[Point]) -> bool {
    if a.len() < 3 || b.len() < 3 {
        return false;
    }
    if !bbox(a).intersects(&bbox(b), EPS) {
        return false;
    }
    a.iter().any(|&p| point_in_polygon(p, b)) || b.iter().any(|&p| point_in_polygon(p, a))
}

/// Checks whether any edge of `a` properly crosses an edge of `b`.
///
/// Touching at an endpoint and collinear overlap are not crossings.
pub fn edges_cross(a: &[Point], b: &[Point]) -> bool {
    let (na, nb) = (a.len(), b.len());
    for i in 0..na {
        let (p1, p2) = (a[i], a[(i + 1) % na]);
        let seg_box = AABB2D::from_points(&[p1, p2]);
        for j in 0..nb {
            let (q1, q2) = (b[j], b[(j + 1) % nb]);
            if let (Some(sa), Some(sb)) = (seg_box, AABB2D::from_points(&[q1, q2])) {
                if sa.intersection(&sb).is_none() {
                    continue;
                }
            }
            let o1 = orient(p1, p2, q1);
            let o2 = orient(p1, p2, q2);
            let o3 = orient(q1, q2, p1);
            let o4 = orient(q1, q2, p2);
            if ((o1 > EPS && o2 < -EPS) || (o1 < -EPS && o2 > EPS))
                && ((o3 > EPS && o4 < -EPS) || (o3 < -EPS && o4 > EPS))
            {
                return true;
            }
        }
    }
    false
}

/// Strict overlap test used for placement decisions.
///
/// Extends [`polygons_intersect`] with proper edge crossings and with
/// centroid and edge-midpoint containment, which catches coincident and
/// cross-shaped overlaps where every vertex sits on the other outline.
pub fn polygons_overlap(a: &[Point], b: &[Point]) -> bool {
    if a.len() < 3 || b.len() < 3 {
        return false;
    }
    if !bbox(a).intersects(&bbox(b), EPS) {
        return false;
    }
    if polygons_intersect(a, b) || edges_cross(a, b) {
        return true;
    }
    if point_in_polygon(centroid(a), b) || point_in_polygon(centroid(b), a) {
        return true;
    }
    midpoints(a).any(|m| point_in_polygon(m, b)) || midpoints(b).any(|m| point_in_polygon(m, a))
}

fn midpoints(polygon: &[Point]) -> impl Iterator<Item = Point> + '_ {
    let n = polygon.len();
    (0..n).map(move |i| {
        let (a, b) = (polygon[i], polygon[(i + 1) % n]);
        ((a.0 + b.0) / 2.0, (a.1 + b.1) / 2.0)
    })
}

/// Minimum distance between the outlines of two polygons.
///
/// For non-overlapping simple polygons this is the true separation; the
/// minimum is always attained between a vertex and an edge.
pub fn polygon_distance(a: &[Point], b: &[Point]) -> f64 {
    let one_way = |from: &[Point], to: &[Point]| {
        let n = to.len();
        from.iter()
            .flat_map(|&p| (0..n).map(move |j| (p, j)))
            .map(|(p, j)| point_segment_distance(p, to[j], to[(j + 1) % n]))
            .fold(f64::INFINITY, f64::min)
    };
    one_way(a, b).min(one_way(b, a))
}

/// Returns true if two placed polygons overlap or sit closer than `gap`.
pub fn violates_clearance(a: &[Point], b: &[Point], gap: f64) -> bool {
    if gap > EPS {
        if !bbox(a).expand(gap).intersects(&bbox(b), EPS) {
            return false;
        }
        polygons_overlap(a, b) || polygon_distance(a, b) < gap - 1e-7
    } else {
        polygons_overlap(a, b)
    }
}

/// A closed polygon ring with lazily cached derived properties.
///
/// The closing duplicate vertex is never stored; consecutive duplicates are
/// removed on construction.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Polygon {
    points: Vec<Point>,

    #[cfg_attr(feature = "serde", serde(skip))]
    cached_aabb: OnceLock<AABB2D>,

    #[cfg_attr(feature = "serde", serde(skip))]
    cached_signed_area: OnceLock<f64>,

    #[cfg_attr(feature = "serde", serde(skip))]
    cached_perimeter: OnceLock<f64>,

    #[cfg_attr(feature = "serde", serde(skip))]
    cached_centroid: OnceLock<Point>,
}

impl Polygon {
    /// Creates a polygon from its vertices.
    pub fn new(points: Vec<Point>) -> Self {
        let mut cleaned: Vec<Point> = Vec::with_capacity(points.len());
        for p in points {
            let duplicate = cleaned.last().map_or(false, |&q| distance(p, q) <= EPS);
            if !duplicate {
                cleaned.push(p);
            }
        }
        while cleaned.len() > 1 {
            match (cleaned.first(), cleaned.last()) {
                (Some(&first), Some(&last)) if distance(first, last) <= EPS => {
                    cleaned.pop();
                }
                _ => break,
            }
        }
        Self {
            points: cleaned,
            ..Default::default()
        }
    }

    /// Returns the vertices.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Consumes the polygon and returns its vertices.
    pub fn into_points(self) -> Vec<Point> {
        self.points
    }

    /// Returns the number of vertices.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns true if the polygon has no vertices.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Bounding box (cached).
    pub fn aabb(&self) -> AABB2D {
        *self.cached_aabb.get_or_init(|| bbox(&self.points))
    }

    /// Signed shoelace area (cached).
    pub fn signed_area(&self) -> f64 {
        *self
            .cached_signed_area
            .get_or_init(|| signed_area(&self.points))
    }

    /// Unsigned area.
    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    /// Perimeter (cached).
    pub fn perimeter(&self) -> f64 {
        *self.cached_perimeter.get_or_init(|| perimeter(&self.points))
    }

    /// Area-weighted centroid (cached).
    pub fn centroid(&self) -> Point {
        *self.cached_centroid.get_or_init(|| centroid(&self.points))
    }

    /// Returns a copy rotated about `center`.
    pub fn rotated(&self, degrees: f64, center: Point) -> Polygon {
        Polygon::new(rotate(&self.points, degrees, center))
    }

    /// Returns a copy rotated about its centroid.
    pub fn rotated_about_centroid(&self, degrees: f64) -> Polygon {
        self.rotated(degrees, self.centroid())
    }

    /// Checks that the ring can take part in a nest.
    pub fn validate(&self) -> Result<()> {
        if self.points.len() < 3 {
            return Err(Error::InvalidGeometry(format!(
                "polygon needs at least 3 distinct points, got {}",
                self.points.len()
            )));
        }
        if self
            .points
            .iter()
            .any(|&(x, y)| !x.is_finite() || !y.is_finite())
        {
            return Err(Error::InvalidGeometry(
                "polygon has non-finite coordinates".into(),
            ));
        }
        if self.area() <= EPS {
            return Err(Error::InvalidGeometry("polygon has zero area".into()));
        }
        Ok(())
    }
}

impl PartialEq for Polygon {
    fn eq(&self, other: &Self) -> bool {
        self.points == other.points
    }
}

impl From<Vec<Point>> for Polygon {
    fn from(points: Vec<Point>) -> Self {
        Polygon::new(points)
    }
}
