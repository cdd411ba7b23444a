//! No-Fit Polygon (NFP) computation.
//!
//! The NFP of a fixed piece F and an orbiting piece O is the set of positions
//! of O's reference point (its normalized bounding-box origin) at which O
//! overlaps F. Both pieces are approximated by their convex hulls, so the NFP
//! is the Minkowski sum `hull(F) ⊕ -hull(O)`, built in O(n+m) by merging the
//! hull edge vectors in polar-angle order. For non-convex pieces this is
//! conservative: it forbids positions inside F's concavities that would
//! actually be free.
//!
//! NFPs are computed with F at the origin and translated to F's placement.
//! Clearance is applied by inflating the NFP radially by the gap, which is a
//! centroid scale rather than a true offset; placements taken from it are
//! always re-verified with the exact predicate.

use crate::piece::RotationVariant;
use marker_core::geom::{self, Point};
use marker_core::{Error, Result};
use std::collections::HashMap;
use std::f64::consts::PI;
use std::sync::{Arc, RwLock};

/// NFP of one (fixed, orbiting) variant pair, with F at the origin.
#[derive(Debug, Clone)]
pub struct Nfp {
    /// Minkowski sum of the two hulls (counter-clockwise).
    pub polygon: Vec<Point>,
    /// `polygon` inflated radially by the clearance gap.
    pub inflated: Vec<Point>,
}

impl Nfp {
    /// Returns true if the NFP has no vertices.
    pub fn is_empty(&self) -> bool {
        self.polygon.is_empty()
    }

    /// Returns the vertex count of the raw NFP.
    pub fn vertex_count(&self) -> usize {
        self.polygon.len()
    }

    /// Raw NFP vertices for F placed at `(dx, dy)`.
    pub fn vertices_at(&self, dx: f64, dy: f64) -> impl Iterator<Item = Point> + '_ {
        self.polygon.iter().map(move |&(x, y)| (x + dx, y + dy))
    }

    /// Inflated NFP vertices for F placed at `(dx, dy)`.
    pub fn inflated_vertices_at(&self, dx: f64, dy: f64) -> impl Iterator<Item = Point> + '_ {
        self.inflated.iter().map(move |&(x, y)| (x + dx, y + dy))
    }

}

/// Computes the NFP of `orbiting` around `fixed`, both normalized variants.
pub fn compute_nfp(fixed: &RotationVariant, orbiting: &RotationVariant, gap: f64) -> Result<Nfp> {
    if fixed.hull.len() < 3 || orbiting.hull.len() < 3 {
        return Err(Error::NfpError(
            "Convex hulls must have at least 3 vertices".into(),
        ));
    }

    let reflected: Vec<Point> = orbiting.hull.iter().map(|&(x, y)| (-x, -y)).collect();
    let polygon = minkowski_sum_convex(&fixed.hull, &reflected)?;
    let inflated = if gap > 0.0 {
        geom::offset_radial(&polygon, gap)
    } else {
        polygon.clone()
    };

    Ok(Nfp { polygon, inflated })
}

/// Minkowski sum of two convex polygons by merging sorted edge vectors.
fn minkowski_sum_convex(poly_a: &[Point], poly_b: &[Point]) -> Result<Vec<Point>> {
    let a = geom::ensure_ccw(poly_a);
    let b = geom::ensure_ccw(poly_b);

    let edges_a = get_edge_vectors(&a);
    let edges_b = get_edge_vectors(&b);

    let start_a = find_bottom_left_vertex(&a);
    let start_b = find_bottom_left_vertex(&b);

    let mut current = (a[start_a].0 + b[start_b].0, a[start_a].1 + b[start_b].1);
    let mut result = Vec::with_capacity(edges_a.len() + edges_b.len());
    result.push(current);

    for (dx, dy) in merge_edge_vectors(&edges_a, start_a, &edges_b, start_b) {
        current = (current.0 + dx, current.1 + dy);
        result.push(current);
    }

    // Walking every edge returns to the start
    if result.len() > 1 {
        let first = result[0];
        let last = result[result.len() - 1];
        if (first.0 - last.0).abs() < 1e-9 && (first.1 - last.1).abs() < 1e-9 {
            result.pop();
        }
    }

    if result.len() < 3 {
        return Err(Error::NfpError(format!(
            "Minkowski sum degenerated to {} vertices",
            result.len()
        )));
    }
    Ok(result)
}

fn get_edge_vectors(polygon: &[Point]) -> Vec<Point> {
    let n = polygon.len();
    (0..n)
        .map(|i| {
            let j = (i + 1) % n;
            (polygon[j].0 - polygon[i].0, polygon[j].1 - polygon[i].1)
        })
        .collect()
}

/// Index of the bottom-most (then left-most) vertex.
fn find_bottom_left_vertex(polygon: &[Point]) -> usize {
    let mut min_idx = 0;
    for (i, &(x, y)) in polygon.iter().enumerate() {
        let (min_x, min_y) = polygon[min_idx];
        if y < min_y || (y == min_y && x < min_x) {
            min_idx = i;
        }
    }
    min_idx
}

/// Polar angle of an edge vector in [0, 2π).
fn edge_angle(dx: f64, dy: f64) -> f64 {
    let angle = dy.atan2(dx);
    if angle < 0.0 {
        angle + 2.0 * PI
    } else {
        angle
    }
}

fn merge_edge_vectors(
    edges_a: &[Point],
    start_a: usize,
    edges_b: &[Point],
    start_b: usize,
) -> Vec<Point> {
    let n_a = edges_a.len();
    let n_b = edges_b.len();

    let mut result = Vec::with_capacity(n_a + n_b);
    let mut i_a = 0;
    let mut i_b = 0;

    while i_a < n_a || i_b < n_b {
        if i_a >= n_a {
            result.push(edges_b[(start_b + i_b) % n_b]);
            i_b += 1;
        } else if i_b >= n_b {
            result.push(edges_a[(start_a + i_a) % n_a]);
            i_a += 1;
        } else {
            let edge_a = edges_a[(start_a + i_a) % n_a];
            let edge_b = edges_b[(start_b + i_b) % n_b];
            let angle_a = edge_angle(edge_a.0, edge_a.1);
            let angle_b = edge_angle(edge_b.0, edge_b.1);

            if (angle_a - angle_b).abs() <= 1e-10 {
                // Parallel edges merge into one
                result.push((edge_a.0 + edge_b.0, edge_a.1 + edge_b.1));
                i_a += 1;
                i_b += 1;
            } else if angle_a < angle_b {
                result.push(edge_a);
                i_a += 1;
            } else {
                result.push(edge_b);
                i_b += 1;
            }
        }
    }

    result
}

/// Cache key: both pieces and both rotations (millidegrees).
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
struct NfpCacheKey {
    fixed_id: usize,
    fixed_rotation: i64,
    orbiting_id: usize,
    orbiting_rotation: i64,
}

impl NfpCacheKey {
    fn new(fixed: (usize, f64), orbiting: (usize, f64)) -> Self {
        Self {
            fixed_id: fixed.0,
            fixed_rotation: millidegrees(fixed.1),
            orbiting_id: orbiting.0,
            orbiting_rotation: millidegrees(orbiting.1),
        }
    }
}

fn millidegrees(degrees: f64) -> i64 {
    (geom::normalize_angle(degrees) * 1000.0).round() as i64
}

/// Thread-safe NFP memoization for one nesting run.
///
/// Entries are keyed by immutable inputs and never invalidated; the cache is
/// dropped with the run.
#[derive(Debug, Default)]
pub struct NfpCache {
    cache: RwLock<HashMap<NfpCacheKey, Arc<Nfp>>>,
}

impl NfpCache {
    /// Creates a new empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a cached NFP or computes and caches it.
    ///
    /// `fixed` and `orbiting` are `(piece id, rotation in degrees)`.
    pub fn get_or_compute<F>(
        &self,
        fixed: (usize, f64),
        orbiting: (usize, f64),
        compute: F,
    ) -> Result<Arc<Nfp>>
    where
        F: FnOnce() -> Result<Nfp>,
    {
        let key = NfpCacheKey::new(fixed, orbiting);

        {
            let cache = self.cache.read().map_err(|e| {
                Error::Internal(format!("Failed to acquire cache read lock: {}", e))
            })?;
            if let Some(nfp) = cache.get(&key) {
                return Ok(Arc::clone(nfp));
            }
        }

        let nfp = Arc::new(compute()?);

        let mut cache = self
            .cache
            .write()
            .map_err(|e| Error::Internal(format!("Failed to acquire cache write lock: {}", e)))?;
        // Another worker may have raced us here; keep the first entry
        let entry = cache.entry(key).or_insert_with(|| Arc::clone(&nfp));
        Ok(Arc::clone(entry))
    }

    /// Returns the number of cached entries.
    pub fn len(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::piece::{l_shape, rectangle, Piece};
    use approx::assert_relative_eq;

    fn variant(points: Vec<Point>) -> RotationVariant {
        Piece::new(0, points, &[0.0]).unwrap().variants()[0].clone()
    }

    #[test]
    fn test_edge_angle() {
        assert_relative_eq!(edge_angle(1.0, 0.0), 0.0);
        assert_relative_eq!(edge_angle(0.0, 1.0), PI / 2.0);
        assert_relative_eq!(edge_angle(-1.0, 0.0), PI);
        assert_relative_eq!(edge_angle(0.0, -1.0), 3.0 * PI / 2.0);
    }

    #[test]
    fn test_nfp_two_squares() {
        let a = variant(rectangle(10.0, 10.0));
        let b = variant(rectangle(5.0, 5.0));
        let nfp = compute_nfp(&a, &b, 0.0).unwrap();

        // Reference positions from (-5,-5) to (10,10)
        let bbox = geom::bbox(&nfp.polygon);
        assert_relative_eq!(bbox.min_x, -5.0);
        assert_relative_eq!(bbox.min_y, -5.0);
        assert_relative_eq!(bbox.max_x, 10.0);
        assert_relative_eq!(bbox.max_y, 10.0);
        assert_relative_eq!(geom::area(&nfp.polygon), 225.0, epsilon = 1e-9);
        assert_eq!(nfp.vertex_count(), 4);
    }

    #[test]
    fn test_nfp_interior_is_overlap_only() {
        let a = variant(rectangle(10.0, 10.0));
        let b = variant(rectangle(5.0, 5.0));
        let nfp = compute_nfp(&a, &b, 0.0).unwrap();

        assert!(geom::point_in_polygon((2.0, 2.0), &nfp.polygon));
        // touching on the right edge is allowed
        assert!(!geom::point_in_polygon((10.0, 0.0), &nfp.polygon));
        // translated with the fixed piece
        let moved: Vec<Point> = nfp.vertices_at(20.0, 0.0).collect();
        assert!(geom::point_in_polygon((22.0, 2.0), &moved));
        assert!(!geom::point_in_polygon((2.0, 2.0), &moved));
    }

    #[test]
    fn test_inflated_nfp_is_larger() {
        let a = variant(rectangle(10.0, 10.0));
        let b = variant(rectangle(10.0, 10.0));
        let nfp = compute_nfp(&a, &b, 1.0).unwrap();
        assert!(geom::area(&nfp.inflated) > geom::area(&nfp.polygon));
    }

    #[test]
    fn test_nfp_of_l_shape_uses_hull() {
        let a = variant(l_shape(20.0, 20.0, 10.0, 10.0));
        let b = variant(rectangle(4.0, 4.0));
        let nfp = compute_nfp(&a, &b, 0.0).unwrap();
        // the notch is conservatively forbidden
        assert!(geom::point_in_polygon((14.0, 14.0), &nfp.polygon));
        assert!(geom::is_convex(&nfp.polygon));
    }

    #[test]
    fn test_nfp_cache() {
        let cache = NfpCache::new();
        let a = variant(rectangle(10.0, 10.0));
        let b = variant(rectangle(5.0, 5.0));

        let first = cache
            .get_or_compute((0, 0.0), (1, 90.0), || compute_nfp(&a, &b, 0.0))
            .unwrap();
        let second = cache
            .get_or_compute((0, 360.0), (1, 90.0), || {
                Err(Error::Internal("should be cached".into()))
            })
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        cache
            .get_or_compute((0, 0.0), (1, 180.0), || compute_nfp(&a, &b, 0.0))
            .unwrap();
        cache
            .get_or_compute((1, 90.0), (0, 0.0), || compute_nfp(&b, &a, 0.0))
            .unwrap();
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_nfp_cache_under_parallel_lookups() {
        use rayon::prelude::*;

        let pieces: Vec<Piece> = (0..4)
            .map(|i| {
                let side = 4.0 + i as f64;
                Piece::new(i, rectangle(side, side + 3.0), &[0.0, 90.0]).unwrap()
            })
            .collect();
        let mut keys = Vec::new();
        for f in 0..pieces.len() {
            for o in 0..pieces.len() {
                for fv in 0..pieces[f].variant_count() {
                    for ov in 0..pieces[o].variant_count() {
                        keys.push((f, fv, o, ov));
                    }
                }
            }
        }
        // every key is requested several times, interleaved
        let requests: Vec<(usize, usize, usize, usize)> =
            keys.iter().cycle().take(keys.len() * 4).copied().collect();

        let cache = NfpCache::new();
        let results: Vec<Arc<Nfp>> = requests
            .par_iter()
            .map(|&(f, fv, o, ov)| {
                let fixed = &pieces[f].variants()[fv];
                let orbiting = &pieces[o].variants()[ov];
                cache
                    .get_or_compute((f, fixed.angle), (o, orbiting.angle), || {
                        compute_nfp(fixed, orbiting, 0.5)
                    })
                    .unwrap()
            })
            .collect();

        assert_eq!(cache.len(), keys.len());
        for (&(f, fv, o, ov), nfp) in requests.iter().zip(&results) {
            let expected =
                compute_nfp(&pieces[f].variants()[fv], &pieces[o].variants()[ov], 0.5).unwrap();
            assert_eq!(nfp.polygon, expected.polygon);
            assert_eq!(nfp.inflated, expected.inflated);
        }
    }

    #[test]
    fn test_nfp_cache_propagates_errors() {
        let cache = NfpCache::new();
        let result = cache.get_or_compute((0, 0.0), (1, 0.0), || {
            Err(Error::NfpError("degenerate".into()))
        });
        assert!(result.is_err());
        assert!(cache.is_empty());
    }
}
