//! Spatial indexing of placed pieces using an R*-tree.
//!
//! Broad phase only: the index returns placed pieces whose bounding boxes
//! come within the clearance gap of a query box, and the caller runs the exact
//! predicate on those. It never changes which positions are accepted.

use marker_core::transform::AABB2D;
use marker_core::Placement;
use rstar::{RTree, RTreeObject, AABB};

/// An entry in the index representing one placed piece.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialEntry2D {
    /// Slot of the placement in the layout being built.
    pub index: usize,
    /// Source index of the placed piece.
    pub piece_id: usize,
    /// Axis-aligned bounding box (min_x, min_y, max_x, max_y).
    pub aabb: [f64; 4],
}

impl SpatialEntry2D {
    /// Creates a new spatial entry.
    pub fn new(index: usize, piece_id: usize, aabb: [f64; 4]) -> Self {
        Self {
            index,
            piece_id,
            aabb,
        }
    }

    /// Creates an entry for a placement stored at `index`.
    pub fn from_placement(index: usize, placement: &Placement) -> Self {
        let b = placement.aabb();
        Self::new(index, placement.piece_id, [b.min_x, b.min_y, b.max_x, b.max_y])
    }
}

impl RTreeObject for SpatialEntry2D {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners([self.aabb[0], self.aabb[1]], [self.aabb[2], self.aabb[3]])
    }
}

/// 2D spatial index over placed-piece bounding boxes.
#[derive(Debug)]
pub struct SpatialIndex2D {
    tree: RTree<SpatialEntry2D>,
}

impl SpatialIndex2D {
    /// Creates a new empty spatial index.
    pub fn new() -> Self {
        Self { tree: RTree::new() }
    }

    /// Creates a spatial index with the given entries.
    pub fn with_entries(entries: Vec<SpatialEntry2D>) -> Self {
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Builds an index over a full set of placements.
    pub fn from_placements(placements: &[Placement]) -> Self {
        Self::with_entries(
            placements
                .iter()
                .enumerate()
                .map(|(i, p)| SpatialEntry2D::from_placement(i, p))
                .collect(),
        )
    }

    /// Inserts a new entry.
    pub fn insert(&mut self, entry: SpatialEntry2D) {
        self.tree.insert(entry);
    }

    /// Removes an entry. Returns false if it was not present.
    pub fn remove(&mut self, entry: &SpatialEntry2D) -> bool {
        self.tree.remove(entry).is_some()
    }

    /// Returns the number of entries in the index.
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Returns true if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Finds all entries whose bounding boxes intersect or touch the given box.
    pub fn query_aabb(&self, min: [f64; 2], max: [f64; 2]) -> Vec<&SpatialEntry2D> {
        let envelope = AABB::from_corners(min, max);
        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .collect()
    }

    /// Finds all entries within `margin` of the given box.
    pub fn query_with_margin(&self, aabb: &AABB2D, margin: f64) -> Vec<&SpatialEntry2D> {
        self.query_aabb(
            [aabb.min_x - margin, aabb.min_y - margin],
            [aabb.max_x + margin, aabb.max_y + margin],
        )
    }

    /// Returns the placement slots of potentially colliding pieces.
    pub fn get_potential_collisions(&self, aabb: &AABB2D, spacing: f64) -> Vec<usize> {
        let mut slots: Vec<usize> = self
            .query_with_margin(aabb, spacing)
            .iter()
            .map(|entry| entry.index)
            .collect();
        // Tree order is not insertion order; keep checks deterministic
        slots.sort_unstable();
        slots
    }
}

impl Default for SpatialIndex2D {
    fn default() -> Self {
        Self::new()
    }
}
