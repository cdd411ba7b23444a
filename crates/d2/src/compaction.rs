//! Slide-and-compact post-processing.
//!
//! Each pass visits placed pieces bottom-first and slides every piece down,
//! then left, as far as it goes without violating the clearance or leaving
//! the strip. Slides advance in steps no longer than half the thinnest piece,
//! so a piece never tunnels through a neighbour, and the final contact is
//! found by bisection. Every accepted position is checked with the exact
//! predicate, and the strip length never increases.

use crate::layout::{NestContext, PlacementStrategy, RotationChoice};
use crate::spatial_index::{SpatialEntry2D, SpatialIndex2D};
use crate::strip::Strip;
use marker_core::geom::{self, Point, EPS};
use marker_core::{NestResult, Placement};

const BISECTION_STEPS: usize = 20;
const MIN_STEP: f64 = 1e-3;
const MIN_MOVE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Down,
    Left,
}

impl Axis {
    fn offset(self, distance: f64) -> (f64, f64) {
        match self {
            Axis::Down => (0.0, -distance),
            Axis::Left => (-distance, 0.0),
        }
    }
}

/// Working state of one compaction run.
struct Compactor {
    strip: Strip,
    placements: Vec<Placement>,
    index: SpatialIndex2D,
    step_x: f64,
    step_y: f64,
}

impl Compactor {
    fn new(strip: Strip, placements: Vec<Placement>) -> Self {
        let (min_w, min_h) = placements
            .iter()
            .map(|p| {
                let b = p.aabb();
                (b.width(), b.height())
            })
            .fold((f64::INFINITY, f64::INFINITY), |(w, h), (bw, bh)| {
                (w.min(bw), h.min(bh))
            });
        Self {
            strip,
            index: SpatialIndex2D::from_placements(&placements),
            placements,
            step_x: (min_w * 0.5).max(MIN_STEP),
            step_y: (min_h * 0.5).max(MIN_STEP),
        }
    }

    /// Returns true if slot `i` can move to `polygon`. The caller has taken
    /// `i` out of the index.
    fn is_clear(&self, polygon: &[Point]) -> bool {
        let gap = self.strip.spacing();
        let aabb = geom::bbox(polygon);
        self.strip.contains_box(&aabb)
            && self
                .index
                .get_potential_collisions(&aabb, gap)
                .into_iter()
                .all(|j| !geom::violates_clearance(polygon, &self.placements[j].polygon, gap))
    }

    fn is_clear_at(&self, i: usize, axis: Axis, distance: f64) -> bool {
        let (dx, dy) = axis.offset(distance);
        self.is_clear(&geom::translate(&self.placements[i].polygon, dx, dy))
    }

    /// Longest clear slide of slot `i` along `axis`.
    fn slide_distance(&self, i: usize, axis: Axis) -> f64 {
        let b = self.placements[i].aabb();
        let margin = self.strip.margin();
        let (limit, step) = match axis {
            Axis::Down => (b.min_y - margin, self.step_y),
            Axis::Left => (b.min_x - margin, self.step_x),
        };
        if limit <= MIN_MOVE {
            return 0.0;
        }

        let mut good = 0.0;
        let mut bad = None;
        while good < limit {
            let next = (good + step).min(limit);
            if self.is_clear_at(i, axis, next) {
                good = next;
            } else {
                bad = Some(next);
                break;
            }
        }

        let Some(mut bad) = bad else {
            return good;
        };
        for _ in 0..BISECTION_STEPS {
            let mid = 0.5 * (good + bad);
            if self.is_clear_at(i, axis, mid) {
                good = mid;
            } else {
                bad = mid;
            }
        }
        good
    }

    /// Slides slot `i` down then left. Returns true if it moved.
    fn settle(&mut self, i: usize) -> bool {
        let entry = SpatialEntry2D::from_placement(i, &self.placements[i]);
        self.index.remove(&entry);

        let mut moved = false;
        for axis in [Axis::Down, Axis::Left] {
            let distance = self.slide_distance(i, axis);
            if distance > MIN_MOVE {
                let (dx, dy) = axis.offset(distance);
                self.placements[i] = self.placements[i].moved(dx, dy);
                moved = true;
            }
        }

        self.index
            .insert(SpatialEntry2D::from_placement(i, &self.placements[i]));
        moved
    }

    /// Slots ordered bottom-first, then left-first.
    fn sweep_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.placements.len()).collect();
        order.sort_by(|&a, &b| {
            let (pa, pb) = (&self.placements[a], &self.placements[b]);
            pa.y.total_cmp(&pb.y).then(pa.x.total_cmp(&pb.x))
        });
        order
    }
}

/// Compacts a layout toward the bottom-left corner.
///
/// Runs at most `passes` passes, stopping early when nothing moves or the
/// context expires. Returns `layout` unchanged if compaction would not
/// shorten or keep its length.
pub fn compact(ctx: &NestContext<'_>, layout: &NestResult, passes: usize) -> NestResult {
    if layout.placements.is_empty() || passes == 0 {
        return layout.clone();
    }

    let mut compactor = Compactor::new(ctx.strip, layout.placements.clone());
    let mut total_moves = 0;
    for pass in 0..passes {
        if ctx.expired() {
            log::debug!("compaction stopped by deadline after {} passes", pass);
            break;
        }
        let mut moves = 0;
        for i in compactor.sweep_order() {
            if compactor.settle(i) {
                moves += 1;
            }
        }
        total_moves += moves;
        if moves == 0 {
            break;
        }
    }

    if total_moves == 0 {
        return layout.clone();
    }

    let mut result = NestResult::from_placements(
        compactor.placements,
        layout.strip_width,
        layout.unplaced.clone(),
    );
    if result.length > layout.length + EPS {
        return layout.clone();
    }
    result.timed_out = layout.timed_out;
    result.cancelled = layout.cancelled;
    result.target_reached = layout.target_reached;
    result.generations = layout.generations;
    result.best_fitness = layout.best_fitness;
    result.fitness_history = layout.fitness_history.clone();
    result.strategy = layout
        .strategy
        .as_ref()
        .map(|name| format!("{}+compact", name));

    log::debug!(
        "compaction: {} moves, length {:.3} -> {:.3}",
        total_moves,
        layout.length,
        result.length
    );
    result
}

/// Runs a strategy and compacts its layout.
#[derive(Debug, Clone, Copy)]
pub struct SlideCompact<S> {
    inner: S,
    passes: usize,
}

impl<S: PlacementStrategy> SlideCompact<S> {
    /// Wraps `inner` with `passes` compaction passes.
    pub fn new(inner: S, passes: usize) -> Self {
        Self { inner, passes }
    }
}

impl<S: PlacementStrategy> PlacementStrategy for SlideCompact<S> {
    fn name(&self) -> String {
        format!("{}+compact", self.inner.name())
    }

    fn place(
        &self,
        ctx: &NestContext<'_>,
        order: &[usize],
        rotations: &[RotationChoice],
    ) -> NestResult {
        let layout = self.inner.place(ctx, order, rotations);
        let mut result = compact(ctx, &layout, self.passes);
        result.strategy = Some(self.name());
        result
    }
}
