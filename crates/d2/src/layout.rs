//! Shared machinery for placement strategies.
//!
//! Every strategy turns an ordered list of pieces plus a per-piece rotation
//! choice into one [`NestResult`]. [`NestContext`] carries the per-run state
//! (pieces, strip, NFP cache, deadline, cancellation) explicitly, and
//! [`LayoutBuilder`] owns the growing layout: placements, the spatial index
//! and the unplaced list.

use crate::nfp::NfpCache;
use crate::piece::{Piece, RotationVariant};
use crate::spatial_index::{SpatialEntry2D, SpatialIndex2D};
use crate::strip::Strip;
use marker_core::geom::{self, Point, EPS};
use marker_core::{NestResult, Placement, Unplaced};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Reason recorded for pieces skipped because the deadline passed.
pub const REASON_TIMEOUT: &str = "time budget exhausted before the piece was placed";

/// Reason recorded for pieces no rotation of which fits across the strip.
pub const REASON_TOO_WIDE: &str = "wider than the strip under every allowed rotation";

/// Per-piece rotation constraint handed to a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationChoice {
    /// Try every variant that fits and keep the best position.
    Any,
    /// Use this variant; fall back to the fitting variants if it is too wide.
    Fixed(usize),
}

/// Explicit state for one nesting run, shared read-only by every strategy.
pub struct NestContext<'a> {
    /// Valid pieces; orders and rotation choices index into this slice.
    pub pieces: &'a [Piece],
    /// The strip being filled.
    pub strip: Strip,
    /// NFP memoization for this run.
    pub cache: &'a NfpCache,
    /// Wall-clock deadline, if any.
    pub deadline: Option<Instant>,
    /// Cancellation flag.
    pub cancelled: Arc<AtomicBool>,
    /// Pieces rejected before nesting; copied into every layout.
    pub rejected: &'a [Unplaced],
}

impl<'a> NestContext<'a> {
    /// Creates a context without deadline or pre-rejected pieces.
    pub fn new(pieces: &'a [Piece], strip: Strip, cache: &'a NfpCache) -> Self {
        Self {
            pieces,
            strip,
            cache,
            deadline: None,
            cancelled: Arc::new(AtomicBool::new(false)),
            rejected: &[],
        }
    }

    /// Sets the deadline.
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Shares an existing cancellation flag.
    pub fn with_cancel_flag(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    /// Sets the pieces rejected before nesting.
    pub fn with_rejected(mut self, rejected: &'a [Unplaced]) -> Self {
        self.rejected = rejected;
        self
    }

    /// Returns true once the deadline has passed or the run was cancelled.
    pub fn expired(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
            || self.deadline.map_or(false, |d| Instant::now() >= d)
    }

    /// `Any` for every piece.
    pub fn any_rotation(&self) -> Vec<RotationChoice> {
        vec![RotationChoice::Any; self.pieces.len()]
    }

    /// Identity order over all pieces.
    pub fn identity_order(&self) -> Vec<usize> {
        (0..self.pieces.len()).collect()
    }

    /// Variants a strategy may use for `piece` under `choice`.
    pub fn candidate_variants(&self, piece: &Piece, choice: RotationChoice) -> Vec<usize> {
        let usable = self.strip.usable_width();
        if let RotationChoice::Fixed(i) = choice {
            if let Some(v) = piece.variant(i) {
                if v.width <= usable + EPS {
                    return vec![i];
                }
            }
        }
        piece.fitting_variants(usable).collect()
    }
}

/// A layout-producing placement strategy.
pub trait PlacementStrategy: Send + Sync {
    /// Short name recorded on the result.
    fn name(&self) -> String;

    /// Places `order` (indices into `ctx.pieces`) on the strip.
    ///
    /// `rotations[i]` constrains piece `i`. Pieces that cannot be placed are
    /// reported as unplaced; the strategy never fails.
    fn place(
        &self,
        ctx: &NestContext<'_>,
        order: &[usize],
        rotations: &[RotationChoice],
    ) -> NestResult;
}

/// A scored position for one variant of one piece.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Reference-point x.
    pub x: f64,
    /// Reference-point y.
    pub y: f64,
    /// Variant index.
    pub variant: usize,
    /// Top edge of the placed variant.
    pub top: f64,
}

impl Candidate {
    /// Creates a candidate for a variant placed at `(x, y)`.
    pub fn new(x: f64, y: f64, variant: usize, height: f64) -> Self {
        Self {
            x,
            y,
            variant,
            top: y + height,
        }
    }

    /// Lowest y, then lowest x, then lowest top edge. Strict, so on a full
    /// tie the candidate seen first is kept.
    pub fn is_better_than(&self, other: &Candidate) -> bool {
        if (self.y - other.y).abs() > EPS {
            return self.y < other.y;
        }
        if (self.x - other.x).abs() > EPS {
            return self.x < other.x;
        }
        self.top < other.top - EPS
    }
}

/// Keeps `candidate` if it beats the current best.
pub fn keep_best(best: &mut Option<Candidate>, candidate: Candidate) {
    match best {
        Some(current) if !candidate.is_better_than(current) => {}
        _ => *best = Some(candidate),
    }
}

/// Growing layout with collision checks against everything placed so far.
pub struct LayoutBuilder<'c, 'a> {
    ctx: &'c NestContext<'a>,
    placements: Vec<Placement>,
    /// Index into `ctx.pieces` for each placement slot.
    slots: Vec<usize>,
    index: SpatialIndex2D,
    unplaced: Vec<Unplaced>,
    top: f64,
    timed_out: bool,
}

impl<'c, 'a> LayoutBuilder<'c, 'a> {
    /// Creates an empty layout.
    pub fn new(ctx: &'c NestContext<'a>) -> Self {
        Self {
            ctx,
            placements: Vec::new(),
            slots: Vec::new(),
            index: SpatialIndex2D::new(),
            unplaced: Vec::new(),
            top: 0.0,
            timed_out: false,
        }
    }

    /// The run context.
    pub fn ctx(&self) -> &'c NestContext<'a> {
        self.ctx
    }

    /// Placements made so far.
    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    /// Piece and variant behind each placement.
    pub fn placed_variants(&self) -> impl Iterator<Item = (&Placement, &'a Piece)> + '_ {
        let pieces = self.ctx.pieces;
        self.placements
            .iter()
            .zip(&self.slots)
            .map(move |(p, &slot)| (p, &pieces[slot]))
    }

    /// Highest Y reached so far (0 when empty).
    pub fn top(&self) -> f64 {
        self.top
    }

    /// Returns true if `polygon` would overlap or crowd any placed piece.
    pub fn collides(&self, polygon: &[Point]) -> bool {
        let gap = self.ctx.strip.spacing();
        let aabb = geom::bbox(polygon);
        self.index
            .get_potential_collisions(&aabb, gap)
            .into_iter()
            .any(|slot| geom::violates_clearance(polygon, &self.placements[slot].polygon, gap))
    }

    /// Returns true if `polygon` lies inside the strip and clear of every placed piece.
    pub fn fits(&self, polygon: &[Point]) -> bool {
        self.ctx.strip.contains_box(&geom::bbox(polygon)) && !self.collides(polygon)
    }

    /// Returns true if the variant can go at `(x, y)`.
    pub fn fits_at(&self, variant: &RotationVariant, x: f64, y: f64) -> bool {
        self.fits(&geom::translate(&variant.polygon, x, y))
    }

    /// Places a variant of `ctx.pieces[slot]` at `(x, y)`.
    pub fn place(&mut self, slot: usize, variant_index: usize, x: f64, y: f64) {
        let ctx = self.ctx;
        let piece = &ctx.pieces[slot];
        let Some(variant) = piece.variant(variant_index) else {
            self.reject(slot, "rotation variant out of range");
            return;
        };
        let placement = Placement::new(
            piece.id(),
            variant.angle,
            variant_index,
            x,
            y,
            &variant.polygon,
        );
        self.top = self.top.max(placement.top());
        self.index
            .insert(SpatialEntry2D::from_placement(self.placements.len(), &placement));
        self.placements.push(placement);
        self.slots.push(slot);
    }

    /// Places the winning candidate.
    pub fn place_candidate(&mut self, slot: usize, candidate: &Candidate) {
        self.place(slot, candidate.variant, candidate.x, candidate.y);
    }

    /// Records a piece as unplaced.
    pub fn reject(&mut self, slot: usize, reason: impl Into<String>) {
        let id = self.ctx.pieces[slot].id();
        self.unplaced.push(Unplaced::new(id, reason));
    }

    /// Checks the deadline. Once expired, every remaining piece is marked
    /// unplaced and true is returned.
    pub fn stop_if_expired(&mut self, remaining: &[usize]) -> bool {
        if !self.ctx.expired() {
            return false;
        }
        if !self.timed_out {
            log::warn!(
                "time budget exhausted with {} pieces left to place",
                remaining.len()
            );
        }
        self.timed_out = true;
        for &slot in remaining {
            self.reject(slot, REASON_TIMEOUT);
        }
        true
    }

    /// Finishes the layout.
    pub fn finish(self, strategy: impl Into<String>) -> NestResult {
        let mut unplaced = self.ctx.rejected.to_vec();
        unplaced.extend(self.unplaced);
        let mut result =
            NestResult::from_placements(self.placements, self.ctx.strip.width(), unplaced);
        result.timed_out = self.timed_out;
        result.cancelled = self.ctx.cancelled.load(Ordering::Relaxed);
        result.with_strategy(strategy)
    }
}

/// Walks `order`, calling `place_one` for every piece that has at least one
/// usable variant. Handles the deadline and too-wide pieces uniformly.
pub fn run_in_order<'c, 'a, F>(
    builder: &mut LayoutBuilder<'c, 'a>,
    order: &[usize],
    rotations: &[RotationChoice],
    mut place_one: F,
) where
    F: FnMut(&mut LayoutBuilder<'c, 'a>, usize, &[usize]),
{
    let ctx = builder.ctx();
    for (pos, &slot) in order.iter().enumerate() {
        if builder.stop_if_expired(&order[pos..]) {
            return;
        }
        let choice = rotations.get(slot).copied().unwrap_or(RotationChoice::Any);
        let variants = ctx.candidate_variants(&ctx.pieces[slot], choice);
        if variants.is_empty() {
            builder.reject(slot, REASON_TOO_WIDE);
            continue;
        }
        place_one(builder, slot, &variants);
    }
}

/// Sorts slots by a key, descending, ties in index order.
pub fn order_by_desc<F>(pieces: &[Piece], key: F) -> Vec<usize>
where
    F: Fn(&Piece) -> f64,
{
    let mut order: Vec<usize> = (0..pieces.len()).collect();
    order.sort_by(|&a, &b| {
        key(&pieces[b])
            .partial_cmp(&key(&pieces[a]))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    order
}

/// Area-, height- and width-descending orderings, with their names.
pub fn seed_orderings(pieces: &[Piece]) -> Vec<(&'static str, Vec<usize>)> {
    vec![
        ("area", order_by_desc(pieces, Piece::area)),
        ("height", order_by_desc(pieces, Piece::height)),
        ("width", order_by_desc(pieces, Piece::width)),
    ]
}
