//! Guillotine free-rectangle placement.
//!
//! The free region starts as one rectangle covering the usable strip. Each
//! placement takes the bottom-left corner of a free rectangle and splits the
//! remainder with a single straight cut along the shorter leftover axis.
//! Rectangles live in footprint space: a variant occupies `w + gap` by
//! `h + gap`, so disjoint footprints already keep the clearance.

use crate::layout::{
    run_in_order, Candidate, LayoutBuilder, NestContext, PlacementStrategy, RotationChoice,
};
use marker_core::geom::EPS;
use marker_core::NestResult;

/// Guillotine-cut placement over free rectangles.
#[derive(Debug, Clone, Copy, Default)]
pub struct Guillotine;

/// An axis-aligned free rectangle; `h` may be infinite.
#[derive(Debug, Clone, Copy, PartialEq)]
struct FreeRect {
    x: f64,
    y: f64,
    w: f64,
    h: f64,
}

impl FreeRect {
    fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    fn holds(&self, fw: f64, fh: f64) -> bool {
        fw <= self.w + EPS && fh <= self.h + EPS
    }

    fn is_degenerate(&self) -> bool {
        self.w <= EPS || self.h <= EPS
    }

    /// Splits off the used `fw` x `fh` corner; returns the right and top parts.
    fn split(&self, fw: f64, fh: f64) -> [FreeRect; 2] {
        let leftover_w = self.w - fw;
        let leftover_h = self.h - fh;
        if leftover_w < leftover_h {
            [
                FreeRect::new(self.x + fw, self.y, leftover_w, fh),
                FreeRect::new(self.x, self.y + fh, self.w, leftover_h),
            ]
        } else {
            [
                FreeRect::new(self.x + fw, self.y, leftover_w, self.h),
                FreeRect::new(self.x, self.y + fh, fw, leftover_h),
            ]
        }
    }
}

impl PlacementStrategy for Guillotine {
    fn name(&self) -> String {
        "guillotine".to_string()
    }

    fn place(
        &self,
        ctx: &NestContext<'_>,
        order: &[usize],
        rotations: &[RotationChoice],
    ) -> NestResult {
        let strip = ctx.strip;
        let gap = strip.spacing();
        let mut free = vec![FreeRect::new(
            strip.margin(),
            strip.margin(),
            strip.usable_width() + gap,
            f64::INFINITY,
        )];

        let mut builder = LayoutBuilder::new(ctx);
        run_in_order(&mut builder, order, rotations, |builder, slot, variants| {
            let piece = &ctx.pieces[slot];
            let mut best: Option<(Candidate, usize)> = None;

            for (ri, rect) in free.iter().enumerate() {
                for &vi in variants {
                    let v = &piece.variants()[vi];
                    if !rect.holds(v.width + gap, v.height + gap) {
                        continue;
                    }
                    if !builder.fits_at(v, rect.x, rect.y) {
                        continue;
                    }
                    let candidate = Candidate::new(rect.x, rect.y, vi, v.height);
                    if best.map_or(true, |(c, _)| candidate.is_better_than(&c)) {
                        best = Some((candidate, ri));
                    }
                }
            }

            let Some((candidate, ri)) = best else {
                builder.reject(slot, "no free rectangle can hold the piece");
                return;
            };
            let v = &piece.variants()[candidate.variant];
            let used = free.swap_remove(ri);
            free.extend(
                used.split(v.width + gap, v.height + gap)
                    .into_iter()
                    .filter(|r| !r.is_degenerate()),
            );
            builder.place_candidate(slot, &candidate);
        });

        log::debug!(
            "guillotine: placed {} of {} pieces, {} free rectangles left",
            builder.placements().len(),
            order.len(),
            free.len()
        );
        builder.finish(self.name())
    }
}
