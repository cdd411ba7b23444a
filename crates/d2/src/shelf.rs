//! Shelf (row) placement.
//!
//! Pieces fill rows left to right; a row is as tall as its tallest piece and a
//! new row opens above when the next piece does not fit in the remaining
//! width. Bounding boxes only, so this is fast and sensible for roughly
//! rectangular pieces.

use crate::layout::{
    keep_best, run_in_order, Candidate, LayoutBuilder, NestContext, PlacementStrategy,
    RotationChoice,
};
use marker_core::geom::EPS;
use marker_core::NestResult;

/// Row-based placement.
#[derive(Debug, Clone, Copy, Default)]
pub struct Shelf;

impl PlacementStrategy for Shelf {
    fn name(&self) -> String {
        "shelf".to_string()
    }

    fn place(
        &self,
        ctx: &NestContext<'_>,
        order: &[usize],
        rotations: &[RotationChoice],
    ) -> NestResult {
        let strip = ctx.strip;
        let gap = strip.spacing();
        let left = strip.margin();
        let right = strip.width() - strip.margin();

        let mut row_y = strip.margin();
        let mut row_height = 0.0f64;
        let mut cursor = left;

        let mut builder = LayoutBuilder::new(ctx);
        run_in_order(&mut builder, order, rotations, |builder, slot, variants| {
            let piece = &ctx.pieces[slot];
            let next_row_y = row_y + row_height + gap;
            let mut best: Option<Candidate> = None;

            for &vi in variants {
                let v = &piece.variants()[vi];
                let candidate = if cursor + v.width <= right + EPS {
                    Candidate::new(cursor, row_y, vi, v.height)
                } else {
                    Candidate::new(left, next_row_y, vi, v.height)
                };
                keep_best(&mut best, candidate);
            }

            let Some(best) = best else {
                return;
            };
            let v = &piece.variants()[best.variant];
            if best.y > row_y + EPS {
                row_y = best.y;
                row_height = 0.0;
            }
            builder.place_candidate(slot, &best);
            cursor = best.x + v.width + gap;
            row_height = row_height.max(v.height);
        });

        log::debug!(
            "shelf: placed {} of {} pieces",
            builder.placements().len(),
            order.len()
        );
        builder.finish(self.name())
    }
}
