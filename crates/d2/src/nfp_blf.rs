//! Bottom-left fill driven by no-fit polygons.
//!
//! For each variant of the next piece, candidate reference points come from
//! the NFPs of every placed piece (translated to that piece's position), the
//! corners of the inner-fit rectangle and a fallback row above the layout.
//! Candidates are tried lowest-then-leftmost and the first one that passes
//! the exact clearance test wins for that variant.

use crate::layout::{
    keep_best, run_in_order, Candidate, LayoutBuilder, NestContext, PlacementStrategy,
    RotationChoice,
};
use crate::nfp::compute_nfp;
use crate::piece::{Piece, RotationVariant};
use crate::strip::InnerFitRect;
use marker_core::geom::{Point, EPS};
use marker_core::NestResult;

/// NFP-guided bottom-left fill.
#[derive(Debug, Clone, Copy, Default)]
pub struct NfpBlf;

impl NfpBlf {
    /// Collects candidate reference points for `variant`, sorted lowest then
    /// leftmost, deduplicated and restricted to the inner-fit rectangle.
    fn candidates(
        builder: &LayoutBuilder<'_, '_>,
        piece: &Piece,
        variant: &RotationVariant,
        ifp: &InnerFitRect,
    ) -> Vec<Point> {
        let ctx = builder.ctx();
        let gap = ctx.strip.spacing();
        let mut raw: Vec<Point> = vec![(ifp.min_x, ifp.min_y), (ifp.max_x, ifp.min_y)];
        if !builder.placements().is_empty() {
            raw.push((ifp.min_x, builder.top() + gap));
        }

        for (placed, placed_piece) in builder.placed_variants() {
            let Some(fixed) = placed_piece.variant(placed.rotation_index) else {
                continue;
            };
            let nfp = match ctx.cache.get_or_compute(
                (placed_piece.id(), fixed.angle),
                (piece.id(), variant.angle),
                || compute_nfp(fixed, variant, gap),
            ) {
                Ok(nfp) => nfp,
                Err(e) => {
                    log::warn!(
                        "skipping NFP of piece {} against piece {}: {}",
                        piece.id(),
                        placed_piece.id(),
                        e
                    );
                    continue;
                }
            };

            for (x, y) in nfp.vertices_at(placed.x, placed.y) {
                raw.push((x, y));
                if gap > 0.0 {
                    raw.push((x - gap, y));
                    raw.push((x + gap, y));
                    raw.push((x, y + gap));
                }
            }
            if gap > 0.0 {
                raw.extend(nfp.inflated_vertices_at(placed.x, placed.y));
            }
        }

        let mut points: Vec<Point> = Vec::with_capacity(raw.len() * 2);
        for (x, y) in raw {
            let y = y.max(ifp.min_y);
            points.push((ifp.clamp_x(x), y));
            points.push((ifp.min_x, y));
        }
        points.retain(|&p| ifp.contains(p));
        points.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.total_cmp(&b.0)));
        points.dedup_by(|a, b| (a.0 - b.0).abs() <= EPS && (a.1 - b.1).abs() <= EPS);
        points
    }
}

impl PlacementStrategy for NfpBlf {
    fn name(&self) -> String {
        "nfp_blf".to_string()
    }

    fn place(
        &self,
        ctx: &NestContext<'_>,
        order: &[usize],
        rotations: &[RotationChoice],
    ) -> NestResult {
        let mut builder = LayoutBuilder::new(ctx);
        run_in_order(&mut builder, order, rotations, |builder, slot, variants| {
            let piece = &ctx.pieces[slot];
            let mut best: Option<Candidate> = None;

            for &vi in variants {
                let v = &piece.variants()[vi];
                let Some(ifp) = ctx.strip.ifp(v) else {
                    continue;
                };
                for (x, y) in Self::candidates(builder, piece, v, &ifp) {
                    if best.map_or(false, |b| y > b.y + EPS) {
                        break;
                    }
                    if builder.fits_at(v, x, y) {
                        keep_best(&mut best, Candidate::new(x, y, vi, v.height));
                        break;
                    }
                }
            }

            match best {
                Some(best) => builder.place_candidate(slot, &best),
                None => builder.reject(slot, "no collision-free position found"),
            }
        });

        log::debug!(
            "nfp_blf: placed {} of {} pieces, {} cached NFPs",
            builder.placements().len(),
            order.len(),
            ctx.cache.len()
        );
        builder.finish(self.name())
    }
}
