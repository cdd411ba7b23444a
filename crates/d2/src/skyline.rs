//! Skyline placement.
//!
//! The occupied region is summarized by its upper contour, a run of
//! horizontal segments. A piece rests on the contour at the left end of some
//! segment, as low as the segments below its footprint allow.

use crate::layout::{
    keep_best, run_in_order, Candidate, LayoutBuilder, NestContext, PlacementStrategy,
    RotationChoice,
};
use marker_core::geom::EPS;
use marker_core::NestResult;

/// Bottom-left placement on a skyline contour.
#[derive(Debug, Clone, Copy, Default)]
pub struct Skyline;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Segment {
    x: f64,
    width: f64,
    y: f64,
}

impl Segment {
    fn end(&self) -> f64 {
        self.x + self.width
    }
}

/// Upper contour of the placed footprints, sorted by x and gap-free.
#[derive(Debug, Clone)]
struct Contour {
    segments: Vec<Segment>,
    right: f64,
}

impl Contour {
    fn new(left: f64, width: f64, floor: f64) -> Self {
        Self {
            segments: vec![Segment {
                x: left,
                width,
                y: floor,
            }],
            right: left + width,
        }
    }

    /// Resting height for a footprint of width `w` whose left edge is at `x`,
    /// or `None` if it would stick out on the right.
    fn rest_height(&self, x: f64, w: f64) -> Option<f64> {
        let end = x + w;
        if end > self.right + EPS {
            return None;
        }
        self.segments
            .iter()
            .filter(|s| s.end() > x + EPS && s.x < end - EPS)
            .map(|s| s.y)
            .reduce(f64::max)
    }

    /// Raises `[x, x + w)` to `top`.
    fn raise(&mut self, x: f64, w: f64, top: f64) {
        let end = x + w;
        let mut next = Vec::with_capacity(self.segments.len() + 2);
        for s in &self.segments {
            if s.end() <= x + EPS || s.x >= end - EPS {
                next.push(*s);
                continue;
            }
            if s.x < x - EPS {
                next.push(Segment {
                    x: s.x,
                    width: x - s.x,
                    y: s.y,
                });
            }
            if s.end() > end + EPS {
                next.push(Segment {
                    x: end,
                    width: s.end() - end,
                    y: s.y,
                });
            }
        }
        next.push(Segment { x, width: w, y: top });
        next.sort_by(|a, b| a.x.total_cmp(&b.x));

        let mut merged: Vec<Segment> = Vec::with_capacity(next.len());
        for s in next {
            match merged.last_mut() {
                Some(last) if (last.y - s.y).abs() <= EPS => last.width = s.end() - last.x,
                _ => merged.push(s),
            }
        }
        self.segments = merged;
    }
}

impl PlacementStrategy for Skyline {
    fn name(&self) -> String {
        "skyline".to_string()
    }

    fn place(
        &self,
        ctx: &NestContext<'_>,
        order: &[usize],
        rotations: &[RotationChoice],
    ) -> NestResult {
        let strip = ctx.strip;
        let gap = strip.spacing();
        let mut contour = Contour::new(strip.margin(), strip.usable_width() + gap, strip.margin());

        let mut builder = LayoutBuilder::new(ctx);
        run_in_order(&mut builder, order, rotations, |builder, slot, variants| {
            let piece = &ctx.pieces[slot];
            let mut best: Option<Candidate> = None;

            for seg in &contour.segments {
                for &vi in variants {
                    let v = &piece.variants()[vi];
                    let Some(y) = contour.rest_height(seg.x, v.width + gap) else {
                        continue;
                    };
                    if builder.fits_at(v, seg.x, y) {
                        keep_best(&mut best, Candidate::new(seg.x, y, vi, v.height));
                    }
                }
            }

            let Some(best) = best else {
                builder.reject(slot, "no skyline position can hold the piece");
                return;
            };
            let v = &piece.variants()[best.variant];
            contour.raise(best.x, v.width + gap, best.y + v.height + gap);
            builder.place_candidate(slot, &best);
        });

        log::debug!(
            "skyline: placed {} of {} pieces, contour has {} segments",
            builder.placements().len(),
            order.len(),
            contour.segments.len()
        );
        builder.finish(self.name())
    }
}
