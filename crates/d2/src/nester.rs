//! Marker nesting orchestrator.

use crate::compaction::compact;
use crate::ga_nesting::run_ga_nesting;
use crate::guillotine::Guillotine;
use crate::layout::{
    order_by_desc, seed_orderings, NestContext, PlacementStrategy, RotationChoice,
    REASON_TOO_WIDE,
};
use crate::nfp::NfpCache;
use crate::nfp_blf::NfpBlf;
use crate::piece::Piece;
use crate::shelf::Shelf;
use crate::skyline::Skyline;
use crate::strip::Strip;
use marker_core::geom::Point;
use marker_core::solver::{Config, ProgressCallback, ProgressInfo, Solver, Strategy};
use marker_core::{Error, NestOptions, NestResult, Result, Unplaced};
use rayon::prelude::*;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A single placement strategy, for [`MarkerNester::solve_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    /// Row-based placement.
    Shelf,
    /// Guillotine free-rectangle placement.
    Guillotine,
    /// Skyline contour placement.
    Skyline,
    /// Bottom-left fill guided by no-fit polygons.
    NfpBlf,
}

impl StrategyKind {
    /// Every strategy, fastest first.
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::Shelf,
        StrategyKind::Guillotine,
        StrategyKind::Skyline,
        StrategyKind::NfpBlf,
    ];

    /// The strategy implementation.
    pub fn strategy(self) -> &'static dyn PlacementStrategy {
        match self {
            StrategyKind::Shelf => &Shelf,
            StrategyKind::Guillotine => &Guillotine,
            StrategyKind::Skyline => &Skyline,
            StrategyKind::NfpBlf => &NfpBlf,
        }
    }
}

/// Pieces that survived validation plus the ones that did not.
struct Prepared {
    pieces: Vec<Piece>,
    rejected: Vec<Unplaced>,
}

/// Garment marker nester.
///
/// Runs the constructive strategies on several seed orderings, refines with
/// NFP bottom-left fill and compaction while time allows, optionally runs the
/// genetic optimizer, and returns the best layout seen.
pub struct MarkerNester {
    config: Config,
    cancelled: Arc<AtomicBool>,
}

impl MarkerNester {
    /// Creates a new nester with the given configuration.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Creates a nester with default configuration.
    pub fn default_config() -> Self {
        Self::new(Config::default())
    }

    /// The run configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Flag that cancels the current run when set.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Nests `polygons` (piece id = list position) on a strip of `strip_width`.
    ///
    /// Only an invalid request (bad width, gap or configuration) is an error;
    /// bad pieces, timeouts and cancellation are reported in the result.
    pub fn nest(&self, polygons: &[Vec<Point>], strip_width: f64) -> Result<NestResult> {
        self.nest_with_progress(polygons, strip_width, None)
    }

    /// Like [`nest`](Self::nest), reporting each phase to `callback`.
    pub fn nest_with_progress(
        &self,
        polygons: &[Vec<Point>],
        strip_width: f64,
        callback: Option<&ProgressCallback>,
    ) -> Result<NestResult> {
        let strip = self.begin(strip_width)?;
        let start = Instant::now();
        let deadline = self.deadline(start);

        let mut result =
            self.in_pool(|| self.orchestrate(polygons, strip, deadline, callback))?;
        result.computation_time_ms = start.elapsed().as_millis() as u64;
        result.deduplicate_unplaced();

        log::info!(
            "nested {} of {} pieces with {}: length {:.2}, utilization {}",
            result.placed_count(),
            polygons.len(),
            result.strategy.as_deref().unwrap_or("none"),
            result.length,
            result.utilization_percent()
        );
        Ok(result)
    }

    /// Runs one strategy on the area-descending order, optionally compacted.
    pub fn solve_with(
        &self,
        kind: StrategyKind,
        polygons: &[Vec<Point>],
        strip_width: f64,
        compacted: bool,
    ) -> Result<NestResult> {
        let strip = self.begin(strip_width)?;
        let start = Instant::now();
        let deadline = self.deadline(start);
        let prepared = self.prepare(polygons, strip);
        if prepared.pieces.is_empty() {
            return Ok(empty_layout(strip, prepared.rejected));
        }

        let cache = NfpCache::new();
        let ctx = self.context(&prepared, strip, &cache, deadline);
        let order = order_by_desc(&prepared.pieces, Piece::area);
        let mut result = kind.strategy().place(&ctx, &order, &ctx.any_rotation());
        if compacted {
            result = compact(&ctx, &result, self.config.compaction_passes);
        }
        result.computation_time_ms = start.elapsed().as_millis() as u64;
        result.deduplicate_unplaced();
        Ok(result)
    }

    /// Validates the request and resets the cancellation flag.
    fn begin(&self, strip_width: f64) -> Result<Strip> {
        self.config.validate()?;
        let strip = Strip::from_config(strip_width, &self.config)?;
        self.cancelled.store(false, Ordering::Relaxed);
        Ok(strip)
    }

    fn deadline(&self, start: Instant) -> Option<Instant> {
        (self.config.time_limit_ms > 0)
            .then(|| start + Duration::from_millis(self.config.time_limit_ms))
    }

    /// Runs `op` on a dedicated pool when a thread count is configured.
    fn in_pool<T, F>(&self, op: F) -> Result<T>
    where
        T: Send,
        F: FnOnce() -> T + Send,
    {
        if self.config.threads == 0 {
            return Ok(op());
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads)
            .build()
            .map_err(|e| Error::Internal(format!("failed to build thread pool: {}", e)))?;
        Ok(pool.install(op))
    }

    /// Builds pieces, rejecting degenerate and too-wide ones.
    fn prepare(&self, polygons: &[Vec<Point>], strip: Strip) -> Prepared {
        let mut pieces = Vec::with_capacity(polygons.len());
        let mut rejected = Vec::new();
        for (id, points) in polygons.iter().enumerate() {
            match Piece::new(id, points.clone(), &self.config.rotations_deg) {
                Ok(piece) if piece.fits_width(strip.usable_width()) => pieces.push(piece),
                Ok(_) => rejected.push(Unplaced::new(id, REASON_TOO_WIDE)),
                Err(e) => {
                    log::warn!("dropping piece {}: {}", id, e);
                    rejected.push(Unplaced::new(id, e.to_string()));
                }
            }
        }
        Prepared { pieces, rejected }
    }

    fn context<'a>(
        &self,
        prepared: &'a Prepared,
        strip: Strip,
        cache: &'a NfpCache,
        deadline: Option<Instant>,
    ) -> NestContext<'a> {
        NestContext::new(&prepared.pieces, strip, cache)
            .with_deadline(deadline)
            .with_cancel_flag(Arc::clone(&self.cancelled))
            .with_rejected(&prepared.rejected)
    }

    fn orchestrate(
        &self,
        polygons: &[Vec<Point>],
        strip: Strip,
        deadline: Option<Instant>,
        callback: Option<&ProgressCallback>,
    ) -> NestResult {
        let start = Instant::now();
        let prepared = self.prepare(polygons, strip);
        if prepared.pieces.is_empty() {
            return empty_layout(strip, prepared.rejected);
        }

        let cache = NfpCache::new();
        let ctx = self.context(&prepared, strip, &cache, deadline);
        let orderings = seed_orderings(&prepared.pieces);
        let rotations = ctx.any_rotation();
        let phases = match self.config.strategy {
            Strategy::Fast => 2,
            Strategy::Optimize => 3,
        };
        let report = |phase: u32, name: &str, best: &NestResult| {
            if let Some(callback) = callback {
                callback(
                    ProgressInfo::new()
                        .with_phase(name)
                        .with_iteration(phase, phases)
                        .with_utilization(best.utilization)
                        .with_items(best.placed_count(), polygons.len())
                        .with_elapsed(start.elapsed().as_millis() as u64),
                );
            }
        };

        // The fast strategies always run to completion
        let unbounded = self.context(&prepared, strip, &cache, None);
        let fast: [&dyn PlacementStrategy; 3] = [&Shelf, &Guillotine, &Skyline];
        let mut best = run_jobs(&unbounded, &fast, &orderings, &rotations);
        report(1, "constructive", &best);

        if !self.target_reached(&best) && !ctx.expired() {
            let nfp: [&dyn PlacementStrategy; 1] = [&NfpBlf];
            let refined = run_jobs(&ctx, &nfp, &orderings, &rotations);
            keep_better(&mut best, refined);
            if !ctx.expired() {
                let compacted = compact(&ctx, &best, self.config.compaction_passes);
                keep_better(&mut best, compacted);
            }
            report(2, "nfp", &best);
        }

        if self.config.strategy == Strategy::Optimize
            && !self.target_reached(&best)
            && !ctx.expired()
        {
            let evolved = run_ga_nesting(&ctx, &self.config, callback);
            let evolved = compact(&ctx, &evolved, self.config.compaction_passes);
            best.generations = evolved.generations;
            best.best_fitness = evolved.best_fitness;
            best.fitness_history = evolved.fitness_history.clone();
            keep_better(&mut best, evolved);
            report(3, "genetic", &best);
        }

        best.timed_out = deadline.map_or(false, |d| Instant::now() >= d);
        best.cancelled = self.cancelled.load(Ordering::Relaxed);
        best.target_reached = self.target_reached(&best);
        if best.timed_out {
            log::warn!(
                "time budget of {} ms exhausted, returning best layout so far",
                self.config.time_limit_ms
            );
        }
        if let Some(callback) = callback {
            callback(
                ProgressInfo::new()
                    .with_phase("done")
                    .with_iteration(phases, phases)
                    .with_utilization(best.utilization)
                    .with_items(best.placed_count(), polygons.len())
                    .with_elapsed(start.elapsed().as_millis() as u64)
                    .finished(),
            );
        }
        best
    }

    fn target_reached(&self, layout: &NestResult) -> bool {
        self.config
            .target_utilization
            .map_or(false, |target| layout.all_placed() && layout.utilization >= target)
    }
}

impl Default for MarkerNester {
    fn default() -> Self {
        Self::default_config()
    }
}

impl Solver for MarkerNester {
    type Piece = Vec<Point>;
    type Strip = f64;

    fn solve(&self, pieces: &[Self::Piece], strip_width: &Self::Strip) -> Result<NestResult> {
        self.nest(pieces, *strip_width)
    }

    fn solve_with_progress(
        &self,
        pieces: &[Self::Piece],
        strip_width: &Self::Strip,
        callback: ProgressCallback,
    ) -> Result<NestResult> {
        self.nest_with_progress(pieces, *strip_width, Some(&callback))
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

/// Nests with caller-facing options: the one-call entry point.
pub fn nest(
    polygons: &[Vec<Point>],
    strip_width: f64,
    gap: f64,
    options: &NestOptions,
) -> Result<NestResult> {
    MarkerNester::new(options.to_config(gap)).nest(polygons, strip_width)
}

/// Runs every (strategy, ordering) pair in parallel and keeps the best layout.
/// Ties go to the earlier pair.
fn run_jobs(
    ctx: &NestContext<'_>,
    strategies: &[&dyn PlacementStrategy],
    orderings: &[(&'static str, Vec<usize>)],
    rotations: &[RotationChoice],
) -> NestResult {
    let jobs: Vec<(&dyn PlacementStrategy, &str, &[usize])> = strategies
        .iter()
        .flat_map(|&s| orderings.iter().map(move |(name, o)| (s, *name, o.as_slice())))
        .collect();

    let layouts: Vec<NestResult> = jobs
        .par_iter()
        .map(|&(strategy, ordering, order)| {
            let layout = strategy.place(ctx, order, rotations);
            log::debug!(
                "{} on {} order: {} placed, length {:.2}",
                strategy.name(),
                ordering,
                layout.placed_count(),
                layout.length
            );
            layout
        })
        .collect();

    layouts
        .into_iter()
        .reduce(|best, layout| if layout.is_better_than(&best) { layout } else { best })
        .unwrap_or_else(|| NestResult::new(ctx.strip.width()))
}

fn keep_better(best: &mut NestResult, candidate: NestResult) {
    if candidate.is_better_than(best) {
        *best = candidate;
    }
}

fn empty_layout(strip: Strip, rejected: Vec<Unplaced>) -> NestResult {
    let mut result = NestResult::from_placements(Vec::new(), strip.width(), rejected);
    if !result.unplaced.is_empty() {
        result.message = Some("no valid pieces to nest".to_string());
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::piece::{l_shape, rectangle};
    use std::sync::atomic::AtomicUsize;

    fn garments() -> Vec<Vec<Point>> {
        vec![
            rectangle(30.0, 20.0),
            l_shape(25.0, 25.0, 12.0, 12.0),
            rectangle(15.0, 40.0),
            rectangle(20.0, 20.0),
            l_shape(30.0, 15.0, 10.0, 8.0),
        ]
    }

    #[test]
    fn test_nest_places_everything() {
        let nester = MarkerNester::new(Config::new().with_gap(0.5));
        let result = nester.nest(&garments(), 60.0).unwrap();
        assert_eq!(result.placed_count(), 5);
        assert!(result.success);
        assert!(result.strategy.is_some());
        assert!(result.utilization > 0.0 && result.utilization <= 1.0);
    }

    #[test]
    fn test_empty_input_succeeds() {
        let result = MarkerNester::default().nest(&[], 100.0).unwrap();
        assert!(result.success);
        assert_eq!(result.length, 0.0);
        assert_eq!(result.utilization, 0.0);
        assert!(result.placements.is_empty());
    }

    #[test]
    fn test_only_invalid_pieces_fail_softly() {
        let polygons = vec![
            vec![(0.0, 0.0), (1.0, 1.0)],
            vec![(0.0, 0.0), (5.0, 0.0), (10.0, 0.0)],
        ];
        let result = MarkerNester::default().nest(&polygons, 100.0).unwrap();
        assert!(!result.success);
        assert_eq!(result.unplaced.len(), 2);
        assert_eq!(result.message.as_deref(), Some("no valid pieces to nest"));
    }

    #[test]
    fn test_invalid_requests_are_errors() {
        let nester = MarkerNester::default();
        assert!(matches!(nester.nest(&garments(), 0.0), Err(Error::InvalidStrip(_))));
        assert!(nester.nest(&garments(), f64::NAN).is_err());

        let negative_gap = MarkerNester::new(Config::new().with_gap(-1.0));
        assert!(matches!(
            negative_gap.nest(&garments(), 100.0),
            Err(Error::ConfigError(_))
        ));
    }

    #[test]
    fn test_too_wide_piece_is_reported() {
        let polygons = vec![rectangle(200.0, 150.0), rectangle(10.0, 10.0)];
        let result = MarkerNester::default().nest(&polygons, 100.0).unwrap();
        assert_eq!(result.placed_count(), 1);
        assert_eq!(result.unplaced.len(), 1);
        assert_eq!(result.unplaced[0].piece_id, 0);
        assert_eq!(result.unplaced[0].reason, REASON_TOO_WIDE);
        assert!(result.success);
    }

    #[test]
    fn test_solve_with_each_strategy() {
        let nester = MarkerNester::new(Config::new().with_gap(1.0));
        for kind in StrategyKind::ALL {
            let result = nester.solve_with(kind, &garments(), 60.0, false).unwrap();
            assert_eq!(result.placed_count(), 5, "{:?}", kind);
            assert_eq!(result.strategy.as_deref(), Some(kind.strategy().name().as_str()));

            let compacted = nester.solve_with(kind, &garments(), 60.0, true).unwrap();
            assert!(compacted.length <= result.length + 1e-9);
        }
    }

    #[test]
    fn test_progress_is_reported() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let callback: ProgressCallback = Box::new(move |info| {
            counter.fetch_add(1, Ordering::Relaxed);
            assert!(info.items_placed <= info.total_items);
        });
        let nester = MarkerNester::new(Config::new().with_gap(0.5));
        nester
            .solve_with_progress(&garments(), &60.0, callback)
            .unwrap();
        assert!(calls.load(Ordering::Relaxed) >= 2);
    }

    #[test]
    fn test_optimize_runs_genetic_search() {
        let config = Config::new()
            .with_gap(0.5)
            .with_strategy(Strategy::Optimize)
            .with_population_size(6)
            .with_max_generations(3);
        let result = MarkerNester::new(config).nest(&garments(), 60.0).unwrap();
        assert_eq!(result.placed_count(), 5);
        assert!(result.generations.is_some());
    }

    #[test]
    fn test_dedicated_thread_pool() {
        let nester = MarkerNester::new(Config::new().with_threads(2));
        let result = nester.nest(&garments(), 60.0).unwrap();
        assert_eq!(result.placed_count(), 5);
    }

    #[test]
    fn test_one_call_entry_point() {
        let options = NestOptions {
            max_seconds: 5.0,
            target_utilization_pct: None,
            strategy: Strategy::Fast,
        };
        let result = nest(&garments(), 60.0, 0.5, &options).unwrap();
        assert_eq!(result.placed_count(), 5);
        assert!(result.computation_time_ms <= 60_000);
    }
}
