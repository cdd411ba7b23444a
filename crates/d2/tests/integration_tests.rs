//! Integration tests for marker-nest.

use marker_core::geom::{self, Point};
use marker_nest::piece::{circle, l_shape, rectangle};
use marker_nest::{
    nest, Config, Error, MarkerNester, NestOptions, NestResult, ProgressCallback, Solver,
    Strategy, StrategyKind,
};
use std::sync::atomic::Ordering;

/// A small marker: bodice-like L shapes, sleeves, rounded pieces, strips.
fn garment_pieces() -> Vec<Vec<Point>> {
    vec![
        l_shape(42.0, 60.0, 18.0, 25.0),
        l_shape(42.0, 60.0, 18.0, 25.0),
        vec![(0.0, 0.0), (36.0, 0.0), (30.0, 48.0), (6.0, 48.0)],
        vec![(0.0, 0.0), (36.0, 0.0), (30.0, 48.0), (6.0, 48.0)],
        circle(9.0, 24),
        circle(6.5, 20),
        rectangle(70.0, 8.0),
        rectangle(22.0, 14.0),
        vec![(0.0, 0.0), (25.0, 0.0), (12.5, 20.0)],
        vec![(0.0, 0.0), (25.0, 0.0), (12.5, 20.0)],
    ]
}

fn assert_valid_layout(result: &NestResult, strip_width: f64, gap: f64) {
    let tol = 1e-6;
    for p in &result.placements {
        let b = p.aabb();
        assert!(b.min_x >= -tol && b.max_x <= strip_width + tol, "x out of strip: {:?}", b);
        assert!(b.min_y >= -tol && b.max_y <= result.length + tol, "y out of strip: {:?}", b);
    }

    let placed_area: f64 = result.placements.iter().map(|p| geom::area(&p.polygon)).sum();
    assert!(result.utilization <= 1.0 + 1e-12);
    assert!(result.length * strip_width >= placed_area - 1e-6);

    let shrunk: Vec<Vec<Point>> = result
        .placements
        .iter()
        .map(|p| geom::offset_radial(&p.polygon, -gap / 2.0))
        .collect();
    for i in 0..shrunk.len() {
        for j in (i + 1)..shrunk.len() {
            assert!(
                !geom::polygons_intersect(&shrunk[i], &shrunk[j]),
                "pieces {} and {} overlap",
                result.placements[i].piece_id,
                result.placements[j].piece_id
            );
            assert!(!geom::violates_clearance(
                &result.placements[i].polygon,
                &result.placements[j].polygon,
                gap
            ));
        }
    }
}

mod properties {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_every_strategy_produces_valid_layouts() {
        let gap = 0.6;
        let width = 110.0;
        let nester = MarkerNester::new(Config::new().with_gap(gap));
        for kind in StrategyKind::ALL {
            for compacted in [false, true] {
                let result = nester
                    .solve_with(kind, &garment_pieces(), width, compacted)
                    .unwrap();
                assert_eq!(result.placed_count(), 10, "{:?}", kind);
                assert_valid_layout(&result, width, gap);
            }
        }
    }

    #[test]
    fn test_orchestrated_layout_is_valid() {
        let gap = 0.5;
        let width = 120.0;
        let result = MarkerNester::new(Config::new().with_gap(gap))
            .nest(&garment_pieces(), width)
            .unwrap();
        assert!(result.success);
        assert!(result.all_placed());
        assert_valid_layout(&result, width, gap);
    }

    #[test]
    fn test_orchestrator_never_loses_to_a_single_strategy() {
        let width = 100.0;
        let nester = MarkerNester::new(Config::new().with_gap(0.5));
        let best = nester.nest(&garment_pieces(), width).unwrap();
        for kind in [StrategyKind::Shelf, StrategyKind::Guillotine, StrategyKind::Skyline] {
            let single = nester
                .solve_with(kind, &garment_pieces(), width, false)
                .unwrap();
            assert!(!single.is_better_than(&best), "{:?} beat the orchestrator", kind);
        }
    }

    #[test]
    fn test_seeded_optimizer_is_reproducible() {
        let config = Config::new()
            .with_gap(0.5)
            .with_strategy(Strategy::Optimize)
            .with_time_limit(0)
            .with_population_size(8)
            .with_max_generations(4)
            .with_seed(5);
        let first = MarkerNester::new(config.clone())
            .nest(&garment_pieces(), 100.0)
            .unwrap();
        let second = MarkerNester::new(config)
            .nest(&garment_pieces(), 100.0)
            .unwrap();

        assert_eq!(first.placements, second.placements);
        assert_eq!(first.utilization, second.utilization);
        assert_eq!(first.fitness_history, second.fitness_history);
    }

    #[test]
    fn test_compaction_never_increases_length() {
        let nester = MarkerNester::new(Config::new().with_gap(1.0));
        for kind in StrategyKind::ALL {
            let plain = nester.solve_with(kind, &garment_pieces(), 90.0, false).unwrap();
            let compacted = nester.solve_with(kind, &garment_pieces(), 90.0, true).unwrap();
            assert!(compacted.length <= plain.length + 1e-9, "{:?}", kind);
        }
    }

    #[test]
    fn test_single_square_rotation_closure() {
        let result = nest(&[rectangle(25.0, 25.0)], 25.0, 0.0, &NestOptions::default()).unwrap();
        assert_eq!(result.placements.len(), 1);
        let p = &result.placements[0];
        assert_relative_eq!(p.rotation, 0.0);
        assert_relative_eq!(p.x, 0.0);
        assert_relative_eq!(p.y, 0.0);
        assert_relative_eq!(result.length, 25.0);
    }

    #[test]
    fn test_two_half_width_rectangles_fill_the_row() {
        let pieces = vec![rectangle(50.0, 30.0), rectangle(50.0, 30.0)];
        let result = nest(&pieces, 100.0, 0.0, &NestOptions::default()).unwrap();
        assert_eq!(result.placements.len(), 2);
        assert_relative_eq!(result.length, 30.0, epsilon = 1e-9);
        assert_relative_eq!(result.utilization, 1.0, epsilon = 1e-9);
        assert_eq!(result.utilization_percent(), "100.0%");
    }

    #[test]
    fn test_oversized_piece() {
        let alone = nest(&[rectangle(150.0, 120.0)], 100.0, 0.0, &NestOptions::default()).unwrap();
        assert!(!alone.success);
        assert_eq!(alone.unplaced.len(), 1);
        assert!(alone.message.is_some());

        let pieces = vec![rectangle(150.0, 120.0), rectangle(20.0, 20.0)];
        let mixed = nest(&pieces, 100.0, 0.0, &NestOptions::default()).unwrap();
        assert!(mixed.success);
        assert_eq!(mixed.placements.len(), 1);
        assert_eq!(mixed.unplaced[0].piece_id, 0);
    }

    #[test]
    fn test_rotation_rescues_long_piece() {
        // too wide lying flat, fits standing up
        let pieces = vec![rectangle(120.0, 30.0)];
        let result = nest(&pieces, 100.0, 0.0, &NestOptions::default()).unwrap();
        assert_eq!(result.placements.len(), 1);
        assert_relative_eq!(result.placements[0].rotation % 180.0, 90.0);
        assert_relative_eq!(result.length, 120.0, epsilon = 1e-9);
    }

    #[test]
    fn test_empty_input() {
        let result = nest(&[], 100.0, 0.5, &NestOptions::default()).unwrap();
        assert!(result.success);
        assert_eq!(result.length, 0.0);
        assert_eq!(result.utilization, 0.0);
        assert!(result.placements.is_empty());
    }
}

mod failures {
    use super::*;

    #[test]
    fn test_degenerate_pieces_are_skipped() {
        let mut pieces = garment_pieces();
        pieces.push(vec![(0.0, 0.0), (10.0, 0.0)]);
        pieces.push(vec![(0.0, 0.0), (10.0, 10.0), (20.0, 20.0)]);
        pieces.push(vec![(0.0, 0.0), (f64::NAN, 0.0), (5.0, 5.0)]);

        let result = nest(&pieces, 120.0, 0.5, &NestOptions::default()).unwrap();
        assert!(result.success);
        assert_eq!(result.placements.len(), 10);
        let mut ids: Vec<usize> = result.unplaced.iter().map(|u| u.piece_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![10, 11, 12]);
        assert!(result.unplaced.iter().all(|u| !u.reason.is_empty()));
    }

    #[test]
    fn test_invalid_requests() {
        let options = NestOptions::default();
        assert!(matches!(
            nest(&garment_pieces(), -5.0, 0.5, &options),
            Err(Error::InvalidStrip(_))
        ));
        assert!(matches!(
            nest(&garment_pieces(), 100.0, f64::INFINITY, &options),
            Err(Error::ConfigError(_))
        ));
    }

    #[test]
    fn test_tiny_budget_still_returns_a_layout() {
        let options = NestOptions {
            max_seconds: 0.001,
            target_utilization_pct: None,
            strategy: Strategy::Optimize,
        };
        let result = nest(&garment_pieces(), 120.0, 0.5, &options).unwrap();
        assert!(result.success);
        assert_eq!(result.placements.len(), 10);
        assert_valid_layout(&result, 120.0, 0.5);
    }

    #[test]
    fn test_gap_as_wide_as_the_strip_places_nothing() {
        let result = nest(&[rectangle(1.0, 1.0)], 1.0, 2.0, &NestOptions::default()).unwrap();
        assert!(!result.success);
        assert!(result.placements.is_empty());
        assert_eq!(result.unplaced.len(), 1);
        assert_eq!(result.unplaced[0].piece_id, 0);
        assert!(result.unplaced[0].reason.contains("wider than the strip"));
        assert!(result.message.is_some());

        let exact = nest(&garment_pieces(), 10.0, 10.0, &NestOptions::default()).unwrap();
        assert_eq!(exact.unplaced.len(), 10);
        assert_eq!(exact.length, 0.0);
    }

    #[test]
    fn test_cancel_returns_best_so_far() {
        let config = Config::new()
            .with_gap(0.5)
            .with_strategy(Strategy::Optimize)
            .with_time_limit(0)
            .with_population_size(6)
            .with_max_generations(100_000)
            .with_stagnation_limit(None);
        let nester = MarkerNester::new(config);
        let handle = nester.cancel_handle();

        // cancel once the optimizer has finished two generations
        let callback: ProgressCallback = Box::new(move |info| {
            if info.phase == "genetic" && info.iteration >= 1 {
                handle.store(true, Ordering::Relaxed);
            }
        });
        let result = nester
            .nest_with_progress(&garment_pieces(), 120.0, Some(&callback))
            .unwrap();

        assert!(result.cancelled);
        assert!(result.success);
        assert!(result.all_placed());
        assert_eq!(result.generations, Some(2));
    }

    #[test]
    fn test_solver_trait_cancel() {
        let nester = MarkerNester::default();
        nester.cancel();
        // a new run resets the flag
        let result = nester.solve(&garment_pieces(), &120.0).unwrap();
        assert!(!result.cancelled);
        assert!(result.all_placed());
    }
}

#[cfg(feature = "serde")]
mod serde_contract {
    use super::*;

    #[test]
    fn test_options_from_json() {
        let options: NestOptions =
            serde_json::from_str(r#"{"max_seconds": 2.5, "strategy": "optimize"}"#).unwrap();
        assert_eq!(options.strategy, Strategy::Optimize);
        assert_eq!(options.target_utilization_pct, None);

        let result = nest(&[rectangle(10.0, 10.0)], 50.0, 0.0, &options).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["placements"][0]["piece_id"], 0);
        assert_eq!(json["success"], true);
    }
}
