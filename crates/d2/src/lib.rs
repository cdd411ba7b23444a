//! # Marker Nest
//!
//! Irregular strip nesting for garment markers.
//!
//! Pattern pieces (arbitrary simple polygons) are packed onto a fabric strip
//! of fixed width and unbounded length so that the consumed length is as
//! short as possible. Pieces keep a clearance gap between each other and
//! half that gap toward the strip edges.
//!
//! ## Features
//!
//! - No-fit polygons from convex hulls (Minkowski sum), memoized per run
//! - Five placement strategies behind [`PlacementStrategy`]: shelf,
//!   guillotine, skyline, NFP bottom-left fill and slide-and-compact
//! - An orchestrator that runs them in parallel and keeps the best layout
//! - A genetic optimizer over piece order and rotation
//! - R*-tree broad phase for collision queries
//!
//! ## Quick Start
//!
//! ```rust
//! use marker_nest::{nest, NestOptions};
//! use marker_nest::piece::rectangle;
//!
//! let pieces = vec![
//!     rectangle(50.0, 30.0),
//!     rectangle(50.0, 30.0),
//!     rectangle(40.0, 20.0),
//! ];
//!
//! let result = nest(&pieces, 100.0, 0.0, &NestOptions::default()).unwrap();
//!
//! assert!(result.success);
//! assert_eq!(result.placements.len(), 3);
//! println!(
//!     "length {:.1} cm, utilization {}",
//!     result.length,
//!     result.utilization_percent()
//! );
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use marker_nest::{Config, MarkerNester, Strategy};
//! use marker_nest::piece::{circle, l_shape};
//!
//! let config = Config::new()
//!     .with_gap(0.5)
//!     .with_strategy(Strategy::Optimize)
//!     .with_population_size(10)
//!     .with_max_generations(5)
//!     .with_seed(7);
//!
//! let pieces = vec![l_shape(40.0, 30.0, 20.0, 15.0), circle(10.0, 24)];
//! let result = MarkerNester::new(config).nest(&pieces, 80.0).unwrap();
//! assert_eq!(result.placements.len(), 2);
//! ```

pub mod compaction;
pub mod ga_nesting;
pub mod guillotine;
pub mod layout;
pub mod nester;
pub mod nfp;
pub mod nfp_blf;
pub mod piece;
pub mod shelf;
pub mod skyline;
pub mod spatial_index;
pub mod strip;

// Re-exports
pub use compaction::{compact, SlideCompact};
pub use ga_nesting::{run_ga_nesting, NestingChromosome, NestingProblem};
pub use guillotine::Guillotine;
pub use layout::{NestContext, PlacementStrategy, RotationChoice};
pub use nester::{nest, MarkerNester, StrategyKind};
pub use nfp::{compute_nfp, Nfp, NfpCache};
pub use nfp_blf::NfpBlf;
pub use piece::{Piece, RotationVariant};
pub use shelf::Shelf;
pub use skyline::Skyline;
pub use spatial_index::{SpatialEntry2D, SpatialIndex2D};
pub use strip::{InnerFitRect, Strip};
pub use marker_core::{
    Config, Error, NestOptions, NestResult, NestSummary, Placement, Point, Polygon,
    ProgressCallback, ProgressInfo, Result, Solver, Strategy, Transform2D, Unplaced, AABB2D,
};
